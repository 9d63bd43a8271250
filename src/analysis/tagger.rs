//! Trend tag derivation.

use super::comparator::NoiseThreshold;
use crate::error::{Result, SpeedError};
use crate::models::{Branch, Direction, TrendTag};
use std::collections::BTreeMap;

/// The comparisons tagged for every construct and runtime version, as
/// `(from, to)` pairs.
pub const TAGGED_COMPARISONS: [(Branch, Branch); 2] = [
    (Branch::Main, Branch::Develop),
    (Branch::Develop, Branch::Factory),
];

/// Derive the trend from `from` to `to` for one runtime version.
pub fn tag(
    threshold: &NoiseThreshold,
    version: &str,
    branch_values: &BTreeMap<Branch, u64>,
    from: Branch,
    to: Branch,
) -> Result<TrendTag> {
    let from_value = lookup(branch_values, from)?;
    let to_value = lookup(branch_values, to)?;

    let direction = if threshold.is_significantly_less(to_value, from_value) {
        Direction::Down
    } else if threshold.is_significantly_less(from_value, to_value) {
        Direction::Up
    } else {
        Direction::Steady
    };

    Ok(TrendTag {
        version: version.to_string(),
        to,
        direction,
        from,
    })
}

fn lookup(branch_values: &BTreeMap<Branch, u64>, branch: Branch) -> Result<u64> {
    branch_values
        .get(&branch)
        .copied()
        .ok_or(SpeedError::MissingBranchValue { branch })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(main: u64, develop: u64, factory: u64) -> BTreeMap<Branch, u64> {
        [
            (Branch::Baseline, 2_000_000),
            (Branch::Main, main),
            (Branch::Develop, develop),
            (Branch::Factory, factory),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_factory_faster_is_down() {
        let t = NoiseThreshold::default();
        let tag = tag(
            &t,
            "3.12",
            &values(1_000_000, 1_000_000, 500_000),
            Branch::Develop,
            Branch::Factory,
        )
        .unwrap();

        assert_eq!(tag.direction, Direction::Down);
        assert_eq!(tag.to_string(), "312_factory_down_vs_develop");
    }

    #[test]
    fn test_develop_slower_is_up() {
        let t = NoiseThreshold::default();
        let tag = tag(
            &t,
            "2.7",
            &values(1_000_000, 1_200_000, 1_200_000),
            Branch::Main,
            Branch::Develop,
        )
        .unwrap();

        assert_eq!(tag.to_string(), "27_develop_up_vs_main");
    }

    #[test]
    fn test_noise_is_steady() {
        let t = NoiseThreshold::default();
        let tag = tag(
            &t,
            "3.12",
            &values(99858, 99542, 99542),
            Branch::Main,
            Branch::Develop,
        )
        .unwrap();

        assert_eq!(tag.direction, Direction::Steady);
    }

    #[test]
    fn test_tag_is_pure() {
        let t = NoiseThreshold::default();
        let v = values(1_000_000, 1_100_000, 900_000);
        let first = tag(&t, "3.11", &v, Branch::Develop, Branch::Factory).unwrap();
        let second = tag(&t, "3.11", &v, Branch::Develop, Branch::Factory).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn test_missing_branch_is_error() {
        let t = NoiseThreshold::default();
        let mut v = values(1, 2, 3);
        v.remove(&Branch::Factory);

        let err = tag(&t, "3.12", &v, Branch::Develop, Branch::Factory).unwrap_err();
        assert!(matches!(
            err,
            SpeedError::MissingBranchValue {
                branch: Branch::Factory
            }
        ));
    }
}
