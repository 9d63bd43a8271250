//! Noise-aware comparison of tick counts.

use serde::{Deserialize, Serialize};

/// Guard band below which a difference is considered noise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseThreshold {
    /// Minimum difference relative to the first value.
    #[serde(default = "default_relative")]
    pub relative: f64,
    /// Minimum absolute difference in ticks.
    #[serde(default = "default_absolute")]
    pub absolute: u64,
}

impl Default for NoiseThreshold {
    fn default() -> Self {
        Self {
            relative: default_relative(),
            absolute: default_absolute(),
        }
    }
}

fn default_relative() -> f64 {
    0.001
}

fn default_absolute() -> u64 {
    1000
}

impl NoiseThreshold {
    /// Whether `v1` is smaller than `v2` by more than the noise band.
    ///
    /// The relative difference is normalised by `v1`, the reference value,
    /// so the check is not symmetric. A zero reference makes any non-zero
    /// difference pass the relative guard; the absolute guard still applies.
    pub fn is_significantly_less(&self, v1: u64, v2: u64) -> bool {
        let diff = v1.abs_diff(v2);

        if v1 == 0 {
            if diff == 0 {
                return false;
            }
        } else if (diff as f64) / (v1 as f64) < self.relative {
            return false;
        }

        if diff < self.absolute {
            return false;
        }

        v1 < v2
    }
}
