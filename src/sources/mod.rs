//! Construct source variants.
//!
//! A benchmark source marks the code under test with
//! `# construct_begin`, an optional `# construct_alternative` and
//! `# construct_end`. From one annotated source this module derives the
//! text "with construct" (first case) and "without construct" (the
//! alternative). Lines belonging to the other case are blanked so both
//! texts keep the original line numbers.

use crate::error::{Result, SpeedError};
use std::fs;
use std::path::Path;

pub const BEGIN_MARKER: &str = "# construct_begin";
pub const ALTERNATIVE_MARKER: &str = "# construct_alternative";
pub const END_MARKER: &str = "# construct_end";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    InsideCase1,
    InsideCase2,
}

/// The two texts derived from one annotated source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceVariants {
    /// Source with the construct.
    pub with_construct: String,
    /// Source with the alternative instead.
    pub without_construct: String,
}

/// Split an annotated source into its two variants.
pub fn split_variants(source: &str) -> SourceVariants {
    let mut variants = SourceVariants::default();
    let mut state = State::Outside;

    for line in source.split_inclusive('\n') {
        let blank = if line.ends_with('\n') { "\n" } else { "" };

        if state == State::InsideCase2 {
            variants.with_construct.push_str(blank);
        } else {
            variants.with_construct.push_str(line);
        }

        if line.contains(ALTERNATIVE_MARKER) && state != State::Outside {
            state = State::InsideCase2;
        }

        if state == State::InsideCase1 {
            variants.without_construct.push_str(blank);
        } else {
            variants.without_construct.push_str(line);
        }

        if line.contains(BEGIN_MARKER) {
            state = State::InsideCase1;
        } else if line.contains(END_MARKER) {
            state = State::Outside;
        }
    }

    variants
}

/// Read and split the source of a construct.
///
/// Returns `Ok(None)` when the source has not been copied yet.
pub fn load_variants(path: &Path) -> Result<Option<SourceVariants>> {
    if !path.exists() {
        return Ok(None);
    }

    let bytes = fs::read(path).map_err(|e| SpeedError::io(path, e))?;
    let source = String::from_utf8(bytes)
        .map_err(|_| SpeedError::malformed(path, 0, "source is not valid UTF-8"))?;

    Ok(Some(split_variants(&source)))
}
