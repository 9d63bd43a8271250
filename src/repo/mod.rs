//! Upstream repository handling.

pub mod mirror;

pub use mirror::{branch_head, refresh};
