//! Report generation.
//!
//! Ranked reports, chart descriptors, construct documentation pages and
//! the site generator that publishes them.

pub mod diff;
pub mod generator;
pub mod graph;
pub mod pages;
pub mod site;

pub use generator::{render, RankedReport};
pub use pages::write_pages;
