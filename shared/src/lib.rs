//! Shared types and utilities for kcorpus
//!
//! This crate contains the data model used by the checker library and the
//! CLI: sample identity, stub header symbols, findings and reports.

pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::{report::*, sample::*, stub::*};
