//! Data model shared between the checker and the CLI

pub mod diff;
pub mod report;
pub mod sample;
pub mod stub;
