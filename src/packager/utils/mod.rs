//! Shared helpers for the packaging pipeline.

pub mod fs;
pub mod process;
