//! Shared utilities

pub mod paths;
pub mod retention;
