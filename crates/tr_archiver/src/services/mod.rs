//! Business logic services

pub mod archiver;
pub mod processor;
pub mod retry;
