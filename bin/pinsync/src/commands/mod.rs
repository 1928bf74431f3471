//! Command implementations.

pub mod report;
pub mod run;
