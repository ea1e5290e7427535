//! Subcommand implementations

pub mod analytics;
pub mod auto;
pub mod predict;
