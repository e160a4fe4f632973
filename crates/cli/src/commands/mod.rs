//! CLI subcommands.

pub mod diagnose;
pub mod migrate;
