//! CLI subcommands

pub mod archive;
pub mod reports;
pub mod status;
