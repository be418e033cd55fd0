//! CLI subcommands.

pub mod fetch;
pub mod init;
