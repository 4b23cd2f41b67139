//! Subcommand implementations for the `pgutils` binary.

pub mod db;
pub mod render;
