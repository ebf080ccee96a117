//! `placement-sim`: drive the placement engine from JSON files.
//!
//! Provides commands for:
//! - Building a table from a cluster map (`init`)
//! - Moving a table to a new cluster map (`update`)
//! - Inspecting per-node counts of a table (`show`)

pub mod commands;
pub mod config;

pub use commands::{Algorithm, Command, CommandResult};
pub use config::CliConfig;
