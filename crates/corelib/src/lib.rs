//! Core data model for token placement.
//!
//! This crate holds the values exchanged between the cluster coordinator and
//! the placement engine:
//! - Node identity and weights
//! - Cluster membership snapshots with their transition sets
//! - The versioned placement table
//! - Placement configuration and the error type

pub mod cluster;
pub mod config;
pub mod error;
pub mod node;
pub mod table;

pub use cluster::ClusterMap;
pub use config::{PlacementConfig, MAX_DEPTH, MAX_WIDTH};
pub use error::{PlacementError, Result};
pub use node::{NodeId, NodeWeight};
pub use table::{column_fault, ColumnFault, PlacementTable};
