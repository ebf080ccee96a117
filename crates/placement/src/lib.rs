//! Weighted token placement for a replicated storage cluster.
//!
//! This crate decides which nodes hold each token of the hash space:
//! - Exact integer targets per node and per node group ([`PlacementMetrics`])
//! - Deficit bookkeeping and single-token transfers ([`PlacementDiff`])
//! - Initial, incremental and round-robin algorithms behind
//!   [`PlacementAlgorithm`]
//! - Failure-aware demotion of primaries and ring-walk repair of empty cells
//!
//! Every entry point is a synchronous, deterministic function of its inputs.
//!
//! # Example
//!
//! ```
//! use corelib::{ClusterMap, NodeId, PlacementConfig, PlacementTable};
//! use placement::{compute_incremental, compute_initial};
//!
//! let config = PlacementConfig::new(8, 2, 0).unwrap();
//! let old = ClusterMap::from_weights((1..=4).map(|id| (NodeId(id), 1))).unwrap();
//! let mut table = PlacementTable::for_config(&config);
//! compute_initial(&mut table, &old, &config).unwrap();
//!
//! let mut new = old.clone();
//! new.join(NodeId(5), 1).unwrap();
//! let stats = compute_incremental(&mut table, Some(&old), &new, &config).unwrap();
//! assert_eq!(stats.transfers[0], 1);
//! ```

pub mod demotion;
pub mod diff;
pub mod fill;
pub mod group;
pub mod metrics;
pub mod stats;
pub mod strategy;

pub use demotion::{demote_column, demote_failed_primaries, ColumnHealth, DemotionReport};
pub use diff::{PlacementDiff, Transfer};
pub use fill::{clear_non_members, fill_empty_cells};
pub use group::Group;
pub use metrics::PlacementMetrics;
pub use stats::PlacementStats;
pub use strategy::{
    check_update_valid, compute_incremental, compute_initial, IncrementalPlacement,
    InitialPlacement, PlacementAlgorithm, PlacementContext, RoundRobinPlacement,
};
