//! Error types for the core library.

use crate::node::NodeId;
use thiserror::Error;

/// Result type alias for placement operations.
pub type Result<T> = std::result::Result<T, PlacementError>;

/// Recoverable errors produced while validating input or computing a table.
///
/// Broken internal invariants (a nonzero conservation counter, a duplicate id
/// left in a column) are not represented here. Those panic, because handing a
/// corrupted table to the coordinator is worse than aborting the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// Geometry or membership that the engine refuses to work with.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Every quorum primary of a column would be removed in one step.
    #[error("invalid update: token {token} would lose all quorum primaries {removed:?}")]
    InvalidUpdate { token: usize, removed: Vec<NodeId> },

    /// The ring walk could not find enough distinct eligible nodes.
    #[error("insufficient nodes: token {token} needs {depth} distinct nodes, found {eligible}")]
    InsufficientNodes {
        token: usize,
        eligible: usize,
        depth: usize,
    },
}

impl PlacementError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        PlacementError::InvalidConfiguration(msg.into())
    }
}
