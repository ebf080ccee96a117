//! Node identity for the placement engine.
//!
//! A node is nothing more than an opaque id and a capacity weight. Everything
//! else about it (addresses, disks, health checks) lives outside this crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Relative capacity of a node. Only meaningful as a ratio to the cluster total.
pub type NodeWeight = u64;

/// Compact identifier for a storage node.
///
/// The value `0` is reserved as the empty-slot sentinel inside a
/// [`PlacementTable`](crate::PlacementTable) and is never a real node.
/// Ordering by the raw value is the canonical iteration order used by every
/// algorithm, which is what makes placement deterministic.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Sentinel for an unassigned table cell.
    pub const EMPTY: NodeId = NodeId(0);

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("-")
        } else {
            write!(f, "{:x}", self.0)
        }
    }
}

impl From<u64> for NodeId {
    fn from(raw: u64) -> Self {
        NodeId(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sentinel() {
        assert!(NodeId::EMPTY.is_empty());
        assert!(!NodeId(7).is_empty());
        assert_eq!(NodeId::default(), NodeId::EMPTY);
    }

    #[test]
    fn test_display() {
        assert_eq!(NodeId(255).to_string(), "ff");
        assert_eq!(NodeId::EMPTY.to_string(), "-");
    }

    #[test]
    fn test_ordering_follows_raw_value() {
        let mut ids = vec![NodeId(9), NodeId(2), NodeId(5)];
        ids.sort();
        assert_eq!(ids, vec![NodeId(2), NodeId(5), NodeId(9)]);
    }
}
