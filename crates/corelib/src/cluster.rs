//! Cluster membership snapshot consumed by the placement algorithms.
//!
//! The membership and failure-detection layers own the truth; a `ClusterMap`
//! is the value they hand to a recomputation. Besides the weighted member set
//! it carries the transition sets of the current epoch:
//!
//! - `added`: members that joined since the last committed table
//! - `removed`: former members that still occupy table cells
//! - failed members, from which the non-failed set is derived
//!
//! All sets are ordered by [`NodeId`] so iteration is deterministic.

use crate::error::{PlacementError, Result};
use crate::node::{NodeId, NodeWeight};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Weighted membership plus the added/removed/failed sets of one epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMap {
    members: BTreeMap<NodeId, NodeWeight>,
    #[serde(default)]
    added: BTreeSet<NodeId>,
    #[serde(default)]
    removed: BTreeSet<NodeId>,
    #[serde(default)]
    failed: BTreeSet<NodeId>,
}

impl ClusterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a settled map (no transitions, nothing failed) from id/weight pairs.
    pub fn from_weights<I>(nodes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (NodeId, NodeWeight)>,
    {
        let mut map = Self::new();
        for (id, weight) in nodes {
            map.insert(id, weight)?;
        }
        Ok(map)
    }

    /// Insert or reweight a member without marking it as added.
    pub fn insert(&mut self, id: NodeId, weight: NodeWeight) -> Result<()> {
        if id.is_empty() {
            return Err(PlacementError::invalid_config(
                "node id 0 is reserved for empty table cells",
            ));
        }
        self.removed.remove(&id);
        self.members.insert(id, weight);
        Ok(())
    }

    /// Add a member and record it in the `added` set of this epoch.
    pub fn join(&mut self, id: NodeId, weight: NodeWeight) -> Result<()> {
        self.insert(id, weight)?;
        self.added.insert(id);
        Ok(())
    }

    /// Drop a member; it stays addressable through `removed` until the next epoch.
    ///
    /// Returns `false` if the node was not a member.
    pub fn leave(&mut self, id: NodeId) -> bool {
        if self.members.remove(&id).is_none() {
            return false;
        }
        self.added.remove(&id);
        self.failed.remove(&id);
        self.removed.insert(id);
        true
    }

    /// Record a liveness failure. Membership and weight are unaffected.
    pub fn mark_failed(&mut self, id: NodeId) -> bool {
        self.members.contains_key(&id) && self.failed.insert(id)
    }

    /// Clear a failure mark. Returns `false` if the node was not failed.
    pub fn mark_recovered(&mut self, id: NodeId) -> bool {
        self.failed.remove(&id)
    }

    /// The map the coordinator should carry forward once a table computed
    /// from `self` has been committed: same members, no transitions.
    pub fn next_epoch(&self) -> Self {
        Self {
            members: self.members.clone(),
            added: BTreeSet::new(),
            removed: BTreeSet::new(),
            failed: self.failed.clone(),
        }
    }

    /// Reject a membership the metrics cannot divide.
    pub fn validate(&self) -> Result<()> {
        if !self.members.is_empty() && self.total_weight() == 0 {
            return Err(PlacementError::invalid_config(format!(
                "{} members but total weight is zero",
                self.members.len()
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether `id` is a current member, failed or not.
    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn weight(&self, id: NodeId) -> Option<NodeWeight> {
        self.members.get(&id).copied()
    }

    /// Sum of member weights, widened so it cannot overflow.
    pub fn total_weight(&self) -> u128 {
        self.members.values().map(|w| u128::from(*w)).sum()
    }

    /// Members and their weights in canonical order.
    pub fn members(&self) -> impl Iterator<Item = (NodeId, NodeWeight)> + '_ {
        self.members.iter().map(|(id, w)| (*id, *w))
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.members.keys().copied()
    }

    pub fn added(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.added.iter().copied()
    }

    pub fn removed(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.removed.iter().copied()
    }

    /// Whether `id` left the cluster during this epoch.
    ///
    /// Only nodes that were members and called [`ClusterMap::leave`] count; an
    /// id that was never a member is not "removed".
    pub fn is_removed(&self, id: NodeId) -> bool {
        self.removed.contains(&id)
    }

    pub fn is_failed(&self, id: NodeId) -> bool {
        self.failed.contains(&id)
    }

    /// A member that is not currently failed.
    ///
    /// This is the eligibility test for quorum rows: a node can be alive and
    /// still transitioning in, but a removed node is never alive.
    ///
    /// # Performance
    /// - **Time**: O(log n) where n = members
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.members.contains_key(&id) && !self.failed.contains(&id)
    }

    pub fn non_failed(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.node_ids().filter(move |id| !self.failed.contains(id))
    }

    /// True when this epoch adds or removes members.
    ///
    /// Weight changes and liveness marks are not transitions; compare maps
    /// with [`ClusterMap::same_membership`] to catch a reweighting.
    pub fn has_transitions(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    /// True when both maps have the same members with the same weights.
    ///
    /// Failure marks and pending transitions are ignored, so a map that only
    /// changed liveness compares equal to its predecessor. That is what lets
    /// an update skip rebalancing and run demotion alone.
    ///
    /// # Arguments
    /// * `other` - The map to compare against, usually the previous epoch
    ///
    /// # Performance
    /// - **Time**: O(n) where n = members
    /// - **Space**: O(1)
    pub fn same_membership(&self, other: &ClusterMap) -> bool {
        self.members == other.members
    }
}
