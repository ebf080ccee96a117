//! Integer token-count targets derived from node weights.
//!
//! # Algorithm
//!
//! Every level uses the same rule. Given a parent group `P` holding `budget`
//! tokens, each member `X` not already in `P` gets
//!
//! ```text
//! floor(budget * weight(X) / sum of weights of members outside P)
//! ```
//!
//! and the shortfall left by the floors is handed out one token at a time to
//! the partners in canonical node order (zero-weight partners are skipped).
//! The root group holds `num_tokens`, so level 0 yields `primary_tokens`; a
//! primary `A` holding `primary_tokens(A)` yields `secondary_tokens(A, _)`,
//! and so on. The shortfall policy is a stable ordering rather than a true
//! largest-remainder method, which keeps the result independent of rounding
//! noise.
//!
//! # Exactness
//!
//! Levels 0 and 1 are exact: primaries sum to `num_tokens` and each node's
//! secondaries sum to its primaries, and the incremental algorithm drives the
//! table to these numbers. Levels 2 and 3 follow the same arithmetic but a
//! table cannot always realize them once earlier rows have moved, so they are
//! best-effort and only bias transfers. [`PlacementMetrics::rebase_level`]
//! recomputes them from the rows a table actually holds.

use crate::group::Group;
use corelib::{ClusterMap, NodeId, NodeWeight, PlacementTable, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Per-node and per-group token targets for one recomputation.
#[derive(Debug, Clone)]
pub struct PlacementMetrics {
    num_tokens: usize,
    depth: usize,
    weights: BTreeMap<NodeId, NodeWeight>,
    /// Positive targets only; absent groups target zero tokens.
    targets: BTreeMap<Group, u64>,
}

impl PlacementMetrics {
    /// Compute targets for every level up to `depth`.
    pub fn compute(map: &ClusterMap, num_tokens: usize, depth: usize) -> Result<Self> {
        map.validate()?;

        let mut metrics = Self {
            num_tokens,
            depth,
            weights: map.members().collect(),
            targets: BTreeMap::new(),
        };
        if metrics.weights.is_empty() {
            return Ok(metrics);
        }

        metrics.distribute(Group::ROOT, num_tokens as u64);
        for level in 1..depth {
            let parents: Vec<(Group, u64)> = metrics.level_targets(level - 1).collect();
            for (parent, budget) in parents {
                metrics.distribute(parent, budget);
            }
        }

        debug!(
            nodes = metrics.weights.len(),
            num_tokens,
            depth,
            groups = metrics.targets.len(),
            "computed placement metrics"
        );
        Ok(metrics)
    }

    /// Replace the targets of `level` with ones derived from the prefixes the
    /// table holds at rows `0..level`, instead of from the level above.
    pub fn rebase_level(&mut self, level: usize, table: &PlacementTable) {
        if level == 0 || level >= self.depth {
            return;
        }

        let mut parents: BTreeMap<Group, u64> = BTreeMap::new();
        for (_, column) in table.columns() {
            *parents.entry(Group::prefix(column, level)).or_insert(0) += 1;
        }

        self.targets.retain(|group, _| group.len() != level + 1);
        for (parent, budget) in parents {
            self.distribute(parent, budget);
        }
    }

    /// Split `budget` tokens of `parent` across the members outside it.
    fn distribute(&mut self, parent: Group, budget: u64) {
        let partners: Vec<(NodeId, NodeWeight)> = self
            .weights
            .iter()
            .filter(|(id, _)| !parent.contains(**id))
            .map(|(id, w)| (*id, *w))
            .collect();
        let pool: u128 = partners.iter().map(|(_, w)| u128::from(*w)).sum();
        if pool == 0 || budget == 0 {
            return;
        }

        let mut shares: Vec<u64> = partners
            .iter()
            .map(|(_, w)| (u128::from(budget) * u128::from(*w) / pool) as u64)
            .collect();
        let mut shortfall = budget - shares.iter().sum::<u64>();
        while shortfall > 0 {
            for (share, (_, weight)) in shares.iter_mut().zip(&partners) {
                if shortfall == 0 {
                    break;
                }
                if *weight > 0 {
                    *share += 1;
                    shortfall -= 1;
                }
            }
        }

        for ((id, _), share) in partners.iter().zip(shares) {
            if share > 0 {
                self.targets.insert(parent.with(*id), share);
            }
        }
    }

    pub fn num_tokens(&self) -> usize {
        self.num_tokens
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Members in canonical order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.weights.keys().copied()
    }

    pub fn weight(&self, node: NodeId) -> Option<NodeWeight> {
        self.weights.get(&node).copied()
    }

    /// Target for any group; zero when the group is not a target.
    pub fn group_tokens(&self, group: &Group) -> u64 {
        self.targets.get(group).copied().unwrap_or(0)
    }

    /// Targets of the groups of length `level + 1`, in order.
    pub fn level_targets(&self, level: usize) -> impl Iterator<Item = (Group, u64)> + '_ {
        self.targets
            .iter()
            .filter(move |(group, _)| group.len() == level + 1)
            .map(|(group, tokens)| (*group, *tokens))
    }

    pub fn primary_tokens(&self, node: NodeId) -> u64 {
        self.group_tokens(&Group::of(&[node]))
    }

    pub fn secondary_tokens(&self, a: NodeId, b: NodeId) -> u64 {
        self.group_tokens(&Group::of(&[a, b]))
    }

    pub fn tertiary_tokens(&self, a: NodeId, b: NodeId, c: NodeId) -> u64 {
        self.group_tokens(&Group::of(&[a, b, c]))
    }

    pub fn quaternary_tokens(&self, a: NodeId, b: NodeId, c: NodeId, d: NodeId) -> u64 {
        self.group_tokens(&Group::of(&[a, b, c, d]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(weights: &[(u64, NodeWeight)]) -> ClusterMap {
        ClusterMap::from_weights(weights.iter().map(|(id, w)| (NodeId(*id), *w))).unwrap()
    }

    #[test]
    fn test_primaries_sum_to_num_tokens() {
        let metrics = PlacementMetrics::compute(&map(&[(1, 3), (2, 5), (3, 7)]), 1024, 1).unwrap();
        let total: u64 = metrics.nodes().map(|n| metrics.primary_tokens(n)).sum();
        assert_eq!(total, 1024);
        // 1024 * 3/15 = 204.8, 1024 * 5/15 = 341.3, 1024 * 7/15 = 477.8
        assert_eq!(metrics.primary_tokens(NodeId(1)), 205);
        assert_eq!(metrics.primary_tokens(NodeId(2)), 342);
        assert_eq!(metrics.primary_tokens(NodeId(3)), 477);
    }

    #[test]
    fn test_shortfall_goes_in_node_order() {
        let metrics = PlacementMetrics::compute(&map(&[(1, 1), (2, 1), (3, 1)]), 8, 1).unwrap();
        assert_eq!(metrics.primary_tokens(NodeId(1)), 3);
        assert_eq!(metrics.primary_tokens(NodeId(2)), 3);
        assert_eq!(metrics.primary_tokens(NodeId(3)), 2);
    }

    #[test]
    fn test_secondaries_sum_to_primaries() {
        let metrics =
            PlacementMetrics::compute(&map(&[(1, 2), (2, 1), (3, 1), (4, 4)]), 256, 2).unwrap();
        for a in metrics.nodes() {
            let partners: u64 = metrics
                .nodes()
                .filter(|b| *b != a)
                .map(|b| metrics.secondary_tokens(a, b))
                .sum();
            assert_eq!(partners, metrics.primary_tokens(a), "node {a}");
            assert_eq!(metrics.secondary_tokens(a, a), 0);
        }
    }

    #[test]
    fn test_secondary_uses_remaining_weight() {
        // Node 4 holds half the weight; node 1 has 64 primaries and the others
        // outside node 1 weigh 1, 1 and 4.
        let metrics =
            PlacementMetrics::compute(&map(&[(1, 2), (2, 1), (3, 1), (4, 4)]), 256, 2).unwrap();
        assert_eq!(metrics.primary_tokens(NodeId(1)), 64);
        assert_eq!(metrics.secondary_tokens(NodeId(1), NodeId(2)), 11);
        assert_eq!(metrics.secondary_tokens(NodeId(1), NodeId(3)), 11);
        assert_eq!(metrics.secondary_tokens(NodeId(1), NodeId(4)), 42);
    }

    #[test]
    fn test_zero_weight_node_gets_nothing() {
        let metrics = PlacementMetrics::compute(&map(&[(1, 1), (2, 0), (3, 1)]), 16, 2).unwrap();
        assert_eq!(metrics.primary_tokens(NodeId(2)), 0);
        assert_eq!(metrics.secondary_tokens(NodeId(1), NodeId(2)), 0);
        assert_eq!(metrics.secondary_tokens(NodeId(1), NodeId(3)), 8);
    }

    #[test]
    fn test_deeper_levels_follow_parent_budget() {
        let metrics =
            PlacementMetrics::compute(&map(&[(1, 1), (2, 1), (3, 1), (4, 1), (5, 1)]), 64, 4)
                .unwrap();
        for (pair, budget) in metrics.level_targets(1) {
            let children: u64 = metrics
                .level_targets(2)
                .filter(|(triple, _)| Group::prefix(triple.as_slice(), 2) == pair)
                .map(|(_, tokens)| tokens)
                .sum();
            assert_eq!(children, budget, "pair {pair}");
        }
        assert!(metrics.level_targets(3).count() > 0);
    }

    #[test]
    fn test_empty_and_invalid_maps() {
        let metrics = PlacementMetrics::compute(&ClusterMap::new(), 64, 2).unwrap();
        assert_eq!(metrics.level_targets(0).count(), 0);
        assert!(PlacementMetrics::compute(&map(&[(1, 0)]), 64, 2).is_err());
    }

    #[test]
    fn test_rebase_uses_table_rows() {
        let nodes = map(&[(1, 1), (2, 1), (3, 1)]);
        let mut metrics = PlacementMetrics::compute(&nodes, 4, 3).unwrap();
        let mut table = PlacementTable::new(2, 3);
        for token in 0..4 {
            table.column_mut(token).copy_from_slice(&[NodeId(1), NodeId(2), NodeId::EMPTY]);
        }
        metrics.rebase_level(2, &table);
        assert_eq!(metrics.tertiary_tokens(NodeId(1), NodeId(2), NodeId(3)), 4);
        assert_eq!(metrics.level_targets(2).count(), 1);
    }
}
