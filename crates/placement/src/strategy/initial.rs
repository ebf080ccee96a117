//! Initial placement from scratch.
//!
//! Members take contiguous blocks of primaries in node order, each block sized
//! by the member's primary target. Inside a block the secondaries are laid out
//! the same way, one contiguous sub-block per partner, and so on down to the
//! last row:
//!
//! ```text
//! token:     0   1   2   3   4   5   6   7
//! row 0:     A   A   B   B   C   C   D   D
//! row 1:     B   C   A   C   A   B   A   B
//! ```
//!
//! Rows the group targets cannot cover (too few weighted partners) are patched
//! by the ring-walk fill.

use crate::fill::fill_empty_cells;
use crate::group::Group;
use crate::metrics::PlacementMetrics;
use crate::stats::PlacementStats;
use crate::strategy::{commit, repair_failed_primaries, PlacementAlgorithm, PlacementContext};
use corelib::{ClusterMap, NodeId, PlacementConfig, PlacementTable, Result};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct InitialPlacement;

impl InitialPlacement {
    pub fn new() -> Self {
        Self
    }
}

impl PlacementAlgorithm for InitialPlacement {
    fn compute(
        &self,
        ctx: &PlacementContext<'_>,
        table: &mut PlacementTable,
    ) -> Result<PlacementStats> {
        compute_initial(table, ctx.new_map, ctx.config)
    }

    fn name(&self) -> &'static str {
        "initial"
    }
}

/// Replace `table` with a freshly built placement for `map`.
///
/// The table keeps its version history: the result is published one version
/// above the table it replaces, or with the same version if nothing changed.
pub fn compute_initial(
    table: &mut PlacementTable,
    map: &ClusterMap,
    config: &PlacementConfig,
) -> Result<PlacementStats> {
    config.validate()?;
    map.validate()?;

    let mut stats = PlacementStats::new("initial");
    let mut scratch = table.successor(config);
    build(&mut scratch, map, config, &mut stats)?;
    Ok(commit(table, scratch, map, stats))
}

/// Lay out an empty `scratch` table for `map`.
pub(crate) fn build(
    scratch: &mut PlacementTable,
    map: &ClusterMap,
    config: &PlacementConfig,
    stats: &mut PlacementStats,
) -> Result<()> {
    let members: Vec<NodeId> = map.node_ids().collect();
    match members.as_slice() {
        [] => return Ok(()),
        [only] => scratch.fill(*only),
        _ => {
            let metrics = PlacementMetrics::compute(map, scratch.num_tokens(), scratch.depth())?;
            let end = assign_block(scratch, &metrics, Group::ROOT, 0);
            debug_assert_eq!(end, scratch.num_tokens());
            stats.filled_cells += fill_empty_cells(scratch, |id| map.contains(id))?;
        }
    }
    stats.nodes_affected.extend(members);

    if config.failure_aware() {
        repair_failed_primaries(scratch, map, config, stats)?;
    }
    Ok(())
}

/// Assign the sub-blocks of `parent` starting at token `start` and return the
/// token after the last one assigned.
fn assign_block(
    table: &mut PlacementTable,
    metrics: &PlacementMetrics,
    parent: Group,
    start: usize,
) -> usize {
    let row = parent.len();
    if row >= table.depth() {
        return start;
    }
    let budget = if parent.is_root() {
        table.num_tokens()
    } else {
        metrics.group_tokens(&parent) as usize
    };
    let end = start + budget;

    let mut cursor = start;
    for node in metrics.nodes() {
        let group = parent.with(node);
        let tokens = (metrics.group_tokens(&group) as usize).min(end - cursor);
        if tokens == 0 {
            continue;
        }
        for token in cursor..cursor + tokens {
            table.set(token, row, node);
        }
        assign_block(table, metrics, group, cursor);
        cursor += tokens;
    }

    if cursor < end && row > 0 {
        debug!(group = %parent, unassigned = end - cursor, "group targets left cells for the fill");
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equal_map(n: u64) -> ClusterMap {
        ClusterMap::from_weights((1..=n).map(|id| (NodeId(id), 1))).unwrap()
    }

    #[test]
    fn test_blocks_follow_node_order() {
        let config = PlacementConfig::new(8, 2, 0).unwrap();
        let mut table = PlacementTable::for_config(&config);
        let stats = compute_initial(&mut table, &equal_map(4), &config).unwrap();

        let primaries: Vec<u64> = (0..8).map(|t| table.primary(t).0).collect();
        assert_eq!(primaries, vec![1, 1, 2, 2, 3, 3, 4, 4]);
        let secondaries: Vec<u64> = (0..8).map(|t| table.get(t, 1).0).collect();
        assert_eq!(secondaries, vec![2, 3, 1, 3, 1, 2, 1, 2]);
        assert_eq!(stats.filled_cells, 0);
        assert_eq!(stats.version, 1);
    }

    #[test]
    fn test_empty_and_single_member() {
        let config = PlacementConfig::new(4, 3, 0).unwrap();
        let mut table = PlacementTable::for_config(&config);
        let stats = compute_initial(&mut table, &ClusterMap::new(), &config).unwrap();
        assert!(table.is_unassigned());
        assert_eq!(stats.version, 0);

        compute_initial(&mut table, &equal_map(1), &config).unwrap();
        assert_eq!(table.node_counts().get(&NodeId(1)), Some(&12));
        assert_eq!(table.version(), 1);
    }

    #[test]
    fn test_three_nodes_cover_three_rows() {
        // Three nodes at depth 3: every pair has exactly one partner left, so
        // the group targets cover every row.
        let config = PlacementConfig::new(16, 3, 0).unwrap();
        let mut table = PlacementTable::for_config(&config);
        compute_initial(&mut table, &equal_map(3), &config).unwrap();
        assert!(table.find_fault().is_none());
    }

    #[test]
    fn test_zero_weight_member_holds_no_primaries() {
        let config = PlacementConfig::new(16, 2, 0).unwrap();
        let map =
            ClusterMap::from_weights([(NodeId(1), 1), (NodeId(2), 0), (NodeId(3), 1)]).unwrap();
        let mut table = PlacementTable::for_config(&config);
        compute_initial(&mut table, &map, &config).unwrap();
        assert_eq!(table.primary_count(NodeId(2)), 0);
        assert!(table.find_fault().is_none());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = PlacementConfig {
            width: 3,
            depth: 5,
            quorum_primaries: 0,
        };
        let mut table = PlacementTable::new(3, 4);
        assert!(compute_initial(&mut table, &equal_map(5), &config).is_err());
        assert!(table.is_unassigned());
    }
}
