//! Incremental placement with minimal movement.
//!
//! # Algorithm
//!
//! Starting from a copy of the current table:
//!
//! 1. Compute target metrics for the new membership and diff them against
//!    the copy.
//! 2. Every node holding more primaries than its target hands tokens to the
//!    nodes short of primaries, first to ones that also want the column's
//!    secondary as a partner, then to any short node. The primary budget must
//!    drain to zero.
//! 3. Each deeper row repeats the pattern with the rows above it held fixed,
//!    with targets recomputed from the rows the table now holds. Rows 2 and 3
//!    are best-effort.
//! 4. Cells still naming departed nodes are cleared and patched by the
//!    ring-walk fill, then failed primaries are demoted.
//!
//! Only tokens whose targets changed move, so adding one node to `N` equal
//! nodes moves about `num_tokens / (N + 1)` primaries instead of reshuffling
//! the whole table.
//!
//! Liveness changes alone never move tokens: when membership and weights are
//! unchanged only the demotion step runs.

use crate::diff::PlacementDiff;
use crate::fill::{clear_non_members, fill_empty_cells};
use crate::group::Group;
use crate::metrics::PlacementMetrics;
use crate::stats::PlacementStats;
use crate::strategy::{
    commit, initial, repair_failed_primaries, PlacementAlgorithm, PlacementContext,
};
use corelib::{ClusterMap, NodeId, PlacementConfig, PlacementError, PlacementTable, Result};
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct IncrementalPlacement;

impl IncrementalPlacement {
    pub fn new() -> Self {
        Self
    }
}

impl PlacementAlgorithm for IncrementalPlacement {
    fn compute(
        &self,
        ctx: &PlacementContext<'_>,
        table: &mut PlacementTable,
    ) -> Result<PlacementStats> {
        compute_incremental(table, ctx.old_map, ctx.new_map, ctx.config)
    }

    fn name(&self) -> &'static str {
        "incremental"
    }
}

/// Reject updates that remove every quorum primary of some column at once.
///
/// Such a column has no healthy writer left to source the rebalance from, so
/// the update must be split into smaller steps.
pub fn check_update_valid(
    table: &PlacementTable,
    new_map: &ClusterMap,
    quorum_primaries: usize,
) -> Result<()> {
    if quorum_primaries == 0 {
        return Ok(());
    }
    for (token, column) in table.columns() {
        let quorum = &column[..quorum_primaries.min(column.len())];
        if quorum.iter().all(|id| new_map.is_removed(*id)) {
            return Err(PlacementError::InvalidUpdate {
                token,
                removed: quorum.to_vec(),
            });
        }
    }
    Ok(())
}

/// Move `table` from `old_map` to `new_map` touching as few cells as possible.
///
/// Falls back to a full initial placement when there is nothing to build on:
/// no old map, an unassigned table, a geometry change, or fewer than two
/// members on either side.
///
/// # Errors
///
/// Any error leaves `table` unchanged.
pub fn compute_incremental(
    table: &mut PlacementTable,
    old_map: Option<&ClusterMap>,
    new_map: &ClusterMap,
    config: &PlacementConfig,
) -> Result<PlacementStats> {
    config.validate()?;
    new_map.validate()?;
    check_update_valid(table, new_map, config.quorum_primaries)?;

    let mut stats = PlacementStats::new("incremental");
    let old_map = match old_map {
        Some(old_map)
            if !table.is_unassigned()
                && table.matches_geometry(config)
                && old_map.len() >= 2
                && new_map.len() >= 2 =>
        {
            old_map
        }
        _ => {
            debug!(
                width = config.width,
                depth = config.depth,
                members = new_map.len(),
                "no usable previous table, building from scratch"
            );
            let mut scratch = table.successor(config);
            initial::build(&mut scratch, new_map, config, &mut stats)?;
            return Ok(commit(table, scratch, new_map, stats));
        }
    };

    let mut scratch = table.clone();
    let structural = new_map.has_transitions()
        || !old_map.same_membership(new_map)
        || !holds_only_members(&scratch, new_map);

    if structural {
        rebalance(&mut scratch, new_map, &mut stats)?;
    } else {
        debug!("membership unchanged, skipping rebalance");
    }

    if config.failure_aware() {
        repair_failed_primaries(&mut scratch, new_map, config, &mut stats)?;
    }
    Ok(commit(table, scratch, new_map, stats))
}

fn holds_only_members(table: &PlacementTable, map: &ClusterMap) -> bool {
    table
        .columns()
        .all(|(_, column)| column.iter().all(|id| map.contains(*id)))
}

fn rebalance(
    table: &mut PlacementTable,
    map: &ClusterMap,
    stats: &mut PlacementStats,
) -> Result<()> {
    let depth = table.depth();
    let mut metrics = PlacementMetrics::compute(map, table.num_tokens(), depth)?;
    let mut diff = PlacementDiff::new(&metrics, table);

    move_primaries(table, &mut diff, stats);
    assert_eq!(diff.remaining(0), 0, "primary transfer budget not drained");

    for level in 1..depth {
        if level >= 2 {
            metrics.rebase_level(level, table);
        }
        diff.rebuild_level(level, &metrics, table);
        if level + 1 < depth {
            diff.rebuild_level(level + 1, &metrics, table);
        }
        move_level(table, &mut diff, level, stats);

        let left = diff.remaining(level);
        if left > 0 {
            warn!(level, remaining = left, "row targets not fully met");
        }
    }

    stats.evicted_cells += clear_non_members(table, map);
    stats.filled_cells += fill_empty_cells(table, |id| map.contains(id))?;
    Ok(())
}

/// Drain every primary surplus, preferring transfers that keep the column's
/// secondary a wanted partner.
fn move_primaries(
    table: &mut PlacementTable,
    diff: &mut PlacementDiff,
    stats: &mut PlacementStats,
) {
    let mut owned: BTreeMap<NodeId, Vec<usize>> = BTreeMap::new();
    for (token, column) in table.columns() {
        owned.entry(column[0]).or_default().push(token);
    }

    for surplus in diff.surplus(0) {
        let Some(node) = surplus.last() else {
            continue;
        };
        let tokens = owned.remove(&node).unwrap_or_default();

        for prefer_dispersion in [true, false] {
            for &token in &tokens {
                if diff.node_deficit(node) >= 0 {
                    break;
                }
                if table.primary(token) != node {
                    continue;
                }
                let column = table.column(token);
                let transfer = if prefer_dispersion {
                    diff.transfer_primary_prefer_dispersion(column)
                } else {
                    diff.transfer_primary(column)
                };
                if let Some(transfer) = transfer {
                    transfer.apply(table.column_mut(token));
                    stats.record_transfer(&transfer);
                }
            }
        }
        debug!(node = %node, deficit = diff.node_deficit(node), "moved primaries");
    }
}

/// Drain the surpluses of one deeper row, holding the rows above it fixed.
fn move_level(
    table: &mut PlacementTable,
    diff: &mut PlacementDiff,
    level: usize,
    stats: &mut PlacementStats,
) {
    let mut held: BTreeMap<Group, Vec<usize>> = BTreeMap::new();
    for (token, column) in table.columns() {
        held.entry(Group::prefix(column, level + 1))
            .or_default()
            .push(token);
    }

    let mut moved = 0u64;
    for group in diff.surplus(level) {
        let Some(tokens) = held.remove(&group) else {
            continue;
        };
        for token in tokens {
            if diff.deficit(&group) >= 0 {
                break;
            }
            if let Some(transfer) = diff.transfer_at(level, table.column(token)) {
                transfer.apply(table.column_mut(token));
                stats.record_transfer(&transfer);
                moved += 1;
            }
        }
    }
    debug!(level, moved, "moved row tokens");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::compute_initial;

    fn equal_map(ids: &[u64]) -> ClusterMap {
        ClusterMap::from_weights(ids.iter().map(|id| (NodeId(*id), 1))).unwrap()
    }

    #[test]
    fn test_unchanged_map_is_noop() {
        let config = PlacementConfig::new(64, 3, 0).unwrap();
        let map = equal_map(&[1, 2, 3, 4]);
        let mut table = PlacementTable::for_config(&config);
        compute_initial(&mut table, &map, &config).unwrap();
        let before = table.clone();

        let stats = compute_incremental(&mut table, Some(&map), &map, &config).unwrap();
        assert_eq!(table, before);
        assert_eq!(stats.total_transfers(), 0);
        assert_eq!(stats.changed_tokens, 0);
    }

    #[test]
    fn test_missing_old_map_builds_from_scratch() {
        let config = PlacementConfig::new(8, 2, 0).unwrap();
        let map = equal_map(&[1, 2, 3, 4]);
        let mut fresh = PlacementTable::for_config(&config);
        compute_initial(&mut fresh, &map, &config).unwrap();

        let mut table = PlacementTable::for_config(&config);
        compute_incremental(&mut table, None, &map, &config).unwrap();
        assert_eq!(table, fresh);
    }

    #[test]
    fn test_departed_node_is_replaced() {
        let config = PlacementConfig::new(32, 2, 0).unwrap();
        let old = equal_map(&[1, 2, 3, 4]);
        let mut table = PlacementTable::for_config(&config);
        compute_initial(&mut table, &old, &config).unwrap();

        let mut new = old.clone();
        new.leave(NodeId(4));
        compute_incremental(&mut table, Some(&old), &new, &config).unwrap();

        assert!(table.find_fault().is_none());
        assert!(!table.node_counts().contains_key(&NodeId(4)));
        let primaries: usize = (1..=3).map(|id| table.primary_count(NodeId(id))).sum();
        assert_eq!(primaries, 32);
    }

    #[test]
    fn test_check_update_valid() {
        let config = PlacementConfig::new(8, 3, 2).unwrap();
        let old = equal_map(&[1, 2, 3, 4]);
        let mut table = PlacementTable::for_config(&config);
        compute_initial(&mut table, &old, &config).unwrap();

        let mut new = old.clone();
        new.leave(NodeId(1));
        assert!(check_update_valid(&table, &new, 2).is_ok());

        // Token 0 is led by nodes 1 and 2.
        new.leave(NodeId(2));
        let err = check_update_valid(&table, &new, 2).unwrap_err();
        assert_eq!(
            err,
            PlacementError::InvalidUpdate {
                token: 0,
                removed: vec![NodeId(1), NodeId(2)],
            }
        );
        assert!(check_update_valid(&table, &new, 0).is_ok());
    }
}
