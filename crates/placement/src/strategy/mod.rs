//! Placement algorithm abstractions.
//!
//! A placement algorithm turns a cluster map into a placement table. The
//! three implementations share one contract:
//!
//! - **RoundRobinPlacement**: stateless baseline, ignores weights
//! - **InitialPlacement**: weighted, dispersed table built from scratch
//! - **IncrementalPlacement**: minimal-movement update of an existing table
//!
//! Every algorithm works on a scratch copy and swaps it into the caller's
//! table only on success, so an error leaves the table exactly as it was.

pub mod incremental;
pub mod initial;
pub mod round_robin;

pub use incremental::{check_update_valid, compute_incremental, IncrementalPlacement};
pub use initial::{compute_initial, InitialPlacement};
pub use round_robin::RoundRobinPlacement;

use crate::demotion::demote_failed_primaries;
use crate::fill::fill_empty_cells;
use crate::stats::PlacementStats;
use corelib::{column_fault, ClusterMap, PlacementConfig, PlacementTable, Result};
use tracing::{info, warn};

/// Everything a recomputation needs, passed explicitly.
#[derive(Debug, Clone, Copy)]
pub struct PlacementContext<'a> {
    pub config: &'a PlacementConfig,
    /// Membership the current table was computed for. `None` at bootstrap.
    pub old_map: Option<&'a ClusterMap>,
    pub new_map: &'a ClusterMap,
}

impl<'a> PlacementContext<'a> {
    pub fn bootstrap(config: &'a PlacementConfig, map: &'a ClusterMap) -> Self {
        Self {
            config,
            old_map: None,
            new_map: map,
        }
    }

    pub fn update(
        config: &'a PlacementConfig,
        old_map: &'a ClusterMap,
        new_map: &'a ClusterMap,
    ) -> Self {
        Self {
            config,
            old_map: Some(old_map),
            new_map,
        }
    }
}

/// Trait for placement algorithms.
///
/// # Thread Safety
///
/// Implementations hold no state, so they are `Send + Sync` and can be shared.
/// The table itself must not be recomputed by two callers at once.
pub trait PlacementAlgorithm: Send + Sync + 'static {
    /// Recompute `table` for `ctx.new_map`.
    ///
    /// On error the table is unchanged.
    fn compute(
        &self,
        ctx: &PlacementContext<'_>,
        table: &mut PlacementTable,
    ) -> Result<PlacementStats>;

    /// Get the algorithm name (for logging/metrics).
    fn name(&self) -> &'static str;
}

/// Demote failed primaries, then refill cleared cells from live nodes only.
pub(crate) fn repair_failed_primaries(
    table: &mut PlacementTable,
    map: &ClusterMap,
    config: &PlacementConfig,
    stats: &mut PlacementStats,
) -> Result<()> {
    let report = demote_failed_primaries(table, config.quorum_primaries, |id| map.is_alive(id));
    stats.demotions += report.swaps;
    stats.cleared_primaries += report.cleared;
    if !report.degraded.is_empty() {
        warn!(
            columns = report.degraded.len(),
            "columns with no live replica left degraded"
        );
    }
    stats.degraded_columns = report.degraded;

    if report.cleared > 0 {
        stats.filled_cells += fill_empty_cells(table, |id| map.is_alive(id))?;
    }
    Ok(())
}

/// Check the finished scratch table and swap it into place.
///
/// The version moves forward only when some column changed.
///
/// # Panics
///
/// When a non-degraded column holds a sentinel, a duplicate or a node outside
/// the map. That is a bug in the algorithm, and committing such a table would
/// make data unreachable.
pub(crate) fn commit(
    table: &mut PlacementTable,
    mut scratch: PlacementTable,
    map: &ClusterMap,
    mut stats: PlacementStats,
) -> PlacementStats {
    verify(&scratch, map, &stats.degraded_columns);

    let changed = table.changed_tokens(&scratch).len();
    if changed > 0 {
        scratch.bump_version();
    }
    stats.version = scratch.version();
    stats.changed_tokens = changed;
    *table = scratch;

    info!(
        algorithm = %stats.algorithm,
        version = stats.version,
        changed_tokens = changed,
        transfers = stats.total_transfers(),
        data_moves = stats.data_moves(),
        filled = stats.filled_cells,
        "placement table recomputed"
    );
    stats.publish();
    stats
}

fn verify(table: &PlacementTable, map: &ClusterMap, degraded: &[usize]) {
    // A single member fills every row of every column; nothing to check.
    if map.len() < 2 {
        return;
    }
    for (token, column) in table.columns() {
        if degraded.binary_search(&token).is_ok() {
            continue;
        }
        if let Some(fault) = column_fault(token, column) {
            panic!("placement invariant violated: {fault}");
        }
        if let Some(stranger) = column.iter().find(|id| !map.contains(**id)) {
            panic!("placement invariant violated: token {token} names non-member {stranger}");
        }
    }
}
