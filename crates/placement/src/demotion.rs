//! Failure-aware demotion of primaries.
//!
//! Writes need the first `quorum_primaries` rows of a column to be healthy.
//! When one of them holds a failed node, the failed node swaps places with
//! the first live node found below the quorum rows. The column keeps the same
//! replicas, only their priority changes, so no data moves. A failed primary
//! with no live replacement is cleared to the empty sentinel, to be refilled
//! by a fill restricted to live nodes.

use corelib::{NodeId, PlacementTable};

/// Outcome of demoting one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnHealth {
    /// No failed node in the quorum rows.
    Healthy,
    /// Failed primaries were swapped down or cleared.
    Repaired { swaps: u64, cleared: u64 },
    /// Every row holds a failed node; the column is left as it was.
    Degraded,
}

/// Totals across a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemotionReport {
    pub swaps: u64,
    pub cleared: u64,
    /// Tokens whose columns had no live node at all.
    pub degraded: Vec<usize>,
}

pub fn demote_column<F>(column: &mut [NodeId], quorum_primaries: usize, is_alive: F) -> ColumnHealth
where
    F: Fn(NodeId) -> bool,
{
    let quorum = quorum_primaries.min(column.len());
    let failed = |id: NodeId| !id.is_empty() && !is_alive(id);

    if !column[..quorum].iter().any(|id| failed(*id)) {
        return ColumnHealth::Healthy;
    }
    if column.iter().all(|id| failed(*id)) {
        return ColumnHealth::Degraded;
    }

    let (mut swaps, mut cleared) = (0, 0);
    for row in 0..quorum {
        if !failed(column[row]) {
            continue;
        }
        let spare = (quorum..column.len()).find(|&r| !column[r].is_empty() && is_alive(column[r]));
        match spare {
            Some(spare) => {
                column.swap(row, spare);
                swaps += 1;
            }
            None => {
                column[row] = NodeId::EMPTY;
                cleared += 1;
            }
        }
    }
    ColumnHealth::Repaired { swaps, cleared }
}

/// Demote failed primaries in every column of `table`.
pub fn demote_failed_primaries<F>(
    table: &mut PlacementTable,
    quorum_primaries: usize,
    is_alive: F,
) -> DemotionReport
where
    F: Fn(NodeId) -> bool,
{
    let mut report = DemotionReport::default();
    if quorum_primaries == 0 {
        return report;
    }
    for token in 0..table.num_tokens() {
        match demote_column(table.column_mut(token), quorum_primaries, &is_alive) {
            ColumnHealth::Healthy => {}
            ColumnHealth::Repaired { swaps, cleared } => {
                report.swaps += swaps;
                report.cleared += cleared;
            }
            ColumnHealth::Degraded => report.degraded.push(token),
        }
    }
    report
}
