//! Ring-walk repair of empty table cells.
//!
//! Cells can be left empty when deeper-level targets cannot be realized, when
//! a departed node is evicted, or when demotion clears a failed primary. The
//! fill walks the token ring clockwise from each incomplete column and borrows
//! the primaries of the columns it passes, skipping ids already in the column
//! and ids the caller does not consider eligible.

use corelib::{ClusterMap, NodeId, PlacementError, PlacementTable, Result};
use std::collections::BTreeSet;
use tracing::debug;

/// Fill every empty cell from the primaries further along the ring.
///
/// The walk for a column stops after one full lap; a column that is still
/// incomplete by then yields [`PlacementError::InsufficientNodes`], carrying
/// the number of distinct eligible nodes the column holds or met on the lap.
/// Returns the number of cells filled.
pub fn fill_empty_cells<F>(table: &mut PlacementTable, eligible: F) -> Result<u64>
where
    F: Fn(NodeId) -> bool,
{
    let num_tokens = table.num_tokens();
    let depth = table.depth();
    let mut filled = 0u64;

    for token in 0..num_tokens {
        let Some(mut row) = first_empty(table.column(token)) else {
            continue;
        };
        let mut seen: BTreeSet<NodeId> = table
            .column(token)
            .iter()
            .copied()
            .filter(|id| !id.is_empty() && eligible(*id))
            .collect();

        for step in 1..=num_tokens {
            let candidate = table.primary((token + step) % num_tokens);
            if candidate.is_empty() || !eligible(candidate) {
                continue;
            }
            if !seen.insert(candidate) {
                continue;
            }
            table.set(token, row, candidate);
            filled += 1;
            match first_empty(table.column(token)) {
                Some(next) => row = next,
                None => break,
            }
        }

        if first_empty(table.column(token)).is_some() {
            return Err(PlacementError::InsufficientNodes {
                token,
                eligible: seen.len(),
                depth,
            });
        }
    }

    if filled > 0 {
        debug!(filled, "filled empty cells from the ring");
    }
    Ok(filled)
}

/// Replace every cell naming a non-member with the empty sentinel.
pub fn clear_non_members(table: &mut PlacementTable, map: &ClusterMap) -> u64 {
    let mut cleared = 0;
    for token in 0..table.num_tokens() {
        for cell in table.column_mut(token) {
            if !cell.is_empty() && !map.contains(*cell) {
                *cell = NodeId::EMPTY;
                cleared += 1;
            }
        }
    }
    cleared
}

fn first_empty(column: &[NodeId]) -> Option<usize> {
    column.iter().position(NodeId::is_empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_of(depth: usize, columns: &[&[u64]]) -> PlacementTable {
        let width = columns.len().trailing_zeros();
        let mut table = PlacementTable::new(width, depth);
        for (token, column) in columns.iter().enumerate() {
            for (row, id) in column.iter().enumerate() {
                table.set(token, row, NodeId(*id));
            }
        }
        table
    }

    #[test]
    fn test_fills_from_following_primaries() {
        let mut table = table_of(3, &[&[1, 2, 0], &[2, 3, 0], &[3, 0, 0], &[4, 1, 2]]);
        let filled = fill_empty_cells(&mut table, |_| true).unwrap();
        assert_eq!(filled, 4);
        assert_eq!(table.column(0), &[NodeId(1), NodeId(2), NodeId(3)]);
        assert_eq!(table.column(1), &[NodeId(2), NodeId(3), NodeId(4)]);
        assert_eq!(table.column(2), &[NodeId(3), NodeId(4), NodeId(1)]);
        assert!(table.find_fault().is_none());
    }

    #[test]
    fn test_skips_ineligible_nodes() {
        let mut table = table_of(2, &[&[1, 0], &[2, 3], &[3, 1], &[4, 1]]);
        fill_empty_cells(&mut table, |id| id != NodeId(2)).unwrap();
        assert_eq!(table.column(0), &[NodeId(1), NodeId(3)]);
    }

    #[test]
    fn test_wraps_around_the_ring() {
        let mut table = table_of(2, &[&[1, 2], &[2, 1], &[3, 1], &[4, 0]]);
        fill_empty_cells(&mut table, |_| true).unwrap();
        assert_eq!(table.column(3), &[NodeId(4), NodeId(1)]);
    }

    #[test]
    fn test_reports_insufficient_nodes() {
        let mut table = table_of(3, &[&[1, 2, 0], &[2, 1, 0]]);
        let err = fill_empty_cells(&mut table, |_| true).unwrap_err();
        assert_eq!(
            err,
            PlacementError::InsufficientNodes {
                token: 0,
                eligible: 2,
                depth: 3
            }
        );
    }

    #[test]
    fn test_insufficient_counts_only_eligible_nodes() {
        let mut table = table_of(3, &[&[1, 9, 0], &[9, 1, 0]]);
        let err = fill_empty_cells(&mut table, |id| id != NodeId(9)).unwrap_err();
        assert_eq!(
            err,
            PlacementError::InsufficientNodes {
                token: 0,
                eligible: 1,
                depth: 3
            }
        );
    }

    #[test]
    fn test_clear_non_members() {
        let map = ClusterMap::from_weights([(NodeId(1), 1), (NodeId(2), 1)]).unwrap();
        let mut table = table_of(2, &[&[1, 2], &[3, 1]]);
        assert_eq!(clear_non_members(&mut table, &map), 1);
        assert_eq!(table.column(1), &[NodeId::EMPTY, NodeId(1)]);
    }
}
