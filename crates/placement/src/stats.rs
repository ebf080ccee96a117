//! Per-call statistics for operator telemetry.

use crate::diff::Transfer;
use corelib::{NodeId, MAX_DEPTH};
use metrics::{counter, gauge};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const LEVELS: [&str; MAX_DEPTH] = ["primary", "secondary", "tertiary", "quaternary"];

/// What one recomputation did to the table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementStats {
    pub algorithm: String,
    /// Version of the table after the call.
    pub version: u64,
    /// Transfers per row, promotions included.
    pub transfers: [u64; MAX_DEPTH],
    /// Transfers that swapped rows inside a column and moved no data.
    pub promotions: u64,
    /// Failed primaries swapped below the quorum rows.
    pub demotions: u64,
    /// Failed primaries cleared for lack of a live spare.
    pub cleared_primaries: u64,
    /// Cells naming departed nodes that had no transfer and were cleared.
    pub evicted_cells: u64,
    pub filled_cells: u64,
    pub degraded_columns: Vec<usize>,
    pub changed_tokens: usize,
    pub nodes_affected: BTreeSet<NodeId>,
}

impl PlacementStats {
    pub fn new(algorithm: &str) -> Self {
        Self {
            algorithm: algorithm.to_string(),
            ..Self::default()
        }
    }

    pub fn record_transfer(&mut self, transfer: &Transfer) {
        self.transfers[transfer.row] += 1;
        if !transfer.moves_data() {
            self.promotions += 1;
        }
        for node in [transfer.from, transfer.to] {
            if !node.is_empty() {
                self.nodes_affected.insert(node);
            }
        }
    }

    pub fn total_transfers(&self) -> u64 {
        self.transfers.iter().sum()
    }

    /// Transfers that require copying a replica to a new node.
    pub fn data_moves(&self) -> u64 {
        self.total_transfers() - self.promotions
    }

    /// Record the stats through the `metrics` facade.
    pub fn publish(&self) {
        let algorithm = self.algorithm.clone();
        for (level, count) in LEVELS.iter().zip(self.transfers) {
            if count > 0 {
                counter!(
                    "placement_transfers_total",
                    "level" => *level,
                    "algorithm" => algorithm.clone()
                )
                .increment(count);
            }
        }
        counter!("placement_promotions_total").increment(self.promotions);
        counter!("placement_demotions_total").increment(self.demotions);
        counter!("placement_filled_cells_total").increment(self.filled_cells);
        counter!("placement_recomputations_total", "algorithm" => algorithm).increment(1);
        gauge!("placement_degraded_columns").set(self.degraded_columns.len() as f64);
        gauge!("placement_table_version").set(self.version as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_transfer() {
        let mut stats = PlacementStats::new("incremental");
        stats.record_transfer(&Transfer {
            row: 0,
            from: NodeId(1),
            to: NodeId(2),
            promoted_from: None,
        });
        stats.record_transfer(&Transfer {
            row: 1,
            from: NodeId::EMPTY,
            to: NodeId(3),
            promoted_from: Some(2),
        });
        assert_eq!(stats.transfers, [1, 1, 0, 0]);
        assert_eq!(stats.total_transfers(), 2);
        assert_eq!(stats.data_moves(), 1);
        assert_eq!(
            stats.nodes_affected.iter().copied().collect::<Vec<_>>(),
            vec![NodeId(1), NodeId(2), NodeId(3)]
        );
        // No recorder installed; publishing is a no-op.
        stats.publish();
    }

    #[test]
    fn test_stats_json_roundtrip() {
        let mut stats = PlacementStats::new("initial");
        stats.version = 3;
        stats.transfers = [4, 2, 1, 0];
        stats.promotions = 1;
        stats.degraded_columns = vec![5];
        stats.nodes_affected.insert(NodeId(7));

        let json = serde_json::to_string(&stats).unwrap();
        let decoded: PlacementStats = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, stats);
        assert_eq!(decoded.data_moves(), 6);
    }
}
