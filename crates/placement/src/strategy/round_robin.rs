//! Round-robin placement.
//!
//! Columns are laid out by walking the member list: token `t` row `r` gets
//! member `(t + r) mod n`. Weights are ignored and every membership change
//! reshuffles the table, so this is only a baseline to compare the weighted
//! algorithms against.
//!
//! # Limitations
//!
//! - Doesn't honor node weights
//! - No minimal-movement guarantee
//! - Dispersion is fixed: each node is always followed by the same partners

use crate::stats::PlacementStats;
use crate::strategy::{commit, repair_failed_primaries, PlacementAlgorithm, PlacementContext};
use corelib::{NodeId, PlacementError, PlacementTable, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobinPlacement;

impl RoundRobinPlacement {
    pub fn new() -> Self {
        Self
    }
}

impl PlacementAlgorithm for RoundRobinPlacement {
    fn compute(
        &self,
        ctx: &PlacementContext<'_>,
        table: &mut PlacementTable,
    ) -> Result<PlacementStats> {
        let config = ctx.config;
        config.validate()?;
        ctx.new_map.validate()?;

        let mut stats = PlacementStats::new(self.name());
        let mut scratch = table.successor(config);
        let members: Vec<NodeId> = ctx.new_map.node_ids().collect();

        match members.len() {
            0 => {}
            1 => scratch.fill(members[0]),
            n if n < config.depth => {
                return Err(PlacementError::InsufficientNodes {
                    token: 0,
                    eligible: n,
                    depth: config.depth,
                });
            }
            n => {
                for token in 0..scratch.num_tokens() {
                    for row in 0..config.depth {
                        scratch.set(token, row, members[(token + row) % n]);
                    }
                }
            }
        }
        stats.nodes_affected.extend(members.iter().copied());

        if config.failure_aware() && !members.is_empty() {
            repair_failed_primaries(&mut scratch, ctx.new_map, config, &mut stats)?;
        }
        Ok(commit(table, scratch, ctx.new_map, stats))
    }

    fn name(&self) -> &'static str {
        "round-robin"
    }
}
