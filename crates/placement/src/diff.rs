//! Deficit bookkeeping between target metrics and an existing table.
//!
//! For every level `r` the diff tracks, per group of length `r + 1`,
//!
//! ```text
//! deficit(G) = target(G) - number of columns whose rows 0..=r equal G
//! ```
//!
//! Positive deficits are groups that should gain tokens, negative ones must
//! give tokens away. Nodes that left the cluster (or sentinels) have no target
//! and therefore start negative. Per level the sum of positive deficits is the
//! transfer budget: every successful transfer lowers it by exactly one, and
//! a finished primary level must have drained it to zero.
//!
//! Transfers never touch the table. They return a [`Transfer`] the caller
//! applies to the column it described, which keeps the diff and the table in
//! lock step.

use crate::group::Group;
use crate::metrics::PlacementMetrics;
use corelib::{NodeId, PlacementTable};
use std::collections::BTreeMap;

/// One token changing hands at one row of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub row: usize,
    pub from: NodeId,
    pub to: NodeId,
    /// Deeper row that held `to` before the transfer. The two rows swap, so
    /// the column keeps the same nodes and no data moves.
    pub promoted_from: Option<usize>,
}

impl Transfer {
    pub fn apply(&self, column: &mut [NodeId]) {
        column[self.row] = self.to;
        if let Some(row) = self.promoted_from {
            column[row] = self.from;
        }
    }

    pub fn moves_data(&self) -> bool {
        self.promoted_from.is_none()
    }
}

/// Mutable deficit state for one recomputation.
#[derive(Debug, Clone)]
pub struct PlacementDiff {
    depth: usize,
    /// Members in canonical order; the only nodes that can receive tokens.
    candidates: Vec<NodeId>,
    /// Nonzero deficits per level.
    deficits: Vec<BTreeMap<Group, i64>>,
    /// Sum of positive deficits per level.
    remaining: Vec<i64>,
}

impl PlacementDiff {
    /// Diff every level of `metrics` against `table`.
    ///
    /// Every id found in the table takes part, which covers both members and
    /// the removed nodes still occupying cells.
    pub fn new(metrics: &PlacementMetrics, table: &PlacementTable) -> Self {
        let depth = metrics.depth().min(table.depth());
        let mut diff = Self {
            depth,
            candidates: metrics.nodes().collect(),
            deficits: vec![BTreeMap::new(); depth],
            remaining: vec![0; depth],
        };
        for level in 0..depth {
            diff.rebuild_level(level, metrics, table);
        }
        diff
    }

    /// Recount one level from scratch against the table as it is now.
    pub fn rebuild_level(
        &mut self,
        level: usize,
        metrics: &PlacementMetrics,
        table: &PlacementTable,
    ) {
        let mut deficits: BTreeMap<Group, i64> = metrics
            .level_targets(level)
            .map(|(group, tokens)| (group, tokens as i64))
            .collect();
        for (_, column) in table.columns() {
            *deficits.entry(Group::prefix(column, level + 1)).or_insert(0) -= 1;
        }
        deficits.retain(|_, deficit| *deficit != 0);

        self.remaining[level] = deficits.values().filter(|d| **d > 0).sum();
        self.deficits[level] = deficits;
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn deficit(&self, group: &Group) -> i64 {
        self.deficits
            .get(group.len().wrapping_sub(1))
            .and_then(|level| level.get(group))
            .copied()
            .unwrap_or(0)
    }

    pub fn node_deficit(&self, node: NodeId) -> i64 {
        self.deficit(&Group::of(&[node]))
    }

    pub fn pair_deficit(&self, a: NodeId, b: NodeId) -> i64 {
        self.deficit(&Group::of(&[a, b]))
    }

    /// Tokens still to move at `level`.
    pub fn remaining(&self, level: usize) -> u64 {
        self.remaining.get(level).map_or(0, |r| *r as u64)
    }

    /// Groups at `level` that hold more tokens than their target, in order.
    pub fn surplus(&self, level: usize) -> Vec<Group> {
        self.deficits[level]
            .iter()
            .filter(|(_, deficit)| **deficit < 0)
            .map(|(group, _)| *group)
            .collect()
    }

    /// Move the primary of `column` to a node that also wants the column's
    /// current secondary as its partner. `None` when no such node exists, or
    /// when the primary has no surplus to give away.
    pub fn transfer_primary_prefer_dispersion(&mut self, column: &[NodeId]) -> Option<Transfer> {
        self.transfer(0, column, Search::Dispersed)
    }

    /// Move the primary of `column` to the first node short of primaries,
    /// ignoring dispersion. Succeeds whenever the primary has a surplus.
    pub fn transfer_primary(&mut self, column: &[NodeId]) -> Option<Transfer> {
        self.transfer(0, column, Search::Unique)
            .or_else(|| self.transfer(0, column, Search::Promote))
    }

    pub fn transfer_secondary(&mut self, column: &[NodeId]) -> Option<Transfer> {
        self.transfer_at(1, column)
    }

    pub fn transfer_tertiary(&mut self, column: &[NodeId]) -> Option<Transfer> {
        self.transfer_at(2, column)
    }

    pub fn transfer_quaternary(&mut self, column: &[NodeId]) -> Option<Transfer> {
        self.transfer_at(3, column)
    }

    /// Reassign row `level` of `column`, keeping rows `0..level` fixed.
    ///
    /// Candidates already present elsewhere in the column are rejected, with
    /// one exception tried last: a candidate sitting in a deeper row may swap
    /// places with the current holder.
    pub fn transfer_at(&mut self, level: usize, column: &[NodeId]) -> Option<Transfer> {
        self.transfer(level, column, Search::Dispersed)
            .or_else(|| self.transfer(level, column, Search::Unique))
            .or_else(|| self.transfer(level, column, Search::Promote))
    }

    fn transfer(&mut self, level: usize, column: &[NodeId], search: Search) -> Option<Transfer> {
        if level >= self.depth {
            return None;
        }
        let prefix = Group::prefix(column, level);
        let from = column[level];
        if self.deficit(&prefix.with(from)) >= 0 {
            return None;
        }

        let (to, promoted_from) = self.find_candidate(level, column, prefix, search)?;
        self.shift(level, prefix.with(from), prefix.with(to));

        if level + 1 < self.depth {
            let partner = column[level + 1];
            let new_partner = if promoted_from == Some(level + 1) {
                from
            } else {
                partner
            };
            self.shift(
                level + 1,
                prefix.with(from).with(partner),
                prefix.with(to).with(new_partner),
            );
        }

        Some(Transfer {
            row: level,
            from,
            to,
            promoted_from,
        })
    }

    fn find_candidate(
        &self,
        level: usize,
        column: &[NodeId],
        prefix: Group,
        search: Search,
    ) -> Option<(NodeId, Option<usize>)> {
        let partner = column.get(level + 1).copied();
        if search == Search::Dispersed && (partner.is_none() || level + 1 >= self.depth) {
            return None;
        }

        self.candidates.iter().copied().find_map(|node| {
            let group = prefix.with(node);
            if self.deficit(&group) <= 0 {
                return None;
            }
            let held_at = column.iter().position(|id| *id == node);
            match (search, held_at) {
                (Search::Dispersed, None) => {
                    let partner = partner?;
                    (self.deficit(&group.with(partner)) > 0).then_some((node, None))
                }
                (Search::Unique, None) => Some((node, None)),
                (Search::Promote, Some(row)) if row > level => Some((node, Some(row))),
                _ => None,
            }
        })
    }

    /// One token leaves `from` and lands in `to` at the same level.
    fn shift(&mut self, level: usize, from: Group, to: Group) {
        self.adjust(level, from, 1);
        self.adjust(level, to, -1);
    }

    fn adjust(&mut self, level: usize, group: Group, delta: i64) {
        let entry = self.deficits[level].entry(group).or_insert(0);
        let before = *entry;
        *entry += delta;
        let after = *entry;
        if after == 0 {
            self.deficits[level].remove(&group);
        }
        self.remaining[level] += after.max(0) - before.max(0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Search {
    /// Absent from the column and wanted together with the next row's node.
    Dispersed,
    /// Absent from the column.
    Unique,
    /// Present deeper in the column; the rows swap.
    Promote,
}
