//! The token → replica-column placement table.
//!
//! A table has `2^width` columns, one per token, each holding `depth` node
//! ids ordered by priority: row 0 is the primary, rows `1..depth` are the
//! secondaries. Cells are stored column-major in a single `Vec` so a column is
//! a contiguous slice.
//!
//! # Invariants (steady state)
//!
//! - every column holds `depth` pairwise distinct ids
//! - no cell holds [`NodeId::EMPTY`]
//! - every id is a current member of the cluster
//!
//! The algorithms may break these transiently while they work on a scratch
//! copy; a committed table satisfies them, except for the degenerate
//! single-node cluster where every cell names the same node.

use crate::config::{PlacementConfig, MAX_DEPTH, MAX_WIDTH};
use crate::error::PlacementError;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct PlacementTable {
    version: u64,
    width: u32,
    depth: usize,
    cells: Vec<NodeId>,
}

/// Wire shape of a table, checked before it becomes a [`PlacementTable`].
#[derive(Deserialize)]
struct RawTable {
    version: u64,
    width: u32,
    depth: usize,
    cells: Vec<NodeId>,
}

impl TryFrom<RawTable> for PlacementTable {
    type Error = PlacementError;

    fn try_from(raw: RawTable) -> Result<Self, Self::Error> {
        if raw.width > MAX_WIDTH || raw.depth == 0 || raw.depth > MAX_DEPTH {
            return Err(PlacementError::invalid_config(format!(
                "table geometry width {} depth {} is not supported",
                raw.width, raw.depth
            )));
        }
        let expected = (1usize << raw.width) * raw.depth;
        if raw.cells.len() != expected {
            return Err(PlacementError::invalid_config(format!(
                "table with width {} and depth {} needs {expected} cells, found {}",
                raw.width,
                raw.depth,
                raw.cells.len()
            )));
        }
        Ok(Self {
            version: raw.version,
            width: raw.width,
            depth: raw.depth,
            cells: raw.cells,
        })
    }
}

/// A column that breaks the steady-state invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFault {
    Empty { token: usize, row: usize },
    Duplicate { token: usize, node: NodeId },
}

impl fmt::Display for ColumnFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnFault::Empty { token, row } => {
                write!(f, "token {} has an empty cell at row {}", token, row)
            }
            ColumnFault::Duplicate { token, node } => {
                write!(f, "token {} lists node {} more than once", token, node)
            }
        }
    }
}

impl PlacementTable {
    /// An unassigned table (version 0, every cell empty).
    pub fn new(width: u32, depth: usize) -> Self {
        Self {
            version: 0,
            width,
            depth,
            cells: vec![NodeId::EMPTY; (1usize << width) * depth],
        }
    }

    pub fn for_config(config: &PlacementConfig) -> Self {
        Self::new(config.width, config.depth)
    }

    /// An unassigned table shaped by `config` that keeps this table's version,
    /// so a rebuilt table still publishes as a newer one.
    ///
    /// Used when the geometry changes or there is no previous membership to
    /// move from: the old cells are discarded, the version history is not.
    ///
    /// # Arguments
    /// * `config` - Geometry of the new table; may differ from `self`
    ///
    /// # Performance
    /// - **Time**: O(t * d) where t = tokens, d = depth (allocates every cell)
    /// - **Space**: O(t * d)
    pub fn successor(&self, config: &PlacementConfig) -> Self {
        Self {
            version: self.version,
            ..Self::for_config(config)
        }
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Advance the version. Callers bump only when some column changed.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of columns, `2^width`.
    #[inline]
    pub fn num_tokens(&self) -> usize {
        1usize << self.width
    }

    /// Whether the table has the width and depth `config` asks for.
    pub fn matches_geometry(&self, config: &PlacementConfig) -> bool {
        self.width == config.width && self.depth == config.depth
    }

    /// True when no cell has ever been assigned.
    pub fn is_unassigned(&self) -> bool {
        self.cells.iter().all(NodeId::is_empty)
    }

    /// The `depth` cells of `token`, primary first.
    ///
    /// # Panics
    /// If `token >= num_tokens()`.
    ///
    /// # Performance
    /// - **Time**: O(1) - a column's cells are contiguous in one buffer
    #[inline]
    pub fn column(&self, token: usize) -> &[NodeId] {
        let start = token * self.depth;
        &self.cells[start..start + self.depth]
    }

    #[inline]
    pub fn column_mut(&mut self, token: usize) -> &mut [NodeId] {
        let start = token * self.depth;
        &mut self.cells[start..start + self.depth]
    }

    #[inline]
    pub fn get(&self, token: usize, row: usize) -> NodeId {
        self.cells[token * self.depth + row]
    }

    #[inline]
    pub fn set(&mut self, token: usize, row: usize, node: NodeId) {
        self.cells[token * self.depth + row] = node;
    }

    /// Row 0 of `token`, the node that owns writes for it.
    #[inline]
    pub fn primary(&self, token: usize) -> NodeId {
        self.get(token, 0)
    }

    /// Columns in token order.
    pub fn columns(&self) -> impl Iterator<Item = (usize, &[NodeId])> + '_ {
        self.cells.chunks(self.depth).enumerate()
    }

    /// Set every cell to `node`.
    pub fn fill(&mut self, node: NodeId) {
        self.cells.iter_mut().for_each(|cell| *cell = node);
    }

    pub fn clear(&mut self) {
        self.fill(NodeId::EMPTY);
    }

    /// How many columns `node` leads.
    pub fn primary_count(&self, node: NodeId) -> usize {
        (0..self.num_tokens())
            .filter(|&token| self.primary(token) == node)
            .count()
    }

    /// How many columns name each node at `row`.
    pub fn row_counts(&self, row: usize) -> BTreeMap<NodeId, usize> {
        let mut counts = BTreeMap::new();
        for (_, column) in self.columns() {
            *counts.entry(column[row]).or_insert(0) += 1;
        }
        counts
    }

    /// How many cells name each node, across all rows.
    pub fn node_counts(&self) -> BTreeMap<NodeId, usize> {
        let mut counts = BTreeMap::new();
        for node in &self.cells {
            *counts.entry(*node).or_insert(0) += 1;
        }
        counts
    }

    /// Same geometry and the same cells, regardless of version.
    pub fn same_assignment(&self, other: &PlacementTable) -> bool {
        self.width == other.width && self.depth == other.depth && self.cells == other.cells
    }

    /// Tokens whose column differs between `self` and `other`.
    ///
    /// Both tables must share a geometry; any mismatch reports every token.
    /// A reordering inside a column counts as a change even though it moves no
    /// data.
    ///
    /// # Arguments
    /// * `other` - Usually the scratch table about to replace `self`
    ///
    /// # Performance
    /// - **Time**: O(t * d) where t = tokens, d = depth
    /// - **Space**: O(k) where k = changed tokens
    pub fn changed_tokens(&self, other: &PlacementTable) -> Vec<usize> {
        if self.width != other.width || self.depth != other.depth {
            return (0..self.num_tokens().max(other.num_tokens())).collect();
        }
        (0..self.num_tokens())
            .filter(|&token| self.column(token) != other.column(token))
            .collect()
    }

    /// First column that breaks the empty/duplicate invariants, if any.
    pub fn find_fault(&self) -> Option<ColumnFault> {
        self.columns()
            .find_map(|(token, column)| column_fault(token, column))
    }
}

/// Check a single column for sentinels and repeated ids.
pub fn column_fault(token: usize, column: &[NodeId]) -> Option<ColumnFault> {
    for (row, node) in column.iter().enumerate() {
        if node.is_empty() {
            return Some(ColumnFault::Empty { token, row });
        }
        if column[..row].contains(node) {
            return Some(ColumnFault::Duplicate { token, node: *node });
        }
    }
    None
}
