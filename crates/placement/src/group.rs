//! Ordered node groups used as keys for per-level targets and deficits.
//!
//! A group of length `k` is the prefix of a column covering rows `0..k`:
//! `(A)` is a primary, `(A, B)` a primary/secondary pair and so on up to
//! [`MAX_DEPTH`]. The empty group is the root every primary hangs off.

use corelib::{NodeId, MAX_DEPTH};
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Group {
    len: u8,
    ids: [NodeId; MAX_DEPTH],
}

impl Group {
    pub const ROOT: Group = Group {
        len: 0,
        ids: [NodeId::EMPTY; MAX_DEPTH],
    };

    /// Group of the given ids, in order. Panics past `MAX_DEPTH` ids.
    pub fn of(ids: &[NodeId]) -> Self {
        assert!(ids.len() <= MAX_DEPTH, "group longer than {MAX_DEPTH}");
        let mut group = Self::ROOT;
        group.ids[..ids.len()].copy_from_slice(ids);
        group.len = ids.len() as u8;
        group
    }

    /// The first `len` rows of a column.
    #[inline]
    pub fn prefix(column: &[NodeId], len: usize) -> Self {
        Self::of(&column[..len])
    }

    /// This group extended by one more row.
    #[inline]
    pub fn with(&self, node: NodeId) -> Self {
        let mut group = *self;
        group.ids[self.len()] = node;
        group.len += 1;
        group
    }

    #[inline]
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    pub fn is_root(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[NodeId] {
        &self.ids[..self.len()]
    }

    #[inline]
    pub fn contains(&self, node: NodeId) -> bool {
        self.as_slice().contains(&node)
    }

    pub fn last(&self) -> Option<NodeId> {
        self.as_slice().last().copied()
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Group").field(&self.as_slice()).finish()
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, id) in self.as_slice().iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", id)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_and_extend() {
        let column = [NodeId(3), NodeId(1), NodeId(2)];
        let pair = Group::prefix(&column, 2);
        assert_eq!(pair.as_slice(), &[NodeId(3), NodeId(1)]);
        assert_eq!(pair.with(NodeId(2)), Group::prefix(&column, 3));
        assert!(pair.contains(NodeId(1)));
        assert!(!pair.contains(NodeId(2)));
        assert_eq!(pair.last(), Some(NodeId(1)));
        assert!(Group::prefix(&column, 0).is_root());
    }

    #[test]
    fn test_levels_sort_apart() {
        // Shorter groups order before longer ones regardless of ids.
        let single = Group::of(&[NodeId(9)]);
        let pair = Group::of(&[NodeId(1), NodeId(2)]);
        assert!(single < pair);
        assert!(Group::of(&[NodeId(1), NodeId(3)]) > pair);
    }

    #[test]
    fn test_display() {
        assert_eq!(Group::of(&[NodeId(10), NodeId(2)]).to_string(), "(a,2)");
        assert_eq!(Group::ROOT.to_string(), "()");
    }
}
