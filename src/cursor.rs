//! A bidirectional, bounded cursor over a tree's in-order sequence.
//!
//! Unlike [`crate::rank_map::RankMap::iter`]/[`crate::sample_map::SampleMap::iter`],
//! a cursor is a single position you can step from in either direction one
//! entry at a time, and that stays bound to the same underlying node
//! across any later mutation that doesn't remove that node — removing a
//! *different* key never invalidates it, since removal only ever changes
//! the tree's pointer structure, never a surviving node's own identity
//! (see the successor-swap notes on [`crate::tree::Tree::remove_structural`]).

use crate::allocator::SENTINEL;
use crate::augment::{Augment, CountAugment};
use crate::tree::Tree;

/// An opaque, `Copy` handle to a single entry, detached from any borrow of
/// the map it was drawn from.
///
/// A [`Cursor`] can't be passed into a method that also takes `&mut self`
/// on the same map — it holds a live shared borrow, and that's an aliasing
/// conflict the borrow checker rejects outright. `NodeId` is the
/// slotmap/generational-arena answer: it carries just the pool index, the
/// generation that index held when the handle was taken, and the tag of
/// the tree it was drawn from, with no lifetime at all. A mutating call
/// that's logically "addressed by cursor" — `remove_cursor`, cursor-
/// addressed `set_weight` — takes a `NodeId` and revalidates it against
/// the live tree before acting, rejecting a stale or foreign handle with
/// [`crate::error::Error::LogicError`] instead of letting it dangle.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct NodeId {
    pub(crate) index: u32,
    generation: u32,
    tree_tag: u64,
}

impl NodeId {
    /// `true` if this handle still points at a live node in `tree` — its
    /// tag matches the tree it was drawn from, and its slot hasn't been
    /// released (and possibly reused) since.
    pub(crate) fn is_valid_for<K: Ord, V, A: Augment>(&self, tree: &Tree<K, V, A>) -> bool {
        self.tree_tag == tree.tag() && tree.is_current(self.index, self.generation)
    }
}

/// A read-only cursor bound to one entry.
pub struct Cursor<'a, K: Ord, V, A: Augment> {
    tree: &'a Tree<K, V, A>,
    idx: u32,
}

impl<'a, K: Ord, V, A: Augment> Cursor<'a, K, V, A> {
    pub(crate) fn new(tree: &'a Tree<K, V, A>, idx: u32) -> Self {
        debug_assert_ne!(idx, SENTINEL);
        Cursor { tree, idx }
    }

    /// Borrows for `'a`, the lifetime of the map this cursor was drawn
    /// from, not just of this cursor value — so the key/value can outlive
    /// a temporary cursor (e.g. `map.find_by_rank(i)?.key()`).
    pub fn key(&self) -> &'a K {
        &self.tree.node(self.idx).key
    }

    pub fn value(&self) -> &'a V {
        &self.tree.node(self.idx).value
    }

    /// Detaches this cursor's position into a [`NodeId`] that can be
    /// carried across a `&mut self` call on the same map, e.g.
    /// `map.remove_cursor(cursor.id())`.
    pub fn id(&self) -> NodeId {
        NodeId {
            index: self.idx,
            generation: self.tree.generation_of(self.idx),
            tree_tag: self.tree.tag(),
        }
    }

    /// Steps to the entry immediately after this one, or `None` if this
    /// is the last entry.
    pub fn next(&self) -> Option<Cursor<'a, K, V, A>> {
        let s = self.tree.successor(self.idx);
        (s != SENTINEL).then(|| Cursor::new(self.tree, s))
    }

    /// Steps to the entry immediately before this one, or `None` if this
    /// is the first entry.
    pub fn prev(&self) -> Option<Cursor<'a, K, V, A>> {
        let p = self.tree.predecessor(self.idx);
        (p != SENTINEL).then(|| Cursor::new(self.tree, p))
    }
}

impl<'a, K: Ord, V> Cursor<'a, K, V, CountAugment> {
    /// This entry's 0-based position in sorted key order. O(log n).
    pub fn rank(&self) -> usize {
        crate::rank_map::rank_of_index(self.tree, self.idx)
    }
}

/// A mutable cursor bound to one entry. Stepping consumes the cursor
/// (mirroring `&mut` exclusivity: only one mutable view into the tree can
/// exist at a time) and hands back a fresh one at the new position.
pub struct CursorMut<'a, K: Ord, V, A: Augment> {
    tree: &'a mut Tree<K, V, A>,
    idx: u32,
}

impl<'a, K: Ord, V, A: Augment> CursorMut<'a, K, V, A> {
    pub(crate) fn new(tree: &'a mut Tree<K, V, A>, idx: u32) -> Self {
        debug_assert_ne!(idx, SENTINEL);
        CursorMut { tree, idx }
    }

    pub fn key(&self) -> &K {
        &self.tree.node(self.idx).key
    }

    pub fn value(&self) -> &V {
        &self.tree.node(self.idx).value
    }

    pub fn value_mut(&mut self) -> &mut V {
        &mut self.tree.node_mut(self.idx).value
    }

    pub fn next(self) -> Option<CursorMut<'a, K, V, A>> {
        let s = self.tree.successor(self.idx);
        if s == SENTINEL {
            None
        } else {
            Some(CursorMut::new(self.tree, s))
        }
    }

    pub fn prev(self) -> Option<CursorMut<'a, K, V, A>> {
        let p = self.tree.predecessor(self.idx);
        if p == SENTINEL {
            None
        } else {
            Some(CursorMut::new(self.tree, p))
        }
    }
}

impl<'a, K: Ord, V> CursorMut<'a, K, V, CountAugment> {
    pub fn rank(&self) -> usize {
        crate::rank_map::rank_of_index(self.tree, self.idx)
    }
}
