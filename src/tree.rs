//! The shared red-black tree engine: rotations, the red-red and
//! double-black fixups, the successor-swap deletion step, and plain
//! navigation. Everything here is generic over the augmentation `A` and
//! is reused, monomorphized, by both [`crate::rank_map::RankMap`]
//! (`A = CountAugment`) and [`crate::sample_map::SampleMap`]
//! (`A = WeightAugment<W>`) — see the design notes on "polymorphism over
//! the node shape."

use std::sync::atomic::{AtomicU64, Ordering};

use crate::allocator::{Pool, SENTINEL};
use crate::augment::Augment;
use crate::node::{Color, Dir, TreeNode};

/// Hands out a fresh tag to each `Tree` as it's constructed, so a
/// [`crate::cursor::NodeId`] can be checked against the particular tree
/// it was drawn from rather than merely against a reused pool index (see
/// `Tree::tag`).
static NEXT_TREE_TAG: AtomicU64 = AtomicU64::new(1);

pub struct Tree<K: Ord, V, A: Augment> {
    pub(crate) root: u32,
    pub(crate) pool: Pool<TreeNode<K, V, A>>,
    tag: u64,
}

impl<K: Ord, V, A: Augment> Tree<K, V, A> {
    pub fn new() -> Self {
        Tree {
            root: SENTINEL,
            pool: Pool::new(),
            tag: NEXT_TREE_TAG.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn with_slab_size(slab_size: usize) -> Self {
        Tree {
            root: SENTINEL,
            pool: Pool::with_slab_size(slab_size),
            tag: NEXT_TREE_TAG.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// This tree's identity tag, distinct from every other `Tree` ever
    /// constructed in this process (including a clone of this one) —
    /// lets [`crate::cursor::NodeId::is_valid_for`] reject a handle drawn
    /// from a different map even if its index/generation happen to
    /// coincide.
    pub(crate) fn tag(&self) -> u64 {
        self.tag
    }

    /// The current generation stamped on the cell at `idx`, for building a
    /// [`crate::cursor::NodeId`].
    pub(crate) fn generation_of(&self, idx: u32) -> u32 {
        self.pool.generation(idx)
    }

    /// `true` if `idx`/`generation` still refer to a live node in this
    /// tree — i.e. a [`crate::cursor::NodeId`] stamped with them hasn't
    /// been invalidated by an intervening removal (and possible slot
    /// reuse).
    pub(crate) fn is_current(&self, idx: u32, generation: u32) -> bool {
        self.pool.is_current(idx, generation)
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    #[inline]
    pub(crate) fn node(&self, idx: u32) -> &TreeNode<K, V, A> {
        self.pool.get(idx)
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, idx: u32) -> &mut TreeNode<K, V, A> {
        self.pool.get_mut(idx)
    }

    #[inline]
    pub(crate) fn get_left(&self, idx: u32) -> u32 {
        if idx == SENTINEL {
            SENTINEL
        } else {
            self.node(idx).left
        }
    }

    #[inline]
    pub(crate) fn get_right(&self, idx: u32) -> u32 {
        if idx == SENTINEL {
            SENTINEL
        } else {
            self.node(idx).right
        }
    }

    #[inline]
    pub(crate) fn get_parent(&self, idx: u32) -> u32 {
        if idx == SENTINEL {
            SENTINEL
        } else {
            self.node(idx).parent
        }
    }

    #[inline]
    pub(crate) fn get_child(&self, idx: u32, dir: Dir) -> u32 {
        match dir {
            Dir::Left => self.get_left(idx),
            Dir::Right => self.get_right(idx),
        }
    }

    #[inline]
    fn set_child_link(&mut self, idx: u32, dir: Dir, child: u32) {
        let node = self.node_mut(idx);
        match dir {
            Dir::Left => node.left = child,
            Dir::Right => node.right = child,
        }
    }

    #[inline]
    pub(crate) fn is_red(&self, idx: u32) -> bool {
        idx != SENTINEL && self.node(idx).color == Color::Red
    }

    #[inline]
    pub(crate) fn is_black(&self, idx: u32) -> bool {
        !self.is_red(idx)
    }

    #[inline]
    fn set_color(&mut self, idx: u32, color: Color) {
        if idx != SENTINEL {
            self.node_mut(idx).color = color;
        }
    }

    /// The direction of `child` relative to `parent`. Panics if they are
    /// not actually connected that way — an internal bookkeeping bug, not
    /// a caller-reachable condition.
    pub(crate) fn child_dir(&self, parent: u32, child: u32) -> Dir {
        if self.get_left(parent) == child {
            Dir::Left
        } else if self.get_right(parent) == child {
            Dir::Right
        } else {
            unreachable!("nodes are not connected")
        }
    }

    /// Connects `parent`'s `dir` child link to `child`, and `child`'s
    /// parent link back to `parent` (if `child` is not the sentinel).
    pub(crate) fn connect(&mut self, parent: u32, child: u32, dir: Dir) {
        if parent != SENTINEL {
            self.set_child_link(parent, dir, child);
        }
        if child != SENTINEL {
            self.node_mut(child).parent = parent;
        }
    }

    /// Recomputes `idx`'s augmentation from its children's (already
    /// correct) augmentations. O(1).
    pub(crate) fn refresh(&mut self, idx: u32) {
        if idx == SENTINEL {
            return;
        }
        let left = self.get_left(idx);
        let right = self.get_right(idx);
        let left_aug = if left != SENTINEL {
            Some(self.node(left).aug)
        } else {
            None
        };
        let right_aug = if right != SENTINEL {
            Some(self.node(right).aug)
        } else {
            None
        };
        self.node_mut(idx).aug.refresh(left_aug.as_ref(), right_aug.as_ref());
    }

    /// Pivots `pivot` down in direction `dir`, promoting its
    /// `dir.opposite()` child into its place. Refreshes `pivot` first,
    /// then its new parent (the promoted node) — lower node first, per
    /// the augmentation-refresh ordering rule.
    pub(crate) fn rotate(&mut self, pivot: u32, dir: Dir) -> u32 {
        let grandparent = self.get_parent(pivot);
        let promoted = self.get_child(pivot, dir.opposite());
        debug_assert_ne!(promoted, SENTINEL, "rotation requires a child to promote");
        let inner = self.get_child(promoted, dir);

        self.connect(promoted, pivot, dir);
        self.connect(pivot, inner, dir.opposite());

        if grandparent != SENTINEL {
            let gp_dir = self.child_dir(grandparent, pivot);
            self.connect(grandparent, promoted, gp_dir);
        } else {
            self.node_mut(promoted).parent = SENTINEL;
            self.root = promoted;
        }

        self.refresh(pivot);
        self.refresh(promoted);
        promoted
    }

    /// Red-red fixup, run after attaching a new RED leaf.
    pub(crate) fn fix_insert(&mut self, mut node: u32) {
        while self.is_red(self.get_parent(node)) {
            let mut parent = self.get_parent(node);
            let mut grandparent = self.get_parent(parent);
            if grandparent == SENTINEL {
                break;
            }
            let dir = self.child_dir(grandparent, parent);
            let uncle = self.get_child(grandparent, dir.opposite());
            if self.is_red(uncle) {
                self.set_color(uncle, Color::Black);
                self.set_color(parent, Color::Black);
                self.set_color(grandparent, Color::Red);
                node = grandparent;
            } else {
                if self.child_dir(parent, node) == dir.opposite() {
                    self.rotate(parent, dir);
                    node = parent;
                }
                parent = self.get_parent(node);
                grandparent = self.get_parent(parent);
                self.set_color(parent, Color::Black);
                self.set_color(grandparent, Color::Red);
                self.rotate(grandparent, dir.opposite());
            }
        }
        self.set_color(self.root, Color::Black);
    }

    /// Double-black fixup after a physical removal reduced the victim to
    /// at most one child. `parent_hint` carries the logical parent/side
    /// when `node` itself is the sentinel (the removed slot had no
    /// surviving child to anchor the walk on).
    pub(crate) fn fix_remove(&mut self, mut node: u32, parent_hint: Option<(u32, Dir)>) {
        let mut hint = parent_hint;
        while node != self.root && self.is_black(node) {
            let (parent, dir) = match hint {
                Some(h) if node == SENTINEL => h,
                _ => {
                    let parent = self.get_parent(node);
                    let dir = self.child_dir(parent, node);
                    (parent, dir)
                }
            };
            hint = None;

            let mut sibling = self.get_child(parent, dir.opposite());
            if self.is_red(sibling) {
                self.set_color(sibling, Color::Black);
                self.set_color(parent, Color::Red);
                self.rotate(parent, dir);
                sibling = self.get_child(parent, dir.opposite());
            }

            if self.is_black(self.get_left(sibling)) && self.is_black(self.get_right(sibling)) {
                self.set_color(sibling, Color::Red);
                node = parent;
            } else {
                if self.is_black(self.get_child(sibling, dir.opposite())) {
                    self.set_color(self.get_child(sibling, dir), Color::Black);
                    self.set_color(sibling, Color::Red);
                    self.rotate(sibling, dir.opposite());
                    sibling = self.get_child(parent, dir.opposite());
                }
                let parent_color = self.node(parent).color;
                self.set_color(sibling, parent_color);
                self.set_color(parent, Color::Black);
                self.set_color(self.get_child(sibling, dir.opposite()), Color::Black);
                self.rotate(parent, dir);
                node = self.root;
                break;
            }
        }
        self.set_color(node, Color::Black);
    }

    /// Replaces the subtree rooted at `target` with the subtree rooted at
    /// `replacement` in `target`'s parent's eyes. Does not touch
    /// `target`'s own child links.
    pub(crate) fn transplant(&mut self, target: u32, replacement: u32) {
        let parent = self.get_parent(target);
        if parent == SENTINEL {
            self.root = replacement;
            if replacement != SENTINEL {
                self.node_mut(replacement).parent = SENTINEL;
            }
        } else {
            let dir = self.child_dir(parent, target);
            self.connect(parent, replacement, dir);
        }
    }

    pub(crate) fn find_min(&self, mut idx: u32) -> u32 {
        while self.get_left(idx) != SENTINEL {
            idx = self.get_left(idx);
        }
        idx
    }

    pub(crate) fn find_max(&self, mut idx: u32) -> u32 {
        while self.get_right(idx) != SENTINEL {
            idx = self.get_right(idx);
        }
        idx
    }

    /// In-order successor of `idx`, or `SENTINEL` if `idx` is the last
    /// node.
    pub(crate) fn successor(&self, idx: u32) -> u32 {
        if idx == SENTINEL {
            return SENTINEL;
        }
        if self.get_right(idx) != SENTINEL {
            return self.find_min(self.get_right(idx));
        }
        let mut node = idx;
        let mut parent = self.get_parent(node);
        while parent != SENTINEL && self.child_dir(parent, node) == Dir::Right {
            node = parent;
            parent = self.get_parent(node);
        }
        parent
    }

    /// In-order predecessor of `idx`, or `SENTINEL` if `idx` is the first
    /// node.
    pub(crate) fn predecessor(&self, idx: u32) -> u32 {
        if idx == SENTINEL {
            return SENTINEL;
        }
        if self.get_left(idx) != SENTINEL {
            return self.find_max(self.get_left(idx));
        }
        let mut node = idx;
        let mut parent = self.get_parent(node);
        while parent != SENTINEL && self.child_dir(parent, node) == Dir::Left {
            node = parent;
            parent = self.get_parent(node);
        }
        parent
    }

    /// Detaches `target` from the tree structurally (rebalancing via
    /// `fix_remove` as needed) and returns `target`'s own pool index,
    /// unlinked and still occupied, ready for `release`.
    ///
    /// When `target` has two children, this physically rewires the
    /// in-order successor into `target`'s structural position (pointer
    /// identity preserved — any cursor bound to the successor keeps
    /// working), rather than copying the successor's payload into
    /// `target` and deleting the successor. Every node whose child set
    /// changed — on both the path up from `target`'s old position and,
    /// in the two-children case, the path strictly between the
    /// successor's old position and `target` — gets its augmentation
    /// recomputed by a single bottom-up walk at the end, which is what
    /// actually avoids the classic conflation bug of patching ancestor
    /// aggregates by hand along two overlapping paths: a plain
    /// from-the-children recompute can't double-count or miss a node.
    pub(crate) fn remove_structural(&mut self, target: u32) -> u32 {
        let left = self.get_left(target);
        let right = self.get_right(target);

        let (pivot, was_black, parent_hint, refresh_from) = if left == SENTINEL {
            let was_black = self.is_black(target);
            let old_parent = self.get_parent(target);
            let hint = if right == SENTINEL && old_parent != SENTINEL {
                Some((old_parent, self.child_dir(old_parent, target)))
            } else {
                None
            };
            self.transplant(target, right);
            (right, was_black, hint, old_parent)
        } else if right == SENTINEL {
            let was_black = self.is_black(target);
            let old_parent = self.get_parent(target);
            self.transplant(target, left);
            (left, was_black, None, old_parent)
        } else {
            let successor = self.find_min(right);
            let successor_was_black = self.is_black(successor);
            let x = self.get_right(successor);
            let target_old_parent = self.get_parent(target);

            let (hint, refresh_from) = if self.get_parent(successor) == target {
                self.transplant(target, successor);
                self.connect(successor, left, Dir::Left);
                self.refresh(successor);
                let hint = if x == SENTINEL {
                    // `x` occupies `successor`'s right-child slot here (its
                    // left child became `target`'s old left subtree), not
                    // the left slot used in the non-direct-child branch
                    // below.
                    Some((successor, Dir::Right))
                } else {
                    None
                };
                (hint, target_old_parent)
            } else {
                let successor_parent = self.get_parent(successor);
                self.transplant(successor, x);
                self.connect(successor, right, Dir::Right);
                self.transplant(target, successor);
                self.connect(successor, left, Dir::Left);
                let hint = if x == SENTINEL {
                    Some((successor_parent, Dir::Left))
                } else {
                    None
                };
                (hint, successor_parent)
            };

            self.set_color(successor, self.node(target).color);
            (x, successor_was_black, hint, refresh_from)
        };

        if was_black {
            self.fix_remove(pivot, parent_hint);
        }

        self.refresh_to_root(refresh_from);

        target
    }

    /// Refreshes `idx` and every ancestor above it, bottom-up, after a
    /// mutation changed `idx`'s own contribution or child set. A no-op if
    /// `idx` is the sentinel.
    pub(crate) fn refresh_to_root(&mut self, mut idx: u32) {
        while idx != SENTINEL {
            self.refresh(idx);
            idx = self.get_parent(idx);
        }
    }

    /// Removes the node at `idx` from the pool entirely, returning its
    /// stored `(K, V)`. Must only be called after `remove_structural` (or
    /// for a node that was never linked into the tree, e.g. on a failed
    /// insert rollback).
    pub(crate) fn release(&mut self, idx: u32) -> (K, V) {
        let node = self.pool.release(idx);
        (node.key, node.value)
    }
}

impl<K: Ord, V, A: Augment> Default for Tree<K, V, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, V: Clone, A: Augment> Clone for Tree<K, V, A> {
    fn clone(&self) -> Self {
        // A fresh tag, not `self.tag`: this is a distinct tree whose pool
        // indices happen to start out identical to the original's, but a
        // `NodeId` drawn from one must never validate against the other.
        Tree {
            root: self.root,
            pool: self.pool.clone(),
            tag: NEXT_TREE_TAG.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl<K: Ord + std::fmt::Display, V, A: Augment> Tree<K, V, A> {
    /// Prints the tree sideways, red keys in red, for ad hoc debugging.
    pub fn pretty_print(&self) {
        self.pretty_print_at(self.root, 0);
    }

    fn pretty_print_at(&self, idx: u32, depth: usize) {
        use colored::Colorize;

        if idx == SENTINEL {
            return;
        }
        self.pretty_print_at(self.get_right(idx), depth + 1);
        let indent = "  ".repeat(depth);
        let key = self.node(idx).key.to_string();
        let label = if self.is_red(idx) { key.red() } else { key.normal() };
        println!("{indent}{label}");
        self.pretty_print_at(self.get_left(idx), depth + 1);
    }
}

/// Insertion helper shared by `RankMap`/`SampleMap`: descends from the
/// root comparing keys and reports where `key` lands — already present,
/// the sole node in an empty tree, or the vacant slot to attach a new
/// leaf to (together with the root-to-parent path, for the caller's
/// post-attach augmentation refresh).
pub(crate) fn descend_for_insert<K: Ord, V, A: Augment>(
    tree: &Tree<K, V, A>,
    key: &K,
) -> InsertSite {
    let mut path = Vec::new();
    let mut current = tree.root;
    if current == SENTINEL {
        return InsertSite::Root;
    }
    loop {
        path.push(current);
        let node_key = &tree.node(current).key;
        let dir = match key.cmp(node_key) {
            std::cmp::Ordering::Less => Dir::Left,
            std::cmp::Ordering::Greater => Dir::Right,
            std::cmp::Ordering::Equal => return InsertSite::Existing(current),
        };
        let child = tree.get_child(current, dir);
        if child == SENTINEL {
            return InsertSite::Vacant { path, parent: current, dir };
        }
        current = child;
    }
}

pub(crate) enum InsertSite {
    Root,
    Existing(u32),
    Vacant { path: Vec<u32>, parent: u32, dir: Dir },
}
