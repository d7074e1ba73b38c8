//! An order-statistic map: an ordinary sorted key/value map that also
//! answers "what's the entry at sorted position `i`?" and "what position
//! is this key at?" in `O(log n)`, via a red-black tree augmented with
//! subtree sizes.

use crate::allocator::SENTINEL;
use crate::augment::CountAugment;
use crate::cursor::{CursorMut, NodeId};
use crate::error::{Error, Result};
use crate::node::{Color, Dir, TreeNode};
use crate::tree::{descend_for_insert, InsertSite, Tree};

/// A cursor over a [`RankMap`], specialized to the count augmentation —
/// exposes [`Cursor::rank`](crate::cursor::Cursor::rank) in addition to
/// the shared navigation/dereference surface.
pub type Cursor<'a, K, V> = crate::cursor::Cursor<'a, K, V, CountAugment>;

pub struct RankMap<K: Ord, V> {
    tree: Tree<K, V, CountAugment>,
}

impl<K: Ord, V> RankMap<K, V> {
    pub fn new() -> Self {
        RankMap { tree: Tree::new() }
    }

    pub fn with_slab_size(slab_size: usize) -> Self {
        RankMap {
            tree: Tree::with_slab_size(slab_size),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn find_index(&self, key: &K) -> u32 {
        let mut idx = self.tree.root;
        while idx != SENTINEL {
            idx = match key.cmp(&self.tree.node(idx).key) {
                std::cmp::Ordering::Less => self.tree.get_left(idx),
                std::cmp::Ordering::Greater => self.tree.get_right(idx),
                std::cmp::Ordering::Equal => return idx,
            };
        }
        SENTINEL
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.find_index(key) != SENTINEL
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let idx = self.find_index(key);
        (idx != SENTINEL).then(|| &self.tree.node(idx).value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let idx = self.find_index(key);
        if idx == SENTINEL {
            None
        } else {
            Some(&mut self.tree.node_mut(idx).value)
        }
    }

    pub fn cursor(&self, key: &K) -> Option<Cursor<'_, K, V>> {
        let idx = self.find_index(key);
        (idx != SENTINEL).then(|| Cursor::new(&self.tree, idx))
    }

    pub fn cursor_mut(&mut self, key: &K) -> Option<CursorMut<'_, K, V, CountAugment>> {
        let idx = self.find_index(key);
        if idx == SENTINEL {
            None
        } else {
            Some(CursorMut::new(&mut self.tree, idx))
        }
    }

    pub fn first(&self) -> Option<Cursor<'_, K, V>> {
        if self.tree.is_empty() {
            return None;
        }
        Some(Cursor::new(&self.tree, self.tree.find_min(self.tree.root)))
    }

    pub fn last(&self) -> Option<Cursor<'_, K, V>> {
        if self.tree.is_empty() {
            return None;
        }
        Some(Cursor::new(&self.tree, self.tree.find_max(self.tree.root)))
    }

    /// Inserts `key`/`value`. If `key` was already present, its value is
    /// overwritten in place (the node's identity and the tree's shape are
    /// left untouched) and the returned flag is `false`; otherwise a new
    /// entry is attached and the flag is `true`. Either way the cursor
    /// refers to `key`'s entry after the call.
    pub fn insert(&mut self, key: K, value: V) -> Result<(Cursor<'_, K, V>, bool)> {
        let (idx, inserted) = match descend_for_insert(&self.tree, &key) {
            InsertSite::Root => {
                let idx = self
                    .tree
                    .pool
                    .acquire(TreeNode::new(key, value, CountAugment::default()))?;
                self.tree.node_mut(idx).color = Color::Black;
                self.tree.root = idx;
                self.tree.refresh(idx);
                (idx, true)
            }
            InsertSite::Existing(idx) => {
                self.tree.node_mut(idx).value = value;
                (idx, false)
            }
            InsertSite::Vacant { path, parent, dir } => {
                let idx = self
                    .tree
                    .pool
                    .acquire(TreeNode::new(key, value, CountAugment::default()))?;
                self.tree.connect(parent, idx, dir);
                self.tree.refresh(idx);
                for ancestor in path.iter().rev() {
                    self.tree.refresh(*ancestor);
                }
                self.tree.fix_insert(idx);
                (idx, true)
            }
        };
        Ok((Cursor::new(&self.tree, idx), inserted))
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.find_index(key);
        if idx == SENTINEL {
            return None;
        }
        let freed = self.tree.remove_structural(idx);
        let (_, value) = self.tree.release(freed);
        Some(value)
    }

    /// Removes the entry `id` points at, the cursor-addressed counterpart
    /// to [`RankMap::remove`]. Fails with [`Error::LogicError`] if `id`
    /// was drawn from a different map, or if the entry it once named has
    /// since been removed (directly, or by a duplicate-key insert — a
    /// stale `NodeId` is never silently reinterpreted as some other
    /// entry).
    pub fn remove_cursor(&mut self, id: NodeId) -> Result<V> {
        if !id.is_valid_for(&self.tree) {
            return Err(Error::LogicError(
                "NodeId does not refer to a live entry in this map".into(),
            ));
        }
        let freed = self.tree.remove_structural(id.index);
        let (_, value) = self.tree.release(freed);
        Ok(value)
    }

    /// This entry's 0-based position in sorted key order, or `None` if
    /// `key` isn't present.
    pub fn rank_of(&self, key: &K) -> Option<usize> {
        let idx = self.find_index(key);
        (idx != SENTINEL).then(|| rank_of_index(&self.tree, idx))
    }

    /// The entry at sorted position `rank` (0-based). Out-of-range `rank`
    /// is a precondition violation — a programmer bug, not a "not found"
    /// lookup — and is reported as [`Error::RangeError`] rather than
    /// `None`, unlike [`RankMap::get`]/[`RankMap::cursor`].
    pub fn find_by_rank(&self, mut rank: usize) -> Result<Cursor<'_, K, V>> {
        if rank >= self.tree.len() {
            return Err(Error::RangeError(format!(
                "rank {rank} out of range for map of length {}",
                self.tree.len()
            )));
        }
        let mut idx = self.tree.root;
        loop {
            let left = self.tree.get_left(idx);
            let left_size = subtree_size(&self.tree, left);
            if rank < left_size {
                idx = left;
            } else if rank == left_size {
                return Ok(Cursor::new(&self.tree, idx));
            } else {
                rank -= left_size + 1;
                idx = self.tree.get_right(idx);
            }
        }
    }

    pub(crate) fn tree_ref(&self) -> &Tree<K, V, CountAugment> {
        &self.tree
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            tree: &self.tree,
            front: if self.tree.is_empty() {
                SENTINEL
            } else {
                self.tree.find_min(self.tree.root)
            },
            back: if self.tree.is_empty() {
                SENTINEL
            } else {
                self.tree.find_max(self.tree.root)
            },
            done: self.tree.is_empty(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let front = if self.tree.is_empty() {
            SENTINEL
        } else {
            self.tree.find_min(self.tree.root)
        };
        let back = if self.tree.is_empty() {
            SENTINEL
        } else {
            self.tree.find_max(self.tree.root)
        };
        let done = self.tree.is_empty();
        IterMut { tree: &mut self.tree, front, back, done }
    }
}

#[inline]
fn subtree_size<K: Ord, V>(tree: &Tree<K, V, CountAugment>, idx: u32) -> usize {
    if idx == SENTINEL {
        0
    } else {
        tree.node(idx).aug.subtree_size as usize
    }
}

pub(crate) fn rank_of_index<K: Ord, V>(tree: &Tree<K, V, CountAugment>, idx: u32) -> usize {
    let mut rank = subtree_size(tree, tree.get_left(idx));
    let mut node = idx;
    let mut parent = tree.get_parent(node);
    while parent != SENTINEL {
        if tree.child_dir(parent, node) == Dir::Right {
            rank += subtree_size(tree, tree.get_left(parent)) + 1;
        }
        node = parent;
        parent = tree.get_parent(node);
    }
    rank
}

impl<K: Ord + std::fmt::Display, V> RankMap<K, V> {
    pub fn pretty_print(&self) {
        self.tree.pretty_print();
    }
}

impl<K: Ord, V> Default for RankMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, V: Clone> Clone for RankMap<K, V> {
    fn clone(&self) -> Self {
        RankMap {
            tree: self.tree.clone(),
        }
    }
}

impl<K: Ord + std::fmt::Debug, V: std::fmt::Debug> std::fmt::Debug for RankMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter().map(|(k, v)| (k, v))).finish()
    }
}

impl<K: Ord, V> std::iter::FromIterator<(K, V)> for RankMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = RankMap::new();
        map.extend(iter);
        map
    }
}

impl<K: Ord, V> Extend<(K, V)> for RankMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v).expect("allocator exhausted during extend");
        }
    }
}

pub struct Iter<'a, K: Ord, V> {
    tree: &'a Tree<K, V, CountAugment>,
    front: u32,
    back: u32,
    done: bool,
}

impl<'a, K: Ord, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let node = self.tree.node(self.front);
        if self.front == self.back {
            self.done = true;
        } else {
            self.front = self.tree.successor(self.front);
        }
        Some((&node.key, &node.value))
    }
}

impl<'a, K: Ord, V> DoubleEndedIterator for Iter<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let node = self.tree.node(self.back);
        if self.front == self.back {
            self.done = true;
        } else {
            self.back = self.tree.predecessor(self.back);
        }
        Some((&node.key, &node.value))
    }
}

impl<'a, K: Ord, V> IntoIterator for &'a RankMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// In-order mutable iterator. Keys stay immutable (they determine tree
/// position); values are mutable in place.
pub struct IterMut<'a, K: Ord, V> {
    tree: &'a mut Tree<K, V, CountAugment>,
    front: u32,
    back: u32,
    done: bool,
}

impl<'a, K: Ord, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let idx = self.front;
        if self.front == self.back {
            self.done = true;
        } else {
            self.front = self.tree.successor(self.front);
        }
        // SAFETY: `idx` is visited at most once across the lifetime of this
        // iterator (front/back only ever advance towards each other, and
        // `done` stops the walk at the meeting point), so the extended
        // `'a` borrow never aliases another live `&mut V` handed out by
        // this iterator. Mirrors the teacher's raw-pointer-into-pool
        // `RedBlackTreeIteratorMut`.
        let node = unsafe { &mut *(self.tree.node_mut(idx) as *mut TreeNode<K, V, CountAugment>) };
        Some((&node.key, &mut node.value))
    }
}

impl<'a, K: Ord, V> DoubleEndedIterator for IterMut<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let idx = self.back;
        if self.front == self.back {
            self.done = true;
        } else {
            self.back = self.tree.predecessor(self.back);
        }
        // SAFETY: see `next`.
        let node = unsafe { &mut *(self.tree.node_mut(idx) as *mut TreeNode<K, V, CountAugment>) };
        Some((&node.key, &mut node.value))
    }
}

impl<'a, K: Ord, V> IntoIterator for &'a mut RankMap<K, V> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn insert_overwrites_existing_value() {
        let mut map = RankMap::new();
        assert!(map.insert(1, "a").unwrap().1);
        assert!(!map.insert(1, "b").unwrap().1);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&1), Some(&"b"));
    }

    #[test]
    fn insert_returns_cursor_on_the_inserted_entry() {
        let mut map = RankMap::new();
        let (cursor, inserted) = map.insert(5, "five").unwrap();
        assert!(inserted);
        assert_eq!(cursor.key(), &5);
        assert_eq!(cursor.value(), &"five");
    }

    #[test]
    fn find_by_rank_matches_sorted_order() {
        let mut map = RankMap::new();
        for key in [5, 1, 9, 3, 7] {
            map.insert(key, key * 10).unwrap();
        }
        let sorted = [1, 3, 5, 7, 9];
        for (rank, &key) in sorted.iter().enumerate() {
            let cursor = map.find_by_rank(rank).unwrap();
            assert_eq!((cursor.key(), cursor.value()), (&key, &(key * 10)));
        }
        assert!(map.find_by_rank(5).is_err());
    }

    #[test]
    fn remove_cursor_matches_remove_by_key() {
        let mut map = RankMap::new();
        map.insert(1, "a").unwrap();
        map.insert(2, "b").unwrap();
        let id = map.cursor(&1).unwrap().id();
        assert_eq!(map.remove_cursor(id).unwrap(), "a");
        assert!(!map.contains_key(&1));
        assert!(map.remove_cursor(id).is_err());
    }

    #[test]
    fn remove_cursor_rejects_id_from_a_different_map() {
        let mut a = RankMap::new();
        a.insert(1, "a").unwrap();
        let id = a.cursor(&1).unwrap().id();

        let mut b = RankMap::new();
        b.insert(1, "b").unwrap();
        assert!(b.remove_cursor(id).is_err());
    }

    #[test]
    fn rank_of_round_trips_with_find_by_rank() {
        let mut map = RankMap::new();
        for key in 0..50 {
            map.insert(key, ()).unwrap();
        }
        for key in 0..50 {
            let rank = map.rank_of(&key).unwrap();
            assert_eq!(map.find_by_rank(rank).unwrap().key(), &key);
        }
    }

    #[test]
    fn cross_check_against_btreemap_with_random_churn() {
        use rand::seq::SliceRandom;

        let mut rng = rand::thread_rng();
        let mut map = RankMap::new();
        let mut model = BTreeMap::new();

        let mut keys: Vec<i32> = (0..200).collect();
        keys.shuffle(&mut rng);

        for &key in &keys {
            map.insert(key, key * 2).unwrap();
            model.insert(key, key * 2);
        }

        let mut to_remove = keys.clone();
        to_remove.shuffle(&mut rng);
        for &key in to_remove.iter().take(80) {
            assert_eq!(map.remove(&key), model.remove(&key));
        }

        assert_eq!(map.len(), model.len());
        let expected: Vec<_> = model.iter().collect();
        let actual: Vec<_> = map.iter().collect();
        assert_eq!(actual, expected);

        for (rank, (key, _)) in model.iter().enumerate() {
            assert_eq!(map.rank_of(key), Some(rank));
            assert_eq!(map.find_by_rank(rank).unwrap().key(), key);
        }
    }

    #[test]
    fn double_ended_iterator_meets_in_the_middle() {
        let mut map = RankMap::new();
        for key in 0..10 {
            map.insert(key, key).unwrap();
        }
        let mut iter = map.iter();
        let mut front = Vec::new();
        let mut back = Vec::new();
        for _ in 0..5 {
            front.push(*iter.next().unwrap().0);
            back.push(*iter.next_back().unwrap().0);
        }
        assert_eq!(iter.next(), None);
        back.reverse();
        let mut combined = front;
        combined.extend(back);
        assert_eq!(combined, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn from_iterator_builds_same_tree_as_sequential_insert() {
        let pairs: Vec<(i32, i32)> = (0..30).map(|k| (k, k * k)).collect();
        let map: RankMap<i32, i32> = pairs.iter().cloned().collect();
        for (k, v) in &pairs {
            assert_eq!(map.get(k), Some(v));
        }
        assert_eq!(map.len(), 30);
    }

    #[test]
    fn iter_mut_updates_values_in_place() {
        let mut map = RankMap::new();
        for key in 0..20 {
            map.insert(key, key).unwrap();
        }
        for (_, value) in map.iter_mut() {
            *value *= 10;
        }
        for key in 0..20 {
            assert_eq!(map.get(&key), Some(&(key * 10)));
        }
    }
}
