//! A weighted sampling map: a key/value map where each entry carries a
//! weight and `sample` draws a random entry with probability
//! proportional to its weight, in `O(log n)`, via a red-black tree
//! augmented with subtree weight sums.

use rand::Rng;

use crate::allocator::SENTINEL;
use crate::augment::WeightAugment;
use crate::cursor::{CursorMut, NodeId};
use crate::error::{Error, Result};
use crate::node::{Color, TreeNode};
use crate::tree::{descend_for_insert, InsertSite, Tree};
use crate::weight::Weight;

/// A cursor over a [`SampleMap`], specialized to the weight augmentation.
pub type Cursor<'a, K, V, W> = crate::cursor::Cursor<'a, K, V, WeightAugment<W>>;

pub struct SampleMap<K: Ord, V, W: Weight> {
    tree: Tree<K, V, WeightAugment<W>>,
}

impl<K: Ord, V, W: Weight> SampleMap<K, V, W> {
    pub fn new() -> Self {
        SampleMap { tree: Tree::new() }
    }

    pub fn with_slab_size(slab_size: usize) -> Self {
        SampleMap {
            tree: Tree::with_slab_size(slab_size),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// The sum of every entry's weight. `O(1)`.
    pub fn total_weight(&self) -> W {
        if self.tree.root == SENTINEL {
            W::default()
        } else {
            self.tree.node(self.tree.root).aug.subtree_weight
        }
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

    pub fn weight_of(&self, key: &K) -> Option<W> {
        let idx = self.find_index(key);
        (idx != SENTINEL).then(|| self.tree.node(idx).aug.weight)
    }

    pub fn cursor(&self, key: &K) -> Option<Cursor<'_, K, V, W>> {
        let idx = self.find_index(key);
        (idx != SENTINEL).then(|| Cursor::new(&self.tree, idx))
    }

    pub fn cursor_mut(&mut self, key: &K) -> Option<CursorMut<'_, K, V, WeightAugment<W>>> {
        let idx = self.find_index(key);
        if idx == SENTINEL {
            None
        } else {
            Some(CursorMut::new(&mut self.tree, idx))
        }
    }

    /// Inserts `key`/`value` with the given `weight`. If `key` was
    /// already present, its value and weight are both replaced in place
    /// (the node's identity and tree position are untouched) and the
    /// returned flag is `false`; otherwise a new entry is attached and
    /// the flag is `true`.
    pub fn insert(&mut self, key: K, value: V, weight: W) -> Result<(Cursor<'_, K, V, W>, bool)> {
        let (idx, inserted) = match descend_for_insert(&self.tree, &key) {
            InsertSite::Root => {
                let idx = self.tree.pool.acquire(TreeNode::new(
                    key,
                    value,
                    WeightAugment { weight, subtree_weight: W::default() },
                ))?;
                self.tree.node_mut(idx).color = Color::Black;
                self.tree.root = idx;
                self.tree.refresh(idx);
                (idx, true)
            }
            InsertSite::Existing(idx) => {
                let node = self.tree.node_mut(idx);
                node.value = value;
                node.aug.weight = weight;
                self.tree.refresh_to_root(idx);
                (idx, false)
            }
            InsertSite::Vacant { path, parent, dir } => {
                let idx = self.tree.pool.acquire(TreeNode::new(
                    key,
                    value,
                    WeightAugment { weight, subtree_weight: W::default() },
                ))?;
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

    /// Replaces the weight of the entry `id` points at, returning the old
    /// one. Does not touch the stored value. Cursor-addressed rather than
    /// key-addressed: a caller that already holds a cursor (say, from
    /// `sample`) doesn't need to re-look-up the key it just found, and a
    /// stale or foreign `id` is rejected rather than silently becoming a
    /// no-op.
    pub fn set_weight(&mut self, id: NodeId, weight: W) -> Result<W> {
        if !id.is_valid_for(&self.tree) {
            return Err(Error::LogicError(
                "NodeId does not refer to a live entry in this map".into(),
            ));
        }
        let old = std::mem::replace(&mut self.tree.node_mut(id.index).aug.weight, weight);
        self.tree.refresh_to_root(id.index);
        Ok(old)
    }

    pub fn remove(&mut self, key: &K) -> Option<(V, W)> {
        let idx = self.find_index(key);
        if idx == SENTINEL {
            return None;
        }
        let freed = self.tree.remove_structural(idx);
        let weight = self.tree.node(freed).aug.weight;
        let (_, value) = self.tree.release(freed);
        Some((value, weight))
    }

    /// Removes the entry `id` points at, the cursor-addressed counterpart
    /// to [`SampleMap::remove`]. See [`RankMap::remove_cursor`](crate::rank_map::RankMap::remove_cursor)
    /// for the staleness rules.
    pub fn remove_cursor(&mut self, id: NodeId) -> Result<(V, W)> {
        if !id.is_valid_for(&self.tree) {
            return Err(Error::LogicError(
                "NodeId does not refer to a live entry in this map".into(),
            ));
        }
        let freed = self.tree.remove_structural(id.index);
        let weight = self.tree.node(freed).aug.weight;
        let (_, value) = self.tree.release(freed);
        Ok((value, weight))
    }

    /// Finds the entry whose weight interval `[cumulative, cumulative +
    /// weight)` contains `position`, where `cumulative` is the sum of
    /// every strictly-smaller key's weight. `position` must be in
    /// `[0, total_weight())`; values past the end (within
    /// [`Weight::tolerance`] of `total_weight()`, to absorb floating
    /// point drift) resolve to the last entry.
    pub fn sample_by_position(&self, mut position: W) -> Option<Cursor<'_, K, V, W>> {
        if self.tree.is_empty() {
            return None;
        }
        let total = self.total_weight();
        let tolerance = W::tolerance(total);
        let mut idx = self.tree.root;
        loop {
            let left = self.tree.get_left(idx);
            let left_weight = subtree_weight(&self.tree, left);
            if position < left_weight {
                idx = left;
                continue;
            }
            position = position - left_weight;
            let node_weight = self.tree.node(idx).aug.weight;
            let right = self.tree.get_right(idx);
            if position < node_weight || (right == SENTINEL && position <= node_weight + tolerance) {
                return Some(Cursor::new(&self.tree, idx));
            }
            position = position - node_weight;
            if right == SENTINEL {
                // Floating point drift pushed `position` past every
                // interval; fall back to the rightmost entry rather than
                // walking into the sentinel.
                return self.last();
            }
            idx = right;
        }
    }

    /// `sample_by_position(total_weight() * u)` for `u` in `[0, 1]`.
    pub fn sample_scaled(&self, u: f64) -> Option<Cursor<'_, K, V, W>> {
        let total = self.total_weight();
        self.sample_by_position(W::scale(total, u.clamp(0.0, 1.0)))
    }

    /// Draws one entry with probability proportional to its weight.
    /// `None` if the map is empty or every weight is zero.
    pub fn sample(&self, rng: &mut impl Rng) -> Option<Cursor<'_, K, V, W>> {
        let total = self.total_weight();
        if self.tree.is_empty() || total.is_zero() {
            return None;
        }
        let position = rng.gen_range(W::default()..total);
        self.sample_by_position(position)
    }

    pub fn first(&self) -> Option<Cursor<'_, K, V, W>> {
        if self.tree.is_empty() {
            return None;
        }
        Some(Cursor::new(&self.tree, self.tree.find_min(self.tree.root)))
    }

    pub fn last(&self) -> Option<Cursor<'_, K, V, W>> {
        if self.tree.is_empty() {
            return None;
        }
        Some(Cursor::new(&self.tree, self.tree.find_max(self.tree.root)))
    }

    pub(crate) fn tree_ref(&self) -> &Tree<K, V, WeightAugment<W>> {
        &self.tree
    }

    pub fn iter(&self) -> Iter<'_, K, V, W> {
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

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V, W> {
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
fn subtree_weight<K: Ord, V, W: Weight>(tree: &Tree<K, V, WeightAugment<W>>, idx: u32) -> W {
    if idx == SENTINEL {
        W::default()
    } else {
        tree.node(idx).aug.subtree_weight
    }
}

impl<K: Ord + std::fmt::Display, V, W: Weight> SampleMap<K, V, W> {
    pub fn pretty_print(&self) {
        self.tree.pretty_print();
    }
}

impl<K: Ord, V, W: Weight> Default for SampleMap<K, V, W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, V: Clone, W: Weight> Clone for SampleMap<K, V, W> {
    fn clone(&self) -> Self {
        SampleMap {
            tree: self.tree.clone(),
        }
    }
}

impl<K: Ord + std::fmt::Debug, V: std::fmt::Debug, W: Weight + std::fmt::Debug> std::fmt::Debug
    for SampleMap<K, V, W>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl<K: Ord, V, W: Weight> std::iter::FromIterator<(K, V, W)> for SampleMap<K, V, W> {
    fn from_iter<I: IntoIterator<Item = (K, V, W)>>(iter: I) -> Self {
        let mut map = SampleMap::new();
        for (k, v, w) in iter {
            map.insert(k, v, w).expect("allocator exhausted during collect");
        }
        map
    }
}

impl<K: Ord, V, W: Weight> Extend<(K, V, W)> for SampleMap<K, V, W> {
    fn extend<I: IntoIterator<Item = (K, V, W)>>(&mut self, iter: I) {
        for (k, v, w) in iter {
            self.insert(k, v, w).expect("allocator exhausted during extend");
        }
    }
}

pub struct Iter<'a, K: Ord, V, W: Weight> {
    tree: &'a Tree<K, V, WeightAugment<W>>,
    front: u32,
    back: u32,
    done: bool,
}

impl<'a, K: Ord, V, W: Weight> Iterator for Iter<'a, K, V, W> {
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

impl<'a, K: Ord, V, W: Weight> DoubleEndedIterator for Iter<'a, K, V, W> {
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

impl<'a, K: Ord, V, W: Weight> IntoIterator for &'a SampleMap<K, V, W> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, W>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct IterMut<'a, K: Ord, V, W: Weight> {
    tree: &'a mut Tree<K, V, WeightAugment<W>>,
    front: u32,
    back: u32,
    done: bool,
}

impl<'a, K: Ord, V, W: Weight> Iterator for IterMut<'a, K, V, W> {
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
        // SAFETY: see `rank_map::IterMut::next`.
        let node =
            unsafe { &mut *(self.tree.node_mut(idx) as *mut TreeNode<K, V, WeightAugment<W>>) };
        Some((&node.key, &mut node.value))
    }
}

impl<'a, K: Ord, V, W: Weight> DoubleEndedIterator for IterMut<'a, K, V, W> {
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
        // SAFETY: see `rank_map::IterMut::next`.
        let node =
            unsafe { &mut *(self.tree.node_mut(idx) as *mut TreeNode<K, V, WeightAugment<W>>) };
        Some((&node.key, &mut node.value))
    }
}

impl<'a, K: Ord, V, W: Weight> IntoIterator for &'a mut SampleMap<K, V, W> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V, W>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn total_weight_tracks_inserts_and_removals() {
        let mut map: SampleMap<&str, (), u32> = SampleMap::new();
        map.insert("a", (), 5).unwrap();
        map.insert("b", (), 3).unwrap();
        assert_eq!(map.total_weight(), 8);
        map.remove(&"a");
        assert_eq!(map.total_weight(), 3);
    }

    #[test]
    fn set_weight_updates_ancestor_sums() {
        let mut map: SampleMap<i32, (), u32> = SampleMap::new();
        for key in 0..20 {
            map.insert(key, (), 1).unwrap();
        }
        assert_eq!(map.total_weight(), 20);
        let id = map.cursor(&10).unwrap().id();
        let old = map.set_weight(id, 50).unwrap();
        assert_eq!(old, 1);
        assert_eq!(map.total_weight(), 69);
        assert_eq!(map.weight_of(&10), Some(50));
    }

    #[test]
    fn set_weight_rejects_stale_id() {
        let mut map: SampleMap<i32, (), u32> = SampleMap::new();
        map.insert(1, (), 10).unwrap();
        let id = map.cursor(&1).unwrap().id();
        map.remove(&1);
        map.insert(2, (), 5).unwrap();
        assert!(map.set_weight(id, 99).is_err());
    }

    #[test]
    fn remove_cursor_matches_remove_by_key() {
        let mut map: SampleMap<i32, &str, u32> = SampleMap::new();
        map.insert(1, "a", 10).unwrap();
        map.insert(2, "b", 20).unwrap();
        let id = map.cursor(&1).unwrap().id();
        let (value, weight) = map.remove_cursor(id).unwrap();
        assert_eq!((value, weight), ("a", 10));
        assert!(!map.contains_key(&1));
        assert!(map.remove_cursor(id).is_err());
    }

    #[test]
    fn sample_by_position_resolves_to_expected_bucket() {
        let mut map: SampleMap<&str, (), u32> = SampleMap::new();
        map.insert("a", (), 10).unwrap();
        map.insert("b", (), 20).unwrap();
        map.insert("c", (), 5).unwrap();
        // cumulative buckets (sorted by key: a,b,c): a=[0,10) b=[10,30) c=[30,35)
        assert_eq!(map.sample_by_position(0).unwrap().key(), &"a");
        assert_eq!(map.sample_by_position(9).unwrap().key(), &"a");
        assert_eq!(map.sample_by_position(10).unwrap().key(), &"b");
        assert_eq!(map.sample_by_position(29).unwrap().key(), &"b");
        assert_eq!(map.sample_by_position(30).unwrap().key(), &"c");
        assert_eq!(map.sample_by_position(34).unwrap().key(), &"c");
    }

    #[test]
    fn sample_distribution_roughly_tracks_weight() {
        let mut map: SampleMap<&str, (), u32> = SampleMap::new();
        map.insert("heavy", (), 90).unwrap();
        map.insert("light", (), 10).unwrap();

        let mut rng = StdRng::seed_from_u64(42);
        let mut heavy_count = 0;
        let trials = 2000;
        for _ in 0..trials {
            if map.sample(&mut rng).unwrap().key() == &"heavy" {
                heavy_count += 1;
            }
        }
        let ratio = heavy_count as f64 / trials as f64;
        assert!((ratio - 0.9).abs() < 0.05, "ratio was {ratio}");
    }

    #[test]
    fn zero_total_weight_yields_no_sample() {
        let mut map: SampleMap<&str, (), u32> = SampleMap::new();
        map.insert("a", (), 0).unwrap();
        map.insert("b", (), 0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(map.sample(&mut rng).is_none());
    }

    #[test]
    fn remove_with_two_children_preserves_total_weight() {
        let mut map: SampleMap<i32, (), u32> = SampleMap::new();
        for key in [10, 5, 15, 3, 7, 12, 20, 6, 8] {
            map.insert(key, (), key as u32).unwrap();
        }
        let total_before: u32 = [10, 5, 15, 3, 7, 12, 20, 6, 8].iter().sum();
        assert_eq!(map.total_weight(), total_before);
        map.remove(&5);
        assert_eq!(map.total_weight(), total_before - 5);
        assert_eq!(map.len(), 8);
    }

    #[test]
    fn float_weights_sample_by_scaled_position() {
        let mut map: SampleMap<&str, (), f64> = SampleMap::new();
        map.insert("a", (), 1.0).unwrap();
        map.insert("b", (), 1.0).unwrap();
        map.insert("c", (), 2.0).unwrap();
        assert_eq!(map.sample_scaled(0.0).unwrap().key(), &"a");
        assert_eq!(map.sample_scaled(1.0).unwrap().key(), &"c");
    }
}
