//! Consistency checks for the tree invariants, independent of the
//! mutation code path that built the tree. Grounded in the teacher's
//! `is_valid_red_black_tree` — useful in tests and as a debugging aid,
//! not on any hot path.

use crate::allocator::SENTINEL;
use crate::augment::{Augment, CountAugment, WeightAugment};
use crate::rank_map::RankMap;
use crate::sample_map::SampleMap;
use crate::tree::Tree;
use crate::weight::Weight;

/// `true` if every red node has only black children and every
/// root-to-leaf path carries the same number of black nodes. Short
/// circuits on the first violation found, so it never explains *why* a
/// tree is invalid — just whether it is.
pub fn is_red_black_valid<K: Ord, V, A: Augment>(tree: &Tree<K, V, A>) -> bool {
    if tree.is_empty() {
        return true;
    }
    tree.is_black(tree.root) && black_height(tree, tree.root).is_some()
}

fn black_height<K: Ord, V, A: Augment>(tree: &Tree<K, V, A>, idx: u32) -> Option<usize> {
    if idx == SENTINEL {
        return Some(1);
    }
    if tree.is_red(idx) && (tree.is_red(tree.get_left(idx)) || tree.is_red(tree.get_right(idx))) {
        return None;
    }
    let left_bh = black_height(tree, tree.get_left(idx))?;
    let right_bh = black_height(tree, tree.get_right(idx))?;
    if left_bh != right_bh {
        return None;
    }
    Some(left_bh + usize::from(tree.is_black(idx)))
}

fn count_consistent<K: Ord, V>(tree: &Tree<K, V, CountAugment>, idx: u32) -> Option<u32> {
    if idx == SENTINEL {
        return Some(0);
    }
    let left = count_consistent(tree, tree.get_left(idx))?;
    let right = count_consistent(tree, tree.get_right(idx))?;
    let expected = 1 + left + right;
    (tree.node(idx).aug.subtree_size == expected).then_some(expected)
}

fn weight_consistent<K: Ord, V, W: Weight>(
    tree: &Tree<K, V, WeightAugment<W>>,
    idx: u32,
    total: W,
) -> Option<W> {
    if idx == SENTINEL {
        return Some(W::default());
    }
    let left = weight_consistent(tree, tree.get_left(idx), total)?;
    let right = weight_consistent(tree, tree.get_right(idx), total)?;
    let own = tree.node(idx).aug.weight;
    let expected = own + left + right;
    let actual = tree.node(idx).aug.subtree_weight;
    let diff = if actual >= expected { actual - expected } else { expected - actual };
    (diff <= W::tolerance(total)).then_some(expected)
}

/// `true` if an in-order walk of `idx`'s subtree visits strictly
/// increasing keys, bounded by `lower`/`upper` (the nearest ancestor keys
/// that constrain this subtree from below/above — `None` means
/// unbounded). Violating this is a corrupted BST, independent of color.
fn bst_ordered<K: Ord, V, A: Augment>(
    tree: &Tree<K, V, A>,
    idx: u32,
    lower: Option<&K>,
    upper: Option<&K>,
) -> bool {
    if idx == SENTINEL {
        return true;
    }
    let key = &tree.node(idx).key;
    if lower.is_some_and(|l| key <= l) || upper.is_some_and(|u| key >= u) {
        return false;
    }
    bst_ordered(tree, tree.get_left(idx), lower, Some(key))
        && bst_ordered(tree, tree.get_right(idx), Some(key), upper)
}

/// `true` if every node's children point back at it as their parent.
/// Catches a transplant/rotation bug that rewires a child pointer without
/// updating the other side.
fn parent_consistent<K: Ord, V, A: Augment>(tree: &Tree<K, V, A>, idx: u32) -> bool {
    if idx == SENTINEL {
        return true;
    }
    let left = tree.get_left(idx);
    let right = tree.get_right(idx);
    (left == SENTINEL || tree.get_parent(left) == idx)
        && (right == SENTINEL || tree.get_parent(right) == idx)
        && parent_consistent(tree, left)
        && parent_consistent(tree, right)
}

/// Checks every structural invariant that doesn't depend on the
/// augmentation: BST key ordering, red-black shape, and parent-child
/// pointer consistency. Augmentation correctness (subtree size/weight) is
/// checked separately by [`rank_map_consistent`]/[`sample_map_consistent`],
/// since it's specific to which `Augment` the tree carries.
pub fn is_consistent<K: Ord, V, A: Augment>(tree: &Tree<K, V, A>) -> bool {
    is_red_black_valid(tree)
        && bst_ordered(tree, tree.root, None, None)
        && parent_consistent(tree, tree.root)
}

/// Checks the full invariant set for a [`RankMap`]: shape, BST order,
/// parent consistency, and that every node's `subtree_size` matches its
/// actual subtree.
pub fn rank_map_consistent<K: Ord, V>(map: &RankMap<K, V>) -> bool {
    let tree = map.tree_ref();
    is_consistent(tree) && count_consistent(tree, tree.root).is_some()
}

/// Checks the full invariant set for a [`SampleMap`]: shape, BST order,
/// parent consistency, and that every node's `subtree_weight` matches the
/// sum of its own weight and its children's, within [`Weight::tolerance`].
pub fn sample_map_consistent<K: Ord, V, W: Weight>(map: &SampleMap<K, V, W>) -> bool {
    let tree = map.tree_ref();
    if !is_consistent(tree) {
        return false;
    }
    weight_consistent(tree, tree.root, map.total_weight()).is_some()
}
