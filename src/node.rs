//! The plain node record stored in the pool, plus the small link-side
//! vocabulary (`Color`, `Dir`) the tree engine operates on.

use crate::allocator::SENTINEL;
use crate::augment::Augment;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

/// Which child link a rotation or navigation step is operating on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Dir {
    Left,
    Right,
}

impl Dir {
    pub fn opposite(self) -> Dir {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

pub struct TreeNode<K, V, A: Augment> {
    pub key: K,
    pub value: V,
    pub color: Color,
    pub parent: u32,
    pub left: u32,
    pub right: u32,
    pub aug: A,
}

impl<K, V, A: Augment> TreeNode<K, V, A> {
    pub fn new(key: K, value: V, aug: A) -> Self {
        TreeNode {
            key,
            value,
            color: Color::Red,
            parent: SENTINEL,
            left: SENTINEL,
            right: SENTINEL,
            aug,
        }
    }
}

impl<K: Clone, V: Clone, A: Augment> Clone for TreeNode<K, V, A> {
    fn clone(&self) -> Self {
        TreeNode {
            key: self.key.clone(),
            value: self.value.clone(),
            color: self.color,
            parent: self.parent,
            left: self.left,
            right: self.right,
            aug: self.aug,
        }
    }
}
