//! A growable, index-stable slab allocator for fixed-shape node records.
//!
//! This is the arena-plus-index rendering of a pointer-stable pool: cells
//! live in a `Vec` that only ever grows, so an index handed out by
//! `acquire` stays valid until the matching `release`. The free list is
//! threaded through the unused cells themselves, exactly like a classic
//! pool allocator's intrusive free stack, just addressed by `u32` index
//! instead of raw pointer.

use crate::error::{Error, Result};

/// Reserved index meaning "no node". Never handed out by `acquire`.
pub const SENTINEL: u32 = 0;

const DEFAULT_SLAB_SIZE: usize = 1024;

enum Slot<N> {
    Free(u32),
    Occupied(N),
}

pub struct Pool<N> {
    cells: Vec<Slot<N>>,
    /// Bumped every time a cell is released, so a stale index handle that
    /// outlived its node (and whose cell has since been reused by
    /// `acquire`) can be told apart from a live one. Parallel to `cells`,
    /// same indexing.
    generations: Vec<u32>,
    free_head: u32,
    slab_size: usize,
    len: usize,
}

impl<N> Pool<N> {
    pub fn new() -> Self {
        Self::with_slab_size(DEFAULT_SLAB_SIZE)
    }

    pub fn with_slab_size(slab_size: usize) -> Self {
        assert!(slab_size > 0, "slab_size must be positive");
        // Cell 0 is permanently reserved as the SENTINEL; it never holds a
        // live node and is never pushed onto the free stack.
        Pool {
            cells: vec![Slot::Free(SENTINEL)],
            generations: vec![0],
            free_head: SENTINEL,
            slab_size,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn grow(&mut self) -> Result<()> {
        self.cells
            .try_reserve(self.slab_size)
            .map_err(Error::ResourceExhausted)?;
        let start = self.cells.len() as u32;
        let old_free_head = self.free_head;
        for offset in 0..self.slab_size as u32 {
            let idx = start + offset;
            let next = if offset + 1 < self.slab_size as u32 {
                idx + 1
            } else {
                old_free_head
            };
            self.cells.push(Slot::Free(next));
            self.generations.push(0);
        }
        self.free_head = start;
        Ok(())
    }

    /// Constructs `value` in a free cell and returns its index.
    pub fn acquire(&mut self, value: N) -> Result<u32> {
        if self.free_head == SENTINEL {
            self.grow()?;
        }
        let idx = self.free_head;
        let next_free = match &self.cells[idx as usize] {
            Slot::Free(next) => *next,
            Slot::Occupied(_) => unreachable!("free list head points at an occupied cell"),
        };
        self.cells[idx as usize] = Slot::Occupied(value);
        self.free_head = next_free;
        self.len += 1;
        Ok(idx)
    }

    /// Destructs the node at `index`, returning it to the caller, and
    /// pushes the cell back onto the free stack.
    pub fn release(&mut self, index: u32) -> N {
        assert_ne!(index, SENTINEL, "cannot release the sentinel cell");
        let prev_head = self.free_head;
        match std::mem::replace(&mut self.cells[index as usize], Slot::Free(prev_head)) {
            Slot::Occupied(value) => {
                self.free_head = index;
                self.len -= 1;
                self.generations[index as usize] = self.generations[index as usize].wrapping_add(1);
                value
            }
            Slot::Free(_) => panic!("double release of pool cell {index}"),
        }
    }

    pub fn get(&self, index: u32) -> &N {
        match &self.cells[index as usize] {
            Slot::Occupied(value) => value,
            Slot::Free(_) => panic!("dangling pool index {index}"),
        }
    }

    pub fn get_mut(&mut self, index: u32) -> &mut N {
        match &mut self.cells[index as usize] {
            Slot::Occupied(value) => value,
            Slot::Free(_) => panic!("dangling pool index {index}"),
        }
    }

    /// The current generation of the cell at `index`, for stamping a
    /// detached handle (see [`crate::cursor::NodeId`]) that must later be
    /// checked for staleness without the tree borrow a `Cursor` holds.
    pub(crate) fn generation(&self, index: u32) -> u32 {
        self.generations[index as usize]
    }

    /// `true` if `index` currently holds a live node stamped with
    /// `generation` — i.e. a handle taken from it hasn't been invalidated
    /// by an intervening release (and possible reuse) of that cell.
    pub(crate) fn is_current(&self, index: u32, generation: u32) -> bool {
        index != SENTINEL
            && self.generations[index as usize] == generation
            && matches!(self.cells[index as usize], Slot::Occupied(_))
    }
}

impl<N> Default for Pool<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Clone> Clone for Pool<N> {
    fn clone(&self) -> Self {
        let cells = self
            .cells
            .iter()
            .map(|slot| match slot {
                Slot::Free(next) => Slot::Free(*next),
                Slot::Occupied(value) => Slot::Occupied(value.clone()),
            })
            .collect();
        Pool {
            cells,
            generations: self.generations.clone(),
            free_head: self.free_head,
            slab_size: self.slab_size,
            len: self.len,
        }
    }
}
