//! Order-statistic and weighted-sampling maps built on an augmented
//! red-black tree.
//!
//! [`RankMap`] is a sorted key/value map that additionally answers
//! "what's at sorted position `i`?" ([`RankMap::find_by_rank`]) and
//! "what position is this key at?" ([`RankMap::rank_of`]) in `O(log n)`.
//! [`SampleMap`] is the weighted-sampling counterpart: each entry carries
//! a weight, and [`SampleMap::sample`] draws a random entry with
//! probability proportional to its weight, also in `O(log n)`. [`RankSet`]
//! and [`SampleSet`] are the corresponding set-only shims.
//!
//! Both maps share one tree engine ([`tree::Tree`]) monomorphized over an
//! [`augment::Augment`] implementation — [`augment::CountAugment`] for
//! `RankMap`, [`augment::WeightAugment`] for `SampleMap` — so the
//! rotation and fixup code is written exactly once.

pub mod allocator;
pub mod audit;
pub mod augment;
pub mod cursor;
pub mod error;
pub mod node;
pub mod rank_map;
pub mod sample_map;
pub mod set;
pub mod tree;
pub mod weight;

pub use allocator::SENTINEL;
pub use cursor::{Cursor, CursorMut, NodeId};
pub use error::{Error, Result};
pub use rank_map::RankMap;
pub use sample_map::SampleMap;
pub use set::{RankSet, SampleSet};
pub use weight::Weight;
