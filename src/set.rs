//! Thin set shims over [`crate::rank_map::RankMap`] and
//! [`crate::sample_map::SampleMap`], for callers who only need the keys.

use rand::Rng;

use crate::error::{Error, Result};
use crate::rank_map::RankMap;
use crate::sample_map::SampleMap;
use crate::weight::Weight;

pub struct RankSet<K: Ord> {
    map: RankMap<K, ()>,
}

impl<K: Ord> RankSet<K> {
    pub fn new() -> Self {
        RankSet { map: RankMap::new() }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    pub fn insert(&mut self, key: K) -> Result<bool> {
        let (_, inserted) = self.map.insert(key, ())?;
        Ok(inserted)
    }

    pub fn remove(&mut self, key: &K) -> bool {
        self.map.remove(key).is_some()
    }

    pub fn rank_of(&self, key: &K) -> Option<usize> {
        self.map.rank_of(key)
    }

    pub fn find_by_rank(&self, rank: usize) -> Result<&K> {
        self.map.find_by_rank(rank).map(|cursor| cursor.key())
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &K> {
        self.map.iter().map(|(k, _)| k)
    }
}

impl<K: Ord> Default for RankSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord> std::iter::FromIterator<K> for RankSet<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = RankSet::new();
        for key in iter {
            set.insert(key).expect("allocator exhausted during collect");
        }
        set
    }
}

pub struct SampleSet<K: Ord, W: Weight> {
    map: SampleMap<K, (), W>,
}

impl<K: Ord, W: Weight> SampleSet<K, W> {
    pub fn new() -> Self {
        SampleSet { map: SampleMap::new() }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    pub fn insert(&mut self, key: K, weight: W) -> Result<bool> {
        let (_, inserted) = self.map.insert(key, (), weight)?;
        Ok(inserted)
    }

    pub fn remove(&mut self, key: &K) -> Option<W> {
        self.map.remove(key).map(|(_, w)| w)
    }

    pub fn set_weight(&mut self, key: &K, weight: W) -> Option<W> {
        let id = self.map.cursor(key)?.id();
        self.map.set_weight(id, weight).ok()
    }

    pub fn total_weight(&self) -> W {
        self.map.total_weight()
    }

    /// Unlike [`SampleMap::sample`], fails loudly: a set with no
    /// probability mass to draw from is a caller error, not a quiet
    /// `None`.
    pub fn sample(&self, rng: &mut impl Rng) -> Result<&K> {
        self.map
            .sample(rng)
            .map(|cursor| cursor.key())
            .ok_or_else(|| Error::RangeError("sample set is empty or has zero total weight".into()))
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &K> {
        self.map.iter().map(|(k, _)| k)
    }
}

impl<K: Ord, W: Weight> Default for SampleSet<K, W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, W: Weight> std::iter::FromIterator<(K, W)> for SampleSet<K, W> {
    fn from_iter<I: IntoIterator<Item = (K, W)>>(iter: I) -> Self {
        let mut set = SampleSet::new();
        for (key, weight) in iter {
            set.insert(key, weight).expect("allocator exhausted during collect");
        }
        set
    }
}
