use rand::rngs::ThreadRng;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use ranktree::{RankMap, RankSet, SampleMap, SampleSet};
use std::collections::BTreeMap;

const ITERATIONS: usize = 2000;

/// Drives a [`RankMap`] against a `BTreeMap` through random inserts,
/// removals, and updates, checking both against each other and against
/// [`ranktree::audit::rank_map_consistent`] at every step.
#[test]
fn rank_map_matches_btreemap_under_random_churn() {
    let mut rng = thread_rng();
    let mut map: RankMap<u32, u64> = RankMap::new();
    let mut model: BTreeMap<u32, u64> = BTreeMap::new();
    let mut keys: Vec<u32> = Vec::new();

    for _ in 0..ITERATIONS {
        assert!(ranktree::audit::rank_map_consistent(&map));
        let roll: f64 = rng.gen();
        if roll < 0.45 || keys.is_empty() {
            let k = rng.gen_range(0..10_000);
            let v = rng.gen::<u64>();
            let (_, inserted) = map.insert(k, v).unwrap();
            let already_present = model.insert(k, v).is_some();
            assert_eq!(inserted, !already_present);
            if !keys.contains(&k) {
                keys.push(k);
            }
        } else if roll < 0.75 {
            let j = rng.gen_range(0..keys.len());
            let key = keys.swap_remove(j);
            assert_eq!(map.remove(&key), model.remove(&key));
        } else {
            let j = rng.gen_range(0..keys.len());
            let key = keys[j];
            let v = rng.gen::<u64>();
            *map.get_mut(&key).unwrap() = v;
            model.insert(key, v);
        }
    }

    assert_eq!(map.len(), model.len());
    for ((k1, v1), (k2, v2)) in model.iter().zip(map.iter()) {
        assert_eq!(k1, k2);
        assert_eq!(v1, v2);
    }
    for ((k1, v1), (k2, v2)) in model.iter().rev().zip(map.iter().rev()) {
        assert_eq!(k1, k2);
        assert_eq!(v1, v2);
    }

    for (rank, (key, _)) in model.iter().enumerate() {
        assert_eq!(map.rank_of(key), Some(rank));
        assert_eq!(map.find_by_rank(rank).unwrap().key(), key);
    }
    assert!(map.find_by_rank(model.len()).is_err());
}

#[test]
fn rank_map_iter_mut_survives_a_full_pass() {
    let mut rng = thread_rng();
    let mut map: RankMap<u32, u64> = RankMap::new();
    let mut model: BTreeMap<u32, u64> = BTreeMap::new();
    for _ in 0..500 {
        let k = rng.gen_range(0..5_000);
        let v = rng.gen::<u64>();
        map.insert(k, v).unwrap();
        model.insert(k, v);
    }

    for (k, v) in map.iter_mut() {
        *v ^= *k as u64;
        *model.get_mut(k).unwrap() ^= *k as u64;
    }

    for ((k1, v1), (k2, v2)) in model.iter().zip(map.iter()) {
        assert_eq!(k1, k2);
        assert_eq!(v1, v2);
    }
}

fn random_weight(rng: &mut ThreadRng) -> u32 {
    rng.gen_range(1..1000)
}

/// Drives a [`SampleMap`] against a `BTreeMap` of weights, checking total
/// weight bookkeeping and red-black/weight-sum consistency after every
/// mutation, in the teacher's `simulate` style.
#[test]
fn sample_map_weights_track_model_under_random_churn() {
    let mut rng = thread_rng();
    let mut map: SampleMap<u32, (), u32> = SampleMap::new();
    let mut model: BTreeMap<u32, u32> = BTreeMap::new();
    let mut keys: Vec<u32> = Vec::new();

    for _ in 0..ITERATIONS {
        assert!(ranktree::audit::sample_map_consistent(&map));
        let roll: f64 = rng.gen();
        if roll < 0.4 || keys.is_empty() {
            let k = rng.gen_range(0..10_000);
            let w = random_weight(&mut rng);
            map.insert(k, (), w).unwrap();
            model.insert(k, w);
            if !keys.contains(&k) {
                keys.push(k);
            }
        } else if roll < 0.7 {
            let j = rng.gen_range(0..keys.len());
            let key = keys.swap_remove(j);
            let removed = map.remove(&key);
            let modeled = model.remove(&key);
            assert_eq!(removed.is_some(), modeled.is_some());
        } else {
            let j = rng.gen_range(0..keys.len());
            let key = keys[j];
            let w = random_weight(&mut rng);
            let id = map.cursor(&key).unwrap().id();
            map.set_weight(id, w).unwrap();
            model.insert(key, w);
        }
        let expected_total: u32 = model.values().sum();
        assert_eq!(map.total_weight(), expected_total);
    }
}

#[test]
fn sample_map_sample_distribution_tracks_weight_ratio() {
    let mut map: SampleMap<&str, (), u32> = SampleMap::new();
    map.insert("common", (), 95).unwrap();
    map.insert("rare", (), 5).unwrap();

    let mut rng = thread_rng();
    let trials = 5000;
    let mut common_hits = 0;
    for _ in 0..trials {
        if map.sample(&mut rng).unwrap().key() == &"common" {
            common_hits += 1;
        }
    }
    let ratio = common_hits as f64 / trials as f64;
    assert!((ratio - 0.95).abs() < 0.03, "observed ratio {ratio}");
}

#[test]
fn rank_set_matches_btreeset_under_random_churn() {
    let mut rng = thread_rng();
    let mut set: RankSet<u32> = RankSet::new();
    let mut model: std::collections::BTreeSet<u32> = std::collections::BTreeSet::new();
    let mut keys: Vec<u32> = Vec::new();

    for _ in 0..1000 {
        let roll: f64 = rng.gen();
        if roll < 0.6 || keys.is_empty() {
            let k = rng.gen_range(0..2000);
            let inserted = set.insert(k).unwrap();
            assert_eq!(inserted, model.insert(k));
            if !keys.contains(&k) {
                keys.push(k);
            }
        } else {
            let j = rng.gen_range(0..keys.len());
            let key = keys.swap_remove(j);
            assert_eq!(set.remove(&key), model.remove(&key));
        }
    }
    assert_eq!(set.len(), model.len());
    for (rank, key) in model.iter().enumerate() {
        assert_eq!(set.rank_of(key), Some(rank));
        assert_eq!(set.find_by_rank(rank).unwrap(), key);
    }
}

#[test]
fn sample_set_draws_from_present_members_only() {
    let mut set: SampleSet<&str, u32> = SampleSet::new();
    let mut rng = thread_rng();
    set.insert("a", 1).unwrap();
    set.insert("b", 1).unwrap();
    set.insert("c", 1).unwrap();
    set.remove(&"b");

    for _ in 0..200 {
        let drawn = *set.sample(&mut rng).unwrap();
        assert!(drawn == "a" || drawn == "c");
    }
}

/// `insert("foo", 2), insert("bar", 1)`, mutate `"bar"` through
/// `get_mut`, then remove `"bar"` by cursor and `"foo"` by key.
#[test]
fn remove_cursor_drains_map_alongside_remove_by_key() {
    let mut map: RankMap<&str, i32> = RankMap::new();
    map.insert("foo", 2).unwrap();
    map.insert("bar", 1).unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map.get("foo"), Some(&2));
    assert_eq!(map.get("bar"), Some(&1));
    assert_eq!(map.rank_of(&"bar"), Some(0));
    assert_eq!(map.rank_of(&"foo"), Some(1));
    assert_eq!(map.find_by_rank(0).unwrap().key(), &"bar");

    *map.get_mut(&"bar").unwrap() = -4;
    assert!(ranktree::audit::rank_map_consistent(&map));

    let bar_id = map.cursor(&"bar").unwrap().id();
    assert_eq!(map.remove_cursor(bar_id).unwrap(), -4);
    assert_eq!(map.remove(&"foo"), Some(2));

    assert_eq!(map.len(), 0);
    assert!(ranktree::audit::rank_map_consistent(&map));
}

#[test]
fn shuffled_bulk_insert_then_remove_empties_both_maps() {
    let mut rng = thread_rng();
    let mut map: RankMap<u32, u32> = RankMap::new();
    let mut keys: Vec<u32> = (0..5000).collect();
    keys.shuffle(&mut rng);
    for &k in &keys {
        map.insert(k, k * 2).unwrap();
    }
    assert_eq!(map.len(), keys.len());
    assert!(ranktree::audit::rank_map_consistent(&map));

    keys.shuffle(&mut rng);
    for &k in &keys {
        assert_eq!(map.remove(&k), Some(k * 2));
    }
    assert!(map.is_empty());
}
