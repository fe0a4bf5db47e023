//! Property-based tests for the collection runtime.
//!
//! Uses proptest to generate random inputs and verify the algebraic
//! invariants of the set operations, mapping canonical form, and plane
//! snapshot round-trips.

use proptest::prelude::*;
use sable_runtime::{ArrRef, DataspaceId, Runtime, Value};

fn ints(rt: &mut Runtime, ds: DataspaceId, items: &[i32]) -> ArrRef {
    let a = rt.new_array(ds, items.len()).unwrap();
    for (i, &n) in items.iter().enumerate() {
        rt.store_elt(ds, a, i, Value::Int(n));
    }
    a
}

fn as_ints(rt: &Runtime, a: ArrRef) -> Vec<i32> {
    rt.elts(a)
        .iter()
        .map(|v| match v {
            Value::Int(n) => *n,
            other => panic!("non-int element {other:?}"),
        })
        .collect()
}

fn sorted(mut v: Vec<i32>) -> Vec<i32> {
    v.sort_unstable();
    v
}

/// Strategy for small arrays with plenty of collisions.
fn elements() -> impl Strategy<Value = Vec<i32>> {
    prop::collection::vec(-8i32..8, 0..24)
}

proptest! {
    /// sub and intersect partition the left operand.
    #[test]
    fn sub_intersect_partition(a in elements(), b in elements()) {
        let mut rt = sable_runtime::init();
        let ds = rt.new_dataspace();
        let arr_a = ints(&mut rt, ds, &a);
        let arr_b = ints(&mut rt, ds, &b);
        let sub = rt.sub(ds, arr_a, arr_b).unwrap();
        let inter = rt.intersect(ds, arr_a, arr_b).unwrap();
        prop_assert_eq!(rt.size(sub) + rt.size(inter), a.len());
    }

    /// intersect preserves the left operand's order and is a sub-multiset
    /// of the right operand.
    #[test]
    fn intersect_subset_of_both(a in elements(), b in elements()) {
        let mut rt = sable_runtime::init();
        let ds = rt.new_dataspace();
        let arr_a = ints(&mut rt, ds, &a);
        let arr_b = ints(&mut rt, ds, &b);
        let inter = rt.intersect(ds, arr_a, arr_b).unwrap();
        let got = as_ints(&rt, inter);

        // order preserved: `got` is a subsequence of `a`
        let mut it = a.iter();
        for x in &got {
            prop_assert!(it.any(|y| y == x), "not a subsequence of A");
        }
        // multiset inclusion in B
        let mut pool = b.clone();
        for x in &got {
            let pos = pool.iter().position(|y| y == x);
            prop_assert!(pos.is_some(), "element {} over-represented", x);
            pool.swap_remove(pos.unwrap());
        }
    }

    /// setadd of duplicate-free inputs stays duplicate-free.
    #[test]
    fn setadd_keeps_sets_sets(a in elements(), b in elements()) {
        let mut rt = sable_runtime::init();
        let ds = rt.new_dataspace();
        let a: Vec<i32> = {
            let mut v = a.clone();
            v.sort_unstable();
            v.dedup();
            v
        };
        let b: Vec<i32> = {
            let mut v = b.clone();
            v.sort_unstable();
            v.dedup();
            v
        };
        let arr_a = ints(&mut rt, ds, &a);
        let arr_b = ints(&mut rt, ds, &b);
        let union = rt.setadd(ds, arr_a, arr_b).unwrap();
        let got = as_ints(&rt, union);
        let mut dedup = got.clone();
        dedup.sort_unstable();
        dedup.dedup();
        prop_assert_eq!(got.len(), dedup.len());
    }

    /// setxadd agrees with setadd of the two differences, as multisets.
    #[test]
    fn setxadd_matches_composed_form(a in elements(), b in elements()) {
        let mut rt = sable_runtime::init();
        let ds = rt.new_dataspace();
        let arr_a = ints(&mut rt, ds, &a);
        let arr_b = ints(&mut rt, ds, &b);
        let direct = rt.setxadd(ds, arr_a, arr_b).unwrap();
        let a_less_b = rt.sub(ds, arr_a, arr_b).unwrap();
        let b_less_a = rt.sub(ds, arr_b, arr_a).unwrap();
        let composed = rt.setadd(ds, a_less_b, b_less_a).unwrap();
        prop_assert_eq!(
            sorted(as_ints(&rt, direct)),
            sorted(as_ints(&rt, composed))
        );
    }

    /// add concatenates.
    #[test]
    fn add_concatenates(a in elements(), b in elements()) {
        let mut rt = sable_runtime::init();
        let ds = rt.new_dataspace();
        let arr_a = ints(&mut rt, ds, &a);
        let arr_b = ints(&mut rt, ds, &b);
        let sum = rt.add(ds, arr_a, arr_b).unwrap();
        let mut expect = a.clone();
        expect.extend_from_slice(&b);
        prop_assert_eq!(as_ints(&rt, sum), expect);
    }

    /// A mapping built from random writes compacts to sorted, distinct
    /// keys, with the overlay drained.
    #[test]
    fn compact_reaches_canonical_form(writes in prop::collection::vec((-16i32..16, 0i32..100), 0..64)) {
        let mut rt = sable_runtime::init();
        let ds = rt.new_dataspace();
        let m = rt.new_mapping(ds, 0).unwrap();
        for (k, v) in &writes {
            rt.map_index(ds, m, Value::Int(*k), Some(Value::Int(*v)), None).unwrap();
        }
        rt.compact(ds, m).unwrap();
        let keys: Vec<i32> = rt.elts(m)
            .iter()
            .step_by(2)
            .map(|v| match v { Value::Int(n) => *n, _ => unreachable!() })
            .collect();
        let mut expect = keys.clone();
        expect.sort_unstable();
        expect.dedup();
        prop_assert_eq!(keys, expect);
    }

    /// The last write per key wins; deleted keys vanish.
    #[test]
    fn mapping_reads_see_last_write(writes in prop::collection::vec((-8i32..8, -1i32..50), 0..48)) {
        let mut rt = sable_runtime::init();
        let ds = rt.new_dataspace();
        let m = rt.new_mapping(ds, 0).unwrap();
        let mut model = std::collections::BTreeMap::new();
        for (k, v) in &writes {
            // value -1 plays the role of nil: a deletion
            let newval = if *v < 0 { Value::Nil } else { Value::Int(*v) };
            rt.map_index(ds, m, Value::Int(*k), Some(newval), None).unwrap();
            if *v < 0 {
                model.remove(k);
            } else {
                model.insert(*k, *v);
            }
        }
        prop_assert_eq!(rt.map_size(ds, m).unwrap(), model.len());
        for (k, v) in &model {
            let got = rt.map_index(ds, m, Value::Int(*k), None, None).unwrap();
            prop_assert_eq!(got, Value::Int(*v));
        }
    }

    /// indices and values stay aligned with the pair count.
    #[test]
    fn indices_values_sizes_agree(writes in prop::collection::vec((-16i32..16, 0i32..100), 0..48)) {
        let mut rt = sable_runtime::init();
        let ds = rt.new_dataspace();
        let m = rt.new_mapping(ds, 0).unwrap();
        for (k, v) in &writes {
            rt.map_index(ds, m, Value::Int(*k), Some(Value::Int(*v)), None).unwrap();
        }
        let size = rt.map_size(ds, m).unwrap();
        let keys = rt.map_indices(ds, m).unwrap();
        let vals = rt.map_values(ds, m).unwrap();
        prop_assert_eq!(rt.size(keys), size);
        prop_assert_eq!(rt.size(vals), size);
    }

    /// Snapshot, arbitrary in-place mutation, discard: the original buffer
    /// comes back element for element.
    #[test]
    fn snapshot_discard_round_trip(
        initial in elements(),
        writes in prop::collection::vec((0usize..24, -50i32..50), 1..16)
    ) {
        let mut rt = sable_runtime::init();
        let ds = rt.new_dataspace();
        let a = ints(&mut rt, ds, &initial);
        let before = as_ints(&rt, a);

        rt.push_plane(ds);
        rt.backup(ds, a);
        for (slot, v) in &writes {
            if !initial.is_empty() {
                let slot = slot % initial.len();
                rt.store_elt(ds, a, slot, Value::Int(*v));
            }
        }
        rt.discard_plane(ds);
        prop_assert_eq!(as_ints(&rt, a), before);
    }

    /// Committing a plane keeps the mutated state and releases the
    /// snapshot's extra reference.
    #[test]
    fn commit_keeps_state(initial in elements(), v in -50i32..50) {
        let mut rt = sable_runtime::init();
        let ds = rt.new_dataspace();
        let a = ints(&mut rt, ds, &initial);
        prop_assume!(!initial.is_empty());

        rt.push_plane(ds);
        rt.store_elt(ds, a, 0, Value::Int(v));
        let mutated = as_ints(&rt, a);
        rt.commit_plane(ds, false);
        prop_assert_eq!(as_ints(&rt, a), mutated);
        prop_assert_eq!(rt.refs(a), 1);
    }
}
