//! End-to-end scenarios for the collection runtime: set algebra, mapping
//! behavior, plane snapshots and destructed-reference scrubbing, driven
//! through the public API only.

use sable_runtime::{DataspaceId, Error, Runtime, Value};

fn ints(rt: &mut Runtime, ds: DataspaceId, items: &[i32]) -> sable_runtime::ArrRef {
    let a = rt.new_array(ds, items.len()).unwrap();
    for (i, &n) in items.iter().enumerate() {
        rt.store_elt(ds, a, i, Value::Int(n));
    }
    a
}

fn as_ints(rt: &Runtime, a: sable_runtime::ArrRef) -> Vec<i32> {
    rt.elts(a)
        .iter()
        .map(|v| match v {
            Value::Int(n) => *n,
            other => panic!("non-int element {other:?}"),
        })
        .collect()
}

#[test]
fn set_algebra_scenario() {
    let mut rt = sable_runtime::init();
    let ds = rt.new_dataspace();
    let a = ints(&mut rt, ds, &[1, 2, 3, 2]);
    let b = ints(&mut rt, ds, &[2]);

    let sub = rt.sub(ds, a, b).unwrap();
    let inter = rt.intersect(ds, a, b).unwrap();
    let setadd = rt.setadd(ds, a, b).unwrap();
    let setxadd = rt.setxadd(ds, a, b).unwrap();

    assert_eq!(as_ints(&rt, sub), vec![1, 3]);
    assert_eq!(as_ints(&rt, inter), vec![2, 2]);
    assert_eq!(as_ints(&rt, setadd), vec![1, 2, 3, 2]);
    assert_eq!(as_ints(&rt, setxadd), vec![1, 3]);
}

#[test]
fn empty_left_operand_copies_right() {
    let mut rt = sable_runtime::init();
    let ds = rt.new_dataspace();
    let a = ints(&mut rt, ds, &[]);
    let b = ints(&mut rt, ds, &[5]);

    let union = rt.setadd(ds, a, b).unwrap();
    let sym = rt.setxadd(ds, a, b).unwrap();
    assert_eq!(as_ints(&rt, union), vec![5]);
    assert_eq!(as_ints(&rt, sym), vec![5]);
    // results are fresh collections, not aliases
    assert_ne!(union.tag, b.tag);
    assert_ne!(sym.tag, b.tag);
}

#[test]
fn mapping_insert_and_delete_scenario() {
    let mut rt = sable_runtime::init();
    let ds = rt.new_dataspace();
    let m = rt.new_mapping(ds, 0).unwrap();
    let k = Value::Str(rt.strings_mut().intern("k"));

    rt.map_index(ds, m, k, Some(Value::Int(1)), None).unwrap();
    assert_eq!(rt.map_size(ds, m).unwrap(), 1);
    let keys = rt.map_indices(ds, m).unwrap();
    let vals = rt.map_values(ds, m).unwrap();
    assert_eq!(rt.elts(keys), &[k]);
    assert_eq!(rt.elts(vals), &[Value::Int(1)]);

    rt.map_index(ds, m, k, Some(Value::Nil), None).unwrap();
    assert_eq!(rt.map_size(ds, m).unwrap(), 0);
    assert!(rt.elts(m).is_empty());
}

#[test]
fn mapping_range_scenario() {
    let mut rt = sable_runtime::init();
    let ds = rt.new_dataspace();
    let m = rt.new_mapping(ds, 0).unwrap();
    let a = Value::Str(rt.strings_mut().intern("a"));
    let b = Value::Str(rt.strings_mut().intern("b"));
    let c = Value::Str(rt.strings_mut().intern("c"));
    for (k, v) in [(a, 1), (b, 2), (c, 3)] {
        rt.map_index(ds, m, k, Some(Value::Int(v)), None).unwrap();
    }

    let r = rt.map_range(ds, m, Some(&a), Some(&b)).unwrap();
    assert_eq!(rt.elts(r), &[a, Value::Int(1), b, Value::Int(2)]);

    let r = rt.map_range(ds, m, Some(&b), None).unwrap();
    assert_eq!(rt.elts(r), &[b, Value::Int(2), c, Value::Int(3)]);

    let r = rt.map_range(ds, m, None, None).unwrap();
    assert_eq!(rt.size(r), 6);
}

#[test]
fn snapshot_discard_restores() {
    let mut rt = sable_runtime::init();
    let ds = rt.new_dataspace();
    let a = ints(&mut rt, ds, &[1, 2, 3]);

    rt.push_plane(ds);
    rt.backup(ds, a);
    rt.store_elt(ds, a, 1, Value::Int(9));
    assert_eq!(as_ints(&rt, a), vec![1, 9, 3]);
    rt.discard_plane(ds);
    assert_eq!(as_ints(&rt, a), vec![1, 2, 3]);
}

#[test]
fn snapshot_commit_merge_moves_to_parent() {
    let mut rt = sable_runtime::init();
    let ds = rt.new_dataspace();
    let a = ints(&mut rt, ds, &[1, 2, 3]);

    rt.push_plane(ds); // P1
    rt.push_plane(ds); // P2
    rt.store_elt(ds, a, 1, Value::Int(9));
    rt.commit_plane(ds, true); // P2 -> P1, snapshot forwarded
    assert_eq!(as_ints(&rt, a), vec![1, 9, 3]);

    rt.discard_plane(ds); // P1 still owns the original
    assert_eq!(as_ints(&rt, a), vec![1, 2, 3]);
}

#[test]
fn nested_snapshots_roll_back_to_outermost() {
    let mut rt = sable_runtime::init();
    let ds = rt.new_dataspace();
    let a = ints(&mut rt, ds, &[1]);

    rt.push_plane(ds);
    rt.store_elt(ds, a, 0, Value::Int(2));
    rt.push_plane(ds);
    rt.store_elt(ds, a, 0, Value::Int(3));
    rt.commit_plane(ds, true);
    assert_eq!(as_ints(&rt, a), vec![3]);
    rt.discard_plane(ds);
    assert_eq!(as_ints(&rt, a), vec![1]);
}

#[test]
fn commit_without_merge_drops_snapshots() {
    let mut rt = sable_runtime::init();
    let ds = rt.new_dataspace();
    let a = ints(&mut rt, ds, &[1]);

    rt.push_plane(ds);
    rt.store_elt(ds, a, 0, Value::Int(2));
    rt.commit_plane(ds, false);
    assert_eq!(as_ints(&rt, a), vec![2]);
    assert_eq!(rt.refs(a), 1);
}

#[test]
fn mapping_mutations_roll_back_with_plane() {
    let mut rt = sable_runtime::init();
    let ds = rt.new_dataspace();
    let m = rt.new_mapping(ds, 0).unwrap();
    rt.map_index(ds, m, Value::Int(1), Some(Value::Int(10)), None)
        .unwrap();
    rt.compact(ds, m).unwrap();

    rt.push_plane(ds);
    rt.map_index(ds, m, Value::Int(2), Some(Value::Int(20)), None)
        .unwrap();
    rt.map_index(ds, m, Value::Int(1), Some(Value::Int(11)), None)
        .unwrap();
    assert_eq!(rt.map_size(ds, m).unwrap(), 2);
    rt.discard_plane(ds);

    assert_eq!(rt.map_size(ds, m).unwrap(), 1);
    let got = rt.map_index(ds, m, Value::Int(1), None, None).unwrap();
    assert_eq!(got, Value::Int(10));
    let got = rt.map_index(ds, m, Value::Int(2), None, None).unwrap();
    assert_eq!(got, Value::Nil);
}

#[test]
fn destruct_scrub_drops_mapping_key() {
    let mut rt = sable_runtime::init();
    let ds = rt.new_dataspace();
    let m = rt.new_mapping(ds, 0).unwrap();
    let obj = rt.new_object(0);
    rt.map_index(ds, m, Value::Object(obj), Some(Value::Int(1)), None)
        .unwrap();
    rt.map_index(ds, m, Value::Int(7), Some(Value::Int(8)), None)
        .unwrap();
    rt.compact(ds, m).unwrap();

    let before = rt.odcount();
    rt.destruct_object(obj);
    assert_ne!(rt.odcount(), before);

    let keys = rt.map_indices(ds, m).unwrap();
    assert_eq!(rt.elts(keys), &[Value::Int(7)]);
    assert_eq!(rt.map_size(ds, m).unwrap(), 1);
}

#[test]
fn destruct_scrub_canonicalises_set_operands() {
    let mut rt = sable_runtime::init();
    let ds = rt.new_dataspace();
    let obj = rt.new_object(0);
    let a = rt.new_array(ds, 2).unwrap();
    rt.store_elt(ds, a, 0, Value::Object(obj));
    rt.store_elt(ds, a, 1, Value::Int(4));
    let b = ints(&mut rt, ds, &[4]);

    rt.destruct_object(obj);
    let diff = rt.sub(ds, a, b).unwrap();
    assert_eq!(rt.elts(diff), &[Value::Nil]);
    // the source itself was canonicalised in place
    assert_eq!(rt.elts(a)[0], Value::Nil);
}

#[test]
fn array_errors_surface() {
    let mut rt = sable_runtime::init_with(
        sable_runtime::RuntimeConfig::builder().max_array_size(2).build(),
    );
    let ds = rt.new_dataspace();
    assert!(matches!(
        rt.new_array(ds, 3),
        Err(Error::ArrayTooLarge { size: 3, max: 2 })
    ));
    let a = ints(&mut rt, ds, &[1, 2]);
    let b = ints(&mut rt, ds, &[3]);
    assert!(matches!(rt.add(ds, a, b), Err(Error::ArrayTooLarge { .. })));
    assert!(matches!(
        rt.range(ds, a, 0, 2),
        Err(Error::InvalidRange { .. })
    ));
    assert!(matches!(
        rt.check_index(a, -1),
        Err(Error::IndexOutOfRange { .. })
    ));
}

#[test]
fn lwobject_round_trip() {
    let mut rt = sable_runtime::init();
    let ds = rt.new_dataspace();
    let obj = rt.new_object(2);
    let lwo = rt.new_lwobject(ds, obj);
    rt.store_elt(ds, lwo, 2, Value::Int(42));

    let copy = rt.copy_lwobject(ds, lwo);
    assert_eq!(rt.elts(copy), rt.elts(lwo));
    assert_ne!(copy.tag, lwo.tag);

    // a mapping can tell the two apart even though they compare equal only
    // by tag
    let m = rt.new_mapping(ds, 0).unwrap();
    rt.map_index(ds, m, Value::LwObject(lwo), Some(Value::Int(1)), None)
        .unwrap();
    rt.map_index(ds, m, Value::LwObject(copy), Some(Value::Int(2)), None)
        .unwrap();
    assert_eq!(rt.map_size(ds, m).unwrap(), 2);
}

#[test]
fn freelist_tears_down_dataspace() {
    let mut rt = sable_runtime::init();
    let ds = rt.new_dataspace();
    for _ in 0..10 {
        let a = rt.new_array(ds, 3).unwrap();
        rt.store_elt(ds, a, 0, Value::Int(1));
    }
    assert_eq!(rt.live_collections(), 10);
    rt.freelist(ds);
    assert_eq!(rt.live_collections(), 0);
}
