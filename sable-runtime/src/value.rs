//! The Sable value union and its total order.
//!
//! A [`Value`] is a small `Copy` tag-plus-payload pair: numbers and float
//! halves are inline, strings are interned symbols, objects and collections
//! are table handles. Because values carry no owning pointers, element
//! buffers can be copied bitwise; all reference counting is explicit through
//! [`Runtime::ref_value`](crate::Runtime::ref_value) and
//! [`Runtime::del_value`](crate::Runtime::del_value).
//!
//! # Ordering
//!
//! Values order first by type, then per type: integers numerically, floats
//! by the dedicated comparator, strings byte-lexicographically, objects by
//! table index, and collection handles by generation tag. Two distinct
//! collections can share a tag after a persistent round-trip, so a
//! comparator hit on a handle is never an identity match by itself; lookups
//! that need identity probe the tag-equal neighbourhood linearly (see
//! [`search`]).

use std::cmp::Ordering;

use crate::collection::ArrRef;
use crate::float::VmFloat;
use crate::object::ObjRef;
use crate::strings::{StrRef, Strings};

/// A Sable runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    /// The absent value.
    Nil,
    /// Signed 32-bit integer.
    Int(i32),
    /// Two-part float.
    Float(VmFloat),
    /// Interned string.
    Str(StrRef),
    /// Persistent object reference.
    Object(ObjRef),
    /// Array handle.
    Array(ArrRef),
    /// Mapping handle.
    Mapping(ArrRef),
    /// Light-weight object handle.
    LwObject(ArrRef),
}

impl Value {
    /// True for [`Value::Nil`].
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// The collection handle behind an array, mapping or light-weight
    /// object value.
    pub fn indexed(&self) -> Option<ArrRef> {
        match *self {
            Value::Array(h) | Value::Mapping(h) | Value::LwObject(h) => Some(h),
            _ => None,
        }
    }

    /// Ordinal of the value's type in the total order.
    fn type_ord(&self) -> u8 {
        match self {
            Value::Nil => 0,
            Value::Int(_) => 1,
            Value::Float(_) => 2,
            Value::Str(_) => 3,
            Value::Object(_) => 4,
            Value::Array(_) => 5,
            Value::Mapping(_) => 6,
            Value::LwObject(_) => 7,
        }
    }
}

/// Compare two values in the runtime's total order.
///
/// Collection handles compare by generation tag alone: a result of
/// [`Ordering::Equal`] on handles means "same tag", not "same collection".
pub fn cmp(strings: &Strings, a: &Value, b: &Value) -> Ordering {
    let ord = a.type_ord().cmp(&b.type_ord());
    if ord != Ordering::Equal {
        return ord;
    }
    match (a, b) {
        (Value::Nil, Value::Nil) => Ordering::Equal,
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.cmp(*y),
        (Value::Str(x), Value::Str(y)) => strings.cmp(*x, *y),
        (Value::Object(x), Value::Object(y)) => x.index.cmp(&y.index),
        _ => {
            let x = a.indexed().expect("indexed value");
            let y = b.indexed().expect("indexed value");
            x.tag.cmp(&y.tag)
        }
    }
}

/// True when `a` and `b` are equal under the comparator *and* identical:
/// comparator-equal collection handles must also share their slot.
pub fn eq_identity(strings: &Strings, a: &Value, b: &Value) -> bool {
    if cmp(strings, a, b) != Ordering::Equal {
        return false;
    }
    match (a.indexed(), b.indexed()) {
        (Some(x), Some(y)) => x.index == y.index,
        _ => true,
    }
}

/// Binary search for `key` over a sorted buffer of entries at stride `step`
/// (1 for arrays, 2 for mapping key/value pairs; keys sit at multiples of
/// the stride).
///
/// Returns `Ok(slot)` of the identity-matching entry, or `Err(slot)` with
/// the stride-aligned insertion point. A comparator hit on a collection
/// handle with the wrong identity triggers a linear probe over the
/// tag-equal neighbourhood in both directions before giving up: equal tags
/// do not guarantee one collection, so every candidate must be checked.
pub(crate) fn search(
    strings: &Strings,
    key: &Value,
    buf: &[Value],
    step: usize,
) -> std::result::Result<usize, usize> {
    debug_assert!(step == 1 || step == 2);
    let mask = !(step - 1);
    let mut l = 0usize;
    let mut h = buf.len();
    while l < h {
        let m = ((l + h) >> 1) & mask;
        match cmp(strings, key, &buf[m]) {
            Ordering::Less => h = m,
            Ordering::Greater => l = m + step,
            Ordering::Equal => {
                let k = match key.indexed() {
                    Some(k) if k.index != buf[m].indexed().expect("indexed entry").index => k,
                    _ => return Ok(m),
                };
                // Tag collision: probe forward, then backward, while the
                // neighbours still carry the colliding tag.
                let mut i = m + step;
                while i < h {
                    match buf[i].indexed() {
                        Some(o) if o.index == k.index => return Ok(i),
                        Some(o) if o.tag == k.tag => i += step,
                        _ => break,
                    }
                }
                let mut i = m;
                while i > l {
                    i -= step;
                    match buf[i].indexed() {
                        Some(o) if o.index == k.index => return Ok(i),
                        Some(o) if o.tag == k.tag => {}
                        _ => break,
                    }
                }
                return Err(l);
            }
        }
    }
    Err(l)
}
