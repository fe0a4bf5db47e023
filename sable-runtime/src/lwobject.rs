//! Light-weight objects.
//!
//! A light-weight object is a value-typed object: a fixed vector of
//! variables prefixed with identity metadata. Slot 0 holds the master
//! object's handle, slot 1 its update counter encoded as a float, and slots
//! `2..` the object variables. Copying one is a shallow buffer copy under a
//! fresh generation tag, so a copy and its source compare as distinct
//! values.

use crate::collection::ArrRef;
use crate::dataspace::DataspaceId;
use crate::float::VmFloat;
use crate::object::ObjRef;
use crate::runtime::Runtime;
use crate::value::Value;

impl Runtime {
    /// Instantiate a light-weight object of master `obj` with all variables
    /// nil.
    pub fn new_lwobject(&mut self, ds: DataspaceId, obj: ObjRef) -> ArrRef {
        let nvars = self.objects.entry(obj.index).nvars as usize;
        let mut elts = Vec::with_capacity(nvars + 2);
        elts.push(Value::Object(obj));
        elts.push(Value::Float(VmFloat::from_counter(obj.count)));
        elts.resize(nvars + 2, Value::Nil);
        self.install(ds, elts)
    }

    /// Shallow-copy a light-weight object. The copy carries a fresh
    /// generation tag, so structural comparisons can tell it from its
    /// source.
    pub fn copy_lwobject(&mut self, ds: DataspaceId, a: ArrRef) -> ArrRef {
        let elts = self.copy_elts(a);
        self.install(ds, elts)
    }
}
