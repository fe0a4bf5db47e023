//! The runtime object.
//!
//! Everything that the original driver kept in process globals lives here as
//! an explicit object: the collection arena, the generation tag and destruct
//! epoch counters, the configured size cap, the merge registry, and the
//! string/object facades. The runtime is single-threaded cooperative; one
//! `&mut Runtime` flows through every operation and nothing suspends.
//!
//! # Reference counting
//!
//! Values are `Copy`; copying a value never touches a reference count.
//! Consumers that *retain* a value call [`Runtime::ref_value`], and every
//! release goes through [`Runtime::del_value`]. Dropping a buffer of values
//! is always a bitwise operation, which is what lets half-built temporaries
//! be abandoned on error paths without unwinding ceremony.

use crate::collection::{ArrRef, Header};
use crate::config::RuntimeConfig;
use crate::dataspace::DataspaceState;
use crate::merge::MergeTable;
use crate::object::Objects;
use crate::strings::Strings;
use crate::value::Value;

/// The collection runtime.
///
/// Created once per VM via [`Runtime::new`]; dropping it tears down every
/// collection, plane and table in aggregate.
#[derive(Debug)]
pub struct Runtime {
    pub(crate) config: RuntimeConfig,
    pub(crate) strings: Strings,
    pub(crate) objects: Objects,
    /// Collection arena. A `None` slot is free.
    pub(crate) slots: Vec<Option<Header>>,
    pub(crate) free_slots: Vec<u32>,
    pub(crate) dataspaces: Vec<DataspaceState>,
    pub(crate) merge: MergeTable,
    /// Next generation tag.
    pub(crate) tag: u32,
    /// Destruct epoch; advanced by [`Runtime::destruct_object`].
    pub(crate) odcount: u32,
    /// Deferred-destroy queue; see [`Runtime::unref`](crate::Runtime::unref).
    pub(crate) destroy_queue: Vec<u32>,
    pub(crate) destroying: bool,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Runtime {
    /// Create a runtime with the given configuration.
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            strings: Strings::new(),
            objects: Objects::new(),
            slots: Vec::new(),
            free_slots: Vec::new(),
            dataspaces: Vec::new(),
            merge: MergeTable::new(),
            tag: 0,
            odcount: 0,
            destroy_queue: Vec::new(),
            destroying: false,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Maximum element count per array; mappings may hold twice as many
    /// half-entries.
    pub(crate) fn max_size(&self) -> usize {
        self.config.max_array_size
    }

    /// The string table.
    pub fn strings(&self) -> &Strings {
        &self.strings
    }

    /// Mutable access to the string table, for interning.
    pub fn strings_mut(&mut self) -> &mut Strings {
        &mut self.strings
    }

    /// The object table.
    pub fn objects(&self) -> &Objects {
        &self.objects
    }

    /// The current destruct epoch.
    pub fn odcount(&self) -> u32 {
        self.odcount
    }

    pub(crate) fn header(&self, a: ArrRef) -> &Header {
        self.slots[a.index as usize]
            .as_ref()
            .expect("stale collection handle")
    }

    pub(crate) fn header_mut(&mut self, a: ArrRef) -> &mut Header {
        self.slots[a.index as usize]
            .as_mut()
            .expect("stale collection handle")
    }

    /// The element buffer of a collection.
    ///
    /// For a mapping this is the sorted array part only; pending overlay
    /// insertions become visible here after
    /// [`compact`](crate::Runtime::compact).
    pub fn elts(&self, a: ArrRef) -> &[Value] {
        &self.header(a).elts
    }

    /// Element count of a collection (half-entries for a mapping).
    pub fn size(&self, a: ArrRef) -> usize {
        self.header(a).elts.len()
    }

    /// Current reference count of a collection.
    pub fn refs(&self, a: ArrRef) -> u32 {
        self.header(a).refs
    }

    /// Number of live collections across all dataspaces, for diagnostics.
    pub fn live_collections(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Take a reference on behalf of a retained value.
    pub fn ref_value(&mut self, v: &Value) {
        if let Some(h) = v.indexed() {
            self.ref_collection(h);
        }
    }

    /// Release a retained value.
    pub fn del_value(&mut self, v: Value) {
        if let Some(h) = v.indexed() {
            self.unref(h);
        }
    }

    /// Copy a slice of values, taking a reference on each copy.
    pub(crate) fn copy_ref(&mut self, src: &[Value]) -> Vec<Value> {
        let out = src.to_vec();
        for v in &out {
            self.ref_value(v);
        }
        out
    }

    /// True when `v` refers to a destructed object, directly or through the
    /// identity slot of a light-weight object.
    pub(crate) fn value_destructed(&self, v: &Value) -> bool {
        match *v {
            Value::Object(o) => self.objects.destructed(o),
            Value::LwObject(h) => {
                matches!(self.header(h).elts.first(),
                         Some(Value::Object(o)) if self.objects.destructed(*o))
            }
            _ => false,
        }
    }
}
