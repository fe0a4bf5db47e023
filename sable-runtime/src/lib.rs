//! # Sable Collection Runtime
//!
//! The collection runtime of the Sable virtual machine. Sable is an
//! embedded, multi-user, object-oriented language; this crate holds its two
//! dynamic composite values, the **array** and the **mapping**, together
//! with the degenerate third form, the **light-weight object**. All three
//! share one header shape and one lifecycle machinery.
//!
//! - **Values**: a `Copy` tagged union with a total order over the whole
//!   domain (`value`)
//! - **Set Algebra**: union, difference, intersection and symmetric
//!   difference over arrays (`array`)
//! - **Mappings**: a sorted array fused on demand with a hash overlay of
//!   recent mutations (`mapping`)
//! - **Planes**: transactional snapshots that commit into the enclosing
//!   plane or roll back atomically (`dataspace`, `backup`)
//! - **Scrubbing**: lazy replacement of references to destructed objects
//!   (`array`, `mapping`)
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                         Runtime                            │
//! ├────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐  ┌────────────┐  ┌──────────────────────┐  │
//! │  │ Set algebra│  │  Mappings  │  │ Light-weight objects │  │
//! │  │ (array.rs) │  │(mapping.rs)│  │    (lwobject.rs)     │  │
//! │  └─────┬──────┘  └─────┬──────┘  └──────────┬───────────┘  │
//! │        └───────────────┼────────────────────┘              │
//! │  ┌─────────────────────┴───────────────────────────────┐   │
//! │  │   Collection arena + lifecycle   (collection.rs)    │   │
//! │  └─────────────────────┬───────────────────────────────┘   │
//! │  ┌────────────┐  ┌─────┴──────┐  ┌──────────────────────┐  │
//! │  │ Dataspaces │  │  Backups   │  │ strings / objects /  │  │
//! │  │ and planes │  │(backup.rs) │  │ float facades        │  │
//! │  └────────────┘  └────────────┘  └──────────────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use sable_runtime::{Runtime, Value};
//!
//! let mut rt = sable_runtime::init();
//! let ds = rt.new_dataspace();
//! let m = rt.new_mapping(ds, 0)?;
//! let key = Value::Str(rt.strings_mut().intern("hp"));
//! rt.map_index(ds, m, key, Some(Value::Int(100)), None)?;
//! assert_eq!(rt.map_size(ds, m)?, 1);
//! ```
//!
//! The runtime is single-threaded cooperative: one logical VM thread, no
//! locks, no suspension. Operations either complete or return an error that
//! the interpreter unwinds.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod array;
pub mod backup;
pub mod collection;
pub mod config;
pub mod dataspace;
pub mod error;
pub mod float;
pub mod lwobject;
pub mod mapping;
pub mod merge;
pub mod object;
pub mod runtime;
pub mod strings;
pub mod value;

// Re-exports
pub use collection::ArrRef;
pub use config::{RuntimeConfig, RuntimeConfigBuilder, DEFAULT_MAX_ARRAY_SIZE};
pub use dataspace::DataspaceId;
pub use error::{Error, Result};
pub use float::VmFloat;
pub use object::{ObjRef, Objects};
pub use runtime::Runtime;
pub use strings::{StrRef, Strings};
pub use value::Value;

/// Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize a runtime with the default configuration.
pub fn init() -> Runtime {
    Runtime::new(RuntimeConfig::default())
}

/// Initialize a runtime with a custom configuration.
pub fn init_with(config: RuntimeConfig) -> Runtime {
    Runtime::new(config)
}

/// Initialize a runtime from `SABLE_*` environment variables.
pub fn init_from_env() -> Runtime {
    Runtime::new(RuntimeConfig::from_env())
}
