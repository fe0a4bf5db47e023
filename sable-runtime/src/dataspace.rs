//! Dataspaces and planes.
//!
//! A dataspace is the storage unit of one persistent object: it owns the
//! sibling list of every collection created under it and a stack of
//! *planes*. A plane is a logical transaction frame; mutations made while a
//! plane is active can be rolled back when it is discarded, or merged into
//! the enclosing plane when it commits (see the [`backup`](crate::backup)
//! module for the snapshot machinery).
//!
//! The write hook [`Runtime::store_elt`] is how every element mutation in
//! the runtime lands: it snapshots the collection into the writer's current
//! plane on the first write from that plane, then swaps the element with the
//! reference counts kept straight.

use crate::collection::ArrRef;
use crate::backup::BackupRecord;
use crate::runtime::Runtime;
use crate::value::Value;

/// Identifier of a dataspace within its runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataspaceId(pub(crate) u32);

/// A collection's owning plane: dataspace plus plane level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PlaneRef {
    pub(crate) ds: DataspaceId,
    pub(crate) level: u32,
}

/// One plane of a dataspace's stack. Level 0 is the base plane and is never
/// popped.
#[derive(Debug, Default)]
pub(crate) struct Plane {
    /// Backup chunk: snapshots taken while this plane was active.
    pub(crate) backups: Vec<BackupRecord>,
}

/// Per-dataspace state.
#[derive(Debug)]
pub(crate) struct DataspaceState {
    /// Head of the sibling list (arena slot index).
    pub(crate) head: Option<u32>,
    /// Plane stack; `planes[0]` is the base plane.
    pub(crate) planes: Vec<Plane>,
    /// Count of structural mapping changes, for the persistence layer.
    pub(crate) changes: u64,
}

impl Runtime {
    /// Create a new, empty dataspace.
    pub fn new_dataspace(&mut self) -> DataspaceId {
        self.dataspaces.push(DataspaceState {
            head: None,
            planes: vec![Plane::default()],
            changes: 0,
        });
        DataspaceId((self.dataspaces.len() - 1) as u32)
    }

    /// Current plane level of a dataspace (0 = base).
    pub fn plane_level(&self, ds: DataspaceId) -> u32 {
        (self.dataspaces[ds.0 as usize].planes.len() - 1) as u32
    }

    /// Number of structural mapping changes recorded against `ds`.
    pub fn change_count(&self, ds: DataspaceId) -> u64 {
        self.dataspaces[ds.0 as usize].changes
    }

    /// Push a fresh plane onto `ds`'s stack.
    pub fn push_plane(&mut self, ds: DataspaceId) {
        self.dataspaces[ds.0 as usize].planes.push(Plane::default());
    }

    pub(crate) fn current_plane(&self, ds: DataspaceId) -> PlaneRef {
        PlaneRef {
            ds,
            level: self.plane_level(ds),
        }
    }

    /// True when the collection still belongs to the current plane of its
    /// own dataspace.
    pub(crate) fn this_plane(&self, a: ArrRef) -> bool {
        let primary = self.header(a).primary;
        primary.level == self.plane_level(primary.ds)
    }

    /// True when two dataspaces sit at the same plane level.
    pub(crate) fn same_plane(&self, d1: DataspaceId, d2: DataspaceId) -> bool {
        self.plane_level(d1) == self.plane_level(d2)
    }

    /// Record a structural mapping change for the persistence layer.
    pub(crate) fn change_map(&mut self, m: ArrRef) {
        let ds = self.header(m).primary.ds;
        self.dataspaces[ds.0 as usize].changes += 1;
    }

    /// Assign into an element slot of a collection, writing through the
    /// plane machinery: the collection is snapshotted into `ds`'s current
    /// plane if this is the first write from that plane, the new value is
    /// referenced and the old one released.
    pub fn store_elt(&mut self, ds: DataspaceId, a: ArrRef, slot: usize, v: Value) {
        self.assign_elt(ds, a, slot, v);
    }

    pub(crate) fn assign_elt(&mut self, ds: DataspaceId, a: ArrRef, slot: usize, v: Value) {
        self.backup_on_write(ds, a);
        self.ref_value(&v);
        let old = std::mem::replace(&mut self.header_mut(a).elts[slot], v);
        self.del_value(old);
    }

    /// Re-home collections whose plane died with a commit or discard. Only
    /// collections on `ds`'s own sibling list are visited; a collection
    /// homed elsewhere but written through `ds` is re-homed by its backup
    /// record instead.
    pub(crate) fn clamp_primaries(&mut self, ds: DataspaceId, new_top: u32) {
        let mut cur = self.dataspaces[ds.0 as usize].head;
        while let Some(index) = cur {
            let header = self.slots[index as usize]
                .as_mut()
                .expect("sibling list corrupt");
            if header.primary.ds == ds && header.primary.level > new_top {
                header.primary.level = new_top;
            }
            cur = header.next;
        }
    }
}
