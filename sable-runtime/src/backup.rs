//! Element-buffer snapshots bound to planes.
//!
//! The first time a collection is written from a plane it did not belong
//! to, its element buffer is copied into the writing plane's backup chunk,
//! with a reference taken on every element and on the collection itself,
//! and the collection is re-homed to that plane. From then on the plane
//! mutates the live buffer freely:
//!
//! - **discard** walks the chunk restoring each original buffer (the
//!   overlay, which only ever accumulates post-snapshot state, is simply
//!   torn down);
//! - **commit** re-homes each collection to the parent plane and either
//!   forwards the record, original buffer and all, to the parent's chunk
//!   (`merge`), or releases it when the parent already holds an older
//!   snapshot of the same collection.
//!
//! Both walks consume the chunk; a resolved plane holds nothing.

use crate::collection::ArrRef;
use crate::dataspace::{DataspaceId, PlaneRef};
use crate::runtime::Runtime;

/// One snapshot: a collection, its pre-mutation element buffer, and the
/// plane it belonged to when the snapshot was taken.
#[derive(Debug)]
pub(crate) struct BackupRecord {
    pub(crate) arr: ArrRef,
    /// Copy of the element buffer, with a reference held on every element.
    pub(crate) original: Vec<crate::value::Value>,
    /// Plane the collection belonged to at snapshot time.
    pub(crate) plane: PlaneRef,
}

impl Runtime {
    /// Snapshot `a` into `ds`'s current plane unless it already belongs to
    /// it. Every mutation path calls this before touching the buffer.
    pub fn backup(&mut self, ds: DataspaceId, a: ArrRef) {
        self.backup_on_write(ds, a);
    }

    pub(crate) fn backup_on_write(&mut self, ds: DataspaceId, a: ArrRef) {
        let current = self.current_plane(ds);
        if self.header(a).primary == current {
            return;
        }
        debug_assert!(!self.header(a).hashmod, "backing up unclean mapping");
        let original = self.header(a).elts.clone();
        for v in &original {
            self.ref_value(v);
        }
        let previous = self.header(a).primary;
        self.ref_collection(a);
        self.header_mut(a).primary = current;
        tracing::trace!(
            index = a.index,
            level = current.level,
            size = original.len(),
            "collection snapshotted"
        );
        self.dataspaces[ds.0 as usize]
            .planes
            .last_mut()
            .expect("plane stack empty")
            .backups
            .push(BackupRecord {
                arr: a,
                original,
                plane: previous,
            });
    }

    /// Commit the current plane of `ds` into its parent.
    ///
    /// With `merge`, snapshots whose collection came from below the parent
    /// move to the parent's chunk so the parent can still roll everything
    /// back; without it (or when the parent already owns an older snapshot)
    /// the originals are released and the committed state stands.
    ///
    /// # Panics
    ///
    /// Panics when called on the base plane.
    pub fn commit_plane(&mut self, ds: DataspaceId, merge: bool) {
        let top = self.plane_level(ds);
        assert!(top > 0, "commit on base plane");
        let plane = self.dataspaces[ds.0 as usize]
            .planes
            .pop()
            .expect("plane stack empty");
        let parent = PlaneRef { ds, level: top - 1 };
        tracing::debug!(
            ds = ds.0,
            level = top,
            merge,
            backups = plane.backups.len(),
            "plane commit"
        );
        for record in plane.backups {
            let primary = self.header(record.arr).primary;
            let forward = if primary != parent {
                self.header_mut(record.arr).primary = parent;
                record.plane != parent
            } else {
                false
            };
            if merge && forward {
                // the parent inherits the snapshot, original buffer and all
                self.dataspaces[ds.0 as usize]
                    .planes
                    .last_mut()
                    .expect("plane stack empty")
                    .backups
                    .push(record);
            } else {
                for v in record.original {
                    self.del_value(v);
                }
                self.unref(record.arr);
            }
        }
        self.clamp_primaries(ds, top - 1);
    }

    /// Discard the current plane of `ds`, restoring every snapshotted
    /// collection to its pre-plane element buffer and dropping whatever the
    /// plane built in overlays.
    ///
    /// # Panics
    ///
    /// Panics when called on the base plane.
    pub fn discard_plane(&mut self, ds: DataspaceId) {
        let top = self.plane_level(ds);
        assert!(top > 0, "discard of base plane");
        let plane = self.dataspaces[ds.0 as usize]
            .planes
            .pop()
            .expect("plane stack empty");
        tracing::debug!(
            ds = ds.0,
            level = top,
            backups = plane.backups.len(),
            "plane discard"
        );
        for record in plane.backups {
            self.header_mut(record.arr).primary = record.plane;
            let current = std::mem::take(&mut self.header_mut(record.arr).elts);
            for v in current {
                self.del_value(v);
            }
            if let Some(hashed) = self.header_mut(record.arr).hashed.take() {
                for entry in hashed.entries.into_iter().flatten() {
                    if entry.add {
                        self.del_value(entry.idx);
                        self.del_value(entry.val);
                    }
                }
            }
            self.header_mut(record.arr).hashmod = false;
            self.header_mut(record.arr).elts = record.original;
            self.unref(record.arr);
        }
        self.clamp_primaries(ds, top - 1);
    }
}
