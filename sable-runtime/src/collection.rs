//! Collection headers and lifecycle.
//!
//! Arrays, mappings and light-weight objects share one header shape, stored
//! in a slot arena on the runtime. A handle is the slot index plus a cached
//! copy of the collection's generation tag; the tag is the ordering key for
//! handles, the index is their identity.
//!
//! Headers are reference counted. Releasing the last reference destroys the
//! collection and releases its elements, which can cascade into arbitrarily
//! deep collection graphs; the cascade runs through an explicit queue on the
//! runtime so the native stack stays bounded no matter how collections nest.

use crate::dataspace::{DataspaceId, PlaneRef};
use crate::error::{Error, Result};
use crate::mapping::MapHash;
use crate::runtime::Runtime;
use crate::value::Value;

/// Handle to a collection: arena slot plus cached generation tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrRef {
    /// Arena slot index; the identity of the collection.
    pub(crate) index: u32,
    /// Generation tag at handle creation, the ordering key. Tags are
    /// assigned monotonically but equality of tags is not proof of
    /// identity.
    pub tag: u32,
}

/// Header shared by arrays, mappings and light-weight objects.
#[derive(Debug)]
pub(crate) struct Header {
    /// Element buffer; for mappings, `(key, value)` pairs sorted by the
    /// value comparator. Empty means no buffer.
    pub(crate) elts: Vec<Value>,
    /// Hash overlay of recent mutations; mappings only.
    pub(crate) hashed: Option<Box<MapHash>>,
    /// True while the overlay holds unmerged additions.
    pub(crate) hashmod: bool,
    /// Destruct epoch last observed by a scrub of this collection.
    pub(crate) odcount: u32,
    /// Generation tag.
    pub(crate) tag: u32,
    /// Reference count.
    pub(crate) refs: u32,
    /// Plane the collection currently belongs to.
    pub(crate) primary: PlaneRef,
    /// Dataspace whose sibling list links this collection.
    pub(crate) home: DataspaceId,
    /// Previous sibling (arena slot), `None` at the list head.
    pub(crate) prev: Option<u32>,
    /// Next sibling (arena slot).
    pub(crate) next: Option<u32>,
}

impl Runtime {
    /// Allocate a header for `elts` and link it at the head of `ds`'s
    /// sibling list. The caller owns the single reference and must have
    /// arranged references for the values already in the buffer.
    pub(crate) fn install(&mut self, ds: DataspaceId, elts: Vec<Value>) -> ArrRef {
        let tag = self.tag;
        self.tag = self.tag.wrapping_add(1);
        let old_head = self.dataspaces[ds.0 as usize].head;
        let header = Header {
            elts,
            hashed: None,
            hashmod: false,
            odcount: self.odcount,
            tag,
            refs: 1,
            primary: self.current_plane(ds),
            home: ds,
            prev: None,
            next: old_head,
        };
        let index = match self.free_slots.pop() {
            Some(i) => {
                self.slots[i as usize] = Some(header);
                i
            }
            None => {
                self.slots.push(Some(header));
                (self.slots.len() - 1) as u32
            }
        };
        if let Some(h) = old_head {
            self.slots[h as usize]
                .as_mut()
                .expect("sibling list corrupt")
                .prev = Some(index);
        }
        self.dataspaces[ds.0 as usize].head = Some(index);
        ArrRef { index, tag }
    }

    /// Create a new array of `size` nil elements in `ds`.
    pub fn new_array(&mut self, ds: DataspaceId, size: usize) -> Result<ArrRef> {
        if size > self.max_size() {
            return Err(Error::ArrayTooLarge {
                size,
                max: self.max_size(),
            });
        }
        Ok(self.install(ds, vec![Value::Nil; size]))
    }

    /// Take a reference on a collection.
    pub fn ref_collection(&mut self, a: ArrRef) {
        self.header_mut(a).refs += 1;
    }

    /// Release a reference on a collection. Dropping the last reference
    /// destroys it and releases its elements.
    ///
    /// Nested collections are destroyed iteratively: when releasing an
    /// element would cascade, the victim is queued and handled by the
    /// outermost call, so arbitrarily deep (or cyclic) graphs cannot
    /// overflow the stack.
    pub fn unref(&mut self, a: ArrRef) {
        let header = self.header_mut(a);
        debug_assert!(header.refs > 0, "unref of dead collection");
        header.refs -= 1;
        if header.refs != 0 {
            return;
        }
        self.destroy_queue.push(a.index);
        if self.destroying {
            return;
        }
        self.destroying = true;
        while let Some(index) = self.destroy_queue.pop() {
            self.destroy_slot(index);
        }
        self.destroying = false;
    }

    /// Free one arena slot: unlink it from its sibling list and release the
    /// element buffer and overlay. Element releases may push further victims
    /// onto the destroy queue.
    fn destroy_slot(&mut self, index: u32) {
        let header = self.slots[index as usize]
            .take()
            .expect("destroying a free slot");
        tracing::trace!(index, tag = header.tag, "collection destroyed");
        self.unlink(&header, index);
        for v in header.elts {
            self.del_value(v);
        }
        if let Some(hashed) = header.hashed {
            for entry in hashed.entries.into_iter().flatten() {
                // only unmerged additions own their values
                if entry.add {
                    self.del_value(entry.idx);
                    self.del_value(entry.val);
                }
            }
        }
        self.free_slots.push(index);
    }

    /// Detach `header` (still owning slot `index`) from its sibling list.
    fn unlink(&mut self, header: &Header, index: u32) {
        match header.prev {
            Some(p) => {
                self.slots[p as usize]
                    .as_mut()
                    .expect("sibling list corrupt")
                    .next = header.next;
            }
            None => {
                debug_assert_eq!(self.dataspaces[header.home.0 as usize].head, Some(index));
                self.dataspaces[header.home.0 as usize].head = header.next;
            }
        }
        if let Some(n) = header.next {
            self.slots[n as usize]
                .as_mut()
                .expect("sibling list corrupt")
                .prev = header.prev;
        }
    }

    /// Free every collection still linked to `ds`, structurally.
    ///
    /// This is the dataspace-teardown path: the persistent-layer hooks are
    /// not consulted and contained collection handles are not unreferenced,
    /// because the whole list goes away together. The caller guarantees the
    /// dataspace is self-contained at this point.
    pub fn freelist(&mut self, ds: DataspaceId) {
        debug_assert!(
            self.dataspaces[ds.0 as usize]
                .planes
                .iter()
                .all(|p| p.backups.is_empty()),
            "freelist with unresolved snapshots"
        );
        let mut cur = self.dataspaces[ds.0 as usize].head.take();
        while let Some(index) = cur {
            let header = self.slots[index as usize]
                .take()
                .expect("sibling list corrupt");
            cur = header.next;
            self.free_slots.push(index);
        }
    }

    /// Rewrite the generation tag of a collection, returning a matching
    /// handle. Tests use this to fabricate the tag collisions that occur in
    /// production only across persistent round-trips.
    #[cfg(test)]
    pub(crate) fn retag_for_tests(&mut self, a: ArrRef, tag: u32) -> ArrRef {
        self.header_mut(a).tag = tag;
        ArrRef {
            index: a.index,
            tag,
        }
    }
}
