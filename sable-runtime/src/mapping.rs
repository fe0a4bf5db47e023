//! Mappings: dual sorted-array and hash-overlay representation.
//!
//! A mapping keeps its settled `(key, value)` pairs in the header's element
//! buffer, sorted by the value comparator, and accumulates recent mutations
//! in a side hash table, the *overlay*. Inserts and updates land in the
//! overlay in amortised constant time; operations that need the ordered view
//! ([`map_range`](crate::Runtime::map_range), the binary operations,
//! [`map_indices`](crate::Runtime::map_indices), ...) first fold the overlay
//! back into the sorted buffer with [`compact`](crate::Runtime::compact).
//!
//! Overlay entries come in two flavours. An entry with `add` set is a
//! pending mutation and owns references on its key and value; an entry with
//! `add` clear merely caches a pair that lives in the sorted buffer, so
//! repeated lookups of a hot key skip the binary search. Folding strips the
//! `add` flags, which demotes pending entries to cache entries.
//!
//! A mapping is never observed mid-fold: readers from a different plane than
//! the last writer fold before looking, so cross-plane reads always see a
//! sorted view consistent with the writer's plane.

use std::cmp::Ordering;

use crate::collection::ArrRef;
use crate::dataspace::DataspaceId;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::strings::StrRef;
use crate::value::{self, Value};

/// Initial bucket count of an overlay; most mappings stay small.
const INITIAL_TABLE_SIZE: usize = 16;

/// Hash value of the nil key.
const NIL_HASH: u32 = 4747;

/// One overlay entry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MapEntry {
    /// Precomputed key hash.
    pub(crate) hashval: u32,
    /// Pending mutation (owns its values) or plain cache of the array part.
    pub(crate) add: bool,
    /// Key.
    pub(crate) idx: Value,
    /// Value.
    pub(crate) val: Value,
    /// Next entry in the bucket chain (slab index).
    pub(crate) next: Option<u32>,
}

/// The hash overlay of one mapping: chained buckets over a slab of entries.
#[derive(Debug)]
pub(crate) struct MapHash {
    /// Buckets; each holds the head of a chain of slab indices.
    pub(crate) table: Vec<Option<u32>>,
    /// Entry slab. `None` slots are free.
    pub(crate) entries: Vec<Option<MapEntry>>,
    free: Vec<u32>,
    /// Live entries.
    pub(crate) size: u32,
    /// Live entries with `add` set.
    pub(crate) sizemod: u32,
}

impl MapHash {
    fn new() -> Self {
        Self {
            table: vec![None; INITIAL_TABLE_SIZE],
            entries: Vec::new(),
            free: Vec::new(),
            size: 0,
            sizemod: 0,
        }
    }

    /// Double the bucket count once the load factor reaches 3/4.
    fn maybe_grow(&mut self) {
        if (self.size as usize) * 4 < self.table.len() * 3 {
            return;
        }
        let new_size = self.table.len() * 2;
        let mut table: Vec<Option<u32>> = vec![None; new_size];
        for b in 0..self.table.len() {
            let mut cur = self.table[b];
            while let Some(ei) = cur {
                let entry = self.entries[ei as usize].as_mut().expect("overlay slab corrupt");
                cur = entry.next;
                let nb = (entry.hashval as usize) % new_size;
                entry.next = table[nb];
                table[nb] = Some(ei);
            }
        }
        self.table = table;
    }

    fn alloc(&mut self, entry: MapEntry) -> u32 {
        match self.free.pop() {
            Some(i) => {
                self.entries[i as usize] = Some(entry);
                i
            }
            None => {
                self.entries.push(Some(entry));
                (self.entries.len() - 1) as u32
            }
        }
    }

    fn link(&mut self, ei: u32, hashval: u32) {
        let b = (hashval as usize) % self.table.len();
        self.entries[ei as usize].as_mut().expect("overlay slab corrupt").next = self.table[b];
        self.table[b] = Some(ei);
    }
}

impl Runtime {
    /// Create a new mapping with room for `size` half-entries (keys +
    /// values), all nil. Callers building a literal fill the pairs with
    /// [`store_elt`](Self::store_elt) and then canonicalise with
    /// [`sort_mapping`](Self::sort_mapping).
    pub fn new_mapping(&mut self, ds: DataspaceId, size: usize) -> Result<ArrRef> {
        debug_assert!(size % 2 == 0, "mapping size counts keys and values");
        let max = self.max_size() << 1;
        if size > max {
            return Err(Error::MappingTooLarge { size, max });
        }
        Ok(self.install(ds, vec![Value::Nil; size]))
    }

    /// Canonicalise a literal-built mapping in place: drop pairs whose value
    /// is nil, sort the rest by key, and reject duplicate keys.
    pub fn sort_mapping(&mut self, m: ArrRef) -> Result<()> {
        let elts = std::mem::take(&mut self.header_mut(m).elts);
        let mut pairs: Vec<(Value, Value)> = Vec::with_capacity(elts.len() / 2);
        let mut dropped: Vec<Value> = Vec::new();
        for pair in elts.chunks_exact(2) {
            if pair[1].is_nil() {
                dropped.push(pair[0]);
            } else {
                pairs.push((pair[0], pair[1]));
            }
        }
        for key in dropped {
            self.del_value(key);
        }
        pairs.sort_by(|a, b| value::cmp(&self.strings, &a.0, &b.0));
        let duplicate = pairs
            .windows(2)
            .any(|w| value::eq_identity(&self.strings, &w[0].0, &w[1].0));
        let mut out = Vec::with_capacity(pairs.len() * 2);
        for (k, v) in pairs {
            out.push(k);
            out.push(v);
        }
        self.header_mut(m).elts = out;
        if duplicate {
            return Err(Error::IdenticalIndices);
        }
        Ok(())
    }

    /// Hash a mapping key by type.
    pub(crate) fn map_hash(&self, v: &Value) -> u32 {
        match *v {
            Value::Nil => NIL_HASH,
            Value::Int(n) => n as u32,
            Value::Float(f) => f.map_hash(),
            Value::Str(s) => self.strings.map_hash(s),
            Value::Object(o) => o.index,
            Value::Array(h) | Value::Mapping(h) | Value::LwObject(h) => h.index,
        }
    }

    fn hash_find(&self, m: ArrRef, key: &Value, hashval: u32) -> Option<(Option<u32>, u32, usize)> {
        let hashed = self.header(m).hashed.as_ref()?;
        let b = (hashval as usize) % hashed.table.len();
        let mut prev: Option<u32> = None;
        let mut cur = hashed.table[b];
        while let Some(ei) = cur {
            let entry = hashed.entries[ei as usize].as_ref().expect("overlay slab corrupt");
            if value::eq_identity(&self.strings, key, &entry.idx) {
                return Some((prev, ei, b));
            }
            prev = Some(ei);
            cur = entry.next;
        }
        None
    }

    fn hash_entry(&self, m: ArrRef, ei: u32) -> &MapEntry {
        self.header(m).hashed.as_ref().expect("overlay missing").entries[ei as usize]
            .as_ref()
            .expect("overlay slab corrupt")
    }

    fn hash_entry_mut(&mut self, m: ArrRef, ei: u32) -> &mut MapEntry {
        self.header_mut(m)
            .hashed
            .as_mut()
            .expect("overlay missing")
            .entries[ei as usize]
            .as_mut()
            .expect("overlay slab corrupt")
    }

    fn hash_unlink(&mut self, m: ArrRef, prev: Option<u32>, ei: u32, bucket: usize) {
        let hashed = self.header_mut(m).hashed.as_mut().expect("overlay missing");
        let next = hashed.entries[ei as usize].as_ref().expect("overlay slab corrupt").next;
        match prev {
            Some(p) => hashed.entries[p as usize].as_mut().expect("overlay slab corrupt").next = next,
            None => hashed.table[bucket] = next,
        }
        hashed.entries[ei as usize] = None;
        hashed.free.push(ei);
        hashed.size -= 1;
    }

    /// Make room for one more overlay entry, compacting first when the
    /// mapping is at capacity. Returns the slab index of a blank entry
    /// already linked under `hashval`.
    fn map_grow(&mut self, ds: DataspaceId, m: ArrRef, hashval: u32, add: bool) -> Result<u32> {
        let pairs = self.size(m) >> 1;
        let pending = self.header(m).hashed.as_ref().map_or(0, |h| h.sizemod as usize);
        if add && pairs + pending >= self.max_size() {
            self.compact(ds, m)?;
            if self.size(m) >> 1 >= self.max_size() {
                return Err(Error::MappingTooLargeToGrow);
            }
        }
        let hashed = self
            .header_mut(m)
            .hashed
            .get_or_insert_with(|| Box::new(MapHash::new()));
        hashed.maybe_grow();
        hashed.size += 1;
        let ei = hashed.alloc(MapEntry {
            hashval,
            add: false,
            idx: Value::Nil,
            val: Value::Nil,
            next: None,
        });
        hashed.link(ei, hashval);
        Ok(ei)
    }

    /// Index a mapping with `key`.
    ///
    /// - `newval` of `None` reads; the result is the stored value or nil.
    /// - `newval` of nil deletes the entry.
    /// - any other `newval` stores it, unless `verify` is given and the
    ///   currently stored value is not that exact interned string (the
    ///   optimistic replace used by string mutation).
    ///
    /// A key holding a stale object reference is deleted on sight, whatever
    /// the caller intended. The returned value is not referenced; callers
    /// that retain it take their own reference.
    pub fn map_index(
        &mut self,
        ds: DataspaceId,
        m: ArrRef,
        key: Value,
        newval: Option<Value>,
        verify: Option<StrRef>,
    ) -> Result<Value> {
        let mut elt = newval;
        let mut del = false;
        if let Some(v) = elt {
            if v.is_nil() {
                elt = None;
                del = true;
            }
        }

        // cross-plane readers see the writer's sorted view
        if self.header(m).hashmod
            && (!self.this_plane(m) || !self.same_plane(ds, self.header(m).primary.ds))
        {
            self.dehash(ds, m, false)?;
        }

        let hashval = self.map_hash(&key);

        let mut in_hash = false;
        if let Some((prev, ei, bucket)) = self.hash_find(m, &key, hashval) {
            let entry = self.hash_entry(m, ei);
            let (e_add, e_idx, e_val) = (entry.add, entry.idx, entry.val);
            let verify_ok = verify.map_or(true, |s| matches!(e_val, Value::Str(t) if t == s));
            let stale_key = matches!((key, e_idx),
                                     (Value::Object(o), Value::Object(so)) if o.count != so.count);

            if elt.is_some() && verify_ok {
                let new = elt.expect("assignment value");
                if matches!(key, Value::Object(_)) {
                    // refresh the stored counter of a resurrected key
                    self.hash_entry_mut(m, ei).idx = key;
                }
                if e_add {
                    self.backup_on_write(ds, m);
                    self.ref_value(&new);
                    self.del_value(e_val);
                    self.hash_entry_mut(m, ei).val = new;
                    return Ok(new);
                }
                // cache of an array pair: update the cache, then the pair below
                self.hash_entry_mut(m, ei).val = new;
                in_hash = true;
            } else if del || stale_key {
                if e_add {
                    self.backup_on_write(ds, m);
                    self.del_value(e_idx);
                    self.del_value(e_val);
                    let hashed = self.header_mut(m).hashed.as_mut().expect("overlay missing");
                    hashed.sizemod -= 1;
                    let none_pending = hashed.sizemod == 0;
                    if none_pending {
                        self.header_mut(m).hashmod = false;
                    }
                }
                self.hash_unlink(m, prev, ei, bucket);
                if e_add {
                    return Ok(Value::Nil);
                }
                // a cache entry: the owning pair in the array goes too
                in_hash = true;
            } else {
                return Ok(e_val);
            }
        }

        let mut add = true;
        let mut hit: Option<Value> = None;
        let mut cache_pair: Option<(Value, Value)> = None;
        if !self.header(m).elts.is_empty() {
            let found = value::search(&self.strings, &key, &self.header(m).elts, 2).ok();
            if let Some(n) = found {
                let v_key = self.header(m).elts[n];
                let v_val = self.header(m).elts[n + 1];
                let verify_ok = verify.map_or(true, |s| matches!(v_val, Value::Str(t) if t == s));
                let stale_key = matches!((key, v_key),
                                         (Value::Object(o), Value::Object(so)) if o.count != so.count);
                if elt.is_some() && verify_ok {
                    let new = elt.expect("assignment value");
                    self.assign_elt(ds, m, n + 1, new);
                    if matches!(key, Value::Object(_)) {
                        self.header_mut(m).elts[n] = key;
                    }
                } else if del || stale_key {
                    self.assign_elt(ds, m, n, Value::Nil);
                    self.assign_elt(ds, m, n + 1, Value::Nil);
                    self.header_mut(m).elts.drain(n..n + 2);
                    self.change_map(m);
                    return Ok(Value::Nil);
                }
                let pair = (self.header(m).elts[n], self.header(m).elts[n + 1]);
                cache_pair = Some(pair);
                hit = Some(pair.1);
                add = false;
            }
        }

        if hit.is_none() && elt.is_none() {
            return Ok(Value::Nil); // not found
        }

        if !in_hash {
            let ei = self.map_grow(ds, m, hashval, add)?;
            if add {
                // extend the mapping: a pending overlay entry owning its pair
                let new = elt.expect("assignment value");
                self.backup_on_write(ds, m);
                self.ref_value(&key);
                self.ref_value(&new);
                {
                    let entry = self.hash_entry_mut(m, ei);
                    entry.add = true;
                    entry.idx = key;
                    entry.val = new;
                }
                self.header_mut(m)
                    .hashed
                    .as_mut()
                    .expect("overlay missing")
                    .sizemod += 1;
                self.header_mut(m).hashmod = true;
                self.change_map(m);
                return Ok(new);
            }
            let (k, v) = cache_pair.expect("array hit");
            let entry = self.hash_entry_mut(m, ei);
            entry.idx = k;
            entry.val = v;
            return Ok(v);
        }

        Ok(hit.or(elt).unwrap_or(Value::Nil))
    }

    /// Fold the overlay into the sorted buffer and, in clean mode, drop
    /// every pair that refers to a destructed object.
    ///
    /// The merge itself is atomic: on a duplicate-key error the mapping is
    /// left exactly as it was (destructed-entry removal, like any scrub, is
    /// a canonicalisation that persists).
    pub(crate) fn dehash(&mut self, ds: DataspaceId, m: ArrRef, clean: bool) -> Result<()> {
        if clean && !self.header(m).elts.is_empty() {
            let len = self.header(m).elts.len();
            let mut kept: Vec<Value> = Vec::with_capacity(len);
            let mut i = 0;
            while i < len {
                let k = self.header(m).elts[i];
                let v = self.header(m).elts[i + 1];
                if self.value_destructed(&k) || self.value_destructed(&v) {
                    self.assign_elt(ds, m, i, Value::Nil);
                    self.assign_elt(ds, m, i + 1, Value::Nil);
                } else {
                    kept.push(k);
                    kept.push(v);
                }
                i += 2;
            }
            if kept.len() != len {
                self.header_mut(m).elts = kept;
                self.change_map(m);
            }
        }

        let run = self.header(m).hashmod
            || (clean && self.header(m).hashed.as_ref().map_or(false, |h| h.size != 0));
        if !run {
            return Ok(());
        }

        let mut hashed = self.header_mut(m).hashed.take().expect("overlay missing");
        let mut adds: Vec<(u32, Value, Value)> = Vec::new();
        if clean {
            let mut removed = 0u32;
            for b in 0..hashed.table.len() {
                let mut prev: Option<u32> = None;
                let mut cur = hashed.table[b];
                while let Some(ei) = cur {
                    let entry = hashed.entries[ei as usize].as_ref().expect("overlay slab corrupt");
                    let (k, v, add, next) = (entry.idx, entry.val, entry.add, entry.next);
                    if self.value_destructed(&k) || self.value_destructed(&v) {
                        if add {
                            self.backup_on_write(ds, m);
                            self.del_value(k);
                            self.del_value(v);
                            hashed.sizemod -= 1;
                        }
                        match prev {
                            Some(p) => {
                                hashed.entries[p as usize]
                                    .as_mut()
                                    .expect("overlay slab corrupt")
                                    .next = next;
                            }
                            None => hashed.table[b] = next,
                        }
                        hashed.entries[ei as usize] = None;
                        hashed.free.push(ei);
                        hashed.size -= 1;
                        removed += 1;
                        cur = next;
                        continue;
                    }
                    if add {
                        adds.push((ei, k, v));
                    }
                    prev = Some(ei);
                    cur = next;
                }
            }
            if removed != 0 {
                self.change_map(m);
            }
        } else {
            for (ei, slot) in hashed.entries.iter().enumerate() {
                if let Some(entry) = slot {
                    if entry.add {
                        adds.push((ei as u32, entry.idx, entry.val));
                    }
                }
            }
            debug_assert_eq!(adds.len() as u32, hashed.sizemod);
        }

        if !adds.is_empty() {
            let mut pairs: Vec<(Value, Value)> = adds.iter().map(|&(_, k, v)| (k, v)).collect();
            pairs.sort_by(|a, b| value::cmp(&self.strings, &a.0, &b.0));

            let old = &self.header(m).elts;
            let mut merged: Vec<Value> = Vec::with_capacity(old.len() + pairs.len() * 2);
            let mut i = 0;
            let mut j = 0;
            while i < old.len() && j < pairs.len() {
                if value::cmp(&self.strings, &old[i], &pairs[j].0) != Ordering::Greater {
                    merged.push(old[i]);
                    merged.push(old[i + 1]);
                    i += 2;
                } else {
                    merged.push(pairs[j].0);
                    merged.push(pairs[j].1);
                    j += 1;
                }
            }
            merged.extend_from_slice(&old[i..]);
            for &(k, v) in &pairs[j..] {
                merged.push(k);
                merged.push(v);
            }

            let mut n = 2;
            let mut duplicate = false;
            while n < merged.len() {
                if value::eq_identity(&self.strings, &merged[n - 2], &merged[n]) {
                    duplicate = true;
                    break;
                }
                n += 2;
            }
            if duplicate {
                self.header_mut(m).hashed = Some(hashed);
                return Err(Error::IdenticalIndices);
            }

            for &(ei, _, _) in &adds {
                hashed.entries[ei as usize]
                    .as_mut()
                    .expect("overlay slab corrupt")
                    .add = false;
            }
            self.header_mut(m).elts = merged;
        }

        hashed.sizemod = 0;
        self.header_mut(m).hashmod = false;
        self.header_mut(m).hashed = Some(hashed);
        Ok(())
    }

    /// Bring a mapping to canonical form: fold pending overlay entries and
    /// scrub destructed references, if either is called for.
    pub fn compact(&mut self, ds: DataspaceId, m: ArrRef) -> Result<()> {
        if self.header(m).hashmod || self.header(m).odcount != self.odcount {
            if self.header(m).hashmod
                && (!self.this_plane(m) || !self.same_plane(ds, self.header(m).primary.ds))
            {
                self.dehash(ds, m, false)?;
            }
            tracing::trace!(index = m.index, "mapping compacted");
            self.dehash(ds, m, true)?;
            self.header_mut(m).odcount = self.odcount;
        }
        Ok(())
    }

    /// Number of pairs in the mapping, after compaction.
    pub fn map_size(&mut self, ds: DataspaceId, m: ArrRef) -> Result<usize> {
        self.compact(ds, m)?;
        Ok(self.size(m) >> 1)
    }

    /// Scan forward through buffer `buf` from key slot `from` (stride
    /// `step`) for the collection identical to `k`, as long as entries keep
    /// the colliding tag.
    fn collision_ahead(&self, k: ArrRef, buf: &[Value], from: usize, step: usize) -> bool {
        let mut i = from;
        while i < buf.len() {
            match buf[i].indexed() {
                Some(o) if o.index == k.index => return true,
                Some(o) if o.tag == k.tag => i += step,
                _ => break,
            }
        }
        false
    }

    /// Add two mappings; on key equality the right side wins.
    pub fn map_add(&mut self, ds: DataspaceId, m1: ArrRef, m2: ArrRef) -> Result<ArrRef> {
        self.compact(ds, m1)?;
        self.compact(ds, m2)?;
        let size = self.size(m1) + self.size(m2);
        let max = self.max_size() << 1;
        if size > max {
            return Err(Error::MappingTooLarge { size, max });
        }

        let e1 = self.header(m1).elts.clone();
        let e2 = self.header(m2).elts.clone();
        let mut out: Vec<Value> = Vec::with_capacity(size);
        let mut i = 0;
        let mut j = 0;
        while i < e1.len() && j < e2.len() {
            let c = value::cmp(&self.strings, &e1[i], &e2[j]);
            if c == Ordering::Less {
                // the smaller element is in m1
                out.push(e1[i]);
                out.push(e1[i + 1]);
                i += 2;
            } else {
                // the smaller, or overriding, element is in m2
                out.push(e2[j]);
                out.push(e2[j + 1]);
                if c == Ordering::Equal {
                    if let Some(k) = e1[i].indexed() {
                        if k.index != e2[j].indexed().expect("indexed entry").index
                            && !self.collision_ahead(k, &e2, j + 2, 2)
                        {
                            // same tag but m1's collection is not in m2 at all
                            out.push(e1[i]);
                            out.push(e1[i + 1]);
                        }
                    }
                    i += 2;
                }
                j += 2;
            }
        }
        out.extend_from_slice(&e1[i..]);
        out.extend_from_slice(&e2[j..]);

        for v in &out {
            self.ref_value(v);
        }
        Ok(self.install(ds, out))
    }

    /// Remove from `m1` every pair whose key has an equivalent in the array
    /// `a2`.
    pub fn map_sub(&mut self, ds: DataspaceId, m1: ArrRef, a2: ArrRef) -> Result<ArrRef> {
        self.compact(ds, m1)?;
        if self.size(m1) == 0 {
            return Ok(self.install(ds, Vec::new()));
        }
        if self.size(a2) == 0 {
            let elts = self.copy_elts(m1);
            return Ok(self.install(ds, elts));
        }

        let mut v2 = self.copy_scrubbed(ds, a2);
        v2.sort_by(|x, y| value::cmp(&self.strings, x, y));

        let e1 = self.header(m1).elts.clone();
        let mut out: Vec<Value> = Vec::with_capacity(e1.len());
        let mut i = 0;
        let mut j = 0;
        while i < e1.len() && j < v2.len() {
            match value::cmp(&self.strings, &e1[i], &v2[j]) {
                Ordering::Less => {
                    out.push(e1[i]);
                    out.push(e1[i + 1]);
                    i += 2;
                }
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    if let Some(k) = e1[i].indexed() {
                        if k.index != v2[j].indexed().expect("indexed entry").index
                            && !self.collision_ahead(k, &v2, j + 1, 1)
                        {
                            out.push(e1[i]);
                            out.push(e1[i + 1]);
                        }
                    }
                    i += 2;
                }
            }
        }
        out.extend_from_slice(&e1[i..]);

        for v in &out {
            self.ref_value(v);
        }
        Ok(self.install(ds, out))
    }

    /// Keep only the pairs of `m1` whose key has an equivalent in the array
    /// `a2`.
    pub fn map_intersect(&mut self, ds: DataspaceId, m1: ArrRef, a2: ArrRef) -> Result<ArrRef> {
        self.compact(ds, m1)?;
        if self.size(a2) == 0 || self.size(m1) == 0 {
            return Ok(self.install(ds, Vec::new()));
        }

        let mut v2 = self.copy_scrubbed(ds, a2);
        v2.sort_by(|x, y| value::cmp(&self.strings, x, y));

        let e1 = self.header(m1).elts.clone();
        let mut out: Vec<Value> = Vec::with_capacity(e1.len());
        let mut i = 0;
        let mut j = 0;
        while i < e1.len() && j < v2.len() {
            match value::cmp(&self.strings, &e1[i], &v2[j]) {
                Ordering::Less => i += 2,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    match e1[i].indexed() {
                        Some(k) if k.index != v2[j].indexed().expect("indexed entry").index => {
                            if self.collision_ahead(k, &v2, j + 1, 1) {
                                out.push(e1[i]);
                                out.push(e1[i + 1]);
                                i += 2;
                            }
                        }
                        _ => {
                            out.push(e1[i]);
                            out.push(e1[i + 1]);
                            i += 2;
                        }
                    }
                    j += 1;
                }
            }
        }

        for v in &out {
            self.ref_value(v);
        }
        Ok(self.install(ds, out))
    }

    /// The subrange of pairs whose keys lie between `lo` and `hi`
    /// (inclusive); `None` leaves the corresponding side open.
    pub fn map_range(
        &mut self,
        ds: DataspaceId,
        m: ArrRef,
        lo: Option<&Value>,
        hi: Option<&Value>,
    ) -> Result<ArrRef> {
        self.compact(ds, m)?;
        let len = self.size(m);
        let from = match lo {
            None => 0,
            Some(k) => match value::search(&self.strings, k, &self.header(m).elts, 2) {
                Ok(n) => n,
                Err(n) => n,
            },
        };
        let to = match hi {
            None => len,
            Some(k) => match value::search(&self.strings, k, &self.header(m).elts, 2) {
                Ok(n) => n + 2, // include the bound itself
                Err(n) => n,
            },
        };
        if from >= to {
            return Ok(self.install(ds, Vec::new()));
        }
        let slice = self.header(m).elts[from..to].to_vec();
        for v in &slice {
            self.ref_value(v);
        }
        Ok(self.install(ds, slice))
    }

    /// The keys of a mapping, in sorted order, as a fresh array.
    pub fn map_indices(&mut self, ds: DataspaceId, m: ArrRef) -> Result<ArrRef> {
        self.compact(ds, m)?;
        let keys: Vec<Value> = self.header(m).elts.iter().copied().step_by(2).collect();
        for v in &keys {
            self.ref_value(v);
        }
        Ok(self.install(ds, keys))
    }

    /// The values of a mapping, in key order, as a fresh array.
    pub fn map_values(&mut self, ds: DataspaceId, m: ArrRef) -> Result<ArrRef> {
        self.compact(ds, m)?;
        let vals: Vec<Value> = self.header(m).elts.iter().copied().skip(1).step_by(2).collect();
        for v in &vals {
            self.ref_value(v);
        }
        Ok(self.install(ds, vals))
    }
}
