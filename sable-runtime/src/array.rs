//! Set algebra over arrays.
//!
//! All binary operations produce fresh arrays owning fresh element
//! references; operands are never mutated beyond the lazy scrub that
//! replaces references to destructed objects with nil. The asymmetric
//! operations preserve the left operand's order:
//!
//! | operation | result |
//! |-----------|--------|
//! | [`add`](crate::Runtime::add) | `A · B` |
//! | [`sub`](crate::Runtime::sub) | elements of `A` absent from `B` |
//! | [`intersect`](crate::Runtime::intersect) | `A − (A − B)` |
//! | [`setadd`](crate::Runtime::setadd) | `A · (B − A)` |
//! | [`setxadd`](crate::Runtime::setxadd) | `(A − B) · (B − A)` |
//!
//! Membership tests sort a temporary copy of one operand and binary-search
//! it for each element of the other, so the cost is `O((m + n) log n)`
//! rather than quadratic.

use crate::collection::ArrRef;
use crate::dataspace::DataspaceId;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::value::{self, Value};

impl Runtime {
    /// Clone a collection's buffer, taking a reference on every copy.
    pub(crate) fn copy_elts(&mut self, a: ArrRef) -> Vec<Value> {
        let out = self.header(a).elts.clone();
        for v in &out {
            self.ref_value(v);
        }
        out
    }

    /// Replace every element of `a` that refers to a destructed object with
    /// nil, recording each write in the active plane. No-op unless the
    /// collection's destruct epoch is stale.
    pub(crate) fn scrub_if_stale(&mut self, a: ArrRef) {
        let ds = self.header(a).primary.ds;
        if self.header(a).odcount != self.odcount {
            self.header_mut(a).odcount = self.odcount;
            self.scrub_walk(ds, a);
        }
    }

    /// Scrub `a` if stale, then return a bitwise copy of its buffer. The
    /// copy owns no references; it exists only for the duration of one
    /// operation.
    pub(crate) fn copy_scrubbed(&mut self, ds: DataspaceId, a: ArrRef) -> Vec<Value> {
        if self.header(a).odcount != self.odcount {
            self.header_mut(a).odcount = self.odcount;
            self.scrub_walk(ds, a);
        }
        self.header(a).elts.clone()
    }

    fn scrub_walk(&mut self, ds: DataspaceId, a: ArrRef) {
        let n = self.header(a).elts.len();
        for i in 0..n {
            let v = self.header(a).elts[i];
            if self.value_destructed(&v) {
                self.assign_elt(ds, a, i, Value::Nil);
            }
        }
    }

    /// Concatenate two arrays.
    pub fn add(&mut self, ds: DataspaceId, a1: ArrRef, a2: ArrRef) -> Result<ArrRef> {
        let size = self.size(a1) + self.size(a2);
        if size > self.max_size() {
            return Err(Error::ArrayTooLarge {
                size,
                max: self.max_size(),
            });
        }
        let mut elts = self.header(a1).elts.clone();
        elts.extend_from_slice(&self.header(a2).elts);
        for v in &elts {
            self.ref_value(v);
        }
        Ok(self.install(ds, elts))
    }

    /// Multiset difference: the elements of `a1` without an equivalent in
    /// `a2`, in `a1`'s order.
    pub fn sub(&mut self, ds: DataspaceId, a1: ArrRef, a2: ArrRef) -> Result<ArrRef> {
        if self.size(a2) == 0 {
            let elts = self.copy_elts(a1);
            return Ok(self.install(ds, elts));
        }
        if self.size(a1) == 0 {
            return Ok(self.install(ds, Vec::new()));
        }

        let mut v2 = self.copy_scrubbed(ds, a2);
        v2.sort_by(|x, y| value::cmp(&self.strings, x, y));

        self.scrub_if_stale(a1);
        let src = self.header(a1).elts.clone();
        let mut out = Vec::new();
        for v in &src {
            if value::search(&self.strings, v, &v2, 1).is_err() {
                out.push(*v);
            }
        }
        for v in &out {
            self.ref_value(v);
        }
        Ok(self.install(ds, out))
    }

    /// `A − (A − B)`: the elements of `a1` whose equivalent appears in
    /// `a2`, in `a1`'s order. If both inputs are sets, so is the result.
    pub fn intersect(&mut self, ds: DataspaceId, a1: ArrRef, a2: ArrRef) -> Result<ArrRef> {
        if self.size(a1) == 0 || self.size(a2) == 0 {
            return Ok(self.install(ds, Vec::new()));
        }

        let mut v2 = self.copy_scrubbed(ds, a2);
        v2.sort_by(|x, y| value::cmp(&self.strings, x, y));

        self.scrub_if_stale(a1);
        let src = self.header(a1).elts.clone();
        let mut out = Vec::new();
        for v in &src {
            if value::search(&self.strings, v, &v2, 1).is_ok() {
                out.push(*v);
            }
        }
        for v in &out {
            self.ref_value(v);
        }
        Ok(self.install(ds, out))
    }

    /// `A · (B − A)`: `a1` extended with the elements of `a2` it lacks.
    pub fn setadd(&mut self, ds: DataspaceId, a1: ArrRef, a2: ArrRef) -> Result<ArrRef> {
        if self.size(a1) == 0 {
            let elts = self.copy_elts(a2);
            return Ok(self.install(ds, elts));
        }
        if self.size(a2) == 0 {
            let elts = self.copy_elts(a1);
            return Ok(self.install(ds, elts));
        }

        let mut v1 = self.copy_scrubbed(ds, a1);
        v1.sort_by(|x, y| value::cmp(&self.strings, x, y));

        self.scrub_if_stale(a2);
        let src = self.header(a2).elts.clone();
        let mut extra = Vec::new();
        for v in &src {
            if value::search(&self.strings, v, &v1, 1).is_err() {
                extra.push(*v);
            }
        }

        let size = self.size(a1) + extra.len();
        if size > self.max_size() {
            return Err(Error::ArrayTooLarge {
                size,
                max: self.max_size(),
            });
        }
        let mut out = self.copy_elts(a1);
        for v in &extra {
            self.ref_value(v);
        }
        out.extend_from_slice(&extra);
        Ok(self.install(ds, out))
    }

    /// Symmetric difference `(A − B) · (B − A)`, `a1`'s order for its half
    /// and `a2`'s for the other.
    pub fn setxadd(&mut self, ds: DataspaceId, a1: ArrRef, a2: ArrRef) -> Result<ArrRef> {
        if self.size(a1) == 0 {
            let elts = self.copy_elts(a2);
            return Ok(self.install(ds, elts));
        }
        if self.size(a2) == 0 {
            let elts = self.copy_elts(a1);
            return Ok(self.install(ds, elts));
        }

        let v1 = self.copy_scrubbed(ds, a1);
        let mut v2 = self.copy_scrubbed(ds, a2);
        v2.sort_by(|x, y| value::cmp(&self.strings, x, y));

        // split a1 into its exclusive half and the overlap
        let mut out = Vec::new();
        let mut common = Vec::new();
        for v in &v1 {
            if value::search(&self.strings, v, &v2, 1).is_err() {
                out.push(*v);
            } else {
                common.push(*v);
            }
        }
        common.sort_by(|x, y| value::cmp(&self.strings, x, y));

        let src = self.header(a2).elts.clone();
        for v in &src {
            if value::search(&self.strings, v, &common, 1).is_err() {
                out.push(*v);
            }
        }

        if out.len() > self.max_size() {
            return Err(Error::ArrayTooLarge {
                size: out.len(),
                max: self.max_size(),
            });
        }
        for v in &out {
            self.ref_value(v);
        }
        Ok(self.install(ds, out))
    }

    /// Validate an array index, returning it as a buffer offset.
    pub fn check_index(&self, a: ArrRef, index: i64) -> Result<usize> {
        let size = self.size(a);
        if index < 0 || index >= size as i64 {
            return Err(Error::IndexOutOfRange { index, size });
        }
        Ok(index as usize)
    }

    /// Validate an inclusive subrange, returning it half-open. `lo == hi + 1`
    /// denotes the empty range and is allowed.
    pub fn check_range(&self, a: ArrRef, lo: i64, hi: i64) -> Result<(usize, usize)> {
        let size = self.size(a);
        if lo < 0 || hi >= size as i64 || lo > hi + 1 {
            return Err(Error::InvalidRange { lo, hi, size });
        }
        Ok((lo as usize, (hi + 1) as usize))
    }

    /// Copy the inclusive subrange `lo..=hi` of `a` into a fresh array.
    pub fn range(&mut self, ds: DataspaceId, a: ArrRef, lo: i64, hi: i64) -> Result<ArrRef> {
        let (start, end) = self.check_range(a, lo, hi)?;
        let slice = self.header(a).elts[start..end].to_vec();
        for v in &slice {
            self.ref_value(v);
        }
        Ok(self.install(ds, slice))
    }
}
