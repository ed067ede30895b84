//! Owned-Memory Ledger
//!
//! Records every allocation the engine keeps a pointer to after a setopt
//! call returns. Entries are released in bulk on reset or cleanup, or from a
//! mark onward when a multi-step native construction fails partway.

use std::ffi::CString;
use std::fmt;
use std::os::raw::c_void;
use std::sync::Arc;

use tracing::warn;

use crate::ffi::{CurlSlist, NativeApi};

/// Native string list owned by one or more ledgers
pub struct NativeList {
    head: *mut CurlSlist,
    api: Arc<dyn NativeApi>,
}

// The list is never mutated after it is built; only the engine reads it.
unsafe impl Send for NativeList {}
unsafe impl Sync for NativeList {}

impl NativeList {
    /// Take ownership of a list built with `api`
    ///
    /// # Safety
    /// `head` must be null or a list returned by `api.slist_append` that no
    /// one else frees.
    pub unsafe fn from_raw(head: *mut CurlSlist, api: Arc<dyn NativeApi>) -> Self {
        Self { head, api }
    }

    pub fn as_ptr(&self) -> *mut CurlSlist {
        self.head
    }
}

impl Drop for NativeList {
    fn drop(&mut self) {
        if self.head.is_null() {
            return;
        }
        if let Err(e) = unsafe { self.api.slist_free_all(self.head) } {
            warn!(error = %e, "failed to free native list");
        }
        self.head = std::ptr::null_mut();
    }
}

impl fmt::Debug for NativeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeList").field("head", &self.head).finish()
    }
}

/// One natively referenced allocation
#[derive(Debug, Clone)]
pub enum Allocation {
    /// NUL-terminated copy of an option string
    Text(Arc<CString>),
    /// Native string list
    List(Arc<NativeList>),
    /// Caller buffer the engine reads without copying
    Buffer(Arc<[u8]>),
}

impl Allocation {
    /// Address the engine was given
    pub fn address(&self) -> *const c_void {
        match self {
            Allocation::Text(s) => s.as_ptr() as *const c_void,
            Allocation::List(l) => l.as_ptr() as *const c_void,
            Allocation::Buffer(b) => b.as_ptr() as *const c_void,
        }
    }

    /// Whether a duplicated handle may keep referencing this allocation
    pub fn is_shareable(&self) -> bool {
        !matches!(self, Allocation::Text(_))
    }
}

/// Ordered record of allocations belonging to one wrapper
#[derive(Debug, Default)]
pub struct Ledger {
    entries: Vec<Option<Allocation>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an allocation; returns its index
    pub fn append(&mut self, allocation: Allocation) -> usize {
        debug_assert!(
            !self.contains(allocation.address()),
            "allocation recorded twice"
        );
        self.entries.push(Some(allocation));
        self.entries.len() - 1
    }

    /// Mark for a later [`Ledger::truncate_from`]
    pub fn position(&self) -> usize {
        self.entries.len()
    }

    /// Release every allocation recorded at or after `mark`.
    ///
    /// Returns how many were released. Each slot is emptied before the
    /// allocation drops, so repeated calls never release twice.
    pub fn truncate_from(&mut self, mark: usize) -> usize {
        if mark >= self.entries.len() {
            return 0;
        }
        let released = self.entries[mark..]
            .iter_mut()
            .filter_map(Option::take)
            .count();
        self.entries.truncate(mark);
        released
    }

    /// Release everything
    pub fn release_all(&mut self) -> usize {
        self.truncate_from(0)
    }

    /// Live allocations
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an allocation at `address` is recorded
    pub fn contains(&self, address: *const c_void) -> bool {
        self.entries
            .iter()
            .flatten()
            .any(|a| a.address() == address)
    }

    /// Allocations a duplicated handle still points into
    pub fn shared(&self) -> Vec<Allocation> {
        self.entries
            .iter()
            .flatten()
            .filter(|a| a.is_shareable())
            .cloned()
            .collect()
    }
}
