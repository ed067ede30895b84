//! Handle Registry
//!
//! Maps a native handle address to the managed state that serves its
//! callbacks. The engine only ever hands the trampolines a context pointer;
//! this table is how that pointer finds its way back to a wrapper.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::callbacks::EasyState;

/// Thread-safe `address -> wrapper` table holding weak references.
///
/// Generic so multi and share wrappers can reuse it with their own state.
pub struct HandleRegistry<T> {
    entries: RwLock<HashMap<usize, Weak<T>>>,
}

impl<T> HandleRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or overwrite the entry for `address`
    pub fn register(&self, address: usize, wrapper: &Arc<T>) {
        self.entries.write().insert(address, Arc::downgrade(wrapper));
    }

    /// Strong reference to the wrapper registered at `address`.
    ///
    /// The read lock is released before returning, so callers never hold it
    /// while running a callback.
    pub fn lookup(&self, address: usize) -> Option<Arc<T>> {
        let entries = self.entries.read();
        entries.get(&address).and_then(Weak::upgrade)
    }

    /// Remove the entry for `address`; unknown addresses are ignored
    pub fn unregister(&self, address: usize) {
        self.entries.write().remove(&address);
    }

    /// Whether `address` has a live wrapper
    pub fn contains(&self, address: usize) -> bool {
        self.lookup(address).is_some()
    }

    /// Number of entries, including ones whose wrapper already dropped
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static::lazy_static! {
    /// Process-wide registry of live easy handles
    pub(crate) static ref EASY_HANDLES: HandleRegistry<EasyState> = HandleRegistry::new();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_lookup_unregister() {
        let registry: HandleRegistry<u32> = HandleRegistry::new();
        let a = Arc::new(1);
        let b = Arc::new(2);
        let c = Arc::new(3);

        registry.register(0x1000, &a);
        registry.register(0x2000, &b);
        registry.register(0x3000, &c);
        registry.unregister(0x2000);

        assert_eq!(registry.lookup(0x1000).as_deref(), Some(&1));
        assert!(registry.lookup(0x2000).is_none());
        assert_eq!(registry.lookup(0x3000).as_deref(), Some(&3));

        // Idempotent
        registry.unregister(0x2000);
        registry.unregister(0xdead);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_overwrites() {
        let registry: HandleRegistry<&'static str> = HandleRegistry::new();
        let first = Arc::new("first");
        let second = Arc::new("second");

        registry.register(0x10, &first);
        registry.register(0x10, &second);

        assert_eq!(registry.lookup(0x10).as_deref(), Some(&"second"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_dropped_wrapper_is_not_found() {
        let registry: HandleRegistry<Vec<u8>> = HandleRegistry::new();
        let wrapper = Arc::new(vec![1, 2, 3]);
        registry.register(0x42, &wrapper);
        assert!(registry.contains(0x42));

        drop(wrapper);
        assert!(registry.lookup(0x42).is_none());
        assert!(!registry.contains(0x42));
    }

    #[test]
    fn test_concurrent_lookups() {
        let registry = Arc::new(HandleRegistry::<usize>::new());
        let values: Vec<Arc<usize>> = (0..64).map(Arc::new).collect();
        for v in &values {
            registry.register(0x1000 + **v, v);
        }

        let threads: Vec<_> = (0..4)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..64 {
                        if i % 4 == t {
                            continue;
                        }
                        let found = registry.lookup(0x1000 + i).map(|v| *v);
                        assert!(found.is_none() || found == Some(i));
                    }
                })
            })
            .collect();

        for i in (0..64).step_by(4) {
            registry.unregister(0x1000 + i);
        }
        for t in threads {
            t.join().unwrap();
        }

        assert!(registry.lookup(0x1000).is_none());
        assert_eq!(registry.lookup(0x1001).as_deref(), Some(&1));
    }
}
