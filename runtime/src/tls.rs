//! Thread-local destructor registry
//!
//! Per-thread key/value slots in the pthread_key_create mold: a key is
//! created once with an optional destructor, every thread gets its own slot
//! for it, and when a thread terminates the destructor runs exactly once on
//! that thread with the thread's last-set value. Keys deleted before a
//! thread exits never fire for it.
//!
//! Slots live in a true thread-local so teardown rides the thread-local
//! drop that the runtime guarantees on normal thread exit. The registry
//! itself only holds the key table (destructors and liveness) behind a
//! lock, so any number of threads can create keys and set values
//! concurrently.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::value::Value;

pub type Destructor = Arc<dyn Fn(Value) + Send + Sync>;

/// Key into per-thread storage. Plain copyable token; sharing it across
/// threads is the whole point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TlsKey(u64);

struct KeyTable {
    destructors: HashMap<u64, Option<Destructor>>,
}

struct RegistryInner {
    keys: Mutex<KeyTable>,
}

/// Shared key registry. Clones refer to the same key table.
#[derive(Clone)]
pub struct TlsRegistry {
    inner: Arc<RegistryInner>,
}

// Key ids are unique process-wide so slots from different registries never
// collide inside one thread's slot map.
static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_SLOTS: RefCell<ThreadSlots> = RefCell::new(ThreadSlots::default());
}

#[derive(Default)]
struct ThreadSlots {
    values: HashMap<u64, (Weak<RegistryInner>, Value)>,
}

impl Drop for ThreadSlots {
    fn drop(&mut self) {
        for (key, (registry, value)) in self.values.drain() {
            let Some(registry) = registry.upgrade() else {
                continue;
            };
            // A key deleted before thread exit has no table entry and
            // therefore no destructor to run.
            let destructor = registry.keys.lock().destructors.get(&key).cloned();
            if let Some(Some(destructor)) = destructor {
                destructor(value);
            }
        }
    }
}

impl TlsRegistry {
    pub fn new() -> Self {
        TlsRegistry {
            inner: Arc::new(RegistryInner {
                keys: Mutex::new(KeyTable {
                    destructors: HashMap::new(),
                }),
            }),
        }
    }

    /// Create a key, optionally with a destructor that runs on each thread's
    /// exit with that thread's last-set value.
    pub fn create_key(&self, destructor: Option<Destructor>) -> TlsKey {
        let id = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
        self.inner.keys.lock().destructors.insert(id, destructor);
        TlsKey(id)
    }

    /// Delete a key. Existing per-thread values stay in place but their
    /// destructor will not fire.
    pub fn delete_key(&self, key: TlsKey) {
        self.inner.keys.lock().destructors.remove(&key.0);
    }

    /// Set the calling thread's value for `key`, replacing any previous one.
    pub fn set(&self, key: TlsKey, value: Value) {
        let registry = Arc::downgrade(&self.inner);
        THREAD_SLOTS.with(|slots| {
            slots.borrow_mut().values.insert(key.0, (registry, value));
        });
    }

    /// The calling thread's value for `key`, if it ever set one.
    pub fn get(&self, key: TlsKey) -> Option<Value> {
        THREAD_SLOTS.with(|slots| {
            slots
                .borrow()
                .values
                .get(&key.0)
                .map(|(_, value)| value.clone())
        })
    }

    /// Remove the calling thread's value for `key` without running the
    /// destructor.
    pub fn clear(&self, key: TlsKey) -> Option<Value> {
        THREAD_SLOTS.with(|slots| {
            slots
                .borrow_mut()
                .values
                .remove(&key.0)
                .map(|(_, value)| value)
        })
    }
}

impl Default for TlsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
