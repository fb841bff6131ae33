//! Dereference handle registry
//!
//! A handle is a stable integer alias for a managed object, usable anywhere
//! a native address is expected. Ids come from a reserved region of the
//! address space so `is_handle` can tell them apart from plain native
//! pointers, and the table is bidirectional: allocating a handle for the
//! same object twice returns the same id.
//!
//! The registry is an explicit object handed to whoever needs it. A
//! process-wide instance backs the builtin surface (see `builtins`), but
//! nothing in the engine reaches for it implicitly.

use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::error::{InteropError, InteropResult};
use crate::pointer::Pointer;
use crate::value::{resolve_delegate, Value, ValueRef};

/// Start of the reserved handle id region (top bit set, below any address a
/// native allocator hands out as a positive offset).
pub const HANDLE_SPACE_START: i64 = i64::MIN;
/// Exclusive end of the reserved region.
pub const HANDLE_SPACE_END: i64 = i64::MIN / 2;

/// Handles are spaced so that small pointer arithmetic on a handle stays
/// inside the id's slot and `deref` can recover the base id.
pub const HANDLE_SLOT_SIZE: i64 = 0x1000;

/// True if `id` lies in the reserved handle region.
pub fn is_handle(id: i64) -> bool {
    (HANDLE_SPACE_START..HANDLE_SPACE_END).contains(&id)
}

struct HandleTable {
    by_id: HashMap<i64, ValueRef>,
    by_object: HashMap<usize, i64>,
    next_id: i64,
}

/// Bidirectional object <-> id table behind one lock.
pub struct HandleRegistry {
    table: Mutex<HandleTable>,
}

fn object_key(target: &ValueRef) -> usize {
    Arc::as_ptr(&resolve_delegate(target)) as *const u8 as usize
}

impl HandleRegistry {
    pub fn new() -> Self {
        HandleRegistry {
            table: Mutex::new(HandleTable {
                by_id: HashMap::new(),
                by_object: HashMap::new(),
                next_id: HANDLE_SPACE_START,
            }),
        }
    }

    /// Allocate (or look up) the handle id for `target`. Safe to call from
    /// any number of threads; ids never collide.
    pub fn allocate(&self, target: &ValueRef) -> i64 {
        let mut table = self.table.lock();
        let key = object_key(target);
        if let Some(&id) = table.by_object.get(&key) {
            return id;
        }
        let id = table.next_id;
        table.next_id += HANDLE_SLOT_SIZE;
        table.by_id.insert(id, Arc::clone(target));
        table.by_object.insert(key, id);
        id
    }

    /// Target of a live handle.
    pub fn resolve(&self, id: i64) -> InteropResult<ValueRef> {
        self.table
            .lock()
            .by_id
            .get(&id)
            .cloned()
            .ok_or(InteropError::UnknownHandle(id))
    }

    pub fn is_allocated(&self, id: i64) -> bool {
        self.table.lock().by_id.contains_key(&id)
    }

    /// Drop a handle. The id becomes unknown; the target stays alive only
    /// through whatever other references exist.
    pub fn release(&self, id: i64) -> InteropResult<()> {
        let mut table = self.table.lock();
        match table.by_id.remove(&id) {
            Some(target) => {
                let key = object_key(&target);
                table.by_object.remove(&key);
                Ok(())
            }
            None => Err(InteropError::UnknownHandle(id)),
        }
    }

    /// Canonicalize a pointer-like value into a `(base, offset)` pointer,
    /// substituting the managed target when the value is a raw handle id.
    /// This is what makes raw-handle access and wrapped-pointer access
    /// behave identically.
    pub fn deref(&self, value: &Value) -> InteropResult<Pointer> {
        match value {
            Value::Pointer(p) => Ok(p.clone()),
            Value::Foreign(obj) => Ok(Pointer::to_object(Arc::clone(obj))),
            _ => {
                let raw = value
                    .as_i64()
                    .ok_or(InteropError::UnsupportedMessage("pointer operand"))?;
                if is_handle(raw) {
                    let slot = raw - (raw - HANDLE_SPACE_START) % HANDLE_SLOT_SIZE;
                    let target = self.resolve(slot)?;
                    Ok(Pointer::new(Some(target), raw - slot))
                } else {
                    Ok(Pointer::from_raw(raw))
                }
            }
        }
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    static ref GLOBAL_REGISTRY: HandleRegistry = HandleRegistry::new();
}

/// Process-wide registry used by the builtin surface.
pub fn global() -> &'static HandleRegistry {
    &GLOBAL_REGISTRY
}
