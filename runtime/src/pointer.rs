//! Pointer arithmetic and identity
//!
//! A pointer is a `(base, offset)` pair. `base == None` is a pure native
//! address; a managed base keeps the target object reachable while arithmetic
//! rewrites the offset. Arithmetic never materializes a managed base into an
//! integer, so `(base + k) - (base + j)` cancels the base exactly and yields
//! the plain difference `k - j`.

use std::sync::Arc;

use crate::access;
use crate::error::InteropResult;
use crate::types::ElementType;
use crate::value::{resolve_delegate, values_identical, Value, ValueRef};

/// `(base, offset)` pointer. Equality is identity of the base plus exact
/// offset match, never structural comparison of the base's contents.
#[derive(Clone)]
pub struct Pointer {
    base: Option<ValueRef>,
    offset: i64,
}

impl Pointer {
    pub fn null() -> Self {
        Pointer {
            base: None,
            offset: 0,
        }
    }

    /// Pure native address, no managed base.
    pub fn from_raw(address: i64) -> Self {
        Pointer {
            base: None,
            offset: address,
        }
    }

    /// Pointer to the start of a managed object.
    pub fn to_object(base: ValueRef) -> Self {
        Pointer {
            base: Some(base),
            offset: 0,
        }
    }

    pub fn new(base: Option<ValueRef>, offset: i64) -> Self {
        Pointer { base, offset }
    }

    pub fn base(&self) -> Option<&ValueRef> {
        self.base.as_ref()
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn is_null(&self) -> bool {
        self.base.is_none() && self.offset == 0
    }

    /// Same base, shifted offset.
    pub fn with_offset(&self, delta: i64) -> Self {
        Pointer {
            base: self.base.clone(),
            offset: self.offset.wrapping_add(delta),
        }
    }

    /// Native integer value. A managed base must itself support the pointer
    /// capability for this to succeed.
    pub fn to_native(&self) -> InteropResult<i64> {
        match &self.base {
            None => Ok(self.offset),
            Some(base) => Ok(base.to_native()?.wrapping_add(self.offset)),
        }
    }

    fn base_token(&self) -> i64 {
        match &self.base {
            None => 0,
            Some(base) => {
                let resolved = resolve_delegate(base);
                resolved
                    .identity_hash_code()
                    .unwrap_or(Arc::as_ptr(&resolved) as *const u8 as i64)
            }
        }
    }

    /// Identity hash consistent with pointer equality: equal pointers hash
    /// equal because the token is derived from the resolved base's identity.
    pub fn identity_hash_code(&self) -> i64 {
        self.base_token().wrapping_mul(31).wrapping_add(self.offset)
    }
}

impl PartialEq for Pointer {
    fn eq(&self, other: &Self) -> bool {
        if self.offset != other.offset {
            return false;
        }
        match (&self.base, &other.base) {
            (None, None) => true,
            (Some(a), Some(b)) => values_identical(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Pointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.base {
            None => write!(f, "0x{:x}", self.offset),
            Some(_) => write!(f, "<managed>+0x{:x}", self.offset),
        }
    }
}

// ===== Arithmetic =====
//
// Offsets combine with wrapping two's-complement semantics. When both
// operands carry a managed base the left base survives, except subtraction
// of two pointers into the same object, which cancels the base entirely.

fn merge_bases(a: &Pointer, b: &Pointer) -> Option<ValueRef> {
    a.base.clone().or_else(|| b.base.clone())
}

pub fn add(a: &Pointer, b: &Pointer) -> Pointer {
    Pointer {
        base: merge_bases(a, b),
        offset: a.offset.wrapping_add(b.offset),
    }
}

pub fn sub(a: &Pointer, b: &Pointer) -> Pointer {
    if let (Some(base_a), Some(base_b)) = (&a.base, &b.base) {
        if values_identical(base_a, base_b) {
            return Pointer {
                base: None,
                offset: a.offset.wrapping_sub(b.offset),
            };
        }
    }
    Pointer {
        base: merge_bases(a, b),
        offset: a.offset.wrapping_sub(b.offset),
    }
}

pub fn mul(a: &Pointer, b: &Pointer) -> Pointer {
    Pointer {
        base: merge_bases(a, b),
        offset: a.offset.wrapping_mul(b.offset),
    }
}

pub fn xor(a: &Pointer, b: &Pointer) -> Pointer {
    Pointer {
        base: merge_bases(a, b),
        offset: a.offset ^ b.offset,
    }
}

// ===== Dereference =====

/// Read through a managed pointer: forwards to the base's array capability
/// at element index `offset`, with the usual typed coercion.
pub fn deref_read(pointer: &Pointer, requested: ElementType) -> InteropResult<Value> {
    match &pointer.base {
        Some(base) => access::read_element(base, pointer.offset, requested),
        None => Err(crate::error::InteropError::UnsupportedMessage(
            "dereference of a raw native pointer",
        )),
    }
}

/// Write through a managed pointer. Same forwarding as `deref_read`.
pub fn deref_write(pointer: &Pointer, requested: ElementType, value: Value) -> InteropResult<()> {
    match &pointer.base {
        Some(base) => access::write_element(base, pointer.offset, requested, value),
        None => Err(crate::error::InteropError::UnsupportedMessage(
            "dereference of a raw native pointer",
        )),
    }
}

/// Compare-and-swap on a named member of a managed object.
///
/// The comparison is value equality of the current member against
/// `expected` (pointer operands compare by base identity and offset), not
/// identity of the container. Single-threaded semantics: the read and the
/// conditional write are not atomic with respect to other threads.
pub fn compare_exchange_member(
    container: &ValueRef,
    member: &str,
    expected: &Value,
    new: Value,
) -> InteropResult<bool> {
    let current = container.read_member(member)?;
    if current == *expected {
        container.write_member(member, new)?;
        Ok(true)
    } else {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{DelegateObject, MemberObject, UntypedArrayObject};

    fn managed_base() -> ValueRef {
        Arc::new(UntypedArrayObject::from_i64(&[10, 20, 30]))
    }

    #[test]
    fn test_algebra_cancellation() {
        let base = managed_base();
        let a = Pointer::to_object(Arc::clone(&base)).with_offset(37);
        let b = Pointer::to_object(base).with_offset(-5);
        let diff = sub(&a, &b);
        assert!(diff.base().is_none());
        assert_eq!(diff.offset(), 42);
        assert_eq!(diff.to_native().unwrap(), 42);
    }

    #[test]
    fn test_cancellation_with_negative_intermediate() {
        let base = managed_base();
        let a = Pointer::to_object(Arc::clone(&base)).with_offset(-100);
        let b = Pointer::to_object(base).with_offset(3);
        assert_eq!(sub(&a, &b).offset(), -103);
    }

    #[test]
    fn test_add_keeps_base() {
        let base = managed_base();
        let p = add(
            &Pointer::to_object(Arc::clone(&base)),
            &Pointer::from_raw(16),
        );
        assert_eq!(p.offset(), 16);
        assert!(values_identical(p.base().unwrap(), &base));
    }

    #[test]
    fn test_equality_same_base_same_offset() {
        let base = managed_base();
        let a = Pointer::to_object(Arc::clone(&base)).with_offset(8);
        let b = Pointer::to_object(base).with_offset(8);
        assert_eq!(a, b);
        assert_eq!(a.identity_hash_code(), b.identity_hash_code());
    }

    #[test]
    fn test_equality_distinct_bases() {
        let a = Pointer::to_object(managed_base());
        let b = Pointer::to_object(managed_base());
        assert_ne!(a, b);
    }

    #[test]
    fn test_equality_same_base_different_offset() {
        let base = managed_base();
        let a = Pointer::to_object(Arc::clone(&base));
        let b = Pointer::to_object(base).with_offset(1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_equality_through_delegate_wrapper() {
        let base = managed_base();
        let wrapped: ValueRef = Arc::new(DelegateObject::new(Arc::clone(&base)));
        let a = Pointer::to_object(base).with_offset(4);
        let b = Pointer::to_object(wrapped).with_offset(4);
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_via_identity_capability() {
        let obj = Arc::new(MemberObject::new());
        let a: ValueRef = Arc::clone(&obj) as ValueRef;
        let b: ValueRef = obj as ValueRef;
        // Same instance behind two refs, compared via the identity token.
        assert_eq!(Pointer::to_object(a), Pointer::to_object(b));
    }

    #[test]
    fn test_deref_read_forwards_to_base() {
        let base = managed_base();
        let p = Pointer::to_object(base).with_offset(1);
        let v = deref_read(&p, ElementType::I64).unwrap();
        assert_eq!(v, Value::I64(20));
    }

    #[test]
    fn test_compare_exchange_member() {
        let obj: ValueRef = Arc::new(MemberObject::new());
        obj.write_member("field", Value::I32(1)).unwrap();
        assert!(
            compare_exchange_member(&obj, "field", &Value::I32(1), Value::I32(2)).unwrap()
        );
        assert_eq!(obj.read_member("field").unwrap(), Value::I32(2));
        assert!(
            !compare_exchange_member(&obj, "field", &Value::I32(1), Value::I32(3)).unwrap()
        );
        assert_eq!(obj.read_member("field").unwrap(), Value::I32(2));
    }
}
