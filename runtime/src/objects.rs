//! Foreign object implementations
//!
//! The concrete objects the hosting runtime hands to the engine: boxed
//! arrays (typed and untyped), member records, executable callbacks, raw
//! native addresses, and delegating wrappers. Each implements exactly the
//! capabilities it supports and nothing else.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{InteropError, InteropResult};
use crate::types::ElementType;
use crate::value::{ForeignValue, Value, ValueRef};

// Identity tokens for objects that opt in to identity comparison. Zero is
// never handed out so a token is always distinguishable from "no identity".
static NEXT_IDENTITY: AtomicI64 = AtomicI64::new(1);

fn fresh_identity() -> i64 {
    NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed)
}

// ===== Arrays =====

/// Boxed array without export type metadata. Reads return whatever was
/// stored; the coercion engine applies plain numeric casts on top.
pub struct UntypedArrayObject {
    values: Mutex<Vec<Value>>,
}

impl UntypedArrayObject {
    pub fn new(values: Vec<Value>) -> Self {
        UntypedArrayObject {
            values: Mutex::new(values),
        }
    }

    pub fn from_i64(values: &[i64]) -> Self {
        Self::new(values.iter().map(|&v| Value::I64(v)).collect())
    }

    pub fn from_f64(values: &[f64]) -> Self {
        Self::new(values.iter().map(|&v| Value::Double(v)).collect())
    }
}

impl ForeignValue for UntypedArrayObject {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn has_array_elements(&self) -> bool {
        true
    }

    fn array_size(&self) -> InteropResult<u64> {
        Ok(self.values.lock().len() as u64)
    }

    fn read_array_element(&self, index: u64) -> InteropResult<Value> {
        let values = self.values.lock();
        values
            .get(index as usize)
            .cloned()
            .ok_or(InteropError::InvalidArrayIndex(index as i64))
    }

    fn write_array_element(&self, index: u64, value: Value) -> InteropResult<()> {
        let mut values = self.values.lock();
        match values.get_mut(index as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(InteropError::InvalidArrayIndex(index as i64)),
        }
    }
}

/// Boxed array carrying an explicit element type. The declared type is what
/// the coercion engine keys its access matrix on; the stored values are
/// normalized to the declared type on write.
pub struct TypedArrayObject {
    ty: ElementType,
    values: Mutex<Vec<Value>>,
}

impl TypedArrayObject {
    pub fn new(ty: ElementType, values: Vec<Value>) -> Self {
        let values = values.into_iter().map(|v| v.cast_to(ty)).collect();
        TypedArrayObject {
            ty,
            values: Mutex::new(values),
        }
    }

    pub fn zeroed(ty: ElementType, len: usize) -> Self {
        let zero = Value::I64(0).cast_to(ty);
        TypedArrayObject {
            ty,
            values: Mutex::new(vec![zero; len]),
        }
    }

    pub fn from_i64(ty: ElementType, values: &[i64]) -> Self {
        Self::new(ty, values.iter().map(|&v| Value::I64(v)).collect())
    }

    pub fn from_bytes(values: &[u8]) -> Self {
        Self::new(
            ElementType::I8,
            values.iter().map(|&v| Value::I8(v as i8)).collect(),
        )
    }
}

impl ForeignValue for TypedArrayObject {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn has_array_elements(&self) -> bool {
        true
    }

    fn array_size(&self) -> InteropResult<u64> {
        Ok(self.values.lock().len() as u64)
    }

    fn read_array_element(&self, index: u64) -> InteropResult<Value> {
        let values = self.values.lock();
        values
            .get(index as usize)
            .cloned()
            .ok_or(InteropError::InvalidArrayIndex(index as i64))
    }

    fn write_array_element(&self, index: u64, value: Value) -> InteropResult<()> {
        let mut values = self.values.lock();
        match values.get_mut(index as usize) {
            Some(slot) => {
                *slot = value.cast_to(self.ty);
                Ok(())
            }
            None => Err(InteropError::InvalidArrayIndex(index as i64)),
        }
    }

    fn element_type(&self) -> Option<ElementType> {
        Some(self.ty)
    }
}

// ===== Records =====

/// Named-member record with identity support, the shape struct fields
/// dereference into.
pub struct MemberObject {
    identity: i64,
    fields: Mutex<HashMap<String, Value>>,
}

impl MemberObject {
    pub fn new() -> Self {
        MemberObject {
            identity: fresh_identity(),
            fields: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_fields(fields: impl IntoIterator<Item = (String, Value)>) -> Self {
        MemberObject {
            identity: fresh_identity(),
            fields: Mutex::new(fields.into_iter().collect()),
        }
    }
}

impl Default for MemberObject {
    fn default() -> Self {
        Self::new()
    }
}

impl ForeignValue for MemberObject {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn has_members(&self) -> bool {
        true
    }

    fn member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.fields.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn read_member(&self, name: &str) -> InteropResult<Value> {
        self.fields
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| InteropError::UnknownIdentifier(name.to_string()))
    }

    fn write_member(&self, name: &str, value: Value) -> InteropResult<()> {
        self.fields.lock().insert(name.to_string(), value);
        Ok(())
    }

    fn identity_hash_code(&self) -> Option<i64> {
        Some(self.identity)
    }
}

// ===== Wrappers =====

/// Transparent wrapper around another foreign object. Forwards every
/// capability and exposes the inner object through `delegate`, so identity
/// and pointer equality see through it.
pub struct DelegateObject {
    inner: ValueRef,
}

impl DelegateObject {
    pub fn new(inner: ValueRef) -> Self {
        DelegateObject { inner }
    }
}

impl ForeignValue for DelegateObject {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn has_array_elements(&self) -> bool {
        self.inner.has_array_elements()
    }

    fn array_size(&self) -> InteropResult<u64> {
        self.inner.array_size()
    }

    fn read_array_element(&self, index: u64) -> InteropResult<Value> {
        self.inner.read_array_element(index)
    }

    fn write_array_element(&self, index: u64, value: Value) -> InteropResult<()> {
        self.inner.write_array_element(index, value)
    }

    fn element_type(&self) -> Option<ElementType> {
        self.inner.element_type()
    }

    fn is_pointer(&self) -> bool {
        self.inner.is_pointer()
    }

    fn as_pointer(&self) -> InteropResult<i64> {
        self.inner.as_pointer()
    }

    fn to_native(&self) -> InteropResult<i64> {
        self.inner.to_native()
    }

    fn identity_hash_code(&self) -> Option<i64> {
        self.inner.identity_hash_code()
    }

    fn has_members(&self) -> bool {
        self.inner.has_members()
    }

    fn member_names(&self) -> Vec<String> {
        self.inner.member_names()
    }

    fn read_member(&self, name: &str) -> InteropResult<Value> {
        self.inner.read_member(name)
    }

    fn write_member(&self, name: &str, value: Value) -> InteropResult<()> {
        self.inner.write_member(name, value)
    }

    fn is_executable(&self) -> bool {
        self.inner.is_executable()
    }

    fn execute(&self, args: &[Value]) -> InteropResult<Value> {
        self.inner.execute(args)
    }

    fn delegate(&self) -> Option<ValueRef> {
        Some(Arc::clone(&self.inner))
    }
}

/// Raw native address exposed as a foreign object.
pub struct RawPointerObject {
    address: i64,
}

impl RawPointerObject {
    pub fn new(address: i64) -> Self {
        RawPointerObject { address }
    }
}

impl ForeignValue for RawPointerObject {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn is_pointer(&self) -> bool {
        true
    }

    fn as_pointer(&self) -> InteropResult<i64> {
        Ok(self.address)
    }
}

/// Host closure exposed through the execute capability.
pub struct CallbackObject {
    callback: Box<dyn Fn(&[Value]) -> InteropResult<Value> + Send + Sync>,
}

impl CallbackObject {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&[Value]) -> InteropResult<Value> + Send + Sync + 'static,
    {
        CallbackObject {
            callback: Box::new(callback),
        }
    }
}

impl ForeignValue for CallbackObject {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn is_executable(&self) -> bool {
        true
    }

    fn execute(&self, args: &[Value]) -> InteropResult<Value> {
        (self.callback)(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untyped_array_returns_stored_value() {
        let arr = UntypedArrayObject::from_f64(&[1.5, 2.5]);
        assert_eq!(arr.read_array_element(1).unwrap(), Value::Double(2.5));
        assert!(arr.element_type().is_none());
    }

    #[test]
    fn test_untyped_array_out_of_range() {
        let arr = UntypedArrayObject::from_i64(&[1]);
        assert_eq!(
            arr.read_array_element(1).unwrap_err(),
            InteropError::InvalidArrayIndex(1)
        );
    }

    #[test]
    fn test_typed_array_normalizes_on_write() {
        let arr = TypedArrayObject::zeroed(ElementType::I8, 2);
        arr.write_array_element(0, Value::I32(0x1FF)).unwrap();
        assert_eq!(arr.read_array_element(0).unwrap(), Value::I8(-1));
    }

    #[test]
    fn test_typed_array_reports_element_type() {
        let arr = TypedArrayObject::from_bytes(&[1, 2, 3]);
        assert_eq!(arr.element_type(), Some(ElementType::I8));
        assert_eq!(arr.array_size().unwrap(), 3);
    }

    #[test]
    fn test_member_object_round_trip() {
        let obj = MemberObject::new();
        obj.write_member("x", Value::I64(7)).unwrap();
        assert_eq!(obj.read_member("x").unwrap(), Value::I64(7));
        assert_eq!(obj.member_names(), vec!["x".to_string()]);
    }

    #[test]
    fn test_member_object_unknown_identifier() {
        let obj = MemberObject::new();
        assert_eq!(
            obj.read_member("missing").unwrap_err(),
            InteropError::UnknownIdentifier("missing".to_string())
        );
    }

    #[test]
    fn test_member_object_identity_tokens_are_unique() {
        let a = MemberObject::new();
        let b = MemberObject::new();
        assert_ne!(a.identity_hash_code(), b.identity_hash_code());
    }

    #[test]
    fn test_delegate_forwards_members() {
        let inner: ValueRef = Arc::new(MemberObject::new());
        inner.write_member("f", Value::I32(3)).unwrap();
        let wrapper = DelegateObject::new(Arc::clone(&inner));
        assert_eq!(wrapper.read_member("f").unwrap(), Value::I32(3));
        assert!(wrapper.delegate().is_some());
    }

    #[test]
    fn test_callback_executes() {
        let cb = CallbackObject::new(|args| {
            let sum: i64 = args.iter().filter_map(|v| v.as_i64()).sum();
            Ok(Value::I64(sum))
        });
        assert!(cb.is_executable());
        assert_eq!(
            cb.execute(&[Value::I32(1), Value::I64(2)]).unwrap(),
            Value::I64(3)
        );
    }
}
