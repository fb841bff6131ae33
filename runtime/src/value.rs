//! Foreign value capability protocol
//!
//! A foreign value is an opaque object owned by the surrounding runtime and
//! manipulated only through the capability set below. Every capability has a
//! default "unsupported" implementation, so an object opts in message by
//! message; the engine queries capabilities instead of downcasting.
//!
//! `Value` is the engine's boxed union: the result of any read and the
//! payload of any write is either a primitive, a pointer, or another foreign
//! value. The engine never takes ownership of a foreign value's backing
//! storage; writes go through the value's own write capability.

use std::sync::Arc;

use crate::error::{InteropError, InteropResult};
use crate::pointer::Pointer;
use crate::types::ElementType;

/// Shared reference to a foreign object.
pub type ValueRef = Arc<dyn ForeignValue>;

/// Capability set a foreign object may expose.
///
/// Defaults make every message unsupported; implementors override only what
/// they actually provide. `element_type` is the optional typed-array
/// descriptor: `None` means the array is untyped and its element kind is
/// inferred from the values it reports at access time.
pub trait ForeignValue: Send + Sync {
    /// Concrete-type escape hatch for engine components that own their
    /// receiver kind (vararg cursors, buffers).
    fn as_any(&self) -> &dyn std::any::Any;

    // --- array capability ---

    fn has_array_elements(&self) -> bool {
        false
    }

    fn array_size(&self) -> InteropResult<u64> {
        Err(InteropError::UnsupportedMessage("array_size"))
    }

    fn is_array_element_readable(&self, index: u64) -> bool {
        self.has_array_elements()
            && self.array_size().map(|size| index < size).unwrap_or(false)
    }

    fn is_array_element_modifiable(&self, index: u64) -> bool {
        self.is_array_element_readable(index)
    }

    /// Fixed-extent receivers never allow insertion past the end.
    fn is_array_element_insertable(&self, _index: u64) -> bool {
        false
    }

    fn read_array_element(&self, _index: u64) -> InteropResult<Value> {
        Err(InteropError::UnsupportedMessage("read_array_element"))
    }

    fn write_array_element(&self, _index: u64, _value: Value) -> InteropResult<()> {
        Err(InteropError::UnsupportedMessage("write_array_element"))
    }

    /// Declared element type, if this object carries export type metadata.
    fn element_type(&self) -> Option<ElementType> {
        None
    }

    // --- pointer capability ---

    fn is_pointer(&self) -> bool {
        false
    }

    fn as_pointer(&self) -> InteropResult<i64> {
        Err(InteropError::UnsupportedMessage("as_pointer"))
    }

    /// Force a native representation. Defaults to `as_pointer`.
    fn to_native(&self) -> InteropResult<i64> {
        self.as_pointer()
    }

    // --- identity capability ---

    /// Stable identity token. `None` means the object does not support
    /// identity comparison and falls back to reference equality.
    fn identity_hash_code(&self) -> Option<i64> {
        None
    }

    fn is_identical_or_undefined(&self, other: &dyn ForeignValue) -> Option<bool> {
        match (self.identity_hash_code(), other.identity_hash_code()) {
            (Some(a), Some(b)) => Some(a == b),
            _ => None,
        }
    }

    // --- member capability ---

    fn has_members(&self) -> bool {
        false
    }

    fn member_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn read_member(&self, name: &str) -> InteropResult<Value> {
        Err(InteropError::UnknownIdentifier(name.to_string()))
    }

    fn write_member(&self, name: &str, _value: Value) -> InteropResult<()> {
        Err(InteropError::UnknownIdentifier(name.to_string()))
    }

    // --- execute capability ---

    fn is_executable(&self) -> bool {
        false
    }

    fn execute(&self, _args: &[Value]) -> InteropResult<Value> {
        Err(InteropError::UnsupportedMessage("execute"))
    }

    // --- wrapper transparency ---

    /// Delegating wrappers return their inner object here so identity
    /// comparison and pointer equality see through them.
    fn delegate(&self) -> Option<ValueRef> {
        None
    }
}

/// Follow `delegate` links to the innermost object.
pub fn resolve_delegate(value: &ValueRef) -> ValueRef {
    let mut current = Arc::clone(value);
    while let Some(inner) = current.delegate() {
        current = inner;
    }
    current
}

/// Identity comparison between two foreign objects.
///
/// Reference equality wins; otherwise either side may decide via its
/// identity capability. Objects without identity support compare not-equal
/// unless they are the same instance.
pub fn values_identical(a: &ValueRef, b: &ValueRef) -> bool {
    let a = resolve_delegate(a);
    let b = resolve_delegate(b);
    if Arc::ptr_eq(&a, &b) {
        return true;
    }
    if let Some(decision) = a.is_identical_or_undefined(b.as_ref()) {
        return decision;
    }
    if let Some(decision) = b.is_identical_or_undefined(a.as_ref()) {
        return decision;
    }
    false
}

/// Boxed primitive/foreign union flowing in and out of every access.
#[derive(Clone)]
pub enum Value {
    Null,
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Float(f32),
    Double(f64),
    Pointer(Pointer),
    Foreign(ValueRef),
}

impl Value {
    /// Short lowercase kind name for conversion error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Pointer(_) => "pointer",
            Value::Foreign(_) => "object",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::I8(_)
                | Value::I16(_)
                | Value::I32(_)
                | Value::I64(_)
                | Value::Float(_)
                | Value::Double(_)
        )
    }

    /// Numeric payload widened to i64 (floats truncate toward zero).
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I8(v) => Some(v as i64),
            Value::I16(v) => Some(v as i64),
            Value::I32(v) => Some(v as i64),
            Value::I64(v) => Some(v),
            Value::Float(v) => Some(v as i64),
            Value::Double(v) => Some(v as i64),
            _ => None,
        }
    }

    /// Numeric payload widened to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::I8(v) => Some(v as f64),
            Value::I16(v) => Some(v as f64),
            Value::I32(v) => Some(v as f64),
            Value::I64(v) => Some(v as f64),
            Value::Float(v) => Some(v as f64),
            Value::Double(v) => Some(v as f64),
            _ => None,
        }
    }

    /// Value-level cast used on untyped receivers: numeric payloads convert
    /// with plain numeric semantics; pointers, foreign objects and null pass
    /// through unconverted (there is no boxed-pointer concept at this
    /// boundary), as does any payload when a pointer is requested.
    pub fn cast_to(&self, requested: ElementType) -> Value {
        if requested == ElementType::Pointer || !self.is_numeric() {
            return self.clone();
        }
        match requested {
            ElementType::I8 => Value::I8(self.as_i64().unwrap() as i8),
            ElementType::I16 => Value::I16(self.as_i64().unwrap() as i16),
            ElementType::I32 => Value::I32(self.as_i64().unwrap() as i32),
            ElementType::I64 => Value::I64(self.as_i64().unwrap()),
            ElementType::Float => Value::Float(self.as_f64().unwrap() as f32),
            ElementType::Double => Value::Double(self.as_f64().unwrap()),
            ElementType::Pointer => unreachable!(),
        }
    }

    /// Least significant byte of a numeric payload.
    pub fn low_byte(&self) -> Option<u8> {
        self.as_i64().map(|v| v as u8)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            // Bit-pattern comparison so round-trips of NaN payloads hold.
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Pointer(a), Value::Pointer(b)) => a == b,
            (Value::Foreign(a), Value::Foreign(b)) => values_identical(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::I8(v) => write!(f, "I8({})", v),
            Value::I16(v) => write!(f, "I16({})", v),
            Value::I32(v) => write!(f, "I32({})", v),
            Value::I64(v) => write!(f, "I64({})", v),
            Value::Float(v) => write!(f, "Float({})", v),
            Value::Double(v) => write!(f, "Double({})", v),
            Value::Pointer(p) => write!(f, "Pointer({:?})", p),
            Value::Foreign(_) => write!(f, "Foreign(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{MemberObject, UntypedArrayObject};

    #[test]
    fn test_numeric_casts_truncate() {
        let v = Value::I32(0xCAFEFEED_u32 as i32);
        assert_eq!(v.cast_to(ElementType::I8), Value::I8(0xED_u8 as i8));
        assert_eq!(v.cast_to(ElementType::I16), Value::I16(0xFEED_u16 as i16));
    }

    #[test]
    fn test_float_to_integer_cast_truncates_toward_zero() {
        let v = Value::Double(std::f64::consts::PI);
        assert_eq!(v.cast_to(ElementType::I8), Value::I8(3));
        assert_eq!(v.cast_to(ElementType::I64), Value::I64(3));
    }

    #[test]
    fn test_pointer_request_passes_through() {
        let v = Value::Double(std::f64::consts::PI);
        assert_eq!(v.cast_to(ElementType::Pointer), v);
    }

    #[test]
    fn test_foreign_payload_passes_through_unconverted() {
        let obj: ValueRef = Arc::new(MemberObject::new());
        let v = Value::Foreign(Arc::clone(&obj));
        assert_eq!(v.cast_to(ElementType::I32), v);
    }

    #[test]
    fn test_identity_same_instance() {
        let a: ValueRef = Arc::new(UntypedArrayObject::from_i64(&[1, 2]));
        let b = Arc::clone(&a);
        assert!(values_identical(&a, &b));
    }

    #[test]
    fn test_identity_distinct_instances_without_capability() {
        let a: ValueRef = Arc::new(UntypedArrayObject::from_i64(&[1, 2]));
        let b: ValueRef = Arc::new(UntypedArrayObject::from_i64(&[1, 2]));
        assert!(!values_identical(&a, &b));
    }
}
