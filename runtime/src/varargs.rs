//! Vararg cursor
//!
//! A stateful view over a fixed, heterogeneous argument sequence. `get` is
//! a pure random-access projection; `next` is the consuming walk a callee
//! performs over its variadic tail. Both project the slot through the
//! declared type: numeric payloads convert, aggregates materialize as a
//! pointer to the aggregate rather than a primitive.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{InteropError, InteropResult};
use crate::pointer::Pointer;
use crate::types::ElementType;
use crate::value::{ForeignValue, Value};

pub struct VarargCursor {
    values: Vec<Value>,
    position: Mutex<usize>,
}

impl VarargCursor {
    pub fn new(values: Vec<Value>) -> Self {
        VarargCursor {
            values,
            position: Mutex::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn project(&self, index: usize, ty: ElementType) -> InteropResult<Value> {
        let value = self
            .values
            .get(index)
            .ok_or(InteropError::ArityMismatch {
                expected: index + 1,
                actual: self.values.len(),
            })?;
        match (ty, value) {
            // Aggregate slot asked for as a pointer: hand out a pointer to
            // the aggregate, not a primitive.
            (ElementType::Pointer, Value::Foreign(obj)) => {
                Ok(Value::Pointer(Pointer::to_object(Arc::clone(obj))))
            }
            _ => Ok(value.cast_to(ty)),
        }
    }

    /// Pure projection of slot `index` as `ty`. Never touches the cursor.
    pub fn get(&self, index: usize, ty: ElementType) -> InteropResult<Value> {
        self.project(index, ty)
    }

    /// Project the slot at the current position as `ty`, then advance.
    /// The position only moves on success.
    pub fn next(&self, ty: ElementType) -> InteropResult<Value> {
        let mut position = self.position.lock();
        let value = self.project(*position, ty)?;
        *position += 1;
        Ok(value)
    }

    pub fn position(&self) -> usize {
        *self.position.lock()
    }

    pub fn reset(&self) {
        *self.position.lock() = 0;
    }
}

impl ForeignValue for VarargCursor {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn has_array_elements(&self) -> bool {
        true
    }

    fn array_size(&self) -> InteropResult<u64> {
        Ok(self.values.len() as u64)
    }

    fn read_array_element(&self, index: u64) -> InteropResult<Value> {
        self.values
            .get(index as usize)
            .cloned()
            .ok_or(InteropError::InvalidArrayIndex(index as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::MemberObject;
    use crate::value::{values_identical, ValueRef};

    fn five_slot_list() -> (VarargCursor, [ElementType; 5], ValueRef) {
        let aggregate: ValueRef = Arc::new(MemberObject::new());
        let cursor = VarargCursor::new(vec![
            Value::I32(42),
            Value::Double(2.5),
            Value::I64(-1),
            Value::Foreign(Arc::clone(&aggregate)),
            Value::Float(0.5),
        ]);
        let types = [
            ElementType::I32,
            ElementType::Double,
            ElementType::I64,
            ElementType::Pointer,
            ElementType::Float,
        ];
        (cursor, types, aggregate)
    }

    #[test]
    fn test_sweep_equals_random_access() {
        let (cursor, types, _aggregate) = five_slot_list();
        let projected: Vec<Value> = (0..5)
            .map(|i| cursor.get(i, types[i]).unwrap())
            .collect();
        for expected in projected {
            let ty = types[cursor.position()];
            assert_eq!(cursor.next(ty).unwrap(), expected);
        }
        assert_eq!(cursor.position(), 5);
    }

    #[test]
    fn test_get_is_idempotent() {
        let (cursor, types, _aggregate) = five_slot_list();
        for _ in 0..3 {
            assert_eq!(cursor.get(1, types[1]).unwrap(), Value::Double(2.5));
        }
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_aggregate_slot_materializes_as_pointer() {
        let (cursor, _, aggregate) = five_slot_list();
        match cursor.get(3, ElementType::Pointer).unwrap() {
            Value::Pointer(p) => {
                assert!(values_identical(p.base().unwrap(), &aggregate));
                assert_eq!(p.offset(), 0);
            }
            other => panic!("expected a pointer, got {:?}", other),
        }
    }

    #[test]
    fn test_exhausted_cursor_reports_arity() {
        let cursor = VarargCursor::new(vec![Value::I32(1)]);
        cursor.next(ElementType::I32).unwrap();
        let err = cursor.next(ElementType::I32).unwrap_err();
        assert_eq!(
            err,
            InteropError::ArityMismatch {
                expected: 2,
                actual: 1
            }
        );
        // A failed next does not advance the position.
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_extra_arguments_are_tolerated() {
        let (cursor, types, _aggregate) = five_slot_list();
        // A callee declaring only three slots just stops early.
        for ty in &types[..3] {
            cursor.next(*ty).unwrap();
        }
        assert_eq!(cursor.position(), 3);
    }

    #[test]
    fn test_slot_projection_converts_numerics() {
        let cursor = VarargCursor::new(vec![Value::I64(7)]);
        assert_eq!(cursor.get(0, ElementType::Double).unwrap(), Value::Double(7.0));
        assert_eq!(cursor.get(0, ElementType::I8).unwrap(), Value::I8(7));
    }
}
