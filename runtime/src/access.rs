//! Typed element coercion engine
//!
//! All array traffic funnels through `read_element` and `write_element`.
//! The access matrix is asymmetric on purpose:
//!
//! - element type equals requested type: one native element access.
//! - byte-shaped arrays (element I8) synthesize wider accesses from
//!   consecutive single bytes, least significant byte first, validating
//!   every sub-index against the physical length.
//! - same-width but distinct types reinterpret the bit pattern
//!   (I32 <-> FLOAT, I64 <-> DOUBLE). Pointer-typed arrays hand their
//!   elements through unconverted for I64/POINTER requests; the
//!   pointer/double pairing has no legal conversion in either direction.
//! - every other cross-type access is unsupported. No implicit numeric
//!   widening or narrowing happens across distinctly typed arrays.
//!
//! Untyped arrays (no element metadata) sidestep the matrix entirely:
//! the stored boxed value is returned or replaced, with a plain numeric
//! cast toward the requested type on read. An explicit element override
//! (`read_element_as` / `write_element_as`) re-types the receiver and
//! puts such an array back under the matrix.

use log::trace;

use crate::bounds::{check_array_index, check_sub_index};
use crate::error::{InteropError, InteropResult};
use crate::types::ElementType;
use crate::value::{Value, ValueRef};

/// Read one element of `array` as `requested`.
pub fn read_element(array: &ValueRef, index: i64, requested: ElementType) -> InteropResult<Value> {
    read_element_as(array, index, requested, None)
}

/// Read with the receiver re-typed: `element_override` supplies the element
/// type the access treats the receiver as having, winning over (or standing
/// in for) the receiver's own metadata. This is the explicit-cast access
/// path, so a boxed array viewed through an I16 cast refuses an I32 read
/// exactly like a natively I16-typed one.
pub fn read_element_as(
    array: &ValueRef,
    index: i64,
    requested: ElementType,
    element_override: Option<ElementType>,
) -> InteropResult<Value> {
    if !array.has_array_elements() {
        return Err(InteropError::UnsupportedRead(requested));
    }
    let physical = array.array_size()? as u64;
    let element = match element_override.or_else(|| array.element_type()) {
        None => {
            let index = check_array_index(physical, requested, requested, index)?;
            let stored = array.read_array_element(index)?;
            return Ok(stored.cast_to(requested));
        }
        Some(element) => element,
    };

    if element == requested {
        let index = check_array_index(physical, element, requested, index)?;
        let stored = array.read_array_element(index)?;
        // A re-typed boxed receiver still holds boxed values; natively
        // typed receivers normalized on write.
        if array.element_type().is_none() {
            return Ok(stored.cast_to(requested));
        }
        return Ok(stored);
    }

    if element == ElementType::I8 {
        let bits = read_bytes(array, physical, index, requested.width())?;
        return Ok(value_from_bits(bits, requested));
    }

    if element.width() == requested.width() {
        return reinterpret_read(array, physical, index, element, requested);
    }

    trace!(
        "unsupported read: {} element, {} requested",
        element,
        requested
    );
    Err(InteropError::UnsupportedRead(requested))
}

/// Write one element of `array` as `requested`.
pub fn write_element(
    array: &ValueRef,
    index: i64,
    requested: ElementType,
    value: Value,
) -> InteropResult<()> {
    write_element_as(array, index, requested, value, None)
}

/// Write with the receiver re-typed to `element_override`.
pub fn write_element_as(
    array: &ValueRef,
    index: i64,
    requested: ElementType,
    value: Value,
    element_override: Option<ElementType>,
) -> InteropResult<()> {
    if !array.has_array_elements() {
        return Err(InteropError::UnsupportedWrite(requested));
    }
    let physical = array.array_size()? as u64;
    let element = match element_override.or_else(|| array.element_type()) {
        None => {
            let index = check_array_index(physical, requested, requested, index)?;
            return array.write_array_element(index, value);
        }
        Some(element) => element,
    };

    if element == requested {
        let index = check_array_index(physical, element, requested, index)?;
        return array.write_array_element(index, value);
    }

    if element == ElementType::I8 {
        let bits = value_to_bits(&value, requested)?;
        return write_bytes(array, physical, index, requested.width(), bits);
    }

    if element.width() == requested.width() {
        return reinterpret_write(array, physical, index, element, requested, value);
    }

    trace!(
        "unsupported write: {} element, {} requested",
        element,
        requested
    );
    Err(InteropError::UnsupportedWrite(requested))
}

// ===== Byte-shaped synthesis =====

fn read_bytes(array: &ValueRef, physical: u64, index: i64, width: usize) -> InteropResult<u64> {
    let byte_offset = index.wrapping_mul(width as i64);
    // Every sub-index is validated against the physical byte length; an
    // access with any byte past the end fails before anything is read.
    for i in 0..width {
        check_sub_index(physical, byte_offset.wrapping_add(i as i64))?;
    }
    let mut bits: u64 = 0;
    for i in 0..width {
        let stored = array.read_array_element((byte_offset + i as i64) as u64)?;
        let byte = stored
            .low_byte()
            .ok_or(InteropError::UnsupportedRead(ElementType::I8))?;
        bits |= (byte as u64) << (8 * i);
    }
    Ok(bits)
}

fn write_bytes(
    array: &ValueRef,
    physical: u64,
    index: i64,
    width: usize,
    bits: u64,
) -> InteropResult<()> {
    let byte_offset = index.wrapping_mul(width as i64);
    for i in 0..width {
        check_sub_index(physical, byte_offset.wrapping_add(i as i64))?;
    }
    for i in 0..width {
        let byte = ((bits >> (8 * i)) & 0xFF) as u8;
        array.write_array_element((byte_offset + i as i64) as u64, Value::I8(byte as i8))?;
    }
    Ok(())
}

// ===== Same-width reinterpretation =====

fn reinterpret_read(
    array: &ValueRef,
    physical: u64,
    index: i64,
    element: ElementType,
    requested: ElementType,
) -> InteropResult<Value> {
    use ElementType::*;
    let index = check_array_index(physical, element, requested, index)?;
    let stored = array.read_array_element(index)?;
    match (element, requested) {
        // Pointer-typed arrays hand their element through unconverted.
        (Pointer, I64) | (Pointer, ElementType::Pointer) => Ok(stored),
        (Pointer, Double) => Err(InteropError::CannotConvert {
            from: "pointer",
            to: Double,
        }),
        (Double, ElementType::Pointer) => Err(InteropError::CannotConvert {
            from: "double",
            to: ElementType::Pointer,
        }),
        // A pointer request against a plain integer array dereferences
        // through to the numeric value.
        (I64, ElementType::Pointer) => Ok(stored),
        (I32, Float) | (Float, I32) | (I64, Double) | (Double, I64) => {
            let bits = value_to_bits(&stored, element)
                .map_err(|_| InteropError::UnsupportedRead(requested))?;
            Ok(value_from_bits(bits, requested))
        }
        _ => Err(InteropError::UnsupportedRead(requested)),
    }
}

fn reinterpret_write(
    array: &ValueRef,
    physical: u64,
    index: i64,
    element: ElementType,
    requested: ElementType,
    value: Value,
) -> InteropResult<()> {
    use ElementType::*;
    let index = check_array_index(physical, element, requested, index)?;
    match (element, requested) {
        (Pointer, I64) | (Pointer, ElementType::Pointer) => {
            array.write_array_element(index, value)
        }
        (Pointer, Double) => Err(InteropError::CannotConvert {
            from: "double",
            to: ElementType::Pointer,
        }),
        (Double, ElementType::Pointer) => Err(InteropError::CannotConvert {
            from: "pointer",
            to: Double,
        }),
        (I64, ElementType::Pointer) => {
            let bits = value_to_bits(&value, ElementType::Pointer)?;
            array.write_array_element(index, Value::I64(bits as i64))
        }
        (I32, Float) | (Float, I32) | (I64, Double) | (Double, I64) => {
            let bits = value_to_bits(&value, requested)
                .map_err(|_| InteropError::UnsupportedWrite(requested))?;
            array.write_array_element(index, value_from_bits(bits, element))
        }
        _ => Err(InteropError::UnsupportedWrite(requested)),
    }
}

// ===== Bit conversion =====

/// Raw bit pattern of `value` viewed as `ty`, zero-extended to 64 bits.
fn value_to_bits(value: &Value, ty: ElementType) -> InteropResult<u64> {
    use ElementType::*;
    let bits = match ty {
        I8 => value.as_i64().map(|v| (v as u8) as u64),
        I16 => value.as_i64().map(|v| (v as u16) as u64),
        I32 => value.as_i64().map(|v| (v as u32) as u64),
        I64 => value.as_i64().map(|v| v as u64),
        Float => match value {
            Value::Float(v) => Some(v.to_bits() as u64),
            _ => value.as_f64().map(|v| (v as f32).to_bits() as u64),
        },
        Double => match value {
            Value::Double(v) => Some(v.to_bits()),
            _ => value.as_f64().map(f64::to_bits),
        },
        Pointer => match value {
            Value::Pointer(p) => Some(p.to_native()? as u64),
            _ => value.as_i64().map(|v| v as u64),
        },
    };
    bits.ok_or(InteropError::UnsupportedWrite(ty))
}

/// Materialize a 64-bit pattern as a value of `ty`.
fn value_from_bits(bits: u64, ty: ElementType) -> Value {
    match ty {
        ElementType::I8 => Value::I8(bits as i8),
        ElementType::I16 => Value::I16(bits as i16),
        ElementType::I32 => Value::I32(bits as i32),
        ElementType::I64 => Value::I64(bits as i64),
        ElementType::Float => Value::Float(f32::from_bits(bits as u32)),
        ElementType::Double => Value::Double(f64::from_bits(bits)),
        // No boxed-pointer concept at this boundary: a pointer synthesized
        // from raw bytes is the plain numeric address.
        ElementType::Pointer => Value::I64(bits as i64),
    }
}
