//! Bounds checking
//!
//! All checks run before the first byte of an access is touched, so a
//! failed access never partially applies. Array checks operate in the
//! requested type's index space; the byte-level sub-index check used by
//! reinterpreting accesses validates against the physical byte length.

use crate::error::{InteropError, InteropResult};
use crate::types::ElementType;

/// Logical element count of an array when viewed through `requested`.
///
/// A byte-shaped array of physical length L exposes `L / width(requested)`
/// logical elements of a wider type. Arrays whose element is at least as
/// wide as the request keep their physical length.
pub fn logical_length(physical: u64, element: ElementType, requested: ElementType) -> u64 {
    if element.width() < requested.width() {
        physical / (requested.width() / element.width()) as u64
    } else {
        physical
    }
}

/// Validate an element index in the requested type's index space.
pub fn check_array_index(
    physical: u64,
    element: ElementType,
    requested: ElementType,
    index: i64,
) -> InteropResult<u64> {
    if index < 0 || (index as u64) >= logical_length(physical, element, requested) {
        return Err(InteropError::InvalidArrayIndex(index));
    }
    Ok(index as u64)
}

/// Validate one synthesized byte sub-index against the physical length.
/// The reported index is the first out-of-range sub-index, not the logical
/// element index the caller asked for.
pub fn check_sub_index(physical: u64, sub_index: i64) -> InteropResult<u64> {
    if sub_index < 0 || (sub_index as u64) >= physical {
        return Err(InteropError::InvalidArrayIndex(sub_index));
    }
    Ok(sub_index as u64)
}

/// Validate a flat byte-buffer range: `offset >= 0` and
/// `offset + length <= buffer_size`, with overflow-safe arithmetic.
pub fn check_buffer_range(buffer_size: i64, offset: i64, length: i64) -> InteropResult<()> {
    let end = offset.checked_add(length);
    let ok = offset >= 0 && length >= 0 && matches!(end, Some(end) if end <= buffer_size);
    if ok {
        Ok(())
    } else {
        Err(InteropError::OutOfBoundsBuffer { offset, length })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_length_byte_array_viewed_as_i32() {
        assert_eq!(
            logical_length(16, ElementType::I8, ElementType::I32),
            4
        );
        // Trailing partial element does not count.
        assert_eq!(
            logical_length(15, ElementType::I8, ElementType::I32),
            3
        );
    }

    #[test]
    fn test_logical_length_same_or_wider_element() {
        assert_eq!(logical_length(8, ElementType::I32, ElementType::I32), 8);
        assert_eq!(logical_length(8, ElementType::I64, ElementType::I32), 8);
    }

    #[test]
    fn test_array_index_at_length_fails() {
        let err = check_array_index(4, ElementType::I32, ElementType::I32, 4).unwrap_err();
        assert_eq!(err, InteropError::InvalidArrayIndex(4));
    }

    #[test]
    fn test_negative_index_fails() {
        assert!(check_array_index(4, ElementType::I32, ElementType::I32, -1).is_err());
    }

    #[test]
    fn test_buffer_range_full_scenario() {
        // 32-byte buffer, 4-byte accesses.
        assert!(check_buffer_range(32, 28, 4).is_ok());
        assert_eq!(
            check_buffer_range(32, 29, 4).unwrap_err().to_string(),
            "Out-of-bounds buffer access (offset 29, length 4)"
        );
        assert_eq!(
            check_buffer_range(32, -1, 4).unwrap_err().to_string(),
            "Out-of-bounds buffer access (offset -1, length 4)"
        );
    }

    #[test]
    fn test_buffer_range_overflow_does_not_wrap() {
        assert!(check_buffer_range(32, i64::MAX, 4).is_err());
    }
}
