//! Element type descriptors
//!
//! Runtime type information for the fixed-width primitive kinds a foreign
//! array or buffer can be declared to contain. Each kind knows its byte
//! width and whether it is a floating-point type; the coercion engine keys
//! every access decision off these two properties.

use std::fmt;

/// Fixed-width primitive kind of an array element or buffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    I8,
    I16,
    I32,
    I64,
    Float,
    Double,
    Pointer,
}

/// All element types, in declaration order. Handy for exhaustive test sweeps
/// and for registering the builtin accessor table.
pub const ALL_ELEMENT_TYPES: [ElementType; 7] = [
    ElementType::I8,
    ElementType::I16,
    ElementType::I32,
    ElementType::I64,
    ElementType::Float,
    ElementType::Double,
    ElementType::Pointer,
];

impl ElementType {
    /// Byte width of one element. Pointers are 8 bytes wide on every
    /// platform this runtime targets.
    pub const fn width(self) -> usize {
        match self {
            ElementType::I8 => 1,
            ElementType::I16 => 2,
            ElementType::I32 => 4,
            ElementType::I64 => 8,
            ElementType::Float => 4,
            ElementType::Double => 8,
            ElementType::Pointer => 8,
        }
    }

    pub const fn is_floating(self) -> bool {
        matches!(self, ElementType::Float | ElementType::Double)
    }

    /// Uppercase name used in conversion error messages ("... to DOUBLE").
    pub const fn type_name(self) -> &'static str {
        match self {
            ElementType::I8 => "I8",
            ElementType::I16 => "I16",
            ElementType::I32 => "I32",
            ElementType::I64 => "I64",
            ElementType::Float => "FLOAT",
            ElementType::Double => "DOUBLE",
            ElementType::Pointer => "POINTER",
        }
    }

    /// Lowercase name used in builtin accessor names ("read_i8",
    /// "write_double_to_i8_array").
    pub const fn ident(self) -> &'static str {
        match self {
            ElementType::I8 => "i8",
            ElementType::I16 => "i16",
            ElementType::I32 => "i32",
            ElementType::I64 => "i64",
            ElementType::Float => "float",
            ElementType::Double => "double",
            ElementType::Pointer => "pointer",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths() {
        assert_eq!(ElementType::I8.width(), 1);
        assert_eq!(ElementType::I16.width(), 2);
        assert_eq!(ElementType::I32.width(), 4);
        assert_eq!(ElementType::I64.width(), 8);
        assert_eq!(ElementType::Float.width(), 4);
        assert_eq!(ElementType::Double.width(), 8);
        assert_eq!(ElementType::Pointer.width(), 8);
    }

    #[test]
    fn test_floating_flag() {
        for ty in ALL_ELEMENT_TYPES {
            let expect = matches!(ty, ElementType::Float | ElementType::Double);
            assert_eq!(ty.is_floating(), expect, "{}", ty);
        }
    }

    #[test]
    fn test_display_is_uppercase() {
        assert_eq!(ElementType::Pointer.to_string(), "POINTER");
        assert_eq!(ElementType::Double.to_string(), "DOUBLE");
        assert_eq!(ElementType::I16.to_string(), "I16");
    }
}
