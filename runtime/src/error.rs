//! Interop error taxonomy
//!
//! Every failure mode of the engine maps to one variant with a fixed,
//! testable message. Callers match on the variant; embedders and tests
//! match on the message text, so the `Display` output is contractual.
//!
//! No error here is retried internally and no access is partially applied:
//! bounds and coercion checks run before the first byte is touched.

use std::fmt;

use crate::types::ElementType;

/// Result alias used throughout the engine.
pub type InteropResult<T> = Result<T, InteropError>;

/// All errors the interop engine can surface to its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum InteropError {
    /// Array index (or synthesized sub-byte index) outside the physical extent.
    InvalidArrayIndex(i64),
    /// Flat buffer access outside `0..buffer_size`.
    OutOfBoundsBuffer { offset: i64, length: i64 },
    /// Cross-type element read with no reinterpretation path.
    UnsupportedRead(ElementType),
    /// Cross-type element write with no reinterpretation path.
    UnsupportedWrite(ElementType),
    /// Same-width but illegal pointer/primitive conversion (pointer <-> double).
    CannotConvert {
        from: &'static str,
        to: ElementType,
    },
    /// Member or builtin lookup miss.
    UnknownIdentifier(String),
    /// Handle id not present in the registry (never allocated, or released).
    UnknownHandle(i64),
    /// Too few arguments for a typed accessor or vararg slot.
    ArityMismatch { expected: usize, actual: usize },
    /// The receiver does not implement the capability this access needs.
    UnsupportedMessage(&'static str),
}

impl fmt::Display for InteropError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteropError::InvalidArrayIndex(index) => {
                write!(f, "Invalid array index {}", index)
            }
            InteropError::OutOfBoundsBuffer { offset, length } => {
                write!(
                    f,
                    "Out-of-bounds buffer access (offset {}, length {})",
                    offset, length
                )
            }
            InteropError::UnsupportedRead(ty) => {
                write!(f, "cannot read {} from foreign object", ty)
            }
            InteropError::UnsupportedWrite(ty) => {
                write!(f, "cannot write {} to foreign object", ty)
            }
            InteropError::CannotConvert { from, to } => {
                write!(f, "Cannot convert a {} to {}", from, to)
            }
            InteropError::UnknownIdentifier(name) => {
                write!(f, "Unknown identifier {}", name)
            }
            InteropError::UnknownHandle(id) => {
                write!(f, "Unknown handle {}", id)
            }
            InteropError::ArityMismatch { expected, actual } => {
                write!(
                    f,
                    "Arity mismatch: expected {} arguments, got {}",
                    expected, actual
                )
            }
            InteropError::UnsupportedMessage(message) => {
                write!(f, "Unsupported message {}", message)
            }
        }
    }
}

impl std::error::Error for InteropError {}
