//! Polymem Runtime Library
//!
//! Typed interop core for foreign memory: the coercion, bounds, pointer and
//! handle machinery that sits between a managed host and native-shaped data.
//!
//! # Architecture
//!
//! - **Capability protocol**: foreign objects expose duck-typed messages
//!   (arrays, members, pointers, identity, execute); the engine queries
//!   capabilities instead of downcasting (`value`, `objects`).
//! - **Coercion engine**: all array traffic goes through one asymmetric
//!   access matrix with byte-level reinterpretation (`access`, `bounds`).
//! - **Native surface**: pointer algebra and identity (`pointer`), flat and
//!   shared buffers (`buffer`), dereference handles (`handles`), vararg
//!   projection (`varargs`), per-thread destructor slots (`tls`).
//! - **Builtins**: every operation is also reachable by name through the
//!   registered accessor table (`builtins`).

pub mod access;      // Typed element coercion engine
pub mod bounds;      // Array/buffer bounds checking
pub mod buffer;      // Flat byte buffer + shared append buffer
pub mod builtins;    // Named accessor table
pub mod error;       // Error taxonomy
pub mod handles;     // Dereference handle registry
pub mod objects;     // Concrete foreign object implementations
pub mod pointer;     // Pointer arithmetic and identity
pub mod tls;         // Thread-local destructor registry
pub mod types;       // Element type descriptors
pub mod value;       // Capability protocol + boxed value union
pub mod varargs;     // Vararg cursor

// Re-export main types
pub use error::{InteropError, InteropResult};
pub use pointer::Pointer;
pub use types::ElementType;
pub use value::{ForeignValue, Value, ValueRef};
