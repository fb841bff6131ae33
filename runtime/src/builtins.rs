//! Builtin accessor surface
//!
//! Named entry points the hosting runtime resolves by string: typed array
//! accessors, buffer accessors, pointer arithmetic, handle management and
//! vararg projection. Entries register themselves with `inventory` and the
//! name map is built lazily on first lookup.
//!
//! The `read_{t}_from_{e}_array` / `write_{t}_to_{e}_array` spellings
//! re-type the receiver as an `{e}`-element array before the access, so
//! the coercion matrix applies even when the receiver carries no element
//! metadata of its own: `read_i32_from_i16_array` on a boxed array fails
//! the same way it does on a natively I16-typed one.

use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use log::debug;

use crate::access;
use crate::buffer::ByteBuffer;
use crate::error::{InteropError, InteropResult};
use crate::handles;
use crate::pointer::{self, Pointer};
use crate::types::ElementType;
use crate::value::{Value, ValueRef};
use crate::varargs::VarargCursor;

pub type BuiltinFn = fn(&[Value]) -> InteropResult<Value>;

pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

inventory::collect!(Builtin);

lazy_static! {
    static ref BUILTINS: HashMap<String, BuiltinFn> = {
        let mut map: HashMap<String, BuiltinFn> = HashMap::new();
        for builtin in inventory::iter::<Builtin> {
            map.insert(builtin.name.to_string(), builtin.func);
        }
        debug!("builtin table ready: {} entries", map.len());
        map
    };
}

/// Resolve a builtin by name.
pub fn lookup(name: &str) -> InteropResult<BuiltinFn> {
    BUILTINS
        .get(name)
        .copied()
        .ok_or_else(|| InteropError::UnknownIdentifier(name.to_string()))
}

/// Resolve and invoke in one step.
pub fn call(name: &str, args: &[Value]) -> InteropResult<Value> {
    lookup(name)?(args)
}

// ===== Argument helpers =====
//
// Arguments beyond what an entry consumes are tolerated and ignored; too
// few is an arity error naming the first missing position.

fn arg(args: &[Value], index: usize) -> InteropResult<&Value> {
    args.get(index).ok_or(InteropError::ArityMismatch {
        expected: index + 1,
        actual: args.len(),
    })
}

fn arg_object(args: &[Value], index: usize) -> InteropResult<ValueRef> {
    match arg(args, index)? {
        Value::Foreign(obj) => Ok(Arc::clone(obj)),
        Value::Pointer(p) if p.offset() == 0 => p
            .base()
            .cloned()
            .ok_or(InteropError::UnsupportedMessage("object argument")),
        _ => Err(InteropError::UnsupportedMessage("object argument")),
    }
}

fn arg_i64(args: &[Value], index: usize) -> InteropResult<i64> {
    arg(args, index)?
        .as_i64()
        .ok_or(InteropError::UnsupportedMessage("integer argument"))
}

fn arg_buffer(args: &[Value], index: usize) -> InteropResult<ValueRef> {
    let obj = arg_object(args, index)?;
    if obj.as_any().is::<ByteBuffer>() {
        Ok(obj)
    } else {
        Err(InteropError::UnsupportedMessage("buffer argument"))
    }
}

fn arg_cursor(args: &[Value], index: usize) -> InteropResult<ValueRef> {
    let obj = arg_object(args, index)?;
    if obj.as_any().is::<VarargCursor>() {
        Ok(obj)
    } else {
        Err(InteropError::UnsupportedMessage("vararg list argument"))
    }
}

fn arg_pointer(args: &[Value], index: usize) -> InteropResult<Pointer> {
    handles::global().deref(arg(args, index)?)
}

// ===== Typed array accessors =====

fn read_typed(args: &[Value], ty: ElementType) -> InteropResult<Value> {
    let array = arg_object(args, 0)?;
    let index = arg_i64(args, 1)?;
    access::read_element(&array, index, ty)
}

fn write_typed(args: &[Value], ty: ElementType) -> InteropResult<Value> {
    let array = arg_object(args, 0)?;
    let index = arg_i64(args, 1)?;
    let value = arg(args, 2)?.clone();
    access::write_element(&array, index, ty, value)?;
    Ok(Value::Null)
}

// Explicit-cast accessors: the receiver is re-typed as an `element` array
// for the duration of the access.

fn read_typed_as(args: &[Value], ty: ElementType, element: ElementType) -> InteropResult<Value> {
    let array = arg_object(args, 0)?;
    let index = arg_i64(args, 1)?;
    access::read_element_as(&array, index, ty, Some(element))
}

fn write_typed_as(args: &[Value], ty: ElementType, element: ElementType) -> InteropResult<Value> {
    let array = arg_object(args, 0)?;
    let index = arg_i64(args, 1)?;
    let value = arg(args, 2)?.clone();
    access::write_element_as(&array, index, ty, value, Some(element))?;
    Ok(Value::Null)
}

// ===== Buffer accessors =====

fn buffer_read(args: &[Value], ty: ElementType) -> InteropResult<Value> {
    let buffer = arg_buffer(args, 0)?;
    let offset = arg_i64(args, 1)?;
    let buffer = buffer.as_any().downcast_ref::<ByteBuffer>().unwrap();
    buffer.read(offset, ty)
}

fn buffer_write(args: &[Value], ty: ElementType) -> InteropResult<Value> {
    let buffer = arg_buffer(args, 0)?;
    let offset = arg_i64(args, 1)?;
    let value = arg(args, 2)?.clone();
    let buffer = buffer.as_any().downcast_ref::<ByteBuffer>().unwrap();
    buffer.write(offset, ty, value)?;
    Ok(Value::Null)
}

// ===== Vararg projection =====

fn vararg_get(args: &[Value], ty: ElementType) -> InteropResult<Value> {
    let cursor = arg_cursor(args, 0)?;
    let index = arg_i64(args, 1)?;
    if index < 0 {
        return Err(InteropError::InvalidArrayIndex(index));
    }
    let cursor = cursor.as_any().downcast_ref::<VarargCursor>().unwrap();
    cursor.get(index as usize, ty)
}

fn vararg_next(args: &[Value], ty: ElementType) -> InteropResult<Value> {
    let cursor = arg_cursor(args, 0)?;
    let cursor = cursor.as_any().downcast_ref::<VarargCursor>().unwrap();
    cursor.next(ty)
}

// ===== Registration =====

macro_rules! register_typed {
    ($ty:expr, $ident:literal) => {
        inventory::submit! {
            Builtin {
                name: concat!("read_", $ident),
                func: |args| read_typed(args, $ty),
            }
        }
        inventory::submit! {
            Builtin {
                name: concat!("write_", $ident),
                func: |args| write_typed(args, $ty),
            }
        }
        inventory::submit! {
            Builtin {
                name: concat!("buffer_read_", $ident),
                func: |args| buffer_read(args, $ty),
            }
        }
        inventory::submit! {
            Builtin {
                name: concat!("buffer_write_", $ident),
                func: |args| buffer_write(args, $ty),
            }
        }
        inventory::submit! {
            Builtin {
                name: concat!("va_get_", $ident),
                func: |args| vararg_get(args, $ty),
            }
        }
        inventory::submit! {
            Builtin {
                name: concat!("va_next_", $ident),
                func: |args| vararg_next(args, $ty),
            }
        }
    };
}

register_typed!(ElementType::I8, "i8");
register_typed!(ElementType::I16, "i16");
register_typed!(ElementType::I32, "i32");
register_typed!(ElementType::I64, "i64");
register_typed!(ElementType::Float, "float");
register_typed!(ElementType::Double, "double");
register_typed!(ElementType::Pointer, "pointer");

macro_rules! register_cast_variant {
    ($ty:expr, $ident:literal, $element:expr, $element_ident:literal) => {
        inventory::submit! {
            Builtin {
                name: concat!("read_", $ident, "_from_", $element_ident, "_array"),
                func: |args| read_typed_as(args, $ty, $element),
            }
        }
        inventory::submit! {
            Builtin {
                name: concat!("write_", $ident, "_to_", $element_ident, "_array"),
                func: |args| write_typed_as(args, $ty, $element),
            }
        }
    };
}

macro_rules! register_cast_variants {
    ($element:expr, $element_ident:literal) => {
        register_cast_variant!(ElementType::I8, "i8", $element, $element_ident);
        register_cast_variant!(ElementType::I16, "i16", $element, $element_ident);
        register_cast_variant!(ElementType::I32, "i32", $element, $element_ident);
        register_cast_variant!(ElementType::I64, "i64", $element, $element_ident);
        register_cast_variant!(ElementType::Float, "float", $element, $element_ident);
        register_cast_variant!(ElementType::Double, "double", $element, $element_ident);
        register_cast_variant!(ElementType::Pointer, "pointer", $element, $element_ident);
    };
}

register_cast_variants!(ElementType::I8, "i8");
register_cast_variants!(ElementType::I16, "i16");
register_cast_variants!(ElementType::I32, "i32");
register_cast_variants!(ElementType::I64, "i64");
register_cast_variants!(ElementType::Float, "float");
register_cast_variants!(ElementType::Double, "double");
register_cast_variants!(ElementType::Pointer, "pointer");

inventory::submit! {
    Builtin {
        name: "pointer_add",
        func: |args| {
            let a = arg_pointer(args, 0)?;
            let b = arg_pointer(args, 1)?;
            Ok(Value::Pointer(pointer::add(&a, &b)))
        },
    }
}

inventory::submit! {
    Builtin {
        name: "pointer_sub",
        func: |args| {
            let a = arg_pointer(args, 0)?;
            let b = arg_pointer(args, 1)?;
            Ok(Value::Pointer(pointer::sub(&a, &b)))
        },
    }
}

inventory::submit! {
    Builtin {
        name: "pointer_mul",
        func: |args| {
            let a = arg_pointer(args, 0)?;
            let b = arg_pointer(args, 1)?;
            Ok(Value::Pointer(pointer::mul(&a, &b)))
        },
    }
}

inventory::submit! {
    Builtin {
        name: "pointer_xor",
        func: |args| {
            let a = arg_pointer(args, 0)?;
            let b = arg_pointer(args, 1)?;
            Ok(Value::Pointer(pointer::xor(&a, &b)))
        },
    }
}

inventory::submit! {
    Builtin {
        name: "pointer_eq",
        func: |args| {
            let a = arg_pointer(args, 0)?;
            let b = arg_pointer(args, 1)?;
            Ok(Value::I32((a == b) as i32))
        },
    }
}

inventory::submit! {
    Builtin {
        name: "pointer_hash",
        func: |args| {
            let p = arg_pointer(args, 0)?;
            Ok(Value::I64(p.identity_hash_code()))
        },
    }
}

inventory::submit! {
    Builtin {
        name: "to_native",
        func: |args| {
            let p = arg_pointer(args, 0)?;
            Ok(Value::I64(p.to_native()?))
        },
    }
}

inventory::submit! {
    Builtin {
        name: "handle_allocate",
        func: |args| {
            let target = arg_object(args, 0)?;
            Ok(Value::I64(handles::global().allocate(&target)))
        },
    }
}

inventory::submit! {
    Builtin {
        name: "handle_resolve",
        func: |args| {
            let id = arg_i64(args, 0)?;
            Ok(Value::Foreign(handles::global().resolve(id)?))
        },
    }
}

inventory::submit! {
    Builtin {
        name: "handle_release",
        func: |args| {
            let id = arg_i64(args, 0)?;
            handles::global().release(id)?;
            Ok(Value::Null)
        },
    }
}

inventory::submit! {
    Builtin {
        name: "is_handle",
        func: |args| {
            let id = arg_i64(args, 0)?;
            Ok(Value::I32(handles::is_handle(id) as i32))
        },
    }
}
