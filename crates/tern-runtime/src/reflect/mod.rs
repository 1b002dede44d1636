//! Runtime reflection.
//!
//! Host values carry no type metadata of their own beyond what the value
//! model records (struct, array, slice, map and channel values keep their
//! descriptor). [`type_of`] recovers the dynamic type of any value, and
//! [`ReflectValue`] pairs a descriptor with a value, or with a place when the
//! value is addressable.

mod builder;
mod map_iter;
mod registry;
mod select;
mod types;
mod value;

pub use builder::TypeBuilder;
pub use map_iter::MapIter;
pub use registry::{
    any_type, error_string_ptr_type, error_type, lookup, register, runtime_error_type, type_for,
    wrap_error_ptr_type,
};
pub use select::{select, SelectCase, SelectDir};
pub use types::{
    array_of, basic, chan_of, func_of_sig, interface_of, map_of, pointer_to, slice_of, struct_of, Method,
    Signature, StructField, Type, TypeRef,
};
pub use value::{indirect, new, value_of, zero, ReflectValue};

pub use crate::objects::compare::deep_equal;
pub use tern_common_core::{ChanDir, Kind, StructTag};

use crate::value::Value;

/// Pointer chains deeper than this report `*interface {}` for the innermost
/// element instead of inspecting it further.
const MAX_POINTER_DEPTH: usize = 16;

/// The dynamic type of `v`; `None` for a nil interface.
pub fn type_of(v: &Value) -> Option<Type> {
    type_of_depth(v, 0)
}

fn type_of_depth(v: &Value, depth: usize) -> Option<Type> {
    Some(match v {
        Value::Nil => return None,
        Value::Bool(_) => basic(Kind::Bool),
        Value::Int(_) => basic(Kind::Int),
        Value::Uint(_) => basic(Kind::Uint),
        Value::Float(_) => basic(Kind::Float64),
        Value::String(_) => basic(Kind::String),
        Value::Pointer(p) => {
            let elem = p.elem_type().or_else(|| {
                if depth < MAX_POINTER_DEPTH {
                    type_of_depth(&p.load(), depth + 1)
                } else {
                    None
                }
            });
            pointer_to(elem.unwrap_or_else(any_type))
        }
        Value::Struct(s) => s.ty().clone(),
        Value::Array(a) => a.ty().clone(),
        Value::Slice(s) => s.ty().clone(),
        Value::Map(m) => m.ty().clone(),
        Value::Chan(c) => chan_of(c.dir(), c.elem_type()),
        Value::Func(f) => f.ty().cloned().unwrap_or_else(|| func_of_sig(Signature::new())),
        Value::Error(e) => e.dynamic_type(),
        Value::Typed(t) => t.ty().clone(),
    })
}
