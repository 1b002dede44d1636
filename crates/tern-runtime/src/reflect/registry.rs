//! Process-wide type registry.
//!
//! Populated at module initialization by every compiled type declaration and
//! keyed by qualified type name. Registration is write-once: the first
//! definition of a name wins.

use hashbrown::HashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tern_common_core::Kind;

use super::builder::TypeBuilder;
use super::types::{pointer_to, Signature, Type, TypeRepr};
use crate::panic::{Panic, RtResult};

static BASIC: Lazy<Vec<Type>> = Lazy::new(|| {
    Kind::BASIC
        .iter()
        .map(|&kind| match kind {
            Kind::UnsafePointer => Type::new_named("unsafe", "Pointer", kind, TypeRepr::Basic, Vec::new()),
            _ => Type::new_named("", kind.as_str(), kind, TypeRepr::Basic, Vec::new()),
        })
        .collect()
});

static ERROR: Lazy<Type> = Lazy::new(|| {
    TypeBuilder::named_interface("", "error")
        .method("Error", Signature::new().result(basic(Kind::String)))
        .build()
});

static ANY: Lazy<Type> = Lazy::new(|| super::types::interface_of(Vec::new()));

static ERROR_STRING_PTR: Lazy<Type> = Lazy::new(|| {
    let ty = TypeBuilder::named_struct("errors", "errorString")
        .field("s", basic(Kind::String))
        .pointer_method("Error", Signature::new().result(basic(Kind::String)))
        .build();
    pointer_to(ty)
});

static WRAP_ERROR_PTR: Lazy<Type> = Lazy::new(|| {
    let ty = TypeBuilder::named_struct("fmt", "wrapError")
        .field("msg", basic(Kind::String))
        .field("err", error_type())
        .pointer_method("Error", Signature::new().result(basic(Kind::String)))
        .pointer_method("Unwrap", Signature::new().result(error_type()))
        .build();
    pointer_to(ty)
});

static RUNTIME_ERROR: Lazy<Type> = Lazy::new(|| {
    TypeBuilder::named("runtime", "errorString", &basic(Kind::String))
        .method("Error", Signature::new().result(basic(Kind::String)))
        .method("RuntimeError", Signature::new())
        .build()
});

static REGISTRY: Lazy<RwLock<HashMap<String, Type>>> = Lazy::new(|| {
    let mut types = HashMap::new();
    for ty in BASIC.iter() {
        types.insert(ty.id().to_string(), ty.clone());
    }
    types.insert("byte".to_string(), basic(Kind::Uint8));
    types.insert("rune".to_string(), basic(Kind::Int32));
    types.insert("error".to_string(), error_type());
    types.insert("any".to_string(), any_type());
    types.insert(any_type().id().to_string(), any_type());
    for ptr in [error_string_ptr_type(), wrap_error_ptr_type()] {
        if let Ok(named) = ptr.elem() {
            types.insert(named.id().to_string(), named);
        }
    }
    types.insert(runtime_error_type().id().to_string(), runtime_error_type());
    RwLock::new(types)
});

/// Predeclared type of a basic kind. Non-basic kinds yield an unnamed
/// descriptor of that kind.
pub fn basic(kind: Kind) -> Type {
    match Kind::BASIC.iter().position(|&k| k == kind) {
        Some(i) => BASIC[i].clone(),
        None => Type::new_unnamed(kind, TypeRepr::Basic),
    }
}

/// The predeclared `error` interface.
pub fn error_type() -> Type {
    ERROR.clone()
}

/// `interface {}`
pub fn any_type() -> Type {
    ANY.clone()
}

/// Dynamic type of `errors.New` values.
pub fn error_string_ptr_type() -> Type {
    ERROR_STRING_PTR.clone()
}

/// Dynamic type of wrapping errors.
pub fn wrap_error_ptr_type() -> Type {
    WRAP_ERROR_PTR.clone()
}

/// Dynamic type of runtime trap payloads.
pub fn runtime_error_type() -> Type {
    RUNTIME_ERROR.clone()
}

/// Register `ty` under its qualified name, returning the registered
/// descriptor. A conflicting re-registration keeps the first definition.
pub fn register(ty: Type) -> Type {
    let key = ty.id().to_string();
    let existing = {
        let mut registry = REGISTRY.write();
        match registry.get(&key) {
            Some(existing) => existing.clone(),
            None => {
                tracing::trace!(name = %key, kind = %ty.kind(), "registered type");
                registry.insert(key, ty.clone());
                return ty;
            }
        }
    };
    // Comparing may resolve references, so the lock is released first.
    keep_existing(&existing, &ty)
}

fn keep_existing(existing: &Type, new: &Type) -> Type {
    if existing.underlying_string() != new.underlying_string() || existing.num_method() != new.num_method() {
        tracing::warn!(
            name = %existing.id(),
            existing = %existing.underlying_string(),
            rejected = %new.underlying_string(),
            "conflicting type registration ignored"
        );
    }
    existing.clone()
}

pub fn lookup(name: &str) -> Option<Type> {
    REGISTRY.read().get(name).cloned()
}

/// `typeFor(name)`: faults if nothing is registered under `name`.
pub fn type_for(name: &str) -> RtResult<Type> {
    lookup(name).ok_or_else(|| Panic::reflect(format!("reflect: unknown type {}", name)))
}
