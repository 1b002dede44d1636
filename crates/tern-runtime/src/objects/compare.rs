//! Equality and hashing.
//!
//! `equal` is the language's `==` on dynamically typed values, `hash_key`
//! the matching hash for map keys, and `deep_equal` the structural equality
//! exposed through reflection.

use hashbrown::HashSet;

use crate::panic::{Panic, RtResult};
use crate::reflect::type_of;
use crate::value::{Typed, Value};

pub const HASH_K: u64 = 0xf1357aea2e62a9c5;
pub const HASH_SEED: u64 = 0x517cc1b727220a95;

fn type_str(v: &Value) -> String {
    type_of(v).map(|t| t.to_string()).unwrap_or_else(|| v.variant_name().to_string())
}

/// Whether a `Typed` box and a plain value carry the same dynamic type.
fn typed_matches(t: &Typed, other: &Value) -> bool {
    type_of(other).map_or(false, |ty| &ty == t.ty())
}

/// `a == b`. Comparing two values of the same uncomparable type faults.
pub fn equal(a: &Value, b: &Value) -> RtResult<bool> {
    match (a, b) {
        (Value::Typed(x), Value::Typed(y)) => {
            if x.ty() != y.ty() {
                return Ok(false);
            }
            equal(x.value(), y.value())
        }
        (Value::Typed(t), other) | (other, Value::Typed(t)) => {
            if !typed_matches(t, other) {
                return Ok(false);
            }
            equal(t.value(), other)
        }
        (Value::Nil, Value::Nil) => Ok(true),
        (Value::Nil, _) | (_, Value::Nil) => Ok(false),
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::Int(x), Value::Int(y)) => Ok(x == y),
        (Value::Uint(x), Value::Uint(y)) => Ok(x == y),
        (Value::Float(x), Value::Float(y)) => Ok(x == y),
        (Value::String(x), Value::String(y)) => Ok(x == y),
        (Value::Pointer(x), Value::Pointer(y)) => Ok(x.ptr_eq(y)),
        (Value::Chan(x), Value::Chan(y)) => Ok(x.ptr_eq(y)),
        (Value::Error(x), Value::Error(y)) => Ok(x.ptr_eq(y)),
        (Value::Struct(x), Value::Struct(y)) => {
            if x.ty() != y.ty() {
                return Ok(false);
            }
            if x.ptr_eq(y) {
                return Ok(true);
            }
            for (fx, fy) in x.fields().iter().zip(y.fields().iter()) {
                if !equal(fx, fy)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Value::Array(x), Value::Array(y)) => {
            if x.ty() != y.ty() {
                return Ok(false);
            }
            for (ex, ey) in x.to_vec().iter().zip(y.to_vec().iter()) {
                if !equal(ex, ey)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Value::Slice(_), Value::Slice(_))
        | (Value::Map(_), Value::Map(_))
        | (Value::Func(_), Value::Func(_)) => Err(Panic::uncomparable(&type_str(a))),
        _ => Ok(false),
    }
}

/// Fault unless `v` may be used as a map key.
pub fn check_hashable(v: &Value) -> RtResult<()> {
    match v {
        Value::Slice(_) | Value::Map(_) | Value::Func(_) => Err(Panic::unhashable(&type_str(v))),
        Value::Typed(t) => match t.value() {
            Value::Slice(_) | Value::Map(_) | Value::Func(_) => {
                Err(Panic::unhashable(&t.ty().to_string()))
            }
            inner => check_hashable(inner),
        },
        Value::Struct(s) => s.fields().iter().try_for_each(check_hashable),
        Value::Array(a) => a.to_vec().iter().try_for_each(check_hashable),
        _ => Ok(()),
    }
}

#[inline]
fn mix(h: &mut u64, x: u64) {
    *h = h.wrapping_add(x).wrapping_mul(HASH_K);
}

fn mix_value(h: &mut u64, v: &Value) {
    match v {
        Value::Nil => mix(h, 0),
        Value::Bool(b) => mix(h, *b as u64 + 1),
        Value::Int(i) => mix(h, *i as u64),
        Value::Uint(u) => mix(h, *u),
        // 0.0 and -0.0 compare equal.
        Value::Float(x) => mix(h, if *x == 0.0 { 0 } else { x.to_bits() }),
        Value::String(s) => {
            for &b in s.as_bytes() {
                mix(h, b as u64);
            }
            mix(h, s.len() as u64);
        }
        Value::Pointer(p) => mix(h, p.addr() as u64),
        Value::Chan(c) => mix(h, c.addr() as u64),
        Value::Error(e) => mix(h, e.addr() as u64),
        Value::Func(f) => mix(h, f.addr() as u64),
        Value::Struct(s) => s.fields().iter().for_each(|f| mix_value(h, f)),
        Value::Array(a) => a.to_vec().iter().for_each(|e| mix_value(h, e)),
        Value::Slice(s) => mix(h, s.addr() as u64),
        Value::Map(m) => mix(h, m.addr() as u64),
        Value::Typed(t) => mix_value(h, t.value()),
    }
}

/// Hash consistent with [`equal`] for hashable values.
pub fn hash_key(v: &Value) -> u64 {
    let mut h = HASH_SEED;
    mix_value(&mut h, v);
    h.rotate_left(5)
}

// =============================================================================
// DeepEqual
// =============================================================================

/// Structural equality through pointers, arrays, slices, maps and structs.
///
/// Two nils are equal; function values are equal only when both are nil; map
/// entries are compared regardless of order. Cycles are cut by assuming a
/// pair already under comparison is equal.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    let mut visited = HashSet::new();
    deep_equal_inner(a, b, &mut visited)
}

#[derive(Hash, PartialEq, Eq)]
enum VisitKey {
    Pointer(usize, usize),
    Slice(usize, usize, usize),
    Map(usize, usize),
}

fn deep_equal_inner(a: &Value, b: &Value, visited: &mut HashSet<VisitKey>) -> bool {
    match (a, b) {
        (Value::Typed(x), Value::Typed(y)) => {
            x.ty() == y.ty() && deep_equal_inner(x.value(), y.value(), visited)
        }
        // A typed nil never equals the untyped nil.
        (Value::Typed(t), other) | (other, Value::Typed(t)) => {
            typed_matches(t, other) && deep_equal_inner(t.value(), other, visited)
        }
        (Value::Nil, Value::Nil) => true,
        (Value::Nil, _) | (_, Value::Nil) => false,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Uint(x), Value::Uint(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Chan(x), Value::Chan(y)) => x.ptr_eq(y),
        (Value::Func(_), Value::Func(_)) => false,
        (Value::Error(x), Value::Error(y)) => {
            x.ptr_eq(y) || (x.concrete_type_id() == y.concrete_type_id() && x.error() == y.error())
        }
        (Value::Pointer(x), Value::Pointer(y)) => {
            if x.ptr_eq(y) {
                return true;
            }
            if !visited.insert(VisitKey::Pointer(x.addr(), y.addr())) {
                return true;
            }
            deep_equal_inner(&x.load(), &y.load(), visited)
        }
        (Value::Struct(x), Value::Struct(y)) => {
            x.ty() == y.ty()
                && x.fields()
                    .iter()
                    .zip(y.fields().iter())
                    .all(|(fx, fy)| deep_equal_inner(fx, fy, visited))
        }
        (Value::Array(x), Value::Array(y)) => {
            x.ty() == y.ty()
                && x.to_vec()
                    .iter()
                    .zip(y.to_vec().iter())
                    .all(|(ex, ey)| deep_equal_inner(ex, ey, visited))
        }
        (Value::Slice(x), Value::Slice(y)) => {
            if x.ty() != y.ty() || x.len() != y.len() {
                return false;
            }
            if x.ptr_eq(y) {
                return true;
            }
            if !visited.insert(VisitKey::Slice(x.addr(), y.addr(), x.len())) {
                return true;
            }
            x.to_vec()
                .iter()
                .zip(y.to_vec().iter())
                .all(|(ex, ey)| deep_equal_inner(ex, ey, visited))
        }
        (Value::Map(x), Value::Map(y)) => {
            if x.ty() != y.ty() || x.len() != y.len() {
                return false;
            }
            if x.ptr_eq(y) {
                return true;
            }
            if !visited.insert(VisitKey::Map(x.addr(), y.addr())) {
                return true;
            }
            x.entries().iter().all(|(k, vx)| match y.get(k) {
                Ok(Some(vy)) => deep_equal_inner(vx, &vy, visited),
                _ => false,
            })
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::slice::SliceValue;
    use crate::reflect;
    use tern_common_core::Kind;

    #[test]
    fn test_equal_scalars() {
        assert!(equal(&Value::Int(3), &Value::Int(3)).unwrap());
        assert!(!equal(&Value::Int(3), &Value::Uint(3)).unwrap());
        assert!(!equal(&Value::Float(f64::NAN), &Value::Float(f64::NAN)).unwrap());
        assert!(equal(&Value::from("a"), &Value::from("a")).unwrap());
        assert!(!equal(&Value::Nil, &Value::Int(0)).unwrap());
    }

    #[test]
    fn test_equal_uncomparable_faults() {
        let s = Value::Slice(SliceValue::of(reflect::basic(Kind::Int), vec![]));
        let err = equal(&s, &s.clone()).unwrap_err();
        assert_eq!(err.message(), "runtime error: comparing uncomparable type []int");
        // Different dynamic types compare unequal without faulting.
        assert!(!equal(&s, &Value::Int(1)).unwrap());
    }

    #[test]
    fn test_hash_agrees_with_equal() {
        assert_eq!(hash_key(&Value::Float(0.0)), hash_key(&Value::Float(-0.0)));
        assert_eq!(hash_key(&Value::from("key")), hash_key(&Value::from(String::from("key"))));
        assert_ne!(hash_key(&Value::from("ab")), hash_key(&Value::from("ba")));
    }

    #[test]
    fn test_deep_equal_typed_nil() {
        let ptr = reflect::pointer_to(reflect::basic(Kind::Int));
        let typed_nil = Value::Typed(Typed::new(ptr.clone(), Value::Nil));
        assert!(!deep_equal(&typed_nil, &Value::Nil));
        assert!(!deep_equal(&Value::Nil, &typed_nil));
        assert!(deep_equal(&typed_nil, &Value::Typed(Typed::new(ptr, Value::Nil))));
        let other_nil = Value::Typed(Typed::new(reflect::pointer_to(reflect::basic(Kind::String)), Value::Nil));
        assert!(!deep_equal(&typed_nil, &other_nil));
    }

    #[test]
    fn test_check_hashable() {
        assert!(check_hashable(&Value::Int(1)).is_ok());
        let s = Value::Slice(SliceValue::of(reflect::basic(Kind::Int), vec![]));
        let err = check_hashable(&s).unwrap_err();
        assert_eq!(err.message(), "runtime error: hash of unhashable type []int");
    }
}
