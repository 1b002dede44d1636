//! Maps keyed by `==` semantics.
//!
//! Entries keep insertion order so iteration is stable between mutations;
//! programs must not rely on it. A nil map is `Value::Nil`.
//!
//! Struct and array keys and elements are copied in and out, so a caller's
//! variable never aliases what the map holds.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::copy::copy_value;
use crate::objects::compare::{check_hashable, equal, hash_key};
use crate::panic::{Panic, RtResult};
use crate::reflect::Type;
use crate::value::Value;
use tern_common_core::Kind;

/// A hashable value used as a map key.
#[derive(Clone, Debug)]
pub struct MapKey(pub Value);

impl Hash for MapKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(hash_key(&self.0));
    }
}

impl PartialEq for MapKey {
    fn eq(&self, other: &Self) -> bool {
        equal(&self.0, &other.0).unwrap_or(false)
    }
}

impl Eq for MapKey {}

#[derive(Clone)]
pub struct MapValue {
    ty: Type,
    entries: Rc<RefCell<IndexMap<MapKey, Value>>>,
}

impl MapValue {
    /// `make(map[K]V)`
    pub fn new(ty: &Type) -> RtResult<Self> {
        if ty.kind() != Kind::Map {
            return Err(Panic::reflect(format!("reflect: map value of non-map type {}", ty)));
        }
        Ok(Self { ty: ty.clone(), entries: Rc::new(RefCell::new(IndexMap::new())) })
    }

    /// Map literal.
    pub fn with_entries(ty: &Type, entries: impl IntoIterator<Item = (Value, Value)>) -> RtResult<Self> {
        let m = Self::new(ty)?;
        for (k, v) in entries {
            m.insert(k, v)?;
        }
        Ok(m)
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &Value) -> RtResult<Option<Value>> {
        check_hashable(key)?;
        Ok(self.entries.borrow().get(&MapKey(key.clone())).map(copy_value))
    }

    /// `m[k]`: the element, or the element type's zero value.
    pub fn get_or_zero(&self, key: &Value) -> RtResult<Value> {
        match self.get(key)? {
            Some(v) => Ok(v),
            None => self.ty.elem()?.zero(),
        }
    }

    pub fn contains_key(&self, key: &Value) -> RtResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    pub fn insert(&self, key: Value, value: Value) -> RtResult<()> {
        check_hashable(&key)?;
        self.entries.borrow_mut().insert(MapKey(copy_value(&key)), copy_value(&value));
        Ok(())
    }

    /// `delete(m, k)`
    pub fn remove(&self, key: &Value) -> RtResult<Option<Value>> {
        check_hashable(key)?;
        Ok(self.entries.borrow_mut().shift_remove(&MapKey(key.clone())))
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.borrow().keys().map(|k| copy_value(&k.0)).collect()
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.entries.borrow().iter().map(|(k, v)| (copy_value(&k.0), copy_value(v))).collect()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &MapValue) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.entries) as usize
    }
}

impl fmt::Debug for MapValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.ty, Value::Map(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::cell::make_cell;
    use crate::objects::slice::SliceValue;
    use crate::objects::struct_ops::StructValue;
    use crate::reflect;

    fn string_int_map() -> MapValue {
        let ty = reflect::map_of(reflect::basic(Kind::String), reflect::basic(Kind::Int));
        MapValue::new(&ty).unwrap()
    }

    #[test]
    fn test_insert_get_remove() {
        let m = string_int_map();
        m.insert(Value::from("a"), Value::Int(1)).unwrap();
        m.insert(Value::from(String::from("a")), Value::Int(2)).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m.get(&Value::from("a")).unwrap().and_then(|v| v.as_int()), Some(2));
        assert_eq!(m.get_or_zero(&Value::from("missing")).unwrap().as_int(), Some(0));
        assert!(m.remove(&Value::from("a")).unwrap().is_some());
        assert!(m.is_empty());
    }

    #[test]
    fn test_pointer_keys_by_identity() {
        let ty = reflect::map_of(reflect::pointer_to(reflect::basic(Kind::Int)), reflect::basic(Kind::Int));
        let m = MapValue::new(&ty).unwrap();
        let a = Value::from(make_cell(1i64));
        let b = Value::from(make_cell(1i64));
        m.insert(a.clone(), Value::Int(1)).unwrap();
        m.insert(b, Value::Int(2)).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(&a).unwrap().and_then(|v| v.as_int()), Some(1));
    }

    #[test]
    fn test_struct_keys_and_elements_are_copied() {
        let point = reflect::struct_of([("X", reflect::basic(Kind::Int), "")]);
        let p = |x: i64| Value::Struct(StructValue::new(&point, [("X", Value::Int(x))]).unwrap());
        let m = MapValue::new(&reflect::map_of(point.clone(), point.clone())).unwrap();

        let key = p(1);
        let elem = p(10);
        m.insert(key.clone(), elem.clone()).unwrap();
        key.as_struct().unwrap().set("X", Value::Int(2)).unwrap();
        elem.as_struct().unwrap().set("X", Value::Int(20)).unwrap();

        let got = m.get(&p(1)).unwrap().unwrap();
        assert_eq!(got.as_struct().unwrap().get("X").unwrap().as_int(), Some(10));
        assert!(m.get(&p(2)).unwrap().is_none());

        // Mutating a looked-up element leaves the stored one alone.
        got.as_struct().unwrap().set("X", Value::Int(30)).unwrap();
        let again = m.get(&p(1)).unwrap().unwrap();
        assert_eq!(again.as_struct().unwrap().get("X").unwrap().as_int(), Some(10));
    }

    #[test]
    fn test_unhashable_key_faults() {
        let ty = reflect::map_of(reflect::any_type(), reflect::basic(Kind::Int));
        let m = MapValue::new(&ty).unwrap();
        let key = Value::Slice(SliceValue::of(reflect::basic(Kind::Int), vec![]));
        assert!(m.insert(key, Value::Int(1)).is_err());
    }
}
