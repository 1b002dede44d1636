//! Fixed-length arrays.
//!
//! Arrays are value types. Slicing an array aliases its storage, so the
//! backing store is shared with any slice taken from it until the array
//! itself is copied.

use std::fmt;

use crate::copy::{copy_value, ValueType};
use crate::objects::cell::Pointer;
use crate::objects::slice::SliceValue;
use crate::objects::{new_backing, Backing};
use crate::panic::{Panic, RtResult};
use crate::reflect::{self, Type};
use crate::value::Value;
use tern_common_core::Kind;

#[derive(Clone)]
pub struct ArrayValue {
    ty: Type,
    elems: Backing,
}

impl ArrayValue {
    pub fn zero(ty: &Type) -> RtResult<Self> {
        if ty.kind() != Kind::Array {
            return Err(Panic::reflect(format!("reflect: array value of non-array type {}", ty)));
        }
        let elem = ty.elem()?;
        let elems = (0..ty.len()?).map(|_| elem.zero()).collect::<RtResult<Vec<_>>>()?;
        Ok(Self { ty: ty.clone(), elems: new_backing(elems) })
    }

    /// Build from elements; the count must match the array length.
    pub fn from_vec(ty: Type, elems: Vec<Value>) -> Self {
        Self { ty, elems: new_backing(elems) }
    }

    /// `[N]elem{...}` for an unnamed array type.
    pub fn of(elem: Type, elems: Vec<Value>) -> Self {
        let ty = reflect::array_of(elems.len(), elem);
        Self::from_vec(ty, elems)
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn len(&self) -> usize {
        self.elems.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> RtResult<Value> {
        let elems = self.elems.borrow();
        elems.get(index).cloned().ok_or_else(|| Panic::index_out_of_range(index, elems.len()))
    }

    pub fn set(&self, index: usize, value: Value) -> RtResult<()> {
        let mut elems = self.elems.borrow_mut();
        let len = elems.len();
        let slot = elems.get_mut(index).ok_or_else(|| Panic::index_out_of_range(index, len))?;
        *slot = value;
        Ok(())
    }

    /// `&a[i]`
    pub fn elem_ptr(&self, index: usize) -> RtResult<Pointer> {
        let len = self.len();
        if index >= len {
            return Err(Panic::index_out_of_range(index, len));
        }
        Ok(Pointer::Elem { backing: self.elems.clone(), index, elem: self.ty.elem().ok() })
    }

    /// `a[lo:hi]`, sharing this array's storage.
    pub fn slice(&self, lo: usize, hi: usize) -> RtResult<SliceValue> {
        let len = self.len();
        if lo > hi || hi > len {
            return Err(Panic::slice_bounds(lo, hi, len));
        }
        let ty = reflect::slice_of(self.ty.elem()?);
        Ok(SliceValue::from_parts(ty, self.elems.clone(), lo, hi - lo, len - lo))
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.elems.borrow().clone()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &ArrayValue) -> bool {
        std::rc::Rc::ptr_eq(&self.elems, &other.elems)
    }
}

impl ValueType for ArrayValue {
    fn clone_value(&self) -> Self {
        let elems = self.elems.borrow().iter().map(copy_value).collect();
        Self { ty: self.ty.clone(), elems: new_backing(elems) }
    }
}

impl fmt::Debug for ArrayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.ty, Value::Array(self.clone()))
    }
}
