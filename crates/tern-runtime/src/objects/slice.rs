//! Slices: a window `{offset, len, cap}` over shared backing storage.
//!
//! A nil slice is `Value::Nil`; [`append`] accepts `None` for it.

use std::fmt;
use std::rc::Rc;

use crate::objects::cell::Pointer;
use crate::objects::{new_backing, Backing};
use crate::panic::{Panic, RuntimeTrapKind, RtResult};
use crate::reflect::{self, Type};
use crate::value::Value;

#[derive(Clone)]
pub struct SliceValue {
    ty: Type,
    backing: Backing,
    offset: usize,
    len: usize,
    cap: usize,
}

impl SliceValue {
    /// `make([]T, len, cap)`
    pub fn make(ty: &Type, len: i64, cap: i64) -> RtResult<Self> {
        if len < 0 {
            return Err(Panic::runtime(RuntimeTrapKind::MakeSlice, "makeslice: len out of range"));
        }
        if cap < len {
            return Err(Panic::runtime(RuntimeTrapKind::MakeSlice, "makeslice: cap out of range"));
        }
        let elems = zeros(&ty.elem()?, cap as usize)?;
        Ok(Self::from_parts(ty.clone(), new_backing(elems), 0, len as usize, cap as usize))
    }

    /// Slice literal.
    pub fn from_vec(ty: Type, elems: Vec<Value>) -> Self {
        let len = elems.len();
        Self::from_parts(ty, new_backing(elems), 0, len, len)
    }

    /// `[]elem{...}` for an unnamed slice type.
    pub fn of(elem: Type, elems: Vec<Value>) -> Self {
        Self::from_vec(reflect::slice_of(elem), elems)
    }

    pub(crate) fn from_parts(ty: Type, backing: Backing, offset: usize, len: usize, cap: usize) -> Self {
        Self { ty, backing, offset, len, cap }
    }

    #[inline]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn get(&self, index: usize) -> RtResult<Value> {
        if index >= self.len {
            return Err(Panic::index_out_of_range(index, self.len));
        }
        Ok(self.backing.borrow()[self.offset + index].clone())
    }

    pub fn set(&self, index: usize, value: Value) -> RtResult<()> {
        if index >= self.len {
            return Err(Panic::index_out_of_range(index, self.len));
        }
        self.backing.borrow_mut()[self.offset + index] = value;
        Ok(())
    }

    /// `&s[i]`
    pub fn elem_ptr(&self, index: usize) -> RtResult<Pointer> {
        if index >= self.len {
            return Err(Panic::index_out_of_range(index, self.len));
        }
        Ok(Pointer::Elem {
            backing: self.backing.clone(),
            index: self.offset + index,
            elem: self.ty.elem().ok(),
        })
    }

    /// `s[lo:hi]`; `hi` may extend up to the capacity.
    pub fn slice(&self, lo: usize, hi: usize) -> RtResult<SliceValue> {
        if lo > hi || hi > self.cap {
            return Err(Panic::slice_bounds(lo, hi, self.cap));
        }
        Ok(Self::from_parts(
            self.ty.clone(),
            self.backing.clone(),
            self.offset + lo,
            hi - lo,
            self.cap - lo,
        ))
    }

    /// Append in place while capacity allows; otherwise reallocate.
    pub fn append(&self, items: impl IntoIterator<Item = Value>) -> RtResult<SliceValue> {
        let items: Vec<Value> = items.into_iter().collect();
        let new_len = self.len + items.len();
        if new_len <= self.cap {
            {
                let mut backing = self.backing.borrow_mut();
                let start = self.offset + self.len;
                for (slot, item) in backing[start..start + items.len()].iter_mut().zip(items) {
                    *slot = item;
                }
            }
            return Ok(Self::from_parts(self.ty.clone(), self.backing.clone(), self.offset, new_len, self.cap));
        }

        let new_cap = grow_cap(self.cap, new_len);
        let mut elems = Vec::with_capacity(new_cap);
        elems.extend(self.to_vec());
        elems.extend(items);
        elems.extend(zeros(&self.ty.elem()?, new_cap - new_len)?);
        Ok(Self::from_parts(self.ty.clone(), new_backing(elems), 0, new_len, new_cap))
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.backing.borrow()[self.offset..self.offset + self.len].to_vec()
    }

    /// Same backing store and window start.
    pub fn ptr_eq(&self, other: &SliceValue) -> bool {
        Rc::ptr_eq(&self.backing, &other.backing) && self.offset == other.offset
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.backing) as usize + self.offset * std::mem::size_of::<Value>()
    }
}

/// `n` zero elements, each its own value so struct and array slots stay distinct.
fn zeros(elem: &Type, n: usize) -> RtResult<Vec<Value>> {
    (0..n).map(|_| elem.zero()).collect()
}

fn grow_cap(cap: usize, needed: usize) -> usize {
    let doubled = if cap == 0 { 4 } else { cap * 2 };
    doubled.max(needed)
}

/// `append(s, items...)`; `None` is the nil slice.
pub fn append(
    base: Option<&SliceValue>,
    ty: &Type,
    items: impl IntoIterator<Item = Value>,
) -> RtResult<SliceValue> {
    match base {
        Some(s) => s.append(items),
        None => SliceValue::from_parts(ty.clone(), new_backing(Vec::new()), 0, 0, 0).append(items),
    }
}

impl fmt::Debug for SliceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.ty, Value::Slice(self.clone()))
    }
}
