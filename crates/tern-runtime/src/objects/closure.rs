//! Function values.

use std::fmt;
use std::rc::Rc;

use crate::panic::RtResult;
use crate::reflect::Type;
use crate::value::Value;

pub type NativeFn = dyn Fn(&[Value]) -> RtResult<Vec<Value>>;

#[derive(Clone)]
pub struct FuncValue {
    func: Rc<NativeFn>,
    ty: Option<Type>,
}

impl FuncValue {
    pub fn new(f: impl Fn(&[Value]) -> RtResult<Vec<Value>> + 'static) -> Self {
        Self { func: Rc::new(f), ty: None }
    }

    /// A function value with a known signature, as reflection sees it.
    pub fn with_type(ty: Type, f: impl Fn(&[Value]) -> RtResult<Vec<Value>> + 'static) -> Self {
        Self { func: Rc::new(f), ty: Some(ty) }
    }

    #[inline]
    pub fn call(&self, args: &[Value]) -> RtResult<Vec<Value>> {
        (self.func)(args)
    }

    pub fn ty(&self) -> Option<&Type> {
        self.ty.as_ref()
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.func) as *const () as usize
    }
}

impl fmt::Debug for FuncValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FuncValue(0x{:x})", self.addr())
    }
}
