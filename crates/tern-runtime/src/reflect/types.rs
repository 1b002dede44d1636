//! Type descriptors.
//!
//! A [`Type`] is an immutable, shareable description of a source-language
//! type. Named types are identified by their qualified name; unnamed types
//! structurally, through their canonical spelling. Composite types may refer
//! to a named type that is not registered yet (recursive declarations); such
//! references are resolved against the registry when first followed.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tern_common_core::{ChanDir, Kind, StructTag};

use super::registry;
use crate::objects::array::ArrayValue;
use crate::objects::struct_ops::StructValue;
use crate::panic::{Panic, RtResult};
use crate::value::Value;

// =============================================================================
// TypeRef
// =============================================================================

/// A reference to another type, possibly by name only.
#[derive(Clone)]
pub enum TypeRef {
    Resolved(Type),
    /// Qualified name of a registered type (`"main.Node"`).
    Named(String),
}

impl TypeRef {
    pub fn resolve(&self) -> RtResult<Type> {
        match self {
            TypeRef::Resolved(ty) => Ok(ty.clone()),
            TypeRef::Named(name) => registry::type_for(name),
        }
    }

    fn id(&self) -> String {
        match self {
            TypeRef::Resolved(ty) => ty.id().to_string(),
            TypeRef::Named(name) => name.clone(),
        }
    }

    fn display(&self) -> String {
        match self {
            TypeRef::Resolved(ty) => ty.string().to_string(),
            TypeRef::Named(name) => short_qualified(name),
        }
    }

    /// Unqualified name, used for embedded fields.
    fn base_name(&self) -> String {
        match self {
            TypeRef::Resolved(ty) => match &ty.0.repr {
                TypeRepr::Pointer(elem) if ty.0.name.is_empty() => elem.base_name(),
                _ => ty.0.name.clone(),
            },
            TypeRef::Named(name) => {
                let name = name.trim_start_matches('*');
                name.rsplit('.').next().unwrap_or(name).to_string()
            }
        }
    }
}

impl From<Type> for TypeRef {
    fn from(ty: Type) -> Self {
        TypeRef::Resolved(ty)
    }
}

impl From<&Type> for TypeRef {
    fn from(ty: &Type) -> Self {
        TypeRef::Resolved(ty.clone())
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::Named(name.to_string())
    }
}

/// `"example.com/pkg.Name"` -> `"pkg.Name"`.
fn short_qualified(name: &str) -> String {
    match name.rfind('/') {
        Some(slash) => name[slash + 1..].to_string(),
        None => name.to_string(),
    }
}

fn short_pkg(pkg_path: &str) -> &str {
    pkg_path.rsplit('/').next().unwrap_or(pkg_path)
}

fn is_exported(name: &str) -> bool {
    name.chars().next().map_or(false, char::is_uppercase)
}

// =============================================================================
// Signatures, fields, methods
// =============================================================================

/// Parameter and result lists of a function type.
#[derive(Clone, Default)]
pub struct Signature {
    params: Vec<TypeRef>,
    results: Vec<TypeRef>,
    variadic: bool,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, ty: impl Into<TypeRef>) -> Self {
        self.params.push(ty.into());
        self
    }

    /// Final `...elem` parameter.
    pub fn variadic(mut self, elem: impl Into<TypeRef>) -> Self {
        self.params.push(TypeRef::Resolved(slice_of(elem)));
        self.variadic = true;
        self
    }

    pub fn result(mut self, ty: impl Into<TypeRef>) -> Self {
        self.results.push(ty.into());
        self
    }

    fn render(&self, name_of: &dyn Fn(&TypeRef) -> String) -> String {
        let last = self.params.len().saturating_sub(1);
        let params: Vec<String> = self
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| {
                if self.variadic && i == last {
                    // The slice element, spelled `...T`.
                    if let TypeRef::Resolved(ty) = p {
                        if let TypeRepr::Slice(elem) = &ty.0.repr {
                            return format!("...{}", name_of(elem));
                        }
                    }
                }
                name_of(p)
            })
            .collect();
        let mut out = format!("({})", params.join(", "));
        match self.results.len() {
            0 => {}
            1 => {
                out.push(' ');
                out.push_str(&name_of(&self.results[0]));
            }
            _ => {
                let results: Vec<String> = self.results.iter().map(name_of).collect();
                out.push_str(&format!(" ({})", results.join(", ")));
            }
        }
        out
    }

    fn id(&self) -> String {
        self.render(&TypeRef::id)
    }
}

#[derive(Clone)]
pub(crate) struct FieldDef {
    name: String,
    ty: TypeRef,
    tag: StructTag,
    embedded: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self { name: name.into(), ty: ty.into(), tag: StructTag::default(), embedded: false }
    }

    pub fn tagged(mut self, tag: &str) -> Self {
        self.tag = StructTag::from(tag);
        self
    }

    pub fn embedded(ty: impl Into<TypeRef>) -> Self {
        let ty = ty.into();
        Self { name: ty.base_name(), ty, tag: StructTag::default(), embedded: true }
    }
}

/// A struct field as reflection reports it.
#[derive(Clone)]
pub struct StructField {
    pub name: String,
    /// Empty for exported fields.
    pub pkg_path: String,
    pub ty: Type,
    pub tag: StructTag,
    /// Index path from the outer struct; longer than one for promoted fields.
    pub index: Vec<usize>,
    pub anonymous: bool,
}

impl StructField {
    pub fn is_exported(&self) -> bool {
        self.pkg_path.is_empty()
    }
}

#[derive(Clone)]
pub(crate) struct MethodDecl {
    pub(crate) name: String,
    pub(crate) sig: Signature,
    pub(crate) pointer_receiver: bool,
}

/// A method as reflection reports it.
#[derive(Clone)]
pub struct Method {
    pub name: String,
    /// Empty for exported methods.
    pub pkg_path: String,
    /// Function type; for concrete types the receiver is the first parameter.
    pub ty: Type,
    pub index: usize,
}

// =============================================================================
// Type
// =============================================================================

#[derive(Clone)]
pub(crate) enum TypeRepr {
    Basic,
    Pointer(TypeRef),
    Slice(TypeRef),
    Array { len: usize, elem: TypeRef },
    Map { key: TypeRef, elem: TypeRef },
    Chan { dir: ChanDir, elem: TypeRef },
    Func(Signature),
    Struct(Vec<FieldDef>),
    Interface(Vec<MethodDecl>),
}

impl TypeRepr {
    /// Spelling of the underlying type, naming referenced types with `name_of`.
    fn render(&self, kind: Kind, name_of: &dyn Fn(&TypeRef) -> String) -> String {
        match self {
            TypeRepr::Basic => kind.as_str().to_string(),
            TypeRepr::Pointer(elem) => format!("*{}", name_of(elem)),
            TypeRepr::Slice(elem) => format!("[]{}", name_of(elem)),
            TypeRepr::Array { len, elem } => format!("[{}]{}", len, name_of(elem)),
            TypeRepr::Map { key, elem } => format!("map[{}]{}", name_of(key), name_of(elem)),
            TypeRepr::Chan { dir, elem } => format!("{}{}", dir.prefix(), name_of(elem)),
            TypeRepr::Func(sig) => format!("func{}", sig.render(name_of)),
            TypeRepr::Struct(fields) => {
                if fields.is_empty() {
                    return "struct {}".to_string();
                }
                let parts: Vec<String> = fields
                    .iter()
                    .map(|f| {
                        let mut part = if f.embedded {
                            name_of(&f.ty)
                        } else {
                            format!("{} {}", f.name, name_of(&f.ty))
                        };
                        if !f.tag.is_empty() {
                            part.push_str(&format!(" {:?}", f.tag.as_str()));
                        }
                        part
                    })
                    .collect();
                format!("struct {{ {} }}", parts.join("; "))
            }
            TypeRepr::Interface(methods) => {
                if methods.is_empty() {
                    return "interface {}".to_string();
                }
                let parts: Vec<String> =
                    methods.iter().map(|m| format!("{}{}", m.name, m.sig.render(name_of))).collect();
                format!("interface {{ {} }}", parts.join("; "))
            }
        }
    }
}

pub struct TypeData {
    kind: Kind,
    name: String,
    pkg_path: String,
    pub(crate) repr: TypeRepr,
    pub(crate) methods: Vec<MethodDecl>,
    /// Identity key: qualified name for named types, canonical spelling otherwise.
    id: String,
    string: String,
}

/// A shareable type descriptor.
#[derive(Clone)]
pub struct Type(Arc<TypeData>);

impl Type {
    pub(crate) fn new_unnamed(kind: Kind, repr: TypeRepr) -> Self {
        let id = repr.render(kind, &TypeRef::id);
        let string = repr.render(kind, &TypeRef::display);
        Self(Arc::new(TypeData { kind, name: String::new(), pkg_path: String::new(), repr, methods: Vec::new(), id, string }))
    }

    pub(crate) fn new_named(
        pkg_path: &str,
        name: &str,
        kind: Kind,
        repr: TypeRepr,
        methods: Vec<MethodDecl>,
    ) -> Self {
        let (id, string) = if pkg_path.is_empty() {
            (name.to_string(), name.to_string())
        } else {
            (format!("{}.{}", pkg_path, name), format!("{}.{}", short_pkg(pkg_path), name))
        };
        Self(Arc::new(TypeData {
            kind,
            name: name.to_string(),
            pkg_path: pkg_path.to_string(),
            repr,
            methods,
            id,
            string,
        }))
    }

    #[inline]
    pub fn kind(&self) -> Kind {
        self.0.kind
    }

    /// Name within its package; empty for unnamed types.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn pkg_path(&self) -> &str {
        &self.0.pkg_path
    }

    /// Spelling as the source language prints it (`main.Person`, `[]int`).
    pub fn string(&self) -> &str {
        &self.0.string
    }

    /// Registry key.
    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub(crate) fn repr(&self) -> &TypeRepr {
        &self.0.repr
    }

    /// Spelling of the underlying type.
    pub fn underlying_string(&self) -> String {
        self.0.repr.render(self.0.kind, &TypeRef::display)
    }

    fn kind_fault(&self, method: &str) -> Panic {
        Panic::reflect(format!("reflect: {} of non-{} type {}", method, method_kind(method), self))
    }

    // -------------------------------------------------------------------------
    // Structs
    // -------------------------------------------------------------------------

    pub(crate) fn field_defs(&self) -> &[FieldDef] {
        match &self.0.repr {
            TypeRepr::Struct(fields) => fields,
            _ => &[],
        }
    }

    pub(crate) fn field_count(&self) -> usize {
        self.field_defs().len()
    }

    pub fn num_field(&self) -> RtResult<usize> {
        match &self.0.repr {
            TypeRepr::Struct(fields) => Ok(fields.len()),
            _ => Err(self.kind_fault("NumField")),
        }
    }

    pub fn field(&self, index: usize) -> RtResult<StructField> {
        let fields = match &self.0.repr {
            TypeRepr::Struct(fields) => fields,
            _ => return Err(self.kind_fault("Field")),
        };
        let def = fields
            .get(index)
            .ok_or_else(|| Panic::reflect("reflect: Field index out of bounds"))?;
        Ok(StructField {
            name: def.name.clone(),
            pkg_path: if is_exported(&def.name) { String::new() } else { self.0.pkg_path.clone() },
            ty: def.ty.resolve()?,
            tag: def.tag.clone(),
            index: vec![index],
            anonymous: def.embedded,
        })
    }

    /// Index of a direct field.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.field_defs().iter().position(|f| f.name == name)
    }

    /// Field by name, searching promoted fields of embedded structs breadth first.
    pub fn field_by_name(&self, name: &str) -> RtResult<Option<StructField>> {
        if self.kind() != Kind::Struct {
            return Err(self.kind_fault("FieldByName"));
        }
        let mut level = vec![(self.clone(), Vec::new())];
        let mut seen = Vec::<String>::new();
        while !level.is_empty() {
            let mut next = Vec::new();
            for (ty, path) in level {
                if seen.iter().any(|id| id == ty.id()) {
                    continue;
                }
                seen.push(ty.id().to_string());
                if let Some(i) = ty.field_index(name) {
                    let mut field = ty.field(i)?;
                    let mut index = path.clone();
                    index.push(i);
                    field.index = index;
                    return Ok(Some(field));
                }
                for (i, def) in ty.field_defs().iter().enumerate() {
                    if !def.embedded {
                        continue;
                    }
                    let mut inner = def.ty.resolve()?;
                    if inner.kind() == Kind::Pointer {
                        inner = inner.elem()?;
                    }
                    if inner.kind() == Kind::Struct {
                        let mut p = path.clone();
                        p.push(i);
                        next.push((inner, p));
                    }
                }
            }
            level = next;
        }
        Ok(None)
    }

    // -------------------------------------------------------------------------
    // Methods
    // -------------------------------------------------------------------------

    /// Methods callable on a value of this type.
    fn method_set(&self) -> Vec<MethodDecl> {
        match &self.0.repr {
            TypeRepr::Interface(methods) => methods.clone(),
            TypeRepr::Pointer(elem) if self.0.name.is_empty() => {
                elem.resolve().map(|e| e.0.methods.clone()).unwrap_or_default()
            }
            _ => self.0.methods.iter().filter(|m| !m.pointer_receiver).cloned().collect(),
        }
    }

    /// Exported methods sorted by name (all methods for interfaces).
    fn method_list(&self) -> Vec<MethodDecl> {
        let is_iface = self.kind() == Kind::Interface;
        let mut methods: Vec<MethodDecl> =
            self.method_set().into_iter().filter(|m| is_iface || is_exported(&m.name)).collect();
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        methods
    }

    pub fn num_method(&self) -> usize {
        self.method_list().len()
    }

    pub fn method(&self, index: usize) -> RtResult<Method> {
        let methods = self.method_list();
        let decl = methods
            .get(index)
            .ok_or_else(|| Panic::reflect("reflect: Method index out of range"))?;
        Ok(self.describe_method(decl, index))
    }

    pub fn method_by_name(&self, name: &str) -> Option<Method> {
        let methods = self.method_list();
        let index = methods.iter().position(|m| m.name == name)?;
        Some(self.describe_method(&methods[index], index))
    }

    fn describe_method(&self, decl: &MethodDecl, index: usize) -> Method {
        let sig = if self.kind() == Kind::Interface {
            decl.sig.clone()
        } else {
            let mut sig = decl.sig.clone();
            sig.params.insert(0, TypeRef::Resolved(self.clone()));
            sig
        };
        Method {
            name: decl.name.clone(),
            pkg_path: if is_exported(&decl.name) { String::new() } else { self.0.pkg_path.clone() },
            ty: func_of_sig(sig),
            index,
        }
    }

    /// Whether this type's method set covers the interface `iface`.
    pub fn implements(&self, iface: &Type) -> RtResult<bool> {
        let required = match &iface.0.repr {
            TypeRepr::Interface(methods) => methods,
            _ => return Err(Panic::reflect("reflect: non-interface type passed to Type.Implements")),
        };
        let have = self.method_set();
        Ok(required
            .iter()
            .all(|m| have.iter().any(|h| h.name == m.name && h.sig.id() == m.sig.id())))
    }

    /// Whether values of this type support `==`.
    pub fn comparable(&self) -> bool {
        match &self.0.repr {
            TypeRepr::Slice(_) | TypeRepr::Map { .. } | TypeRepr::Func(_) => false,
            TypeRepr::Array { elem, .. } => elem.resolve().map_or(false, |e| e.comparable()),
            TypeRepr::Struct(fields) => {
                fields.iter().all(|f| f.ty.resolve().map_or(false, |t| t.comparable()))
            }
            _ => true,
        }
    }

    // -------------------------------------------------------------------------
    // Composite accessors
    // -------------------------------------------------------------------------

    pub fn elem(&self) -> RtResult<Type> {
        match &self.0.repr {
            TypeRepr::Pointer(elem)
            | TypeRepr::Slice(elem)
            | TypeRepr::Array { elem, .. }
            | TypeRepr::Map { elem, .. }
            | TypeRepr::Chan { elem, .. } => elem.resolve(),
            _ => Err(Panic::reflect(format!("reflect: Elem of invalid type {}", self))),
        }
    }

    pub fn key(&self) -> RtResult<Type> {
        match &self.0.repr {
            TypeRepr::Map { key, .. } => key.resolve(),
            _ => Err(self.kind_fault("Key")),
        }
    }

    pub fn len(&self) -> RtResult<usize> {
        match &self.0.repr {
            TypeRepr::Array { len, .. } => Ok(*len),
            _ => Err(self.kind_fault("Len")),
        }
    }

    pub fn chan_dir(&self) -> RtResult<ChanDir> {
        match &self.0.repr {
            TypeRepr::Chan { dir, .. } => Ok(*dir),
            _ => Err(self.kind_fault("ChanDir")),
        }
    }

    fn signature(&self, method: &str) -> RtResult<&Signature> {
        match &self.0.repr {
            TypeRepr::Func(sig) => Ok(sig),
            _ => Err(self.kind_fault(method)),
        }
    }

    pub fn num_in(&self) -> RtResult<usize> {
        Ok(self.signature("NumIn")?.params.len())
    }

    pub fn in_(&self, index: usize) -> RtResult<Type> {
        let sig = self.signature("In")?;
        sig.params
            .get(index)
            .ok_or_else(|| Panic::reflect("reflect: In index out of range"))?
            .resolve()
    }

    pub fn num_out(&self) -> RtResult<usize> {
        Ok(self.signature("NumOut")?.results.len())
    }

    pub fn out(&self, index: usize) -> RtResult<Type> {
        let sig = self.signature("Out")?;
        sig.results
            .get(index)
            .ok_or_else(|| Panic::reflect("reflect: Out index out of range"))?
            .resolve()
    }

    pub fn is_variadic(&self) -> RtResult<bool> {
        Ok(self.signature("IsVariadic")?.variadic)
    }

    /// The zero value of this type.
    pub fn zero(&self) -> RtResult<Value> {
        let kind = self.kind();
        Ok(match kind {
            Kind::Bool => Value::Bool(false),
            Kind::String => Value::from(""),
            Kind::Float32 | Kind::Float64 => Value::Float(0.0),
            k if k.is_signed_int() => Value::Int(0),
            k if k.is_unsigned_int() => Value::Uint(0),
            Kind::Complex64 | Kind::Complex128 => {
                return Err(Panic::reflect(format!("reflect: complex values are not supported ({})", self)))
            }
            Kind::Array => Value::Array(ArrayValue::zero(self)?),
            Kind::Struct => Value::Struct(StructValue::zero(self)?),
            _ => Value::Nil,
        })
    }
}

fn method_kind(method: &str) -> &'static str {
    match method {
        "NumField" | "Field" | "FieldByName" => "struct",
        "Key" => "map",
        "Len" => "array",
        "ChanDir" => "chan",
        _ => "func",
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.id == other.0.id
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.string)
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.0.string)
    }
}

// =============================================================================
// Constructors for unnamed types
// =============================================================================

/// Predeclared type for a basic kind.
pub fn basic(kind: Kind) -> Type {
    registry::basic(kind)
}

/// `*elem`
pub fn pointer_to(elem: impl Into<TypeRef>) -> Type {
    Type::new_unnamed(Kind::Pointer, TypeRepr::Pointer(elem.into()))
}

/// `[]elem`
pub fn slice_of(elem: impl Into<TypeRef>) -> Type {
    Type::new_unnamed(Kind::Slice, TypeRepr::Slice(elem.into()))
}

/// `[len]elem`
pub fn array_of(len: usize, elem: impl Into<TypeRef>) -> Type {
    Type::new_unnamed(Kind::Array, TypeRepr::Array { len, elem: elem.into() })
}

/// `map[key]elem`
pub fn map_of(key: impl Into<TypeRef>, elem: impl Into<TypeRef>) -> Type {
    Type::new_unnamed(Kind::Map, TypeRepr::Map { key: key.into(), elem: elem.into() })
}

/// `chan elem`, `chan<- elem` or `<-chan elem`
pub fn chan_of(dir: ChanDir, elem: impl Into<TypeRef>) -> Type {
    Type::new_unnamed(Kind::Chan, TypeRepr::Chan { dir, elem: elem.into() })
}

pub fn func_of_sig(sig: Signature) -> Type {
    Type::new_unnamed(Kind::Func, TypeRepr::Func(sig))
}

/// `struct { ... }` from `(name, type, tag)` triples.
pub fn struct_of<'a>(fields: impl IntoIterator<Item = (&'a str, Type, &'a str)>) -> Type {
    let defs = fields.into_iter().map(|(name, ty, tag)| FieldDef::new(name, ty).tagged(tag)).collect();
    Type::new_unnamed(Kind::Struct, TypeRepr::Struct(defs))
}

/// `interface { ... }`
pub fn interface_of(methods: impl IntoIterator<Item = (String, Signature)>) -> Type {
    let decls = methods
        .into_iter()
        .map(|(name, sig)| MethodDecl { name, sig, pointer_receiver: false })
        .collect();
    Type::new_unnamed(Kind::Interface, TypeRepr::Interface(decls))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unnamed_spelling() {
        let int = basic(Kind::Int);
        let string = basic(Kind::String);
        assert_eq!(slice_of(&int).to_string(), "[]int");
        assert_eq!(array_of(3, &int).to_string(), "[3]int");
        assert_eq!(map_of(&string, slice_of(&int)).to_string(), "map[string][]int");
        assert_eq!(chan_of(ChanDir::Recv, &int).to_string(), "<-chan int");
        assert_eq!(pointer_to(&int).to_string(), "*int");
        let f = func_of_sig(Signature::new().param(&int).variadic(&string).result(&int).result(&string));
        assert_eq!(f.to_string(), "func(int, ...string) (int, string)");
        assert_eq!(f.num_in().unwrap(), 2);
        assert!(f.is_variadic().unwrap());
        assert_eq!(struct_of([("A", int.clone(), r#"json:"a""#)]).to_string(), r#"struct { A int "json:\"a\"" }"#);
    }

    #[test]
    fn test_structural_identity() {
        let a = slice_of(basic(Kind::Int));
        let b = slice_of(basic(Kind::Int));
        assert_eq!(a, b);
        assert_ne!(a, slice_of(basic(Kind::Int8)));
    }

    #[test]
    fn test_accessor_kind_faults() {
        let int = basic(Kind::Int);
        assert!(int.elem().is_err());
        let err = int.num_field().unwrap_err();
        assert_eq!(err.message(), "reflect: NumField of non-struct type int");
        assert!(int.key().is_err());
        assert!(slice_of(&int).elem().is_ok());
    }

    #[test]
    fn test_comparable() {
        let int = basic(Kind::Int);
        assert!(int.comparable());
        assert!(!slice_of(&int).comparable());
        assert!(array_of(2, &int).comparable());
        assert!(!struct_of([("S", slice_of(&int), "")]).comparable());
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(basic(Kind::Int).zero().unwrap().as_int(), Some(0));
        assert_eq!(basic(Kind::Uint8).zero().unwrap().as_uint(), Some(0));
        assert_eq!(basic(Kind::String).zero().unwrap().as_str(), Some(""));
        assert!(slice_of(basic(Kind::Int)).zero().unwrap().is_nil());
        let arr = array_of(2, basic(Kind::Bool)).zero().unwrap();
        assert_eq!(arr.to_string(), "[false false]");
    }
}
