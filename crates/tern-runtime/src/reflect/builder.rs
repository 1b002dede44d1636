//! Declaring named types.
//!
//! ```ignore
//! let person = TypeBuilder::named_struct("main", "Person")
//!     .tagged_field("Name", basic(Kind::String), r#"json:"name""#)
//!     .field("Age", basic(Kind::Int))
//!     .method("String", Signature::new().result(basic(Kind::String)))
//!     .register();
//! ```

use tern_common_core::Kind;

use super::registry;
use super::types::{FieldDef, MethodDecl, Signature, Type, TypeRef, TypeRepr};

pub struct TypeBuilder {
    pkg_path: String,
    name: String,
    kind: Kind,
    repr: TypeRepr,
    methods: Vec<MethodDecl>,
}

impl TypeBuilder {
    /// `type Name struct { ... }`
    pub fn named_struct(pkg_path: &str, name: &str) -> Self {
        Self::with_repr(pkg_path, name, Kind::Struct, TypeRepr::Struct(Vec::new()))
    }

    /// `type Name interface { ... }`
    pub fn named_interface(pkg_path: &str, name: &str) -> Self {
        Self::with_repr(pkg_path, name, Kind::Interface, TypeRepr::Interface(Vec::new()))
    }

    /// `type Name underlying`. Methods of `underlying` are not inherited.
    pub fn named(pkg_path: &str, name: &str, underlying: &Type) -> Self {
        Self::with_repr(pkg_path, name, underlying.kind(), underlying.repr().clone())
    }

    fn with_repr(pkg_path: &str, name: &str, kind: Kind, repr: TypeRepr) -> Self {
        Self { pkg_path: pkg_path.to_string(), name: name.to_string(), kind, repr, methods: Vec::new() }
    }

    fn push_field(mut self, def: FieldDef) -> Self {
        if let TypeRepr::Struct(fields) = &mut self.repr {
            fields.push(def);
        }
        self
    }

    pub fn field(self, name: &str, ty: impl Into<TypeRef>) -> Self {
        self.push_field(FieldDef::new(name, ty))
    }

    pub fn tagged_field(self, name: &str, ty: impl Into<TypeRef>, tag: &str) -> Self {
        self.push_field(FieldDef::new(name, ty).tagged(tag))
    }

    /// Embedded field; its name is the type's unqualified name.
    pub fn embedded(self, ty: impl Into<TypeRef>) -> Self {
        self.push_field(FieldDef::embedded(ty))
    }

    /// Method with a value receiver; for interfaces, a required method.
    pub fn method(mut self, name: &str, sig: Signature) -> Self {
        let decl = MethodDecl { name: name.to_string(), sig, pointer_receiver: false };
        match &mut self.repr {
            TypeRepr::Interface(methods) => methods.push(decl),
            _ => self.methods.push(decl),
        }
        self
    }

    /// Method with a pointer receiver.
    pub fn pointer_method(mut self, name: &str, sig: Signature) -> Self {
        self.methods.push(MethodDecl { name: name.to_string(), sig, pointer_receiver: true });
        self
    }

    pub fn build(self) -> Type {
        Type::new_named(&self.pkg_path, &self.name, self.kind, self.repr, self.methods)
    }

    /// Build and register; returns the registered descriptor.
    pub fn register(self) -> Type {
        registry::register(self.build())
    }
}
