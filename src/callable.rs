//! Callable items from the target-crate catalog.
//!
//! A [`Callable`] is anything the engine can turn into a call or
//! construction statement: free functions, instance methods, static
//! methods, and struct/enum initializers. Catalogs are produced by the
//! compiler wing and loaded from JSON, so everything here derives serde.

use crate::types::binding::TypeBinding;
use crate::types::{GenericParam, Type};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One formal parameter of a callable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    #[serde(default)]
    pub name: Option<String>,
    pub ty: Type,
    /// Whether this parameter is the method receiver.
    #[serde(default)]
    pub is_self: bool,
}

impl Param {
    pub fn new(ty: Type) -> Self {
        Self {
            name: None,
            ty,
            is_self: false,
        }
    }

    pub fn named(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: Some(name.into()),
            ty,
            is_self: false,
        }
    }

    pub fn receiver(ty: Type) -> Self {
        Self {
            name: None,
            ty,
            is_self: true,
        }
    }

    pub fn is_by_reference(&self) -> bool {
        self.ty.is_ref()
    }

    /// Substitute resolved generics in the parameter type.
    pub fn bind_generics(&self, binding: &TypeBinding) -> Param {
        Param {
            name: self.name.clone(),
            ty: self.ty.bind_generics(binding),
            is_self: self.is_self,
        }
    }
}

/// The kind of callable item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallableKind {
    /// A free function.
    Function,
    /// An instance method; `params[0]` is the receiver.
    Method,
    /// An associated function called on a type.
    StaticMethod,
    /// A struct literal initializer; params are the fields.
    StructInit,
    /// An enum variant initializer.
    EnumInit { variant: String },
}

/// An invocable item from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Callable {
    pub name: String,
    pub kind: CallableKind,
    pub params: Vec<Param>,
    #[serde(default)]
    pub return_type: Option<Type>,
    /// Generic parameters the item itself declares.
    #[serde(default)]
    pub generics: Vec<GenericParam>,
    /// The type the item is associated with (methods, statics, inits).
    #[serde(default)]
    pub parent: Option<Type>,
    pub is_public: bool,
    /// Source file of the item; consulted only for private items.
    #[serde(default)]
    pub src_file: Option<PathBuf>,
    /// Globally unique id, used to break generator recursion.
    pub global_id: String,
}

impl Callable {
    /// A public free function, the common case in tests and fixtures.
    pub fn function(
        name: impl Into<String>,
        params: Vec<Param>,
        return_type: Option<Type>,
    ) -> Self {
        let name = name.into();
        Self {
            global_id: name.clone(),
            name,
            kind: CallableKind::Function,
            params,
            return_type,
            generics: Vec::new(),
            parent: None,
            is_public: true,
            src_file: None,
        }
    }

    /// A public instance method on `parent`; `receiver` becomes `params[0]`.
    pub fn method(
        name: impl Into<String>,
        parent: Type,
        receiver: Param,
        mut params: Vec<Param>,
        return_type: Option<Type>,
    ) -> Self {
        let name = name.into();
        params.insert(0, receiver);
        Self {
            global_id: format!("{}::{}", parent, name),
            name,
            kind: CallableKind::Method,
            params,
            return_type,
            generics: Vec::new(),
            parent: Some(parent),
            is_public: true,
            src_file: None,
        }
    }

    pub fn is_method(&self) -> bool {
        matches!(self.kind, CallableKind::Method)
    }

    pub fn returns_value(&self) -> bool {
        self.return_type.is_some()
    }

    /// The receiver parameter, if this is an instance method.
    pub fn self_param(&self) -> Option<&Param> {
        self.params.first().filter(|p| p.is_self)
    }

    /// Parameters excluding the receiver.
    pub fn value_params(&self) -> &[Param] {
        match self.self_param() {
            Some(_) => &self.params[1..],
            None => &self.params,
        }
    }

    pub fn src_file(&self) -> Option<&Path> {
        self.src_file.as_deref()
    }

    /// Every generic parameter this callable can mention: deep generics
    /// of all parameter types and the return type, the owning type's
    /// generics, and the item's own declared generics, in that order.
    pub fn deep_generics(&self) -> Vec<GenericParam> {
        let mut out = Vec::new();
        let mut push = |g: GenericParam| {
            if !out.contains(&g) {
                out.push(g);
            }
        };
        for p in &self.params {
            for g in p.ty.deep_generics() {
                push(g);
            }
        }
        if let Some(parent) = &self.parent {
            for g in parent.deep_generics() {
                push(g);
            }
        }
        for g in &self.generics {
            push(g.clone());
        }
        if let Some(ret) = &self.return_type {
            for g in ret.deep_generics() {
                push(g);
            }
        }
        out
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{}::", parent)?;
        }
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if p.is_self {
                write!(f, "self: {}", p.ty)?;
            } else {
                write!(f, "{}", p.ty)?;
            }
        }
        write!(f, ")")?;
        if let Some(ret) = &self.return_type {
            write!(f, " -> {}", ret)?;
        }
        Ok(())
    }
}
