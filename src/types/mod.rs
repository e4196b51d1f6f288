//! Type model for the construction engine.
//!
//! This module defines the structural type representation callables are
//! described with: primitives, nominal struct/enum types, generic
//! parameters, references, tuples, arrays and slices. Types are plain
//! data; the catalog that produces them is emitted by the compiler wing
//! as JSON, hence the serde derives.

pub mod binding;

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named generic parameter, e.g. the `T` in `Vec<T>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GenericParam {
    pub name: String,
}

impl GenericParam {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for GenericParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Structural type representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Primitive type: `i32`, `bool`, `&str`, ...
    Prim(PrimType),
    /// Nominal struct type with its type arguments.
    Struct { name: String, generics: Vec<Type> },
    /// Nominal enum type with its type arguments.
    Enum { name: String, generics: Vec<Type> },
    /// An unresolved generic parameter.
    Generic(GenericParam),
    /// Reference type: `&T` / `&mut T`.
    Ref { inner: Box<Type>, mutable: bool },
    /// Tuple type: `(T1, T2, ...)`.
    Tuple(Vec<Type>),
    /// Fixed-length array type: `[T; N]`.
    Array { elem: Box<Type>, len: usize },
    /// Slice type: `[T]`. Present in catalogs but never generated.
    Slice(Box<Type>),
}

impl Type {
    /// Create a struct type without type arguments.
    pub fn structure(name: impl Into<String>) -> Type {
        Type::Struct {
            name: name.into(),
            generics: Vec::new(),
        }
    }

    /// Create an enum type without type arguments.
    pub fn enumeration(name: impl Into<String>) -> Type {
        Type::Enum {
            name: name.into(),
            generics: Vec::new(),
        }
    }

    /// Create a generic parameter type.
    pub fn generic(name: impl Into<String>) -> Type {
        Type::Generic(GenericParam::new(name))
    }

    /// Create a reference type.
    pub fn reference(inner: Type, mutable: bool) -> Type {
        Type::Ref {
            inner: Box::new(inner),
            mutable,
        }
    }

    /// Create an array type.
    pub fn array(elem: Type, len: usize) -> Type {
        Type::Array {
            elem: Box::new(elem),
            len,
        }
    }

    pub fn is_prim(&self) -> bool {
        matches!(self, Type::Prim(_))
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Type::Ref { .. })
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, Type::Generic(_))
    }

    pub fn as_generic(&self) -> Option<&GenericParam> {
        match self {
            Type::Generic(g) => Some(g),
            _ => None,
        }
    }

    /// The referent of a reference type.
    pub fn ref_inner(&self) -> Option<&Type> {
        match self {
            Type::Ref { inner, .. } => Some(inner),
            _ => None,
        }
    }

    /// Whether this type contains any unresolved generic parameter.
    pub fn has_generics(&self) -> bool {
        match self {
            Type::Prim(_) => false,
            Type::Generic(_) => true,
            Type::Struct { generics, .. } | Type::Enum { generics, .. } => {
                generics.iter().any(Type::has_generics)
            }
            Type::Ref { inner, .. } => inner.has_generics(),
            Type::Tuple(elems) => elems.iter().any(Type::has_generics),
            Type::Array { elem, .. } => elem.has_generics(),
            Type::Slice(elem) => elem.has_generics(),
        }
    }

    /// Collect every generic parameter nested anywhere in this type,
    /// in first-occurrence order.
    pub fn deep_generics(&self) -> Vec<GenericParam> {
        let mut out = Vec::new();
        self.collect_generics(&mut out);
        out
    }

    fn collect_generics(&self, out: &mut Vec<GenericParam>) {
        match self {
            Type::Prim(_) => {}
            Type::Generic(g) => {
                if !out.contains(g) {
                    out.push(g.clone());
                }
            }
            Type::Struct { generics, .. } | Type::Enum { generics, .. } => {
                for t in generics {
                    t.collect_generics(out);
                }
            }
            Type::Ref { inner, .. } => inner.collect_generics(out),
            Type::Tuple(elems) => {
                for t in elems {
                    t.collect_generics(out);
                }
            }
            Type::Array { elem, .. } => elem.collect_generics(out),
            Type::Slice(elem) => elem.collect_generics(out),
        }
    }

    /// Substitute bound generic parameters with their concrete types.
    /// Parameters the binding does not know stay in place.
    pub fn bind_generics(&self, binding: &binding::TypeBinding) -> Type {
        match self {
            Type::Prim(_) => self.clone(),
            Type::Generic(g) => binding.get(g).cloned().unwrap_or_else(|| self.clone()),
            Type::Struct { name, generics } => Type::Struct {
                name: name.clone(),
                generics: generics.iter().map(|t| t.bind_generics(binding)).collect(),
            },
            Type::Enum { name, generics } => Type::Enum {
                name: name.clone(),
                generics: generics.iter().map(|t| t.bind_generics(binding)).collect(),
            },
            Type::Ref { inner, mutable } => Type::Ref {
                inner: Box::new(inner.bind_generics(binding)),
                mutable: *mutable,
            },
            Type::Tuple(elems) => {
                Type::Tuple(elems.iter().map(|t| t.bind_generics(binding)).collect())
            }
            Type::Array { elem, len } => Type::Array {
                elem: Box::new(elem.bind_generics(binding)),
                len: *len,
            },
            Type::Slice(elem) => Type::Slice(Box::new(elem.bind_generics(binding))),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Prim(p) => write!(f, "{}", p),
            Type::Generic(g) => write!(f, "{}", g),
            Type::Struct { name, generics } | Type::Enum { name, generics } => {
                write!(f, "{}", name)?;
                if !generics.is_empty() {
                    write!(f, "<")?;
                    for (i, t) in generics.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", t)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            Type::Ref { inner, mutable } => {
                if *mutable {
                    write!(f, "&mut {}", inner)
                } else {
                    write!(f, "&{}", inner)
                }
            }
            Type::Tuple(elems) => {
                write!(f, "(")?;
                for (i, t) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ")")
            }
            Type::Array { elem, len } => write!(f, "[{}; {}]", elem, len),
            Type::Slice(elem) => write!(f, "[{}]", elem),
        }
    }
}

/// Primitive types the engine can synthesize literals for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimType {
    Bool,
    Char,
    Str,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
}

impl PrimType {
    pub fn is_float(&self) -> bool {
        matches!(self, PrimType::F32 | PrimType::F64)
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            PrimType::U8 | PrimType::U16 | PrimType::U32 | PrimType::U64 | PrimType::Usize
        )
    }

    /// Sample a fresh literal of this primitive type.
    pub fn sample(&self, rng: &mut impl Rng) -> PrimValue {
        match self {
            PrimType::Bool => PrimValue::Bool(rng.gen_bool(0.5)),
            PrimType::Char => PrimValue::Char(rng.gen_range('!'..='~')),
            PrimType::Str => {
                let len = rng.gen_range(0..=8);
                let s: String = (0..len).map(|_| rng.gen_range('a'..='z')).collect();
                PrimValue::Str(s)
            }
            PrimType::I8 => PrimValue::Int {
                ty: *self,
                value: rng.gen_range(i8::MIN as i64..=i8::MAX as i64),
            },
            PrimType::I16 => PrimValue::Int {
                ty: *self,
                value: rng.gen_range(i16::MIN as i64..=i16::MAX as i64),
            },
            PrimType::I32 => PrimValue::Int {
                ty: *self,
                value: rng.gen_range(i32::MIN as i64..=i32::MAX as i64),
            },
            PrimType::I64 | PrimType::Isize => PrimValue::Int {
                ty: *self,
                value: rng.gen_range(i64::MIN..=i64::MAX),
            },
            PrimType::U8 => PrimValue::Uint {
                ty: *self,
                value: rng.gen_range(0..=u8::MAX as u64),
            },
            PrimType::U16 => PrimValue::Uint {
                ty: *self,
                value: rng.gen_range(0..=u16::MAX as u64),
            },
            PrimType::U32 => PrimValue::Uint {
                ty: *self,
                value: rng.gen_range(0..=u32::MAX as u64),
            },
            PrimType::U64 | PrimType::Usize => PrimValue::Uint {
                ty: *self,
                value: rng.gen_range(0..=u64::MAX),
            },
            PrimType::F32 | PrimType::F64 => PrimValue::Float {
                ty: *self,
                value: rng.gen_range(-1_000_000.0..1_000_000.0),
            },
        }
    }
}

impl fmt::Display for PrimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimType::Bool => "bool",
            PrimType::Char => "char",
            PrimType::Str => "&str",
            PrimType::I8 => "i8",
            PrimType::I16 => "i16",
            PrimType::I32 => "i32",
            PrimType::I64 => "i64",
            PrimType::Isize => "isize",
            PrimType::U8 => "u8",
            PrimType::U16 => "u16",
            PrimType::U32 => "u32",
            PrimType::U64 => "u64",
            PrimType::Usize => "usize",
            PrimType::F32 => "f32",
            PrimType::F64 => "f64",
        };
        write!(f, "{}", name)
    }
}

/// A concrete literal value of some primitive type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PrimValue {
    Bool(bool),
    Char(char),
    Str(String),
    Int { ty: PrimType, value: i64 },
    Uint { ty: PrimType, value: u64 },
    Float { ty: PrimType, value: f64 },
}

impl PrimValue {
    /// The primitive type this literal belongs to.
    pub fn prim_type(&self) -> PrimType {
        match self {
            PrimValue::Bool(_) => PrimType::Bool,
            PrimValue::Char(_) => PrimType::Char,
            PrimValue::Str(_) => PrimType::Str,
            PrimValue::Int { ty, .. } | PrimValue::Uint { ty, .. } | PrimValue::Float { ty, .. } => {
                *ty
            }
        }
    }
}

impl fmt::Display for PrimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimValue::Bool(v) => write!(f, "{}", v),
            PrimValue::Char(v) => write!(f, "{:?}", v),
            PrimValue::Str(v) => write!(f, "{:?}", v),
            PrimValue::Int { ty, value } => write!(f, "{}{}", value, ty),
            PrimValue::Uint { ty, value } => write!(f, "{}{}", value, ty),
            PrimValue::Float { ty, value } => write!(f, "{}{}", value, ty),
        }
    }
}
