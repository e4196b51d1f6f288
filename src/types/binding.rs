//! Generic-parameter binding and structural unification.
//!
//! A [`TypeBinding`] tracks the generic parameters a construction step
//! declares and the concrete types they have been resolved to so far.
//! An incomplete binding is not an error: callers inspect
//! [`TypeBinding::has_unbound`] and either consult a type-default
//! provider or abandon the candidate.

use crate::types::{GenericParam, Type};
use std::collections::HashMap;
use std::fmt;

/// Mapping from declared generic parameters to concrete types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeBinding {
    /// Declared parameters, in first-occurrence order.
    generics: Vec<GenericParam>,
    bound: HashMap<GenericParam, Type>,
}

impl TypeBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// A binding declaring the given parameters, none of them bound.
    pub fn with_generics(generics: impl IntoIterator<Item = GenericParam>) -> Self {
        let mut binding = Self::new();
        binding.add_generics(generics);
        binding
    }

    /// A binding declaring every generic nested in `ty`, none bound.
    pub fn of_type(ty: &Type) -> Self {
        Self::with_generics(ty.deep_generics())
    }

    pub fn add_generic(&mut self, generic: GenericParam) {
        if !self.generics.contains(&generic) {
            self.generics.push(generic);
        }
    }

    pub fn add_generics(&mut self, generics: impl IntoIterator<Item = GenericParam>) {
        for g in generics {
            self.add_generic(g);
        }
    }

    /// Bind a parameter to a concrete type, declaring it if necessary.
    /// Rebinding a parameter overwrites the previous resolution.
    pub fn bind(&mut self, generic: GenericParam, ty: Type) {
        self.add_generic(generic.clone());
        self.bound.insert(generic, ty);
    }

    pub fn get(&self, generic: &GenericParam) -> Option<&Type> {
        self.bound.get(generic)
    }

    /// Declared parameters without a concrete type yet.
    pub fn unbound(&self) -> Vec<GenericParam> {
        self.generics
            .iter()
            .filter(|g| !self.bound.contains_key(g))
            .cloned()
            .collect()
    }

    pub fn has_unbound(&self) -> bool {
        self.generics.iter().any(|g| !self.bound.contains_key(g))
    }

    pub fn is_complete(&self) -> bool {
        !self.has_unbound()
    }

    /// Merge two bindings; on conflict `self`'s resolutions win.
    pub fn left_outer_merge(&self, other: &TypeBinding) -> TypeBinding {
        let mut merged = other.clone();
        merged.add_generics(self.generics.iter().cloned());
        for (g, t) in &self.bound {
            merged.bound.insert(g.clone(), t.clone());
        }
        merged
    }

    /// Unify `shape` (a possibly-generic signature type) against the
    /// concrete `required` type, producing the binding that makes them
    /// structurally equal.
    ///
    /// Returns `None` on a structural mismatch (different variant or
    /// arity, or one parameter required to be two different concrete
    /// types). A returned binding may still be incomplete when `shape`
    /// did not mention all of its declared generics; callers check
    /// [`has_unbound`](Self::has_unbound).
    pub fn from_types(required: &Type, shape: &Type) -> Option<TypeBinding> {
        let mut binding = TypeBinding::with_generics(shape.deep_generics());
        if unify_into(required, shape, &mut binding) {
            Some(binding)
        } else {
            None
        }
    }
}

impl fmt::Display for TypeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, g) in self.generics.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match self.bound.get(g) {
                Some(t) => write!(f, "{} -> {}", g, t)?,
                None => write!(f, "{} -> ?", g)?,
            }
        }
        write!(f, "}}")
    }
}

/// Recursively unify `shape` against `required`, accumulating
/// resolutions into `binding`. Returns false on structural mismatch.
fn unify_into(required: &Type, shape: &Type, binding: &mut TypeBinding) -> bool {
    match (required, shape) {
        (_, Type::Generic(g)) => {
            match binding.get(g) {
                // A parameter may not unify with two different types.
                Some(existing) => existing == required,
                None => {
                    binding.bind(g.clone(), required.clone());
                    true
                }
            }
        }
        (Type::Prim(a), Type::Prim(b)) => a == b,
        (
            Type::Struct {
                name: a,
                generics: ga,
            },
            Type::Struct {
                name: b,
                generics: gb,
            },
        )
        | (
            Type::Enum {
                name: a,
                generics: ga,
            },
            Type::Enum {
                name: b,
                generics: gb,
            },
        ) => {
            a == b
                && ga.len() == gb.len()
                && ga
                    .iter()
                    .zip(gb)
                    .all(|(ra, sb)| unify_into(ra, sb, binding))
        }
        (
            Type::Ref {
                inner: ia,
                mutable: ma,
            },
            Type::Ref {
                inner: ib,
                mutable: mb,
            },
        ) => ma == mb && unify_into(ia, ib, binding),
        (Type::Tuple(ea), Type::Tuple(eb)) => {
            ea.len() == eb.len()
                && ea
                    .iter()
                    .zip(eb)
                    .all(|(ra, sb)| unify_into(ra, sb, binding))
        }
        (
            Type::Array { elem: ea, len: la },
            Type::Array { elem: eb, len: lb },
        ) => la == lb && unify_into(ea, eb, binding),
        (Type::Slice(ea), Type::Slice(eb)) => unify_into(ea, eb, binding),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimType;

    fn i32_ty() -> Type {
        Type::Prim(PrimType::I32)
    }

    #[test]
    fn test_unify_generic_against_concrete() {
        let required = Type::Struct {
            name: "Vec".to_string(),
            generics: vec![i32_ty()],
        };
        let shape = Type::Struct {
            name: "Vec".to_string(),
            generics: vec![Type::generic("T")],
        };

        let binding = TypeBinding::from_types(&required, &shape).unwrap();
        assert!(binding.is_complete());
        assert_eq!(binding.get(&GenericParam::new("T")), Some(&i32_ty()));
    }

    #[test]
    fn test_unify_nested() {
        let required = Type::Tuple(vec![
            Type::reference(i32_ty(), false),
            Type::array(Type::Prim(PrimType::Bool), 3),
        ]);
        let shape = Type::Tuple(vec![
            Type::reference(Type::generic("A"), false),
            Type::array(Type::generic("B"), 3),
        ]);

        let binding = TypeBinding::from_types(&required, &shape).unwrap();
        assert_eq!(binding.get(&GenericParam::new("A")), Some(&i32_ty()));
        assert_eq!(
            binding.get(&GenericParam::new("B")),
            Some(&Type::Prim(PrimType::Bool))
        );
    }

    #[test]
    fn test_unify_structural_mismatch() {
        let required = Type::structure("Foo");
        let shape = Type::structure("Bar");
        assert!(TypeBinding::from_types(&required, &shape).is_none());

        // Arity mismatch
        let required = Type::Tuple(vec![i32_ty(), i32_ty()]);
        let shape = Type::Tuple(vec![Type::generic("T")]);
        assert!(TypeBinding::from_types(&required, &shape).is_none());

        // Mutability mismatch on references
        let required = Type::reference(i32_ty(), true);
        let shape = Type::reference(Type::generic("T"), false);
        assert!(TypeBinding::from_types(&required, &shape).is_none());
    }

    #[test]
    fn test_unify_conflicting_binding() {
        // (i32, bool) against (T, T): T cannot be both.
        let required = Type::Tuple(vec![i32_ty(), Type::Prim(PrimType::Bool)]);
        let shape = Type::Tuple(vec![Type::generic("T"), Type::generic("T")]);
        assert!(TypeBinding::from_types(&required, &shape).is_none());
    }

    #[test]
    fn test_unbound_is_not_an_error() {
        // The shape never mentions U, so U stays unbound.
        let mut binding = TypeBinding::with_generics([GenericParam::new("U")]);
        assert!(binding.has_unbound());
        assert_eq!(binding.unbound(), vec![GenericParam::new("U")]);

        binding.bind(GenericParam::new("U"), i32_ty());
        assert!(binding.is_complete());
    }

    #[test]
    fn test_left_outer_merge_prefers_left() {
        let mut left = TypeBinding::new();
        left.bind(GenericParam::new("T"), i32_ty());
        let mut right = TypeBinding::new();
        right.bind(GenericParam::new("T"), Type::Prim(PrimType::Bool));
        right.bind(GenericParam::new("U"), Type::Prim(PrimType::Char));

        let merged = left.left_outer_merge(&right);
        assert_eq!(merged.get(&GenericParam::new("T")), Some(&i32_ty()));
        assert_eq!(
            merged.get(&GenericParam::new("U")),
            Some(&Type::Prim(PrimType::Char))
        );
    }

    #[test]
    fn test_bind_generics_substitutes() {
        let mut binding = TypeBinding::new();
        binding.bind(GenericParam::new("T"), i32_ty());

        let ty = Type::Struct {
            name: "Wrapper".to_string(),
            generics: vec![Type::generic("T"), Type::generic("U")],
        };
        let bound = ty.bind_generics(&binding);
        assert_eq!(
            bound,
            Type::Struct {
                name: "Wrapper".to_string(),
                generics: vec![i32_ty(), Type::generic("U")],
            }
        );
    }
}
