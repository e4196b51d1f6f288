//! Collaborator seams consumed by the engine.
//!
//! The engine never looks up callables or constants itself; it asks a
//! [`TypeContext`] for the catalog view and a [`ConstantPool`] for mined
//! literals. [`Catalog`] is the standard in-memory context, loadable
//! from the JSON dump the compiler wing produces.

use crate::callable::{Callable, CallableKind};
use crate::types::binding::TypeBinding;
use crate::types::{GenericParam, PrimType, PrimValue, Type};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Catalog and type-information service for a target crate.
pub trait TypeContext {
    /// Methods invocable on a value of `receiver`'s type.
    fn methods_of(&self, receiver: &Type) -> Vec<Callable>;

    /// Callables whose return type structurally matches `ty`. Private
    /// generators are filtered to the given file binding when one is set.
    fn generators_of(&self, ty: &Type, file_binding: Option<&Path>) -> Vec<Callable>;

    /// All callables, optionally restricted to one source file and to
    /// public items.
    fn callables(&self, file_binding: Option<&Path>, public_only: bool) -> Vec<Callable>;

    /// A concrete default type for a generic parameter that unification
    /// left unbound, if the target crate suggests one.
    fn default_for(&self, generic: &GenericParam) -> Option<Type>;
}

/// Externally mined literal values, keyed by exact primitive type.
pub trait ConstantPool {
    fn values_of_type(&self, prim: PrimType) -> Vec<PrimValue>;
}

/// A pool with nothing in it; fresh literals are always sampled.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyPool;

impl ConstantPool for EmptyPool {
    fn values_of_type(&self, _prim: PrimType) -> Vec<PrimValue> {
        Vec::new()
    }
}

/// A flat constant pool backed by a vector of literals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VecPool {
    values: Vec<PrimValue>,
}

impl VecPool {
    pub fn new(values: Vec<PrimValue>) -> Self {
        Self { values }
    }

    pub fn push(&mut self, value: PrimValue) {
        self.values.push(value);
    }
}

impl ConstantPool for VecPool {
    fn values_of_type(&self, prim: PrimType) -> Vec<PrimValue> {
        self.values
            .iter()
            .filter(|v| v.prim_type() == prim)
            .cloned()
            .collect()
    }
}

/// In-memory [`TypeContext`] over a list of catalog callables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    callables: Vec<Callable>,
    /// Suggested concrete types for generic parameters, by name.
    #[serde(default)]
    generic_defaults: HashMap<String, Type>,
}

impl Catalog {
    pub fn new(callables: Vec<Callable>) -> Self {
        Self {
            callables,
            generic_defaults: HashMap::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn push(&mut self, callable: Callable) {
        self.callables.push(callable);
    }

    pub fn set_default(&mut self, generic: GenericParam, ty: Type) {
        self.generic_defaults.insert(generic.name, ty);
    }

    pub fn len(&self) -> usize {
        self.callables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callables.is_empty()
    }

    fn visible_with(&self, callable: &Callable, file_binding: Option<&Path>) -> bool {
        if callable.is_public {
            return true;
        }
        match (callable.src_file(), file_binding) {
            (Some(path), Some(bound)) => path == bound,
            // Without a binding yet, any private item is a candidate.
            (Some(_), None) => true,
            // Private items without a source file are unusable.
            (None, _) => false,
        }
    }
}

impl TypeContext for Catalog {
    fn methods_of(&self, receiver: &Type) -> Vec<Callable> {
        self.callables
            .iter()
            .filter(|c| matches!(c.kind, CallableKind::Method))
            .filter(|c| {
                c.parent
                    .as_ref()
                    .is_some_and(|parent| TypeBinding::from_types(receiver, parent).is_some())
            })
            .cloned()
            .collect()
    }

    fn generators_of(&self, ty: &Type, file_binding: Option<&Path>) -> Vec<Callable> {
        self.callables
            .iter()
            .filter(|c| self.visible_with(c, file_binding))
            .filter(|c| {
                c.return_type.as_ref().is_some_and(|ret| {
                    if TypeBinding::from_types(ty, ret).is_some() {
                        return true;
                    }
                    // A generator returning `T` also serves a `&T` request.
                    ty.ref_inner()
                        .is_some_and(|inner| TypeBinding::from_types(inner, ret).is_some())
                })
            })
            .cloned()
            .collect()
    }

    fn callables(&self, file_binding: Option<&Path>, public_only: bool) -> Vec<Callable> {
        self.callables
            .iter()
            .filter(|c| c.is_public || !public_only)
            .filter(|c| match file_binding {
                Some(bound) => c.is_public || c.src_file() == Some(bound),
                None => true,
            })
            .cloned()
            .collect()
    }

    fn default_for(&self, generic: &GenericParam) -> Option<Type> {
        self.generic_defaults.get(&generic.name).cloned()
    }
}

/// Opaque mutation strategy injected by the outer search loop. The
/// engine stores it per test case and forwards it to copies; it never
/// invokes it.
pub trait MutationStrategy: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;
}

/// Opaque crossover strategy; same contract as [`MutationStrategy`].
pub trait CrossoverStrategy: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callable::Param;

    fn sample_catalog() -> Catalog {
        let mut catalog = Catalog::default();
        catalog.push(Callable::function(
            "make_foo",
            vec![],
            Some(Type::structure("Foo")),
        ));
        catalog.push(Callable::method(
            "frob",
            Type::structure("Foo"),
            Param::receiver(Type::reference(Type::structure("Foo"), true)),
            vec![],
            None,
        ));
        catalog
    }

    #[test]
    fn test_generators_match_return_type() {
        let catalog = sample_catalog();
        let generators = catalog.generators_of(&Type::structure("Foo"), None);
        assert_eq!(generators.len(), 1);
        assert_eq!(generators[0].name, "make_foo");

        assert!(
            catalog
                .generators_of(&Type::structure("Bar"), None)
                .is_empty()
        );
    }

    #[test]
    fn test_generators_serve_ref_requests() {
        let catalog = sample_catalog();
        let required = Type::reference(Type::structure("Foo"), false);
        assert_eq!(catalog.generators_of(&required, None).len(), 1);
    }

    #[test]
    fn test_methods_of_unifies_receiver() {
        let catalog = sample_catalog();
        let methods = catalog.methods_of(&Type::structure("Foo"));
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "frob");
        assert!(catalog.methods_of(&Type::structure("Bar")).is_empty());
    }

    #[test]
    fn test_private_generators_respect_file_binding() {
        let mut private = Callable::function("hidden", vec![], Some(Type::structure("Foo")));
        private.is_public = false;
        private.src_file = Some("src/inner.rs".into());
        let mut catalog = Catalog::default();
        catalog.push(private);

        let foo = Type::structure("Foo");
        assert_eq!(catalog.generators_of(&foo, None).len(), 1);
        assert_eq!(
            catalog
                .generators_of(&foo, Some(Path::new("src/inner.rs")))
                .len(),
            1
        );
        assert!(
            catalog
                .generators_of(&foo, Some(Path::new("src/other.rs")))
                .is_empty()
        );
    }

    #[test]
    fn test_vec_pool_filters_by_type() {
        let pool = VecPool::new(vec![
            PrimValue::Int {
                ty: PrimType::I32,
                value: 7,
            },
            PrimValue::Bool(true),
        ]);
        assert_eq!(pool.values_of_type(PrimType::I32).len(), 1);
        assert_eq!(pool.values_of_type(PrimType::U8).len(), 0);
    }
}
