//! Variable ledger entries.
//!
//! Every value a statement produces gets a stable [`VarId`] and a
//! [`VarInfo`] record tracking its type, its producing statement, and
//! how later statements use it. Consumption is monotonic: once a
//! variable is consumed it never becomes usable again, even if the
//! consuming statement is later removed.

use crate::testcase::statement::StmtId;
use crate::types::Type;
use crate::types::binding::TypeBinding;
use std::collections::BTreeSet;
use std::fmt;

/// Stable handle for a variable, unique within one test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_{}", self.0)
    }
}

/// Ledger record for one produced value.
#[derive(Debug, Clone, PartialEq)]
pub struct VarInfo {
    ty: Type,
    binding: TypeBinding,
    producer: StmtId,
    used_at: BTreeSet<StmtId>,
    consumed: bool,
}

impl VarInfo {
    pub fn new(ty: Type, binding: TypeBinding, producer: StmtId) -> Self {
        Self {
            ty,
            binding,
            producer,
            used_at: BTreeSet::new(),
            consumed: false,
        }
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// The generic-to-concrete binding snapshot taken when the variable
    /// was created.
    pub fn binding(&self) -> &TypeBinding {
        &self.binding
    }

    /// The statement that produced this variable.
    pub fn producer(&self) -> StmtId {
        self.producer
    }

    /// Statements that read, borrow or consume this variable.
    pub fn used_at(&self) -> &BTreeSet<StmtId> {
        &self.used_at
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Whether ownership can still be moved out of this variable.
    pub fn is_consumable(&self) -> bool {
        !self.consumed
    }

    /// Whether a reference can still be taken. References are never
    /// re-referenced; callers use a reference-typed variable directly.
    pub fn is_borrowable(&self) -> bool {
        !self.consumed && !self.ty.is_ref()
    }

    pub(crate) fn record_use(&mut self, stmt: StmtId) {
        self.used_at.insert(stmt);
    }

    pub(crate) fn record_consume(&mut self, stmt: StmtId) {
        self.used_at.insert(stmt);
        self.consumed = true;
    }

    /// Drop a usage entry when the using statement is removed. The
    /// consumed flag deliberately stays set.
    pub(crate) fn forget_use(&mut self, stmt: StmtId) {
        self.used_at.remove(&stmt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimType;

    #[test]
    fn test_consumption_is_monotonic() {
        let mut info = VarInfo::new(
            Type::Prim(PrimType::I32),
            TypeBinding::new(),
            StmtId(0),
        );
        assert!(info.is_consumable());
        assert!(info.is_borrowable());

        info.record_consume(StmtId(1));
        assert!(info.is_consumed());
        assert!(!info.is_consumable());
        assert!(!info.is_borrowable());

        // Removing the consumer does not resurrect the variable.
        info.forget_use(StmtId(1));
        assert!(info.is_consumed());
        assert!(!info.is_consumable());
    }

    #[test]
    fn test_reference_typed_variables_are_not_borrowable() {
        let info = VarInfo::new(
            Type::reference(Type::Prim(PrimType::I32), false),
            TypeBinding::new(),
            StmtId(0),
        );
        assert!(!info.is_borrowable());
        assert!(info.is_consumable());
    }

    #[test]
    fn test_usage_tracking() {
        let mut info = VarInfo::new(
            Type::Prim(PrimType::Bool),
            TypeBinding::new(),
            StmtId(0),
        );
        info.record_use(StmtId(2));
        info.record_use(StmtId(5));
        assert_eq!(info.used_at().len(), 2);

        info.forget_use(StmtId(2));
        assert!(!info.used_at().contains(&StmtId(2)));
        assert!(info.used_at().contains(&StmtId(5)));
    }
}
