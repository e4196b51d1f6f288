//! Hard failure conditions.
//!
//! Soft, expected outcomes (no generator found, generic left unbound,
//! budget exceeded) are `None` returns throughout the engine. The
//! variants here are caller contract violations and abort the current
//! operation instead of being retried.

use crate::testcase::statement::StmtId;
use crate::testcase::var::VarId;
use crate::types::Type;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// References are never re-referenced; use the variable directly.
    #[error("cannot take a reference to reference-typed variable {0}")]
    ReferenceToReference(VarId),

    /// The variable belongs to a different test case.
    #[error("variable {0} does not belong to this test case")]
    ForeignVariable(VarId),

    /// Borrow or read of a variable whose value was already moved.
    #[error("variable {0} was already consumed")]
    ConsumedVariable(VarId),

    /// Position lookup for a statement this test case does not own.
    #[error("statement {0} does not belong to this test case")]
    UnknownStatement(StmtId),

    /// A type shape the engine refuses to construct values for.
    #[error("unsupported type shape: {0}")]
    UnsupportedType(Type),
}
