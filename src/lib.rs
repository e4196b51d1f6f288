//! casegen - statement-sequence construction for search-based test
//! generation.
//!
//! This library builds, repairs and mutates test cases: ordered
//! sequences of constructive statements (literals, references,
//! composites, calls) over a catalog of callables extracted from a
//! target crate. The surrounding search loop decides *which* test
//! cases survive; this crate decides *how* a test case grows, shrinks
//! and stays well-formed while it happens.

pub mod callable;
pub mod config;
pub mod context;
pub mod error;
pub mod seed;
pub mod testcase;
pub mod types;

// Re-export commonly used types
pub use callable::{Callable, CallableKind, Param};
pub use config::GenerationConfig;
pub use context::{Catalog, ConstantPool, EmptyPool, TypeContext, VecPool};
pub use error::EngineError;
pub use seed::RandomTestCaseGenerator;
pub use testcase::statement::{Statement, StatementKind, StmtId};
pub use testcase::var::{VarId, VarInfo};
pub use testcase::{ObjectiveId, TestCase};
pub use types::binding::TypeBinding;
pub use types::{GenericParam, PrimType, PrimValue, Type};
