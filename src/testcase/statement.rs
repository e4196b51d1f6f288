//! Statement representation.
//!
//! A statement is one constructive step of a test case: a literal, a
//! reference, a composite construction, a call, or a tuple-field
//! access. The kind set is closed; everything dispatches by exhaustive
//! match. Statements hold stable [`VarId`]s for their arguments and
//! return slot, never positions, so reordering the sequence cannot
//! dangle them.

use crate::callable::{Callable, CallableKind, Param};
use crate::testcase::var::VarId;
use crate::types::{PrimValue, Type};
use std::fmt;
use std::path::Path;

/// Stable handle for a statement, unique within one test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(pub u32);

impl fmt::Display for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// The closed set of statement variants.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// A primitive literal; no arguments.
    Primitive { value: PrimValue },
    /// Takes a reference to its single argument.
    Ref { mutable: bool },
    /// Builds a tuple from its arguments.
    TupleInit { elem_types: Vec<Type> },
    /// Builds a fixed-length array from its arguments.
    ArrayInit { elem_type: Type, len: usize },
    /// Struct literal construction via a catalog initializer.
    StructInit(Callable),
    /// Enum variant construction via a catalog initializer.
    EnumInit(Callable),
    /// Free function call.
    Call(Callable),
    /// Associated function call.
    StaticMethod(Callable),
    /// Instance method call; the first argument is the receiver.
    Method(Callable),
    /// Accesses field `index` of a tuple-typed argument.
    TupleAccess { index: usize },
}

/// One step of a test case.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    id: StmtId,
    kind: StatementKind,
    args: Vec<VarId>,
    ret: Option<VarId>,
}

impl Statement {
    pub(crate) fn new(
        id: StmtId,
        kind: StatementKind,
        args: Vec<VarId>,
        ret: Option<VarId>,
    ) -> Self {
        Self {
            id,
            kind,
            args,
            ret,
        }
    }

    pub fn id(&self) -> StmtId {
        self.id
    }

    pub fn kind(&self) -> &StatementKind {
        &self.kind
    }

    pub fn args(&self) -> &[VarId] {
        &self.args
    }

    pub(crate) fn set_arg(&mut self, pos: usize, var: VarId) {
        self.args[pos] = var;
    }

    pub fn ret(&self) -> Option<VarId> {
        self.ret
    }

    pub fn returns_value(&self) -> bool {
        self.ret.is_some()
    }

    /// The catalog callable this statement originates from, if any.
    pub fn callable(&self) -> Option<&Callable> {
        match &self.kind {
            StatementKind::StructInit(c)
            | StatementKind::EnumInit(c)
            | StatementKind::Call(c)
            | StatementKind::StaticMethod(c)
            | StatementKind::Method(c) => Some(c),
            StatementKind::Primitive { .. }
            | StatementKind::Ref { .. }
            | StatementKind::TupleInit { .. }
            | StatementKind::ArrayInit { .. }
            | StatementKind::TupleAccess { .. } => None,
        }
    }

    /// Formal parameters of this statement, as far as the statement
    /// itself can state them. Call-like kinds report their callable's
    /// parameter list and composite initializers synthesize one entry
    /// per element. `Ref` and `TupleAccess` take a single operand whose
    /// type is known only to the ledger, so they report none; callers
    /// needing it use [`TestCase::actual_param_types`].
    ///
    /// [`TestCase::actual_param_types`]: crate::testcase::TestCase::actual_param_types
    pub fn params(&self) -> Vec<Param> {
        match &self.kind {
            StatementKind::Primitive { .. } => Vec::new(),
            StatementKind::Ref { .. } | StatementKind::TupleAccess { .. } => Vec::new(),
            StatementKind::TupleInit { elem_types } => {
                elem_types.iter().cloned().map(Param::new).collect()
            }
            StatementKind::ArrayInit { elem_type, len } => {
                (0..*len).map(|_| Param::new(elem_type.clone())).collect()
            }
            StatementKind::StructInit(c)
            | StatementKind::EnumInit(c)
            | StatementKind::Call(c)
            | StatementKind::StaticMethod(c)
            | StatementKind::Method(c) => c.params.clone(),
        }
    }

    /// Whether the argument at `idx` is moved into this statement.
    /// Reference-typed operands and the operands of reference-taking
    /// and tuple-access statements are only borrowed.
    pub fn consumes_arg(&self, idx: usize, arg_type: &Type) -> bool {
        match &self.kind {
            StatementKind::Primitive { .. } => false,
            StatementKind::Ref { .. } | StatementKind::TupleAccess { .. } => false,
            StatementKind::TupleInit { .. } | StatementKind::ArrayInit { .. } => {
                !arg_type.is_ref()
            }
            StatementKind::StructInit(c)
            | StatementKind::EnumInit(c)
            | StatementKind::Call(c)
            | StatementKind::StaticMethod(c)
            | StatementKind::Method(c) => c
                .params
                .get(idx)
                .map(|p| !p.ty.is_ref() && !arg_type.is_ref())
                .unwrap_or(false),
        }
    }

    pub fn uses(&self, var: VarId) -> bool {
        self.args.contains(&var)
    }

    /// Source file of the originating item; only private items carry one.
    pub fn src_file_path(&self) -> Option<&Path> {
        self.callable().and_then(Callable::src_file)
    }

    pub fn is_public(&self) -> bool {
        self.callable().map(|c| c.is_public).unwrap_or(true)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, StatementKind::Primitive { .. })
    }

    pub fn is_ref(&self) -> bool {
        matches!(self.kind, StatementKind::Ref { .. })
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ret) = self.ret {
            write!(f, "let {} = ", ret)?;
        }
        match &self.kind {
            StatementKind::Primitive { value } => write!(f, "{}", value)?,
            StatementKind::Ref { mutable } => {
                write!(f, "&{}{}", if *mutable { "mut " } else { "" }, self.args[0])?
            }
            StatementKind::TupleInit { .. } => {
                write!(f, "(")?;
                for (i, a) in self.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")?;
            }
            StatementKind::ArrayInit { .. } => {
                write!(f, "[")?;
                for (i, a) in self.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, "]")?;
            }
            StatementKind::TupleAccess { index } => write!(f, "{}.{}", self.args[0], index)?,
            StatementKind::StructInit(c)
            | StatementKind::EnumInit(c)
            | StatementKind::Call(c)
            | StatementKind::StaticMethod(c)
            | StatementKind::Method(c) => {
                write!(f, "{}(", c.name)?;
                for (i, a) in self.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")?;
            }
        }
        Ok(())
    }
}

/// Map a catalog callable to the statement kind it produces.
pub(crate) fn kind_for(callable: &Callable) -> StatementKind {
    match callable.kind {
        CallableKind::Function => StatementKind::Call(callable.clone()),
        CallableKind::Method => StatementKind::Method(callable.clone()),
        CallableKind::StaticMethod => StatementKind::StaticMethod(callable.clone()),
        CallableKind::StructInit => StatementKind::StructInit(callable.clone()),
        CallableKind::EnumInit { .. } => StatementKind::EnumInit(callable.clone()),
    }
}
