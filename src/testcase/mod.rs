//! Test-case representation and the construction/repair algorithms.
//!
//! A [`TestCase`] is an ordered statement sequence plus a variable
//! ledger. It owns both in arena style: statements and variables refer
//! to each other through stable [`StmtId`]/[`VarId`] handles, and a
//! statement's position is simply its current index in the sequence.
//!
//! The central operation is recursive argument generation: to satisfy a
//! parameter, the engine reuses an existing variable or synthesizes a
//! new one, which may recursively insert further statements. Soft
//! failures (no generator, unbound generic, budget exceeded) are `None`
//! outcomes that drive the generator-retry loop; hard contract
//! violations are [`EngineError`]s.

pub mod statement;
pub mod var;

use crate::callable::Callable;
use crate::config::GenerationConfig;
use crate::context::{ConstantPool, CrossoverStrategy, MutationStrategy, TypeContext};
use crate::error::EngineError;
use crate::types::binding::TypeBinding;
use crate::types::{PrimType, PrimValue, Type};
use rand::Rng;
use rand::seq::SliceRandom;
use statement::{Statement, StatementKind, StmtId, kind_for};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use var::{VarId, VarInfo};

/// Opaque key of one fitness objective. A distance of `0.0` means the
/// objective is covered; the engine does not interpret distances
/// further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectiveId(pub u64);

/// Where a freshly built statement is placed in the sequence.
enum InsertPos {
    /// Position 0. Used for primitive literals, which have no
    /// dependencies; later positions shift, which is safe because all
    /// cross-references are by id.
    Front,
    /// End of the sequence. Used for top-level call insertion.
    Append,
    /// Right after the maximum argument position, or position 0 for
    /// argument-less statements.
    AfterDeps,
}

/// Rollback point for atomic multi-step insertion.
struct Snapshot {
    stmts: Vec<Statement>,
    vars: HashMap<VarId, VarInfo>,
    next_stmt: u32,
    next_var: u32,
}

/// One candidate test program under construction.
#[derive(Clone)]
pub struct TestCase {
    id: u32,
    stmts: Vec<Statement>,
    vars: HashMap<VarId, VarInfo>,
    coverage: HashMap<ObjectiveId, f64>,
    config: GenerationConfig,
    next_stmt: u32,
    next_var: u32,
    mutation: Option<Arc<dyn MutationStrategy>>,
    crossover: Option<Arc<dyn CrossoverStrategy>>,
}

impl TestCase {
    pub fn new(id: u32, config: GenerationConfig) -> Self {
        Self {
            id,
            stmts: Vec::new(),
            vars: HashMap::new(),
            coverage: HashMap::new(),
            config,
            next_stmt: 0,
            next_var: 0,
            mutation: None,
            crossover: None,
        }
    }

    /// Attach the opaque search-strategy objects. The engine stores and
    /// forwards them to copies; it never invokes them.
    pub fn with_strategies(
        mut self,
        mutation: Arc<dyn MutationStrategy>,
        crossover: Arc<dyn CrossoverStrategy>,
    ) -> Self {
        self.mutation = Some(mutation);
        self.crossover = Some(crossover);
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn mutation_strategy(&self) -> Option<&Arc<dyn MutationStrategy>> {
        self.mutation.as_ref()
    }

    pub fn crossover_strategy(&self) -> Option<&Arc<dyn CrossoverStrategy>> {
        self.crossover.as_ref()
    }

    /// Independent deep copy with a fresh id and an empty coverage map.
    /// All cross-references live in the copied arena, so mutating the
    /// copy never touches the original.
    pub fn copy(&self, new_id: u32) -> TestCase {
        let mut copy = self.clone();
        copy.id = new_id;
        copy.coverage = HashMap::new();
        copy
    }

    // ------------------------------------------------------------------
    // Sequence access
    // ------------------------------------------------------------------

    pub fn size(&self) -> usize {
        self.stmts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    /// A test case with more than one statement can be cut.
    pub fn is_cuttable(&self) -> bool {
        self.stmts.len() > 1
    }

    pub fn statements(&self) -> &[Statement] {
        &self.stmts
    }

    pub fn stmt_at(&self, pos: usize) -> Option<&Statement> {
        self.stmts.get(pos)
    }

    /// Current index of a statement in the sequence.
    pub fn stmt_position(&self, id: StmtId) -> Option<usize> {
        self.stmts.iter().position(|s| s.id() == id)
    }

    /// Position of the statement producing `var`.
    pub fn var_position(&self, var: VarId) -> Result<usize, EngineError> {
        let info = self
            .vars
            .get(&var)
            .ok_or(EngineError::ForeignVariable(var))?;
        self.stmt_position(info.producer())
            .ok_or(EngineError::UnknownStatement(info.producer()))
    }

    pub fn variable(&self, var: VarId) -> Option<&VarInfo> {
        self.vars.get(&var)
    }

    /// All produced variables, in sequence order.
    pub fn variables(&self) -> Vec<VarId> {
        self.stmts.iter().filter_map(Statement::ret).collect()
    }

    /// The distinct types this test case instantiates.
    pub fn instantiated_types(&self) -> Vec<Type> {
        let mut out = Vec::new();
        for v in self.variables() {
            if let Some(info) = self.vars.get(&v) {
                if !out.contains(info.ty()) {
                    out.push(info.ty().clone());
                }
            }
        }
        out
    }

    /// Concrete types of a statement's current arguments.
    pub fn actual_param_types(&self, id: StmtId) -> Vec<Type> {
        let Some(pos) = self.stmt_position(id) else {
            return Vec::new();
        };
        self.stmts[pos]
            .args()
            .iter()
            .filter_map(|a| self.vars.get(a).map(|i| i.ty().clone()))
            .collect()
    }

    // ------------------------------------------------------------------
    // Ledger views
    // ------------------------------------------------------------------

    /// Variables a reference to `ty`'s referent can still be taken of,
    /// produced strictly before `until_pos`. For a required `&T` this
    /// returns both borrowable `T` variables (to be wrapped) and
    /// unconsumed `&T` variables (to be used directly — references are
    /// never re-referenced).
    pub fn borrowable_variables_of_type(&self, ty: &Type, until_pos: usize) -> Vec<VarId> {
        let inner = ty.ref_inner();
        self.produced_before(until_pos)
            .filter(|v| {
                let Some(info) = self.vars.get(v) else {
                    return false;
                };
                match inner {
                    Some(inner_ty) => {
                        (info.ty() == inner_ty && info.is_borrowable())
                            || (info.ty() == ty && !info.is_consumed())
                    }
                    None => info.ty() == ty && info.is_borrowable(),
                }
            })
            .collect()
    }

    /// Variables of exactly `ty` that can still be moved, produced
    /// strictly before `until_pos`.
    pub fn consumable_variables_of_type(&self, ty: &Type, until_pos: usize) -> Vec<VarId> {
        self.produced_before(until_pos)
            .filter(|v| {
                self.vars
                    .get(v)
                    .map(|info| info.ty() == ty && info.is_consumable())
                    .unwrap_or(false)
            })
            .collect()
    }

    /// All not-yet-consumed variables of exactly `ty`.
    pub fn unconsumed_variables_of_type(&self, ty: &Type) -> Vec<VarId> {
        self.produced_before(self.stmts.len())
            .filter(|v| {
                self.vars
                    .get(v)
                    .map(|info| info.ty() == ty && !info.is_consumed())
                    .unwrap_or(false)
            })
            .collect()
    }

    /// All variables of exactly `ty`, regardless of usability.
    pub fn variables_of_type(&self, ty: &Type) -> Vec<VarId> {
        self.variables_of_type_before(ty, self.stmts.len())
    }

    /// Variables of exactly `ty` produced strictly before `pos`.
    pub fn variables_of_type_before(&self, ty: &Type, pos: usize) -> Vec<VarId> {
        self.produced_before(pos)
            .filter(|v| {
                self.vars
                    .get(v)
                    .map(|info| info.ty() == ty)
                    .unwrap_or(false)
            })
            .collect()
    }

    fn produced_before(&self, pos: usize) -> impl Iterator<Item = VarId> + '_ {
        self.stmts.iter().take(pos).filter_map(Statement::ret)
    }

    // ------------------------------------------------------------------
    // File-path binding
    // ------------------------------------------------------------------

    /// Whether at most one distinct private source path is referenced.
    pub fn is_valid(&self) -> bool {
        self.private_path_groups().len() <= 1
    }

    fn private_path_groups(&self) -> HashMap<PathBuf, Vec<StmtId>> {
        let mut groups: HashMap<PathBuf, Vec<StmtId>> = HashMap::new();
        for s in &self.stmts {
            if !s.is_public() {
                if let Some(path) = s.src_file_path() {
                    groups.entry(path.to_path_buf()).or_default().push(s.id());
                }
            }
        }
        groups
    }

    /// The single private source path this test case is bound to, if
    /// any. When multiple conflicting paths are present, randomly
    /// chosen conflicting groups are evicted until the invariant holds.
    pub fn file_path_binding(&mut self, rng: &mut impl Rng) -> Option<PathBuf> {
        loop {
            let groups = self.private_path_groups();
            if groups.len() <= 1 {
                return groups.into_keys().next();
            }

            let mut paths: Vec<PathBuf> = groups.keys().cloned().collect();
            paths.sort();
            let victim = paths.swap_remove(rng.gen_range(0..paths.len()));
            warn!(test = self.id, path = %victim.display(), "evicting conflicting file binding");
            for id in &groups[&victim] {
                self.remove_stmt(*id);
            }
        }
    }

    fn can_insert(&self, callable: &Callable, file_binding: Option<&Path>) -> bool {
        callable.is_public || file_binding.is_none() || callable.src_file() == file_binding
    }

    // ------------------------------------------------------------------
    // Statement construction plumbing
    // ------------------------------------------------------------------

    fn alloc_stmt_id(&mut self) -> StmtId {
        let id = StmtId(self.next_stmt);
        self.next_stmt += 1;
        id
    }

    fn alloc_var(&mut self, ty: Type, binding: TypeBinding, producer: StmtId) -> VarId {
        let id = VarId(self.next_var);
        self.next_var += 1;
        self.vars.insert(id, VarInfo::new(ty, binding, producer));
        id
    }

    /// Record argument usage in the ledger and place the statement.
    fn register_and_insert(&mut self, pos: InsertPos, stmt: Statement) {
        for (idx, &arg) in stmt.args().iter().enumerate() {
            let Some(arg_ty) = self.vars.get(&arg).map(|i| i.ty().clone()) else {
                continue;
            };
            let consumes = stmt.consumes_arg(idx, &arg_ty);
            if let Some(info) = self.vars.get_mut(&arg) {
                if consumes {
                    info.record_consume(stmt.id());
                } else {
                    info.record_use(stmt.id());
                }
            }
        }

        let index = match pos {
            InsertPos::Front => 0,
            InsertPos::Append => self.stmts.len(),
            InsertPos::AfterDeps => {
                if stmt.args().is_empty() {
                    0
                } else {
                    let max_arg_pos = stmt
                        .args()
                        .iter()
                        .filter_map(|a| self.var_position(*a).ok())
                        .max()
                        .unwrap_or(0);
                    usize::min(self.stmts.len(), max_arg_pos + 1)
                }
            }
        };
        self.stmts.insert(index, stmt);
    }

    fn insert_built(
        &mut self,
        pos: InsertPos,
        kind: StatementKind,
        args: Vec<VarId>,
        ret: Option<(Type, TypeBinding)>,
    ) -> Option<VarId> {
        let sid = self.alloc_stmt_id();
        let ret_var = ret.map(|(ty, binding)| self.alloc_var(ty, binding, sid));
        self.register_and_insert(pos, Statement::new(sid, kind, args, ret_var));
        ret_var
    }

    fn checkpoint(&self) -> Snapshot {
        Snapshot {
            stmts: self.stmts.clone(),
            vars: self.vars.clone(),
            next_stmt: self.next_stmt,
            next_var: self.next_var,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.stmts = snapshot.stmts;
        self.vars = snapshot.vars;
        self.next_stmt = snapshot.next_stmt;
        self.next_var = snapshot.next_var;
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Remove a statement. If it produces a value, every later
    /// statement using that value is removed first, in reverse order,
    /// so the forward-only invariant holds throughout the cascade.
    pub fn remove_stmt(&mut self, id: StmtId) {
        // May have been removed already as a dependency of another
        // statement in the same cascade.
        if self.stmt_position(id).is_none() {
            return;
        }

        let ret = self
            .stmt_position(id)
            .and_then(|pos| self.stmts[pos].ret());
        if let Some(ret) = ret {
            let mut users: Vec<StmtId> = self
                .vars
                .get(&ret)
                .map(|info| info.used_at().iter().copied().collect())
                .unwrap_or_default();
            users.sort_by_key(|u| self.stmt_position(*u));
            for user in users.into_iter().rev() {
                self.remove_stmt(user);
            }
        }

        let Some(pos) = self.stmt_position(id) else {
            return;
        };
        let stmt = self.stmts.remove(pos);
        for &arg in stmt.args() {
            if let Some(info) = self.vars.get_mut(&arg) {
                info.forget_use(id);
            }
        }
        if let Some(ret) = stmt.ret() {
            self.vars.remove(&ret);
        }
    }

    pub fn remove_all_stmts(&mut self) {
        self.stmts.clear();
        self.vars.clear();
    }

    /// One-pass dead-literal sweep: removes primitive statements whose
    /// value is never used. Deliberately not cascading, and deliberately
    /// restricted to literals — the freshly inserted call under test
    /// legitimately has an unused result and must survive.
    pub fn cleanup(&mut self) {
        let dead: Vec<StmtId> = self
            .stmts
            .iter()
            .filter(|s| s.is_primitive())
            .filter(|s| {
                s.ret()
                    .and_then(|r| self.vars.get(&r))
                    .map(|info| info.used_at().is_empty())
                    .unwrap_or(false)
            })
            .map(Statement::id)
            .collect();

        for id in dead {
            if let Some(pos) = self.stmt_position(id) {
                let stmt = self.stmts.remove(pos);
                if let Some(ret) = stmt.ret() {
                    self.vars.remove(&ret);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Reference taking
    // ------------------------------------------------------------------

    /// Insert a reference-taking statement over `var`. Hard-errors when
    /// `var` belongs to a different test case or is itself a reference.
    pub fn reference_variable(
        &mut self,
        var: VarId,
        mutable: bool,
    ) -> Result<VarId, EngineError> {
        let info = self
            .vars
            .get(&var)
            .ok_or(EngineError::ForeignVariable(var))?;
        if info.ty().is_ref() {
            return Err(EngineError::ReferenceToReference(var));
        }
        // A moved-out value can never be borrowed again.
        if info.is_consumed() {
            return Err(EngineError::ConsumedVariable(var));
        }

        let ref_ty = Type::reference(info.ty().clone(), mutable);
        let binding = info.binding().clone();

        let sid = self.alloc_stmt_id();
        let ret = self.alloc_var(ref_ty, binding, sid);
        self.register_and_insert(
            InsertPos::AfterDeps,
            Statement::new(sid, StatementKind::Ref { mutable }, vec![var], Some(ret)),
        );
        Ok(ret)
    }

    /// Insert a tuple-field access over `var`. Hard-errors when `var`
    /// is foreign, not tuple-typed, or the index is out of bounds.
    pub fn access_tuple_field(
        &mut self,
        var: VarId,
        index: usize,
    ) -> Result<VarId, EngineError> {
        let info = self
            .vars
            .get(&var)
            .ok_or(EngineError::ForeignVariable(var))?;
        if info.is_consumed() {
            return Err(EngineError::ConsumedVariable(var));
        }
        let ty = info.ty().clone();
        let binding = info.binding().clone();
        let Type::Tuple(elems) = &ty else {
            return Err(EngineError::UnsupportedType(ty));
        };
        let Some(elem_ty) = elems.get(index).cloned() else {
            return Err(EngineError::UnsupportedType(ty));
        };

        let sid = self.alloc_stmt_id();
        let ret = self.alloc_var(elem_ty, binding, sid);
        self.register_and_insert(
            InsertPos::AfterDeps,
            Statement::new(
                sid,
                StatementKind::TupleAccess { index },
                vec![var],
                Some(ret),
            ),
        );
        Ok(ret)
    }

    // ------------------------------------------------------------------
    // Argument generation
    // ------------------------------------------------------------------

    /// Synthesize a value of `ty` from scratch, inserting as many
    /// statements as needed. On failure the sequence is unchanged.
    pub fn generate_arg(
        &mut self,
        ty: &Type,
        ctx: &dyn TypeContext,
        pool: &dyn ConstantPool,
        rng: &mut impl Rng,
    ) -> Option<VarId> {
        let file_binding = self.file_path_binding(rng);
        let snapshot = self.checkpoint();
        let result = self.generate_arg_inner(
            ty,
            &HashSet::new(),
            None,
            file_binding.as_deref(),
            ctx,
            pool,
            rng,
        );
        if result.is_none() {
            self.restore(snapshot);
        }
        result
    }

    /// Reuse a usable variable of `ty` positioned strictly before
    /// `before_pos`, or fall back to generating a fresh one.
    pub fn get_arg(
        &mut self,
        ty: &Type,
        before_pos: usize,
        ctx: &dyn TypeContext,
        pool: &dyn ConstantPool,
        rng: &mut impl Rng,
    ) -> Option<VarId> {
        if let Type::Ref { mutable, .. } = ty {
            let candidates = self.borrowable_variables_of_type(ty, before_pos);
            if let Some(&chosen) = candidates.choose(rng) {
                let is_ref = self
                    .vars
                    .get(&chosen)
                    .map(|i| i.ty().is_ref())
                    .unwrap_or(false);
                if is_ref {
                    // Already a reference; use it directly.
                    return Some(chosen);
                }
                return self.reference_variable(chosen, *mutable).ok();
            }
        } else {
            let candidates = self.consumable_variables_of_type(ty, before_pos);
            if let Some(&chosen) = candidates.choose(rng) {
                return Some(chosen);
            }
        }
        self.generate_arg(ty, ctx, pool, rng)
    }

    /// Reuse-or-generate for one parameter of a statement placed at
    /// `pos`; used when adopting statements from another test case.
    pub fn satisfy_parameter(
        &mut self,
        pos: usize,
        ty: &Type,
        ctx: &dyn TypeContext,
        pool: &dyn ConstantPool,
        rng: &mut impl Rng,
    ) -> Option<VarId> {
        self.get_arg(ty, pos, ctx, pool, rng)
    }

    /// Satisfy a list of parameter types, skipping duplicates so the
    /// same variable is not used twice in one invocation.
    pub fn satisfy_parameters(
        &mut self,
        pos: usize,
        param_types: &[Type],
        ctx: &dyn TypeContext,
        pool: &dyn ConstantPool,
        rng: &mut impl Rng,
    ) -> Vec<VarId> {
        let mut out = Vec::with_capacity(param_types.len());
        for ty in param_types {
            if let Some(var) = self.satisfy_parameter(pos, ty, ctx, pool, rng) {
                if !out.contains(&var) {
                    out.push(var);
                }
            }
        }
        out
    }

    fn generate_arg_inner(
        &mut self,
        ty: &Type,
        visited: &HashSet<Type>,
        call_context: Option<&str>,
        file_binding: Option<&Path>,
        ctx: &dyn TypeContext,
        pool: &dyn ConstantPool,
        rng: &mut impl Rng,
    ) -> Option<VarId> {
        debug!(test = self.id, %ty, "generating argument");
        match ty {
            Type::Prim(prim) => Some(self.generate_primitive(*prim, pool, rng)),
            Type::Struct { .. } | Type::Enum { .. } => {
                let generators = ctx.generators_of(ty, file_binding);
                debug!(test = self.id, count = generators.len(), "found generators");
                self.generate_from_generators(
                    ty,
                    generators,
                    visited,
                    call_context,
                    file_binding,
                    ctx,
                    pool,
                    rng,
                )
            }
            Type::Ref { .. } => {
                self.generate_reference(ty, visited, call_context, file_binding, ctx, pool, rng)
            }
            Type::Tuple(_) => {
                self.generate_tuple(ty, visited, file_binding, ctx, pool, rng)
            }
            Type::Array { .. } => {
                self.generate_array(ty, visited, file_binding, ctx, pool, rng)
            }
            // Slices are not constructed; generic slots must have been
            // bound before asking for a value.
            Type::Slice(_) | Type::Generic(_) => None,
        }
    }

    /// Primitive literals go to the front of the sequence; they have no
    /// dependencies. With configured probability a mined constant is
    /// preferred over a fresh sample.
    fn generate_primitive(
        &mut self,
        prim: PrimType,
        pool: &dyn ConstantPool,
        rng: &mut impl Rng,
    ) -> VarId {
        if self.config.use_constant_pool && rng.gen_bool(self.config.p_constant_pool) {
            let constants = pool.values_of_type(prim);
            if let Some(value) = constants.choose(rng) {
                debug!(test = self.id, %value, "picked constant from pool");
                return self.push_primitive(value.clone());
            }
        }

        let value = prim.sample(rng);
        debug!(test = self.id, %value, "sampled fresh literal");
        self.push_primitive(value)
    }

    fn push_primitive(&mut self, value: PrimValue) -> VarId {
        let ty = Type::Prim(value.prim_type());
        let sid = self.alloc_stmt_id();
        let ret = self.alloc_var(ty, TypeBinding::new(), sid);
        self.register_and_insert(
            InsertPos::Front,
            Statement::new(sid, StatementKind::Primitive { value }, vec![], Some(ret)),
        );
        ret
    }

    fn generate_reference(
        &mut self,
        ref_ty: &Type,
        visited: &HashSet<Type>,
        call_context: Option<&str>,
        file_binding: Option<&Path>,
        ctx: &dyn TypeContext,
        pool: &dyn ConstantPool,
        rng: &mut impl Rng,
    ) -> Option<VarId> {
        let Type::Ref { inner, mutable } = ref_ty else {
            return None;
        };

        let binding = TypeBinding::of_type(ref_ty);
        if binding.has_unbound() {
            warn!(test = self.id, %ref_ty, "reference type has unbound generics");
            return None;
        }

        let inner_ty = inner.as_ref().clone();
        if visited.contains(&inner_ty) {
            return None;
        }

        let snapshot = self.checkpoint();
        let mut extended = visited.clone();
        extended.insert(ref_ty.clone());
        let Some(arg) = self.generate_arg_inner(
            &inner_ty,
            &extended,
            call_context,
            file_binding,
            ctx,
            pool,
            rng,
        ) else {
            self.restore(snapshot);
            return None;
        };

        self.insert_built(
            InsertPos::AfterDeps,
            StatementKind::Ref { mutable: *mutable },
            vec![arg],
            Some((ref_ty.clone(), binding)),
        )
    }

    fn generate_tuple(
        &mut self,
        tuple_ty: &Type,
        visited: &HashSet<Type>,
        file_binding: Option<&Path>,
        ctx: &dyn TypeContext,
        pool: &dyn ConstantPool,
        rng: &mut impl Rng,
    ) -> Option<VarId> {
        let Type::Tuple(elems) = tuple_ty else {
            return None;
        };

        let binding = TypeBinding::of_type(tuple_ty);
        if binding.has_unbound() {
            warn!(test = self.id, %tuple_ty, "tuple type has unbound generics");
            return None;
        }

        let snapshot = self.checkpoint();
        let mut extended = visited.clone();
        extended.insert(tuple_ty.clone());

        let mut args = Vec::with_capacity(elems.len());
        for elem in elems {
            match self.generate_arg_inner(elem, &extended, None, file_binding, ctx, pool, rng) {
                Some(arg) => args.push(arg),
                // All elements must succeed; partial success is failure.
                None => {
                    self.restore(snapshot);
                    return None;
                }
            }
        }

        self.insert_built(
            InsertPos::AfterDeps,
            StatementKind::TupleInit {
                elem_types: elems.clone(),
            },
            args,
            Some((tuple_ty.clone(), binding)),
        )
    }

    fn generate_array(
        &mut self,
        array_ty: &Type,
        visited: &HashSet<Type>,
        file_binding: Option<&Path>,
        ctx: &dyn TypeContext,
        pool: &dyn ConstantPool,
        rng: &mut impl Rng,
    ) -> Option<VarId> {
        let Type::Array { elem, len } = array_ty else {
            return None;
        };

        let binding = TypeBinding::of_type(array_ty);
        if binding.has_unbound() {
            warn!(test = self.id, %array_ty, "array type has unbound generics");
            return None;
        }

        let snapshot = self.checkpoint();
        let mut extended = visited.clone();
        extended.insert(array_ty.clone());

        let mut args = Vec::with_capacity(*len);
        for _ in 0..*len {
            match self.generate_arg_inner(elem, &extended, None, file_binding, ctx, pool, rng) {
                Some(arg) => args.push(arg),
                None => {
                    self.restore(snapshot);
                    return None;
                }
            }
        }

        self.insert_built(
            InsertPos::AfterDeps,
            StatementKind::ArrayInit {
                elem_type: elem.as_ref().clone(),
                len: *len,
            },
            args,
            Some((array_ty.clone(), binding)),
        )
    }

    /// Pick a generator from the pool and build a value of `ty` with
    /// it, retrying with the remaining pool on any failure. Fails only
    /// when the pool is exhausted.
    #[allow(clippy::too_many_arguments)]
    fn generate_from_generators(
        &mut self,
        ty: &Type,
        mut generators: Vec<Callable>,
        visited: &HashSet<Type>,
        call_context: Option<&str>,
        file_binding: Option<&Path>,
        ctx: &dyn TypeContext,
        pool: &dyn ConstantPool,
        rng: &mut impl Rng,
    ) -> Option<VarId> {
        while !generators.is_empty() {
            let idx = rng.gen_range(0..generators.len());
            let generator = generators.swap_remove(idx);

            // A generator re-entered from its own argument generation
            // would recurse forever.
            if call_context == Some(generator.global_id.as_str()) {
                continue;
            }
            // A parameter type already being generated on this call
            // stack would immediately hit the cycle guard.
            if generator.params.iter().any(|p| visited.contains(&p.ty)) {
                continue;
            }

            let Some(gen_ret) = generator.return_type.clone() else {
                continue;
            };
            let unified = TypeBinding::from_types(ty, &gen_ret).or_else(|| {
                // A generator returning `T` can serve a `&T` request.
                ty.ref_inner()
                    .and_then(|inner| TypeBinding::from_types(inner, &gen_ret))
            });
            let Some(mut binding) = unified else {
                continue;
            };

            binding.add_generics(generator.deep_generics());
            for g in binding.unbound() {
                if let Some(default) = ctx.default_for(&g) {
                    binding.bind(g, default);
                }
            }
            if binding.has_unbound() {
                warn!(test = self.id, %generator, "could not bind all generics");
                continue;
            }

            // A private generator binds the whole call subtree to its
            // own source file.
            let subtree_binding: Option<PathBuf> = if !generator.is_public {
                generator.src_file.clone()
            } else {
                file_binding.map(Path::to_path_buf)
            };

            let snapshot = self.checkpoint();
            let mut extended = visited.clone();
            extended.insert(ty.clone());

            let mut args = Vec::with_capacity(generator.params.len());
            let mut complete = true;
            for param in &generator.params {
                let param_ty = param.ty.bind_generics(&binding);
                match self.generate_arg_inner(
                    &param_ty,
                    &extended,
                    Some(&generator.global_id),
                    subtree_binding.as_deref(),
                    ctx,
                    pool,
                    rng,
                ) {
                    Some(arg) => args.push(arg),
                    None => {
                        complete = false;
                        break;
                    }
                }
            }

            if !complete || self.size() >= self.config.max_statements {
                self.restore(snapshot);
                continue;
            }

            // A non-ref-returning generator serving a `&T` request
            // produces the referent; the caller wraps it if needed.
            let ret_ty = match (ty.ref_inner(), gen_ret.is_ref()) {
                (Some(inner), false) => inner.clone(),
                _ => ty.clone(),
            };

            debug!(test = self.id, %generator, "selected generator");
            return self.insert_built(
                InsertPos::AfterDeps,
                kind_for(&generator),
                args,
                Some((ret_ty, binding)),
            );
        }

        warn!(test = self.id, %ty, "generator pool exhausted");
        None
    }

    // ------------------------------------------------------------------
    // Callable insertion
    // ------------------------------------------------------------------

    /// Insert a call to `callable` at the end of the sequence,
    /// generating arguments for every parameter. Atomic: on failure the
    /// test case is unchanged. Returns the call's value, if it has one.
    pub fn insert_callable(
        &mut self,
        callable: &Callable,
        ctx: &dyn TypeContext,
        pool: &dyn ConstantPool,
        rng: &mut impl Rng,
    ) -> Option<VarId> {
        let file_binding = self.file_path_binding(rng);
        if !self.can_insert(callable, file_binding.as_deref()) {
            debug!(test = self.id, %callable, "file binding rejects callable");
            return None;
        }

        let snapshot = self.checkpoint();
        match self.try_insert_callable(callable, file_binding.as_deref(), ctx, pool, rng) {
            Some(ret) => ret,
            None => {
                self.restore(snapshot);
                None
            }
        }
    }

    /// `Some(ret_slot)` on success; `None` means the insertion failed
    /// and must be rolled back.
    fn try_insert_callable(
        &mut self,
        callable: &Callable,
        file_binding: Option<&Path>,
        ctx: &dyn TypeContext,
        pool: &dyn ConstantPool,
        rng: &mut impl Rng,
    ) -> Option<Option<VarId>> {
        debug!(test = self.id, %callable, "inserting callable");

        let mut binding = TypeBinding::with_generics(callable.deep_generics());
        for g in binding.unbound() {
            if let Some(default) = ctx.default_for(&g) {
                binding.bind(g, default);
            }
        }
        if binding.has_unbound() {
            warn!(test = self.id, %binding, "could not bind all generics");
            return None;
        }

        let mut args = Vec::with_capacity(callable.params.len());
        for param in &callable.params {
            let param_ty = param.ty.bind_generics(&binding);
            let arg = self.generate_arg_inner(
                &param_ty,
                &HashSet::new(),
                Some(&callable.global_id),
                file_binding,
                ctx,
                pool,
                rng,
            )?;
            args.push(arg);
        }

        let ret = callable
            .return_type
            .as_ref()
            .map(|rt| (rt.bind_generics(&binding), binding.clone()));
        let ret_var = self.insert_built(InsertPos::Append, kind_for(callable), args, ret);
        info!(test = self.id, %callable, "appended call statement");
        Some(ret_var)
    }

    /// Invoke `method` on the existing variable `owner`, wrapping the
    /// receiver in a reference statement when the self parameter is
    /// by-reference. Hard-errors when `owner` is not in this test case.
    pub fn insert_method_on_existing_variable(
        &mut self,
        owner: VarId,
        method: &Callable,
        ctx: &dyn TypeContext,
        pool: &dyn ConstantPool,
        rng: &mut impl Rng,
    ) -> Result<Option<VarId>, EngineError> {
        if !self.vars.contains_key(&owner) {
            return Err(EngineError::ForeignVariable(owner));
        }
        let file_binding = self.file_path_binding(rng);
        let snapshot = self.checkpoint();
        match self.insert_method_inner(owner, method, file_binding.as_deref(), ctx, pool, rng) {
            Some(ret) => Ok(ret),
            None => {
                self.restore(snapshot);
                Ok(None)
            }
        }
    }

    fn insert_method_inner(
        &mut self,
        owner: VarId,
        method: &Callable,
        file_binding: Option<&Path>,
        ctx: &dyn TypeContext,
        pool: &dyn ConstantPool,
        rng: &mut impl Rng,
    ) -> Option<Option<VarId>> {
        let Some(self_param) = method.self_param().cloned() else {
            // Not an instance method after all.
            return self.try_insert_callable(method, file_binding, ctx, pool, rng);
        };

        debug!(test = self.id, %owner, %method, "inserting method on existing variable");
        let owner_info = self.vars.get(&owner)?;
        let owner_ty = owner_info.ty().clone();
        let owner_binding = owner_info.binding().clone();

        let mut binding =
            owner_binding.left_outer_merge(&TypeBinding::with_generics(method.deep_generics()));

        // The receiver's concrete type resolves the self slot: either
        // the referent generic of `&self`-style parameters, or a fully
        // generic receiver (blanket impls).
        match &self_param.ty {
            Type::Ref { inner, .. } => {
                if let Some(g) = inner.as_generic() {
                    binding.bind(g.clone(), owner_ty.clone());
                }
            }
            Type::Generic(g) => binding.bind(g.clone(), owner_ty.clone()),
            _ => {}
        }
        // The owning type's generics resolve against the receiver too.
        if let Some(parent) = &method.parent {
            if let Some(parent_binding) = TypeBinding::from_types(&owner_ty, parent) {
                binding = parent_binding.left_outer_merge(&binding);
            }
        }
        for g in binding.unbound() {
            if let Some(default) = ctx.default_for(&g) {
                binding.bind(g, default);
            }
        }
        if binding.has_unbound() {
            warn!(test = self.id, %binding, "could not bind all generics");
            return None;
        }

        let self_arg = if self_param.is_by_reference() && !owner_ty.is_ref() {
            let mutable = matches!(&self_param.ty, Type::Ref { mutable: true, .. });
            self.reference_variable(owner, mutable).ok()?
        } else {
            if !self_param.is_by_reference()
                && self
                    .vars
                    .get(&owner)
                    .map(|i| i.is_consumed())
                    .unwrap_or(true)
            {
                // Receiver would be moved but is no longer available.
                return None;
            }
            owner
        };

        let mut args = Vec::with_capacity(method.params.len());
        args.push(self_arg);
        for param in method.value_params() {
            let param_ty = param.ty.bind_generics(&binding);
            let arg = self.generate_arg_inner(
                &param_ty,
                &HashSet::new(),
                Some(&method.global_id),
                file_binding,
                ctx,
                pool,
                rng,
            )?;
            args.push(arg);
        }

        let ret = method
            .return_type
            .as_ref()
            .map(|rt| (rt.bind_generics(&binding), binding.clone()));
        let ret_var =
            self.insert_built(InsertPos::Append, StatementKind::Method(method.clone()), args, ret);
        Some(ret_var)
    }

    /// Insert one random statement: with configured probability a
    /// method on an existing variable, otherwise a fresh callable from
    /// the catalog (restricted to the current file binding, if any).
    pub fn insert_random_stmt(
        &mut self,
        ctx: &dyn TypeContext,
        pool: &dyn ConstantPool,
        rng: &mut impl Rng,
    ) -> Option<VarId> {
        let file_binding = self.file_path_binding(rng);

        let mut pairs: Vec<(VarId, Callable)> = Vec::new();
        for var in self.variables() {
            if let Some(info) = self.vars.get(&var) {
                // A consumed variable can neither be borrowed nor moved
                // again, so no method applies.
                if info.is_consumed() {
                    continue;
                }
                for method in ctx.methods_of(info.ty()) {
                    pairs.push((var, method));
                }
            }
        }

        if !pairs.is_empty() && rng.gen_bool(self.config.p_local_variables) {
            let (owner, method) = pairs.choose(rng)?.clone();
            let snapshot = self.checkpoint();
            return match self.insert_method_inner(
                owner,
                &method,
                file_binding.as_deref(),
                ctx,
                pool,
                rng,
            ) {
                Some(ret) => ret,
                None => {
                    self.restore(snapshot);
                    None
                }
            };
        }

        let candidates = ctx.callables(file_binding.as_deref(), true);
        let callable = candidates.choose(rng)?.clone();
        info!(test = self.id, %callable, "inserting random statement");
        self.insert_callable(&callable, ctx, pool, rng)
    }

    // ------------------------------------------------------------------
    // Parameter mutation
    // ------------------------------------------------------------------

    /// Local search over one statement's arguments: each parameter is
    /// replaced with probability `1/param_count` by another usable
    /// same-typed variable positioned before the statement.
    pub fn mutate_stmt(
        &mut self,
        id: StmtId,
        ctx: &dyn TypeContext,
        pool: &dyn ConstantPool,
        rng: &mut impl Rng,
    ) -> bool {
        let Some(pos) = self.stmt_position(id) else {
            return false;
        };
        let arg_count = self.stmts[pos].args().len();
        if arg_count == 0 {
            return false;
        }

        let p_change = 1.0 / arg_count as f64;
        let mut changed = false;
        for idx in 0..arg_count {
            if rng.gen_bool(p_change) {
                debug!(test = self.id, idx, "mutating argument");
                if self.mutate_parameter(id, idx, ctx, pool, rng) {
                    changed = true;
                }
            }
        }
        changed
    }

    fn mutate_parameter(
        &mut self,
        id: StmtId,
        idx: usize,
        ctx: &dyn TypeContext,
        pool: &dyn ConstantPool,
        rng: &mut impl Rng,
    ) -> bool {
        let Some(pos) = self.stmt_position(id) else {
            return false;
        };
        let stmt = self.stmts[pos].clone();
        let current = stmt.args()[idx];
        let Some(param_ty) = self.vars.get(&current).map(|i| i.ty().clone()) else {
            return false;
        };

        let mut usable = self.swap_candidates(&param_ty, pos);
        // Neither the statement's own result nor the current argument.
        usable.retain(|v| Some(*v) != stmt.ret() && *v != current);

        let same_typed_params = stmt
            .args()
            .iter()
            .filter(|a| {
                self.vars
                    .get(a)
                    .map(|i| i.ty() == &param_ty)
                    .unwrap_or(false)
            })
            .count();

        // If there are fewer usable objects than same-typed parameters,
        // try (up to 3 times) to synthesize one more.
        let mut attempts = 0;
        while attempts < 3 && usable.len() < same_typed_params + 1 {
            attempts += 1;
            let Some(pos_now) = self.stmt_position(id) else {
                return false;
            };
            if let Some(var) = self.get_arg(&param_ty, pos_now, ctx, pool, rng) {
                let var_pos = self.var_position(var).ok();
                let stmt_pos = self.stmt_position(id);
                if let (Some(vp), Some(sp)) = (var_pos, stmt_pos) {
                    if vp < sp && var != current && Some(var) != stmt.ret() && !usable.contains(&var)
                    {
                        usable.push(var);
                    }
                }
            }
        }

        let Some(&replacement) = usable.choose(rng) else {
            warn!(test = self.id, idx, %param_ty, "could not mutate parameter");
            return false;
        };
        self.replace_arg(id, idx, replacement);
        true
    }

    /// Same-typed variables that can be swapped into an argument slot
    /// directly. For reference parameters only exact reference-typed
    /// variables qualify; wrapping happens through `get_arg`.
    fn swap_candidates(&self, ty: &Type, before_pos: usize) -> Vec<VarId> {
        if ty.is_ref() {
            self.produced_before(before_pos)
                .filter(|v| {
                    self.vars
                        .get(v)
                        .map(|info| info.ty() == ty && !info.is_consumed())
                        .unwrap_or(false)
                })
                .collect()
        } else {
            self.consumable_variables_of_type(ty, before_pos)
        }
    }

    fn replace_arg(&mut self, id: StmtId, idx: usize, new: VarId) {
        let Some(pos) = self.stmt_position(id) else {
            return;
        };
        let old = self.stmts[pos].args()[idx];
        self.stmts[pos].set_arg(idx, new);

        // The old variable stays consumed if it was; consumption is
        // monotonic. It only loses the usage entry if no other slot of
        // this statement still uses it.
        if !self.stmts[pos].uses(old) {
            if let Some(info) = self.vars.get_mut(&old) {
                info.forget_use(id);
            }
        }

        let Some(new_ty) = self.vars.get(&new).map(|i| i.ty().clone()) else {
            return;
        };
        let consumes = self.stmts[pos].consumes_arg(idx, &new_ty);
        if let Some(info) = self.vars.get_mut(&new) {
            if consumes {
                info.record_consume(id);
            } else {
                info.record_use(id);
            }
        }
    }

    // ------------------------------------------------------------------
    // Coverage map
    // ------------------------------------------------------------------

    pub fn set_coverage(&mut self, objective: ObjectiveId, distance: f64) {
        self.coverage.insert(objective, distance);
    }

    pub fn set_coverage_map(&mut self, coverage: HashMap<ObjectiveId, f64>) {
        self.coverage = coverage;
    }

    pub fn coverage(&self) -> &HashMap<ObjectiveId, f64> {
        &self.coverage
    }

    pub fn covered_objectives(&self) -> Vec<ObjectiveId> {
        self.coverage
            .iter()
            .filter(|(_, d)| **d == 0.0)
            .map(|(o, _)| *o)
            .collect()
    }

    pub fn uncovered_objectives(&self) -> Vec<ObjectiveId> {
        self.coverage
            .iter()
            .filter(|(_, d)| **d != 0.0)
            .map(|(o, _)| *o)
            .collect()
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TestCase #{} ({} statements)", self.id, self.stmts.len())?;
        for (i, stmt) in self.stmts.iter().enumerate() {
            writeln!(f, "  {:>3}: {}", i, stmt)?;
        }
        Ok(())
    }
}
