//! The analyzer facade.

use dashmap::DashMap;
use pkla_binder::{ModuleGraph, ModuleId, PklProjectId};
use pkla_common::Interner;
use pkla_solver::{Builtins, DefId, DefinitionStore, TypeDatabase, TypeFormatter, TypeId, TypeInterner};
use pkla_syntax::NodeId;
use rustc_hash::FxBuildHasher;
use std::sync::Arc;

/// A lexical position: a node in a specific module's tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    pub module: ModuleId,
    pub node: NodeId,
}

impl Position {
    pub const fn new(module: ModuleId, node: NodeId) -> Self {
        Self { module, node }
    }
}

pub(crate) type Ctx = Option<PklProjectId>;

/// Engine-level knobs. Defaults match the centralized limits; hosts tune
/// diagnostics behavior without recompiling.
#[derive(Copy, Clone, Debug)]
pub struct EngineOptions {
    /// Emit warnings for members that cannot be statically resolved on
    /// `Dynamic`-typed receivers (they may legitimately appear at runtime).
    pub report_dynamic_member_warnings: bool,
    /// Enforce const-capability rules (`const` values referencing only
    /// const declarations).
    pub check_const_rules: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            report_dynamic_member_warnings: true,
            check_const_rules: true,
        }
    }
}

/// The semantic engine.
///
/// Pure, synchronous, read-mostly: queries compute lazily, memoize per
/// `(subject, context)`, and are safe under concurrent readers. Nothing
/// here performs I/O — module content arrives through the graph's loader.
pub struct Analyzer {
    pub strings: Arc<Interner>,
    pub types: Arc<TypeInterner>,
    pub defs: Arc<DefinitionStore>,
    pub graph: Arc<ModuleGraph>,
    pub options: EngineOptions,
    pub(crate) builtins: Builtins,
    /// Declaration node → definition id, per context.
    pub(crate) def_cache: DashMap<(ModuleId, NodeId, Ctx), DefId, FxBuildHasher>,
    /// In-progress definition lowering, for alias/self-reference cycles.
    pub(crate) lowering: DashMap<(ModuleId, NodeId, Ctx), (), FxBuildHasher>,
    /// Lowered type annotation nodes, per context.
    pub(crate) type_cache: DashMap<(ModuleId, NodeId, Ctx), TypeId, FxBuildHasher>,
}

impl Analyzer {
    pub fn new(graph: Arc<ModuleGraph>, strings: Arc<Interner>) -> Self {
        Self::with_options(graph, strings, EngineOptions::default())
    }

    pub fn with_options(
        graph: Arc<ModuleGraph>,
        strings: Arc<Interner>,
        options: EngineOptions,
    ) -> Self {
        let types = Arc::new(TypeInterner::new());
        let defs = Arc::new(DefinitionStore::new());
        let builtins = defs.install_builtins(&types, &strings);
        Self {
            strings,
            types,
            defs,
            graph,
            options,
            builtins,
            def_cache: DashMap::with_hasher(FxBuildHasher),
            lowering: DashMap::with_hasher(FxBuildHasher),
            type_cache: DashMap::with_hasher(FxBuildHasher),
        }
    }

    pub fn db(&self) -> TypeDatabase<'_> {
        TypeDatabase::new(&self.types, &self.defs, &self.strings)
    }

    /// Canonical display form of a type.
    pub fn render(&self, ty: TypeId) -> String {
        TypeFormatter::new(self.db()).render(ty)
    }

    /// Structural/nominal subtype query.
    pub fn is_subtype(&self, a: TypeId, b: TypeId) -> bool {
        pkla_solver::is_subtype_of(self.db(), a, b)
    }

    /// Drop per-context derived state for an edited module. The module
    /// graph's own invalidation runs too.
    pub fn invalidate_module(&self, module: ModuleId) {
        self.graph.invalidate_module(module);
        self.def_cache.retain(|(m, _, _), _| *m != module);
        self.type_cache.retain(|(m, _, _), _| *m != module);
    }
}
