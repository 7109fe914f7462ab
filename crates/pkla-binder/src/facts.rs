//! Per-module derived facts.
//!
//! Everything here is computed once per `(module, context)` and cached by
//! [`ModuleGraph::facts`](crate::graph::ModuleGraph::facts). The derivation
//! is deliberately iterative: supermodule chains and import closures are
//! walked with explicit worklists and visited sets so that user-written
//! cycles surface as diagnostics instead of stack overflows, and so that a
//! cold cache needs no recursive fact lookups.

use crate::graph::{ModuleGraph, ModuleId, PklProjectId};
use indexmap::IndexMap;
use pkla_common::diagnostics::{codes, Diagnostic};
use pkla_common::limits::MAX_SUPERMODULE_CHAIN;
use pkla_common::{Atom, PklVersion};
use pkla_syntax::{
    ModuleClauseKind, ModuleDecl, Modifiers, NodeData, NodeId, SyntaxTree,
};
use rustc_hash::{FxBuildHasher, FxHashSet};
use smallvec::SmallVec;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemberKind {
    Property,
    Method,
    Class,
    TypeAlias,
}

/// One named declaration in a module (or inherited into it).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemberInfo {
    /// Module the declaration lexically lives in (an ancestor for
    /// inherited entries).
    pub module: ModuleId,
    pub node: NodeId,
    pub name: Atom,
    pub kind: MemberKind,
    pub modifiers: Modifiers,
    /// Property has a value expression or amending body.
    pub has_default: bool,
    /// Property carries an explicit type annotation.
    pub type_annotated: bool,
}

#[derive(Clone, Debug)]
pub struct ResolvedImport {
    /// Binding name: explicit alias or the URI stem.
    pub name: Atom,
    pub uri: Atom,
    pub is_glob: bool,
    pub targets: SmallVec<[ModuleId; 1]>,
}

pub type MemberTable = IndexMap<Atom, MemberInfo, FxBuildHasher>;

/// Derived facts for one `(module, context)` pair. Immutable once built.
#[derive(Debug)]
pub struct ModuleFacts {
    /// Direct supermodule (extends/amends target), if the clause resolves.
    pub supermodule: Option<ModuleId>,
    pub clause_kind: Option<ModuleClauseKind>,
    /// Own declarations, in declaration order.
    pub properties: MemberTable,
    pub methods: MemberTable,
    pub type_defs: MemberTable,
    /// Own + inherited declarations; an own entry shadows an inherited one
    /// of the same name and kind.
    pub all_properties: MemberTable,
    pub all_methods: MemberTable,
    pub all_type_defs: MemberTable,
    /// Inherited properties that are typed but defaultless: a non-abstract
    /// amending module must define all of these.
    pub effective_parent_properties: MemberTable,
    pub imports: Vec<ResolvedImport>,
    pub min_pkl_version: PklVersion,
    /// Modules whose trees this fact set was derived from (chain +
    /// imports); used for invalidation.
    pub dependencies: FxHashSet<ModuleId>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ModuleFacts {
    pub fn empty() -> Self {
        Self {
            supermodule: None,
            clause_kind: None,
            properties: MemberTable::default(),
            methods: MemberTable::default(),
            type_defs: MemberTable::default(),
            all_properties: MemberTable::default(),
            all_methods: MemberTable::default(),
            all_type_defs: MemberTable::default(),
            effective_parent_properties: MemberTable::default(),
            imports: Vec::new(),
            min_pkl_version: PklVersion::ZERO,
            dependencies: FxHashSet::default(),
            diagnostics: Vec::new(),
        }
    }

    pub fn import_named(&self, name: Atom) -> Option<&ResolvedImport> {
        self.imports.iter().find(|i| i.name == name)
    }
}

/// Scan a module tree's own members into tables. Non-recursive.
fn scan_own(module: ModuleId, tree: &SyntaxTree) -> (MemberTable, MemberTable, MemberTable) {
    let mut properties = MemberTable::default();
    let mut methods = MemberTable::default();
    let mut type_defs = MemberTable::default();
    let Some(decl) = module_decl(tree) else {
        return (properties, methods, type_defs);
    };
    for &member in &decl.members {
        let info = match tree.data(member) {
            NodeData::Property(p) => MemberInfo {
                module,
                node: member,
                name: p.name,
                kind: MemberKind::Property,
                modifiers: p.modifiers,
                has_default: p.value.is_some() || p.body.is_some(),
                type_annotated: p.type_ann.is_some(),
            },
            NodeData::Method(m) => MemberInfo {
                module,
                node: member,
                name: m.name,
                kind: MemberKind::Method,
                modifiers: m.modifiers,
                has_default: m.body.is_some(),
                type_annotated: m.return_ann.is_some(),
            },
            NodeData::Class(c) => MemberInfo {
                module,
                node: member,
                name: c.name,
                kind: MemberKind::Class,
                modifiers: c.modifiers,
                has_default: false,
                type_annotated: false,
            },
            NodeData::TypeAlias(a) => MemberInfo {
                module,
                node: member,
                name: a.name,
                kind: MemberKind::TypeAlias,
                modifiers: a.modifiers,
                has_default: false,
                type_annotated: false,
            },
            _ => continue,
        };
        let table = match info.kind {
            MemberKind::Property => &mut properties,
            MemberKind::Method => &mut methods,
            MemberKind::Class | MemberKind::TypeAlias => &mut type_defs,
        };
        // First declaration of a name wins; duplicates are a parse-level
        // concern surfaced elsewhere.
        table.entry(info.name).or_insert(info);
    }
    (properties, methods, type_defs)
}

fn module_decl(tree: &SyntaxTree) -> Option<&ModuleDecl> {
    match tree.data(tree.root()) {
        NodeData::Module(m) => Some(m),
        _ => None,
    }
}

fn own_min_version(graph: &ModuleGraph, tree: &SyntaxTree) -> PklVersion {
    let Some(decl) = module_decl(tree) else {
        return PklVersion::ZERO;
    };
    let module_info = graph.interner().intern("ModuleInfo");
    let min_key = graph.interner().intern("minPklVersion");
    for annotation in &decl.annotations {
        if annotation.name != module_info {
            continue;
        }
        for (key, value) in &annotation.entries {
            if *key != min_key {
                continue;
            }
            if let NodeData::StringLiteral(text) = tree.data(*value) {
                if let Some(version) = PklVersion::parse(&graph.interner().resolve(*text)) {
                    return version;
                }
            }
        }
    }
    PklVersion::ZERO
}

/// Binding name for an import without an explicit alias: the URI stem
/// (`"dir/bird.pkl"` binds `bird`).
fn import_stem(graph: &ModuleGraph, uri: Atom) -> Atom {
    let text = graph.interner().resolve(uri);
    let stem = text
        .rsplit('/')
        .next()
        .unwrap_or(&text)
        .trim_end_matches(".pkl");
    graph.interner().intern(stem)
}

pub(crate) fn compute(
    graph: &ModuleGraph,
    module: ModuleId,
    project: Option<PklProjectId>,
) -> ModuleFacts {
    let Some(tree) = graph.tree(module) else {
        return ModuleFacts::empty();
    };
    let uri = graph.uri(module).unwrap_or_else(|| "".into());
    let mut facts = ModuleFacts::empty();
    let mut dependencies = FxHashSet::default();

    let (properties, methods, type_defs) = scan_own(module, &tree);

    // ----- Imports -----
    if let Some(decl) = module_decl(&tree) {
        for &import in &decl.imports {
            let NodeData::Import(i) = tree.data(import) else {
                continue;
            };
            let mut targets = SmallVec::new();
            if i.is_glob {
                let pattern = graph.interner().resolve(i.uri);
                let (matched, truncated) = graph.resolve_glob(&pattern, project);
                targets.extend(matched);
                if truncated {
                    facts.diagnostics.push(Diagnostic::new(
                        codes::GLOB_EXPANSION_TRUNCATED,
                        &*uri,
                        tree.span(import),
                        &[&pattern],
                    ));
                }
            } else {
                let target_uri = graph.interner().resolve(i.uri);
                targets.extend(graph.resolve_uri(&target_uri, project));
            }
            dependencies.extend(targets.iter().copied());
            facts.imports.push(ResolvedImport {
                name: i.alias.unwrap_or_else(|| import_stem(graph, i.uri)),
                uri: i.uri,
                is_glob: i.is_glob,
                targets,
            });
        }
        facts.clause_kind = decl.clause.as_ref().map(|c| c.kind);
    }

    // ----- Supermodule chain (iterative, cycle-checked) -----
    // Chain entries are collected self-first, then folded ancestor-first so
    // nearer declarations shadow farther ones.
    let mut chain: Vec<ModuleId> = Vec::new();
    let mut visited: FxHashSet<ModuleId> = FxHashSet::default();
    visited.insert(module);
    let mut current = module;
    let mut current_tree = Arc::clone(&tree);
    for _ in 0..MAX_SUPERMODULE_CHAIN {
        let Some(clause) = module_decl(&current_tree).and_then(|d| d.clause.clone()) else {
            break;
        };
        let clause_uri = graph.interner().resolve(clause.uri);
        let Some(parent) = graph.resolve_uri(&clause_uri, project) else {
            break;
        };
        if !visited.insert(parent) {
            facts.diagnostics.push(Diagnostic::new(
                codes::CYCLIC_DECLARATION,
                &*uri,
                current_tree.span(current_tree.root()),
                &[&graph.uri(current).unwrap_or_else(|| "".into())],
            ));
            break;
        }
        if current == module {
            facts.supermodule = Some(parent);
        }
        chain.push(parent);
        dependencies.insert(parent);
        let Some(parent_tree) = graph.tree(parent) else {
            break;
        };
        current = parent;
        current_tree = parent_tree;
    }

    // ----- Flattened tables -----
    let mut all_properties = MemberTable::default();
    let mut all_methods = MemberTable::default();
    let mut all_type_defs = MemberTable::default();
    for &ancestor in chain.iter().rev() {
        if let Some(ancestor_tree) = graph.tree(ancestor) {
            let (p, m, t) = scan_own(ancestor, &ancestor_tree);
            all_properties.extend(p);
            all_methods.extend(m);
            all_type_defs.extend(t);
        }
    }
    // Inherited typed-but-defaultless properties, before own shadowing.
    let mut effective_parent_properties = MemberTable::default();
    for (&name, info) in &all_properties {
        if info.type_annotated && !info.has_default && !properties.contains_key(&name) {
            effective_parent_properties.insert(name, *info);
        }
    }
    all_properties.extend(properties.iter().map(|(k, v)| (*k, *v)));
    all_methods.extend(methods.iter().map(|(k, v)| (*k, *v)));
    all_type_defs.extend(type_defs.iter().map(|(k, v)| (*k, *v)));

    // ----- Minimum language version (worklist over chain + imports) -----
    let mut min_version = own_min_version(graph, &tree);
    let mut seen: FxHashSet<ModuleId> = FxHashSet::default();
    seen.insert(module);
    let mut worklist: Vec<ModuleId> = chain.clone();
    for import in &facts.imports {
        worklist.extend(import.targets.iter().copied());
    }
    while let Some(next) = worklist.pop() {
        if !seen.insert(next) {
            continue;
        }
        let Some(next_tree) = graph.tree(next) else {
            continue;
        };
        min_version = min_version.max(own_min_version(graph, &next_tree));
        if let Some(decl) = module_decl(&next_tree) {
            for &import in &decl.imports {
                if let NodeData::Import(i) = next_tree.data(import) {
                    if !i.is_glob {
                        let target_uri = graph.interner().resolve(i.uri);
                        worklist.extend(graph.resolve_uri(&target_uri, project));
                    }
                }
            }
            if let Some(clause) = &decl.clause {
                let clause_uri = graph.interner().resolve(clause.uri);
                worklist.extend(graph.resolve_uri(&clause_uri, project));
            }
        }
    }

    facts.properties = properties;
    facts.methods = methods;
    facts.type_defs = type_defs;
    facts.all_properties = all_properties;
    facts.all_methods = all_methods;
    facts.all_type_defs = all_type_defs;
    facts.effective_parent_properties = effective_parent_properties;
    facts.min_pkl_version = min_version;
    facts.dependencies = dependencies;
    facts
}
