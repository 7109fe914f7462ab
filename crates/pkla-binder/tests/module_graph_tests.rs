//! Module graph and fact-cache tests.

use pkla_binder::{MemberKind, MemoryLoader, ModuleGraph, PklProjectId};
use pkla_common::diagnostics::codes;
use pkla_common::{Interner, PklVersion, Span};
use pkla_syntax::{
    Annotation, ImportDecl, Modifiers, ModuleClause, ModuleClauseKind, ModuleDecl, NodeData,
    PropertyDecl, SyntaxTree, TreeBuilder,
};
use std::sync::Arc;

struct PropSpec {
    name: &'static str,
    typed: bool,
    has_default: bool,
}

fn prop(name: &'static str, typed: bool, has_default: bool) -> PropSpec {
    PropSpec {
        name,
        typed,
        has_default,
    }
}

fn module_tree(
    interner: &Interner,
    clause: Option<(ModuleClauseKind, &str)>,
    min_version: Option<&str>,
    imports: &[(&str, bool)],
    props: &[PropSpec],
) -> Arc<SyntaxTree> {
    let mut b = TreeBuilder::new();
    let mut annotations = Vec::new();
    if let Some(version) = min_version {
        let value = b.n(NodeData::StringLiteral(interner.intern(version)));
        annotations.push(Annotation {
            name: interner.intern("ModuleInfo"),
            entries: vec![(interner.intern("minPklVersion"), value)],
        });
    }
    let import_nodes: Vec<_> = imports
        .iter()
        .map(|(uri, is_glob)| {
            b.n(NodeData::Import(ImportDecl {
                uri: interner.intern(uri),
                alias: None,
                is_glob: *is_glob,
            }))
        })
        .collect();
    let members: Vec<_> = props
        .iter()
        .map(|spec| {
            let type_ann = spec.typed.then(|| b.n(NodeData::UnknownType));
            let value = spec.has_default.then(|| b.n(NodeData::IntLiteral(1)));
            b.n(NodeData::Property(PropertyDecl {
                name: interner.intern(spec.name),
                modifiers: Modifiers::empty(),
                type_ann,
                value,
                body: None,
            }))
        })
        .collect();
    let root = b.node(
        NodeData::Module(ModuleDecl {
            name: None,
            clause: clause.map(|(kind, uri)| ModuleClause {
                kind,
                uri: interner.intern(uri),
            }),
            annotations,
            imports: import_nodes,
            members,
        }),
        Span::new(0, 100),
    );
    Arc::new(b.finish(root))
}

fn setup() -> (Arc<Interner>, Arc<MemoryLoader>, ModuleGraph) {
    let interner = Arc::new(Interner::new());
    let loader = Arc::new(MemoryLoader::new());
    let graph = ModuleGraph::new(loader.clone(), interner.clone());
    (interner, loader, graph)
}

#[test]
fn resolve_uri_is_cached_per_context() {
    let (interner, loader, graph) = setup();
    loader.register("a.pkl", module_tree(&interner, None, None, &[], &[]));

    let first = graph.resolve_uri("a.pkl", None).unwrap();
    let second = graph.resolve_uri("a.pkl", None).unwrap();
    assert_eq!(first, second);
    assert!(graph.resolve_uri("missing.pkl", None).is_none());
}

#[test]
fn same_uri_under_two_projects_yields_distinct_declarations() {
    // Two projects pin different versions of `dep.pkl`. A cache keyed
    // without the project context would hand project B the declarations of
    // whichever project resolved first; the composite key must keep them
    // apart.
    let (interner, loader, graph) = setup();
    let project_a = PklProjectId(1);
    let project_b = PklProjectId(2);
    loader.register_for_project(
        project_a,
        "dep.pkl",
        module_tree(&interner, None, None, &[], &[prop("fromV1", true, true)]),
    );
    loader.register_for_project(
        project_b,
        "dep.pkl",
        module_tree(&interner, None, None, &[], &[prop("fromV2", true, true)]),
    );

    let in_a = graph.resolve_uri("dep.pkl", Some(project_a)).unwrap();
    let in_b = graph.resolve_uri("dep.pkl", Some(project_b)).unwrap();
    assert_ne!(in_a, in_b);

    let facts_a = graph.facts(in_a, Some(project_a));
    let facts_b = graph.facts(in_b, Some(project_b));
    let from_v1 = interner.intern("fromV1");
    let from_v2 = interner.intern("fromV2");
    assert!(facts_a.properties.contains_key(&from_v1));
    assert!(!facts_a.properties.contains_key(&from_v2));
    assert!(facts_b.properties.contains_key(&from_v2));
}

#[test]
fn flattened_tables_shadow_ancestor_members() {
    let (interner, loader, graph) = setup();
    loader.register(
        "parent.pkl",
        module_tree(
            &interner,
            None,
            None,
            &[],
            &[prop("x", true, true), prop("parentOnly", true, true)],
        ),
    );
    loader.register(
        "child.pkl",
        module_tree(
            &interner,
            Some((ModuleClauseKind::Amends, "parent.pkl")),
            None,
            &[],
            &[prop("x", false, true)],
        ),
    );

    let child = graph.resolve_uri("child.pkl", None).unwrap();
    let facts = graph.facts(child, None);
    let x = interner.intern("x");
    let parent_only = interner.intern("parentOnly");

    assert_eq!(facts.all_properties[&x].module, child);
    assert_eq!(facts.all_properties[&x].kind, MemberKind::Property);
    assert_ne!(facts.all_properties[&parent_only].module, child);
    assert!(facts.supermodule.is_some());
    assert_eq!(facts.clause_kind, Some(ModuleClauseKind::Amends));
}

#[test]
fn effective_parent_properties_require_typed_defaultless() {
    let (interner, loader, graph) = setup();
    loader.register(
        "parent.pkl",
        module_tree(
            &interner,
            None,
            None,
            &[],
            &[
                prop("required", true, false),
                prop("defaulted", true, true),
                prop("untyped", false, false),
                prop("overridden", true, false),
            ],
        ),
    );
    loader.register(
        "child.pkl",
        module_tree(
            &interner,
            Some((ModuleClauseKind::Amends, "parent.pkl")),
            None,
            &[],
            &[prop("overridden", false, true)],
        ),
    );

    let child = graph.resolve_uri("child.pkl", None).unwrap();
    let facts = graph.facts(child, None);
    let required = interner.intern("required");
    assert!(facts.effective_parent_properties.contains_key(&required));
    assert!(!facts
        .effective_parent_properties
        .contains_key(&interner.intern("defaulted")));
    assert!(!facts
        .effective_parent_properties
        .contains_key(&interner.intern("untyped")));
    assert!(!facts
        .effective_parent_properties
        .contains_key(&interner.intern("overridden")));
}

#[test]
fn supermodule_cycle_reports_diagnostic_not_overflow() {
    let (interner, loader, graph) = setup();
    loader.register(
        "a.pkl",
        module_tree(
            &interner,
            Some((ModuleClauseKind::Extends, "b.pkl")),
            None,
            &[],
            &[],
        ),
    );
    loader.register(
        "b.pkl",
        module_tree(
            &interner,
            Some((ModuleClauseKind::Extends, "a.pkl")),
            None,
            &[],
            &[],
        ),
    );

    let a = graph.resolve_uri("a.pkl", None).unwrap();
    let facts = graph.facts(a, None);
    assert!(facts
        .diagnostics
        .iter()
        .any(|d| d.code == codes::CYCLIC_DECLARATION));
}

#[test]
fn glob_import_expands_against_loader_universe() {
    let (interner, loader, graph) = setup();
    loader.register("birds/owl.pkl", module_tree(&interner, None, None, &[], &[]));
    loader.register("birds/wren.pkl", module_tree(&interner, None, None, &[], &[]));
    loader.register("fish/cod.pkl", module_tree(&interner, None, None, &[], &[]));
    loader.register(
        "main.pkl",
        module_tree(&interner, None, None, &[("birds/*.pkl", true)], &[]),
    );

    let main = graph.resolve_uri("main.pkl", None).unwrap();
    let facts = graph.facts(main, None);
    assert_eq!(facts.imports.len(), 1);
    assert!(facts.imports[0].is_glob);
    assert_eq!(facts.imports[0].targets.len(), 2);
}

#[test]
fn import_without_alias_binds_uri_stem() {
    let (interner, loader, graph) = setup();
    loader.register("lib/bird.pkl", module_tree(&interner, None, None, &[], &[]));
    loader.register(
        "main.pkl",
        module_tree(&interner, None, None, &[("lib/bird.pkl", false)], &[]),
    );

    let main = graph.resolve_uri("main.pkl", None).unwrap();
    let facts = graph.facts(main, None);
    assert!(facts.import_named(interner.intern("bird")).is_some());
}

#[test]
fn min_version_aggregates_over_imports_and_chain() {
    let (interner, loader, graph) = setup();
    loader.register(
        "dep.pkl",
        module_tree(&interner, None, Some("0.27.0"), &[], &[]),
    );
    loader.register(
        "parent.pkl",
        module_tree(&interner, None, Some("0.25.0"), &[], &[]),
    );
    loader.register(
        "main.pkl",
        module_tree(
            &interner,
            Some((ModuleClauseKind::Amends, "parent.pkl")),
            Some("0.24.0"),
            &[("dep.pkl", false)],
            &[],
        ),
    );

    let main = graph.resolve_uri("main.pkl", None).unwrap();
    let facts = graph.facts(main, None);
    assert_eq!(facts.min_pkl_version, PklVersion::new(0, 27, 0));
}

#[test]
fn min_version_tolerates_import_cycles() {
    let (interner, loader, graph) = setup();
    loader.register(
        "a.pkl",
        module_tree(&interner, None, Some("0.25.0"), &[("b.pkl", false)], &[]),
    );
    loader.register(
        "b.pkl",
        module_tree(&interner, None, Some("0.26.0"), &[("a.pkl", false)], &[]),
    );

    let a = graph.resolve_uri("a.pkl", None).unwrap();
    let facts = graph.facts(a, None);
    assert_eq!(facts.min_pkl_version, PklVersion::new(0, 26, 0));
    // Import cycles are legal; only extends/amends cycles are diagnosed.
    assert!(facts.diagnostics.is_empty());
}

#[test]
fn invalidating_a_dependency_drops_dependent_facts() {
    let (interner, loader, graph) = setup();
    loader.register(
        "parent.pkl",
        module_tree(&interner, None, None, &[], &[prop("old", true, true)]),
    );
    loader.register(
        "child.pkl",
        module_tree(
            &interner,
            Some((ModuleClauseKind::Amends, "parent.pkl")),
            None,
            &[],
            &[],
        ),
    );

    let child = graph.resolve_uri("child.pkl", None).unwrap();
    let before = graph.facts(child, None);
    assert!(before.all_properties.contains_key(&interner.intern("old")));

    let parent = graph.resolve_uri("parent.pkl", None).unwrap();
    loader.register(
        "parent.pkl",
        module_tree(&interner, None, None, &[], &[prop("new", true, true)]),
    );
    graph.invalidate_module(parent);

    let after = graph.facts(child, None);
    assert!(after.all_properties.contains_key(&interner.intern("new")));
    assert!(!after.all_properties.contains_key(&interner.intern("old")));
}

#[test]
fn concurrent_fact_queries_agree() {
    use rayon::prelude::*;

    let (interner, loader, graph) = setup();
    loader.register(
        "parent.pkl",
        module_tree(&interner, None, None, &[], &[prop("x", true, true)]),
    );
    loader.register(
        "child.pkl",
        module_tree(
            &interner,
            Some((ModuleClauseKind::Amends, "parent.pkl")),
            None,
            &[],
            &[prop("y", true, true)],
        ),
    );
    let child = graph.resolve_uri("child.pkl", None).unwrap();

    let results: Vec<usize> = (0..64)
        .into_par_iter()
        .map(|_| graph.facts(child, None).all_properties.len())
        .collect();
    assert!(results.iter().all(|&n| n == 2));
}
