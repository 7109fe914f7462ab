//! Lexical name resolution.
//!
//! `resolve_with_visitor` walks the syntax tree upward from a position
//! through enclosing scopes in fixed precedence order, feeding each visible
//! declaration to a pluggable visitor until it signals satisfaction:
//!
//! 1. lambda/function-literal parameters of any enclosing literal
//! 2. for-generator / let bound variables of an immediately enclosing
//!    binder — where a generator's *iterable* never sees the generator's
//!    own variables (skip-next-object-body bookkeeping)
//! 3. members of the immediately enclosing object body
//! 4. members of the enclosing class, then the enclosing module, its
//!    imports, its supermodule chain, and finally the base library module
//!
//! Each scope is visited exactly once and the walk is iteration-capped, so
//! results are deterministic and independent of cache temperature. Flow
//! facts (`x is T`, `x != null`) are a separate channel — see
//! [`crate::flow`] — because they narrow without shadowing.

use crate::analyzer::{Analyzer, Ctx, Position};
use pkla_binder::ModuleId;
use pkla_common::limits::MAX_SCOPE_WALK_ITERATIONS;
use pkla_common::Atom;
use pkla_syntax::{NodeData, NodeId, SyntaxTree};
use rustc_hash::FxHashSet;
use tracing::trace;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResolveKind {
    Property,
    Method,
    Type,
}

/// Where along the walk a declaration was found.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScopeOrigin {
    LambdaParam,
    LetBinding,
    GeneratorBinding,
    ObjectBody,
    ClassBody,
    ModuleBody,
    Import,
    Supermodule,
    BaseModule,
    /// Found by falling back to the members of the implicit receiver.
    ImplicitThis,
}

/// A declaration delivered to a resolve visitor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeclarationRef {
    pub module: ModuleId,
    pub node: NodeId,
    pub name: Atom,
    pub kind: ResolveKind,
    pub origin: ScopeOrigin,
}

/// Pluggable resolution sink. Return `false` to stop the walk.
pub trait ResolveVisitor {
    fn visit(&mut self, decl: &DeclarationRef) -> bool;
}

/// Stops at the first declaration with the requested name.
pub struct FirstMatchVisitor {
    name: Atom,
    pub found: Option<DeclarationRef>,
}

impl FirstMatchVisitor {
    pub fn new(name: Atom) -> Self {
        Self { name, found: None }
    }
}

impl ResolveVisitor for FirstMatchVisitor {
    fn visit(&mut self, decl: &DeclarationRef) -> bool {
        if decl.name == self.name {
            self.found = Some(*decl);
            return false;
        }
        true
    }
}

/// Collects every visible declaration, delivering only the first occurrence
/// per `(name, kind)` — outer declarations shadowed by inner ones are
/// filtered, which is what completion wants.
pub struct CollectVisitor {
    seen: FxHashSet<(Atom, ResolveKind)>,
    pub collected: Vec<DeclarationRef>,
}

impl Default for CollectVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectVisitor {
    pub fn new() -> Self {
        Self {
            seen: FxHashSet::default(),
            collected: Vec::new(),
        }
    }
}

impl ResolveVisitor for CollectVisitor {
    fn visit(&mut self, decl: &DeclarationRef) -> bool {
        if self.seen.insert((decl.name, decl.kind)) {
            self.collected.push(*decl);
        }
        true
    }
}

impl Analyzer {
    /// Walk enclosing scopes from `position`, feeding declarations of
    /// `kind` to `visitor` in precedence order.
    pub fn resolve_with_visitor(
        &self,
        position: Position,
        kind: ResolveKind,
        visitor: &mut dyn ResolveVisitor,
        ctx: Ctx,
    ) {
        let Some(tree) = self.graph.tree(position.module) else {
            return;
        };
        let mut iterations = 0u32;
        let mut skip_next_object_body = false;
        let mut prev = position.node;
        // The starting node itself contributes no scope; its ancestors do.
        for current in tree.ancestors(position.node) {
            iterations += 1;
            if iterations > MAX_SCOPE_WALK_ITERATIONS {
                return;
            }
            let satisfied = !self.visit_scope(
                &tree,
                position.module,
                current,
                prev,
                kind,
                &mut skip_next_object_body,
                visitor,
                ctx,
            );
            if satisfied {
                return;
            }
            prev = current;
        }
    }

    /// Deliver the declarations one enclosing node contributes. Returns
    /// `false` when the visitor short-circuited.
    #[allow(clippy::too_many_arguments)]
    fn visit_scope(
        &self,
        tree: &SyntaxTree,
        module: ModuleId,
        current: NodeId,
        prev: NodeId,
        kind: ResolveKind,
        skip_next_object_body: &mut bool,
        visitor: &mut dyn ResolveVisitor,
        ctx: Ctx,
    ) -> bool {
        match tree.data(current) {
            NodeData::FunctionLiteral { params, body } => {
                if prev == *body && kind == ResolveKind::Property {
                    for &param in params {
                        if !self.offer_param(tree, module, param, ScopeOrigin::LambdaParam, visitor)
                        {
                            return false;
                        }
                    }
                }
                true
            }
            NodeData::LetExpr { param, body, .. } => {
                // The bound value never sees its own binding.
                if prev == *body && kind == ResolveKind::Property {
                    return self.offer_param(tree, module, *param, ScopeOrigin::LetBinding, visitor);
                }
                true
            }
            NodeData::ForGenerator {
                key_param,
                value_param,
                iterable,
                body,
            } => {
                if prev == *iterable {
                    // The iterable is evaluated outside the object scope the
                    // generator populates; seeing that scope would let the
                    // iterable reference members the generator itself is
                    // about to produce.
                    *skip_next_object_body = true;
                } else if prev == *body && kind == ResolveKind::Property {
                    if let Some(key) = key_param {
                        if !self.offer_param(
                            tree,
                            module,
                            *key,
                            ScopeOrigin::GeneratorBinding,
                            visitor,
                        ) {
                            return false;
                        }
                    }
                    return self.offer_param(
                        tree,
                        module,
                        *value_param,
                        ScopeOrigin::GeneratorBinding,
                        visitor,
                    );
                }
                true
            }
            NodeData::ObjectBody(body) => {
                if *skip_next_object_body {
                    *skip_next_object_body = false;
                    return true;
                }
                if kind == ResolveKind::Property {
                    for &param in &body.params {
                        if !self.offer_param(tree, module, param, ScopeOrigin::LambdaParam, visitor)
                        {
                            return false;
                        }
                    }
                }
                for &member in &body.members {
                    if !self.offer_member(tree, module, member, kind, ScopeOrigin::ObjectBody, visitor)
                    {
                        return false;
                    }
                }
                true
            }
            NodeData::Class(class) => {
                if kind == ResolveKind::Type {
                    for &tp in &class.type_params {
                        if !self.offer_type_param(tree, module, tp, visitor) {
                            return false;
                        }
                    }
                }
                for &member in &class.members {
                    if !self.offer_member(tree, module, member, kind, ScopeOrigin::ClassBody, visitor)
                    {
                        return false;
                    }
                }
                true
            }
            NodeData::Method(method) => {
                if kind == ResolveKind::Type {
                    for &tp in &method.type_params {
                        if !self.offer_type_param(tree, module, tp, visitor) {
                            return false;
                        }
                    }
                }
                if Some(prev) == method.body && kind == ResolveKind::Property {
                    for &param in &method.params {
                        if !self.offer_param(tree, module, param, ScopeOrigin::LambdaParam, visitor)
                        {
                            return false;
                        }
                    }
                }
                true
            }
            NodeData::Module(_) => self.visit_module_scope(module, kind, visitor, ctx),
            _ => true,
        }
    }

    fn visit_module_scope(
        &self,
        module: ModuleId,
        kind: ResolveKind,
        visitor: &mut dyn ResolveVisitor,
        ctx: Ctx,
    ) -> bool {
        let facts = self.graph.facts(module, ctx);
        // Own members first.
        if !self.offer_facts_tables(&facts, kind, ScopeOrigin::ModuleBody, visitor, true) {
            return false;
        }
        // Imports bind names usable as values and as type qualifiers.
        if matches!(kind, ResolveKind::Property | ResolveKind::Type) {
            for (index, import) in facts.imports.iter().enumerate() {
                let Some(decl) = self.import_declaration(module, ctx, index) else {
                    continue;
                };
                let decl = DeclarationRef { kind, ..decl };
                trace!(name = import.name.0, "offering import binding");
                if !visitor.visit(&decl) {
                    return false;
                }
            }
        }
        // Supermodule chain (inherited members not already shadowed — the
        // collect visitor handles shadowing; first-match stops earlier).
        if let Some(supermodule) = facts.supermodule {
            let super_facts = self.graph.facts(supermodule, ctx);
            if !self.offer_facts_tables(&super_facts, kind, ScopeOrigin::Supermodule, visitor, false)
            {
                return false;
            }
        }
        // The implicit base library, reachable like any other module.
        if let Some(base) = self.graph.base_module(ctx) {
            if base != module {
                let base_facts = self.graph.facts(base, ctx);
                if !self.offer_facts_tables(&base_facts, kind, ScopeOrigin::BaseModule, visitor, false)
                {
                    return false;
                }
            }
        }
        true
    }

    /// Offer one fact table's entries for `kind`. `own_only` distinguishes
    /// a module's own tables from the flattened inherited view.
    fn offer_facts_tables(
        &self,
        facts: &pkla_binder::ModuleFacts,
        kind: ResolveKind,
        origin: ScopeOrigin,
        visitor: &mut dyn ResolveVisitor,
        own_only: bool,
    ) -> bool {
        use pkla_binder::MemberKind;
        let (table, accept): (_, fn(MemberKind) -> bool) = match kind {
            ResolveKind::Property => (
                if own_only {
                    &facts.properties
                } else {
                    &facts.all_properties
                },
                |k| k == MemberKind::Property,
            ),
            ResolveKind::Method => (
                if own_only {
                    &facts.methods
                } else {
                    &facts.all_methods
                },
                |k| k == MemberKind::Method,
            ),
            ResolveKind::Type => (
                if own_only {
                    &facts.type_defs
                } else {
                    &facts.all_type_defs
                },
                |k| matches!(k, MemberKind::Class | MemberKind::TypeAlias),
            ),
        };
        for info in table.values() {
            if !accept(info.kind) {
                continue;
            }
            let decl = DeclarationRef {
                module: info.module,
                node: info.node,
                name: info.name,
                kind,
                origin,
            };
            if !visitor.visit(&decl) {
                return false;
            }
        }
        true
    }

    fn offer_param(
        &self,
        tree: &SyntaxTree,
        module: ModuleId,
        param: NodeId,
        origin: ScopeOrigin,
        visitor: &mut dyn ResolveVisitor,
    ) -> bool {
        let NodeData::Param(p) = tree.data(param) else {
            return true;
        };
        visitor.visit(&DeclarationRef {
            module,
            node: param,
            name: p.name,
            kind: ResolveKind::Property,
            origin,
        })
    }

    fn offer_type_param(
        &self,
        tree: &SyntaxTree,
        module: ModuleId,
        tp: NodeId,
        visitor: &mut dyn ResolveVisitor,
    ) -> bool {
        let NodeData::TypeParam(p) = tree.data(tp) else {
            return true;
        };
        visitor.visit(&DeclarationRef {
            module,
            node: tp,
            name: p.name,
            kind: ResolveKind::Type,
            origin: ScopeOrigin::ClassBody,
        })
    }

    fn offer_member(
        &self,
        tree: &SyntaxTree,
        module: ModuleId,
        member: NodeId,
        kind: ResolveKind,
        origin: ScopeOrigin,
        visitor: &mut dyn ResolveVisitor,
    ) -> bool {
        let (name, member_kind) = match tree.data(member) {
            NodeData::Property(p) => (p.name, ResolveKind::Property),
            NodeData::Method(m) => (m.name, ResolveKind::Method),
            NodeData::Class(c) => (c.name, ResolveKind::Type),
            NodeData::TypeAlias(a) => (a.name, ResolveKind::Type),
            _ => return true,
        };
        if member_kind != kind {
            return true;
        }
        visitor.visit(&DeclarationRef {
            module,
            node: member,
            name,
            kind,
            origin,
        })
    }

    /// Resolve a single name from a position: the lexical walk, then the
    /// implicit-this fallback for property/method lookups.
    pub fn resolve_first(
        &self,
        position: Position,
        name: Atom,
        kind: ResolveKind,
        ctx: Ctx,
    ) -> Option<DeclarationRef> {
        let mut visitor = FirstMatchVisitor::new(name);
        self.resolve_with_visitor(position, kind, &mut visitor, ctx);
        if visitor.found.is_some() {
            return visitor.found;
        }
        if kind != ResolveKind::Type {
            let this_ty = self.this_type_at(position, ctx);
            if let Some(decl) = self.member_decl_of_type(this_ty, name, kind, ctx) {
                return Some(DeclarationRef {
                    origin: ScopeOrigin::ImplicitThis,
                    ..decl
                });
            }
        }
        // Last resort for value positions: a bare class/alias reference
        // (`String`, `Foo.Bar` receivers).
        if kind == ResolveKind::Property {
            let mut visitor = FirstMatchVisitor::new(name);
            self.resolve_with_visitor(position, ResolveKind::Type, &mut visitor, ctx);
            if visitor.found.is_some() {
                return visitor.found;
            }
        }
        None
    }

    /// Every declaration visible at a position (shadowed outer entries
    /// filtered) — the completion feed.
    pub fn collect_visible(&self, position: Position, kind: ResolveKind, ctx: Ctx) -> Vec<DeclarationRef> {
        let mut visitor = CollectVisitor::new();
        self.resolve_with_visitor(position, kind, &mut visitor, ctx);
        visitor.collected
    }

    /// The declaration ref backing an import binding.
    pub(crate) fn import_declaration(
        &self,
        module: ModuleId,
        ctx: Ctx,
        index: usize,
    ) -> Option<DeclarationRef> {
        let facts = self.graph.facts(module, ctx);
        let import = facts.imports.get(index)?;
        let tree = self.graph.tree(module)?;
        let import_node = match tree.data(tree.root()) {
            NodeData::Module(m) => m.imports.get(index).copied()?,
            _ => return None,
        };
        Some(DeclarationRef {
            module,
            node: import_node,
            name: import.name,
            kind: ResolveKind::Property,
            origin: ScopeOrigin::Import,
        })
    }
}
