//! The diagnostic pass.
//!
//! Walks a module tree and reports the error taxonomy: unresolved
//! references (severity depends on whether the receiver is open or
//! closed), type mismatches (hard when no common subtype exists, weak when
//! a runtime narrowing could still succeed), provably-false constraint
//! violations, cyclic declarations, invalid amendments/instantiations,
//! const/fixed rule violations and missing inherited required properties.
//!
//! Everything here *reports*; nothing throws. Queries that cannot decide
//! stay silent.

use crate::analyzer::{Analyzer, Ctx, Position};
use crate::resolver::{ResolveKind, ScopeOrigin};
use pkla_binder::ModuleId;
use pkla_common::diagnostics::{codes, Diagnostic};
use pkla_common::limits::MAX_ALIAS_RESOLUTION_DEPTH;
use pkla_common::Atom;
use pkla_solver::{
    evaluate_constraint, ConstValue, ConstraintVerdict, TypeData, TypeId,
};
use pkla_syntax::{Modifiers, ModuleClauseKind, NodeData, NodeId, SyntaxTree};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

impl Analyzer {
    /// Full diagnostic sweep over one module.
    pub fn check_module(&self, module: ModuleId, ctx: Ctx) -> Vec<Diagnostic> {
        let Some(tree) = self.graph.tree(module) else {
            return Vec::new();
        };
        let uri = self
            .graph
            .uri(module)
            .unwrap_or_else(|| "".into())
            .to_string();
        let facts = self.graph.facts(module, ctx);
        let mut out: Vec<Diagnostic> = facts.diagnostics.clone();

        // Missing inherited required properties: a module that amends a
        // parent instantiates it, so every typed defaultless inherited
        // property needs a definition.
        if facts.clause_kind == Some(ModuleClauseKind::Amends) {
            for info in facts.effective_parent_properties.values() {
                out.push(Diagnostic::new(
                    codes::MISSING_PARENT_PROPERTY,
                    &uri,
                    tree.span(tree.root()),
                    &[&self.strings.resolve(info.name)],
                ));
            }
        }

        // Type alias cycles.
        for info in facts.type_defs.values() {
            if info.kind == pkla_binder::MemberKind::TypeAlias {
                self.check_alias_cycle(&tree, module, info.node, info.name, &uri, ctx, &mut out);
            }
        }

        self.check_node(&tree, module, tree.root(), &uri, ctx, false, &mut out);
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn check_node(
        &self,
        tree: &SyntaxTree,
        module: ModuleId,
        node: NodeId,
        uri: &str,
        ctx: Ctx,
        in_const: bool,
        out: &mut Vec<Diagnostic>,
    ) {
        let mut child_in_const = in_const;
        match tree.data(node) {
            // Constraint expressions evaluate against the candidate value,
            // not the lexical scope; their names are checked by the
            // constraint evaluator instead.
            NodeData::ConstrainedType { base, .. } => {
                self.check_node(tree, module, *base, uri, ctx, in_const, out);
                return;
            }
            NodeData::Property(property) => {
                if property.modifiers.contains(Modifiers::CONST) {
                    child_in_const = true;
                }
                self.check_property(tree, module, node, property, uri, ctx, out);
            }
            NodeData::NewExpr { ty: Some(ty), .. } => {
                let lowered = self.lower_type_node(module, *ty, ctx);
                if !self.db().is_instantiable(lowered) {
                    out.push(Diagnostic::new(
                        codes::INVALID_INSTANTIATION,
                        uri,
                        tree.span(node),
                        &[&self.render(lowered)],
                    ));
                }
            }
            NodeData::AmendExpr { parent, .. } => {
                let parent_ty = self.type_of_expr(Position::new(module, *parent), ctx);
                if !self.db().is_amendable(parent_ty) {
                    out.push(Diagnostic::new(
                        codes::INVALID_AMENDMENT,
                        uri,
                        tree.span(node),
                        &[&self.render(parent_ty)],
                    ));
                }
            }
            NodeData::UnqualifiedAccess { name, args } => {
                self.check_unqualified_access(tree, module, node, *name, args.is_some(), uri, ctx, in_const, out);
            }
            NodeData::QualifiedAccess {
                receiver,
                name,
                args,
                ..
            } => {
                self.check_qualified_access(
                    tree, module, node, *receiver, *name, args.is_some(), uri, ctx, out,
                );
            }
            _ => {}
        }
        for child in tree.children(node) {
            self.check_node(tree, module, child, uri, ctx, child_in_const, out);
        }
    }

    fn check_property(
        &self,
        tree: &SyntaxTree,
        module: ModuleId,
        node: NodeId,
        property: &pkla_syntax::PropertyDecl,
        uri: &str,
        ctx: Ctx,
        out: &mut Vec<Diagnostic>,
    ) {
        // Fixed properties cannot be overridden by amendment.
        if let Some(overridden) = self.overridden_member_modifiers(tree, module, node, property, ctx)
        {
            if overridden.contains(Modifiers::FIXED)
                && !property.modifiers.contains(Modifiers::FIXED)
            {
                out.push(Diagnostic::new(
                    codes::FIXED_PROPERTY_OVERRIDE,
                    uri,
                    tree.span(node),
                    &[&self.strings.resolve(property.name)],
                ));
            }
        }
        let Some(value) = property.value else {
            return;
        };
        let expected = self.property_declared_type(module, node, ctx, 0);
        self.check_assignment(module, value, expected, uri, ctx, out);
    }

    /// Modifiers of the member this property overrides, if any.
    fn overridden_member_modifiers(
        &self,
        tree: &SyntaxTree,
        module: ModuleId,
        node: NodeId,
        property: &pkla_syntax::PropertyDecl,
        ctx: Ctx,
    ) -> Option<Modifiers> {
        let parent = tree.parent(node)?;
        match tree.data(parent) {
            NodeData::Module(_) => {
                let facts = self.graph.facts(module, ctx);
                let supermodule = facts.supermodule?;
                let super_facts = self.graph.facts(supermodule, ctx);
                super_facts
                    .all_properties
                    .get(&property.name)
                    .map(|info| info.modifiers)
            }
            NodeData::ObjectBody(_) => {
                let amended = self.this_type_at(Position::new(module, parent), ctx);
                let decl =
                    self.member_decl_of_type(amended, property.name, ResolveKind::Property, ctx)?;
                let decl_tree = self.graph.tree(decl.module)?;
                match decl_tree.data(decl.node) {
                    NodeData::Property(p) => Some(p.modifiers),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Assignment compatibility with Pkl's union/constraint semantics.
    ///
    /// The pass walks the expected type's alternatives. An alternative
    /// whose nominal check and constraints both pass accepts the value and
    /// clears any collected failures. When an alternative passes nominally
    /// but fails a constraint, *its* failures replace the previously
    /// tracked ones — the last tracked alternative's constraint text is
    /// what the diagnostic reports. Only when no alternative accepts does
    /// a diagnostic surface.
    pub fn check_assignment(
        &self,
        module: ModuleId,
        value: NodeId,
        expected: TypeId,
        uri: &str,
        ctx: Ctx,
        out: &mut Vec<Diagnostic>,
    ) {
        if expected == TypeId::UNKNOWN {
            return;
        }
        let Some(tree) = self.graph.tree(module) else {
            return;
        };
        let actual = self.type_of_expr(Position::new(module, value), ctx);
        if actual == TypeId::UNKNOWN {
            return;
        }
        let db = self.db();
        let alternatives: SmallVec<[TypeId; 4]> = match db.lookup(expected) {
            Some(TypeData::Union { members }) => {
                self.types.type_list(members).iter().copied().collect()
            }
            _ => SmallVec::from_slice(&[expected]),
        };
        let candidate = self.const_eval(Position::new(module, value), ctx);

        let mut tracked_failures: Vec<Atom> = Vec::new();
        let mut any_nominal_ok = false;
        for &alt in &alternatives {
            let stripped = self.strip_constraints(alt);
            if !self.is_subtype(actual, stripped) {
                continue;
            }
            any_nominal_ok = true;
            let violated = self.violated_constraints(alt, &candidate);
            if violated.is_empty() {
                return;
            }
            // Switching which alternative is tracked as "the" failing one
            // clears previously collected failures.
            tracked_failures = violated;
        }
        let span = tree.span(value);
        if any_nominal_ok {
            let rendered: Vec<String> = tracked_failures
                .iter()
                .map(|&s| self.strings.resolve(s).to_string())
                .collect();
            out.push(Diagnostic::new(
                codes::CONSTRAINT_VIOLATION,
                uri,
                span,
                &[&rendered.join(", ")],
            ));
        } else {
            let code = if pkla_solver::has_common_subtype_with(db, actual, expected) {
                codes::TYPE_MISMATCH_WEAK
            } else {
                codes::TYPE_MISMATCH
            };
            out.push(Diagnostic::new(
                code,
                uri,
                span,
                &[&self.render(expected), &self.render(actual)],
            ));
        }
    }

    /// Unfold aliases and strip constraint layers, bounded.
    fn strip_constraints(&self, ty: TypeId) -> TypeId {
        let db = self.db();
        let mut current = ty;
        for _ in 0..MAX_ALIAS_RESOLUTION_DEPTH {
            match db.lookup(current) {
                Some(TypeData::Constrained { base, .. }) => current = base,
                Some(TypeData::Alias { .. }) => match db.unfold_alias(current) {
                    Some(unfolded) if unfolded != current => current = unfolded,
                    _ => return current,
                },
                _ => return current,
            }
        }
        current
    }

    /// Constraint sources provably violated by the candidate, walking every
    /// `Constrained` layer of `ty` (aliases included).
    fn violated_constraints(&self, ty: TypeId, candidate: &ConstValue) -> Vec<Atom> {
        let db = self.db();
        let mut violated = Vec::new();
        let mut current = ty;
        for _ in 0..MAX_ALIAS_RESOLUTION_DEPTH {
            match db.lookup(current) {
                Some(TypeData::Constrained { base, constraints }) => {
                    for &c in self.types.constraint_list(constraints).iter() {
                        let Some(info) = self.types.constraint(c) else {
                            continue;
                        };
                        if evaluate_constraint(&info.expr, candidate, &self.strings)
                            == ConstraintVerdict::Violated
                        {
                            violated.push(info.source);
                        }
                    }
                    current = base;
                }
                Some(TypeData::Alias { .. }) => match db.unfold_alias(current) {
                    Some(unfolded) if unfolded != current => current = unfolded,
                    _ => break,
                },
                _ => break,
            }
        }
        violated
    }

    #[allow(clippy::too_many_arguments)]
    fn check_unqualified_access(
        &self,
        tree: &SyntaxTree,
        module: ModuleId,
        node: NodeId,
        name: Atom,
        is_call: bool,
        uri: &str,
        ctx: Ctx,
        in_const: bool,
        out: &mut Vec<Diagnostic>,
    ) {
        let kind = if is_call {
            ResolveKind::Method
        } else {
            ResolveKind::Property
        };
        let position = Position::new(module, node);
        match self.resolve_first(position, name, kind, ctx) {
            Some(decl) => {
                if in_const
                    && self.options.check_const_rules
                    && !self.is_const_safe_reference(&decl)
                {
                    out.push(Diagnostic::new(
                        codes::CONST_REFERENCE_VIOLATION,
                        uri,
                        tree.span(node),
                        &[&self.strings.resolve(name)],
                    ));
                }
            }
            None => {
                let this_ty = self.this_type_at(position, ctx);
                let open = self.is_open_receiver(this_ty);
                if open && !self.options.report_dynamic_member_warnings {
                    return;
                }
                let code = if open {
                    codes::UNRESOLVED_REFERENCE_DYNAMIC
                } else {
                    codes::UNRESOLVED_REFERENCE
                };
                let what = if is_call { "method" } else { "property" };
                out.push(Diagnostic::new(
                    code,
                    uri,
                    tree.span(node),
                    &[what, &self.strings.resolve(name)],
                ));
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn check_qualified_access(
        &self,
        tree: &SyntaxTree,
        module: ModuleId,
        node: NodeId,
        receiver: NodeId,
        name: Atom,
        is_call: bool,
        uri: &str,
        ctx: Ctx,
        out: &mut Vec<Diagnostic>,
    ) {
        let receiver_ty = self.type_of_expr(Position::new(module, receiver), ctx);
        if receiver_ty == TypeId::UNKNOWN {
            return;
        }
        let receiver_ty = self.db().non_null(receiver_ty);
        let kind = if is_call {
            ResolveKind::Method
        } else {
            ResolveKind::Property
        };
        if self
            .member_type_of(receiver_ty, name, kind, ctx, 0)
            .is_some()
        {
            return;
        }
        let open = self.is_open_receiver(receiver_ty);
        if open && !self.options.report_dynamic_member_warnings {
            return;
        }
        let code = if open {
            codes::UNRESOLVED_REFERENCE_DYNAMIC
        } else {
            codes::UNRESOLVED_REFERENCE
        };
        let what = if is_call { "method" } else { "property" };
        out.push(Diagnostic::new(
            code,
            uri,
            tree.span(node),
            &[what, &self.strings.resolve(name)],
        ));
    }

    /// Open receivers may legitimately gain members at runtime.
    fn is_open_receiver(&self, ty: TypeId) -> bool {
        let db = self.db();
        if ty == TypeId::UNKNOWN {
            return true;
        }
        match db.lookup(ty) {
            Some(TypeData::Class { def, .. }) => db.is_dynamic_def(def),
            Some(TypeData::Union { members }) => self
                .types
                .type_list(members)
                .iter()
                .any(|&m| self.is_open_receiver(m)),
            _ => false,
        }
    }

    /// Whether a resolved reference is legal from a const context: local
    /// bindings are, and so are members themselves marked const.
    fn is_const_safe_reference(&self, decl: &crate::resolver::DeclarationRef) -> bool {
        match decl.origin {
            ScopeOrigin::LambdaParam
            | ScopeOrigin::LetBinding
            | ScopeOrigin::GeneratorBinding
            | ScopeOrigin::Import => true,
            _ => {
                let Some(tree) = self.graph.tree(decl.module) else {
                    return true;
                };
                let modifiers = match tree.data(decl.node) {
                    NodeData::Property(p) => p.modifiers,
                    NodeData::Method(m) => m.modifiers,
                    NodeData::Param(_) => return true,
                    _ => return true,
                };
                modifiers.contains(Modifiers::CONST) || modifiers.contains(Modifiers::LOCAL)
            }
        }
    }

    /// Detect `typealias Loop = Loop`-style cycles by following the unfold
    /// chain with a visited set.
    #[allow(clippy::too_many_arguments)]
    fn check_alias_cycle(
        &self,
        tree: &SyntaxTree,
        module: ModuleId,
        node: NodeId,
        name: Atom,
        uri: &str,
        ctx: Ctx,
        out: &mut Vec<Diagnostic>,
    ) {
        let def = self.lower_def(module, node, ctx);
        if !def.is_valid() {
            return;
        }
        let db = self.db();
        let start = self.types.alias(def, &[]);
        let mut visited: FxHashSet<TypeId> = FxHashSet::default();
        visited.insert(start);
        let mut current = start;
        for _ in 0..MAX_ALIAS_RESOLUTION_DEPTH {
            let Some(TypeData::Alias { .. }) = db.lookup(current) else {
                return;
            };
            let Some(next) = db.unfold_alias(current) else {
                return;
            };
            if !visited.insert(next) {
                out.push(Diagnostic::new(
                    codes::CYCLIC_DECLARATION,
                    uri,
                    tree.span(node),
                    &[&self.strings.resolve(name)],
                ));
                return;
            }
            current = next;
        }
    }
}
