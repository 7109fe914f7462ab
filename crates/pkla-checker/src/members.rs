//! Member lookup on types.
//!
//! Given a receiver type, find a named member's declaration or compute its
//! type. Class lookups walk the single-inheritance chain accumulating
//! type-argument bindings; module lookups go through the binder's flattened
//! fact tables; the synthetic builtin classes answer from a small table
//! (the members the constraint evaluator also understands).

use crate::analyzer::{Analyzer, Ctx};
use crate::resolver::{DeclarationRef, ResolveKind, ScopeOrigin};
use pkla_common::limits::MAX_SUPERCLASS_CHAIN;
use pkla_common::Atom;
use pkla_solver::{bindings_for, substitute, DefId, TypeData, TypeId, TypeParameterBindings};
use pkla_syntax::NodeData;

impl Analyzer {
    /// Find the declaration of `name` among the members of `ty`.
    pub(crate) fn member_decl_of_type(
        &self,
        ty: TypeId,
        name: Atom,
        kind: ResolveKind,
        ctx: Ctx,
    ) -> Option<DeclarationRef> {
        self.member_decl_at(ty, name, kind, ctx, 0)
    }

    fn member_decl_at(
        &self,
        ty: TypeId,
        name: Atom,
        kind: ResolveKind,
        ctx: Ctx,
        depth: u32,
    ) -> Option<DeclarationRef> {
        if depth > MAX_SUPERCLASS_CHAIN {
            return None;
        }
        let db = self.db();
        match db.lookup(ty)? {
            TypeData::Module { def } => {
                let (module, _) = self.defs.lookup(def)?.source?;
                let facts = self.graph.facts(module, ctx);
                let info = match kind {
                    ResolveKind::Property => facts.all_properties.get(&name),
                    ResolveKind::Method => facts.all_methods.get(&name),
                    ResolveKind::Type => facts.all_type_defs.get(&name),
                }?;
                Some(DeclarationRef {
                    module: info.module,
                    node: info.node,
                    name,
                    kind,
                    origin: ScopeOrigin::ImplicitThis,
                })
            }
            TypeData::Class { def, .. } => self.class_member_decl(def, name, kind, ctx, depth),
            TypeData::StringLiteral { .. } => {
                self.class_member_decl(self.builtins.string, name, kind, ctx, depth)
            }
            TypeData::Alias { .. } => {
                let unfolded = db.unfold_alias(ty)?;
                if unfolded == ty {
                    return None;
                }
                self.member_decl_at(unfolded, name, kind, ctx, depth + 1)
            }
            TypeData::Constrained { base, .. } => {
                self.member_decl_at(base, name, kind, ctx, depth + 1)
            }
            TypeData::Union { members } => {
                let members = self.types.type_list(members);
                members
                    .iter()
                    .find_map(|&m| self.member_decl_at(m, name, kind, ctx, depth + 1))
            }
            _ => None,
        }
    }

    fn class_member_decl(
        &self,
        def: DefId,
        name: Atom,
        kind: ResolveKind,
        _ctx: Ctx,
        _depth: u32,
    ) -> Option<DeclarationRef> {
        let mut current = def;
        for _ in 0..MAX_SUPERCLASS_CHAIN {
            let info = self.defs.lookup(current)?;
            if let Some((module, node)) = info.source {
                if let Some(tree) = self.graph.tree(module) {
                    if let NodeData::Class(class) = tree.data(node) {
                        for &member in &class.members {
                            let (member_name, member_kind) = match tree.data(member) {
                                NodeData::Property(p) => (p.name, ResolveKind::Property),
                                NodeData::Method(m) => (m.name, ResolveKind::Method),
                                _ => continue,
                            };
                            if member_name == name && member_kind == kind {
                                return Some(DeclarationRef {
                                    module,
                                    node: member,
                                    name,
                                    kind,
                                    origin: ScopeOrigin::ImplicitThis,
                                });
                            }
                        }
                    }
                }
            }
            let supertype = info.supertype?;
            match self.db().lookup(supertype)? {
                TypeData::Class { def, .. } => current = def,
                _ => return None,
            }
        }
        None
    }

    /// The type of member `name` on receiver type `ty`, with the
    /// receiver's type arguments substituted in.
    pub(crate) fn member_type_of(
        &self,
        ty: TypeId,
        name: Atom,
        kind: ResolveKind,
        ctx: Ctx,
        depth: u32,
    ) -> Option<TypeId> {
        if depth > MAX_SUPERCLASS_CHAIN {
            return None;
        }
        let db = self.db();
        if ty == TypeId::UNKNOWN {
            return Some(TypeId::UNKNOWN);
        }
        match db.lookup(ty)? {
            TypeData::Module { def } => {
                let (module, _) = self.defs.lookup(def)?.source?;
                let facts = self.graph.facts(module, ctx);
                let info = match kind {
                    ResolveKind::Property => facts.all_properties.get(&name),
                    ResolveKind::Method => facts.all_methods.get(&name),
                    ResolveKind::Type => facts.all_type_defs.get(&name),
                }?;
                let decl = DeclarationRef {
                    module: info.module,
                    node: info.node,
                    name,
                    kind,
                    origin: ScopeOrigin::ImplicitThis,
                };
                Some(self.declaration_type(&decl, ctx, depth + 1))
            }
            TypeData::Class { def, args } => {
                // Dynamic objects may gain members at runtime.
                if db.is_dynamic_def(def) {
                    return Some(TypeId::UNKNOWN);
                }
                self.class_member_type(def, args, name, kind, ctx, depth)
            }
            TypeData::StringLiteral { .. } => self.builtin_member_type(self.builtins.string, name),
            TypeData::Alias { .. } => {
                let unfolded = db.unfold_alias(ty)?;
                if unfolded == ty {
                    return None;
                }
                self.member_type_of(unfolded, name, kind, ctx, depth + 1)
            }
            TypeData::Constrained { base, .. } => {
                self.member_type_of(base, name, kind, ctx, depth + 1)
            }
            TypeData::Union { members } => {
                let members = self.types.type_list(members);
                let found: Vec<TypeId> = members
                    .iter()
                    .filter_map(|&m| self.member_type_of(m, name, kind, ctx, depth + 1))
                    .collect();
                if found.is_empty() {
                    None
                } else {
                    Some(db.union(found))
                }
            }
            _ => None,
        }
    }

    fn class_member_type(
        &self,
        def: DefId,
        args: pkla_solver::TypeListId,
        name: Atom,
        kind: ResolveKind,
        ctx: Ctx,
        depth: u32,
    ) -> Option<TypeId> {
        let mut current = def;
        let mut current_args: Vec<TypeId> = self.types.type_list(args).to_vec();
        for _ in 0..MAX_SUPERCLASS_CHAIN {
            let info = self.defs.lookup(current)?;
            let bindings = bindings_for(&info.type_params, &current_args);
            if let Some((module, node)) = info.source {
                if let Some(found) =
                    self.own_class_member_type(module, node, name, kind, &bindings, ctx, depth)
                {
                    return Some(found);
                }
            } else if let Some(found) = self.builtin_member_type(current, name) {
                return Some(found);
            }
            let supertype = info.supertype?;
            let substituted = substitute(self.db(), supertype, &bindings);
            match self.db().lookup(substituted)? {
                TypeData::Class { def, args } => {
                    current = def;
                    current_args = self.types.type_list(args).to_vec();
                }
                _ => return None,
            }
        }
        None
    }

    fn own_class_member_type(
        &self,
        module: pkla_binder::ModuleId,
        node: pkla_syntax::NodeId,
        name: Atom,
        kind: ResolveKind,
        bindings: &TypeParameterBindings,
        ctx: Ctx,
        depth: u32,
    ) -> Option<TypeId> {
        let tree = self.graph.tree(module)?;
        let NodeData::Class(class) = tree.data(node) else {
            return None;
        };
        for &member in &class.members {
            let (member_name, member_kind) = match tree.data(member) {
                NodeData::Property(p) => (p.name, ResolveKind::Property),
                NodeData::Method(m) => (m.name, ResolveKind::Method),
                _ => continue,
            };
            if member_name != name || member_kind != kind {
                continue;
            }
            let decl = DeclarationRef {
                module,
                node: member,
                name,
                kind,
                origin: ScopeOrigin::ImplicitThis,
            };
            let raw = self.declaration_type(&decl, ctx, depth + 1);
            return Some(substitute(self.db(), raw, bindings));
        }
        None
    }

    /// Every member of a receiver type, for completion at a `receiver.`
    /// position. `hidden` members are excluded (they exist for computation,
    /// not for output or completion); nearer declarations shadow inherited
    /// ones of the same name.
    pub fn collect_members(
        &self,
        ty: TypeId,
        kind: ResolveKind,
        ctx: Ctx,
    ) -> Vec<DeclarationRef> {
        let mut out = Vec::new();
        let mut seen: rustc_hash::FxHashSet<Atom> = rustc_hash::FxHashSet::default();
        self.collect_members_at(ty, kind, ctx, 0, &mut seen, &mut out);
        out
    }

    fn collect_members_at(
        &self,
        ty: TypeId,
        kind: ResolveKind,
        ctx: Ctx,
        depth: u32,
        seen: &mut rustc_hash::FxHashSet<Atom>,
        out: &mut Vec<DeclarationRef>,
    ) {
        if depth > MAX_SUPERCLASS_CHAIN {
            return;
        }
        let db = self.db();
        match db.lookup(ty) {
            Some(TypeData::Module { def }) => {
                let Some((module, _)) = self.defs.lookup(def).and_then(|d| d.source) else {
                    return;
                };
                let facts = self.graph.facts(module, ctx);
                let table = match kind {
                    ResolveKind::Property => &facts.all_properties,
                    ResolveKind::Method => &facts.all_methods,
                    ResolveKind::Type => &facts.all_type_defs,
                };
                for info in table.values() {
                    if info.modifiers.contains(pkla_syntax::Modifiers::HIDDEN)
                        || info.modifiers.contains(pkla_syntax::Modifiers::LOCAL)
                    {
                        continue;
                    }
                    if seen.insert(info.name) {
                        out.push(DeclarationRef {
                            module: info.module,
                            node: info.node,
                            name: info.name,
                            kind,
                            origin: ScopeOrigin::ImplicitThis,
                        });
                    }
                }
            }
            Some(TypeData::Class { def, .. }) => {
                let mut current = def;
                for _ in 0..MAX_SUPERCLASS_CHAIN {
                    let Some(info) = self.defs.lookup(current) else {
                        return;
                    };
                    if let Some((module, node)) = info.source {
                        if let Some(tree) = self.graph.tree(module) {
                            if let pkla_syntax::NodeData::Class(class) = tree.data(node) {
                                for &member in &class.members {
                                    let (name, member_kind, modifiers) = match tree.data(member) {
                                        NodeData::Property(p) => {
                                            (p.name, ResolveKind::Property, p.modifiers)
                                        }
                                        NodeData::Method(m) => {
                                            (m.name, ResolveKind::Method, m.modifiers)
                                        }
                                        _ => continue,
                                    };
                                    if member_kind != kind
                                        || modifiers.contains(pkla_syntax::Modifiers::HIDDEN)
                                        || modifiers.contains(pkla_syntax::Modifiers::LOCAL)
                                    {
                                        continue;
                                    }
                                    if seen.insert(name) {
                                        out.push(DeclarationRef {
                                            module,
                                            node: member,
                                            name,
                                            kind,
                                            origin: ScopeOrigin::ImplicitThis,
                                        });
                                    }
                                }
                            }
                        }
                    }
                    match info.supertype.and_then(|s| db.lookup(s)) {
                        Some(TypeData::Class { def, .. }) => current = def,
                        _ => return,
                    }
                }
            }
            Some(TypeData::Alias { .. }) => {
                if let Some(unfolded) = db.unfold_alias(ty) {
                    if unfolded != ty {
                        self.collect_members_at(unfolded, kind, ctx, depth + 1, seen, out);
                    }
                }
            }
            Some(TypeData::Constrained { base, .. }) => {
                self.collect_members_at(base, kind, ctx, depth + 1, seen, out);
            }
            Some(TypeData::Union { members }) => {
                for &member in self.types.type_list(members).iter() {
                    self.collect_members_at(member, kind, ctx, depth + 1, seen, out);
                }
            }
            _ => {}
        }
    }

    /// Members of the synthetic builtin classes — the same surface the
    /// constraint evaluator folds.
    pub(crate) fn builtin_member_type(&self, def: DefId, name: Atom) -> Option<TypeId> {
        let db = self.db();
        let b = self.builtins;
        let name = self.strings.resolve(name);
        let ty = if def == b.string {
            match &*name {
                "length" => db.int_type(),
                "isEmpty" | "isBlank" => db.boolean_type(),
                "isRegex" => db.boolean_type(),
                _ => return None,
            }
        } else if def == b.int || def == b.float || def == b.number {
            match &*name {
                "isPositive" | "isNonZero" => db.boolean_type(),
                "isEven" | "isOdd" if def == b.int => db.boolean_type(),
                "isFinite" if def != b.int => db.boolean_type(),
                _ => return None,
            }
        } else if def == b.list || def == b.set || def == b.collection || def == b.listing {
            match &*name {
                "length" => db.int_type(),
                "isEmpty" => db.boolean_type(),
                _ => return None,
            }
        } else if def == b.map || def == b.mapping {
            match &*name {
                "length" => db.int_type(),
                "isEmpty" => db.boolean_type(),
                _ => return None,
            }
        } else {
            return None;
        };
        Some(ty)
    }
}
