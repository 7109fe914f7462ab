//! Lowering syntax declarations and type annotations into the solver.
//!
//! Declarations lower to [`DefId`]s (memoized per `(module, node, context)`
//! so type identity is stable), type annotation nodes lower to interned
//! `TypeId`s, and constraint expressions lower to the solver's decidable
//! [`ConstraintExpr`] IR — anything outside the subset becomes
//! `ConstraintExpr::Opaque` and stays a runtime check.
//!
//! Name resolution and lowering are mutually recursive (a supertype
//! annotation resolves through scopes that contain the classes being
//! lowered); an in-progress marker per declaration breaks self-referential
//! cycles by degrading to `unknown`.

use crate::analyzer::{Analyzer, Ctx, Position};
use crate::resolver::ResolveKind;
use pkla_binder::{MemberKind, ModuleId};
use pkla_common::Atom;
use pkla_solver::{
    CompareOp, ConstLiteral, ConstraintExpr, ConstraintId, ConstraintInfo, DefId, DefinitionInfo,
    FloatBits, TypeId,
};
use pkla_syntax::{BinaryOperator, NodeData, NodeId, SyntaxTree, UnaryOperator};

impl Analyzer {
    // -------------------------------------------------------------------------
    // Definitions
    // -------------------------------------------------------------------------

    /// The definition id of a class, type alias or type parameter
    /// declaration node. Memoized; self-referential declarations yield a
    /// definition whose body/supertype degraded to `unknown`.
    pub fn lower_def(&self, module: ModuleId, node: NodeId, ctx: Ctx) -> DefId {
        let key = (module, node, ctx);
        if let Some(existing) = self.def_cache.get(&key) {
            return *existing;
        }
        let Some(tree) = self.graph.tree(module) else {
            return DefId::INVALID;
        };
        // Module roots have their own entry point (and marker key).
        if matches!(tree.data(node), NodeData::Module(_)) {
            return self.lower_module_def(module, ctx);
        }
        if self.lowering.insert(key, ()).is_some() {
            // Already lowering this declaration further up the stack: a
            // declaration cycle. The first frame completes the definition.
            return DefId::INVALID;
        }
        let def = self.lower_def_uncached(&tree, module, node, ctx);
        self.lowering.remove(&key);
        *self.def_cache.entry(key).or_insert(def)
    }

    fn lower_def_uncached(
        &self,
        tree: &SyntaxTree,
        module: ModuleId,
        node: NodeId,
        ctx: Ctx,
    ) -> DefId {
        match tree.data(node) {
            NodeData::Class(class) => {
                let type_params: Vec<DefId> = class
                    .type_params
                    .iter()
                    .map(|&tp| self.lower_def(module, tp, ctx))
                    .collect();
                let def = self.defs.alloc(
                    DefinitionInfo::class(class.name)
                        .with_modifiers(class.modifiers)
                        .with_type_params(type_params)
                        .with_source(module, node),
                );
                // Register before lowering the supertype so self references
                // inside it resolve to this definition.
                self.def_cache.insert((module, node, ctx), def);
                let supertype = match class.supertype {
                    Some(ann) => self.lower_type_node(module, ann, ctx),
                    // Classes without an extends clause are Typed.
                    None => self.types.class0(self.builtins.typed),
                };
                self.defs.set_supertype(def, supertype);
                def
            }
            NodeData::TypeAlias(alias) => {
                let type_params: Vec<DefId> = alias
                    .type_params
                    .iter()
                    .map(|&tp| self.lower_def(module, tp, ctx))
                    .collect();
                let def = self.defs.alloc(
                    DefinitionInfo::type_alias(alias.name)
                        .with_modifiers(alias.modifiers)
                        .with_type_params(type_params)
                        .with_source(module, node),
                );
                self.def_cache.insert((module, node, ctx), def);
                let body = self.lower_type_node(module, alias.body, ctx);
                self.defs.set_alias_body(def, body);
                def
            }
            NodeData::TypeParam(param) => self.defs.alloc(
                DefinitionInfo::type_param(param.name, param.variance).with_source(module, node),
            ),
            _ => DefId::INVALID,
        }
    }

    /// The definition id of a module (its root node).
    pub fn lower_module_def(&self, module: ModuleId, ctx: Ctx) -> DefId {
        let Some(tree) = self.graph.tree(module) else {
            return DefId::INVALID;
        };
        let root = tree.root();
        let key = (module, root, ctx);
        if let Some(existing) = self.def_cache.get(&key) {
            return *existing;
        }
        if self.lowering.insert(key, ()).is_some() {
            return DefId::INVALID;
        }
        let name = match tree.data(root) {
            NodeData::Module(m) => m.name.unwrap_or_else(|| self.module_stem(module)),
            _ => Atom::EMPTY,
        };
        let def = self.defs.alloc(DefinitionInfo::module(name).with_source(module, root));
        self.def_cache.insert(key, def);
        // Supermodule chain: cycle-checked by the binder; a cycle surfaces
        // there as a diagnostic and here as a missing supertype.
        let facts = self.graph.facts(module, ctx);
        if let Some(supermodule) = facts.supermodule {
            let super_def = self.lower_module_def(supermodule, ctx);
            if super_def.is_valid() {
                self.defs
                    .set_supertype(def, self.types.module(super_def));
            }
        }
        self.lowering.remove(&key);
        def
    }

    fn module_stem(&self, module: ModuleId) -> Atom {
        let uri = self.graph.uri(module).unwrap_or_else(|| "".into());
        let stem = uri
            .rsplit('/')
            .next()
            .unwrap_or(&uri)
            .trim_end_matches(".pkl");
        self.strings.intern(stem)
    }

    /// The module type of a module.
    pub fn module_type(&self, module: ModuleId, ctx: Ctx) -> TypeId {
        let def = self.lower_module_def(module, ctx);
        if def.is_valid() {
            self.types.module(def)
        } else {
            TypeId::UNKNOWN
        }
    }

    // -------------------------------------------------------------------------
    // Type annotations
    // -------------------------------------------------------------------------

    /// Lower a type annotation node to an interned type. Total: dangling
    /// names yield `unknown`.
    pub fn lower_type_node(&self, module: ModuleId, node: NodeId, ctx: Ctx) -> TypeId {
        let key = (module, node, ctx);
        if let Some(cached) = self.type_cache.get(&key) {
            return *cached;
        }
        let lowered = self.lower_type_node_uncached(module, node, ctx);
        *self.type_cache.entry(key).or_insert(lowered)
    }

    fn lower_type_node_uncached(&self, module: ModuleId, node: NodeId, ctx: Ctx) -> TypeId {
        let Some(tree) = self.graph.tree(module) else {
            return TypeId::UNKNOWN;
        };
        match tree.data(node) {
            NodeData::UnknownType => TypeId::UNKNOWN,
            NodeData::NothingType => TypeId::NOTHING,
            NodeData::ModuleType => self.module_type(module, ctx),
            NodeData::StringLiteralType(value) => self.types.string_literal(*value),
            NodeData::NullableType { inner } => {
                let inner = self.lower_type_node(module, *inner, ctx);
                self.db().nullable(inner)
            }
            NodeData::UnionType { lhs, rhs } => {
                let lhs = self.lower_type_node(module, *lhs, ctx);
                let rhs = self.lower_type_node(module, *rhs, ctx);
                self.db().union2(lhs, rhs)
            }
            NodeData::DefaultedType { inner } | NodeData::ParenthesizedType { inner } => {
                self.lower_type_node(module, *inner, ctx)
            }
            NodeData::FunctionType { params, ret } => {
                let params: Vec<TypeId> = params
                    .iter()
                    .map(|&p| self.lower_type_node(module, p, ctx))
                    .collect();
                let ret = self.lower_type_node(module, *ret, ctx);
                self.types.function(&params, ret)
            }
            NodeData::ConstrainedType { base, constraints } => {
                let base_ty = self.lower_type_node(module, *base, ctx);
                let lowered: Vec<ConstraintId> = constraints
                    .iter()
                    .map(|&c| self.lower_constraint(&tree, module, c))
                    .collect();
                self.types.constrained(base_ty, &lowered)
            }
            NodeData::DeclaredType {
                qualifier,
                name,
                args,
            } => {
                let args: Vec<TypeId> = args
                    .iter()
                    .map(|&a| self.lower_type_node(module, a, ctx))
                    .collect();
                self.lower_declared_type(module, node, *qualifier, *name, &args, ctx)
            }
            _ => TypeId::UNKNOWN,
        }
    }

    fn lower_declared_type(
        &self,
        module: ModuleId,
        node: NodeId,
        qualifier: Option<Atom>,
        name: Atom,
        args: &[TypeId],
        ctx: Ctx,
    ) -> TypeId {
        // `mod.Name`: resolve the qualifier among the module's imports.
        if let Some(qualifier) = qualifier {
            let facts = self.graph.facts(module, ctx);
            let Some(import) = facts.import_named(qualifier) else {
                return TypeId::UNKNOWN;
            };
            let Some(&target) = import.targets.first() else {
                return TypeId::UNKNOWN;
            };
            let target_facts = self.graph.facts(target, ctx);
            let Some(info) = target_facts.all_type_defs.get(&name) else {
                return TypeId::UNKNOWN;
            };
            return self.type_of_type_def(info.module, info.node, info.kind, args, ctx);
        }
        // Unqualified: lexical type resolution from this annotation's
        // position, then the builtin backbone.
        if let Some(decl) =
            self.resolve_first(Position::new(module, node), name, ResolveKind::Type, ctx)
        {
            let Some(tree) = self.graph.tree(decl.module) else {
                return TypeId::UNKNOWN;
            };
            return match tree.data(decl.node) {
                NodeData::Class(_) => {
                    self.type_of_type_def(decl.module, decl.node, MemberKind::Class, args, ctx)
                }
                NodeData::TypeAlias(_) => {
                    self.type_of_type_def(decl.module, decl.node, MemberKind::TypeAlias, args, ctx)
                }
                NodeData::TypeParam(_) => {
                    let def = self.lower_def(decl.module, decl.node, ctx);
                    if def.is_valid() {
                        self.types.variable(def)
                    } else {
                        TypeId::UNKNOWN
                    }
                }
                _ => TypeId::UNKNOWN,
            };
        }
        self.builtin_type_by_name(name, args)
            .unwrap_or(TypeId::UNKNOWN)
    }

    fn type_of_type_def(
        &self,
        module: ModuleId,
        node: NodeId,
        kind: MemberKind,
        args: &[TypeId],
        ctx: Ctx,
    ) -> TypeId {
        let def = self.lower_def(module, node, ctx);
        if !def.is_valid() {
            return TypeId::UNKNOWN;
        }
        match kind {
            MemberKind::TypeAlias => self.types.alias(def, args),
            _ => self.types.class(def, args),
        }
    }

    /// The synthetic base library backbone, for names no module declares.
    pub(crate) fn builtin_type_by_name(&self, name: Atom, args: &[TypeId]) -> Option<TypeId> {
        let b = self.builtins;
        let candidates = [
            b.any,
            b.object,
            b.typed,
            b.dynamic,
            b.listing,
            b.mapping,
            b.string,
            b.boolean,
            b.number,
            b.int,
            b.float,
            b.null,
            b.collection,
            b.list,
            b.set,
            b.map,
            b.pair,
            b.duration,
            b.data_size,
            b.regex,
            b.module_class,
            b.class_class,
            b.type_alias_class,
            b.function_class,
        ];
        candidates
            .into_iter()
            .find(|&def| def.is_valid() && self.defs.name(def) == name)
            .map(|def| self.types.class(def, args))
    }

    // -------------------------------------------------------------------------
    // Constraints
    // -------------------------------------------------------------------------

    /// Lower one constraint expression into the decidable IR, carrying its
    /// rendered source for diagnostics.
    pub(crate) fn lower_constraint(
        &self,
        tree: &SyntaxTree,
        _module: ModuleId,
        node: NodeId,
    ) -> ConstraintId {
        let expr = self.lower_constraint_expr(tree, node, 0);
        let source = self.strings.intern(&render_constraint_source(
            tree,
            node,
            &self.strings,
            0,
        ));
        self.types.intern_constraint(ConstraintInfo { expr, source })
    }

    fn lower_constraint_expr(&self, tree: &SyntaxTree, node: NodeId, depth: u32) -> ConstraintExpr {
        if depth > 32 {
            return ConstraintExpr::Opaque;
        }
        match tree.data(node) {
            NodeData::ThisExpr => ConstraintExpr::Candidate,
            NodeData::NullLiteral => ConstraintExpr::Literal(ConstLiteral::Null),
            NodeData::BoolLiteral(b) => ConstraintExpr::Literal(ConstLiteral::Bool(*b)),
            NodeData::IntLiteral(i) => ConstraintExpr::Literal(ConstLiteral::Int(*i)),
            NodeData::FloatLiteral(f) => {
                ConstraintExpr::Literal(ConstLiteral::Float(FloatBits::new(*f)))
            }
            NodeData::StringLiteral(s) => ConstraintExpr::Literal(ConstLiteral::String(*s)),
            NodeData::Parenthesized { inner } => self.lower_constraint_expr(tree, *inner, depth + 1),
            // A bare name in constraint position reads off the candidate.
            NodeData::UnqualifiedAccess { name, args: None } => ConstraintExpr::Property {
                receiver: Box::new(ConstraintExpr::Candidate),
                name: *name,
            },
            NodeData::UnqualifiedAccess {
                name,
                args: Some(args),
            } => ConstraintExpr::Call {
                receiver: Box::new(ConstraintExpr::Candidate),
                name: *name,
                args: args
                    .iter()
                    .map(|&a| self.lower_constraint_expr(tree, a, depth + 1))
                    .collect(),
            },
            NodeData::QualifiedAccess {
                receiver,
                name,
                args,
                nullable: false,
            } => {
                let receiver = Box::new(self.lower_constraint_expr(tree, *receiver, depth + 1));
                match args {
                    None => ConstraintExpr::Property {
                        receiver,
                        name: *name,
                    },
                    Some(args) => ConstraintExpr::Call {
                        receiver,
                        name: *name,
                        args: args
                            .iter()
                            .map(|&a| self.lower_constraint_expr(tree, a, depth + 1))
                            .collect(),
                    },
                }
            }
            NodeData::UnaryOp {
                op: UnaryOperator::Not,
                operand,
            } => ConstraintExpr::Not(Box::new(self.lower_constraint_expr(tree, *operand, depth + 1))),
            NodeData::UnaryOp {
                op: UnaryOperator::Neg,
                operand,
            } => match tree.data(*operand) {
                NodeData::IntLiteral(i) => ConstraintExpr::Literal(ConstLiteral::Int(-i)),
                NodeData::FloatLiteral(f) => {
                    ConstraintExpr::Literal(ConstLiteral::Float(FloatBits::new(-f)))
                }
                _ => ConstraintExpr::Opaque,
            },
            NodeData::BinaryOp { op, lhs, rhs } => {
                let lower = |n: NodeId| Box::new(self.lower_constraint_expr(tree, n, depth + 1));
                let compare = |op: CompareOp, lhs: NodeId, rhs: NodeId| ConstraintExpr::Compare {
                    op,
                    lhs: lower(lhs),
                    rhs: lower(rhs),
                };
                match op {
                    BinaryOperator::Lt => compare(CompareOp::Lt, *lhs, *rhs),
                    BinaryOperator::Gt => compare(CompareOp::Gt, *lhs, *rhs),
                    BinaryOperator::LtEq => compare(CompareOp::LtEq, *lhs, *rhs),
                    BinaryOperator::GtEq => compare(CompareOp::GtEq, *lhs, *rhs),
                    BinaryOperator::Eq => compare(CompareOp::Eq, *lhs, *rhs),
                    BinaryOperator::NotEq => compare(CompareOp::NotEq, *lhs, *rhs),
                    BinaryOperator::And => ConstraintExpr::And(lower(*lhs), lower(*rhs)),
                    BinaryOperator::Or => ConstraintExpr::Or(lower(*lhs), lower(*rhs)),
                    _ => ConstraintExpr::Opaque,
                }
            }
            _ => ConstraintExpr::Opaque,
        }
    }
}

/// Best-effort source rendering for constraint display (`String(length > 3)`).
fn render_constraint_source(
    tree: &SyntaxTree,
    node: NodeId,
    strings: &pkla_common::Interner,
    depth: u32,
) -> String {
    if depth > 16 {
        return "...".to_string();
    }
    let sub = |n: NodeId| render_constraint_source(tree, n, strings, depth + 1);
    match tree.data(node) {
        NodeData::ThisExpr => "this".to_string(),
        NodeData::NullLiteral => "null".to_string(),
        NodeData::BoolLiteral(b) => b.to_string(),
        NodeData::IntLiteral(i) => i.to_string(),
        NodeData::FloatLiteral(f) => f.to_string(),
        NodeData::StringLiteral(s) => format!("\"{}\"", strings.resolve(*s)),
        NodeData::Parenthesized { inner } => format!("({})", sub(*inner)),
        NodeData::UnqualifiedAccess { name, args: None } => strings.resolve(*name).to_string(),
        NodeData::UnqualifiedAccess {
            name,
            args: Some(args),
        } => format!(
            "{}({})",
            strings.resolve(*name),
            args.iter().map(|&a| sub(a)).collect::<Vec<_>>().join(", ")
        ),
        NodeData::QualifiedAccess {
            receiver,
            name,
            args,
            ..
        } => {
            let receiver = sub(*receiver);
            match args {
                None => format!("{}.{}", receiver, strings.resolve(*name)),
                Some(args) => format!(
                    "{}.{}({})",
                    receiver,
                    strings.resolve(*name),
                    args.iter().map(|&a| sub(a)).collect::<Vec<_>>().join(", ")
                ),
            }
        }
        NodeData::UnaryOp { op, operand } => match op {
            UnaryOperator::Not => format!("!{}", sub(*operand)),
            UnaryOperator::Neg => format!("-{}", sub(*operand)),
            UnaryOperator::NonNull => format!("{}!!", sub(*operand)),
        },
        NodeData::BinaryOp { op, lhs, rhs } => {
            let symbol = match op {
                BinaryOperator::Add => "+",
                BinaryOperator::Sub => "-",
                BinaryOperator::Mul => "*",
                BinaryOperator::Div => "/",
                BinaryOperator::IntDiv => "~/",
                BinaryOperator::Mod => "%",
                BinaryOperator::Pow => "**",
                BinaryOperator::Lt => "<",
                BinaryOperator::Gt => ">",
                BinaryOperator::LtEq => "<=",
                BinaryOperator::GtEq => ">=",
                BinaryOperator::Eq => "==",
                BinaryOperator::NotEq => "!=",
                BinaryOperator::And => "&&",
                BinaryOperator::Or => "||",
                BinaryOperator::NullCoalesce => "??",
                BinaryOperator::Pipe => "|>",
            };
            format!("{} {} {}", sub(*lhs), symbol, sub(*rhs))
        }
        _ => "...".to_string(),
    }
}
