//! Expression type computation.
//!
//! One exhaustive match over expression node kinds. Literals yield their
//! literal types, access expressions resolve through the scope walk and
//! yield the declaration's type narrowed by flow facts, operators follow
//! Pkl's static typing rules, and amend/new expressions yield the
//! amended/instantiated type. Total: anything unresolvable is `unknown`.

use crate::analyzer::{Analyzer, Ctx, Position};
use crate::resolver::{DeclarationRef, ResolveKind};
use pkla_common::limits::MAX_EXPR_TYPE_DEPTH;
use pkla_solver::{substitute, TypeData, TypeId, TypeParameterBindings};
use pkla_syntax::{BinaryOperator, MethodDecl, NodeData, NodeId, UnaryOperator};

impl Analyzer {
    /// The static type of an expression.
    pub fn type_of_expr(&self, position: Position, ctx: Ctx) -> TypeId {
        self.expr_type_inner(position, ctx, 0)
    }

    /// The static type of an expression under explicit bindings.
    pub fn type_of_expr_with(
        &self,
        position: Position,
        bindings: &TypeParameterBindings,
        ctx: Ctx,
    ) -> TypeId {
        let ty = self.expr_type_inner(position, ctx, 0);
        substitute(self.db(), ty, bindings)
    }

    pub(crate) fn expr_type_inner(&self, position: Position, ctx: Ctx, depth: u32) -> TypeId {
        if depth > MAX_EXPR_TYPE_DEPTH {
            return TypeId::UNKNOWN;
        }
        let Some(tree) = self.graph.tree(position.module) else {
            return TypeId::UNKNOWN;
        };
        let db = self.db();
        let module = position.module;
        let at = |node: NodeId| Position::new(module, node);
        match tree.data(position.node) {
            NodeData::NullLiteral => db.null_type(),
            NodeData::BoolLiteral(_) => db.boolean_type(),
            NodeData::IntLiteral(_) => db.int_type(),
            NodeData::FloatLiteral(_) => db.float_type(),
            // A constant string is its own singleton type; widening to
            // String happens where a context asks for it.
            NodeData::StringLiteral(value) => self.types.string_literal(*value),
            NodeData::InterpolatedString { .. } => db.string_type(),
            NodeData::ThisExpr => self.this_type_inner(position, ctx, depth + 1),
            NodeData::ModuleExpr => self.module_type(module, ctx),
            NodeData::UnqualifiedAccess { name, args } => match args {
                None => {
                    let Some(decl) =
                        self.resolve_first(position, *name, ResolveKind::Property, ctx)
                    else {
                        return TypeId::UNKNOWN;
                    };
                    let declared = self.declaration_type(&decl, ctx, depth + 1);
                    let facts = self.flow_facts_at(position, ctx);
                    self.apply_flow_facts(declared, *name, &facts)
                }
                Some(args) => {
                    let Some(decl) = self.resolve_first(position, *name, ResolveKind::Method, ctx)
                    else {
                        return TypeId::UNKNOWN;
                    };
                    self.call_type(&decl, &TypeParameterBindings::default(), args, position, ctx, depth)
                }
            },
            NodeData::QualifiedAccess {
                receiver,
                name,
                args,
                nullable,
            } => {
                let receiver_ty = self.expr_type_inner(at(*receiver), ctx, depth + 1);
                let receiver_ty = if *nullable {
                    db.non_null(receiver_ty)
                } else {
                    receiver_ty
                };
                let kind = if args.is_some() {
                    ResolveKind::Method
                } else {
                    ResolveKind::Property
                };
                let result = match args {
                    None => self
                        .member_type_of(receiver_ty, *name, kind, ctx, depth + 1)
                        .unwrap_or(TypeId::UNKNOWN),
                    Some(args) => {
                        let Some(decl) =
                            self.member_decl_of_type(receiver_ty, *name, kind, ctx)
                        else {
                            // Builtin methods surface as function-typed
                            // members; fall back to their return type.
                            return TypeId::UNKNOWN;
                        };
                        let bindings = self.receiver_bindings(receiver_ty);
                        self.call_type(&decl, &bindings, args, position, ctx, depth)
                    }
                };
                if *nullable {
                    db.nullable(result)
                } else {
                    result
                }
            }
            NodeData::SuperAccess { name, args } => {
                let this_ty = self.this_type_inner(position, ctx, depth + 1);
                let super_ty = self.supertype_of(this_ty);
                let kind = if args.is_some() {
                    ResolveKind::Method
                } else {
                    ResolveKind::Property
                };
                match args {
                    None => self
                        .member_type_of(super_ty, *name, kind, ctx, depth + 1)
                        .unwrap_or(TypeId::UNKNOWN),
                    Some(args) => match self.member_decl_of_type(super_ty, *name, kind, ctx) {
                        Some(decl) => {
                            let bindings = self.receiver_bindings(super_ty);
                            self.call_type(&decl, &bindings, args, position, ctx, depth)
                        }
                        None => TypeId::UNKNOWN,
                    },
                }
            }
            NodeData::Subscript { receiver, .. } => {
                let receiver_ty = self.expr_type_inner(at(*receiver), ctx, depth + 1);
                self.subscript_type(receiver_ty)
            }
            NodeData::NewExpr { ty, .. } => match ty {
                Some(ty) => self.lower_type_node(module, *ty, ctx),
                None => {
                    let expected = self.expected_type_inner(position, ctx, depth + 1);
                    let expected = db.non_null(expected);
                    if expected == TypeId::UNKNOWN || expected == TypeId::NOTHING {
                        db.dynamic_type()
                    } else {
                        expected
                    }
                }
            },
            NodeData::AmendExpr { parent, .. } => self.expr_type_inner(at(*parent), ctx, depth + 1),
            NodeData::IfExpr {
                then_branch,
                else_branch,
                ..
            } => {
                let then_ty = self.expr_type_inner(at(*then_branch), ctx, depth + 1);
                let else_ty = self.expr_type_inner(at(*else_branch), ctx, depth + 1);
                db.union2(then_ty, else_ty)
            }
            NodeData::LetExpr { body, .. } => self.expr_type_inner(at(*body), ctx, depth + 1),
            NodeData::FunctionLiteral { params, body } => {
                let param_types: Vec<TypeId> = params
                    .iter()
                    .map(|&p| {
                        let decl = DeclarationRef {
                            module,
                            node: p,
                            name: pkla_common::Atom::EMPTY,
                            kind: ResolveKind::Property,
                            origin: crate::resolver::ScopeOrigin::LambdaParam,
                        };
                        self.declaration_type(&decl, ctx, depth + 1)
                    })
                    .collect();
                let ret = self.expr_type_inner(at(*body), ctx, depth + 1);
                self.types.function(&param_types, ret)
            }
            NodeData::Parenthesized { inner } => self.expr_type_inner(at(*inner), ctx, depth + 1),
            NodeData::TypeTest { .. } => db.boolean_type(),
            NodeData::TypeCast { ty, .. } => self.lower_type_node(module, *ty, ctx),
            NodeData::BinaryOp { op, lhs, rhs } => {
                let lhs_ty = self.expr_type_inner(at(*lhs), ctx, depth + 1);
                let rhs_ty = self.expr_type_inner(at(*rhs), ctx, depth + 1);
                self.binary_op_type(*op, lhs_ty, rhs_ty)
            }
            NodeData::UnaryOp { op, operand } => {
                let operand_ty = self.expr_type_inner(at(*operand), ctx, depth + 1);
                match op {
                    UnaryOperator::Not => db.boolean_type(),
                    UnaryOperator::Neg => operand_ty,
                    UnaryOperator::NonNull => db.non_null(operand_ty),
                }
            }
            NodeData::ThrowExpr { .. } => TypeId::NOTHING,
            // Not an expression node.
            _ => TypeId::UNKNOWN,
        }
    }

    /// Pkl's static operator typing.
    fn binary_op_type(&self, op: BinaryOperator, lhs: TypeId, rhs: TypeId) -> TypeId {
        let db = self.db();
        let is_stringish = |ty: TypeId| {
            ty == db.string_type()
                || matches!(db.lookup(ty), Some(TypeData::StringLiteral { .. }))
        };
        match op {
            BinaryOperator::Add
            | BinaryOperator::Sub
            | BinaryOperator::Mul
            | BinaryOperator::Pow
            | BinaryOperator::Mod => {
                if op == BinaryOperator::Add && (is_stringish(lhs) || is_stringish(rhs)) {
                    return db.string_type();
                }
                self.numeric_join(lhs, rhs)
            }
            // `/` is float division; `~/` truncates.
            BinaryOperator::Div => db.float_type(),
            BinaryOperator::IntDiv => db.int_type(),
            BinaryOperator::Lt
            | BinaryOperator::Gt
            | BinaryOperator::LtEq
            | BinaryOperator::GtEq
            | BinaryOperator::Eq
            | BinaryOperator::NotEq
            | BinaryOperator::And
            | BinaryOperator::Or => db.boolean_type(),
            BinaryOperator::NullCoalesce => db.union2(db.non_null(lhs), rhs),
            BinaryOperator::Pipe => match db.lookup(rhs) {
                Some(TypeData::Function { ret, .. }) => ret,
                _ => TypeId::UNKNOWN,
            },
        }
    }

    fn numeric_join(&self, lhs: TypeId, rhs: TypeId) -> TypeId {
        let db = self.db();
        let int = db.int_type();
        let float = db.float_type();
        let number = db.number_type();
        if lhs == int && rhs == int {
            int
        } else if (lhs == float || rhs == float)
            && (lhs == int || lhs == float || rhs == int || rhs == float)
        {
            float
        } else if self.is_subtype(lhs, number) && self.is_subtype(rhs, number) {
            number
        } else {
            TypeId::UNKNOWN
        }
    }

    /// Subscript result type per receiver shape.
    fn subscript_type(&self, receiver: TypeId) -> TypeId {
        let db = self.db();
        if let Some(element) = db.listing_element(receiver) {
            return element;
        }
        if let Some((_, value)) = db.mapping_entry(receiver) {
            return value;
        }
        if let Some(element) = db.generic_argument(receiver, self.builtins.collection, 0) {
            return element;
        }
        if let Some(value) = db.generic_argument(receiver, self.builtins.map, 1) {
            return value;
        }
        if receiver == db.string_type()
            || matches!(db.lookup(receiver), Some(TypeData::StringLiteral { .. }))
        {
            return db.string_type();
        }
        TypeId::UNKNOWN
    }

    /// The supertype of a receiver for `super.` access.
    pub(crate) fn supertype_of(&self, ty: TypeId) -> TypeId {
        let db = self.db();
        match db.lookup(ty) {
            Some(TypeData::Class { def, args }) => {
                let Some(info) = self.defs.lookup(def) else {
                    return TypeId::UNKNOWN;
                };
                let Some(supertype) = info.supertype else {
                    return TypeId::UNKNOWN;
                };
                let args = self.types.type_list(args);
                let bindings = pkla_solver::bindings_for(&info.type_params, &args);
                substitute(db, supertype, &bindings)
            }
            Some(TypeData::Module { def }) => self
                .defs
                .lookup(def)
                .and_then(|d| d.supertype)
                .unwrap_or(TypeId::UNKNOWN),
            _ => TypeId::UNKNOWN,
        }
    }

    /// The type arguments a receiver fixes for its class's parameters.
    fn receiver_bindings(&self, receiver: TypeId) -> TypeParameterBindings {
        match self.db().lookup(receiver) {
            Some(TypeData::Class { def, args }) => {
                let params = self
                    .defs
                    .lookup(def)
                    .map(|d| d.type_params.clone())
                    .unwrap_or_default();
                let args = self.types.type_list(args);
                pkla_solver::bindings_for(&params, &args)
            }
            _ => TypeParameterBindings::default(),
        }
    }

    /// Result type of calling a resolved method declaration.
    pub(crate) fn call_type(
        &self,
        decl: &DeclarationRef,
        receiver_bindings: &TypeParameterBindings,
        arg_nodes: &[NodeId],
        call_position: Position,
        ctx: Ctx,
        depth: u32,
    ) -> TypeId {
        let Some(tree) = self.graph.tree(decl.module) else {
            return TypeId::UNKNOWN;
        };
        let NodeData::Method(method) = tree.data(decl.node) else {
            return TypeId::UNKNOWN;
        };
        let arg_types: Vec<TypeId> = arg_nodes
            .iter()
            .map(|&a| self.expr_type_inner(Position::new(call_position.module, a), ctx, depth + 1))
            .collect();
        let mut bindings = receiver_bindings.clone();
        self.infer_call_bindings(decl.module, method, &arg_types, ctx, &mut bindings);
        let ret = self.method_return_type(decl.module, method, ctx, depth);
        substitute(self.db(), ret, &bindings)
    }

    pub(crate) fn method_return_type(
        &self,
        module: pkla_binder::ModuleId,
        method: &MethodDecl,
        ctx: Ctx,
        depth: u32,
    ) -> TypeId {
        match (method.return_ann, method.body) {
            (Some(ann), _) => self.lower_type_node(module, ann, ctx),
            (None, Some(body)) => self.expr_type_inner(Position::new(module, body), ctx, depth + 1),
            (None, None) => TypeId::UNKNOWN,
        }
    }

    /// The declared/computed type of a resolved declaration.
    pub fn type_of_declaration(&self, decl: &DeclarationRef, ctx: Ctx) -> TypeId {
        self.declaration_type(decl, ctx, 0)
    }

    pub(crate) fn declaration_type(&self, decl: &DeclarationRef, ctx: Ctx, depth: u32) -> TypeId {
        if depth > MAX_EXPR_TYPE_DEPTH {
            return TypeId::UNKNOWN;
        }
        let Some(tree) = self.graph.tree(decl.module) else {
            return TypeId::UNKNOWN;
        };
        let module = decl.module;
        match tree.data(decl.node) {
            NodeData::Property(property) => {
                if let Some(ann) = property.type_ann {
                    return self.lower_type_node(module, ann, ctx);
                }
                if let Some(value) = property.value {
                    return self.expr_type_inner(Position::new(module, value), ctx, depth + 1);
                }
                if property.body.is_some() {
                    // Amending definition without annotation: the inherited
                    // property's type.
                    let outer = match tree.parent(decl.node) {
                        Some(parent) => {
                            self.this_type_inner(Position::new(module, parent), ctx, depth + 1)
                        }
                        None => TypeId::UNKNOWN,
                    };
                    let inherited = self.member_type_of(
                        self.supertype_or_self(outer),
                        property.name,
                        ResolveKind::Property,
                        ctx,
                        depth + 1,
                    );
                    return inherited.unwrap_or(TypeId::UNKNOWN);
                }
                TypeId::UNKNOWN
            }
            NodeData::Method(method) => {
                let params: Vec<TypeId> = method
                    .params
                    .iter()
                    .map(|&p| match tree.data(p) {
                        NodeData::Param(param) => param
                            .type_ann
                            .map(|ann| self.lower_type_node(module, ann, ctx))
                            .unwrap_or(TypeId::UNKNOWN),
                        _ => TypeId::UNKNOWN,
                    })
                    .collect();
                let ret = self.method_return_type(module, method, ctx, depth);
                self.types.function(&params, ret)
            }
            NodeData::Param(param) => {
                if let Some(ann) = param.type_ann {
                    return self.lower_type_node(module, ann, ctx);
                }
                self.param_type_from_parent(decl.node, module, ctx, depth)
            }
            NodeData::Class(_) => {
                let def = self.lower_def(module, decl.node, ctx);
                if def.is_valid() {
                    self.types.class0(def)
                } else {
                    TypeId::UNKNOWN
                }
            }
            NodeData::TypeAlias(_) => {
                let def = self.lower_def(module, decl.node, ctx);
                if def.is_valid() {
                    self.types.alias(def, &[])
                } else {
                    TypeId::UNKNOWN
                }
            }
            NodeData::TypeParam(_) => {
                let def = self.lower_def(module, decl.node, ctx);
                if def.is_valid() {
                    self.types.variable(def)
                } else {
                    TypeId::UNKNOWN
                }
            }
            NodeData::Import(import) => {
                let facts = self.graph.facts(module, ctx);
                let Some(resolved) = facts.imports.iter().find(|i| {
                    i.uri == import.uri
                }) else {
                    return TypeId::UNKNOWN;
                };
                if import.is_glob {
                    // A glob import binds a mapping from URI to module.
                    let module_class = self.types.class0(self.builtins.module_class);
                    return self
                        .types
                        .class(self.builtins.mapping, &[self.db().string_type(), module_class]);
                }
                match resolved.targets.first() {
                    Some(&target) => self.module_type(target, ctx),
                    None => TypeId::UNKNOWN,
                }
            }
            _ => TypeId::UNKNOWN,
        }
    }

    /// Untyped parameters take their type from the construct binding them.
    fn param_type_from_parent(
        &self,
        param: NodeId,
        module: pkla_binder::ModuleId,
        ctx: Ctx,
        depth: u32,
    ) -> TypeId {
        let Some(tree) = self.graph.tree(module) else {
            return TypeId::UNKNOWN;
        };
        let Some(parent) = tree.parent(param) else {
            return TypeId::UNKNOWN;
        };
        let db = self.db();
        match tree.data(parent) {
            NodeData::LetExpr { value, .. } => {
                self.expr_type_inner(Position::new(module, *value), ctx, depth + 1)
            }
            NodeData::ForGenerator {
                key_param, iterable, ..
            } => {
                let iterable_ty =
                    self.expr_type_inner(Position::new(module, *iterable), ctx, depth + 1);
                let is_key = Some(param) == *key_param;
                self.generator_binding_type(iterable_ty, is_key)
            }
            NodeData::FunctionLiteral { params, .. } => {
                // Contextual typing: the expected function type fixes the
                // parameter types.
                let expected = self.expected_type_inner(Position::new(module, parent), ctx, depth + 1);
                let index = params.iter().position(|&p| p == param);
                match (db.lookup(expected), index) {
                    (Some(TypeData::Function { params, .. }), Some(index)) => {
                        let params = self.types.type_list(params);
                        params.get(index).copied().unwrap_or(TypeId::UNKNOWN)
                    }
                    _ => TypeId::UNKNOWN,
                }
            }
            _ => TypeId::UNKNOWN,
        }
    }

    /// Element/key types bound by `for (k, v in iterable)`.
    fn generator_binding_type(&self, iterable: TypeId, is_key: bool) -> TypeId {
        let db = self.db();
        if let Some(element) = db.listing_element(iterable) {
            return if is_key { db.int_type() } else { element };
        }
        if let Some((key, value)) = db.mapping_entry(iterable) {
            return if is_key { key } else { value };
        }
        if let Some(element) = db.generic_argument(iterable, self.builtins.collection, 0) {
            return if is_key { db.int_type() } else { element };
        }
        if is_key {
            if let Some(key) = db.generic_argument(iterable, self.builtins.map, 0) {
                return key;
            }
        } else if let Some(value) = db.generic_argument(iterable, self.builtins.map, 1) {
            return value;
        }
        TypeId::UNKNOWN
    }

    /// For amended-property inheritance: a module's supermodule type, a
    /// class's superclass, otherwise the type itself.
    fn supertype_or_self(&self, ty: TypeId) -> TypeId {
        let supertype = self.supertype_of(ty);
        if supertype == TypeId::UNKNOWN {
            ty
        } else {
            supertype
        }
    }
}
