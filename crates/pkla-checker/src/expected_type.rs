//! Contextual (expected) type computation.
//!
//! The *expected* type at an expression's syntactic slot — the property's
//! declared type for its assigned value, the parameter type for a call
//! argument, `Boolean` for an `if` condition, the element type for a
//! listing member. A downward-flowing computation, separate from (not the
//! inverse of) expression typing; it drives both mismatch diagnostics and
//! completion ranking.

use crate::analyzer::{Analyzer, Ctx, Position};
use crate::resolver::ResolveKind;
use pkla_common::limits::MAX_EXPR_TYPE_DEPTH;
use pkla_solver::{TypeData, TypeId};
use pkla_syntax::{BinaryOperator, NodeData, NodeId};

impl Analyzer {
    /// The expected type of the expression at `position`, or `unknown`
    /// when its slot imposes none.
    pub fn expected_type_at(&self, position: Position, ctx: Ctx) -> TypeId {
        self.expected_type_inner(position, ctx, 0)
    }

    pub(crate) fn expected_type_inner(&self, position: Position, ctx: Ctx, depth: u32) -> TypeId {
        if depth > MAX_EXPR_TYPE_DEPTH {
            return TypeId::UNKNOWN;
        }
        let Some(tree) = self.graph.tree(position.module) else {
            return TypeId::UNKNOWN;
        };
        let Some(parent) = tree.parent(position.node) else {
            return TypeId::UNKNOWN;
        };
        let db = self.db();
        let module = position.module;
        let node = position.node;
        match tree.data(parent) {
            NodeData::Property(property) if property.value == Some(node) => {
                self.property_declared_type(module, parent, ctx, depth)
            }
            NodeData::ObjectEntry { key, value } => {
                let body_ty = self.this_type_inner(Position::new(module, parent), ctx, depth + 1);
                match db.mapping_entry(body_ty) {
                    Some((key_ty, value_ty)) => {
                        if *key == node {
                            key_ty
                        } else if *value == node {
                            value_ty
                        } else {
                            TypeId::UNKNOWN
                        }
                    }
                    None => TypeId::UNKNOWN,
                }
            }
            NodeData::ObjectElement { value } if *value == node => {
                let body_ty = self.this_type_inner(Position::new(module, parent), ctx, depth + 1);
                db.listing_element(body_ty).unwrap_or(TypeId::UNKNOWN)
            }
            NodeData::Method(method) if method.body == Some(node) => method
                .return_ann
                .map(|ann| self.lower_type_node(module, ann, ctx))
                .unwrap_or(TypeId::UNKNOWN),
            NodeData::LetExpr { param, value, body } => {
                if *value == node {
                    match tree.data(*param) {
                        NodeData::Param(p) => p
                            .type_ann
                            .map(|ann| self.lower_type_node(module, ann, ctx))
                            .unwrap_or(TypeId::UNKNOWN),
                        _ => TypeId::UNKNOWN,
                    }
                } else if *body == node {
                    self.expected_type_inner(Position::new(module, parent), ctx, depth + 1)
                } else {
                    TypeId::UNKNOWN
                }
            }
            NodeData::IfExpr { condition, .. } => {
                if *condition == node {
                    db.boolean_type()
                } else {
                    // Both branches flow to the conditional's own slot.
                    self.expected_type_inner(Position::new(module, parent), ctx, depth + 1)
                }
            }
            NodeData::WhenGenerator { condition, .. } if *condition == node => db.boolean_type(),
            NodeData::Parenthesized { .. } => {
                self.expected_type_inner(Position::new(module, parent), ctx, depth + 1)
            }
            NodeData::BinaryOp {
                op: BinaryOperator::NullCoalesce,
                lhs,
                ..
            } => {
                let expected =
                    self.expected_type_inner(Position::new(module, parent), ctx, depth + 1);
                if *lhs == node {
                    db.nullable(expected)
                } else {
                    expected
                }
            }
            NodeData::BinaryOp {
                op: BinaryOperator::And | BinaryOperator::Or,
                ..
            } => db.boolean_type(),
            NodeData::FunctionLiteral { body, .. } if *body == node => {
                let expected =
                    self.expected_type_inner(Position::new(module, parent), ctx, depth + 1);
                match db.lookup(expected) {
                    Some(TypeData::Function { ret, .. }) => ret,
                    _ => TypeId::UNKNOWN,
                }
            }
            NodeData::AmendExpr { parent: amended, .. } if *amended == node => {
                self.expected_type_inner(Position::new(module, parent), ctx, depth + 1)
            }
            NodeData::UnqualifiedAccess {
                name,
                args: Some(args),
            } => self.argument_expected_type(
                Position::new(module, parent),
                None,
                *name,
                args,
                node,
                ctx,
                depth,
            ),
            NodeData::QualifiedAccess {
                receiver,
                name,
                args: Some(args),
                ..
            } => self.argument_expected_type(
                Position::new(module, parent),
                Some(*receiver),
                *name,
                args,
                node,
                ctx,
                depth,
            ),
            _ => TypeId::UNKNOWN,
        }
    }

    /// The declared type of a property: its annotation, else the inherited
    /// member's type. Never infers from the value (that would be circular
    /// in expected-type position).
    pub(crate) fn property_declared_type(
        &self,
        module: pkla_binder::ModuleId,
        property_node: NodeId,
        ctx: Ctx,
        depth: u32,
    ) -> TypeId {
        let Some(tree) = self.graph.tree(module) else {
            return TypeId::UNKNOWN;
        };
        let NodeData::Property(property) = tree.data(property_node) else {
            return TypeId::UNKNOWN;
        };
        if let Some(ann) = property.type_ann {
            return self.lower_type_node(module, ann, ctx);
        }
        // No annotation: the property may override an inherited one whose
        // declared type flows down the amendment chain.
        let outer = match tree.parent(property_node) {
            Some(parent) => self.this_type_inner(Position::new(module, parent), ctx, depth + 1),
            None => TypeId::UNKNOWN,
        };
        let from_parent_object =
            self.member_type_of(outer, property.name, ResolveKind::Property, ctx, depth + 1);
        if let Some(ty) = from_parent_object {
            return ty;
        }
        let supertype = self.supertype_of(outer);
        self.member_type_of(supertype, property.name, ResolveKind::Property, ctx, depth + 1)
            .unwrap_or(TypeId::UNKNOWN)
    }

    /// Expected type for one argument of a call: the corresponding
    /// declared parameter type (the variadic tail repeats).
    #[allow(clippy::too_many_arguments)]
    fn argument_expected_type(
        &self,
        call: Position,
        receiver: Option<NodeId>,
        name: pkla_common::Atom,
        args: &[NodeId],
        arg: NodeId,
        ctx: Ctx,
        depth: u32,
    ) -> TypeId {
        let Some(index) = args.iter().position(|&a| a == arg) else {
            return TypeId::UNKNOWN;
        };
        let decl = match receiver {
            None => self.resolve_first(call, name, ResolveKind::Method, ctx),
            Some(receiver) => {
                let receiver_ty =
                    self.expr_type_inner(Position::new(call.module, receiver), ctx, depth + 1);
                self.member_decl_of_type(receiver_ty, name, ResolveKind::Method, ctx)
            }
        };
        let Some(decl) = decl else {
            return TypeId::UNKNOWN;
        };
        let Some(tree) = self.graph.tree(decl.module) else {
            return TypeId::UNKNOWN;
        };
        let NodeData::Method(method) = tree.data(decl.node) else {
            return TypeId::UNKNOWN;
        };
        let param_index = if method.variadic && index >= method.params.len() {
            method.params.len().saturating_sub(1)
        } else {
            index
        };
        let Some(&param) = method.params.get(param_index) else {
            return TypeId::UNKNOWN;
        };
        match tree.data(param) {
            NodeData::Param(p) => p
                .type_ann
                .map(|ann| self.lower_type_node(decl.module, ann, ctx))
                .unwrap_or(TypeId::UNKNOWN),
            _ => TypeId::UNKNOWN,
        }
    }
}
