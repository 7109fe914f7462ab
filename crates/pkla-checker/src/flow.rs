//! Flow typing.
//!
//! Walking upward past a boolean context emits synthetic narrowing facts:
//! `x is T` inside the satisfied branch narrows `x` to `T`; `x != null`
//! strips nullability; `&&` propagates its left operand's satisfied facts
//! into the right operand, `||` propagates the negated facts, and `!`
//! flips polarity. Facts never shadow declarations — they only narrow the
//! type resolution computed — so they ride a separate channel from the
//! scope walk.

use crate::analyzer::{Analyzer, Ctx, Position};
use pkla_binder::ModuleId;
use pkla_common::Atom;
use pkla_solver::{TypeData, TypeId};
use pkla_syntax::{BinaryOperator, NodeData, NodeId, SyntaxTree, UnaryOperator};
use tracing::trace;

/// Whether the governing condition is known to have held or failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowPolarity {
    Satisfied,
    Negated,
}

impl FlowPolarity {
    fn flip(self) -> Self {
        match self {
            Self::Satisfied => Self::Negated,
            Self::Negated => Self::Satisfied,
        }
    }
}

/// One narrowing fact about a named binding.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowFact {
    /// `name is ty` held (or failed, when `negated`).
    IsType {
        name: Atom,
        ty: TypeId,
        negated: bool,
    },
    /// `name != null` held (or `name == null` held, when `negated`).
    NonNull { name: Atom, negated: bool },
}

impl Analyzer {
    /// Collect the flow facts dominating a position, innermost first.
    pub fn flow_facts_at(&self, position: Position, ctx: Ctx) -> Vec<FlowFact> {
        let Some(tree) = self.graph.tree(position.module) else {
            return Vec::new();
        };
        let mut facts = Vec::new();
        let mut prev = position.node;
        for current in tree.ancestors(position.node) {
            match tree.data(current) {
                NodeData::IfExpr {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    if prev == *then_branch {
                        self.collect_condition_facts(
                            &tree,
                            position.module,
                            *condition,
                            FlowPolarity::Satisfied,
                            &mut facts,
                            ctx,
                        );
                    } else if prev == *else_branch {
                        self.collect_condition_facts(
                            &tree,
                            position.module,
                            *condition,
                            FlowPolarity::Negated,
                            &mut facts,
                            ctx,
                        );
                    }
                }
                NodeData::WhenGenerator {
                    condition,
                    body,
                    else_body,
                } => {
                    if prev == *body {
                        self.collect_condition_facts(
                            &tree,
                            position.module,
                            *condition,
                            FlowPolarity::Satisfied,
                            &mut facts,
                            ctx,
                        );
                    } else if Some(prev) == *else_body {
                        self.collect_condition_facts(
                            &tree,
                            position.module,
                            *condition,
                            FlowPolarity::Negated,
                            &mut facts,
                            ctx,
                        );
                    }
                }
                // Short-circuit propagation: the right operand of `&&`
                // only evaluates when the left held; of `||`, when the
                // left failed.
                NodeData::BinaryOp {
                    op: BinaryOperator::And,
                    lhs,
                    rhs,
                } if prev == *rhs => {
                    self.collect_condition_facts(
                        &tree,
                        position.module,
                        *lhs,
                        FlowPolarity::Satisfied,
                        &mut facts,
                        ctx,
                    );
                }
                NodeData::BinaryOp {
                    op: BinaryOperator::Or,
                    lhs,
                    rhs,
                } if prev == *rhs => {
                    self.collect_condition_facts(
                        &tree,
                        position.module,
                        *lhs,
                        FlowPolarity::Negated,
                        &mut facts,
                        ctx,
                    );
                }
                _ => {}
            }
            prev = current;
        }
        facts
    }

    fn collect_condition_facts(
        &self,
        tree: &SyntaxTree,
        module: ModuleId,
        condition: NodeId,
        polarity: FlowPolarity,
        out: &mut Vec<FlowFact>,
        ctx: Ctx,
    ) {
        match tree.data(condition) {
            NodeData::Parenthesized { inner } => {
                self.collect_condition_facts(tree, module, *inner, polarity, out, ctx);
            }
            NodeData::UnaryOp {
                op: UnaryOperator::Not,
                operand,
            } => {
                self.collect_condition_facts(tree, module, *operand, polarity.flip(), out, ctx);
            }
            NodeData::BinaryOp {
                op: BinaryOperator::And,
                lhs,
                rhs,
            } => {
                // Both conjuncts held; a failed conjunction tells us
                // nothing about either side.
                if polarity == FlowPolarity::Satisfied {
                    self.collect_condition_facts(tree, module, *lhs, polarity, out, ctx);
                    self.collect_condition_facts(tree, module, *rhs, polarity, out, ctx);
                }
            }
            NodeData::BinaryOp {
                op: BinaryOperator::Or,
                lhs,
                rhs,
            } => {
                if polarity == FlowPolarity::Negated {
                    self.collect_condition_facts(tree, module, *lhs, polarity, out, ctx);
                    self.collect_condition_facts(tree, module, *rhs, polarity, out, ctx);
                }
            }
            NodeData::TypeTest { value, ty } => {
                if let NodeData::UnqualifiedAccess { name, args: None } = tree.data(*value) {
                    let lowered = self.lower_type_node(module, *ty, ctx);
                    out.push(FlowFact::IsType {
                        name: *name,
                        ty: lowered,
                        negated: polarity == FlowPolarity::Negated,
                    });
                }
            }
            NodeData::BinaryOp {
                op: op @ (BinaryOperator::Eq | BinaryOperator::NotEq),
                lhs,
                rhs,
            } => {
                let name = match (tree.data(*lhs), tree.data(*rhs)) {
                    (NodeData::UnqualifiedAccess { name, args: None }, NodeData::NullLiteral) => {
                        Some(*name)
                    }
                    (NodeData::NullLiteral, NodeData::UnqualifiedAccess { name, args: None }) => {
                        Some(*name)
                    }
                    _ => None,
                };
                if let Some(name) = name {
                    // `x != null` satisfied (or `x == null` negated) means
                    // non-null; the other two combinations mean null.
                    let tests_non_null = *op == BinaryOperator::NotEq;
                    let holds = (polarity == FlowPolarity::Satisfied) == tests_non_null;
                    out.push(FlowFact::NonNull {
                        name,
                        negated: !holds,
                    });
                }
            }
            _ => {}
        }
    }

    /// Narrow `base`, the declared/computed type of `name`, by the facts.
    pub fn apply_flow_facts(&self, base: TypeId, name: Atom, facts: &[FlowFact]) -> TypeId {
        let db = self.db();
        let mut ty = base;
        for fact in facts {
            ty = match *fact {
                FlowFact::IsType {
                    name: fact_name,
                    ty: target,
                    negated,
                } if fact_name == name => {
                    if negated {
                        self.subtract_type(ty, target)
                    } else {
                        self.narrow_to(ty, target)
                    }
                }
                FlowFact::NonNull {
                    name: fact_name,
                    negated,
                } if fact_name == name => {
                    if negated {
                        // Known null: the intersection with Null.
                        if db.is_nullable(ty) {
                            db.null_type()
                        } else {
                            TypeId::NOTHING
                        }
                    } else {
                        db.non_null(ty)
                    }
                }
                _ => ty,
            };
        }
        if ty != base {
            trace!(name = name.0, from = base.0, to = ty.0, "flow narrowed");
        }
        ty
    }

    /// Keep the alternatives of `base` compatible with `target`.
    fn narrow_to(&self, base: TypeId, target: TypeId) -> TypeId {
        let db = self.db();
        if pkla_solver::is_subtype_of(db, base, target) {
            return base;
        }
        if let Some(TypeData::Union { members }) = db.lookup(base) {
            let members = self.types.type_list(members);
            let kept: Vec<TypeId> = members
                .iter()
                .copied()
                .filter(|&m| {
                    pkla_solver::is_subtype_of(db, m, target)
                        || pkla_solver::is_subtype_of(db, target, m)
                })
                .collect();
            if !kept.is_empty() {
                return db.union(kept);
            }
        }
        // The test introduces information the declaration didn't have.
        target
    }

    /// Remove the alternatives of `base` excluded by a failed `is` test.
    fn subtract_type(&self, base: TypeId, target: TypeId) -> TypeId {
        let db = self.db();
        if let Some(TypeData::Union { members }) = db.lookup(base) {
            let members = self.types.type_list(members);
            let kept: Vec<TypeId> = members
                .iter()
                .copied()
                .filter(|&m| !pkla_solver::is_subtype_of(db, m, target))
                .collect();
            return db.union(kept);
        }
        if pkla_solver::is_subtype_of(db, base, target) {
            return TypeId::NOTHING;
        }
        base
    }
}
