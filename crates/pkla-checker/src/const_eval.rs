//! Compile-time folding of candidate value expressions.
//!
//! The constraint checker needs a concrete value to test `String(length >
//! 3)`-style refinements against. This folds the trivially-constant
//! expression subset to a [`ConstValue`]; everything else — reads, method
//! calls, references to non-literal properties — is `Opaque`, which makes
//! every constraint on it undecidable (no diagnostic).

use crate::analyzer::{Analyzer, Ctx, Position};
use pkla_solver::ConstValue;
use pkla_syntax::{BinaryOperator, NodeData, UnaryOperator};
use std::sync::Arc;

impl Analyzer {
    pub(crate) fn const_eval(&self, position: Position, ctx: Ctx) -> ConstValue {
        self.const_eval_at(position, ctx, 0)
    }

    fn const_eval_at(&self, position: Position, ctx: Ctx, depth: u32) -> ConstValue {
        if depth > 32 {
            return ConstValue::Opaque;
        }
        let Some(tree) = self.graph.tree(position.module) else {
            return ConstValue::Opaque;
        };
        let at = |node| Position::new(position.module, node);
        match tree.data(position.node) {
            NodeData::NullLiteral => ConstValue::Null,
            NodeData::BoolLiteral(b) => ConstValue::Bool(*b),
            NodeData::IntLiteral(i) => ConstValue::Int(*i),
            NodeData::FloatLiteral(f) => ConstValue::Float(*f),
            NodeData::StringLiteral(s) => ConstValue::String(self.strings.resolve(*s)),
            NodeData::Parenthesized { inner } => self.const_eval_at(at(*inner), ctx, depth + 1),
            NodeData::InterpolatedString { parts } => {
                let mut joined = String::new();
                for &part in parts {
                    match self.const_eval_at(at(part), ctx, depth + 1) {
                        ConstValue::String(s) => joined.push_str(&s),
                        ConstValue::Int(i) => joined.push_str(&i.to_string()),
                        ConstValue::Float(f) => joined.push_str(&f.to_string()),
                        ConstValue::Bool(b) => joined.push_str(if b { "true" } else { "false" }),
                        _ => return ConstValue::Opaque,
                    }
                }
                ConstValue::String(Arc::from(joined.as_str()))
            }
            NodeData::UnaryOp { op, operand } => {
                let value = self.const_eval_at(at(*operand), ctx, depth + 1);
                match (op, value) {
                    (UnaryOperator::Neg, ConstValue::Int(i)) => ConstValue::Int(-i),
                    (UnaryOperator::Neg, ConstValue::Float(f)) => ConstValue::Float(-f),
                    (UnaryOperator::Not, ConstValue::Bool(b)) => ConstValue::Bool(!b),
                    _ => ConstValue::Opaque,
                }
            }
            NodeData::BinaryOp { op, lhs, rhs } => {
                let lhs = self.const_eval_at(at(*lhs), ctx, depth + 1);
                let rhs = self.const_eval_at(at(*rhs), ctx, depth + 1);
                fold_binary(*op, lhs, rhs)
            }
            _ => ConstValue::Opaque,
        }
    }
}

fn fold_binary(op: BinaryOperator, lhs: ConstValue, rhs: ConstValue) -> ConstValue {
    use ConstValue::*;
    match op {
        BinaryOperator::Add => match (lhs, rhs) {
            (Int(a), Int(b)) => Int(a.wrapping_add(b)),
            (Float(a), Float(b)) => Float(a + b),
            (Int(a), Float(b)) => Float(a as f64 + b),
            (Float(a), Int(b)) => Float(a + b as f64),
            (String(a), String(b)) => String(Arc::from(format!("{a}{b}").as_str())),
            _ => Opaque,
        },
        BinaryOperator::Sub => match (lhs, rhs) {
            (Int(a), Int(b)) => Int(a.wrapping_sub(b)),
            (Float(a), Float(b)) => Float(a - b),
            (Int(a), Float(b)) => Float(a as f64 - b),
            (Float(a), Int(b)) => Float(a - b as f64),
            _ => Opaque,
        },
        BinaryOperator::Mul => match (lhs, rhs) {
            (Int(a), Int(b)) => Int(a.wrapping_mul(b)),
            (Float(a), Float(b)) => Float(a * b),
            (Int(a), Float(b)) => Float(a as f64 * b),
            (Float(a), Int(b)) => Float(a * b as f64),
            _ => Opaque,
        },
        BinaryOperator::And => match (lhs, rhs) {
            (Bool(a), Bool(b)) => Bool(a && b),
            _ => Opaque,
        },
        BinaryOperator::Or => match (lhs, rhs) {
            (Bool(a), Bool(b)) => Bool(a || b),
            _ => Opaque,
        },
        BinaryOperator::NullCoalesce => match lhs {
            Null => rhs,
            Opaque => Opaque,
            known => known,
        },
        // Division, comparison and the rest stay runtime concerns here;
        // the constraint evaluator has its own comparison folding.
        _ => Opaque,
    }
}
