//! Refinement constraint evaluation.
//!
//! A `Constrained` type attaches boolean expressions to a base type:
//! `String(length > 3)`, `Int(isPositive)`. The annotator needs to decide
//! *statically* whether an assigned value satisfies such a constraint, so
//! this module is a partial evaluator over a small expression subset with
//! three possible outcomes per constraint: provably satisfied, provably
//! violated, or undecidable (a runtime check might still pass).
//!
//! Constraint expressions are lowered from syntax by the checker into the
//! [`ConstraintExpr`] IR; anything outside the decidable subset lowers to
//! [`ConstraintExpr::Opaque`], which always evaluates to undecidable.
//! Candidate values likewise arrive as [`ConstValue`]s, with
//! [`ConstValue::Opaque`] standing in for everything the checker could not
//! fold at compile time.

use pkla_common::{Atom, Interner};
use std::sync::Arc;

/// `f64` bit pattern, so constraint IR stays `Eq + Hash` for interning.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FloatBits(pub u64);

impl FloatBits {
    pub fn new(value: f64) -> Self {
        Self(value.to_bits())
    }

    pub fn value(self) -> f64 {
        f64::from_bits(self.0)
    }
}

/// Literal operand inside a constraint expression.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConstLiteral {
    String(Atom),
    Int(i64),
    Float(FloatBits),
    Bool(bool),
    Null,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Lt,
    Gt,
    LtEq,
    GtEq,
    Eq,
    NotEq,
}

/// Lowered constraint expression.
///
/// `Candidate` is the implicit receiver the constraint tests (`this` in
/// Pkl constraint position).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintExpr {
    Candidate,
    Literal(ConstLiteral),
    /// Property read: `length`, `isEmpty`, `isPositive`, ...
    Property {
        receiver: Box<ConstraintExpr>,
        name: Atom,
    },
    /// Method call subset: `contains`, `startsWith`, `endsWith`.
    Call {
        receiver: Box<ConstraintExpr>,
        name: Atom,
        args: Vec<ConstraintExpr>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<ConstraintExpr>,
        rhs: Box<ConstraintExpr>,
    },
    And(Box<ConstraintExpr>, Box<ConstraintExpr>),
    Or(Box<ConstraintExpr>, Box<ConstraintExpr>),
    Not(Box<ConstraintExpr>),
    /// Outside the decidable subset; always undecidable.
    Opaque,
}

/// An interned constraint: the expression plus its rendered source text
/// (used by `TypeFormatter` and in `ConstraintViolation` diagnostics).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintInfo {
    pub expr: ConstraintExpr,
    pub source: Atom,
}

/// Compile-time candidate value.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstValue {
    String(Arc<str>),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    /// Not foldable at compile time.
    Opaque,
}

/// Verdict of evaluating one constraint against one candidate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConstraintVerdict {
    Satisfied,
    Violated,
    /// Needs a runtime check; never reported as an error.
    Undecidable,
}

/// Evaluate a constraint as a boolean, three-valued.
pub fn evaluate_constraint(
    expr: &ConstraintExpr,
    candidate: &ConstValue,
    strings: &Interner,
) -> ConstraintVerdict {
    use ConstraintVerdict::*;
    match expr {
        ConstraintExpr::And(lhs, rhs) => {
            match (
                evaluate_constraint(lhs, candidate, strings),
                evaluate_constraint(rhs, candidate, strings),
            ) {
                (Violated, _) | (_, Violated) => Violated,
                (Satisfied, Satisfied) => Satisfied,
                _ => Undecidable,
            }
        }
        ConstraintExpr::Or(lhs, rhs) => {
            match (
                evaluate_constraint(lhs, candidate, strings),
                evaluate_constraint(rhs, candidate, strings),
            ) {
                (Satisfied, _) | (_, Satisfied) => Satisfied,
                (Violated, Violated) => Violated,
                _ => Undecidable,
            }
        }
        ConstraintExpr::Not(inner) => match evaluate_constraint(inner, candidate, strings) {
            Satisfied => Violated,
            Violated => Satisfied,
            Undecidable => Undecidable,
        },
        _ => match eval_value(expr, candidate, strings) {
            ConstValue::Bool(true) => Satisfied,
            ConstValue::Bool(false) => Violated,
            _ => Undecidable,
        },
    }
}

/// Value-level partial evaluation. Anything unknown folds to `Opaque`.
fn eval_value(expr: &ConstraintExpr, candidate: &ConstValue, strings: &Interner) -> ConstValue {
    match expr {
        ConstraintExpr::Candidate => candidate.clone(),
        ConstraintExpr::Literal(lit) => match lit {
            ConstLiteral::String(atom) => ConstValue::String(strings.resolve(*atom)),
            ConstLiteral::Int(i) => ConstValue::Int(*i),
            ConstLiteral::Float(f) => ConstValue::Float(f.value()),
            ConstLiteral::Bool(b) => ConstValue::Bool(*b),
            ConstLiteral::Null => ConstValue::Null,
        },
        ConstraintExpr::Property { receiver, name } => {
            let value = eval_value(receiver, candidate, strings);
            eval_property(&value, &strings.resolve(*name))
        }
        ConstraintExpr::Call {
            receiver,
            name,
            args,
        } => {
            let value = eval_value(receiver, candidate, strings);
            let args: Vec<ConstValue> = args
                .iter()
                .map(|a| eval_value(a, candidate, strings))
                .collect();
            eval_call(&value, &strings.resolve(*name), &args)
        }
        ConstraintExpr::Compare { op, lhs, rhs } => {
            let lhs = eval_value(lhs, candidate, strings);
            let rhs = eval_value(rhs, candidate, strings);
            eval_compare(*op, &lhs, &rhs)
        }
        ConstraintExpr::And(..) | ConstraintExpr::Or(..) | ConstraintExpr::Not(..) => {
            match evaluate_constraint(expr, candidate, strings) {
                ConstraintVerdict::Satisfied => ConstValue::Bool(true),
                ConstraintVerdict::Violated => ConstValue::Bool(false),
                ConstraintVerdict::Undecidable => ConstValue::Opaque,
            }
        }
        ConstraintExpr::Opaque => ConstValue::Opaque,
    }
}

fn eval_property(receiver: &ConstValue, name: &str) -> ConstValue {
    match (receiver, name) {
        (ConstValue::String(s), "length") => ConstValue::Int(s.chars().count() as i64),
        (ConstValue::String(s), "isEmpty") => ConstValue::Bool(s.is_empty()),
        (ConstValue::String(s), "isBlank") => {
            ConstValue::Bool(s.chars().all(char::is_whitespace))
        }
        (ConstValue::Int(i), "isPositive") => ConstValue::Bool(*i > 0),
        (ConstValue::Int(i), "isNonZero") => ConstValue::Bool(*i != 0),
        (ConstValue::Int(i), "isEven") => ConstValue::Bool(i % 2 == 0),
        (ConstValue::Int(i), "isOdd") => ConstValue::Bool(i % 2 != 0),
        (ConstValue::Float(f), "isPositive") => ConstValue::Bool(*f > 0.0),
        (ConstValue::Float(f), "isNonZero") => ConstValue::Bool(*f != 0.0),
        (ConstValue::Float(f), "isFinite") => ConstValue::Bool(f.is_finite()),
        _ => ConstValue::Opaque,
    }
}

fn eval_call(receiver: &ConstValue, name: &str, args: &[ConstValue]) -> ConstValue {
    match (receiver, name, args) {
        (ConstValue::String(s), "contains", [ConstValue::String(n)]) => {
            ConstValue::Bool(s.contains(&**n))
        }
        (ConstValue::String(s), "startsWith", [ConstValue::String(n)]) => {
            ConstValue::Bool(s.starts_with(&**n))
        }
        (ConstValue::String(s), "endsWith", [ConstValue::String(n)]) => {
            ConstValue::Bool(s.ends_with(&**n))
        }
        (ConstValue::Int(i), "isBetween", [ConstValue::Int(lo), ConstValue::Int(hi)]) => {
            ConstValue::Bool(lo <= i && i <= hi)
        }
        // `matches(Regex(...))` and everything else needs runtime support.
        _ => ConstValue::Opaque,
    }
}

fn eval_compare(op: CompareOp, lhs: &ConstValue, rhs: &ConstValue) -> ConstValue {
    use ConstValue::*;
    // Equality is defined across all known values; ordering only on numbers.
    match op {
        CompareOp::Eq | CompareOp::NotEq => {
            let equal = match (lhs, rhs) {
                (Opaque, _) | (_, Opaque) => return Opaque,
                (Int(a), Int(b)) => a == b,
                (Float(a), Float(b)) => a == b,
                (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
                (String(a), String(b)) => a == b,
                (Bool(a), Bool(b)) => a == b,
                (Null, Null) => true,
                _ => false,
            };
            Bool(if op == CompareOp::Eq { equal } else { !equal })
        }
        CompareOp::Lt | CompareOp::Gt | CompareOp::LtEq | CompareOp::GtEq => {
            let (a, b) = match (lhs, rhs) {
                (Int(a), Int(b)) => (*a as f64, *b as f64),
                (Float(a), Float(b)) => (*a, *b),
                (Int(a), Float(b)) => (*a as f64, *b),
                (Float(a), Int(b)) => (*a, *b as f64),
                _ => return Opaque,
            };
            let holds = match op {
                CompareOp::Lt => a < b,
                CompareOp::Gt => a > b,
                CompareOp::LtEq => a <= b,
                CompareOp::GtEq => a >= b,
                // Handled by the equality arm above.
                CompareOp::Eq | CompareOp::NotEq => return Opaque,
            };
            Bool(holds)
        }
    }
}
