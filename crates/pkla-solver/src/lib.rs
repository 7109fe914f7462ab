//! Pkl type model and structural solver.
//!
//! An algebraic, interned representation of Pkl's type system plus the
//! operations the rest of the engine is built on:
//!
//! - **Interning**: O(1) type equality via `TypeId` comparison; types are
//!   immutable value objects deduplicated at construction.
//! - **Normalization**: unions are flattened and deduplicated when built,
//!   so structural equality after alias-unfolding coincides with semantic
//!   equality of inhabitant sets.
//! - **Totality**: every operation returns `unknown`/`false`/a safe default
//!   on dangling input; cycles are broken by visited sets, never by stack
//!   overflow.
//!
//! The solver is independent of the syntax tree except for declaration
//! back-references: definitions (`DefId`) carry an optional
//! `(ModuleId, NodeId)` origin so the checker can navigate back, but every
//! question the solver itself answers is closed over [`DefinitionStore`].

pub mod constraint;
pub mod db;
pub mod def;
pub mod format;
pub mod intern;
pub mod recursion;
pub mod subtype;
pub mod substitute;
pub mod types;

pub use constraint::{
    CompareOp, ConstLiteral, ConstValue, ConstraintExpr, ConstraintInfo, ConstraintVerdict,
    FloatBits, evaluate_constraint,
};
pub use db::TypeDatabase;
pub use def::{Builtins, DefId, DefKind, DefinitionInfo, DefinitionStore};
pub use format::TypeFormatter;
pub use intern::TypeInterner;
pub use recursion::{RecursionGuard, RecursionProfile, RecursionResult};
pub use substitute::{TypeParameterBindings, bindings_for, substitute};
pub use subtype::{SubtypeChecker, has_common_subtype_with, is_subtype_of};
pub use types::{ConstraintId, ConstraintListId, TypeData, TypeId, TypeListId};

#[cfg(test)]
mod tests;
