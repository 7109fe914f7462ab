//! Name resolution and type inference.
//!
//! [`Analyzer`] is the engine's external surface: it bundles the string
//! interner, type interner, definition store and module graph, and answers
//! the queries a host consumes —
//!
//! - `resolve_first` / `collect_visible`: lexical resolution from a
//!   position, walking enclosing scopes in fixed precedence order with a
//!   pluggable visitor
//! - `type_of_expr` / `type_of_declaration`: structural type computation
//! - `this_type_at`: the implicit receiver type, through amend/extends
//!   chains and nested object bodies
//! - `expected_type_at`: the contextual type of an expression's slot
//! - `check_module`: the diagnostic pass (mismatches, constraint
//!   violations, invalid amendments, const/fixed rules)
//!
//! Every query is total and safe under concurrent callers; derived state is
//! memoized per `(subject, project-context)`.

pub mod analyzer;
pub mod check;
pub mod const_eval;
pub mod expected_type;
pub mod expr_type;
pub mod flow;
pub mod infer;
pub mod lower;
pub mod members;
pub mod resolver;
pub mod this_type;

pub use analyzer::{Analyzer, EngineOptions, Position};
pub use flow::{FlowFact, FlowPolarity};
pub use resolver::{
    CollectVisitor, DeclarationRef, FirstMatchVisitor, ResolveKind, ResolveVisitor, ScopeOrigin,
};
