//! Typed Pkl syntax tree access layer.
//!
//! The semantic engine does not parse Pkl. The host (an IDE platform, a
//! language server, or a test) materializes each module as a [`SyntaxTree`]:
//! an arena of typed nodes with stable [`NodeId`] identity, parent links and
//! child navigation. Node kinds form a closed sum ([`NodeData`]) so every
//! traversal in the resolver and inference engine is an exhaustive match —
//! adding a node kind forces every walk to be revisited.
//!
//! Trees are immutable once built. An edit produces a new tree; derived
//! facts keyed by the old tree are invalidated by the binder.

pub mod nodes;
pub mod tree;

pub use nodes::{
    Annotation, BinaryOperator, ClassDecl, ImportDecl, MethodDecl, Modifiers, ModuleClause,
    ModuleClauseKind, ModuleDecl, NodeData, ObjectBody, ParamDecl, PropertyDecl, TypeAliasDecl,
    TypeParamDecl, UnaryOperator, Variance,
};
pub use tree::{NodeId, SyntaxTree, TreeBuilder};
