//! Node kinds.
//!
//! One closed sum type covers declarations, object-body members,
//! expressions and type annotations. Expression and type nodes are plain
//! variants rather than nested enums so that a `NodeId` can point at any of
//! them uniformly; the checker's dispatch matches on [`NodeData`] directly.

use crate::tree::NodeId;
use pkla_common::Atom;
use smallvec::SmallVec;

bitflags::bitflags! {
    /// Declaration modifiers.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u16 {
        const ABSTRACT  = 1 << 0;
        const OPEN      = 1 << 1;
        const EXTERNAL  = 1 << 2;
        const HIDDEN    = 1 << 3;
        const LOCAL     = 1 << 4;
        const FIXED     = 1 << 5;
        const CONST     = 1 << 6;
        /// Carried from an `@Deprecated` annotation.
        const DEPRECATED = 1 << 7;
    }
}

/// Declared variance of a type parameter (`in` / `out`).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Variance {
    #[default]
    Invariant,
    /// `out T`
    Covariant,
    /// `in T`
    Contravariant,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ModuleClauseKind {
    Extends,
    Amends,
}

/// `extends "uri"` / `amends "uri"` module header clause.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleClause {
    pub kind: ModuleClauseKind,
    pub uri: Atom,
}

/// `@Name { key = value; ... }` annotation.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub name: Atom,
    /// Entry values are expression nodes.
    pub entries: Vec<(Atom, NodeId)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModuleDecl {
    /// Declared module name (`module com.example.Foo`), if any.
    pub name: Option<Atom>,
    pub clause: Option<ModuleClause>,
    pub annotations: Vec<Annotation>,
    /// Import declaration nodes.
    pub imports: Vec<NodeId>,
    /// Property, method, class and type-alias declaration nodes.
    pub members: Vec<NodeId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImportDecl {
    pub uri: Atom,
    /// `import "foo.pkl" as bar`
    pub alias: Option<Atom>,
    /// `import*` glob form.
    pub is_glob: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassDecl {
    pub name: Atom,
    pub modifiers: Modifiers,
    /// Type parameter declaration nodes.
    pub type_params: Vec<NodeId>,
    /// Type annotation node of the `extends` clause.
    pub supertype: Option<NodeId>,
    /// Property and method declaration nodes.
    pub members: Vec<NodeId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeAliasDecl {
    pub name: Atom,
    pub modifiers: Modifiers,
    pub type_params: Vec<NodeId>,
    /// Type annotation node of the aliased type.
    pub body: NodeId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeParamDecl {
    pub name: Atom,
    pub variance: Variance,
}

/// A property declaration or an object-body property override.
///
/// `value` and `body` are mutually exclusive in well-formed trees:
/// `foo = expr` versus `foo { ... }` (amending definition).
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyDecl {
    pub name: Atom,
    pub modifiers: Modifiers,
    /// Type annotation node.
    pub type_ann: Option<NodeId>,
    /// Assigned expression node.
    pub value: Option<NodeId>,
    /// Amending object body node.
    pub body: Option<NodeId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodDecl {
    pub name: Atom,
    pub modifiers: Modifiers,
    pub type_params: Vec<NodeId>,
    /// Parameter declaration nodes.
    pub params: Vec<NodeId>,
    /// Whether the trailing parameter is variadic (`varargs`-style tail).
    pub variadic: bool,
    pub return_ann: Option<NodeId>,
    /// Body expression node (absent for `external` methods).
    pub body: Option<NodeId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParamDecl {
    pub name: Atom,
    pub type_ann: Option<NodeId>,
}

/// Object body: `{ members... }` of an amend/new expression or amending
/// property definition.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectBody {
    /// Body parameters (`{ key, value -> ... }` forms).
    pub params: Vec<NodeId>,
    pub members: Vec<NodeId>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    Pow,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Eq,
    NotEq,
    And,
    Or,
    /// `??`
    NullCoalesce,
    /// `|>`
    Pipe,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    /// `!`
    Not,
    /// unary `-`
    Neg,
    /// `!!` non-null assertion
    NonNull,
}

/// The closed node sum.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeData {
    // ----- Declarations -----
    Module(ModuleDecl),
    Import(ImportDecl),
    Class(ClassDecl),
    TypeAlias(TypeAliasDecl),
    TypeParam(TypeParamDecl),
    Property(PropertyDecl),
    Method(MethodDecl),
    Param(ParamDecl),

    // ----- Object bodies -----
    ObjectBody(ObjectBody),
    /// Listing element: a bare expression member.
    ObjectElement { value: NodeId },
    /// Mapping entry: `[key] = value`.
    ObjectEntry { key: NodeId, value: NodeId },
    /// `...expr` spread.
    ObjectSpread { value: NodeId },
    /// `for (k, v in iterable) { body }`. `key_param` is absent in the
    /// single-variable form.
    ForGenerator {
        key_param: Option<NodeId>,
        value_param: NodeId,
        iterable: NodeId,
        body: NodeId,
    },
    /// `when (condition) { body } else { else_body }`.
    WhenGenerator {
        condition: NodeId,
        body: NodeId,
        else_body: Option<NodeId>,
    },

    // ----- Expressions -----
    NullLiteral,
    BoolLiteral(bool),
    IntLiteral(i64),
    FloatLiteral(f64),
    /// Constant string (no interpolation).
    StringLiteral(Atom),
    /// Interpolated string; parts are expression nodes.
    InterpolatedString { parts: Vec<NodeId> },
    ThisExpr,
    ModuleExpr,
    /// Bare name, with arguments when it is a method call:
    /// `foo` / `foo(a, b)`.
    UnqualifiedAccess {
        name: Atom,
        args: Option<Vec<NodeId>>,
    },
    /// `receiver.name` / `receiver.name(args)` / `receiver?.name`.
    QualifiedAccess {
        receiver: NodeId,
        name: Atom,
        args: Option<Vec<NodeId>>,
        nullable: bool,
    },
    /// `super.name` / `super.name(args)`.
    SuperAccess {
        name: Atom,
        args: Option<Vec<NodeId>>,
    },
    /// `receiver[index]`.
    Subscript { receiver: NodeId, index: NodeId },
    /// `new Type { ... }`; `ty` is absent for `new { ... }` (contextual).
    NewExpr { ty: Option<NodeId>, body: NodeId },
    /// `parentExpr { ... }` amend expression.
    AmendExpr { parent: NodeId, body: NodeId },
    IfExpr {
        condition: NodeId,
        then_branch: NodeId,
        else_branch: NodeId,
    },
    /// `let (param = value) body`.
    LetExpr {
        param: NodeId,
        value: NodeId,
        body: NodeId,
    },
    /// `(params) -> body`.
    FunctionLiteral { params: Vec<NodeId>, body: NodeId },
    Parenthesized { inner: NodeId },
    /// `expr is Type` (`negated` when rewritten from `!(... is ...)`).
    TypeTest { value: NodeId, ty: NodeId },
    /// `expr as Type`.
    TypeCast { value: NodeId, ty: NodeId },
    BinaryOp {
        op: BinaryOperator,
        lhs: NodeId,
        rhs: NodeId,
    },
    UnaryOp { op: UnaryOperator, operand: NodeId },
    /// `throw(expr)`; the expression's type is `nothing`.
    ThrowExpr { message: NodeId },

    // ----- Type annotations -----
    UnknownType,
    NothingType,
    /// The `module` type.
    ModuleType,
    /// `Name<Args>` or `mod.Name<Args>`.
    DeclaredType {
        qualifier: Option<Atom>,
        name: Atom,
        args: Vec<NodeId>,
    },
    /// `T?`
    NullableType { inner: NodeId },
    /// `A|B`
    UnionType { lhs: NodeId, rhs: NodeId },
    /// `*T` default-marked union alternative.
    DefaultedType { inner: NodeId },
    /// `(A, B) -> R`
    FunctionType { params: Vec<NodeId>, ret: NodeId },
    /// `Base(c1, c2)` refinement; constraints are expression nodes.
    ConstrainedType {
        base: NodeId,
        constraints: Vec<NodeId>,
    },
    /// `"literal"` string-literal type.
    StringLiteralType(Atom),
    ParenthesizedType { inner: NodeId },
}

impl NodeData {
    /// Child nodes in source order. Drives parent-link computation and
    /// generic downward traversal; must stay exhaustive.
    pub fn children(&self) -> SmallVec<[NodeId; 4]> {
        let mut out = SmallVec::new();
        match self {
            NodeData::Module(m) => {
                out.extend(m.annotations.iter().flat_map(|a| a.entries.iter().map(|(_, v)| *v)));
                out.extend(m.imports.iter().copied());
                out.extend(m.members.iter().copied());
            }
            NodeData::Import(_) => {}
            NodeData::Class(c) => {
                out.extend(c.type_params.iter().copied());
                out.extend(c.supertype);
                out.extend(c.members.iter().copied());
            }
            NodeData::TypeAlias(a) => {
                out.extend(a.type_params.iter().copied());
                out.push(a.body);
            }
            NodeData::TypeParam(_) => {}
            NodeData::Property(p) => {
                out.extend(p.type_ann);
                out.extend(p.value);
                out.extend(p.body);
            }
            NodeData::Method(m) => {
                out.extend(m.type_params.iter().copied());
                out.extend(m.params.iter().copied());
                out.extend(m.return_ann);
                out.extend(m.body);
            }
            NodeData::Param(p) => out.extend(p.type_ann),
            NodeData::ObjectBody(b) => {
                out.extend(b.params.iter().copied());
                out.extend(b.members.iter().copied());
            }
            NodeData::ObjectElement { value } | NodeData::ObjectSpread { value } => {
                out.push(*value);
            }
            NodeData::ObjectEntry { key, value } => {
                out.push(*key);
                out.push(*value);
            }
            NodeData::ForGenerator {
                key_param,
                value_param,
                iterable,
                body,
            } => {
                out.extend(*key_param);
                out.push(*value_param);
                out.push(*iterable);
                out.push(*body);
            }
            NodeData::WhenGenerator {
                condition,
                body,
                else_body,
            } => {
                out.push(*condition);
                out.push(*body);
                out.extend(*else_body);
            }
            NodeData::NullLiteral
            | NodeData::BoolLiteral(_)
            | NodeData::IntLiteral(_)
            | NodeData::FloatLiteral(_)
            | NodeData::StringLiteral(_)
            | NodeData::ThisExpr
            | NodeData::ModuleExpr => {}
            NodeData::InterpolatedString { parts } => out.extend(parts.iter().copied()),
            NodeData::UnqualifiedAccess { args, .. } => {
                if let Some(args) = args {
                    out.extend(args.iter().copied());
                }
            }
            NodeData::QualifiedAccess { receiver, args, .. } => {
                out.push(*receiver);
                if let Some(args) = args {
                    out.extend(args.iter().copied());
                }
            }
            NodeData::SuperAccess { args, .. } => {
                if let Some(args) = args {
                    out.extend(args.iter().copied());
                }
            }
            NodeData::Subscript { receiver, index } => {
                out.push(*receiver);
                out.push(*index);
            }
            NodeData::NewExpr { ty, body } => {
                out.extend(*ty);
                out.push(*body);
            }
            NodeData::AmendExpr { parent, body } => {
                out.push(*parent);
                out.push(*body);
            }
            NodeData::IfExpr {
                condition,
                then_branch,
                else_branch,
            } => {
                out.push(*condition);
                out.push(*then_branch);
                out.push(*else_branch);
            }
            NodeData::LetExpr { param, value, body } => {
                out.push(*param);
                out.push(*value);
                out.push(*body);
            }
            NodeData::FunctionLiteral { params, body } => {
                out.extend(params.iter().copied());
                out.push(*body);
            }
            NodeData::Parenthesized { inner } => out.push(*inner),
            NodeData::TypeTest { value, ty } | NodeData::TypeCast { value, ty } => {
                out.push(*value);
                out.push(*ty);
            }
            NodeData::BinaryOp { lhs, rhs, .. } => {
                out.push(*lhs);
                out.push(*rhs);
            }
            NodeData::UnaryOp { operand, .. } => out.push(*operand),
            NodeData::ThrowExpr { message } => out.push(*message),
            NodeData::UnknownType | NodeData::NothingType | NodeData::ModuleType => {}
            NodeData::DeclaredType { args, .. } => out.extend(args.iter().copied()),
            NodeData::NullableType { inner }
            | NodeData::DefaultedType { inner }
            | NodeData::ParenthesizedType { inner } => out.push(*inner),
            NodeData::UnionType { lhs, rhs } => {
                out.push(*lhs);
                out.push(*rhs);
            }
            NodeData::FunctionType { params, ret } => {
                out.extend(params.iter().copied());
                out.push(*ret);
            }
            NodeData::ConstrainedType { base, constraints } => {
                out.push(*base);
                out.extend(constraints.iter().copied());
            }
            NodeData::StringLiteralType(_) => {}
        }
        out
    }

    /// Whether this node is an expression (versus declaration, body member
    /// or type annotation).
    pub fn is_expr(&self) -> bool {
        matches!(
            self,
            NodeData::NullLiteral
                | NodeData::BoolLiteral(_)
                | NodeData::IntLiteral(_)
                | NodeData::FloatLiteral(_)
                | NodeData::StringLiteral(_)
                | NodeData::InterpolatedString { .. }
                | NodeData::ThisExpr
                | NodeData::ModuleExpr
                | NodeData::UnqualifiedAccess { .. }
                | NodeData::QualifiedAccess { .. }
                | NodeData::SuperAccess { .. }
                | NodeData::Subscript { .. }
                | NodeData::NewExpr { .. }
                | NodeData::AmendExpr { .. }
                | NodeData::IfExpr { .. }
                | NodeData::LetExpr { .. }
                | NodeData::FunctionLiteral { .. }
                | NodeData::Parenthesized { .. }
                | NodeData::TypeTest { .. }
                | NodeData::TypeCast { .. }
                | NodeData::BinaryOp { .. }
                | NodeData::UnaryOp { .. }
                | NodeData::ThrowExpr { .. }
        )
    }

    /// Whether this node is a type annotation.
    pub fn is_type_node(&self) -> bool {
        matches!(
            self,
            NodeData::UnknownType
                | NodeData::NothingType
                | NodeData::ModuleType
                | NodeData::DeclaredType { .. }
                | NodeData::NullableType { .. }
                | NodeData::UnionType { .. }
                | NodeData::DefaultedType { .. }
                | NodeData::FunctionType { .. }
                | NodeData::ConstrainedType { .. }
                | NodeData::StringLiteralType(_)
                | NodeData::ParenthesizedType { .. }
        )
    }
}
