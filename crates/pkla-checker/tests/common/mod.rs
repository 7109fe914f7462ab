//! Shared test fixtures: an in-memory host and tree-building shorthand.

#![allow(dead_code)]

use pkla_binder::{MemoryLoader, ModuleGraph, ModuleId};
use pkla_checker::Analyzer;
use pkla_common::{Atom, Interner};
use pkla_syntax::{
    ClassDecl, ImportDecl, MethodDecl, Modifiers, ModuleClause, ModuleClauseKind, ModuleDecl,
    NodeData, NodeId, ParamDecl, PropertyDecl, SyntaxTree, TreeBuilder, TypeAliasDecl,
    TypeParamDecl, Variance,
};
use std::sync::Arc;

pub struct Host {
    pub interner: Arc<Interner>,
    pub loader: Arc<MemoryLoader>,
    pub analyzer: Analyzer,
}

pub fn host() -> Host {
    let interner = Arc::new(Interner::new());
    let loader = Arc::new(MemoryLoader::new());
    let graph = Arc::new(ModuleGraph::new(loader.clone(), interner.clone()));
    let analyzer = Analyzer::new(graph, interner.clone());
    Host {
        interner,
        loader,
        analyzer,
    }
}

impl Host {
    pub fn atom(&self, text: &str) -> Atom {
        self.interner.intern(text)
    }

    pub fn add(&self, uri: &str, tree: SyntaxTree) -> ModuleId {
        self.loader.register(uri, Arc::new(tree));
        self.analyzer
            .graph
            .resolve_uri(uri, None)
            .expect("registered module must resolve")
    }
}

// -----------------------------------------------------------------------------
// Tree-building shorthand
// -----------------------------------------------------------------------------

pub struct Tb<'a> {
    pub b: TreeBuilder,
    pub i: &'a Interner,
}

pub fn tb(i: &Interner) -> Tb<'_> {
    Tb {
        b: TreeBuilder::new(),
        i,
    }
}

impl<'a> Tb<'a> {
    pub fn atom(&self, s: &str) -> Atom {
        self.i.intern(s)
    }

    pub fn module(self, clause: Option<(ModuleClauseKind, &str)>, members: Vec<NodeId>) -> SyntaxTree {
        self.module_with_imports(clause, Vec::new(), members)
    }

    pub fn module_with_imports(
        mut self,
        clause: Option<(ModuleClauseKind, &str)>,
        imports: Vec<NodeId>,
        members: Vec<NodeId>,
    ) -> SyntaxTree {
        let clause = clause.map(|(kind, uri)| ModuleClause {
            kind,
            uri: self.atom(uri),
        });
        let root = self.b.n(NodeData::Module(ModuleDecl {
            name: None,
            clause,
            annotations: Vec::new(),
            imports,
            members,
        }));
        self.b.finish(root)
    }

    pub fn import(&mut self, uri: &str, alias: Option<&str>, is_glob: bool) -> NodeId {
        let uri = self.atom(uri);
        let alias = alias.map(|a| self.atom(a));
        self.b.n(NodeData::Import(ImportDecl {
            uri,
            alias,
            is_glob,
        }))
    }

    pub fn prop(&mut self, name: &str, ann: Option<NodeId>, value: Option<NodeId>) -> NodeId {
        self.prop_full(name, Modifiers::empty(), ann, value, None)
    }

    pub fn prop_body(&mut self, name: &str, ann: Option<NodeId>, body: NodeId) -> NodeId {
        self.prop_full(name, Modifiers::empty(), ann, None, Some(body))
    }

    pub fn prop_full(
        &mut self,
        name: &str,
        modifiers: Modifiers,
        ann: Option<NodeId>,
        value: Option<NodeId>,
        body: Option<NodeId>,
    ) -> NodeId {
        let name = self.atom(name);
        self.b.n(NodeData::Property(PropertyDecl {
            name,
            modifiers,
            type_ann: ann,
            value,
            body,
        }))
    }

    pub fn class(
        &mut self,
        name: &str,
        modifiers: Modifiers,
        supertype: Option<NodeId>,
        members: Vec<NodeId>,
    ) -> NodeId {
        self.class_generic(name, modifiers, Vec::new(), supertype, members)
    }

    pub fn class_generic(
        &mut self,
        name: &str,
        modifiers: Modifiers,
        type_params: Vec<NodeId>,
        supertype: Option<NodeId>,
        members: Vec<NodeId>,
    ) -> NodeId {
        let name = self.atom(name);
        self.b.n(NodeData::Class(ClassDecl {
            name,
            modifiers,
            type_params,
            supertype,
            members,
        }))
    }

    pub fn type_alias(&mut self, name: &str, body: NodeId) -> NodeId {
        let name = self.atom(name);
        self.b.n(NodeData::TypeAlias(TypeAliasDecl {
            name,
            modifiers: Modifiers::empty(),
            type_params: Vec::new(),
            body,
        }))
    }

    pub fn type_param(&mut self, name: &str) -> NodeId {
        let name = self.atom(name);
        self.b.n(NodeData::TypeParam(TypeParamDecl {
            name,
            variance: Variance::Invariant,
        }))
    }

    pub fn method(
        &mut self,
        name: &str,
        type_params: Vec<NodeId>,
        params: Vec<NodeId>,
        variadic: bool,
        return_ann: Option<NodeId>,
        body: Option<NodeId>,
    ) -> NodeId {
        let name = self.atom(name);
        self.b.n(NodeData::Method(MethodDecl {
            name,
            modifiers: Modifiers::empty(),
            type_params,
            params,
            variadic,
            return_ann,
            body,
        }))
    }

    pub fn param(&mut self, name: &str, ann: Option<NodeId>) -> NodeId {
        let name = self.atom(name);
        self.b.n(NodeData::Param(ParamDecl {
            name,
            type_ann: ann,
        }))
    }

    // ----- type annotations -----

    pub fn ty(&mut self, name: &str) -> NodeId {
        self.ty_args(name, Vec::new())
    }

    pub fn ty_args(&mut self, name: &str, args: Vec<NodeId>) -> NodeId {
        let name = self.atom(name);
        self.b.n(NodeData::DeclaredType {
            qualifier: None,
            name,
            args,
        })
    }

    pub fn ty_qualified(&mut self, qualifier: &str, name: &str) -> NodeId {
        let qualifier = self.atom(qualifier);
        let name = self.atom(name);
        self.b.n(NodeData::DeclaredType {
            qualifier: Some(qualifier),
            name,
            args: Vec::new(),
        })
    }

    pub fn ty_nullable(&mut self, inner: NodeId) -> NodeId {
        self.b.n(NodeData::NullableType { inner })
    }

    pub fn ty_union(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.b.n(NodeData::UnionType { lhs, rhs })
    }

    pub fn ty_constrained(&mut self, base: NodeId, constraints: Vec<NodeId>) -> NodeId {
        self.b.n(NodeData::ConstrainedType { base, constraints })
    }

    // ----- expressions -----

    pub fn int(&mut self, value: i64) -> NodeId {
        self.b.n(NodeData::IntLiteral(value))
    }

    pub fn float(&mut self, value: f64) -> NodeId {
        self.b.n(NodeData::FloatLiteral(value))
    }

    pub fn string(&mut self, value: &str) -> NodeId {
        let value = self.atom(value);
        self.b.n(NodeData::StringLiteral(value))
    }

    pub fn null(&mut self) -> NodeId {
        self.b.n(NodeData::NullLiteral)
    }

    pub fn access(&mut self, name: &str) -> NodeId {
        let name = self.atom(name);
        self.b.n(NodeData::UnqualifiedAccess { name, args: None })
    }

    pub fn call(&mut self, name: &str, args: Vec<NodeId>) -> NodeId {
        let name = self.atom(name);
        self.b.n(NodeData::UnqualifiedAccess {
            name,
            args: Some(args),
        })
    }

    pub fn qualified(&mut self, receiver: NodeId, name: &str, nullable: bool) -> NodeId {
        let name = self.atom(name);
        self.b.n(NodeData::QualifiedAccess {
            receiver,
            name,
            args: None,
            nullable,
        })
    }

    pub fn binop(
        &mut self,
        op: pkla_syntax::BinaryOperator,
        lhs: NodeId,
        rhs: NodeId,
    ) -> NodeId {
        self.b.n(NodeData::BinaryOp { op, lhs, rhs })
    }

    pub fn not(&mut self, operand: NodeId) -> NodeId {
        self.b.n(NodeData::UnaryOp {
            op: pkla_syntax::UnaryOperator::Not,
            operand,
        })
    }

    pub fn is_type(&mut self, value: NodeId, ty: NodeId) -> NodeId {
        self.b.n(NodeData::TypeTest { value, ty })
    }

    pub fn if_expr(&mut self, condition: NodeId, then_branch: NodeId, else_branch: NodeId) -> NodeId {
        self.b.n(NodeData::IfExpr {
            condition,
            then_branch,
            else_branch,
        })
    }

    pub fn body(&mut self, members: Vec<NodeId>) -> NodeId {
        self.b.n(NodeData::ObjectBody(pkla_syntax::ObjectBody {
            params: Vec::new(),
            members,
        }))
    }

    pub fn element(&mut self, value: NodeId) -> NodeId {
        self.b.n(NodeData::ObjectElement { value })
    }

    pub fn new_expr(&mut self, ty: Option<NodeId>, body: NodeId) -> NodeId {
        self.b.n(NodeData::NewExpr { ty, body })
    }

    pub fn amend_expr(&mut self, parent: NodeId, body: NodeId) -> NodeId {
        self.b.n(NodeData::AmendExpr { parent, body })
    }

    pub fn for_gen(
        &mut self,
        key_param: Option<NodeId>,
        value_param: NodeId,
        iterable: NodeId,
        body: NodeId,
    ) -> NodeId {
        self.b.n(NodeData::ForGenerator {
            key_param,
            value_param,
            iterable,
            body,
        })
    }

    pub fn when_gen(&mut self, condition: NodeId, body: NodeId) -> NodeId {
        self.b.n(NodeData::WhenGenerator {
            condition,
            body,
            else_body: None,
        })
    }

    pub fn let_expr(&mut self, param: NodeId, value: NodeId, body: NodeId) -> NodeId {
        self.b.n(NodeData::LetExpr { param, value, body })
    }

    pub fn lambda(&mut self, params: Vec<NodeId>, body: NodeId) -> NodeId {
        self.b.n(NodeData::FunctionLiteral { params, body })
    }
}
