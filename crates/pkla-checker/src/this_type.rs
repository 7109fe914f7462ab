//! This-type computation.
//!
//! The apparent type of the implicit receiver at a lexical position. For a
//! position inside an object body this is whatever the body amends or
//! instantiates — a class, a module, `Dynamic`, a `Listing`/`Mapping`
//! element — computed bottom-up through arbitrarily nested bodies. For a
//! class or module member position it is that class's/module's own type,
//! which is what makes bare member access inside method bodies work.
//!
//! This computation and member resolution are mutually recursive (an
//! amending property's declared type comes from the parent's member
//! table, which may require the enclosing this-type); recursion is broken
//! by an explicit depth budget, never the call stack.

use crate::analyzer::{Analyzer, Ctx, Position};
use crate::resolver::ResolveKind;
use pkla_common::limits::MAX_THIS_TYPE_DEPTH;
use pkla_solver::TypeId;
use pkla_syntax::{NodeData, NodeId};

impl Analyzer {
    /// The implicit receiver type at a position.
    pub fn this_type_at(&self, position: Position, ctx: Ctx) -> TypeId {
        self.this_type_inner(position, ctx, 0)
    }

    pub(crate) fn this_type_inner(&self, position: Position, ctx: Ctx, depth: u32) -> TypeId {
        if depth > MAX_THIS_TYPE_DEPTH {
            return TypeId::UNKNOWN;
        }
        let Some(tree) = self.graph.tree(position.module) else {
            return TypeId::UNKNOWN;
        };
        for node in std::iter::once(position.node).chain(tree.ancestors(position.node)) {
            match tree.data(node) {
                NodeData::ObjectBody(_) => {
                    return self.body_this_type(position.module, node, ctx, depth);
                }
                NodeData::Class(class) => {
                    let def = self.lower_def(position.module, node, ctx);
                    if !def.is_valid() {
                        return TypeId::UNKNOWN;
                    }
                    // Inside a class body, `this` is the class applied to
                    // its own type parameters.
                    let args: Vec<TypeId> = class
                        .type_params
                        .iter()
                        .map(|&tp| {
                            let tp_def = self.lower_def(position.module, tp, ctx);
                            if tp_def.is_valid() {
                                self.types.variable(tp_def)
                            } else {
                                TypeId::UNKNOWN
                            }
                        })
                        .collect();
                    return self.types.class(def, &args);
                }
                NodeData::Module(_) => {
                    return self.module_type(position.module, ctx);
                }
                _ => {}
            }
        }
        TypeId::UNKNOWN
    }

    /// What an object body amends or instantiates.
    fn body_this_type(
        &self,
        module: pkla_binder::ModuleId,
        body: NodeId,
        ctx: Ctx,
        depth: u32,
    ) -> TypeId {
        let Some(tree) = self.graph.tree(module) else {
            return TypeId::UNKNOWN;
        };
        let Some(parent) = tree.parent(body) else {
            return TypeId::UNKNOWN;
        };
        match tree.data(parent) {
            NodeData::NewExpr { ty: Some(ty), .. } => self.lower_type_node(module, *ty, ctx),
            NodeData::NewExpr { ty: None, .. } => {
                // `new { ... }`: the instantiated type flows from context.
                let expected =
                    self.expected_type_inner(Position::new(module, parent), ctx, depth + 1);
                let expected = self.db().non_null(expected);
                if expected == TypeId::UNKNOWN || expected == TypeId::NOTHING {
                    self.db().dynamic_type()
                } else {
                    expected
                }
            }
            NodeData::AmendExpr { parent: amended, .. } => {
                self.expr_type_inner(Position::new(module, *amended), ctx, depth + 1)
            }
            // `foo { ... }`: an amending property definition. The body's
            // type is the property's declared (or inherited) type.
            NodeData::Property(property) => {
                if let Some(ann) = property.type_ann {
                    return self.lower_type_node(module, ann, ctx);
                }
                let outer = self.this_type_inner(Position::new(module, parent), ctx, depth + 1);
                self.member_type_of(outer, property.name, ResolveKind::Property, ctx, depth + 1)
                    .unwrap_or(TypeId::UNKNOWN)
            }
            // An element/entry body: the enclosing body's element/value type.
            NodeData::ObjectElement { .. } => {
                let enclosing = self.this_type_inner(Position::new(module, parent), ctx, depth + 1);
                self.db()
                    .listing_element(enclosing)
                    .unwrap_or(TypeId::UNKNOWN)
            }
            NodeData::ObjectEntry { .. } => {
                let enclosing = self.this_type_inner(Position::new(module, parent), ctx, depth + 1);
                self.db()
                    .mapping_entry(enclosing)
                    .map(|(_, v)| v)
                    .unwrap_or(TypeId::UNKNOWN)
            }
            // Generators splice their body's members into the enclosing
            // object: same receiver type.
            NodeData::ForGenerator { .. } | NodeData::WhenGenerator { .. } => {
                self.this_type_inner(Position::new(module, parent), ctx, depth + 1)
            }
            _ => TypeId::UNKNOWN,
        }
    }
}
