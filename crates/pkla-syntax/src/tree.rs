//! Node arena and tree navigation.
//!
//! Nodes live in a `Vec` arena indexed by `NodeId`; identity is stable for
//! the lifetime of the tree. Parent links are computed once when the
//! builder finishes, so upward walks (the resolver's bread and butter) are
//! a pointer chase with no allocation.

use crate::nodes::{NodeData, PropertyDecl};
use pkla_common::Span;
use smallvec::SmallVec;

/// Arena index of a node. Only meaningful together with its [`SyntaxTree`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub data: NodeData,
    pub span: Span,
    pub parent: Option<NodeId>,
}

/// An immutable module syntax tree.
#[derive(Clone, Debug)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl SyntaxTree {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()].data
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.nodes[id.index()].span
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterator over `id`'s ancestors, innermost first, ending at the root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            current: self.parent(id),
        }
    }

    pub fn children(&self, id: NodeId) -> SmallVec<[NodeId; 4]> {
        self.data(id).children()
    }

    /// Innermost node whose span contains `offset`, preferring deeper nodes.
    /// Used to map an editor caret to a lexical position.
    pub fn node_at_offset(&self, offset: u32) -> Option<NodeId> {
        let mut current = self.root;
        if !self.span(current).contains(offset) {
            return None;
        }
        'descend: loop {
            for child in self.children(current) {
                if self.span(child).contains(offset) {
                    current = child;
                    continue 'descend;
                }
            }
            return Some(current);
        }
    }

    /// The property declaration node `id` sits in, if any.
    pub fn enclosing_property(&self, id: NodeId) -> Option<(NodeId, &PropertyDecl)> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find_map(|n| match self.data(n) {
                NodeData::Property(p) => Some((n, p)),
                _ => None,
            })
    }
}

pub struct Ancestors<'a> {
    tree: &'a SyntaxTree,
    current: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.current?;
        self.current = self.tree.parent(id);
        Some(id)
    }
}

/// Arena builder used by hosts and tests.
///
/// Children must be added before the node referencing them (ids are handed
/// out in insertion order); `finish` fixes up parent links by walking down
/// from the root.
pub struct TreeBuilder {
    nodes: Vec<Node>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn node(&mut self, data: NodeData, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            data,
            span,
            parent: None,
        });
        id
    }

    /// Shorthand for nodes whose position is irrelevant to a test.
    pub fn n(&mut self, data: NodeData) -> NodeId {
        self.node(data, Span::EMPTY)
    }

    pub fn finish(mut self, root: NodeId) -> SyntaxTree {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            for child in self.nodes[id.index()].data.children() {
                self.nodes[child.index()].parent = Some(id);
                stack.push(child);
            }
        }
        SyntaxTree {
            nodes: self.nodes,
            root,
        }
    }
}
