//! `ParseBlock` — the per-block container the parser lowers into.
//!
//! A root block is created for every fenced code block; negation and
//! conditional branches create nested sub-blocks. All blocks in one tree
//! share a single variable environment by identity: a name first mentioned
//! inside a nested scope must resolve to the same variable node when it is
//! later referenced outside.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::node::{Node, NodeArena, NodeKind, NodeRef, Provenance, Variable};

/// Block flavor; plain blocks carry `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockKind {
    Not,
}

/// An entry in a block's scan-like list: either a scan/record/if node or a
/// whole negation sub-block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanLike {
    Node(NodeRef),
    Block(Box<ParseBlock>),
}

impl From<NodeRef> for ScanLike {
    fn from(node: NodeRef) -> Self {
        ScanLike::Node(node)
    }
}

impl From<ParseBlock> for ScanLike {
    fn from(block: ParseBlock) -> Self {
        ScanLike::Block(Box::new(block))
    }
}

/// A parsing scope and its lowered IR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseBlock {
    pub id: String,
    /// The prose line naming the fenced block, when there is one.
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<BlockKind>,
    /// Names *used* in this block, mapped to their variable nodes.
    pub variables: IndexMap<String, NodeRef>,
    /// Name-to-identity environment shared with every block in this tree.
    #[serde(skip)]
    variable_lookup: Rc<RefCell<HashMap<String, NodeRef>>>,
    pub equalities: Vec<(NodeRef, NodeRef)>,
    pub scan_like: Vec<ScanLike>,
    pub expressions: Vec<NodeRef>,
    pub binds: Vec<NodeRef>,
    pub commits: Vec<NodeRef>,
    /// Provenance for sub-blocks nested as statements.
    pub from: Vec<Provenance>,
    node_counter: u32,
    sub_counter: u32,
}

impl ParseBlock {
    /// Create a root block.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: "Unnamed block".to_string(),
            kind: None,
            variables: IndexMap::new(),
            variable_lookup: Rc::new(RefCell::new(HashMap::new())),
            equalities: Vec::new(),
            scan_like: Vec::new(),
            expressions: Vec::new(),
            binds: Vec::new(),
            commits: Vec::new(),
            from: Vec::new(),
            node_counter: 0,
            sub_counter: 0,
        }
    }

    /// Reserve the first `count` ids of this block's id space.
    ///
    /// Token ids (`"<blockId>|<index>"`) and node ids share one space;
    /// root blocks reserve their token count so the two never collide.
    pub fn reserve_node_ids(&mut self, count: usize) {
        self.node_counter = self.node_counter.max(count as u32);
    }

    /// Allocate a node with the next per-block id (`"<blockId>|<n>"`).
    pub fn make_node(
        &mut self,
        nodes: &mut NodeArena,
        kind: NodeKind,
        from: Vec<Provenance>,
    ) -> NodeRef {
        let id = format!("{}|{}", self.id, self.node_counter);
        self.node_counter += 1;
        nodes.alloc(Node { id, from, kind })
    }

    /// Resolve a name to its variable node, allocating on first sight.
    ///
    /// The identity comes from the shared environment; the name is always
    /// recorded in this block's `variables` map, even when the identity was
    /// introduced by an enclosing block. Additional provenance accumulates
    /// on the variable node at each reference.
    pub fn to_variable(
        &mut self,
        nodes: &mut NodeArena,
        name: &str,
        generated: bool,
        from: Vec<Provenance>,
    ) -> NodeRef {
        let existing = self.variable_lookup.borrow().get(name).copied();
        let var = match existing {
            Some(var) => {
                nodes[var].from.extend(from);
                var
            }
            None => {
                let var = self.make_node(
                    nodes,
                    NodeKind::Variable(Variable {
                        name: name.to_string(),
                        generated,
                        non_projecting: false,
                    }),
                    from,
                );
                self.variable_lookup
                    .borrow_mut()
                    .insert(name.to_string(), var);
                var
            }
        };
        self.variables.insert(name.to_string(), var);
        var
    }

    /// Look a name up without recording a use.
    pub fn lookup(&self, name: &str) -> Option<NodeRef> {
        self.variable_lookup.borrow().get(name).copied()
    }

    pub fn equality(&mut self, a: NodeRef, b: NodeRef) {
        self.equalities.push((a, b));
    }

    pub fn scan(&mut self, item: impl Into<ScanLike>) {
        self.scan_like.push(item.into());
    }

    pub fn expression(&mut self, expr: NodeRef) {
        self.expressions.push(expr);
    }

    pub fn bind(&mut self, node: NodeRef) {
        self.binds.push(node);
    }

    pub fn commit(&mut self, node: NodeRef) {
        self.commits.push(node);
    }

    /// Derive a child scope (`"<blockId>|sub<n>"`).
    ///
    /// The child shares this block's variable environment by identity, so
    /// names introduced inside the child resolve to the same nodes when the
    /// parent mentions them later.
    pub fn sub_block(&mut self) -> ParseBlock {
        let id = format!("{}|sub{}", self.id, self.sub_counter);
        self.sub_counter += 1;
        ParseBlock {
            id,
            name: self.name.clone(),
            kind: None,
            variables: IndexMap::new(),
            variable_lookup: Rc::clone(&self.variable_lookup),
            equalities: Vec::new(),
            scan_like: Vec::new(),
            expressions: Vec::new(),
            binds: Vec::new(),
            commits: Vec::new(),
            from: Vec::new(),
            node_counter: 0,
            sub_counter: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_variable_is_idempotent() {
        let mut nodes = NodeArena::new();
        let mut block = ParseBlock::new("b");

        let first = block.to_variable(&mut nodes, "person", false, Vec::new());
        let second = block.to_variable(&mut nodes, "person", false, Vec::new());

        assert_eq!(first, second);
        assert_eq!(nodes.len(), 1);
        assert_eq!(block.variables.len(), 1);
    }

    #[test]
    fn test_sub_block_shares_environment() {
        let mut nodes = NodeArena::new();
        let mut parent = ParseBlock::new("b");

        let mut child = parent.sub_block();
        assert_eq!(child.id, "b|sub0");

        // A name first mentioned in the child resolves to the same node
        // when the parent references it afterwards.
        let inner = child.to_variable(&mut nodes, "x", false, Vec::new());
        let outer = parent.to_variable(&mut nodes, "x", false, Vec::new());
        assert_eq!(inner, outer);

        // Locality is still tracked per block.
        assert!(child.variables.contains_key("x"));
        assert!(parent.variables.contains_key("x"));
    }

    #[test]
    fn test_node_ids_are_per_block() {
        let mut nodes = NodeArena::new();
        let mut parent = ParseBlock::new("b");
        let mut sub = parent.sub_block();

        let a = parent.to_variable(&mut nodes, "a", false, Vec::new());
        let b = sub.to_variable(&mut nodes, "b", false, Vec::new());

        assert_eq!(nodes[a].id, "b|0");
        assert_eq!(nodes[b].id, "b|sub0|0");
    }

    #[test]
    fn test_generated_names_do_not_collide_with_surface_names() {
        let mut nodes = NodeArena::new();
        let mut block = ParseBlock::new("b");

        let surface = block.to_variable(&mut nodes, "age", false, Vec::new());
        let synthetic = block.to_variable(&mut nodes, "age-2-8", true, Vec::new());

        assert_ne!(surface, synthetic);
        assert!(nodes[synthetic].as_variable().unwrap().generated);
    }
}
