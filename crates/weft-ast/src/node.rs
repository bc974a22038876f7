//! Arena-allocated IR nodes.
//!
//! Parse nodes form a graph (records reference attribute nodes, scans
//! reference variables, provenance lists reference arbitrary nodes), so they
//! are allocated in a per-root-block [`NodeArena`] and referred to by
//! [`NodeRef`] index. String ids of the form `"<blockId>|<n>"` are assigned
//! by the owning block's counter and remain the stable external contract;
//! the arena index is the in-memory identity.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

use crate::block::ParseBlock;

/// Index of a node in its root block's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef(u32);

impl NodeRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Node storage for one root block and all of its sub-blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: Node) -> NodeRef {
        let index = self.nodes.len();
        assert!(index < u32::MAX as usize, "node arena overflow");
        self.nodes.push(node);
        NodeRef(index as u32)
    }

    pub fn get(&self, node: NodeRef) -> &Node {
        &self.nodes[node.index()]
    }

    pub fn get_mut(&mut self, node: NodeRef) -> &mut Node {
        &mut self.nodes[node.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeRef, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeRef(i as u32), n))
    }
}

impl Index<NodeRef> for NodeArena {
    type Output = Node;

    fn index(&self, node: NodeRef) -> &Node {
        self.get(node)
    }
}

impl IndexMut<NodeRef> for NodeArena {
    fn index_mut(&mut self, node: NodeRef) -> &mut Node {
        self.get_mut(node)
    }
}

/// Provenance entry: the token or node a piece of IR was built from.
///
/// Tokens are indices into the block's lexed token vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provenance {
    Token(usize),
    Node(NodeRef),
}

/// A parse node: stable id, provenance, and the tagged payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub from: Vec<Provenance>,
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// Constant values carried by the DSL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl Literal {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Literal::Num(n) => Some(*n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    /// True for compiler-introduced names (positional synthetics).
    pub generated: bool,
    /// Hidden from consumers of the block's outputs.
    pub non_projecting: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub value: Literal,
}

/// A relational pattern over `(entity, attribute, value)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scan {
    pub entity: NodeRef,
    pub attribute: NodeRef,
    pub value: NodeRef,
    /// Whether the entity must already be bound when this scan runs.
    pub needs_entity: bool,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub op: String,
    pub args: Vec<NodeRef>,
    /// Result binding; filtering comparisons bind nothing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable: Option<NodeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub attributes: Vec<NodeRef>,
    /// Mutation operator for action-section records (`"+="` etc.).
    pub action: Option<String>,
    pub scopes: Vec<String>,
    /// The record's identity variable; `None` only under `noVar` parses.
    pub variable: Option<NodeRef>,
    pub needs_entity: bool,
    pub extra_projection: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub attribute: String,
    pub value: NodeRef,
    pub non_projecting: bool,
}

/// Left-hand side of `x.a.b <op> …`: the final attribute plus the entity
/// that holds it. The enclosing operation decides what write to emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMutator {
    pub attribute: String,
    pub parent: NodeRef,
}

/// What an action writes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionValue {
    /// The attribute (or whole entity) is erased.
    Erase,
    Value(NodeRef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// `"+"`, `"-"`, `"erase"`, `"<-"`, `":="` …
    pub action: String,
    pub entity: NodeRef,
    /// `None` for whole-entity actions.
    pub attribute: Option<String>,
    pub value: ActionValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub op: String,
    pub record: NodeRef,
    pub variable: NodeRef,
    /// Filled when the call site destructures `(a, b) = fn[…]`.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub returns: Vec<NodeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfExpression {
    pub branches: Vec<NodeRef>,
    /// Attached by the equality that consumes the if.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub outputs: Vec<NodeRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfBranch {
    pub block: Box<ParseBlock>,
    pub outputs: Vec<NodeRef>,
    /// False only for leading `if` branches; `else if` / `else` are exclusive.
    pub exclusive: bool,
}

/// Payload for `@name` and `#tag` primitives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigilName {
    pub name: String,
}

/// Only materialized for more than one item; single items collapse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parenthesis {
    pub items: Vec<NodeRef>,
}

/// Container for comparison/addition/multiplication chains: the emitted
/// expression nodes plus the aggregate result variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpChain {
    pub expressions: Vec<NodeRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable: Option<NodeRef>,
}

/// The tagged node payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeKind {
    Variable(Variable),
    Constant(Constant),
    Scan(Scan),
    Expression(Expression),
    Record(Record),
    Attribute(Attribute),
    AttributeMutator(AttributeMutator),
    Action(Action),
    FunctionRecord(FunctionRecord),
    IfExpression(IfExpression),
    IfBranch(IfBranch),
    Name(SigilName),
    Tag(SigilName),
    Parenthesis(Parenthesis),
    Comparison(OpChain),
    Addition(OpChain),
    Multiplication(OpChain),
}

impl Node {
    /// Whether this node can stand directly as a value argument.
    pub fn is_value(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Constant(_) | NodeKind::Variable(_) | NodeKind::Parenthesis(_)
        )
    }

    /// The result binding of expression-like nodes, if any.
    pub fn result_variable(&self) -> Option<NodeRef> {
        match &self.kind {
            NodeKind::Expression(e) => e.variable,
            NodeKind::Record(r) => r.variable,
            NodeKind::FunctionRecord(f) => Some(f.variable),
            NodeKind::Comparison(c) | NodeKind::Addition(c) | NodeKind::Multiplication(c) => {
                c.variable
            }
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match &self.kind {
            NodeKind::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_variable_mut(&mut self) -> Option<&mut Variable> {
        match &mut self.kind {
            NodeKind::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match &self.kind {
            NodeKind::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match &self.kind {
            NodeKind::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match &mut self.kind {
            NodeKind::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_attribute(&self) -> Option<&Attribute> {
        match &self.kind {
            NodeKind::Attribute(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_attribute_mut(&mut self) -> Option<&mut Attribute> {
        match &mut self.kind {
            NodeKind::Attribute(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_parenthesis(&self) -> Option<&Parenthesis> {
        match &self.kind {
            NodeKind::Parenthesis(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_if_expression_mut(&mut self) -> Option<&mut IfExpression> {
        match &mut self.kind {
            NodeKind::IfExpression(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_function_record_mut(&mut self) -> Option<&mut FunctionRecord> {
        match &mut self.kind {
            NodeKind::FunctionRecord(f) => Some(f),
            _ => None,
        }
    }
}
