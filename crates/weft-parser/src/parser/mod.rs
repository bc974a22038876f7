//! Parser context and public entry points.
//!
//! `Parser` couples the token cursor with the IR under construction: the
//! node arena, the stack of open blocks (negation and conditional branches
//! push sub-blocks), the active scope tags, and the error accumulator.
//! Every pushed block is popped on all exit paths: rules pop *before*
//! propagating an error with `?`.

mod error;
mod stream;

pub use error::{ParseError, ParseErrorKind};
use stream::TokenCursor;

mod branch;
mod expr;
mod record;
mod section;
mod statement;

use serde::{Deserialize, Serialize};
use weft_ast::{
    BlockKind, Constant, Literal, NodeArena, NodeKind, NodeRef, ParseBlock, Provenance,
};
use weft_lexer::Token;

/// A root block's lowered IR together with the arena its nodes live in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockIr {
    pub block: ParseBlock,
    pub nodes: NodeArena,
}

/// Which section the parser is currently lowering into.
///
/// Match statements scan; action statements route records and actions into
/// the block's bind or commit list, keyed by the section keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SectionKind {
    Match,
    Bind,
    Commit,
}

pub struct Parser<'t> {
    pub(crate) cursor: TokenCursor<'t>,
    pub(crate) nodes: NodeArena,
    pub(crate) blocks: Vec<ParseBlock>,
    pub(crate) scopes: Vec<String>,
    pub(crate) section: SectionKind,
    pub(crate) errors: Vec<ParseError>,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self {
            cursor: TokenCursor::new(tokens),
            nodes: NodeArena::new(),
            blocks: Vec::new(),
            scopes: vec!["session".to_string()],
            section: SectionKind::Match,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// The block currently being lowered into.
    pub(crate) fn block(&mut self) -> &mut ParseBlock {
        self.blocks.last_mut().expect("BUG: no active parse block")
    }

    /// Allocate a node in the current block's id space.
    pub(crate) fn make(&mut self, kind: NodeKind, from: Vec<Provenance>) -> NodeRef {
        let block = self.blocks.last_mut().expect("BUG: no active parse block");
        block.make_node(&mut self.nodes, kind, from)
    }

    /// Resolve a name in the current block's shared environment.
    pub(crate) fn to_variable(
        &mut self,
        name: &str,
        generated: bool,
        from: Vec<Provenance>,
    ) -> NodeRef {
        let block = self.blocks.last_mut().expect("BUG: no active parse block");
        block.to_variable(&mut self.nodes, name, generated, from)
    }

    /// Allocate a positional synthetic variable (`<stem>-<line>-<col>`).
    pub(crate) fn synthetic(
        &mut self,
        stem: &str,
        line: u32,
        col: u32,
        from: Vec<Provenance>,
    ) -> NodeRef {
        let name = format!("{}-{}-{}", stem, line, col);
        self.to_variable(&name, true, from)
    }

    pub(crate) fn constant(&mut self, value: Literal, from: Vec<Provenance>) -> NodeRef {
        self.make(NodeKind::Constant(Constant { value }), from)
    }

    /// The value view of a node: constants, variables, and parentheses stand
    /// for themselves; expression-like nodes contribute their result
    /// variable; anything else is a fatal invariant breach.
    pub(crate) fn as_value(&self, node: NodeRef) -> Result<NodeRef, ParseError> {
        let n = &self.nodes[node];
        if n.is_value() {
            return Ok(node);
        }
        n.result_variable().ok_or_else(|| {
            ParseError::invariant(
                format!("node {} cannot be used as a value", n.id),
                self.cursor.position(),
            )
        })
    }

    /// Outputs bound by the left side of an `x = if …` equality: a
    /// parenthesis binds its items in source order, anything else binds one.
    pub(crate) fn if_outputs(&self, value: NodeRef) -> Result<Vec<NodeRef>, ParseError> {
        if let Some(paren) = self.nodes[value].as_parenthesis() {
            let items = paren.items.clone();
            items.iter().map(|&item| self.as_value(item)).collect()
        } else {
            Ok(vec![self.as_value(value)?])
        }
    }

    /// Open a sub-block of the current block.
    pub(crate) fn push_sub_block(&mut self, kind: Option<BlockKind>, from: Vec<Provenance>) {
        let mut sub = self.block().sub_block();
        sub.kind = kind;
        sub.from = from;
        self.blocks.push(sub);
    }

    /// Close the innermost block. Rules call this on every exit path of the
    /// rule that pushed it, including error paths.
    pub(crate) fn pop_block(&mut self) -> ParseBlock {
        self.blocks.pop().expect("BUG: parse block stack underflow")
    }

    /// Append a produced record or action to the list the current section
    /// routes into.
    pub(crate) fn append_by_section(&mut self, node: NodeRef) {
        match self.section {
            SectionKind::Match => self.block().scan(node),
            SectionKind::Bind => self.block().bind(node),
            SectionKind::Commit => self.block().commit(node),
        }
    }

    /// Default record action: action sections add (`"+="`), match sections
    /// only pattern.
    pub(crate) fn default_record_action(&self) -> Option<String> {
        match self.section {
            SectionKind::Match => None,
            SectionKind::Bind | SectionKind::Commit => Some("+=".to_string()),
        }
    }

    pub(crate) fn position(&self) -> (u32, u32) {
        self.cursor.position()
    }
}

/// Parse a lexed block with the `codeBlock` rule.
///
/// Always returns the IR built so far; on failure the accompanying error
/// list is non-empty and the IR is not guaranteed to be consistent.
pub fn parse_code_block(tokens: &[Token], block_id: &str) -> (BlockIr, Vec<ParseError>) {
    let mut parser = Parser::new(tokens);
    let block = section::code_block(&mut parser, block_id);
    debug_assert!(parser.blocks.is_empty(), "BUG: unbalanced block stack");
    (
        BlockIr {
            block,
            nodes: parser.nodes,
        },
        parser.errors,
    )
}

/// Parse a doc-mode token stream with the `document` rule.
///
/// Fenced blocks are parsed in order; each takes the most recent prose line
/// as its name. Parsing halts at the first failing block.
pub fn parse_document(tokens: &[Token], doc_id: &str) -> (Vec<BlockIr>, Vec<ParseError>) {
    let mut parser = Parser::new(tokens);
    let blocks = section::document(&mut parser, doc_id);
    debug_assert!(parser.blocks.is_empty(), "BUG: unbalanced block stack");
    (blocks, parser.errors)
}
