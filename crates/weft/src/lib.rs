// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! weft: a literate, Markdown-hosted relational DSL front end.
//!
//! Source documents are CommonMark files carrying executable fenced code
//! blocks. This crate orchestrates the pipeline: the markdown extractor
//! flattens the document and finds the blocks, each block is lexed in code
//! mode and lowered by the recursive-descent parser, and the results bundle
//! every block's IR with the flattened text and the span table.
//!
//! # Entry points
//!
//! - [`parse_doc`] — the markdown path
//! - [`parse_block`] — a single fenced block, also used directly by
//!   single-block callers
//! - [`parse_source`] — the raw path: plain fences without markdown hosting
//!
//! Errors accumulate per result; recovery is disabled, so consumers must
//! check `errors.is_empty()` before trusting the IR.

pub mod markdown;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use weft_ast::{NodeArena, ParseBlock, SpanExtra, SpanTable};
use weft_lexer::{assign_token_ids, lex, LexError, LexResult, Mode};
use weft_parser::{parse_code_block, parse_document, ParseError};

pub use weft_ast as ast;
pub use weft_lexer as lexer;
pub use weft_parser::BlockIr;

/// Any failure the front end reports.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeftError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

/// The aggregated contents of a parsed document.
#[derive(Debug, Serialize)]
pub struct DocContents {
    pub blocks: Vec<BlockIr>,
    /// The flattened document text all span offsets refer to.
    pub text: String,
    pub spans: SpanTable,
    pub extra_info: HashMap<String, SpanExtra>,
}

/// Result of [`parse_doc`] / [`parse_source`].
#[derive(Debug)]
pub struct DocResult {
    pub results: DocContents,
    /// Wall-clock milliseconds.
    pub time: f64,
    pub errors: Vec<WeftError>,
}

/// Result of [`parse_block`].
#[derive(Debug)]
pub struct BlockResult {
    pub results: BlockIr,
    pub lex: LexResult,
    /// Wall-clock milliseconds.
    pub time: f64,
    pub errors: Vec<WeftError>,
}

/// Source of default document ids (`"doc|<n>"`).
static NEXT_DOC: AtomicU64 = AtomicU64::new(0);

fn default_doc_id(doc_id: Option<&str>) -> String {
    match doc_id {
        Some(id) => id.to_string(),
        None => format!("doc|{}", NEXT_DOC.fetch_add(1, Ordering::Relaxed)),
    }
}

/// Parse a CommonMark document: extract its fenced blocks and lower each
/// one into a [`BlockIr`].
pub fn parse_doc(source: &str, doc_id: Option<&str>) -> DocResult {
    let started = Instant::now();
    let doc_id = default_doc_id(doc_id);
    let _span = tracing::debug_span!("parse_doc", doc = %doc_id).entered();

    let extraction = markdown::extract(source, &doc_id);
    let mut spans = extraction.spans;
    let mut blocks = Vec::with_capacity(extraction.blocks.len());
    let mut errors = Vec::new();

    for block in &extraction.blocks {
        let result = parse_block(&block.literal, &block.id, block.start_offset, &mut spans);
        debug!(block = %block.id, errors = result.errors.len(), "parsed block");
        blocks.push(result.results);
        errors.extend(result.errors);
    }

    DocResult {
        results: DocContents {
            blocks,
            text: extraction.text,
            spans,
            extra_info: extraction.extra_info,
        },
        time: started.elapsed().as_secs_f64() * 1000.0,
        errors,
    }
}

/// Lex and lower one fenced block.
///
/// Token ids are assigned as `"<blockId>|<index>"` and every token pushes a
/// span shifted by `offset` into the flattened document text.
pub fn parse_block(
    source: &str,
    block_id: &str,
    offset: usize,
    spans: &mut SpanTable,
) -> BlockResult {
    let started = Instant::now();

    match lex(source, Mode::Code) {
        Ok(mut lexed) => {
            assign_token_ids(&mut lexed.tokens, block_id);
            for token in &lexed.tokens {
                spans.push(
                    offset + token.offset,
                    offset + token.offset + token.image.len(),
                    token.kind.label(),
                    token.id.clone(),
                );
            }

            let (results, parse_errors) = parse_code_block(&lexed.tokens, block_id);
            BlockResult {
                results,
                lex: lexed,
                time: started.elapsed().as_secs_f64() * 1000.0,
                errors: parse_errors.into_iter().map(WeftError::from).collect(),
            }
        }
        Err(error) => BlockResult {
            results: BlockIr {
                block: ParseBlock::new(block_id),
                nodes: NodeArena::new(),
            },
            lex: LexResult::default(),
            time: started.elapsed().as_secs_f64() * 1000.0,
            errors: vec![error.into()],
        },
    }
}

/// Parse a raw literate source: plain prose lines and fenced blocks,
/// without CommonMark hosting. Blocks take the most recent prose line as
/// their name.
pub fn parse_source(source: &str, doc_id: Option<&str>) -> DocResult {
    let started = Instant::now();
    let doc_id = default_doc_id(doc_id);
    let _span = tracing::debug_span!("parse_source", doc = %doc_id).entered();

    match lex(source, Mode::Doc) {
        Ok(mut lexed) => {
            assign_token_ids(&mut lexed.tokens, &doc_id);
            let mut spans = SpanTable::new();
            for token in &lexed.tokens {
                spans.push(
                    token.offset,
                    token.offset + token.image.len(),
                    token.kind.label(),
                    token.id.clone(),
                );
            }

            let (blocks, parse_errors) = parse_document(&lexed.tokens, &doc_id);
            DocResult {
                results: DocContents {
                    blocks,
                    text: source.to_string(),
                    spans,
                    extra_info: HashMap::new(),
                },
                time: started.elapsed().as_secs_f64() * 1000.0,
                errors: parse_errors.into_iter().map(WeftError::from).collect(),
            }
        }
        Err(error) => DocResult {
            results: DocContents {
                blocks: Vec::new(),
                text: source.to_string(),
                spans: SpanTable::new(),
                extra_info: HashMap::new(),
            },
            time: started.elapsed().as_secs_f64() * 1000.0,
            errors: vec![error.into()],
        },
    }
}
