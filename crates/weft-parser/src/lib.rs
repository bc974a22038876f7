// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Hand-written recursive descent parser for the weft DSL.
//!
//! The parser is also the lowerer: every grammar rule returns its value view
//! (a node usable as an argument elsewhere) while appending its side-effect
//! view (scans, expressions, equalities, binds, commits) to the current
//! [`weft_ast::ParseBlock`]. There is no separate AST pass.
//!
//! ## Architecture
//!
//! - `stream`: token cursor with lookahead
//! - `error`: `ParseError` and its constructors
//! - `section`: document / fenced block / match / bind / commit sections
//! - `statement`: match statements, comparisons, negations, action forms
//! - `expr`: infix chains, values, string interpolation, attribute access
//! - `record`: records, attributes, mutators, function records
//! - `branch`: `if`/`else` branches and `is(...)`
//!
//! Recovery is disabled: the first error halts the enclosing block, and any
//! IR built before it is returned as-is.

pub mod parser;

pub use parser::{
    parse_code_block, parse_document, BlockIr, ParseError, ParseErrorKind, Parser,
};
