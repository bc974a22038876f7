//! Document and section rules.
//!
//! `doc := (content | fencedBlock)*` — prose lines name the next fenced
//! block. `codeBlock := section*`, where a section is `match`, `bind`, or
//! `commit`, each with an optional scope declaration and a run of
//! statements.

use weft_ast::{NodeArena, ParseBlock};
use weft_lexer::TokenKind;

use super::{statement, BlockIr, ParseError, Parser, SectionKind};

/// Parse a doc-mode token stream into fenced blocks.
pub(super) fn document(p: &mut Parser, doc_id: &str) -> Vec<BlockIr> {
    let mut blocks = Vec::new();
    let mut name: Option<String> = None;
    let mut block_index = 0usize;

    loop {
        match p.cursor.peek_kind() {
            None => break,
            Some(TokenKind::DocContent) => {
                let ix = p.cursor.advance().expect("BUG: peeked content vanished");
                name = Some(p.cursor.get(ix).image.trim().to_string());
            }
            Some(TokenKind::Fence) => {
                p.cursor.advance();
                let block_id = format!("{}|{}|block", doc_id, block_index);
                block_index += 1;

                // Each root block gets a fresh arena.
                p.nodes = NodeArena::new();
                let mut block = code_block(p, &block_id);
                block.name = name
                    .clone()
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| "Unnamed block".to_string());
                let nodes = std::mem::take(&mut p.nodes);
                blocks.push(BlockIr { block, nodes });

                if !p.errors.is_empty() {
                    break;
                }
                if p.cursor.check(TokenKind::CloseFence) {
                    p.cursor.advance();
                } else {
                    let err =
                        ParseError::expected("a closing fence", p.cursor.peek(), p.position());
                    p.errors.push(err);
                    break;
                }
            }
            Some(_) => {
                let err = ParseError::unexpected(p.cursor.peek(), "in document", p.position());
                p.errors.push(err);
                break;
            }
        }
    }

    blocks
}

/// `codeBlock := section*`, halting at a close fence, end of input, or the
/// first error. The root block is always pushed and popped here.
pub(super) fn code_block(p: &mut Parser, block_id: &str) -> ParseBlock {
    let mut root = ParseBlock::new(block_id);
    // Token ids share the block's id space; node ids start past them.
    root.reserve_node_ids(p.cursor.len());
    p.blocks.push(root);
    p.section = SectionKind::Match;
    p.scopes = vec!["session".to_string()];

    loop {
        match p.cursor.peek_kind() {
            None | Some(TokenKind::CloseFence) => break,
            Some(TokenKind::Comment) => {
                p.cursor.advance();
            }
            Some(_) => {
                if let Err(err) = section(p) {
                    p.errors.push(err);
                    break;
                }
            }
        }
    }

    p.pop_block()
}

/// One `match` / `bind` / `commit` section with its statements.
fn section(p: &mut Parser) -> Result<(), ParseError> {
    match p.cursor.peek_kind() {
        Some(TokenKind::Match) => {
            p.cursor.advance();
            p.section = SectionKind::Match;
            p.scopes = scope_declaration(p)?.unwrap_or_else(|| vec!["session".to_string()]);
            loop {
                match p.cursor.peek_kind() {
                    None
                    | Some(TokenKind::CloseFence)
                    | Some(TokenKind::Match)
                    | Some(TokenKind::Bind)
                    | Some(TokenKind::Commit) => break,
                    Some(TokenKind::Comment) => {
                        p.cursor.advance();
                    }
                    Some(_) => {
                        statement::statement(p)?;
                    }
                }
            }
            Ok(())
        }
        Some(TokenKind::Bind) | Some(TokenKind::Commit) => {
            let keyword = p.cursor.peek_kind();
            p.cursor.advance();
            p.section = if keyword == Some(TokenKind::Bind) {
                SectionKind::Bind
            } else {
                SectionKind::Commit
            };
            p.scopes = scope_declaration(p)?.unwrap_or_else(|| vec!["session".to_string()]);
            loop {
                match p.cursor.peek_kind() {
                    None
                    | Some(TokenKind::CloseFence)
                    | Some(TokenKind::Match)
                    | Some(TokenKind::Bind)
                    | Some(TokenKind::Commit) => break,
                    Some(TokenKind::Comment) => {
                        p.cursor.advance();
                    }
                    Some(_) => {
                        statement::action_statement(p)?;
                    }
                }
            }
            Ok(())
        }
        _ => Err(ParseError::unexpected(
            p.cursor.peek(),
            "(expected a match, bind, or commit section)",
            p.position(),
        )),
    }
}

/// `scopeDeclaration := "(" name+ ")" | name`, where a name is `@ident`.
///
/// A parenthesis only counts as a scope declaration when it opens on a
/// name; anything else is the first statement of the section.
fn scope_declaration(p: &mut Parser) -> Result<Option<Vec<String>>, ParseError> {
    match p.cursor.peek_kind() {
        Some(TokenKind::At) => {
            p.cursor.advance();
            let ix = p.cursor.expect(TokenKind::Identifier, "a scope name")?;
            Ok(Some(vec![p.cursor.get(ix).image.clone()]))
        }
        Some(TokenKind::OpenParen) if p.cursor.peek_nth_kind(1) == Some(TokenKind::At) => {
            p.cursor.advance();
            let mut scopes = Vec::new();
            while p.cursor.check(TokenKind::At) {
                p.cursor.advance();
                let ix = p.cursor.expect(TokenKind::Identifier, "a scope name")?;
                scopes.push(p.cursor.get(ix).image.clone());
            }
            p.cursor
                .expect(TokenKind::CloseParen, "`)` closing the scope list")?;
            Ok(Some(scopes))
        }
        _ => Ok(None),
    }
}
