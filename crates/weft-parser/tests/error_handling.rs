//! Error handling tests.
//!
//! Recovery is disabled: the first error halts the block, the error lands
//! in the result's error list, and whatever IR was built survives as-is.

use weft_lexer::{lex, Mode};
use weft_parser::{parse_code_block, parse_document, ParseError, ParseErrorKind};

fn expect_error(source: &str) -> Vec<ParseError> {
    let lexed = lex(source, Mode::Code).expect("lexing should succeed");
    let (_, errors) = parse_code_block(&lexed.tokens, "test|0|block");
    assert!(!errors.is_empty(), "expected a parse error for {:?}", source);
    errors
}

fn expect_ok(source: &str) {
    let lexed = lex(source, Mode::Code).expect("lexing should succeed");
    let (_, errors) = parse_code_block(&lexed.tokens, "test|0|block");
    assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
}

#[test]
fn test_parenthesis_lhs_without_function_or_if() {
    let errors = expect_error("match\n(x, y) = 5");
    assert_eq!(errors[0].kind, ParseErrorKind::Invariant);
    assert!(errors[0].message.contains("parenthesis"));
}

#[test]
fn test_statement_outside_a_section() {
    let errors = expect_error("[#person]");
    assert_eq!(errors[0].kind, ParseErrorKind::UnexpectedToken);
    assert!(errors[0].message.contains("match"));
}

#[test]
fn test_unclosed_record() {
    let errors = expect_error("match\n[#person name: \"alice\"");
    assert_eq!(errors[0].kind, ParseErrorKind::UnexpectedEof);
}

#[test]
fn test_unclosed_not() {
    let errors = expect_error("match\nnot([#person]");
    assert_eq!(errors[0].kind, ParseErrorKind::UnexpectedEof);
}

#[test]
fn test_if_without_then() {
    let errors = expect_error("match\nx = if y > 0 y else 0");
    assert!(!errors.is_empty());
}

#[test]
fn test_if_without_condition() {
    let errors = expect_error("match\nx = if then 1");
    assert_eq!(errors[0].kind, ParseErrorKind::InvalidSyntax);
}

#[test]
fn test_action_section_rejects_bare_comparison() {
    let errors = expect_error("match\n[#person]\nbind\nx > 3");
    assert_eq!(errors[0].kind, ParseErrorKind::UnexpectedToken);
}

#[test]
fn test_set_requires_none_or_value() {
    // `x := none` erases; `x :=` with nothing after is an error.
    expect_ok("match\nx = [#thing]\nbind\nx := none");
    let errors = expect_error("match\nx = [#thing]\nbind\nx :=");
    assert_eq!(errors[0].kind, ParseErrorKind::UnexpectedEof);
}

#[test]
fn test_partial_ir_survives_an_error() {
    let lexed = lex("match\nperson = [#person]\n(a, b) = 5", Mode::Code).unwrap();
    let (ir, errors) = parse_code_block(&lexed.tokens, "test|0|block");

    assert!(!errors.is_empty());
    // The record scan and first equality were built before the failure.
    assert_eq!(ir.block.scan_like.len(), 1);
    assert_eq!(ir.block.equalities.len(), 1);
}

#[test]
fn test_error_position_points_at_the_offender() {
    let errors = expect_error("match\nperson = [#person]\nbind\nperson !");
    let error = &errors[0];
    assert_eq!(error.line, 4);
}

#[test]
fn test_document_halts_after_failing_block() {
    let source = "First block\n```\nmatch\n[#ok]\n```\nSecond block\n```\nmatch\n(x, y) = 5\n```\nThird block\n```\nmatch\n[#never-reached]\n```\n";
    let lexed = lex(source, Mode::Doc).expect("lexing should succeed");
    let (blocks, errors) = parse_document(&lexed.tokens, "doc");

    assert_eq!(errors.len(), 1);
    // The first block parsed; the second was returned partially; the third
    // was never reached.
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].block.name, "First block");
    assert!(blocks[0].nodes.len() > 0);
}
