//! End-to-end document tests: markdown hosting, the raw path, span and id
//! contracts across a whole document.

use std::collections::HashSet;

use weft::{parse_doc, parse_source, WeftError};

const GREETINGS: &str = "Greet everyone\n\n```eve\nmatch\n[#person name]\nbind\n[#greeting message: \"hi {{name}}\"]\n```\n";

#[test]
fn test_parse_doc_end_to_end() {
    let result = parse_doc(GREETINGS, Some("docA"));
    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);

    assert_eq!(result.results.blocks.len(), 1);
    let block = &result.results.blocks[0];
    assert_eq!(block.block.id, "docA|0|block");

    // The match scan and the bind record both lowered.
    assert_eq!(block.block.scan_like.len(), 1);
    assert_eq!(block.block.binds.len(), 1);
    // The interpolated message became a concat expression.
    assert_eq!(block.block.expressions.len(), 1);
}

#[test]
fn test_token_spans_reproduce_source_text() {
    let result = parse_doc(GREETINGS, Some("docB"));
    let text = &result.results.text;

    // The first keyword span is the `match` token.
    let keyword = result
        .results
        .spans
        .iter()
        .find(|entry| entry.kind == "keyword")
        .expect("keyword span present");
    assert_eq!(&text[keyword.start..keyword.end], "match");

    // Every span stays within the flattened text.
    for entry in result.results.spans.iter() {
        assert!(entry.start <= entry.end && entry.end <= text.len());
    }
}

#[test]
fn test_ids_are_unique_across_the_document() {
    let result = parse_doc(GREETINGS, Some("docC"));

    let mut seen = HashSet::new();
    for entry in result.results.spans.iter() {
        assert!(seen.insert(entry.id.clone()), "duplicate span id {}", entry.id);
    }
    for block in &result.results.blocks {
        for (_, node) in block.nodes.iter() {
            assert!(seen.insert(node.id.clone()), "duplicate node id {}", node.id);
        }
    }
}

#[test]
fn test_default_doc_ids_are_generated() {
    let result = parse_doc("```\nmatch\n[#a]\n```\n", None);
    assert_eq!(result.results.blocks.len(), 1);
    assert!(result.results.blocks[0].block.id.starts_with("doc|"));
    assert!(result.time >= 0.0);
}

#[test]
fn test_code_block_span_matches_block_literal() {
    let result = parse_doc(GREETINGS, Some("docD"));
    let span = result
        .results
        .spans
        .iter()
        .find(|entry| entry.kind == "code_block")
        .expect("code_block span present");
    let text = &result.results.text;
    assert!(text[span.start..span.end].starts_with("match\n[#person name]"));
}

#[test]
fn test_lex_error_is_reported_per_block() {
    let result = parse_doc("```\nmatch\n{ x\n```\n", Some("docE"));
    assert_eq!(result.errors.len(), 1);
    assert!(matches!(result.errors[0], WeftError::Lex(_)));
    // The failing block still appears, empty.
    assert_eq!(result.results.blocks.len(), 1);
    assert!(result.results.blocks[0].nodes.is_empty());
}

#[test]
fn test_parse_source_names_blocks_from_prose() {
    let source = "Count them\n```\nmatch\n[#person]\nbind\n[#tally]\n```\nno block follows this line\n";
    let result = parse_source(source, Some("raw"));

    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    assert_eq!(result.results.blocks.len(), 1);
    let block = &result.results.blocks[0];
    assert_eq!(block.block.name, "Count them");
    assert_eq!(block.block.id, "raw|0|block");
    assert_eq!(block.block.binds.len(), 1);
}

#[test]
fn test_parse_source_unnamed_block() {
    let result = parse_source("```\nmatch\n[#a]\n```\n", Some("raw2"));
    assert_eq!(result.results.blocks[0].block.name, "Unnamed block");
}

#[test]
fn test_independent_documents_do_not_share_state() {
    let a = parse_doc("```\nmatch\nperson = [#person]\n```\n", Some("left"));
    let b = parse_doc("```\nmatch\nperson = [#machine]\n```\n", Some("right"));

    // Same variable spelling, distinct documents, distinct arenas.
    let pa = *a.results.blocks[0].block.variables.get("person").unwrap();
    let pb = *b.results.blocks[0].block.variables.get("person").unwrap();
    assert_eq!(
        a.results.blocks[0].nodes[pa].as_variable().unwrap().name,
        b.results.blocks[0].nodes[pb].as_variable().unwrap().name
    );
    assert!(a.results.blocks[0].block.id.starts_with("left|"));
    assert!(b.results.blocks[0].block.id.starts_with("right|"));
}

#[test]
fn test_doc_contents_serialize_with_flat_spans() {
    let result = parse_doc("```\nmatch\n[#a]\n```\n", Some("docF"));
    let json = serde_json::to_value(&result.results).expect("results serialize");

    let spans = json["spans"].as_array().expect("flat span array");
    assert_eq!(spans.len() % 4, 0, "four entries per span");
    assert!(json["blocks"].is_array());
}
