//! CommonMark extraction.
//!
//! Walks a comrak tree as entering/leaving events, producing a flattened
//! text whose line structure matches the source document, the list of
//! fenced code blocks to parse, and spans for inline styles, headings,
//! list items, links, and blocks.
//!
//! Line alignment works by injecting synthetic newlines before each
//! entering event until the flattened text has caught up with the node's
//! source line; per-block character offsets therefore survive into the
//! flattened text, and `text[start..end]` reproduces each span's content.

use std::collections::HashMap;

use comrak::arena_tree::NodeEdge;
use comrak::nodes::{AstNode, ListType, NodeValue};
use comrak::{parse_document, Arena, Options};

use weft_ast::{ListData, SpanExtra, SpanTable};

/// A fenced code block emitted by the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// `"<docId>|<n>|block"`
    pub id: String,
    /// The fence info string (language tag), possibly empty.
    pub info: String,
    /// The block's literal content, fences excluded.
    pub literal: String,
    /// Byte offset of the literal in the flattened text.
    pub start_offset: usize,
}

/// Everything the extractor produces for one document.
#[derive(Debug, Default)]
pub struct Extraction {
    pub text: String,
    pub blocks: Vec<CodeBlock>,
    pub spans: SpanTable,
    pub extra_info: HashMap<String, SpanExtra>,
}

/// Extract flattened text, code blocks, and spans from a CommonMark
/// document.
pub fn extract(source: &str, doc_id: &str) -> Extraction {
    let arena = Arena::new();
    let options = Options::default();
    let root = parse_document(&arena, source, &options);

    let mut out = Extraction::default();
    let mut pos = 0usize;
    let mut last_line = 1usize;
    let mut next_span = 0usize;
    // Open containers awaiting their leaving event.
    let mut stack = Vec::new();

    for edge in root.traverse() {
        match edge {
            NodeEdge::Start(node) => {
                let data = node.data.borrow();
                let sourcepos = data.sourcepos;

                // Realign the flattened text with the document's line
                // structure before handling the node itself.
                while last_line < sourcepos.start.line {
                    out.text.push('\n');
                    pos += 1;
                    last_line += 1;
                }

                match &data.value {
                    NodeValue::Text(literal) => {
                        out.text.push_str(literal);
                        pos += literal.len();
                    }
                    NodeValue::SoftBreak => {
                        out.text.push('\n');
                        pos += 1;
                        last_line += 1;
                    }
                    NodeValue::Code(code) => {
                        let start = pos;
                        out.text.push_str(&code.literal);
                        pos += code.literal.len();
                        let id = format!("{}|{}", doc_id, next_span);
                        next_span += 1;
                        out.spans.push(start, pos, "code", id);
                    }
                    NodeValue::CodeBlock(block) => {
                        let start = pos;
                        out.text.push_str(&block.literal);
                        pos += block.literal.len();
                        let id = format!("{}|{}|block", doc_id, next_span);
                        next_span += 1;
                        out.spans.push(start, pos, "code_block", id.clone());
                        out.blocks.push(CodeBlock {
                            id,
                            info: block.info.clone(),
                            literal: block.literal.clone(),
                            start_offset: start,
                        });
                        // The literal excludes the fences; skip the lines
                        // the block occupied in the source.
                        last_line = sourcepos.end.line + 1;
                    }
                    NodeValue::Emph
                    | NodeValue::Strong
                    | NodeValue::Link(_)
                    | NodeValue::Heading(_)
                    | NodeValue::Item(_) => {
                        let id = format!("{}|{}", doc_id, next_span);
                        next_span += 1;
                        stack.push((node, pos, id));
                    }
                    _ => {}
                }
            }
            NodeEdge::End(node) => {
                let data = node.data.borrow();
                match &data.value {
                    NodeValue::Emph => {
                        let (start, id) = pop_container(&mut stack, node);
                        out.spans.push(start, pos, "emph", id);
                    }
                    NodeValue::Strong => {
                        let (start, id) = pop_container(&mut stack, node);
                        out.spans.push(start, pos, "strong", id);
                    }
                    NodeValue::Link(link) => {
                        let (start, id) = pop_container(&mut stack, node);
                        out.spans.push(start, pos, "link", id.clone());
                        out.extra_info.entry(id).or_default().destination =
                            Some(link.url.clone());
                    }
                    NodeValue::Heading(heading) => {
                        let (start, id) = pop_container(&mut stack, node);
                        out.spans.push(start, start, "heading", id.clone());
                        out.extra_info.entry(id).or_default().level = Some(heading.level);
                    }
                    NodeValue::Item(list) => {
                        let (start, id) = pop_container(&mut stack, node);
                        out.spans.push(start, start, "item", id.clone());
                        out.extra_info.entry(id).or_default().list_data = Some(ListData {
                            ordered: list.list_type == ListType::Ordered,
                            start: list.start,
                        });
                    }
                    _ => {}
                }
            }
        }
    }

    assert!(stack.is_empty(), "BUG: walker left unclosed containers");
    out
}

/// Pop the container for a leaving event; it must be the one on top.
fn pop_container<'a>(
    stack: &mut Vec<(&'a AstNode<'a>, usize, String)>,
    node: &'a AstNode<'a>,
) -> (usize, String) {
    let (open, start, id) = stack.pop().expect("BUG: walker stack underflow");
    assert!(
        std::ptr::eq(open, node),
        "BUG: walker popped a container that does not match its leaving event"
    );
    (start, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_text<'a>(extraction: &'a Extraction, kind: &str) -> Vec<&'a str> {
        extraction
            .spans
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| &extraction.text[entry.start..entry.end])
            .collect()
    }

    #[test]
    fn test_code_block_extraction() {
        let source = "# People\n\nSome prose here.\n\n```eve\nmatch\n[#person]\n```\n";
        let extraction = extract(source, "doc");

        assert_eq!(extraction.blocks.len(), 1);
        let block = &extraction.blocks[0];
        assert_eq!(block.literal, "match\n[#person]\n");
        assert_eq!(block.info, "eve");
        assert!(block.id.ends_with("|block"));

        // The literal sits verbatim in the flattened text at its offset.
        let embedded =
            &extraction.text[block.start_offset..block.start_offset + block.literal.len()];
        assert_eq!(embedded, block.literal);
    }

    #[test]
    fn test_inline_style_spans_round_trip() {
        let source = "plain *emphasis* and **strong** text\n";
        let extraction = extract(source, "doc");

        assert_eq!(span_text(&extraction, "emph"), vec!["emphasis"]);
        assert_eq!(span_text(&extraction, "strong"), vec!["strong"]);
    }

    #[test]
    fn test_heading_spans_are_zero_width_with_level() {
        let source = "## Section\n\nbody\n";
        let extraction = extract(source, "doc");

        let heading = extraction
            .spans
            .iter()
            .find(|entry| entry.kind == "heading")
            .expect("heading span present");
        assert_eq!(heading.start, heading.end);
        assert_eq!(
            extraction.extra_info.get(&heading.id).and_then(|e| e.level),
            Some(2)
        );
    }

    #[test]
    fn test_link_destination_recorded() {
        let source = "see [the docs](https://example.com/docs)\n";
        let extraction = extract(source, "doc");

        let link = extraction
            .spans
            .iter()
            .find(|entry| entry.kind == "link")
            .expect("link span present");
        assert_eq!(&extraction.text[link.start..link.end], "the docs");
        assert_eq!(
            extraction
                .extra_info
                .get(&link.id)
                .and_then(|e| e.destination.as_deref()),
            Some("https://example.com/docs")
        );
    }

    #[test]
    fn test_list_items_record_list_data() {
        let source = "3. first\n4. second\n";
        let extraction = extract(source, "doc");

        let items: Vec<_> = extraction
            .spans
            .iter()
            .filter(|entry| entry.kind == "item")
            .collect();
        assert_eq!(items.len(), 2);
        let data = extraction
            .extra_info
            .get(&items[0].id)
            .and_then(|e| e.list_data)
            .expect("list data recorded");
        assert!(data.ordered);
        assert_eq!(data.start, 3);
    }

    #[test]
    fn test_line_realignment_preserves_line_structure() {
        let source = "first\n\nsecond paragraph\n";
        let extraction = extract(source, "doc");

        // Paragraph two starts on source line 3; the flattened text keeps
        // the blank line between them.
        let lines: Vec<&str> = extraction.text.lines().collect();
        assert_eq!(lines[0], "first");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "second paragraph");
    }

    #[test]
    fn test_softbreak_becomes_newline() {
        let source = "one\ntwo\n";
        let extraction = extract(source, "doc");
        assert!(extraction.text.starts_with("one\ntwo"));
    }
}
