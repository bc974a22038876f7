//! Span accumulation for editor tooling.
//!
//! Every syntactic token and markdown node in a document contributes a
//! `(start, end, kind, id)` quadruple. The table serializes as one flat
//! sequence (four entries per span), which is the wire contract consumed
//! by editors; richer per-span metadata (heading levels, list data, link
//! destinations) lives in a side table keyed by span id.

use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};

/// One span: byte offsets into the flattened document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanEntry {
    pub start: usize,
    pub end: usize,
    pub kind: String,
    pub id: String,
}

/// Accumulated spans, in emission order.
///
/// Markdown spans for a block precede that block's token spans because the
/// extractor runs first; no ordering is promised across blocks.
#[derive(Debug, Clone, Default)]
pub struct SpanTable {
    entries: Vec<SpanEntry>,
}

impl SpanTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a span.
    pub fn push(
        &mut self,
        start: usize,
        end: usize,
        kind: impl Into<String>,
        id: impl Into<String>,
    ) {
        self.entries.push(SpanEntry {
            start,
            end,
            kind: kind.into(),
            id: id.into(),
        });
    }

    pub fn entries(&self) -> &[SpanEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpanEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for SpanTable {
    /// Emits the flat `[start0, end0, kind0, id0, start1, …]` layout.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len() * 4))?;
        for entry in &self.entries {
            seq.serialize_element(&entry.start)?;
            seq.serialize_element(&entry.end)?;
            seq.serialize_element(&entry.kind)?;
            seq.serialize_element(&entry.id)?;
        }
        seq.end()
    }
}

/// Optional metadata attached to a span, keyed by span id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanExtra {
    /// Heading level, for `heading` spans.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    /// List metadata, for `item` spans.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_data: Option<ListData>,
    /// Link target, for `link` spans.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

/// List metadata recorded for `item` spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListData {
    pub ordered: bool,
    pub start: usize,
}
