// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Lexical analysis for the weft DSL.
//!
//! Source is tokenized under four lexical contexts (document prose, code,
//! quoted string, and string embed) with one logos enum per context and an
//! explicit mode stack. Transitions are token-driven: a fence pushes code
//! mode, `"` pushes string mode, `{{` pushes code mode back (the string
//! embed), and the matching closers pop. The driver `morph()`s a single
//! logos lexer between the enums so byte position carries across contexts.
//!
//! # Design
//!
//! - `DocToken` / `CodeToken` / `StringToken` — per-context token sets
//! - `TokenKind` — the unified kind the parser consumes
//! - `Token` — kind, image, line/column/offset, and the post-lex id
//! - Longest match wins everywhere; priorities break same-length ties
//!   (keywords over identifiers, numbers over sign-prefixed identifiers)
//!
//! Identifiers deliberately admit most punctuation: the break characters are
//! only `@ # . , ( ) [ ] { } ⦑ ⦒ : "` plus whitespace, so `x-1` and `total=`
//! are single identifiers and infix operators must be whitespace-separated.

use logos::Logos;
use serde::{Deserialize, Serialize};

/// A lexical context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Document prose; fences open code blocks.
    Doc,
    /// DSL code, the default for fenced block parsing.
    Code,
    /// Quoted string contents.
    String,
}

/// Document-prose tokens.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
enum DocToken {
    /// Opening fence, including any info string on the fence line.
    #[regex(r"(```|~~~)[^\n]*", priority = 10)]
    Fence,

    /// A line of prose. Low priority so a pure-whitespace run resolves to
    /// the skip pattern; any longer line still wins on length.
    #[regex(r"[^\n]+", priority = 1)]
    Content,
}

/// Code-context tokens.
///
/// Whitespace and commas are insignificant and skipped.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n,]+")]
enum CodeToken {
    #[regex(r"```|~~~", priority = 10)]
    CloseFence,

    #[regex(r"//[^\n]*", priority = 10)]
    Comment,

    #[token("[")]
    OpenBracket,
    #[token("]")]
    CloseBracket,
    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,

    /// Closes a `{{ … }}` string embed, returning to string context.
    #[token("}}", priority = 10)]
    StringEmbedClose,

    /// Opens a string, entering string context.
    #[token("\"")]
    StringOpen,

    // === Keywords ===
    //
    // Longest match defers to identifiers for longer words (`ifx`, `nones`);
    // explicit priority wins the same-length tie against the identifier
    // pattern.
    #[token("bind", priority = 10)]
    Bind,
    #[token("commit", priority = 10)]
    Commit,
    #[token("match", priority = 10)]
    Match,
    #[token("is", priority = 10)]
    Is,
    #[token("if", priority = 10)]
    If,
    #[token("else", priority = 10)]
    Else,
    #[token("then", priority = 10)]
    Then,
    #[token("not", priority = 10)]
    Not,
    #[token("true", priority = 10)]
    True,
    #[token("false", priority = 10)]
    False,
    #[token("none", priority = 10)]
    None,

    // === Operators ===
    #[token(":=", priority = 10)]
    Set,
    #[token("<-", priority = 10)]
    Merge,
    #[token("+=", priority = 10)]
    #[token("-=", priority = 10)]
    Mutate,
    #[token(":", priority = 10)]
    #[token("=", priority = 10)]
    Equality,
    #[token(">=", priority = 10)]
    #[token("<=", priority = 10)]
    #[token("!=", priority = 10)]
    #[token(">", priority = 10)]
    #[token("<", priority = 10)]
    Comparison,
    #[token("+")]
    #[token("-")]
    AddInfix,
    #[token("*")]
    #[token("/")]
    MultInfix,
    #[token(".")]
    Dot,
    #[token("|", priority = 10)]
    Pipe,

    /// Sign-prefixed (`-total`, `/days`) or ordinary identifiers; the break
    /// characters end a name, everything else is fair game.
    #[regex(r#"[+\-*/][^ \t\r\n@#.,()\[\]{}⦑⦒:"]+"#)]
    #[regex(r#"[^ \t\r\n0-9+\-*/@#.,()\[\]{}⦑⦒:"][^ \t\r\n@#.,()\[\]{}⦑⦒:"]*"#)]
    Identifier,

    #[regex(r"-?[0-9]+(\.[0-9]+)?", priority = 10)]
    Num,

    #[regex(r"⦑[^⦒]*⦒")]
    Uuid,

    #[token("@")]
    At,
    #[token("#")]
    Hash,
}

/// String-context tokens.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum StringToken {
    #[token("\"")]
    Close,

    /// Opens a `{{ … }}` embed, entering code context.
    #[token("{{", priority = 10)]
    EmbedOpen,

    /// A run of literal characters. The lone-`{` alternative stands in for
    /// the original "`{` not followed by `{`" lookahead: `{{` always wins
    /// the longer match, so a single `{` only lexes here when the next
    /// character is not another `{`.
    #[regex(r#"([^"\\{]|\\.)+"#)]
    #[token("{")]
    Chars,
}

/// The unified token kind consumed by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenKind {
    // Document context
    Fence,
    CloseFence,
    DocContent,
    // Code context
    Comment,
    OpenBracket,
    CloseBracket,
    OpenParen,
    CloseParen,
    Bind,
    Commit,
    Match,
    Is,
    If,
    Else,
    Then,
    Not,
    True,
    False,
    None,
    Set,
    Merge,
    Mutate,
    Equality,
    Comparison,
    AddInfix,
    MultInfix,
    Dot,
    Pipe,
    Identifier,
    Num,
    Uuid,
    At,
    Hash,
    // String context
    StringOpen,
    StringClose,
    StringEmbedOpen,
    StringEmbedClose,
    StringChars,
}

impl TokenKind {
    /// Human-facing category, used as the span kind for editor tooling.
    pub fn label(self) -> &'static str {
        match self {
            TokenKind::Fence | TokenKind::CloseFence => "fence",
            TokenKind::DocContent => "content",
            TokenKind::Comment => "comment",
            TokenKind::OpenBracket | TokenKind::CloseBracket => "bracket",
            TokenKind::OpenParen | TokenKind::CloseParen => "paren",
            TokenKind::Bind
            | TokenKind::Commit
            | TokenKind::Match
            | TokenKind::Is
            | TokenKind::If
            | TokenKind::Else
            | TokenKind::Then
            | TokenKind::Not
            | TokenKind::None => "keyword",
            TokenKind::True | TokenKind::False => "boolean",
            TokenKind::Set => "set",
            TokenKind::Merge => "merge",
            TokenKind::Mutate => "mutate",
            TokenKind::Equality => "equality",
            TokenKind::Comparison => "comparison",
            TokenKind::AddInfix | TokenKind::MultInfix => "infix",
            TokenKind::Dot => "dot",
            TokenKind::Pipe => "pipe",
            TokenKind::Identifier => "identifier",
            TokenKind::Num => "number",
            TokenKind::Uuid => "uuid",
            TokenKind::At => "name",
            TokenKind::Hash => "tag",
            TokenKind::StringOpen
            | TokenKind::StringClose
            | TokenKind::StringEmbedOpen
            | TokenKind::StringEmbedClose
            | TokenKind::StringChars => "string",
        }
    }
}

/// A lexed token.
///
/// `offset` is the byte offset into the lexed source; `line` and `col` are
/// 1-based. `id` is empty until [`assign_token_ids`] runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub image: String,
    pub line: u32,
    pub col: u32,
    pub offset: usize,
    pub id: String,
}

/// The outcome of lexing one source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LexResult {
    pub tokens: Vec<Token>,
}

/// Lexer failure: no token class matched, or the mode stack underflowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub line: u32,
    pub col: u32,
    pub offset: usize,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}:{}", self.message, self.line, self.col)
    }
}

impl std::error::Error for LexError {}

/// Mode transition triggered by a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Push(Mode),
    Pop,
    Stay,
}

/// The single lexer value, morphed between contexts as the stack changes.
enum ModeLexer<'src> {
    Doc(logos::Lexer<'src, DocToken>),
    Code(logos::Lexer<'src, CodeToken>),
    Str(logos::Lexer<'src, StringToken>),
}

impl<'src> ModeLexer<'src> {
    fn new(source: &'src str, mode: Mode) -> Self {
        match mode {
            Mode::Doc => ModeLexer::Doc(DocToken::lexer(source)),
            Mode::Code => ModeLexer::Code(CodeToken::lexer(source)),
            Mode::String => ModeLexer::Str(StringToken::lexer(source)),
        }
    }

    fn morph_to(self, mode: Mode) -> Self {
        match (self, mode) {
            (ModeLexer::Doc(lx), Mode::Code) => ModeLexer::Code(lx.morph()),
            (ModeLexer::Doc(lx), Mode::String) => ModeLexer::Str(lx.morph()),
            (ModeLexer::Code(lx), Mode::Doc) => ModeLexer::Doc(lx.morph()),
            (ModeLexer::Code(lx), Mode::String) => ModeLexer::Str(lx.morph()),
            (ModeLexer::Str(lx), Mode::Doc) => ModeLexer::Doc(lx.morph()),
            (ModeLexer::Str(lx), Mode::Code) => ModeLexer::Code(lx.morph()),
            (same, _) => same,
        }
    }
}

/// Tokenize `source` starting in `mode`.
///
/// Documents start in [`Mode::Doc`]; fenced block literals are lexed with
/// [`Mode::Code`]. The first position where no token class matches is a
/// fatal [`LexError`], as is a closer with nothing on the mode stack.
pub fn lex(source: &str, mode: Mode) -> Result<LexResult, LexError> {
    let line_starts = compute_line_starts(source);
    let mut stack = vec![mode];
    let mut lexer = ModeLexer::new(source, mode);
    let mut tokens = Vec::new();

    loop {
        let step = match &mut lexer {
            ModeLexer::Doc(lx) => lx.next().map(|res| {
                let span = lx.span();
                (res.map(map_doc_token), span)
            }),
            ModeLexer::Code(lx) => lx.next().map(|res| {
                let span = lx.span();
                (res.map(map_code_token), span)
            }),
            ModeLexer::Str(lx) => lx.next().map(|res| {
                let span = lx.span();
                (res.map(map_string_token), span)
            }),
        };

        let (result, span) = match step {
            Some(step) => step,
            None => break,
        };

        let (line, col) = line_col(&line_starts, span.start);
        let (kind, transition) = match result {
            Ok(mapped) => mapped,
            Err(()) => {
                return Err(LexError {
                    message: format!("no token matches {:?}", &source[span.clone()]),
                    line,
                    col,
                    offset: span.start,
                });
            }
        };

        tokens.push(Token {
            kind,
            image: source[span.clone()].to_string(),
            line,
            col,
            offset: span.start,
            id: String::new(),
        });

        match transition {
            Transition::Stay => {}
            Transition::Push(next) => {
                stack.push(next);
                lexer = lexer.morph_to(next);
            }
            Transition::Pop => {
                stack.pop();
                match stack.last() {
                    Some(&top) => lexer = lexer.morph_to(top),
                    None => {
                        return Err(LexError {
                            message: format!(
                                "unbalanced {:?} closes nothing",
                                &source[span.clone()]
                            ),
                            line,
                            col,
                            offset: span.start,
                        });
                    }
                }
            }
        }
    }

    Ok(LexResult { tokens })
}

fn map_doc_token(token: DocToken) -> (TokenKind, Transition) {
    match token {
        DocToken::Fence => (TokenKind::Fence, Transition::Push(Mode::Code)),
        DocToken::Content => (TokenKind::DocContent, Transition::Stay),
    }
}

fn map_code_token(token: CodeToken) -> (TokenKind, Transition) {
    match token {
        CodeToken::CloseFence => (TokenKind::CloseFence, Transition::Pop),
        CodeToken::Comment => (TokenKind::Comment, Transition::Stay),
        CodeToken::OpenBracket => (TokenKind::OpenBracket, Transition::Stay),
        CodeToken::CloseBracket => (TokenKind::CloseBracket, Transition::Stay),
        CodeToken::OpenParen => (TokenKind::OpenParen, Transition::Stay),
        CodeToken::CloseParen => (TokenKind::CloseParen, Transition::Stay),
        CodeToken::StringEmbedClose => (TokenKind::StringEmbedClose, Transition::Pop),
        CodeToken::StringOpen => (TokenKind::StringOpen, Transition::Push(Mode::String)),
        CodeToken::Bind => (TokenKind::Bind, Transition::Stay),
        CodeToken::Commit => (TokenKind::Commit, Transition::Stay),
        CodeToken::Match => (TokenKind::Match, Transition::Stay),
        CodeToken::Is => (TokenKind::Is, Transition::Stay),
        CodeToken::If => (TokenKind::If, Transition::Stay),
        CodeToken::Else => (TokenKind::Else, Transition::Stay),
        CodeToken::Then => (TokenKind::Then, Transition::Stay),
        CodeToken::Not => (TokenKind::Not, Transition::Stay),
        CodeToken::True => (TokenKind::True, Transition::Stay),
        CodeToken::False => (TokenKind::False, Transition::Stay),
        CodeToken::None => (TokenKind::None, Transition::Stay),
        CodeToken::Set => (TokenKind::Set, Transition::Stay),
        CodeToken::Merge => (TokenKind::Merge, Transition::Stay),
        CodeToken::Mutate => (TokenKind::Mutate, Transition::Stay),
        CodeToken::Equality => (TokenKind::Equality, Transition::Stay),
        CodeToken::Comparison => (TokenKind::Comparison, Transition::Stay),
        CodeToken::AddInfix => (TokenKind::AddInfix, Transition::Stay),
        CodeToken::MultInfix => (TokenKind::MultInfix, Transition::Stay),
        CodeToken::Dot => (TokenKind::Dot, Transition::Stay),
        CodeToken::Pipe => (TokenKind::Pipe, Transition::Stay),
        CodeToken::Identifier => (TokenKind::Identifier, Transition::Stay),
        CodeToken::Num => (TokenKind::Num, Transition::Stay),
        CodeToken::Uuid => (TokenKind::Uuid, Transition::Stay),
        CodeToken::At => (TokenKind::At, Transition::Stay),
        CodeToken::Hash => (TokenKind::Hash, Transition::Stay),
    }
}

fn map_string_token(token: StringToken) -> (TokenKind, Transition) {
    match token {
        StringToken::Close => (TokenKind::StringClose, Transition::Pop),
        StringToken::EmbedOpen => (TokenKind::StringEmbedOpen, Transition::Push(Mode::Code)),
        StringToken::Chars => (TokenKind::StringChars, Transition::Stay),
    }
}

/// Assign stable token ids (`"<blockId>|<index>"`) after lexing.
pub fn assign_token_ids(tokens: &mut [Token], block_id: &str) {
    for (index, token) in tokens.iter_mut().enumerate() {
        token.id = format!("{}|{}", block_id, index);
    }
}

/// Decode the string escapes the DSL defines: `\n \t \r \" \{ \}`.
///
/// Any other backslash sequence is left intact.
pub fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('"') => result.push('"'),
                Some('{') => result.push('{'),
                Some('}') => result.push('}'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// Byte offsets of line starts, with an EOF sentinel.
fn compute_line_starts(source: &str) -> Vec<usize> {
    let mut line_starts = vec![0];
    for (idx, ch) in source.char_indices() {
        if ch == '\n' {
            line_starts.push(idx + 1);
        }
    }
    if line_starts.last() != Some(&source.len()) {
        line_starts.push(source.len());
    }
    line_starts
}

/// 1-based (line, column) for a byte offset.
fn line_col(line_starts: &[usize], offset: usize) -> (u32, u32) {
    let line_idx = match line_starts.binary_search(&offset) {
        Ok(idx) => idx,
        Err(idx) => idx.max(1) - 1,
    };
    ((line_idx + 1) as u32, (offset - line_starts[line_idx] + 1) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str, mode: Mode) -> Vec<TokenKind> {
        lex(source, mode)
            .expect("lexing should succeed")
            .tokens
            .iter()
            .map(|t| t.kind)
            .collect()
    }

    fn images(source: &str, mode: Mode) -> Vec<String> {
        lex(source, mode)
            .expect("lexing should succeed")
            .tokens
            .iter()
            .map(|t| t.image.clone())
            .collect()
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("match bind commit if else then not is none", Mode::Code),
            vec![
                TokenKind::Match,
                TokenKind::Bind,
                TokenKind::Commit,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::Then,
                TokenKind::Not,
                TokenKind::Is,
                TokenKind::None,
            ]
        );
    }

    #[test]
    fn test_longer_identifier_beats_keyword() {
        assert_eq!(kinds("ifx", Mode::Code), vec![TokenKind::Identifier]);
        assert_eq!(kinds("matches", Mode::Code), vec![TokenKind::Identifier]);
        assert_eq!(
            kinds("if x", Mode::Code),
            vec![TokenKind::If, TokenKind::Identifier]
        );
    }

    #[test]
    fn test_numbers_and_signed_identifiers() {
        assert_eq!(kinds("-3", Mode::Code), vec![TokenKind::Num]);
        assert_eq!(kinds("3.25", Mode::Code), vec![TokenKind::Num]);
        // A dash inside a word is not a break character.
        assert_eq!(kinds("x-1", Mode::Code), vec![TokenKind::Identifier]);
        assert_eq!(kinds("-total", Mode::Code), vec![TokenKind::Identifier]);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds(":= <- += -= : = >= != > + * . |", Mode::Code),
            vec![
                TokenKind::Set,
                TokenKind::Merge,
                TokenKind::Mutate,
                TokenKind::Mutate,
                TokenKind::Equality,
                TokenKind::Equality,
                TokenKind::Comparison,
                TokenKind::Comparison,
                TokenKind::Comparison,
                TokenKind::AddInfix,
                TokenKind::MultInfix,
                TokenKind::Dot,
                TokenKind::Pipe,
            ]
        );
    }

    #[test]
    fn test_record_shorthand() {
        assert_eq!(
            kinds(r#"[#person name: "alice"]"#, Mode::Code),
            vec![
                TokenKind::OpenBracket,
                TokenKind::Hash,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Equality,
                TokenKind::StringOpen,
                TokenKind::StringChars,
                TokenKind::StringClose,
                TokenKind::CloseBracket,
            ]
        );
    }

    #[test]
    fn test_commas_are_skipped() {
        assert_eq!(
            kinds("a, b, c", Mode::Code),
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier
            ]
        );
    }

    #[test]
    fn test_comment_is_a_token() {
        assert_eq!(
            kinds("// a note\nx", Mode::Code),
            vec![TokenKind::Comment, TokenKind::Identifier]
        );
    }

    #[test]
    fn test_uuid() {
        assert_eq!(
            images("⦑abc-123⦒", Mode::Code),
            vec!["⦑abc-123⦒".to_string()]
        );
        assert_eq!(kinds("⦑abc-123⦒", Mode::Code), vec![TokenKind::Uuid]);
    }

    #[test]
    fn test_string_embed_round_trip() {
        assert_eq!(
            kinds(r#""hello {{name}}!""#, Mode::Code),
            vec![
                TokenKind::StringOpen,
                TokenKind::StringChars,
                TokenKind::StringEmbedOpen,
                TokenKind::Identifier,
                TokenKind::StringEmbedClose,
                TokenKind::StringChars,
                TokenKind::StringClose,
            ]
        );
    }

    #[test]
    fn test_lone_brace_in_string_is_literal() {
        assert_eq!(
            kinds(r#""a {b""#, Mode::Code),
            vec![
                TokenKind::StringOpen,
                TokenKind::StringChars,
                TokenKind::StringChars,
                TokenKind::StringChars,
                TokenKind::StringClose,
            ]
        );
    }

    #[test]
    fn test_doc_mode_fences() {
        let tokens = lex("Some prose\n```eve\nmatch\n```\nmore prose", Mode::Doc)
            .expect("lexing should succeed");
        let kinds: Vec<_> = tokens.tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::DocContent,
                TokenKind::Fence,
                TokenKind::Match,
                TokenKind::CloseFence,
                TokenKind::DocContent,
            ]
        );
        assert_eq!(tokens.tokens[1].image, "```eve");
    }

    #[test]
    fn test_positions() {
        let result = lex("a\n  b", Mode::Code).expect("lexing should succeed");
        let b = &result.tokens[1];
        assert_eq!((b.line, b.col, b.offset), (2, 3, 4));
    }

    #[test]
    fn test_assign_token_ids() {
        let mut result = lex("a b", Mode::Code).expect("lexing should succeed");
        assign_token_ids(&mut result.tokens, "doc|1|block");
        assert_eq!(result.tokens[0].id, "doc|1|block|0");
        assert_eq!(result.tokens[1].id, "doc|1|block|1");
    }

    #[test]
    fn test_stray_brace_is_an_error() {
        let err = lex("{ x", Mode::Code).unwrap_err();
        assert_eq!((err.line, err.col), (1, 1));
    }

    #[test]
    fn test_unbalanced_embed_close_is_an_error() {
        let err = lex("x }}", Mode::Code).unwrap_err();
        assert!(err.message.contains("unbalanced"));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape_string(r"a\nb"), "a\nb");
        assert_eq!(unescape_string(r#"say \"hi\""#), "say \"hi\"");
        assert_eq!(unescape_string(r"lone \q stays"), r"lone \q stays");
        assert_eq!(unescape_string(r"\{literal\}"), "{literal}");
    }
}
