//! Token cursor for the hand-written parser.

use weft_lexer::{Token, TokenKind};

use super::ParseError;

/// Token cursor with lookahead and position tracking.
///
/// Tokens are addressed by index so that provenance lists can refer back to
/// them; references borrow from the underlying token slice, not from the
/// cursor, so a peeked token stays usable across parser mutation.
pub struct TokenCursor<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> TokenCursor<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Peek at the current token without consuming it.
    pub fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    /// Peek at the current token's kind.
    pub fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    /// Peek at the nth token ahead without consuming.
    pub fn peek_nth(&self, n: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + n)
    }

    /// Kind of the nth token ahead.
    pub fn peek_nth_kind(&self, n: usize) -> Option<TokenKind> {
        self.peek_nth(n).map(|t| t.kind)
    }

    /// Consume the current token, returning its index.
    pub fn advance(&mut self) -> Option<usize> {
        if self.pos < self.tokens.len() {
            let index = self.pos;
            self.pos += 1;
            Some(index)
        } else {
            None
        }
    }

    /// Whether the current token has the given kind.
    pub fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    /// Expect a token of the given kind and consume it.
    pub fn expect(&mut self, kind: TokenKind, what: &str) -> Result<usize, ParseError> {
        if self.check(kind) {
            Ok(self.advance().expect("BUG: check passed but stream is empty"))
        } else {
            Err(ParseError::expected(what, self.peek(), self.position()))
        }
    }

    /// Get a token by index.
    pub fn get(&self, index: usize) -> &'t Token {
        &self.tokens[index]
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Total number of tokens in the stream.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// (line, col) of the current token, or of the end of input.
    pub fn position(&self) -> (u32, u32) {
        match self.peek().or_else(|| self.tokens.last()) {
            Some(token) => (token.line, token.col),
            None => (1, 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_lexer::{lex, Mode};

    #[test]
    fn test_peek_and_advance() {
        let result = lex("a b c", Mode::Code).unwrap();
        let mut cursor = TokenCursor::new(&result.tokens);

        assert_eq!(cursor.peek_kind(), Some(TokenKind::Identifier));
        assert_eq!(cursor.peek_nth(2).map(|t| t.image.as_str()), Some("c"));

        let first = cursor.advance().unwrap();
        assert_eq!(cursor.get(first).image, "a");
        assert!(!cursor.at_end());
    }

    #[test]
    fn test_expect_mismatch_reports_position() {
        let result = lex("a", Mode::Code).unwrap();
        let mut cursor = TokenCursor::new(&result.tokens);

        let err = cursor.expect(TokenKind::OpenBracket, "a record").unwrap_err();
        assert_eq!((err.line, err.col), (1, 1));
        assert!(err.message.contains("a record"));
    }
}
