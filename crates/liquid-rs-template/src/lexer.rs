//! Expression tokenizer.
//!
//! Splits the interior of a `{{ ... }}` or `{% ... %}` region into
//! [`Token`]s. Tokens borrow their text from the template source and carry
//! absolute byte offsets into it, so errors raised later can point straight
//! back at the offending characters.

use liquid_rs_core::error::ParseError;

/// The kind of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A name: `user`, `forloop`, `assign`.
    Identifier,
    /// `.`
    Dot,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// A symbolic or word operator: `==`, `<>`, `+`, `and`, `not`.
    Operator,
    /// `|`
    Pipe,
    /// `:`
    Colon,
    /// `,`
    Comma,
    /// `true` or `false`.
    BooleanLiteral,
    /// A run of decimal digits.
    IntegerLiteral,
    /// A `'...'` or `"..."` literal, quotes included.
    StringLiteral,
    /// `nil`
    Nil,
}

/// A token borrowed from the template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// What the token is.
    pub kind: TokenKind,
    /// The exact source text of the token.
    pub text: &'a str,
    /// Byte offset of the first character in the template source.
    pub offset: usize,
}

impl<'a> Token<'a> {
    /// Returns `true` if this token has the given kind.
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Returns `true` if this is an identifier spelled `word`.
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == word
    }

    /// Returns `true` if this is the operator `op`.
    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == op
    }

    /// The contents of a string literal without its quotes.
    pub fn unquoted(&self) -> &'a str {
        if self.kind == TokenKind::StringLiteral && self.text.len() >= 2 {
            &self.text[1..self.text.len() - 1]
        } else {
            self.text
        }
    }

    /// Byte offset just past the token.
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }
}

const PUNCTUATORS: &[u8] = b"!<>=+-*/";

/// Tokenizes `source[start..end]`.
///
/// Whitespace (spaces, tabs, newlines) between tokens is skipped. String
/// literals run to the next occurrence of their opening quote; there are no
/// escape sequences.
///
/// # Errors
///
/// Returns a [`ParseError`] on an unterminated string literal or a character
/// that cannot start a token.
///
/// # Examples
///
/// ```
/// use liquid_rs_template::lexer::{tokenize, TokenKind};
///
/// let src = "{{ a <> 'b' }}";
/// let tokens = tokenize(src, 2, src.len() - 2).unwrap();
/// let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
/// assert_eq!(kinds, [TokenKind::Identifier, TokenKind::Operator, TokenKind::StringLiteral]);
/// assert_eq!(tokens[1].offset, 5);
/// ```
pub fn tokenize(source: &str, start: usize, end: usize) -> Result<Vec<Token<'_>>, ParseError> {
    let mut tokenizer = Tokenizer {
        source,
        pos: start,
        end,
    };
    let mut tokens = Vec::new();

    tokenizer.skip_spaces();
    while tokenizer.pos < tokenizer.end {
        tokens.push(tokenizer.read()?);
        tokenizer.skip_spaces();
    }

    Ok(tokens)
}

struct Tokenizer<'a> {
    source: &'a str,
    pos: usize,
    end: usize,
}

impl<'a> Tokenizer<'a> {
    fn peek(&self) -> Option<u8> {
        (self.pos < self.end).then(|| self.source.as_bytes()[self.pos])
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn produce(&self, kind: TokenKind, start: usize) -> Token<'a> {
        Token {
            kind,
            text: &self.source[start..self.pos],
            offset: start,
        }
    }

    fn read(&mut self) -> Result<Token<'a>, ParseError> {
        let start = self.pos;
        let Some(c) = self.peek() else {
            return Err(ParseError::new(start, "Unexpected end of input"));
        };

        let single = match c {
            b'|' => Some(TokenKind::Pipe),
            b':' => Some(TokenKind::Colon),
            b'.' => Some(TokenKind::Dot),
            b',' => Some(TokenKind::Comma),
            b'[' => Some(TokenKind::LeftBracket),
            b']' => Some(TokenKind::RightBracket),
            _ => None,
        };
        if let Some(kind) = single {
            self.pos += 1;
            return Ok(self.produce(kind, start));
        }

        match c {
            b'0'..=b'9' => Ok(self.read_integer()),
            b'\'' | b'"' => self.read_string(c),
            c if c.is_ascii_alphabetic() || c == b'_' => Ok(self.read_identifier()),
            c if PUNCTUATORS.contains(&c) => Ok(self.read_operator()),
            _ => {
                let ch = self.source[start..].chars().next().unwrap_or('?');
                Err(ParseError::new(start, format!("Unexpected input '{ch}'")))
            }
        }
    }

    fn read_integer(&mut self) -> Token<'a> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        self.produce(TokenKind::IntegerLiteral, start)
    }

    fn read_string(&mut self, quote: u8) -> Result<Token<'a>, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let body = &self.source.as_bytes()[self.pos..self.end];
        match body.iter().position(|&b| b == quote) {
            Some(len) => {
                self.pos += len + 1;
                Ok(self.produce(TokenKind::StringLiteral, start))
            }
            None => Err(ParseError::new(self.pos, "Malformed string literal")),
        }
    }

    fn read_identifier(&mut self) -> Token<'a> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.pos += 1;
        }
        let mut token = self.produce(TokenKind::Identifier, start);
        token.kind = match token.text {
            "or" | "and" | "xor" | "not" => TokenKind::Operator,
            "true" | "false" => TokenKind::BooleanLiteral,
            "nil" => TokenKind::Nil,
            _ => TokenKind::Identifier,
        };
        token
    }

    fn read_operator(&mut self) -> Token<'a> {
        let start = self.pos;
        let first = self.source.as_bytes()[self.pos];
        self.pos += 1;

        match (first, self.peek()) {
            (b'<' | b'>' | b'=' | b'!', Some(b'=')) | (b'<', Some(b'>')) => self.pos += 1,
            _ => {}
        }

        self.produce(TokenKind::Operator, start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src, 0, src.len())
            .unwrap()
            .iter()
            .map(|t| t.kind)
            .collect()
    }

    fn texts(src: &str) -> Vec<&str> {
        tokenize(src, 0, src.len())
            .unwrap()
            .iter()
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_tokenize_member_and_index() {
        use TokenKind::*;
        assert_eq!(
            kinds("user.name[0]"),
            [Identifier, Dot, Identifier, LeftBracket, IntegerLiteral, RightBracket]
        );
    }

    #[test]
    fn test_tokenize_reclassifies_words() {
        use TokenKind::*;
        assert_eq!(
            kinds("a or b and not c xor true nil false"),
            [
                Identifier,
                Operator,
                Identifier,
                Operator,
                Operator,
                Identifier,
                Operator,
                BooleanLiteral,
                Nil,
                BooleanLiteral
            ]
        );
    }

    #[test]
    fn test_tokenize_compound_operators() {
        assert_eq!(
            texts("a<=b >= c == d != e <> f < g"),
            ["a", "<=", "b", ">=", "c", "==", "d", "!=", "e", "<>", "f", "<", "g"]
        );
    }

    #[test]
    fn test_tokenize_single_char_operators() {
        assert_eq!(texts("1+2-3*4/5"), ["1", "+", "2", "-", "3", "*", "4", "/", "5"]);
        assert_eq!(texts("x = 1"), ["x", "=", "1"]);
        assert_eq!(texts("!x"), ["!", "x"]);
    }

    #[test]
    fn test_tokenize_filters() {
        use TokenKind::*;
        assert_eq!(
            kinds("x | join: ', '"),
            [Identifier, Pipe, Identifier, Colon, StringLiteral]
        );
    }

    #[test]
    fn test_string_literal_has_no_escapes() {
        let src = r#"'a\' "b""#;
        let tokens = tokenize(src, 0, src.len()).unwrap();
        assert_eq!(tokens[0].unquoted(), "a\\");
        assert_eq!(tokens[1].unquoted(), "b");
    }

    #[test]
    fn test_offsets_are_absolute() {
        let src = "{{  name  }}";
        let tokens = tokenize(src, 2, 10).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].offset, 4);
        assert_eq!(tokens[0].end(), 8);
    }

    #[test]
    fn test_string_stops_at_span_end() {
        let src = "{{ 'abc }} '";
        let err = tokenize(src, 2, 8).unwrap_err();
        assert_eq!(err.message, "Malformed string literal");
        assert_eq!(err.offset, 4);
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("a # b", 0, 5).unwrap_err();
        assert_eq!(err.message, "Unexpected input '#'");
        assert_eq!(err.offset, 2);
    }

    #[test]
    fn test_whitespace_only() {
        assert!(tokenize(" \n\t ", 0, 4).unwrap().is_empty());
    }
}
