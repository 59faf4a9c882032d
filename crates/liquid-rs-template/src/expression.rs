//! Expression parser.
//!
//! Grammar:
//!
//! ```text
//! expr    := operand (operator operand)* ('|' filter)*
//! operand := ('not' | '!') operand
//!          | primary ('.' identifier | '[' expr ']')*
//! primary := identifier | literal | '[' (expr (',' expr)*)? ']'
//! filter  := identifier (':' constant (',' constant)*)?
//! ```
//!
//! The flat operand/operator list is folded into a tree by splitting at the
//! loosest-binding operator, scanning right to left so that operators of equal
//! precedence associate to the left.

use liquid_rs_core::error::ParseError;

use crate::lexer::{Token, TokenKind};
use crate::nodes::{BinaryOperator, Expr};
use crate::value::Value;

/// Parses a whole token slice as one expression.
///
/// `end` is the offset reported when the tokens run out unexpectedly
/// (normally the position of the closing delimiter).
///
/// # Errors
///
/// Returns a [`ParseError`] pointing at the offending token.
///
/// # Examples
///
/// ```
/// use liquid_rs_template::expression::parse_expression;
/// use liquid_rs_template::lexer::tokenize;
/// use liquid_rs_template::nodes::{BinaryOperator, Expr};
///
/// let src = "a or b and c";
/// let tokens = tokenize(src, 0, src.len()).unwrap();
/// let expr = parse_expression(&tokens, src.len()).unwrap();
/// assert!(matches!(expr, Expr::Binary { op: BinaryOperator::Or, .. }));
/// ```
pub fn parse_expression(tokens: &[Token<'_>], end: usize) -> Result<Expr, ParseError> {
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        end,
    };
    let expr = parser.parse()?;

    if let Some(tok) = parser.peek() {
        return Err(ParseError::new(
            tok.offset,
            format!("Unexpected token '{}'", tok.text),
        ));
    }

    Ok(expr)
}

/// Parses a filter argument or other constant: a boolean, integer, string,
/// `nil`, a negated integer, or an array of constants.
///
/// Returns the value and the number of tokens consumed.
///
/// # Errors
///
/// Returns a [`ParseError`] if the tokens do not start with a constant.
pub fn parse_constant(tokens: &[Token<'_>], end: usize) -> Result<(Value, usize), ParseError> {
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        end,
    };
    let value = parser.read_constant()?;
    Ok((value, parser.pos))
}

struct ExprParser<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
    end: usize,
}

impl<'t, 'a> ExprParser<'t, 'a> {
    fn peek(&self) -> Option<&'t Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.is(kind))
    }

    fn next(&mut self) -> Result<&'t Token<'a>, ParseError> {
        let tok = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| ParseError::new(self.end, "Unexpected end of input"))?;
        self.pos += 1;
        Ok(tok)
    }

    fn parse(&mut self) -> Result<Expr, ParseError> {
        if self.peek().is_none() {
            return Err(ParseError::new(self.end, "Expected expression"));
        }

        let first = self.read_operand()?;
        let mut rest = Vec::new();

        while let Some(tok) = self.peek() {
            if tok.is(TokenKind::Pipe) {
                break;
            }
            let op = self.read_operator()?;
            let operand = self.read_operand()?;
            rest.push((op, tok.offset, operand));
        }

        let mut expr = build_tree(first, rest);

        while self.peek_is(TokenKind::Pipe) {
            expr = self.read_filter(expr)?;
        }

        Ok(expr)
    }

    fn read_operator(&mut self) -> Result<BinaryOperator, ParseError> {
        let tok = self.next()?;
        if !tok.is(TokenKind::Operator) {
            return Err(ParseError::new(tok.offset, "Expected operator"));
        }
        BinaryOperator::from_symbol(tok.text).ok_or_else(|| {
            ParseError::new(tok.offset, format!("'{}' is not a binary operator", tok.text))
        })
    }

    fn read_operand(&mut self) -> Result<Expr, ParseError> {
        let tok = self.next()?;

        let mut expr = match tok.kind {
            TokenKind::Operator if tok.text == "not" || tok.text == "!" => {
                let operand = self.read_operand()?;
                return Ok(Expr::Not {
                    operand: Box::new(operand),
                    offset: tok.offset,
                });
            }
            TokenKind::Operator if tok.text == "-" && self.peek_is(TokenKind::IntegerLiteral) => {
                self.pos -= 1;
                Expr::Literal {
                    value: self.read_constant()?,
                    offset: tok.offset,
                }
            }
            TokenKind::Identifier => Expr::Variable {
                name: tok.text.to_string(),
                offset: tok.offset,
            },
            TokenKind::BooleanLiteral
            | TokenKind::IntegerLiteral
            | TokenKind::StringLiteral
            | TokenKind::Nil => Expr::Literal {
                value: literal_value(tok)?,
                offset: tok.offset,
            },
            TokenKind::LeftBracket => self.read_array_literal(tok)?,
            _ => return Err(ParseError::new(tok.offset, "Expected operand")),
        };

        loop {
            if self.peek_is(TokenKind::Dot) {
                let dot = self.next()?;
                let name = self
                    .peek()
                    .filter(|t| t.is(TokenKind::Identifier))
                    .ok_or_else(|| ParseError::new(dot.offset, "Expected identifier after '.'"))?;
                self.pos += 1;
                expr = Expr::MemberAccess {
                    target: Box::new(expr),
                    name: name.text.to_string(),
                    offset: name.offset,
                };
            } else if self.peek_is(TokenKind::LeftBracket) {
                let bracket = self.next()?;
                let inner = self.take_bracketed(bracket)?;
                if inner.is_empty() {
                    return Err(ParseError::new(
                        bracket.offset,
                        "Invalid empty index in array access",
                    ));
                }
                let closing = self.tokens[self.pos - 1].offset;
                let index = parse_expression(inner, closing)?;
                expr = Expr::ArrayAccess {
                    target: Box::new(expr),
                    index: Box::new(index),
                    offset: bracket.offset,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Consumes tokens up to the `]` matching an already-consumed `[` and
    /// returns the tokens between them.
    fn take_bracketed(&mut self, open: &Token<'a>) -> Result<&'t [Token<'a>], ParseError> {
        let start = self.pos;
        let mut depth = 0usize;

        while let Some(tok) = self.peek() {
            match tok.kind {
                TokenKind::LeftBracket => depth += 1,
                TokenKind::RightBracket if depth == 0 => {
                    self.pos += 1;
                    return Ok(&self.tokens[start..self.pos - 1]);
                }
                TokenKind::RightBracket => depth -= 1,
                _ => {}
            }
            self.pos += 1;
        }

        Err(ParseError::new(open.offset, "Could not find closing bracket ']'"))
    }

    fn read_array_literal(&mut self, open: &Token<'a>) -> Result<Expr, ParseError> {
        let inner = self.take_bracketed(open)?;
        let closing = self.tokens[self.pos - 1].offset;
        let items = split_top_level(inner, TokenKind::Comma)
            .into_iter()
            .map(|item| parse_expression(item, closing))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Expr::ArrayLiteral {
            items,
            offset: open.offset,
        })
    }

    fn read_constant(&mut self) -> Result<Value, ParseError> {
        let tok = self.next()?;
        match tok.kind {
            TokenKind::BooleanLiteral
            | TokenKind::IntegerLiteral
            | TokenKind::StringLiteral
            | TokenKind::Nil => literal_value(tok),
            TokenKind::Operator if tok.text == "-" => {
                let digits = self.next()?;
                if !digits.is(TokenKind::IntegerLiteral) {
                    return Err(ParseError::new(digits.offset, "Expected integer after '-'"));
                }
                format!("-{}", digits.text)
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| ParseError::new(tok.offset, "Integer literal out of range"))
            }
            TokenKind::LeftBracket => {
                let inner = self.take_bracketed(tok)?;
                let closing = self.tokens[self.pos - 1].offset;
                let mut items = Vec::new();
                for item in split_top_level(inner, TokenKind::Comma) {
                    let (value, used) = parse_constant(item, closing)?;
                    if let Some(extra) = item.get(used) {
                        return Err(ParseError::new(extra.offset, "Expected ',' or ']'"));
                    }
                    items.push(value);
                }
                Ok(Value::Array(items))
            }
            _ => Err(ParseError::new(
                tok.offset,
                "Filter arguments must be literals",
            )),
        }
    }

    fn read_filter(&mut self, target: Expr) -> Result<Expr, ParseError> {
        let pipe = self.next()?;
        let name = self
            .peek()
            .filter(|t| t.is(TokenKind::Identifier))
            .ok_or_else(|| ParseError::new(pipe.offset, "Expected filter name after '|'"))?;
        self.pos += 1;

        let mut args = Vec::new();

        if self.peek().is_some() && !self.peek_is(TokenKind::Pipe) {
            let colon = self.next()?;
            if !colon.is(TokenKind::Colon) {
                return Err(ParseError::new(
                    colon.offset,
                    "Expected ':' after filter name",
                ));
            }

            while self.peek().is_some() && !self.peek_is(TokenKind::Pipe) {
                args.push(self.read_constant()?);

                match self.peek() {
                    None => break,
                    Some(t) if t.is(TokenKind::Pipe) => break,
                    Some(t) if t.is(TokenKind::Comma) => self.pos += 1,
                    Some(t) => {
                        return Err(ParseError::new(
                            t.offset,
                            "Expected ',' or '|' or end of filter expression",
                        ))
                    }
                }
            }
        }

        Ok(Expr::Pipe {
            target: Box::new(target),
            filter: name.text.to_string(),
            args,
            offset: name.offset,
        })
    }
}

/// Folds `first (op operand)*` into a tree.
fn build_tree(first: Expr, mut rest: Vec<(BinaryOperator, usize, Expr)>) -> Expr {
    let Some(last) = rest.len().checked_sub(1) else {
        return first;
    };

    let mut split = last;
    for i in (0..last).rev() {
        if rest[i].0.precedence() > rest[split].0.precedence() {
            split = i;
        }
    }

    let tail = rest.split_off(split + 1);
    let (op, offset, pivot) = rest.remove(split);

    Expr::Binary {
        op,
        lhs: Box::new(build_tree(first, rest)),
        rhs: Box::new(build_tree(pivot, tail)),
        offset,
    }
}

fn literal_value(tok: &Token<'_>) -> Result<Value, ParseError> {
    Ok(match tok.kind {
        TokenKind::BooleanLiteral => Value::Bool(tok.text == "true"),
        TokenKind::IntegerLiteral => Value::Int(
            tok.text
                .parse()
                .map_err(|_| ParseError::new(tok.offset, "Integer literal out of range"))?,
        ),
        TokenKind::StringLiteral => Value::String(tok.unquoted().to_string()),
        _ => Value::Null,
    })
}

/// Splits `tokens` on `separator` tokens that are not nested in brackets.
///
/// An empty slice yields no pieces.
pub(crate) fn split_top_level<'t, 'a>(
    tokens: &'t [Token<'a>],
    separator: TokenKind,
) -> Vec<&'t [Token<'a>]> {
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, tok) in tokens.iter().enumerate() {
        match tok.kind {
            TokenKind::LeftBracket => depth += 1,
            TokenKind::RightBracket => depth = depth.saturating_sub(1),
            kind if kind == separator && depth == 0 => {
                pieces.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&tokens[start..]);
    pieces
}
