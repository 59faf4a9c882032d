//! Document parser.
//!
//! Scans template source for `{{ ... }}` and `{% ... %}` regions, turns each
//! region into a node, and nests nodes inside the container tags (`for`,
//! `if`, `capture`) that are open at that point.

use liquid_rs_core::error::ParseError;
use liquid_rs_core::settings::Settings;

use crate::expression::parse_expression;
use crate::lexer::{tokenize, Token, TokenKind};
use crate::nodes::{AssignTarget, Expr, IfBlock, Node, Tag, TagNode, TextNode};
use crate::value::Value;

/// Options controlling how templates are parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserOptions {
    /// Skip a single `\n` directly after each `%}`.
    pub strip_newline_after_tag: bool,
    /// Run [`Template::strip_whitespace_at_tag`](crate::template::Template::strip_whitespace_at_tag)
    /// on every parsed template.
    pub strip_whitespace_at_tag: bool,
}

impl From<&Settings> for ParserOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            strip_newline_after_tag: settings.strip_newline_after_tag,
            strip_whitespace_at_tag: settings.strip_whitespace_at_tag,
        }
    }
}

/// A container tag whose end tag has not been seen yet.
#[derive(Debug)]
enum OpenBlock {
    For {
        variable: String,
        iterable: Expr,
        body: Vec<Node>,
        offset: usize,
    },
    If {
        blocks: Vec<IfBlock>,
        has_else: bool,
        offset: usize,
    },
    Capture {
        name: String,
        body: Vec<Node>,
        offset: usize,
    },
}

impl OpenBlock {
    fn keyword(&self) -> &'static str {
        match self {
            Self::For { .. } => "for",
            Self::If { .. } => "if",
            Self::Capture { .. } => "capture",
        }
    }

    fn offset(&self) -> usize {
        match self {
            Self::For { offset, .. } | Self::If { offset, .. } | Self::Capture { offset, .. } => {
                *offset
            }
        }
    }

    fn into_node(self) -> Node {
        let (tag, offset) = match self {
            Self::For {
                variable,
                iterable,
                body,
                offset,
            } => (
                Tag::For {
                    variable,
                    iterable,
                    body,
                },
                offset,
            ),
            Self::If { blocks, offset, .. } => (Tag::If { blocks }, offset),
            Self::Capture { name, body, offset } => (Tag::Capture { name, body }, offset),
        };
        Node::Tag(TagNode { tag, offset })
    }
}

/// Parses already-normalized template source into a node sequence.
///
/// Offsets in the returned nodes and in any error are byte offsets into
/// `source`. Line and column information is attached by the caller.
///
/// # Errors
///
/// Returns the first [`ParseError`] encountered; no partial tree is produced.
pub fn parse_nodes(source: &str, options: ParserOptions) -> Result<Vec<Node>, ParseError> {
    let mut parser = DocumentParser {
        source,
        pos: 0,
        nodes: Vec::new(),
        stack: Vec::new(),
        options,
    };

    while parser.pos < source.len() {
        parser.read_node()?;
    }

    if let Some(open) = parser.stack.last() {
        return Err(ParseError::new(
            open.offset(),
            format!("Unclosed '{}' tag", open.keyword()),
        ));
    }

    Ok(parser.nodes)
}

struct DocumentParser<'a> {
    source: &'a str,
    pos: usize,
    nodes: Vec<Node>,
    stack: Vec<OpenBlock>,
    options: ParserOptions,
}

impl<'a> DocumentParser<'a> {
    fn read_node(&mut self) -> Result<(), ParseError> {
        let source = self.source;
        let bytes = source.as_bytes();

        let Some(brace) = source[self.pos..].find('{').map(|i| i + self.pos) else {
            self.push_text(source.len());
            return Ok(());
        };

        if brace + 1 == source.len() {
            self.push_text(source.len());
            return Ok(());
        }

        if brace > self.pos {
            self.push_text(brace);
            return Ok(());
        }

        match bytes[brace + 1] {
            b'{' => {
                let start = brace + 2;
                let end = find_from(source, "}}", start).ok_or_else(|| {
                    ParseError::new(brace, "Could not match '{{' with a closing '}}'")
                })?;
                let tokens = tokenize(source, start, end)?;
                let expr = parse_expression(&tokens, end)?;
                self.dispatch(Node::Expression(expr));
                self.pos = end + 2;
            }
            b'%' => {
                let start = brace + 2;
                let end = find_from(source, "%}", start).ok_or_else(|| {
                    ParseError::new(brace, "Could not match '{%' with a closing '%}'")
                })?;
                self.process_tag(start, end)?;
                self.pos = end + 2;

                if self.options.strip_newline_after_tag && bytes.get(self.pos) == Some(&b'\n') {
                    self.pos += 1;
                }
            }
            _ => self.push_text(brace + 1),
        }

        Ok(())
    }

    /// Emits `source[pos..end]` as text and advances to `end`.
    fn push_text(&mut self, end: usize) {
        let node = Node::Text(TextNode {
            text: self.source[self.pos..end].to_string(),
            offset: self.pos,
        });
        self.pos = end;
        self.dispatch(node);
    }

    fn dispatch(&mut self, node: Node) {
        match self.stack.last_mut() {
            None => self.nodes.push(node),
            Some(OpenBlock::For { body, .. } | OpenBlock::Capture { body, .. }) => body.push(node),
            Some(OpenBlock::If { blocks, .. }) => {
                if let Some(block) = blocks.last_mut() {
                    block.body.push(node);
                }
            }
        }
    }

    fn dispatch_tag(&mut self, tag: Tag, offset: usize) {
        self.dispatch(Node::Tag(TagNode { tag, offset }));
    }

    fn process_tag(&mut self, start: usize, end: usize) -> Result<(), ParseError> {
        let source = self.source;

        // Comment bodies are free text and are never tokenized.
        let body = &source[start..end];
        let trimmed = body.trim_start();
        let keyword_len = trimmed
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(trimmed.len());
        if &trimmed[..keyword_len] == "comment" {
            let offset = start + (body.len() - trimmed.len());
            self.dispatch_tag(Tag::Comment, offset);
            return Ok(());
        }

        let tokens = tokenize(source, start, end)?;
        let Some((keyword, args)) = tokens.split_first() else {
            return Err(ParseError::new(start, "Expected tag name"));
        };
        if !keyword.is(TokenKind::Identifier) {
            return Err(ParseError::new(keyword.offset, "Expected tag name"));
        }

        let ctx = TagArgs {
            keyword,
            args,
            end,
        };

        match keyword.text {
            "assign" => self.tag_assign(&ctx),
            "capture" => self.tag_capture(&ctx),
            "endcapture" => self.tag_end(&ctx, "capture"),
            "if" => self.tag_if(&ctx),
            "elsif" => self.tag_elsif(&ctx),
            "else" => self.tag_else(&ctx),
            "endif" => self.tag_end(&ctx, "if"),
            "for" => self.tag_for(&ctx),
            "endfor" => self.tag_end(&ctx, "for"),
            "break" => self.tag_simple(&ctx, Tag::Break),
            "continue" => self.tag_simple(&ctx, Tag::Continue),
            "eject" => self.tag_simple(&ctx, Tag::Eject),
            "discard" => self.tag_simple(&ctx, Tag::Discard),
            "newline" => self.tag_simple(&ctx, Tag::Newline),
            "include" => self.tag_include(&ctx),
            _ => Err(ParseError::new(keyword.offset, "Unknown tag name")),
        }
    }

    fn tag_simple(&mut self, ctx: &TagArgs<'_, '_>, tag: Tag) -> Result<(), ParseError> {
        ctx.expect_no_args()?;
        self.dispatch_tag(tag, ctx.keyword.offset);
        Ok(())
    }

    fn tag_assign(&mut self, ctx: &TagArgs<'_, '_>) -> Result<(), ParseError> {
        let name = ctx.identifier_at(0, "Expected variable name after 'assign'")?;
        match ctx.args.get(1) {
            Some(eq) if eq.is_operator("=") => {}
            Some(tok) => return Err(ParseError::new(tok.offset, "Expected '='")),
            None => return Err(ParseError::new(ctx.end, "Expected '='")),
        }

        let mut expr_tokens = &ctx.args[2..];
        let mut target = AssignTarget::Local;

        if let [.., prev, last] = expr_tokens {
            let selector = match last.text {
                "parent_scope" => Some(AssignTarget::ParentScope),
                "global" => Some(AssignTarget::Global),
                _ => None,
            };
            let prev_continues = matches!(
                prev.kind,
                TokenKind::Operator
                    | TokenKind::Dot
                    | TokenKind::Pipe
                    | TokenKind::Colon
                    | TokenKind::Comma
                    | TokenKind::LeftBracket
            );
            if let Some(selector) = selector {
                if last.is(TokenKind::Identifier) && !prev_continues {
                    target = selector;
                    expr_tokens = &expr_tokens[..expr_tokens.len() - 1];
                }
            }
        }

        let value = parse_expression(expr_tokens, ctx.end)?;
        self.dispatch_tag(
            Tag::Assign {
                name: name.to_string(),
                value,
                target,
            },
            ctx.keyword.offset,
        );
        Ok(())
    }

    fn tag_capture(&mut self, ctx: &TagArgs<'_, '_>) -> Result<(), ParseError> {
        let name = ctx.identifier_at(0, "Expected variable name after 'capture'")?;
        if let Some(extra) = ctx.args.get(1) {
            return Err(unexpected(extra));
        }
        self.stack.push(OpenBlock::Capture {
            name: name.to_string(),
            body: Vec::new(),
            offset: ctx.keyword.offset,
        });
        Ok(())
    }

    fn tag_if(&mut self, ctx: &TagArgs<'_, '_>) -> Result<(), ParseError> {
        let condition = parse_expression(ctx.args, ctx.end)?;
        self.stack.push(OpenBlock::If {
            blocks: vec![IfBlock {
                condition,
                body: Vec::new(),
            }],
            has_else: false,
            offset: ctx.keyword.offset,
        });
        Ok(())
    }

    fn tag_elsif(&mut self, ctx: &TagArgs<'_, '_>) -> Result<(), ParseError> {
        let condition = parse_expression(ctx.args, ctx.end)?;
        match self.stack.last_mut() {
            Some(OpenBlock::If {
                blocks,
                has_else: false,
                ..
            }) => {
                blocks.push(IfBlock {
                    condition,
                    body: Vec::new(),
                });
                Ok(())
            }
            _ => Err(ParseError::new(ctx.keyword.offset, "Unexpected 'elsif' tag")),
        }
    }

    fn tag_else(&mut self, ctx: &TagArgs<'_, '_>) -> Result<(), ParseError> {
        ctx.expect_no_args()?;
        match self.stack.last_mut() {
            Some(OpenBlock::If {
                blocks, has_else, ..
            }) if !*has_else => {
                *has_else = true;
                blocks.push(IfBlock {
                    condition: Expr::Literal {
                        value: Value::Bool(true),
                        offset: ctx.keyword.offset,
                    },
                    body: Vec::new(),
                });
                Ok(())
            }
            _ => Err(ParseError::new(ctx.keyword.offset, "Unexpected 'else' tag")),
        }
    }

    fn tag_for(&mut self, ctx: &TagArgs<'_, '_>) -> Result<(), ParseError> {
        let variable = ctx.identifier_at(0, "Expected loop variable after 'for'")?;
        if !ctx.args.get(1).is_some_and(|t| t.is_word("in")) {
            return Err(ParseError::new(ctx.keyword.offset, "Expected token 'in'"));
        }
        let iterable = parse_expression(&ctx.args[2..], ctx.end)?;
        self.stack.push(OpenBlock::For {
            variable: variable.to_string(),
            iterable,
            body: Vec::new(),
            offset: ctx.keyword.offset,
        });
        Ok(())
    }

    /// Closes the innermost container, which must be a `keyword` block.
    fn tag_end(&mut self, ctx: &TagArgs<'_, '_>, keyword: &str) -> Result<(), ParseError> {
        ctx.expect_no_args()?;
        match self.stack.pop() {
            Some(open) if open.keyword() == keyword => {
                self.dispatch(open.into_node());
                Ok(())
            }
            other => {
                if let Some(open) = other {
                    self.stack.push(open);
                }
                Err(ParseError::new(
                    ctx.keyword.offset,
                    format!("Unexpected '{}' tag", ctx.keyword.text),
                ))
            }
        }
    }

    fn tag_include(&mut self, ctx: &TagArgs<'_, '_>) -> Result<(), ParseError> {
        let args = ctx.args;
        let (name, mut pos) = match args.first() {
            Some(tok) if tok.is(TokenKind::StringLiteral) => (tok.unquoted().to_string(), 1),
            Some(tok) if tok.is(TokenKind::Identifier) => {
                let mut name = tok.text.to_string();
                let mut pos = 1;
                while let [dot, part, ..] = &args[pos..] {
                    if !dot.is(TokenKind::Dot) || !part.is(TokenKind::Identifier) {
                        break;
                    }
                    name.push('.');
                    name.push_str(part.text);
                    pos += 2;
                }
                (name, pos)
            }
            Some(tok) => return Err(ParseError::new(tok.offset, "Expected template name")),
            None => return Err(ParseError::new(ctx.end, "Expected template name")),
        };

        let mut named = Vec::new();

        if let Some(with) = args.get(pos) {
            if !with.is_word("with") {
                return Err(ParseError::new(with.offset, "Expected 'with'"));
            }
            pos += 1;

            if pos == args.len() {
                return Err(ParseError::new(ctx.end, "Expected argument after 'with'"));
            }

            while pos < args.len() {
                let key = args[pos];
                if !key.is(TokenKind::Identifier) {
                    return Err(ParseError::new(key.offset, "Expected argument name"));
                }
                if !args.get(pos + 1).is_some_and(|t| t.is_operator("=")) {
                    return Err(ParseError::new(key.offset, "Expected '=' after argument name"));
                }
                pos += 2;

                let value_end = include_value_end(args, pos);
                let value_limit = args.get(value_end).map_or(ctx.end, |t| t.offset);
                let value = parse_expression(&args[pos..value_end], value_limit)?;
                named.push((key.text.to_string(), value));

                pos = value_end;
                if args.get(pos).is_some_and(|t| t.is(TokenKind::Comma)) {
                    pos += 1;
                }
            }
        }

        self.dispatch_tag(Tag::Include { name, args: named }, ctx.keyword.offset);
        Ok(())
    }
}

/// The tokens of one tag, split into keyword and arguments.
struct TagArgs<'t, 'a> {
    keyword: &'t Token<'a>,
    args: &'t [Token<'a>],
    end: usize,
}

impl<'t, 'a> TagArgs<'t, 'a> {
    fn expect_no_args(&self) -> Result<(), ParseError> {
        match self.args.first() {
            Some(extra) => Err(unexpected(extra)),
            None => Ok(()),
        }
    }

    fn identifier_at(&self, index: usize, message: &str) -> Result<&'a str, ParseError> {
        match self.args.get(index) {
            Some(tok) if tok.is(TokenKind::Identifier) => Ok(tok.text),
            Some(tok) => Err(ParseError::new(tok.offset, message)),
            None => Err(ParseError::new(self.end, message)),
        }
    }
}

fn unexpected(tok: &Token<'_>) -> ParseError {
    ParseError::new(tok.offset, format!("Unexpected token '{}'", tok.text))
}

/// Index just past the value expression of an include argument starting at
/// `start`: the next top-level comma, or the next `name =` pair.
fn include_value_end(args: &[Token<'_>], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;

    while i < args.len() {
        let tok = &args[i];
        match tok.kind {
            TokenKind::LeftBracket => depth += 1,
            TokenKind::RightBracket => depth = depth.saturating_sub(1),
            TokenKind::Comma if depth == 0 => return i,
            TokenKind::Identifier
                if depth == 0
                    && i > start
                    && args.get(i + 1).is_some_and(|t| t.is_operator("=")) =>
            {
                return i;
            }
            _ => {}
        }
        i += 1;
    }

    args.len()
}

fn find_from(source: &str, needle: &str, from: usize) -> Option<usize> {
    source[from..].find(needle).map(|i| i + from)
}
