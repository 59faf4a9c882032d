//! Compiled templates.
//!
//! [`parse`] and [`parse_file`] turn source text into a [`Template`], which
//! owns the normalized source and the node tree. A template is immutable
//! once built apart from [`Template::strip_whitespace_at_tag`], and can be
//! rendered any number of times.

use std::path::{Path, PathBuf};

use liquid_rs_core::error::{LiquidError, LiquidResult, ParseError};
use tracing::debug;

use crate::nodes::Node;
use crate::parser::{parse_nodes, ParserOptions};
use crate::renderer::{RenderHooks, Renderer};
use crate::value::Object;

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    path: Option<PathBuf>,
    nodes: Vec<Node>,
}

/// Parses `text` with default options.
///
/// `path` is only used in diagnostics.
///
/// # Examples
///
/// ```
/// use liquid_rs_template::template::parse;
/// use liquid_rs_template::value::{Object, Value};
///
/// let tmpl = parse("Hello {{ name }}!", None).unwrap();
/// let mut data = Object::new();
/// data.insert("name".into(), Value::from("Alice"));
/// assert_eq!(tmpl.render(data), "Hello Alice!");
/// ```
pub fn parse(text: &str, path: Option<&Path>) -> Result<Template, ParseError> {
    parse_with(text, path, ParserOptions::default())
}

/// Parses `text` with explicit parser options.
///
/// `\r\n` sequences are normalized to `\n` before parsing; all offsets in
/// the resulting template refer to the normalized text.
///
/// # Errors
///
/// Returns a located [`ParseError`] describing the first syntax error.
pub fn parse_with(
    text: &str,
    path: Option<&Path>,
    options: ParserOptions,
) -> Result<Template, ParseError> {
    let source = text.replace("\r\n", "\n");

    let nodes = match parse_nodes(&source, options) {
        Ok(nodes) => nodes,
        Err(err) => {
            let (line, column) = line_col(&source, err.offset);
            let path = path.map(|p| p.display().to_string());
            return Err(err.located(line, column, path));
        }
    };

    let mut template = Template {
        source,
        path: path.map(Path::to_path_buf),
        nodes,
    };

    if options.strip_whitespace_at_tag {
        template.strip_whitespace_at_tag();
    }

    debug!(
        template = %template.name(),
        nodes = template.nodes.len(),
        "template parsed"
    );

    Ok(template)
}

/// Reads and parses a template file with default options.
pub fn parse_file(path: impl AsRef<Path>) -> LiquidResult<Template> {
    parse_file_with(path, ParserOptions::default())
}

/// Reads and parses a template file.
///
/// # Errors
///
/// Returns [`LiquidError::IoError`] if the file cannot be read and
/// [`LiquidError::TemplateSyntaxError`] if it does not parse.
pub fn parse_file_with(path: impl AsRef<Path>, options: ParserOptions) -> LiquidResult<Template> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    parse_with(&text, Some(path), options).map_err(LiquidError::from)
}

impl Template {
    /// The normalized source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The file this template was parsed from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The path for display, or `<string>` for templates parsed from text.
    pub fn name(&self) -> String {
        self.path
            .as_ref()
            .map_or_else(|| "<string>".to_string(), |p| p.display().to_string())
    }

    /// The top-level nodes.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// 1-based line and column (in characters) of a byte offset.
    ///
    /// ```
    /// let tmpl = liquid_rs_template::template::parse("ab\ncd", None).unwrap();
    /// assert_eq!(tmpl.line_col(0), (1, 1));
    /// assert_eq!(tmpl.line_col(4), (2, 2));
    /// ```
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        line_col(&self.source, offset)
    }

    /// The full source line containing `offset`, without its newline.
    pub fn line(&self, offset: usize) -> &str {
        let offset = clamp_to_boundary(&self.source, offset);
        let start = self.source[..offset].rfind('\n').map_or(0, |i| i + 1);
        let end = self.source[offset..]
            .find('\n')
            .map_or(self.source.len(), |i| i + offset);
        &self.source[start..end]
    }

    /// Removes layout whitespace around tags.
    ///
    /// A text node right after a tag boundary loses all leading spaces, tabs
    /// and newlines; a text node right before one loses the trailing spaces
    /// and tabs of its last line. The start and end of a container body count
    /// as boundaries, the start and end of the template do not.
    pub fn strip_whitespace_at_tag(&mut self) {
        strip_body(&mut self.nodes, false, false);
    }

    /// Renders with a default [`Renderer`].
    pub fn render(&self, data: Object) -> String {
        Renderer::new().render(self, data)
    }

    /// Renders once with `hooks`. Use [`Renderer::with_hooks`] to keep the
    /// renderer around for registered templates or its error list.
    pub fn render_with<H: RenderHooks>(&self, hooks: H, data: Object) -> String {
        Renderer::with_hooks(hooks).render(self, data)
    }
}

fn clamp_to_boundary(source: &str, offset: usize) -> usize {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = clamp_to_boundary(source, offset);
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = source[line_start..offset].chars().count() + 1;
    (line, column)
}

fn strip_body(nodes: &mut [Node], boundary_before: bool, boundary_after: bool) {
    let len = nodes.len();

    for i in 0..len {
        let after_tag = if i == 0 {
            boundary_before
        } else {
            nodes[i - 1].is_tag()
        };
        let before_tag = if i + 1 == len {
            boundary_after
        } else {
            nodes[i + 1].is_tag()
        };

        match &mut nodes[i] {
            Node::Text(text) => {
                if after_tag {
                    text.text = text
                        .text
                        .trim_start_matches([' ', '\t', '\n'])
                        .to_string();
                }
                if before_tag {
                    let trimmed = text.text.trim_end_matches([' ', '\t']).len();
                    text.text.truncate(trimmed);
                }
            }
            Node::Tag(tag) => {
                for body in tag.tag.bodies_mut() {
                    strip_body(body, true, true);
                }
            }
            Node::Expression(_) => {}
        }
    }
}
