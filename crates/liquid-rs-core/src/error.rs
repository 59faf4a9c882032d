//! Core error types for liquid-rs.
//!
//! Two independent failure families exist: [`ParseError`], raised while a
//! template is compiled and always fatal to the parse call, and
//! [`EvaluationError`], raised while a compiled template is rendered and
//! recovered at the outermost render boundary. [`LiquidError`] wraps both
//! together with the I/O and configuration failures of the surrounding
//! tooling.

use std::fmt;

use thiserror::Error;

/// A template failed to compile.
///
/// `offset` is a byte offset into the normalized (CRLF → LF) template
/// source. `line` and `column` are 1-based and are filled in by the parser
/// once the owning source text is known; they are `0` for an error that has
/// not been located yet.
///
/// # Examples
///
/// ```
/// use liquid_rs_core::error::ParseError;
///
/// let err = ParseError::new(12, "Unknown tag name").located(2, 5, Some("page.liquid".into()));
/// assert_eq!(err.to_string(), "page.liquid:2:5: Unknown tag name");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Byte offset of the offending token or delimiter.
    pub offset: usize,
    /// A short description of what went wrong.
    pub message: String,
    /// 1-based line of `offset`, or `0` when unresolved.
    pub line: usize,
    /// 1-based column of `offset`, or `0` when unresolved.
    pub column: usize,
    /// Path of the template file, when parsed from a file.
    pub path: Option<String>,
}

impl ParseError {
    /// Creates an unlocated parse error.
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
            line: 0,
            column: 0,
            path: None,
        }
    }

    /// Attaches a resolved source location.
    #[must_use]
    pub fn located(mut self, line: usize, column: usize, path: Option<String>) -> Self {
        self.line = line;
        self.column = column;
        self.path = path;
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{path}:")?;
        }
        if self.line == 0 {
            write!(f, "@{}: {}", self.offset, self.message)
        } else {
            write!(f, "{}:{}: {}", self.line, self.column, self.message)
        }
    }
}

impl std::error::Error for ParseError {}

/// Where an evaluation error happened when it was not in the template being
/// rendered at the top level (i.e. inside an included template).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorOrigin {
    /// File path or registered name of the included template.
    pub template: String,
    /// 1-based line of the error offset within that template.
    pub line: usize,
    /// 1-based column of the error offset within that template.
    pub column: usize,
}

/// A template failed while being rendered.
///
/// Ordinary missing data never produces one of these; only type or contract
/// violations do (member access on an integer, a string used to index an
/// array, an unknown filter, an unknown include target, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationError {
    /// A short description of what went wrong.
    pub message: String,
    /// Byte offset of the faulting expression, when known.
    pub offset: Option<usize>,
    /// Set when the fault lies inside an included template.
    pub origin: Option<ErrorOrigin>,
}

impl EvaluationError {
    /// Creates an evaluation error without position information.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offset: None,
            origin: None,
        }
    }

    /// Creates an evaluation error pointing at `offset`.
    pub fn at(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset: Some(offset),
            origin: None,
        }
    }

    /// Replaces the offset.
    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Attaches the included template the error belongs to.
    #[must_use]
    pub fn with_origin(mut self, origin: ErrorOrigin) -> Self {
        self.origin = Some(origin);
        self
    }
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.origin, self.offset) {
            (Some(origin), _) => write!(
                f,
                "{}:{}:{}: {}",
                origin.template, origin.line, origin.column, self.message
            ),
            (None, Some(offset)) => write!(f, "@{offset}: {}", self.message),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for EvaluationError {}

/// The primary error type for liquid-rs.
#[derive(Error, Debug)]
pub enum LiquidError {
    // ── Templates ────────────────────────────────────────────────────

    /// A template contains invalid syntax.
    #[error("Template syntax error: {0}")]
    TemplateSyntaxError(#[from] ParseError),

    /// Rendering a template failed.
    #[error("Evaluation error: {0}")]
    EvaluationError(#[from] EvaluationError),

    /// The requested template could not be found by any loader.
    #[error("Template does not exist: {0}")]
    TemplateDoesNotExist(String),

    /// A file-scope lookup was attempted with no template pushed.
    #[error("No active file scope")]
    NoActiveScope,

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Data could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A convenience type alias for `Result<T, LiquidError>`.
pub type LiquidResult<T> = Result<T, LiquidError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_unlocated() {
        let err = ParseError::new(7, "Expected operand");
        assert_eq!(err.to_string(), "@7: Expected operand");
    }

    #[test]
    fn test_parse_error_display_located() {
        let err = ParseError::new(7, "Expected operand").located(1, 8, None);
        assert_eq!(err.to_string(), "1:8: Expected operand");
    }

    #[test]
    fn test_parse_error_display_with_path() {
        let err = ParseError::new(0, "Unknown tag name").located(3, 1, Some("a.liquid".into()));
        assert_eq!(err.to_string(), "a.liquid:3:1: Unknown tag name");
    }

    #[test]
    fn test_evaluation_error_builders() {
        let err = EvaluationError::new("boom").with_offset(4);
        assert_eq!(err.offset, Some(4));
        assert!(err.origin.is_none());

        let err = EvaluationError::at("boom", 2).with_origin(ErrorOrigin {
            template: "header".into(),
            line: 1,
            column: 3,
        });
        assert_eq!(err.to_string(), "header:1:3: boom");
    }

    #[test]
    fn test_liquid_error_from_parse_error() {
        let err: LiquidError = ParseError::new(0, "bad").into();
        assert!(matches!(err, LiquidError::TemplateSyntaxError(_)));
        assert!(err.to_string().starts_with("Template syntax error"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: LiquidError = io_err.into();
        assert!(err.to_string().contains("file missing"));
    }
}
