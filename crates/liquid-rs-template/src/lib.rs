//! # liquid-rs-template
//!
//! A small Liquid-style template engine. Templates mix literal text with
//! `{{ expression }}` output regions and `{% tag %}` control constructs.
//! Parsing produces a [`Template`] node tree, and a [`Renderer`] walks that
//! tree against a data [`Object`].
//!
//! ## Modules
//!
//! - [`value`] - The dynamic value model and host extension trait
//! - [`lexer`] - Tokenizer for expression and tag regions
//! - [`expression`] - Operator-precedence expression parser
//! - [`parser`] - Document parser and container-tag nesting
//! - [`nodes`] - The compiled node tree
//! - [`template`] - Parse entry points and diagnostics
//! - [`context`] - Scope stack and control flags
//! - [`renderer`] - Tree-walking evaluator
//! - [`filters`] - Filter trait, registry, and built-in filters
//! - [`loaders`] - Template loaders for `include`

pub mod context;
pub mod expression;
pub mod filters;
pub mod lexer;
pub mod loaders;
pub mod nodes;
pub mod parser;
pub mod renderer;
pub mod template;
pub mod value;

pub use filters::{Filter, FilterRegistry};
pub use loaders::{FileSystemLoader, StringLoader, TemplateLoader};
pub use parser::ParserOptions;
pub use renderer::{DefaultHooks, RenderHooks, Renderer, RendererOptions};
pub use template::{parse, parse_file, parse_file_with, parse_with, Template};
pub use value::{Object, Value, ValueObject};
