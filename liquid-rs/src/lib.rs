//! # liquid-rs
//!
//! A small Liquid-style template engine.
//!
//! This is the meta-crate that re-exports the sub-crates for convenient
//! access. Depend on `liquid-rs` to get everything, or on the individual
//! crates for finer-grained control.
//!
//! ```
//! # #[cfg(feature = "template")]
//! # {
//! use liquid_rs::template::{parse, Object};
//!
//! let tmpl = parse("{% assign n = 2 %}{{ n * 21 }}", None).unwrap();
//! assert_eq!(tmpl.render(Object::new()), "42");
//! # }
//! ```

/// Error types, settings, and logging setup.
pub use liquid_rs_core as core;

/// Tokenizer, parser, renderer, filters, and loaders.
#[cfg(feature = "template")]
pub use liquid_rs_template as template;

/// The `render` and `check` commands.
#[cfg(feature = "cli")]
pub use liquid_rs_cli as cli;

pub use liquid_rs_core::{LiquidError, LiquidResult, Settings};

#[cfg(feature = "template")]
pub use liquid_rs_template::{Renderer, Template};

/// Third-party crates used in public signatures.
pub mod deps {
    pub use serde_json;
    pub use tracing;
}
