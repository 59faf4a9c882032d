//! # liquid-rs-core
//!
//! Error types, settings, and logging setup shared by the liquid-rs crates.
//!
//! ## Modules
//!
//! - [`error`] - Parse and evaluation errors, plus the umbrella [`LiquidError`]
//! - [`settings`] - Engine settings and global configuration
//! - [`settings_loader`] - Loading settings from TOML/JSON files and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{ErrorOrigin, EvaluationError, LiquidError, LiquidResult, ParseError};
pub use settings::{Settings, SETTINGS};
