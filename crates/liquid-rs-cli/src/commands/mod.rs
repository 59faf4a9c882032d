//! The `render` and `check` subcommands.

pub mod check;
pub mod render;

pub use check::CheckCommand;
pub use render::RenderCommand;
