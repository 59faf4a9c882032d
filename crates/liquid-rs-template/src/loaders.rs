//! Template loaders.
//!
//! Loaders find templates named by `include` tags that were not registered
//! with the renderer up front. The [`TemplateLoader`] trait defines the
//! interface, with built-in implementations for filesystem and in-memory
//! lookup. Loaders return parsed templates; the renderer caches them.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use liquid_rs_core::error::LiquidError;

use crate::parser::ParserOptions;
use crate::template::{parse_file_with, parse_with, Template};

/// Loads and parses templates by name.
pub trait TemplateLoader: Send + Sync {
    /// Loads the template with the given name.
    ///
    /// # Errors
    ///
    /// Returns `TemplateDoesNotExist` if the template cannot be found, and
    /// `TemplateSyntaxError` if it was found but does not parse.
    fn load(&self, name: &str) -> Result<Template, LiquidError>;
}

/// Loads templates from one or more directories on the filesystem.
///
/// Searches each directory in order for `name`, then for `name.liquid`,
/// and parses the first match with its path attached. A name that would
/// reach outside its search directory is treated as missing.
#[derive(Debug)]
pub struct FileSystemLoader {
    dirs: Vec<PathBuf>,
    options: ParserOptions,
}

impl FileSystemLoader {
    /// Creates a new `FileSystemLoader` with the given search directories.
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self::with_options(dirs, ParserOptions::default())
    }

    /// Creates a loader that parses with `options`.
    pub fn with_options(dirs: Vec<PathBuf>, options: ParserOptions) -> Self {
        Self { dirs, options }
    }
}

impl TemplateLoader for FileSystemLoader {
    fn load(&self, name: &str) -> Result<Template, LiquidError> {
        if !is_relative_name(name) {
            return Err(LiquidError::TemplateDoesNotExist(format!(
                "Template '{name}' is outside the template directories"
            )));
        }

        let candidates = [name.to_string(), format!("{name}.liquid")];

        for dir in &self.dirs {
            for candidate in &candidates {
                let path = dir.join(candidate);
                if path.is_file() && is_within(dir, &path) {
                    return parse_file_with(&path, self.options);
                }
            }
        }

        Err(LiquidError::TemplateDoesNotExist(format!(
            "Template '{name}' not found in directories: {:?}",
            self.dirs
        )))
    }
}

/// Only plain relative names: no root, drive prefix or `..` component.
fn is_relative_name(name: &str) -> bool {
    Path::new(name)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Whether `path` resolves inside `dir` once symlinks are followed.
fn is_within(dir: &Path, path: &Path) -> bool {
    match (dir.canonicalize(), path.canonicalize()) {
        (Ok(dir), Ok(path)) => path.starts_with(dir),
        _ => false,
    }
}

/// Loads templates from an in-memory map of name to source strings.
#[derive(Debug, Default)]
pub struct StringLoader {
    templates: RwLock<HashMap<String, String>>,
    options: ParserOptions,
}

impl StringLoader {
    /// Creates a new empty `StringLoader`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `StringLoader` from a map of template names to source strings.
    pub fn from_map(templates: HashMap<String, String>) -> Self {
        Self {
            templates: RwLock::new(templates),
            options: ParserOptions::default(),
        }
    }

    /// Adds or replaces a template.
    pub fn add(&self, name: impl Into<String>, source: impl Into<String>) {
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), source.into());
    }
}

impl TemplateLoader for StringLoader {
    fn load(&self, name: &str) -> Result<Template, LiquidError> {
        let source = self
            .templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| {
                LiquidError::TemplateDoesNotExist(format!(
                    "Template '{name}' not found in StringLoader"
                ))
            })?;
        Ok(parse_with(&source, None, self.options)?)
    }
}
