//! Settings for liquid-rs.
//!
//! This module provides the [`Settings`] struct, which holds parser, renderer,
//! and logging configuration, and [`LazySettings`], a globally-accessible,
//! configure-once settings instance.

use std::path::PathBuf;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// The complete set of liquid-rs settings.
///
/// # Examples
///
/// ```
/// use liquid_rs_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert!(settings.error_markers);
/// assert!(!settings.strip_whitespace_at_tag);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,

    // ── Logging ──────────────────────────────────────────────────────

    /// The log filter directive (e.g. "info", "liquid_rs_template=trace").
    pub log_level: String,

    // ── Templates ────────────────────────────────────────────────────

    /// Directories searched, in order, for templates named by `include`.
    pub template_dirs: Vec<PathBuf>,
    /// Skip one newline directly after a `%}` while parsing.
    pub strip_newline_after_tag: bool,
    /// Run the whitespace-stripping pass on every parsed template.
    pub strip_whitespace_at_tag: bool,

    // ── Rendering ────────────────────────────────────────────────────

    /// Write an inline `{! ... !}` marker into the output on evaluation errors.
    pub error_markers: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            template_dirs: Vec::new(),
            strip_newline_after_tag: false,
            strip_whitespace_at_tag: false,
            error_markers: true,
        }
    }
}

/// A lazily-initialized, globally-accessible settings container.
///
/// Call [`configure`](LazySettings::configure) once at startup to set the
/// settings, then use [`get`](LazySettings::get) to access them.
///
/// # Panics
///
/// [`get`](LazySettings::get) panics if settings have not been configured.
/// [`configure`](LazySettings::configure) panics if called more than once.
pub struct LazySettings {
    inner: OnceLock<Settings>,
}

impl Default for LazySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl LazySettings {
    /// Creates a new, unconfigured `LazySettings`.
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// Configures the global settings. Must be called exactly once.
    ///
    /// # Panics
    ///
    /// Panics if settings have already been configured.
    pub fn configure(&self, settings: Settings) {
        self.inner
            .set(settings)
            .expect("Settings have already been configured");
    }

    /// Returns a reference to the configured settings.
    ///
    /// # Panics
    ///
    /// Panics if settings have not been configured.
    pub fn get(&self) -> &Settings {
        self.inner
            .get()
            .expect("Settings have not been configured. Call SETTINGS.configure() first.")
    }

    /// Returns the configured settings, or `None` before configuration.
    pub fn try_get(&self) -> Option<&Settings> {
        self.inner.get()
    }

    /// Returns `true` if settings have been configured.
    pub fn is_configured(&self) -> bool {
        self.inner.get().is_some()
    }
}

/// The global settings instance.
pub static SETTINGS: LazySettings = LazySettings::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert!(s.debug);
        assert_eq!(s.log_level, "info");
        assert!(s.template_dirs.is_empty());
        assert!(!s.strip_newline_after_tag);
        assert!(!s.strip_whitespace_at_tag);
        assert!(s.error_markers);
    }

    #[test]
    fn test_lazy_settings_configure_and_get() {
        let lazy = LazySettings::new();
        assert!(!lazy.is_configured());
        assert!(lazy.try_get().is_none());

        let mut settings = Settings::default();
        settings.debug = false;
        settings.strip_whitespace_at_tag = true;

        lazy.configure(settings);
        assert!(lazy.is_configured());
        assert!(!lazy.get().debug);
        assert!(lazy.get().strip_whitespace_at_tag);
    }

    #[test]
    #[should_panic(expected = "already been configured")]
    fn test_lazy_settings_double_configure_panics() {
        let lazy = LazySettings::new();
        lazy.configure(Settings::default());
        lazy.configure(Settings::default());
    }

    #[test]
    #[should_panic(expected = "not been configured")]
    fn test_lazy_settings_get_before_configure_panics() {
        let lazy = LazySettings::new();
        let _ = lazy.get();
    }
}
