//! Settings loading from configuration files.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `LIQUID_DEBUG` | `debug` |
//! | `LIQUID_LOG_LEVEL` | `log_level` |
//! | `LIQUID_TEMPLATE_DIRS` | `template_dirs` (comma-separated) |
//! | `LIQUID_STRIP_NEWLINE_AFTER_TAG` | `strip_newline_after_tag` |
//! | `LIQUID_STRIP_WHITESPACE_AT_TAG` | `strip_whitespace_at_tag` |
//! | `LIQUID_ERROR_MARKERS` | `error_markers` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use liquid_rs_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("liquid.toml").unwrap();
//! ```

use std::path::{Path, PathBuf};

use crate::error::LiquidError;
use crate::settings::Settings;

/// Loads settings from a TOML string.
///
/// Fields not present in the TOML keep their default values.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or cannot be deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, LiquidError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| LiquidError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;
    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, LiquidError> {
    from_toml_str(&read_config(path.as_ref(), "TOML")?)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, LiquidError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or cannot be deserialized.
pub fn from_json_str(json_str: &str) -> Result<Settings, LiquidError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| LiquidError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;
    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, LiquidError> {
    from_json_str(&read_config(path.as_ref(), "JSON")?)
}

/// Loads settings from a file, picking the format from its extension.
///
/// `.json` files are read as JSON; everything else is read as TOML.
/// Environment overrides are applied afterwards.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Settings, LiquidError> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let mut settings = if is_json {
        from_json_file(path)?
    } else {
        from_toml_file(path)?
    };
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `LIQUID_*` environment variable overrides to a settings struct.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides_from(settings, |key| std::env::var(key).ok());
}

/// Applies overrides using `lookup` to resolve each `LIQUID_*` key.
///
/// Boolean values accept "true", "1" and "yes" (case-insensitive); anything
/// else is read as `false`.
pub fn apply_overrides_from<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let flag = |val: String| matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");

    if let Some(val) = lookup("LIQUID_DEBUG") {
        settings.debug = flag(val);
    }

    if let Some(val) = lookup("LIQUID_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(val) = lookup("LIQUID_TEMPLATE_DIRS") {
        settings.template_dirs = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();
    }

    if let Some(val) = lookup("LIQUID_STRIP_NEWLINE_AFTER_TAG") {
        settings.strip_newline_after_tag = flag(val);
    }

    if let Some(val) = lookup("LIQUID_STRIP_WHITESPACE_AT_TAG") {
        settings.strip_whitespace_at_tag = flag(val);
    }

    if let Some(val) = lookup("LIQUID_ERROR_MARKERS") {
        settings.error_markers = flag(val);
    }
}

// ============================================================
// Helpers
// ============================================================

fn read_config(path: &Path, format: &str) -> Result<String, LiquidError> {
    std::fs::read_to_string(path).map_err(|e| {
        LiquidError::ConfigurationError(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_over_defaults(value: serde_json::Value, format: &str) -> Result<Settings, LiquidError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        LiquidError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, value);
    serde_json::from_value(merged).map_err(|e| {
        LiquidError::ConfigurationError(format!("Failed to deserialize settings from {format}: {e}"))
    })
}

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = match base_map.remove(&key) {
                    Some(base_v) => merge_json(base_v, override_v),
                    None => override_v,
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
