//! The `check` command.
//!
//! Parses template files without rendering them and reports every syntax
//! error as `path:line:col: message`.

use std::path::PathBuf;

use async_trait::async_trait;
use liquid_rs_core::{LiquidError, Settings};
use liquid_rs_template::parse_with;
use liquid_rs_template::parser::ParserOptions;

use crate::command::Command;

/// Validates template syntax.
pub struct CheckCommand;

/// A problem found in one template file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckMessage {
    pub path: PathBuf,
    /// The located diagnostic, already prefixed with `path:line:col`
    /// for syntax errors.
    pub msg: String,
}

impl std::fmt::Display for CheckMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.msg)
    }
}

/// Parses each file in `paths` and collects the failures.
pub async fn check_templates(paths: &[PathBuf], options: ParserOptions) -> Vec<CheckMessage> {
    let mut messages = Vec::new();

    for path in paths {
        let msg = match tokio::fs::read_to_string(path).await {
            Ok(text) => match parse_with(&text, Some(path.as_path()), options) {
                Ok(_) => continue,
                Err(err) => err.to_string(),
            },
            Err(err) => format!("{}: {err}", path.display()),
        };
        messages.push(CheckMessage {
            path: path.clone(),
            msg,
        });
    }

    messages
}

#[async_trait]
impl Command for CheckCommand {
    fn name(&self) -> &'static str {
        "check"
    }

    fn about(&self) -> &'static str {
        "Check templates for syntax errors"
    }

    fn arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("templates")
                .required(true)
                .num_args(1..)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Template files to check"),
        )
    }

    async fn run(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), LiquidError> {
        let paths: Vec<PathBuf> = matches
            .get_many::<PathBuf>("templates")
            .map(|paths| paths.cloned().collect())
            .unwrap_or_default();

        let messages = check_templates(&paths, ParserOptions::from(settings)).await;

        if messages.is_empty() {
            tracing::info!(templates = paths.len(), "no issues found");
            return Ok(());
        }

        for message in &messages {
            tracing::error!("{message}");
        }

        Err(LiquidError::ConfigurationError(format!(
            "{} of {} template(s) failed to parse",
            messages.len(),
            paths.len()
        )))
    }
}
