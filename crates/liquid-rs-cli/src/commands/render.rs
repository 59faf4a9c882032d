//! The `render` command.
//!
//! Parses a template file, renders it against JSON data and writes the
//! result to stdout or a file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use liquid_rs_core::{LiquidError, Settings};
use liquid_rs_template::parser::ParserOptions;
use liquid_rs_template::value::{object_from_json, Object};
use liquid_rs_template::{parse_with, Renderer};
use tokio::io::AsyncWriteExt;

use crate::command::Command;

/// Renders a template file.
pub struct RenderCommand;

/// Everything needed to render one template, independent of clap.
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    /// The template file.
    pub template: PathBuf,
    /// A JSON file holding the top-level data object.
    pub data: Option<PathBuf>,
    /// Extra directories searched for included templates.
    pub template_dirs: Vec<PathBuf>,
    /// Force the whitespace-stripping pass on.
    pub strip_whitespace: bool,
    /// Fail on the first evaluation error instead of only marking it.
    pub strict: bool,
}

impl RenderRequest {
    pub fn new(template: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
            ..Self::default()
        }
    }

    fn from_matches(matches: &clap::ArgMatches) -> Result<Self, LiquidError> {
        let template = matches
            .get_one::<PathBuf>("template")
            .cloned()
            .ok_or_else(|| LiquidError::ConfigurationError("No template given".to_string()))?;

        Ok(Self {
            template,
            data: matches.get_one::<PathBuf>("data").cloned(),
            template_dirs: matches
                .get_many::<PathBuf>("template-dir")
                .map(|dirs| dirs.cloned().collect())
                .unwrap_or_default(),
            strip_whitespace: matches.get_flag("strip-whitespace"),
            strict: matches.get_flag("strict"),
        })
    }

    /// The settings used for this render: `settings` plus the request's
    /// directories, followed by the template's own directory.
    fn effective_settings(&self, settings: &Settings) -> Settings {
        let mut effective = settings.clone();
        effective.template_dirs.extend(self.template_dirs.iter().cloned());

        let parent = self
            .template
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        effective.template_dirs.push(parent.to_path_buf());

        if self.strip_whitespace {
            effective.strip_whitespace_at_tag = true;
        }
        effective
    }
}

/// Reads a JSON object from `path`.
pub async fn load_data(path: &Path) -> Result<Object, LiquidError> {
    let text = tokio::fs::read_to_string(path).await?;
    let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
        LiquidError::SerializationError(format!("{}: {e}", path.display()))
    })?;
    object_from_json(json)
}

/// Renders the template described by `request`.
///
/// Evaluation errors are logged and, unless `request.strict` is set, only
/// show up as markers in the output.
pub async fn render_file(request: &RenderRequest, settings: &Settings) -> Result<String, LiquidError> {
    let settings = request.effective_settings(settings);

    let text = tokio::fs::read_to_string(&request.template).await?;
    let template = parse_with(
        &text,
        Some(request.template.as_path()),
        ParserOptions::from(&settings),
    )?;

    let data = match &request.data {
        Some(path) => load_data(path).await?,
        None => Object::new(),
    };

    let mut renderer = Renderer::from_settings(&settings);
    let output = renderer.render(&template, data);

    if let Some(err) = renderer.errors().first() {
        if request.strict {
            return Err(err.clone().into());
        }
        tracing::warn!(
            template = %template.name(),
            errors = renderer.errors().len(),
            "template rendered with errors"
        );
    }

    Ok(output)
}

#[async_trait]
impl Command for RenderCommand {
    fn name(&self) -> &'static str {
        "render"
    }

    fn about(&self) -> &'static str {
        "Render a template with JSON data"
    }

    fn arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("template")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("The template file to render"),
        )
        .arg(
            clap::Arg::new("data")
                .long("data")
                .short('d')
                .value_parser(clap::value_parser!(PathBuf))
                .help("JSON file with the top-level data object"),
        )
        .arg(
            clap::Arg::new("template-dir")
                .long("template-dir")
                .short('I')
                .action(clap::ArgAction::Append)
                .value_parser(clap::value_parser!(PathBuf))
                .help("Directory searched for included templates (repeatable)"),
        )
        .arg(
            clap::Arg::new("output")
                .long("output")
                .short('o')
                .value_parser(clap::value_parser!(PathBuf))
                .help("Write the result to this file instead of stdout"),
        )
        .arg(
            clap::Arg::new("strip-whitespace")
                .long("strip-whitespace")
                .action(clap::ArgAction::SetTrue)
                .help("Remove layout whitespace around tags"),
        )
        .arg(
            clap::Arg::new("strict")
                .long("strict")
                .action(clap::ArgAction::SetTrue)
                .help("Exit with an error if rendering reports any error"),
        )
    }

    async fn run(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), LiquidError> {
        let request = RenderRequest::from_matches(matches)?;
        let output = render_file(&request, settings).await?;

        if let Some(path) = matches.get_one::<PathBuf>("output") {
            tokio::fs::write(path, output.as_bytes()).await?;
            tracing::info!(output = %path.display(), bytes = output.len(), "rendered");
        } else {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(output.as_bytes()).await?;
            stdout.flush().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_render_command_metadata() {
        let cmd = RenderCommand;
        assert_eq!(cmd.name(), "render");
        assert!(!cmd.about().is_empty());
    }

    #[test]
    fn test_request_from_matches() {
        let cmd = RenderCommand;
        let matches = cmd
            .arguments(clap::Command::new("render"))
            .try_get_matches_from([
                "render", "page.liquid", "-d", "data.json", "-I", "a", "-I", "b", "--strict",
            ])
            .unwrap();
        let request = RenderRequest::from_matches(&matches).unwrap();
        assert_eq!(request.template, PathBuf::from("page.liquid"));
        assert_eq!(request.data, Some(PathBuf::from("data.json")));
        assert_eq!(request.template_dirs, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert!(request.strict);
        assert!(!request.strip_whitespace);
    }

    #[test]
    fn test_effective_settings_adds_template_parent() {
        let mut request = RenderRequest::new("views/page.liquid");
        request.template_dirs.push(PathBuf::from("partials"));
        request.strip_whitespace = true;

        let settings = request.effective_settings(&Settings::default());
        assert_eq!(
            settings.template_dirs,
            vec![PathBuf::from("partials"), PathBuf::from("views")]
        );
        assert!(settings.strip_whitespace_at_tag);

        let bare = RenderRequest::new("page.liquid").effective_settings(&Settings::default());
        assert_eq!(bare.template_dirs, vec![PathBuf::from(".")]);
    }

    #[tokio::test]
    async fn test_render_file_with_data() {
        let dir = tempfile::tempdir().unwrap();
        let template = write(dir.path(), "hello.liquid", "Hello {{ user.name }}!");
        let data = write(dir.path(), "data.json", r#"{"user": {"name": "Ada"}}"#);

        let mut request = RenderRequest::new(template);
        request.data = Some(data);
        let output = render_file(&request, &Settings::default()).await.unwrap();
        assert_eq!(output, "Hello Ada!");
    }

    #[tokio::test]
    async fn test_render_file_includes_sibling() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "greeting.liquid", "Hi {{ include.who }}");
        let template = write(
            dir.path(),
            "page.liquid",
            "[{% include greeting with who = 'Bo' %}]",
        );

        let output = render_file(&RenderRequest::new(template), &Settings::default())
            .await
            .unwrap();
        assert_eq!(output, "[Hi Bo]");
    }

    #[tokio::test]
    async fn test_render_file_strict() {
        let dir = tempfile::tempdir().unwrap();
        let template = write(dir.path(), "bad.liquid", "a{{ 1 | nope }}b");

        let lenient = render_file(&RenderRequest::new(&template), &Settings::default())
            .await
            .unwrap();
        assert!(lenient.starts_with("a{! "));

        let mut request = RenderRequest::new(&template);
        request.strict = true;
        let err = render_file(&request, &Settings::default()).await.unwrap_err();
        assert!(matches!(err, LiquidError::EvaluationError(_)));
    }

    #[tokio::test]
    async fn test_render_file_syntax_error() {
        let dir = tempfile::tempdir().unwrap();
        let template = write(dir.path(), "bad.liquid", "{% if x %}open");

        let err = render_file(&RenderRequest::new(template), &Settings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LiquidError::TemplateSyntaxError(_)));
    }

    #[tokio::test]
    async fn test_load_data_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let data = write(dir.path(), "data.json", "[1, 2]");
        assert!(matches!(
            load_data(&data).await,
            Err(LiquidError::SerializationError(_))
        ));

        let broken = write(dir.path(), "broken.json", "{");
        assert!(matches!(
            load_data(&broken).await,
            Err(LiquidError::SerializationError(_))
        ));
    }
}
