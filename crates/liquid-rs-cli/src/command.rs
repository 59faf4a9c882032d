//! The `liquid-rs` command line.
//!
//! [`Cli`] owns the subcommands in the order they appear in `--help`, builds
//! the clap definition with the global `--config` / `--log-level` options,
//! and dispatches parsed matches to the selected [`Command`].

use async_trait::async_trait;
use liquid_rs_core::{LiquidError, Settings};

use crate::commands::{CheckCommand, RenderCommand};

/// One `liquid-rs` subcommand.
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-line description shown in `--help`.
    fn about(&self) -> &'static str;

    /// Declares the subcommand's own arguments.
    fn arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    async fn run(&self, matches: &clap::ArgMatches, settings: &Settings) -> Result<(), LiquidError>;
}

/// The top-level command line: global options plus subcommands.
pub struct Cli {
    commands: Vec<Box<dyn Command>>,
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}

impl Cli {
    /// The `render` and `check` subcommands.
    pub fn new() -> Self {
        let commands: Vec<Box<dyn Command>> = vec![Box::new(RenderCommand), Box::new(CheckCommand)];
        Self::with_commands(commands)
    }

    pub fn with_commands(commands: Vec<Box<dyn Command>>) -> Self {
        Self { commands }
    }

    /// Subcommand names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.iter().map(|cmd| cmd.name())
    }

    /// The clap definition.
    pub fn command(&self) -> clap::Command {
        let app = clap::Command::new("liquid-rs")
            .about("Render and check liquid-rs templates")
            .version(env!("CARGO_PKG_VERSION"))
            .subcommand_required(true)
            .arg_required_else_help(true)
            .arg(
                clap::Arg::new("config")
                    .long("config")
                    .short('c')
                    .global(true)
                    .value_parser(clap::value_parser!(std::path::PathBuf))
                    .help("Settings file (TOML, or JSON with a .json extension)"),
            )
            .arg(
                clap::Arg::new("log-level")
                    .long("log-level")
                    .global(true)
                    .help("Tracing filter directive, e.g. 'debug' or 'liquid_rs_template=trace'"),
            );

        self.commands.iter().fold(app, |app, cmd| {
            app.subcommand(cmd.arguments(clap::Command::new(cmd.name()).about(cmd.about())))
        })
    }

    /// Runs the subcommand selected in `matches`.
    pub async fn dispatch(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), LiquidError> {
        let (name, sub_matches) = matches.subcommand().ok_or_else(|| {
            LiquidError::ConfigurationError("No subcommand specified".to_string())
        })?;

        let cmd = self
            .commands
            .iter()
            .find(|cmd| cmd.name() == name)
            .ok_or_else(|| LiquidError::ConfigurationError(format!("Unknown command: {name}")))?;

        tracing::debug!(command = name, "dispatching");
        cmd.run(sub_matches, settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    fn echo_cli() -> Cli {
        let commands: Vec<Box<dyn Command>> = vec![Box::new(Echo)];
        Cli::with_commands(commands)
    }

    #[async_trait]
    impl Command for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn about(&self) -> &'static str {
            "Fails unless --ok is given"
        }

        fn arguments(&self, cmd: clap::Command) -> clap::Command {
            cmd.arg(
                clap::Arg::new("ok")
                    .long("ok")
                    .action(clap::ArgAction::SetTrue),
            )
        }

        async fn run(&self, matches: &clap::ArgMatches, _settings: &Settings) -> Result<(), LiquidError> {
            if matches.get_flag("ok") {
                Ok(())
            } else {
                Err(LiquidError::ConfigurationError("not ok".to_string()))
            }
        }
    }

    #[test]
    fn test_builtin_names_in_order() {
        assert_eq!(Cli::new().names().collect::<Vec<_>>(), ["render", "check"]);
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let matches = Cli::new()
            .command()
            .try_get_matches_from(["liquid-rs", "check", "a.liquid", "--log-level", "debug"])
            .unwrap();
        assert_eq!(
            matches.get_one::<String>("log-level").map(String::as_str),
            Some("debug")
        );
        assert_eq!(matches.subcommand_name(), Some("check"));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::new().command().try_get_matches_from(["liquid-rs"]).is_err());
        assert!(Cli::new()
            .command()
            .try_get_matches_from(["liquid-rs", "serve"])
            .is_err());
    }

    #[test]
    fn test_help_lists_subcommands() {
        let help = Cli::new().command().render_help().to_string();
        assert!(help.contains("render"));
        assert!(help.contains("check"));
        assert!(help.contains("--config"));
    }

    #[tokio::test]
    async fn test_dispatch_runs_selected_command() {
        let cli = echo_cli();
        let settings = Settings::default();

        let ok = cli.command().try_get_matches_from(["liquid-rs", "echo", "--ok"]).unwrap();
        assert!(cli.dispatch(&ok, &settings).await.is_ok());

        let fail = cli.command().try_get_matches_from(["liquid-rs", "echo"]).unwrap();
        assert!(matches!(
            cli.dispatch(&fail, &settings).await,
            Err(LiquidError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_name() {
        let built = echo_cli();
        let matches = built.command().try_get_matches_from(["liquid-rs", "echo"]).unwrap();

        let err = Cli::with_commands(Vec::new())
            .dispatch(&matches, &Settings::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: Unknown command: echo");
    }
}
