//! The `liquid-rs` binary.

use anyhow::Context as _;
use liquid_rs_cli::{load_settings, Cli};
use liquid_rs_core::logging::setup_logging;
use liquid_rs_core::SETTINGS;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::new();
    let matches = cli.command().get_matches();

    let settings = load_settings(&matches).context("failed to load settings")?;
    setup_logging(&settings);
    tracing::debug!(?settings, "settings loaded");

    if !SETTINGS.is_configured() {
        SETTINGS.configure(settings);
    }

    cli.dispatch(&matches, SETTINGS.get()).await?;
    Ok(())
}
