pub mod anki;
pub mod commands;
pub mod config;
pub mod fs_store;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::anki::AnkiClient;
use crate::commands::{execute, Actions, Cli};
use crate::config::Config;
use crate::fs_store::FsStore;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::resolve(cli.vault, cli.data_dir, |key| std::env::var(key).ok())?;
    tracing::info!(vault = %config.vault.display(), anki = %config.anki_url, "starting");

    let settings = config::load_settings(&config.settings_path())?;
    let mut state = config::load_state(&config.state_path())?;

    let actions = match cli.command {
        Some(command) => Actions::from(command),
        None => Actions::from(&settings.on_load),
    };

    let remote = AnkiClient::new(&config.anki_url);
    let store = FsStore::new(&config.vault);

    // Documents may already have been written, so the state is saved either way.
    let outcome = execute(actions, &remote, &store, &settings, &mut state).await;
    config::save_state(&config.state_path(), &state)?;

    let report = outcome?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
