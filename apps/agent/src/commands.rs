//! Command-line surface and the actions each command runs.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use notesync_core::{
    follow_renames, refresh_catalog, CatalogStats, DocumentStore, ExportStats, Exporter,
    ImportStats, Importer, OnLoad, RemoteService, Rename, Settings, SyncState,
};

#[derive(Parser, Debug)]
#[command(name = "notesync")]
#[command(about = "Sync flashcards between Markdown notes and Anki")]
#[command(version)]
pub struct Cli {
    /// Vault directory holding the Markdown documents
    #[arg(long)]
    pub vault: Option<PathBuf>,

    /// Directory holding settings.json and state.json
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Runs the on-load actions from the settings when omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Refresh cached note types, decks and fields
    Sync,
    /// Pull remote notes into documents
    Import,
    /// Push document notes to the remote
    Export,
    /// Refresh, import, then export
    All,
}

/// The steps of one run, always executed in refresh, import, export order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Actions {
    pub refresh: bool,
    pub import: bool,
    pub export: bool,
}

impl From<Command> for Actions {
    fn from(command: Command) -> Self {
        match command {
            Command::Sync => Self {
                refresh: true,
                ..Self::default()
            },
            Command::Import => Self {
                import: true,
                ..Self::default()
            },
            Command::Export => Self {
                export: true,
                ..Self::default()
            },
            Command::All => Self {
                refresh: true,
                import: true,
                export: true,
            },
        }
    }
}

impl From<&OnLoad> for Actions {
    fn from(on_load: &OnLoad) -> Self {
        Self {
            refresh: on_load.refresh,
            import: on_load.import,
            export: on_load.export,
        }
    }
}

impl Actions {
    pub fn is_empty(&self) -> bool {
        !(self.refresh || self.import || self.export)
    }
}

/// What a run did, printed as JSON when it finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub renamed: Vec<Rename>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<CatalogStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<ImportStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportStats>,
}

/// True if a rule uses a note type whose fields have never been fetched.
pub fn catalog_is_stale(settings: &Settings, state: &SyncState) -> bool {
    settings
        .enabled_export_rules()
        .map(|rule| rule.note_type.as_str())
        .chain(settings.enabled_import_rules().map(|rule| rule.note_type.as_str()))
        .any(|note_type| !state.fields.contains_key(note_type.trim()))
}

/// Run `actions` against the collaborators. Renamed documents are followed and a
/// stale catalog is refreshed before any notes move.
pub async fn execute(
    actions: Actions,
    remote: &dyn RemoteService,
    store: &dyn DocumentStore,
    settings: &Settings,
    state: &mut SyncState,
) -> anyhow::Result<RunReport> {
    let mut report = RunReport::default();
    if actions.is_empty() {
        info!("nothing to do");
        return Ok(report);
    }

    let syncing = actions.import || actions.export;
    if syncing {
        report.renamed = follow_renames(store, state).await?;
    }
    if actions.refresh || (syncing && catalog_is_stale(settings, state)) {
        report.catalog = Some(refresh_catalog(remote, state).await);
    }
    if actions.import {
        report.import = Some(Importer::new(remote, store, settings).run(state).await?);
    }
    if actions.export {
        report.export = Some(Exporter::new(remote, store, settings).run(state).await?);
    }
    Ok(report)
}
