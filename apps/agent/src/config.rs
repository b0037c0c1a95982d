//! Agent configuration: where the vault, settings and sync state live.

use anyhow::{bail, Context};
use std::fs;
use std::path::{Path, PathBuf};

use notesync_core::{Settings, SyncState};

pub const VAULT_ENV: &str = "NOTESYNC_VAULT";
pub const DATA_DIR_ENV: &str = "NOTESYNC_DATA_DIR";
pub const ANKI_URL_ENV: &str = "ANKI_CONNECT_URL";

pub const DEFAULT_ANKI_URL: &str = "http://127.0.0.1:8765";

const SETTINGS_FILE: &str = "settings.json";
const STATE_FILE: &str = "state.json";

/// Resolved locations and endpoints for one agent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub vault: PathBuf,
    pub data_dir: PathBuf,
    pub anki_url: String,
}

impl Config {
    /// Command-line values win over environment variables, which win over defaults.
    pub fn resolve(
        vault: Option<PathBuf>,
        data_dir: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let vault = match vault.or_else(|| env(VAULT_ENV).map(PathBuf::from)) {
            Some(vault) => vault,
            None => bail!("no vault given, pass --vault or set {}", VAULT_ENV),
        };
        if !vault.is_dir() {
            bail!("vault is not a directory: {}", vault.display());
        }

        let data_dir = data_dir
            .or_else(|| env(DATA_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(default_data_dir);
        let anki_url = env(ANKI_URL_ENV).unwrap_or_else(|| DEFAULT_ANKI_URL.to_string());

        Ok(Self {
            vault,
            data_dir,
            anki_url,
        })
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(STATE_FILE)
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("notesync")
}

/// Load settings, falling back to defaults when the file does not exist yet.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no settings file, using defaults");
        return Ok(Settings::default());
    }
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings from {}", path.display()))?;
    Settings::from_json(&json).with_context(|| format!("invalid settings in {}", path.display()))
}

pub fn load_state(path: &Path) -> anyhow::Result<SyncState> {
    if !path.exists() {
        return Ok(SyncState::default());
    }
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read sync state from {}", path.display()))?;
    SyncState::from_json(&json).with_context(|| format!("invalid sync state in {}", path.display()))
}

/// Write the state next to its final location first, then rename over it.
pub fn save_state(path: &Path, state: &SyncState) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, state.to_json()?)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))?;
    tracing::debug!(path = %path.display(), "sync state saved");
    Ok(())
}
