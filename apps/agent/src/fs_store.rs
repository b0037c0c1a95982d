//! Document store over a vault directory on disk.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use notesync_core::{DocumentStore, StoreError};

/// Markdown documents under one root directory, addressed by `/` separated relative paths.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a vault path. Paths escaping the root are rejected.
    fn locate(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(io_error(path, "path leaves the vault"));
        }
        Ok(self.root.join(relative))
    }

    fn list_blocking(root: &Path, dir: &Path) -> Result<Vec<String>, StoreError> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(dir).follow_links(false) {
            let entry = entry.map_err(|e| io_error(&dir.display().to_string(), e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "md") {
                continue;
            }
            // Skip hidden folders such as `.obsidian` or `.git`
            let Ok(relative) = path.strip_prefix(root) else { continue };
            if relative
                .components()
                .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
            {
                continue;
            }
            paths.push(to_vault_path(relative));
        }
        paths.sort();
        Ok(paths)
    }
}

fn to_vault_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn io_error(path: &str, err: impl ToString) -> StoreError {
    StoreError::Io {
        path: path.to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl DocumentStore for FsStore {
    async fn list(&self, folder: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.locate(folder)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || Self::list_blocking(&root, &dir))
            .await
            .map_err(|e| io_error(folder, e))?
    }

    async fn read(&self, path: &str) -> Result<String, StoreError> {
        match tokio::fs::read_to_string(self.locate(path)?).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.to_string()))
            }
            Err(e) => Err(io_error(path, e)),
        }
    }

    async fn write(&self, path: &str, text: &str) -> Result<(), StoreError> {
        let target = self.locate(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(path, e))?;
        }
        tokio::fs::write(&target, text)
            .await
            .map_err(|e| io_error(path, e))?;
        tracing::debug!(path, bytes = text.len(), "document written");
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        tokio::fs::try_exists(self.locate(path)?)
            .await
            .map_err(|e| io_error(path, e))
    }

    async fn create(&self, path: &str) -> Result<(), StoreError> {
        self.write(path, "").await
    }
}
