//! Per-run cache of loaded documents.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::context::ContextPatterns;
use crate::document::{content_hash, Document, DocumentStatus};
use crate::error::{Result, StoreError};
use crate::state::SyncState;
use crate::store::{DocumentStore, ScopeFilter};

/// Documents touched by one sync run, each read at most once and written back
/// at most once by [`Vault::flush`].
pub struct Vault<'a> {
    store: &'a dyn DocumentStore,
    context: ContextPatterns,
    documents: BTreeMap<String, Document>,
}

impl<'a> Vault<'a> {
    pub fn new(store: &'a dyn DocumentStore, context: ContextPatterns) -> Self {
        Self {
            store,
            context,
            documents: BTreeMap::new(),
        }
    }

    /// Paths under `folder` accepted by `patterns`, sorted.
    pub async fn documents_in(&self, folder: &str, patterns: &[String]) -> Result<Vec<String>> {
        let filter = ScopeFilter::new(patterns);
        let mut paths: Vec<String> = self
            .store
            .list(folder)
            .await?
            .into_iter()
            .filter(|path| filter.matches(path))
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Load a document, reading it from the store the first time.
    pub async fn load(&mut self, path: &str, state: &SyncState) -> Result<&mut Document> {
        if !self.documents.contains_key(path) {
            let text = self.store.read(path).await?;
            let status = state.file_status(path, &text);
            let document = self.prepare(path, text, status);
            self.documents.insert(path.to_string(), document);
        }
        self.documents
            .get_mut(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()).into())
    }

    /// Load a document, creating it empty if it does not exist yet.
    pub async fn load_or_create(&mut self, path: &str, state: &SyncState) -> Result<&mut Document> {
        if !self.documents.contains_key(path) && !self.store.exists(path).await? {
            info!(path, "creating document");
            self.store.create(path).await?;
            let document = self.prepare(path, String::new(), DocumentStatus::New);
            self.documents.insert(path.to_string(), document);
        }
        self.load(path, state).await
    }

    pub fn get(&self, path: &str) -> Option<&Document> {
        self.documents.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Document> {
        self.documents.get_mut(path)
    }

    /// Commit staged edits and write every changed document. Returns the written paths.
    pub async fn flush(&mut self) -> Result<Vec<String>> {
        let mut written = Vec::new();
        for (path, document) in self.documents.iter_mut() {
            if document.commit() {
                debug!(path = %path, "writing document");
                self.store.write(path, document.text()).await?;
                written.push(path.clone());
            }
        }
        Ok(written)
    }

    fn prepare(&self, path: &str, text: String, status: DocumentStatus) -> Document {
        let mut document = Document::new(path, text, status);
        document.context = self.context.scan(document.text());
        document
    }
}

/// A tracked document found again under another path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

/// Move the bookkeeping of tracked documents that no longer exist to untracked
/// documents with identical content.
pub async fn follow_renames(
    store: &dyn DocumentStore,
    state: &mut SyncState,
) -> Result<Vec<Rename>> {
    let listed = store.list("").await?;
    let mut vanished: BTreeMap<String, String> = state
        .note_files
        .iter()
        .filter(|(path, _)| !listed.contains(path))
        .map(|(path, hash)| (hash.clone(), path.clone()))
        .collect();
    if vanished.is_empty() {
        return Ok(Vec::new());
    }

    let untracked: Vec<String> = listed
        .into_iter()
        .filter(|path| !state.note_files.contains_key(path))
        .collect();
    let mut renames = Vec::new();
    for path in untracked {
        let text = store.read(&path).await?;
        if let Some(from) = vanished.remove(&content_hash(&text)) {
            info!(from = %from, to = %path, "document renamed");
            state.rename(&from, &path, &text);
            renames.push(Rename { from, to: path });
        }
    }
    Ok(renames)
}
