//! Persistent bookkeeping carried between runs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::document::{content_hash, DocumentStatus};

/// Where an exported note was last written, and by which rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub document: String,
    pub rule: String,
}

/// State persisted by the caller between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncState {
    /// Content hash of each document known to contain notes.
    pub note_files: BTreeMap<String, String>,
    /// Every note identifier registered by either direction.
    pub notes: BTreeSet<i64>,
    /// Identifiers written by the export direction.
    pub exported: BTreeMap<i64, ExportRecord>,
    pub note_types: Vec<String>,
    pub decks: Vec<String>,
    /// Field names per note type, in declared order.
    pub fields: BTreeMap<String, Vec<String>>,
}

impl SyncState {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn register(&mut self, id: i64) {
        self.notes.insert(id);
    }

    pub fn register_export(&mut self, id: i64, document: &str, rule: &str) {
        self.notes.insert(id);
        self.exported.insert(
            id,
            ExportRecord {
                document: document.to_string(),
                rule: rule.to_string(),
            },
        );
    }

    pub fn unregister(&mut self, id: i64) {
        self.notes.remove(&id);
        self.exported.remove(&id);
    }

    pub fn fields_for(&self, note_type: &str) -> &[String] {
        self.fields.get(note_type).map(Vec::as_slice).unwrap_or_default()
    }

    /// Status of a freshly read document against its persisted hash.
    pub fn file_status(&self, path: &str, text: &str) -> DocumentStatus {
        match self.note_files.get(path) {
            None => DocumentStatus::New,
            Some(hash) if *hash == content_hash(text) => DocumentStatus::Unaltered,
            Some(_) => DocumentStatus::Altered,
        }
    }

    pub fn record_file(&mut self, path: &str, text: &str) {
        self.note_files.insert(path.to_string(), content_hash(text));
    }

    /// Follow a document rename: the persisted hash and export records move to `new`.
    pub fn rename(&mut self, old: &str, new: &str, text: &str) {
        if self.note_files.remove(old).is_some() {
            self.record_file(new, text);
        }
        for record in self.exported.values_mut() {
            if record.document == old {
                record.document = new.to_string();
            }
        }
    }
}
