//! Common test utilities for integration tests.
//!
//! Provides:
//! - MockRemote: an in-memory remote flashcard service that records every call
//! - MemoryStore: an in-memory document store
//! - Fixtures for settings and remote records

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use notesync_core::{
    CardInfo, DocumentStore, ExportFormat, ExportRule, FieldSet, ImportRule, NewNote, NoteUpdate,
    RemoteError, RemoteNote, RemoteService, Settings, StoreError, SyncState,
};

#[derive(Default)]
struct RemoteData {
    next_id: i64,
    notes: BTreeMap<i64, RemoteNote>,
    card_decks: HashMap<i64, String>,
    note_types: BTreeMap<String, Vec<String>>,
    decks: Vec<String>,
    created: Vec<NewNote>,
    updated: Vec<NoteUpdate>,
    deleted: Vec<i64>,
    queries: Vec<String>,
    fail_create: bool,
    fail_delete: bool,
    fail_fields: Vec<String>,
    reject_fronts: Vec<String>,
}

/// In-memory remote service.
pub struct MockRemote {
    data: Mutex<RemoteData>,
}

impl MockRemote {
    /// Remote with a `Basic` note type (`Front`, `Back`) and ids starting at 1000.
    pub fn new() -> Self {
        let mut data = RemoteData {
            next_id: 1000,
            ..RemoteData::default()
        };
        data.note_types
            .insert("Basic".to_string(), vec!["Front".to_string(), "Back".to_string()]);
        data.decks.push("Default".to_string());
        Self {
            data: Mutex::new(data),
        }
    }

    /// Add a remote note whose cards live in the given decks.
    pub fn add_note(&self, id: i64, fields: &[(&str, &str)], card_decks: &[&str]) {
        let mut data = self.data.lock().unwrap();
        let cards: Vec<i64> = (0..card_decks.len() as i64).map(|i| id * 10 + i).collect();
        for (card, deck) in cards.iter().zip(card_decks) {
            data.card_decks.insert(*card, deck.to_string());
        }
        data.notes.insert(
            id,
            RemoteNote {
                id,
                note_type: "Basic".to_string(),
                tags: vec!["remote".to_string()],
                fields: fields.iter().map(|(k, v)| (*k, *v)).collect::<FieldSet>(),
                cards,
            },
        );
    }

    pub fn set_field(&self, id: i64, field: &str, value: &str) {
        let mut data = self.data.lock().unwrap();
        if let Some(note) = data.notes.get_mut(&id) {
            note.fields.insert(field, value);
        }
    }

    pub fn fail_create(&self) {
        self.data.lock().unwrap().fail_create = true;
    }

    pub fn fail_delete(&self) {
        self.data.lock().unwrap().fail_delete = true;
    }

    pub fn fail_fields_for(&self, note_type: &str) {
        self.data.lock().unwrap().fail_fields.push(note_type.to_string());
    }

    /// Reject creation of notes whose `Front` equals `front`.
    pub fn reject_front(&self, front: &str) {
        self.data.lock().unwrap().reject_fronts.push(front.to_string());
    }

    pub fn created(&self) -> Vec<NewNote> {
        self.data.lock().unwrap().created.clone()
    }

    pub fn updated(&self) -> Vec<NoteUpdate> {
        self.data.lock().unwrap().updated.clone()
    }

    pub fn deleted(&self) -> Vec<i64> {
        self.data.lock().unwrap().deleted.clone()
    }

    pub fn decks(&self) -> Vec<String> {
        self.data.lock().unwrap().decks.clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.data.lock().unwrap().queries.clone()
    }

    pub fn note(&self, id: i64) -> Option<RemoteNote> {
        self.data.lock().unwrap().notes.get(&id).cloned()
    }
}

#[async_trait]
impl RemoteService for MockRemote {
    async fn note_types(&self) -> Result<Vec<String>, RemoteError> {
        Ok(self.data.lock().unwrap().note_types.keys().cloned().collect())
    }

    async fn decks(&self) -> Result<Vec<String>, RemoteError> {
        Ok(self.data.lock().unwrap().decks.clone())
    }

    async fn fields(&self, note_type: &str) -> Result<Vec<String>, RemoteError> {
        let data = self.data.lock().unwrap();
        if data.fail_fields.iter().any(|t| t == note_type) {
            return Err(RemoteError::Network("connection reset".to_string()));
        }
        data.note_types
            .get(note_type)
            .cloned()
            .ok_or_else(|| RemoteError::Service {
                action: "modelFieldNames".to_string(),
                message: "model was not found".to_string(),
            })
    }

    async fn create_decks(&self, decks: &[String]) -> Result<(), RemoteError> {
        let mut data = self.data.lock().unwrap();
        for deck in decks {
            if !data.decks.contains(deck) {
                data.decks.push(deck.clone());
            }
        }
        Ok(())
    }

    async fn create_notes(&self, notes: &[NewNote]) -> Result<Vec<Option<i64>>, RemoteError> {
        let mut data = self.data.lock().unwrap();
        if data.fail_create {
            return Err(RemoteError::Network("connection refused".to_string()));
        }
        let mut ids = Vec::new();
        for note in notes {
            let front = note.fields.get("Front").unwrap_or_default().to_string();
            if data.reject_fronts.contains(&front) {
                ids.push(None);
                continue;
            }
            data.next_id += 1;
            let id = data.next_id;
            data.notes.insert(
                id,
                RemoteNote {
                    id,
                    note_type: note.note_type.clone(),
                    tags: note.tags.clone(),
                    fields: note.fields.clone(),
                    cards: vec![],
                },
            );
            data.created.push(note.clone());
            ids.push(Some(id));
        }
        Ok(ids)
    }

    async fn update_notes(
        &self,
        updates: &[NoteUpdate],
    ) -> Result<Vec<Result<(), String>>, RemoteError> {
        let mut data = self.data.lock().unwrap();
        let mut results = Vec::new();
        for update in updates {
            match data.notes.get_mut(&update.id) {
                Some(note) => {
                    for (name, value) in update.fields.iter() {
                        note.fields.insert(name, value);
                    }
                    if let Some(tags) = &update.tags {
                        note.tags = tags.clone();
                    }
                    results.push(Ok(()));
                }
                None => results.push(Err("note was not found".to_string())),
            }
            data.updated.push(update.clone());
        }
        Ok(results)
    }

    async fn delete_notes(&self, ids: &[i64]) -> Result<(), RemoteError> {
        let mut data = self.data.lock().unwrap();
        if data.fail_delete {
            return Err(RemoteError::Service {
                action: "deleteNotes".to_string(),
                message: "collection is not available".to_string(),
            });
        }
        for id in ids {
            data.notes.remove(id);
            data.deleted.push(*id);
        }
        Ok(())
    }

    async fn query_notes(&self, query: &str) -> Result<Vec<RemoteNote>, RemoteError> {
        let mut data = self.data.lock().unwrap();
        data.queries.push(query.to_string());
        let note_type = query
            .split("note:\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .map(str::to_string);
        Ok(data
            .notes
            .values()
            .filter(|n| note_type.as_deref().map_or(true, |t| n.note_type == t))
            .cloned()
            .collect())
    }

    async fn cards_info(&self, card_ids: &[i64]) -> Result<Vec<CardInfo>, RemoteError> {
        let data = self.data.lock().unwrap();
        Ok(card_ids
            .iter()
            .filter_map(|id| {
                data.card_decks.get(id).map(|deck| CardInfo {
                    card_id: *id,
                    deck: deck.clone(),
                })
            })
            .collect())
    }
}

/// In-memory document store keyed by vault-relative path.
#[derive(Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let store = Self::default();
        {
            let mut map = store.files.lock().unwrap();
            for (path, text) in files {
                map.insert(path.to_string(), text.to_string());
            }
        }
        store
    }

    pub fn text(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn put(&self, path: &str, text: &str) {
        self.files.lock().unwrap().insert(path.to_string(), text.to_string());
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(&self, folder: &str) -> Result<Vec<String>, StoreError> {
        let prefix = folder.trim_matches('/');
        let files = self.files.lock().unwrap();
        Ok(files
            .keys()
            .filter(|path| prefix.is_empty() || path.starts_with(&format!("{}/", prefix)))
            .cloned()
            .collect())
    }

    async fn read(&self, path: &str) -> Result<String, StoreError> {
        self.text(path).ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn write(&self, path: &str, text: &str) -> Result<(), StoreError> {
        self.put(path, text);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.files.lock().unwrap().contains_key(path))
    }

    async fn create(&self, path: &str) -> Result<(), StoreError> {
        self.put(path, "");
        Ok(())
    }
}

/// State with the `Basic` fields already cached.
pub fn basic_state() -> SyncState {
    let mut state = SyncState::default();
    state
        .fields
        .insert("Basic".to_string(), vec!["Front".to_string(), "Back".to_string()]);
    state
}

pub fn template_rule(name: &str, template: &str) -> ExportRule {
    ExportRule {
        name: name.to_string(),
        format: ExportFormat::Template {
            template: template.to_string(),
        },
        ..ExportRule::default()
    }
}

pub fn regex_rule(name: &str, pattern: &str) -> ExportRule {
    ExportRule {
        name: name.to_string(),
        format: ExportFormat::Regex {
            pattern: pattern.to_string(),
            captures: BTreeMap::new(),
        },
        ..ExportRule::default()
    }
}

pub fn export_settings(rules: Vec<ExportRule>) -> Settings {
    Settings {
        export_rules: rules,
        ..Settings::default()
    }
}

pub fn import_settings(rules: Vec<ImportRule>) -> Settings {
    Settings {
        import_rules: rules,
        ..Settings::default()
    }
}
