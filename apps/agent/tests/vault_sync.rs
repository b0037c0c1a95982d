//! End-to-end runs over a vault on disk with a scripted remote.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::fs;
use std::sync::Mutex;

use notesync_agent::commands::{execute, Actions, Command};
use notesync_agent::fs_store::FsStore;
use notesync_core::{
    CardInfo, ExportFormat, ExportRule, ImportRule, ImportTarget, NewNote, NoteUpdate, RemoteError,
    RemoteNote, RemoteService, Rename, Settings, SyncState,
};

/// Remote holding notes in memory, with `Basic` as its only note type.
#[derive(Default)]
struct ScriptedRemote {
    notes: Mutex<BTreeMap<i64, RemoteNote>>,
}

#[async_trait]
impl RemoteService for ScriptedRemote {
    async fn note_types(&self) -> Result<Vec<String>, RemoteError> {
        Ok(vec!["Basic".to_string()])
    }

    async fn decks(&self) -> Result<Vec<String>, RemoteError> {
        Ok(vec!["Default".to_string()])
    }

    async fn fields(&self, _note_type: &str) -> Result<Vec<String>, RemoteError> {
        Ok(vec!["Front".to_string(), "Back".to_string()])
    }

    async fn create_decks(&self, _decks: &[String]) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn create_notes(&self, notes: &[NewNote]) -> Result<Vec<Option<i64>>, RemoteError> {
        let mut stored = self.notes.lock().unwrap();
        Ok(notes
            .iter()
            .map(|note| {
                let id = 100 + stored.len() as i64;
                stored.insert(
                    id,
                    RemoteNote {
                        id,
                        note_type: note.note_type.clone(),
                        tags: note.tags.clone(),
                        fields: note.fields.clone(),
                        cards: vec![id * 10],
                    },
                );
                Some(id)
            })
            .collect())
    }

    async fn update_notes(
        &self,
        updates: &[NoteUpdate],
    ) -> Result<Vec<Result<(), String>>, RemoteError> {
        Ok(updates.iter().map(|_| Ok(())).collect())
    }

    async fn delete_notes(&self, _ids: &[i64]) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn query_notes(&self, _query: &str) -> Result<Vec<RemoteNote>, RemoteError> {
        Ok(self.notes.lock().unwrap().values().cloned().collect())
    }

    async fn cards_info(&self, card_ids: &[i64]) -> Result<Vec<CardInfo>, RemoteError> {
        Ok(card_ids
            .iter()
            .map(|id| CardInfo {
                card_id: *id,
                deck: "Default".to_string(),
            })
            .collect())
    }
}

fn settings() -> Settings {
    Settings {
        export_rules: vec![ExportRule {
            name: "qa".to_string(),
            format: ExportFormat::Template {
                template: "Q: {{Front}}\nA: {{Back}}".to_string(),
            },
            ..ExportRule::default()
        }],
        import_rules: vec![ImportRule {
            target: ImportTarget::folder("imported"),
            ..ImportRule::default()
        }],
        ..Settings::default()
    }
}

/// Export writes ids back to disk; a later import places the note under the import folder once.
#[tokio::test]
async fn test_export_then_import_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("notes")).unwrap();
    fs::write(dir.path().join("notes/rust.md"), "# Rust\n\nQ: Mascot?\nA: Ferris\n").unwrap();

    let remote = ScriptedRemote::default();
    let store = FsStore::new(dir.path());
    let settings = settings();
    let mut state = SyncState::default();

    let report = execute(Actions::from(Command::Export), &remote, &store, &settings, &mut state)
        .await
        .unwrap();
    // Stale catalog triggers a refresh before exporting.
    assert!(report.catalog.is_some());
    assert_eq!(report.export.unwrap().notes_created, 1);

    let text = fs::read_to_string(dir.path().join("notes/rust.md")).unwrap();
    assert!(text.contains("A: Ferris\n<!-- Note id: 100 -->"));
    assert!(state.note_files.contains_key("notes/rust.md"));

    let report = execute(Actions::from(Command::Import), &remote, &store, &settings, &mut state)
        .await
        .unwrap();
    assert!(report.catalog.is_none());
    assert_eq!(report.import.unwrap().notes_created, 1);

    let imported = fs::read_to_string(dir.path().join("imported/Mascot.md")).unwrap();
    assert!(imported.contains("Front: Mascot?\nBack: Ferris\n<!-- Note id: 100 -->"));
    assert!(imported.starts_with("---\ntags:\n- anki/flashcard\n---\n"));

    let report = execute(Actions::from(Command::Import), &remote, &store, &settings, &mut state)
        .await
        .unwrap();
    assert_eq!(report.import.unwrap().notes_updated, 1);
    assert_eq!(fs::read_dir(dir.path().join("imported")).unwrap().count(), 1);
}

/// A document moved between runs keeps its notes; nothing is recreated or deleted.
#[tokio::test]
async fn test_renamed_document_is_followed() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("notes")).unwrap();
    fs::write(dir.path().join("notes/rust.md"), "Q: Mascot?\nA: Ferris\n").unwrap();

    let remote = ScriptedRemote::default();
    let store = FsStore::new(dir.path());
    let settings = settings();
    let mut state = SyncState::default();

    execute(Actions::from(Command::Export), &remote, &store, &settings, &mut state)
        .await
        .unwrap();
    fs::rename(dir.path().join("notes/rust.md"), dir.path().join("notes/ferris.md")).unwrap();

    let report = execute(Actions::from(Command::Export), &remote, &store, &settings, &mut state)
        .await
        .unwrap();
    assert_eq!(
        report.renamed,
        vec![Rename {
            from: "notes/rust.md".to_string(),
            to: "notes/ferris.md".to_string(),
        }]
    );
    let export = report.export.unwrap();
    assert_eq!((export.notes_created, export.notes_updated, export.notes_deleted), (0, 1, 0));
    assert_eq!(state.exported[&100].document, "notes/ferris.md");
    assert!(!state.note_files.contains_key("notes/rust.md"));
}
