//! Export pipeline tests against in-memory collaborators.

mod common;

use pretty_assertions::assert_eq;

use common::{basic_state, export_settings, regex_rule, template_rule, MemoryStore, MockRemote};
use notesync_core::{DocumentStatus, ExportRule, Exporter, RemoteError, SyncError};

const QA: &str = "Q: {{Front}}\nA: {{Back}}";

/// A new note gains the id returned by the remote and is updated, not recreated, next run.
#[tokio::test]
async fn test_fresh_export_then_update() {
    let remote = MockRemote::new();
    let store = MemoryStore::with_files(&[(
        "notes.md",
        "# Rust\n\nQ: What is ownership?\nA: A set of rules.\n",
    )]);
    let settings = export_settings(vec![template_rule("cards", QA)]);
    let mut state = basic_state();

    let stats = Exporter::new(&remote, &store, &settings).run(&mut state).await.unwrap();
    assert_eq!(stats.notes_created, 1);
    assert_eq!(stats.documents_written, 1);

    let text = store.text("notes.md").unwrap();
    assert!(text.contains(
        "<!-- Note start -->\nQ: What is ownership?\nA: A set of rules.\n<!-- Note id: 1001 -->"
    ));
    assert!(text.contains("<!-- Note exported: "));
    assert!(text.trim_end().ends_with("<!-- Note end -->"));
    assert!(state.notes.contains(&1001));
    assert_eq!(state.exported[&1001].rule, "cards");
    assert_eq!(state.file_status("notes.md", &text), DocumentStatus::Unaltered);

    let created = remote.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].deck, "Default");
    assert_eq!(created[0].fields.get("Front"), Some("What is ownership?"));
    assert_eq!(created[0].fields.get("Back"), Some("A set of rules."));

    let stats = Exporter::new(&remote, &store, &settings).run(&mut state).await.unwrap();
    assert_eq!(stats.notes_created, 0);
    assert_eq!(stats.notes_updated, 1);
    assert_eq!(remote.created().len(), 1);
    assert_eq!(remote.updated()[0].id, 1001);

    let text = store.text("notes.md").unwrap();
    assert_eq!(text.matches("<!-- Note id: 1001 -->").count(), 1);
    assert_eq!(text.matches("<!-- Note start -->").count(), 1);
}

/// Local edits to an exported note are pushed as field updates.
#[tokio::test]
async fn test_export_pushes_edited_fields() {
    let remote = MockRemote::new();
    let store = MemoryStore::with_files(&[("notes.md", "Q: one\nA: 1\n")]);
    let settings = export_settings(vec![template_rule("cards", QA)]);
    let mut state = basic_state();

    Exporter::new(&remote, &store, &settings).run(&mut state).await.unwrap();
    let edited = store.text("notes.md").unwrap().replace("A: 1", "A: uno");
    store.put("notes.md", &edited);

    Exporter::new(&remote, &store, &settings).run(&mut state).await.unwrap();
    assert_eq!(remote.note(1001).unwrap().fields.get("Back"), Some("uno"));
    assert!(store.text("notes.md").unwrap().contains("A: uno\n<!-- Note id: 1001 -->"));
}

/// File level deck comments apply to the notes after them; a note's own marker wins.
#[tokio::test]
async fn test_context_precedence() {
    let text = "\
<!-- File deck: A -->
Q: first
A: 1

<!-- File deck: B -->
<!-- File tags: lang, rust -->
Q: second
A: 2

Q: third
A: 3
<!-- Note deck: C -->
";
    let remote = MockRemote::new();
    let store = MemoryStore::with_files(&[("notes.md", text)]);
    let settings = export_settings(vec![template_rule("cards", QA)]);
    let mut state = basic_state();

    Exporter::new(&remote, &store, &settings).run(&mut state).await.unwrap();

    let decks: Vec<(String, Vec<String>)> = remote
        .created()
        .into_iter()
        .map(|n| (n.deck, n.tags))
        .collect();
    assert_eq!(
        decks,
        vec![
            ("A".to_string(), vec![]),
            ("B".to_string(), vec!["lang".to_string(), "rust".to_string()]),
            ("C".to_string(), vec!["lang".to_string(), "rust".to_string()]),
        ]
    );
    assert!(remote.decks().contains(&"C".to_string()));

    let text = store.text("notes.md").unwrap();
    assert!(text.contains("A: 3\n<!-- Note deck: C -->\n<!-- Note id: 1003 -->"));

    let stats = Exporter::new(&remote, &store, &settings).run(&mut state).await.unwrap();
    assert_eq!(stats.notes_updated, 3);
    assert_eq!(store.text("notes.md").unwrap().matches("<!-- Note deck: C -->").count(), 1);
}

/// A deck captured by the rule's template beats a file deck comment above the note.
#[tokio::test]
async fn test_deck_capture_beats_file_context() {
    let text = "<!-- File deck: A -->\nDeck: Captured\nQ: one\nA: 1\n";
    let remote = MockRemote::new();
    let store = MemoryStore::with_files(&[("notes.md", text)]);
    let settings = export_settings(vec![template_rule(
        "decked",
        "Deck: {{Deck}}\nQ: {{Front}}\nA: {{Back}}",
    )]);
    let mut state = basic_state();

    let stats = Exporter::new(&remote, &store, &settings).run(&mut state).await.unwrap();
    assert_eq!(stats.notes_created, 1);
    assert_eq!(remote.created()[0].deck, "Captured");
    assert_eq!(remote.created()[0].fields.get("Front"), Some("one"));
}

/// Text claimed by an earlier rule is never matched by a later one.
#[tokio::test]
async fn test_rules_do_not_double_claim() {
    let remote = MockRemote::new();
    let store = MemoryStore::with_files(&[("notes.md", "Q: one\nA: 1\n\nQ: solo\n")]);
    let settings = export_settings(vec![
        template_rule("pairs", QA),
        regex_rule("singles", r"^Q: (\w+)$"),
    ]);
    let mut state = basic_state();

    let stats = Exporter::new(&remote, &store, &settings).run(&mut state).await.unwrap();
    assert_eq!(stats.notes_found, 2);

    let created = remote.created();
    assert_eq!(created[0].fields.get("Front"), Some("one"));
    assert_eq!(created[0].fields.get("Back"), Some("1"));
    assert_eq!(created[1].fields.get("Front"), Some("solo"));
    assert_eq!(created[1].fields.get("Back"), None);
    assert_eq!(state.exported[&1002].rule, "singles");
}

/// An empty optional group is exported as an empty field when the rule overrides.
#[tokio::test]
async fn test_regex_override_exports_empty_field() {
    let remote = MockRemote::new();
    let store = MemoryStore::with_files(&[("vocab.md", "Hello :: \n")]);
    let settings = export_settings(vec![ExportRule {
        should_override: true,
        ..regex_rule("vocab", r"^(\w+) ::(?: (\w+))?[ \t]*$")
    }]);
    let mut state = basic_state();

    Exporter::new(&remote, &store, &settings).run(&mut state).await.unwrap();
    let created = remote.created();
    assert_eq!(created[0].fields.get("Front"), Some("Hello"));
    assert_eq!(created[0].fields.get("Back"), Some(""));
}

/// A rule that fails to compile is skipped while the others run.
#[tokio::test]
async fn test_invalid_rule_is_skipped() {
    let remote = MockRemote::new();
    let store = MemoryStore::with_files(&[("notes.md", "Q: one\nA: 1\n")]);
    let settings = export_settings(vec![
        regex_rule("broken", r"(unclosed"),
        template_rule("cards", QA),
    ]);
    let mut state = basic_state();

    let stats = Exporter::new(&remote, &store, &settings).run(&mut state).await.unwrap();
    assert_eq!(stats.rules_skipped, 1);
    assert_eq!(stats.notes_created, 1);
}

/// Rules only read documents inside their scope.
#[tokio::test]
async fn test_scope_limits_documents() {
    let remote = MockRemote::new();
    let store = MemoryStore::with_files(&[
        ("cards/rust.md", "Q: in\nA: 1\n"),
        ("cards/drafts/wip.md", "Q: draft\nA: 2\n"),
        ("journal.md", "Q: out\nA: 3\n"),
    ]);
    let mut rule = template_rule("cards", QA);
    rule.scope.folder = "cards".to_string();
    rule.scope.patterns = vec!["cards/**/*.md".to_string(), "!cards/drafts/**".to_string()];
    let settings = export_settings(vec![rule]);
    let mut state = basic_state();

    let stats = Exporter::new(&remote, &store, &settings).run(&mut state).await.unwrap();
    assert_eq!(stats.documents_scanned, 1);
    assert_eq!(remote.created()[0].fields.get("Front"), Some("in"));
    assert_eq!(store.text("journal.md").unwrap(), "Q: out\nA: 3\n");
}

/// A rejected creation leaves the note untouched and the batch continues.
#[tokio::test]
async fn test_rejected_creation_is_not_spliced() {
    let remote = MockRemote::new();
    remote.reject_front("dup");
    let store = MemoryStore::with_files(&[("notes.md", "Q: dup\nA: 1\n\nQ: fine\nA: 2\n")]);
    let settings = export_settings(vec![template_rule("cards", QA)]);
    let mut state = basic_state();

    let stats = Exporter::new(&remote, &store, &settings).run(&mut state).await.unwrap();
    assert_eq!(stats.notes_created, 1);
    assert_eq!(stats.failures, 1);

    let text = store.text("notes.md").unwrap();
    assert!(text.starts_with("Q: dup\nA: 1\n\n<!-- Note start -->\nQ: fine"));
    assert_eq!(state.notes.len(), 1);
}

/// A note whose body was removed is deleted remotely and its leftover markers removed.
#[tokio::test]
async fn test_removed_note_is_deleted() {
    let remote = MockRemote::new();
    let store = MemoryStore::with_files(&[(
        "notes.md",
        "intro\n\nQ: gone\nA: soon\n\nQ: stays\nA: here\n",
    )]);
    let settings = export_settings(vec![template_rule("cards", QA)]);
    let mut state = basic_state();

    Exporter::new(&remote, &store, &settings).run(&mut state).await.unwrap();
    let edited = store.text("notes.md").unwrap().replace("Q: gone\nA: soon\n", "");
    store.put("notes.md", &edited);

    let stats = Exporter::new(&remote, &store, &settings).run(&mut state).await.unwrap();
    assert_eq!(stats.notes_deleted, 1);
    assert_eq!(remote.deleted(), vec![1001]);
    assert!(!state.notes.contains(&1001));
    assert!(state.notes.contains(&1002));

    let text = store.text("notes.md").unwrap();
    assert!(!text.contains("Note id: 1001"));
    assert!(text.contains("<!-- Note id: 1002 -->"));
}

/// Notes of a disabled rule are never deleted.
#[tokio::test]
async fn test_disabled_rule_keeps_its_notes() {
    let remote = MockRemote::new();
    let store = MemoryStore::with_files(&[("notes.md", "Q: one\nA: 1\n")]);
    let mut settings = export_settings(vec![template_rule("cards", QA)]);
    let mut state = basic_state();

    Exporter::new(&remote, &store, &settings).run(&mut state).await.unwrap();
    settings.export_rules[0].enabled = false;
    let stats = Exporter::new(&remote, &store, &settings).run(&mut state).await.unwrap();

    assert_eq!(stats.notes_deleted, 0);
    assert!(remote.deleted().is_empty());
    assert!(state.notes.contains(&1001));
}

/// A failing batch aborts the run but edits staged before it are written.
#[tokio::test]
async fn test_remote_failure_flushes_staged_edits() {
    let remote = MockRemote::new();
    remote.fail_delete();
    let store = MemoryStore::with_files(&[("notes.md", "Q: new\nA: 1\n\n<!-- Note id: 500 -->\n")]);
    let settings = export_settings(vec![template_rule("cards", QA)]);
    let mut state = basic_state();
    state.register_export(500, "notes.md", "cards");

    let err = Exporter::new(&remote, &store, &settings)
        .run(&mut state)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Remote(RemoteError::Service { .. })));

    let text = store.text("notes.md").unwrap();
    assert!(text.contains("<!-- Note id: 1001 -->"));
    assert!(text.contains("<!-- Note id: 500 -->"));
    assert!(state.notes.contains(&500));
}

/// A failing creation batch aborts before anything is written.
#[tokio::test]
async fn test_create_failure_aborts_export() {
    let remote = MockRemote::new();
    remote.fail_create();
    let store = MemoryStore::with_files(&[("notes.md", "Q: new\nA: 1\n")]);
    let settings = export_settings(vec![template_rule("cards", QA)]);
    let mut state = basic_state();

    let result = Exporter::new(&remote, &store, &settings).run(&mut state).await;
    assert!(matches!(result, Err(SyncError::Remote(RemoteError::Network(_)))));
    assert_eq!(store.text("notes.md").unwrap(), "Q: new\nA: 1\n");
    assert!(state.notes.is_empty());
}
