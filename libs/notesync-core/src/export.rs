//! Export direction: local notes pushed to the remote service.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::context::ContextPatterns;
use crate::error::Result;
use crate::markers::{encode_export, find_marker_runs, NoteBlock};
use crate::note::{Note, NoteStatus};
use crate::pattern::{CompiledPattern, PatternKind};
use crate::reconcile::{classify_export, detect_deletions, Deletion};
use crate::remote::RemoteService;
use crate::settings::{ExportRule, Settings};
use crate::state::SyncState;
use crate::store::DocumentStore;
use crate::vault::Vault;

/// Export run statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    pub rules_skipped: usize,
    pub documents_scanned: usize,
    pub notes_found: usize,
    pub notes_created: usize,
    pub notes_updated: usize,
    pub notes_deleted: usize,
    pub failures: usize,
    pub documents_written: usize,
}

struct ScannedNote<'r> {
    rule: &'r ExportRule,
    note: Note,
}

/// Runs the export direction against one remote service and one document store.
pub struct Exporter<'a> {
    remote: &'a dyn RemoteService,
    store: &'a dyn DocumentStore,
    settings: &'a Settings,
}

impl<'a> Exporter<'a> {
    pub fn new(
        remote: &'a dyn RemoteService,
        store: &'a dyn DocumentStore,
        settings: &'a Settings,
    ) -> Self {
        Self {
            remote,
            store,
            settings,
        }
    }

    /// Scan, reconcile and push. Edits staged before a remote failure are still written.
    pub async fn run(&self, state: &mut SyncState) -> Result<ExportStats> {
        let context =
            ContextPatterns::new(&self.settings.file_deck_header, &self.settings.file_tags_header)?;
        let mut vault = Vault::new(self.store, context);
        let mut stats = ExportStats::default();
        let mut note_documents = BTreeSet::new();

        let outcome = self.export(&mut vault, state, &mut stats, &mut note_documents).await;

        let written = vault.flush().await?;
        stats.documents_written = written.len();
        for path in &note_documents {
            if let Some(document) = vault.get(path) {
                state.record_file(path, document.text());
            }
        }

        match outcome {
            Ok(()) => {
                info!(
                    created = stats.notes_created,
                    updated = stats.notes_updated,
                    deleted = stats.notes_deleted,
                    written = stats.documents_written,
                    "export finished"
                );
                Ok(stats)
            }
            Err(err) => {
                warn!(error = %err, written = stats.documents_written, "export aborted");
                Err(err)
            }
        }
    }

    async fn export(
        &self,
        vault: &mut Vault<'_>,
        state: &mut SyncState,
        stats: &mut ExportStats,
        note_documents: &mut BTreeSet<String>,
    ) -> Result<()> {
        let rules = self.compile(state, stats);
        let active: BTreeSet<String> = rules.iter().map(|(rule, _)| rule.name.clone()).collect();

        let mut notes = Vec::new();
        let mut found = BTreeSet::new();
        let mut scanned = BTreeSet::new();

        for (rule, pattern) in &rules {
            for path in vault.documents_in(&rule.scope.folder, &rule.scope.patterns).await? {
                let document = vault.load(&path, state).await?;
                scanned.insert(path.clone());

                for record in document.scan(pattern, rule.should_override) {
                    let context = &document.context;
                    let mut note = match pattern.kind {
                        PatternKind::Template => {
                            Note::from_template_match(&record, rule, &path, context)
                        }
                        PatternKind::Regex => {
                            Note::from_regex_match(&record, rule, &path, context)
                        }
                    };
                    if let Some(id) = note.id {
                        if !found.insert(id) {
                            warn!(id, path = %path, "duplicate note id, exported as new note");
                            note.id = None;
                        }
                    }
                    note.status = classify_export(&note);
                    note_documents.insert(path.clone());
                    notes.push(ScannedNote { rule: *rule, note });
                }
            }
        }
        stats.documents_scanned = scanned.len();
        stats.notes_found = notes.len();
        debug!(notes = notes.len(), documents = scanned.len(), "scan complete");

        let runs: Vec<(String, Vec<NoteBlock>)> = scanned
            .iter()
            .filter_map(|path| {
                vault
                    .get(path)
                    .map(|doc| (path.clone(), find_marker_runs(doc.text())))
            })
            .collect();
        let deletions = {
            let views = runs.iter().filter_map(|(path, blocks)| {
                vault
                    .get(path)
                    .map(|doc| (path.as_str(), blocks.as_slice(), &doc.claimed))
            });
            detect_deletions(state, &found, views, &active)
        };

        self.create_decks(&notes).await?;
        self.create_notes(vault, state, stats, &mut notes).await?;
        self.update_notes(vault, state, stats, &notes).await?;
        self.delete_notes(vault, state, stats, &deletions).await?;
        Ok(())
    }

    fn compile<'s>(
        &'s self,
        state: &SyncState,
        stats: &mut ExportStats,
    ) -> Vec<(&'s ExportRule, CompiledPattern)> {
        let mut compiled = Vec::new();
        for rule in self.settings.enabled_export_rules() {
            match CompiledPattern::for_rule(rule, state.fields_for(&rule.note_type)) {
                Ok(pattern) => {
                    for warning in pattern.warnings() {
                        warn!(rule = %rule.name, "{}", warning);
                    }
                    compiled.push((rule, pattern));
                }
                Err(err) => {
                    warn!(rule = %rule.name, error = %err, "rule skipped");
                    stats.rules_skipped += 1;
                }
            }
        }
        compiled
    }

    async fn create_decks(&self, notes: &[ScannedNote<'_>]) -> Result<()> {
        let decks: BTreeSet<String> = notes
            .iter()
            .filter(|n| {
                matches!(n.note.status, NoteStatus::ExportCreate | NoteStatus::ExportUpdate)
            })
            .filter_map(|n| n.note.deck.clone())
            .collect();
        if decks.is_empty() {
            return Ok(());
        }
        let decks: Vec<String> = decks.into_iter().collect();
        self.remote.create_decks(&decks).await?;
        Ok(())
    }

    async fn create_notes(
        &self,
        vault: &mut Vault<'_>,
        state: &mut SyncState,
        stats: &mut ExportStats,
        notes: &mut [ScannedNote<'_>],
    ) -> Result<()> {
        let mut pending = Vec::new();
        let mut requests = Vec::new();
        for (idx, scanned) in notes.iter().enumerate() {
            if scanned.note.status != NoteStatus::ExportCreate {
                continue;
            }
            match scanned.note.to_new_note() {
                Some(request) => {
                    pending.push(idx);
                    requests.push(request);
                }
                None => {
                    warn!(document = ?scanned.note.document(), "note has no deck, not created");
                    stats.failures += 1;
                }
            }
        }
        if requests.is_empty() {
            return Ok(());
        }

        let ids = self.remote.create_notes(&requests).await?;
        let now = Utc::now();
        for (idx, id) in pending.into_iter().zip(ids) {
            let scanned = &mut notes[idx];
            let Some(id) = id else {
                warn!(document = ?scanned.note.document(), "remote rejected note creation");
                stats.failures += 1;
                continue;
            };
            scanned.note.id = Some(id);
            scanned.note.last_export = Some(now);
            if stage(vault, &scanned.note) {
                if let Some(path) = scanned.note.document() {
                    state.register_export(id, path, &scanned.rule.name);
                }
            }
            stats.notes_created += 1;
        }
        Ok(())
    }

    async fn update_notes(
        &self,
        vault: &mut Vault<'_>,
        state: &mut SyncState,
        stats: &mut ExportStats,
        notes: &[ScannedNote<'_>],
    ) -> Result<()> {
        let now = Utc::now();
        let mut requests = Vec::new();
        for scanned in notes.iter().filter(|n| n.note.status == NoteStatus::ExportUpdate) {
            let Some(request) = scanned.note.to_update() else { continue };
            let mut note = scanned.note.clone();
            note.last_export = Some(now);
            stage(vault, &note);
            if let Some(path) = note.document() {
                state.register_export(request.id, path, &scanned.rule.name);
            }
            requests.push(request);
        }
        if requests.is_empty() {
            return Ok(());
        }

        let results = self.remote.update_notes(&requests).await?;
        for (request, result) in requests.iter().zip(results) {
            match result {
                Ok(()) => stats.notes_updated += 1,
                Err(message) => {
                    warn!(id = request.id, error = %message, "remote rejected note update");
                    stats.failures += 1;
                }
            }
        }
        Ok(())
    }

    async fn delete_notes(
        &self,
        vault: &mut Vault<'_>,
        state: &mut SyncState,
        stats: &mut ExportStats,
        deletions: &[Deletion],
    ) -> Result<()> {
        if deletions.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = deletions.iter().map(|d| d.id).collect();
        self.remote.delete_notes(&ids).await?;

        for deletion in deletions {
            if let (Some(path), Some(span)) = (&deletion.document, deletion.span) {
                if let Some(document) = vault.get_mut(path) {
                    document.stage_remove(span);
                }
            }
            state.unregister(deletion.id);
        }
        stats.notes_deleted = deletions.len();
        info!(count = deletions.len(), "deleted notes removed from remote");
        Ok(())
    }
}

/// Stage the encoded note over its matched span.
fn stage(vault: &mut Vault<'_>, note: &Note) -> bool {
    let (Some(source), Some(exported)) = (&note.source, note.last_export) else {
        return false;
    };
    match vault.get_mut(&source.document) {
        Some(document) => {
            let text = encode_export(&note.body, note.id, &note.pinned, exported);
            document.stage_replace(source.span, text)
        }
        None => false,
    }
}
