//! Import direction: remote notes written into local documents.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

use crate::context::ContextPatterns;
use crate::error::Result;
use crate::markers::{encode_import, find_note_blocks};
use crate::note::{Note, NoteStatus};
use crate::reconcile::{classify_import, qualify_query, resolve_deck};
use crate::remote::RemoteService;
use crate::settings::{ImportRule, ImportTarget, Settings};
use crate::span::Span;
use crate::state::SyncState;
use crate::store::{join_path, DocumentStore};
use crate::template::{escape_file_name, fill_template};
use crate::vault::Vault;

/// Import run statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub notes_received: usize,
    pub notes_created: usize,
    pub notes_updated: usize,
    pub notes_ignored: usize,
    pub documents_written: usize,
}

/// An imported block already present in a document.
#[derive(Debug, Clone)]
struct LocalBlock {
    path: String,
    span: Span,
    imported: Option<DateTime<Utc>>,
}

/// Runs the import direction against one remote service and one document store.
pub struct Importer<'a> {
    remote: &'a dyn RemoteService,
    store: &'a dyn DocumentStore,
    settings: &'a Settings,
}

impl<'a> Importer<'a> {
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

    /// Query, reconcile and write. Edits staged before a failure are still written.
    pub async fn run(&self, state: &mut SyncState) -> Result<ImportStats> {
        let context =
            ContextPatterns::new(&self.settings.file_deck_header, &self.settings.file_tags_header)?;
        let mut vault = Vault::new(self.store, context);
        let mut stats = ImportStats::default();
        let mut touched = BTreeSet::new();

        let outcome = self.import(&mut vault, state, &mut stats, &mut touched).await;

        let written = vault.flush().await?;
        stats.documents_written = written.len();
        for path in &touched {
            if let Some(document) = vault.get(path) {
                state.record_file(path, document.text());
            }
        }

        match outcome {
            Ok(()) => {
                info!(
                    created = stats.notes_created,
                    updated = stats.notes_updated,
                    ignored = stats.notes_ignored,
                    written = stats.documents_written,
                    "import finished"
                );
                Ok(stats)
            }
            Err(err) => {
                warn!(error = %err, written = stats.documents_written, "import aborted");
                Err(err)
            }
        }
    }

    async fn import(
        &self,
        vault: &mut Vault<'_>,
        state: &mut SyncState,
        stats: &mut ImportStats,
        touched: &mut BTreeSet<String>,
    ) -> Result<()> {
        let rules: Vec<&ImportRule> = self.settings.enabled_import_rules().collect();
        if rules.is_empty() {
            return Ok(());
        }

        let queries: Vec<String> = rules
            .iter()
            .map(|rule| qualify_query(&rule.query, &rule.note_type))
            .collect();
        let results =
            try_join_all(queries.iter().map(|query| self.remote.query_notes(query))).await?;
        stats.notes_received = results.iter().map(Vec::len).sum();

        let card_ids: Vec<i64> = results
            .iter()
            .flatten()
            .flat_map(|record| record.cards.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let decks: HashMap<i64, String> = if card_ids.is_empty() {
            HashMap::new()
        } else {
            self.remote
                .cards_info(&card_ids)
                .await?
                .into_iter()
                .map(|card| (card.card_id, card.deck))
                .collect()
        };

        let mut local: HashMap<i64, LocalBlock> = HashMap::new();
        let mut indexed: BTreeSet<String> = BTreeSet::new();
        let mut placed: BTreeSet<i64> = BTreeSet::new();
        let now = Utc::now();

        for (rule, records) in rules.into_iter().zip(results) {
            self.index_target(vault, state, rule, &mut local, &mut indexed).await?;

            for record in records {
                if !placed.insert(record.id) {
                    debug!(id = record.id, rule = %rule.name, "note placed by an earlier rule");
                    continue;
                }
                let mut note = Note::from_remote_record(&record);
                note.deck = resolve_deck(&note.cards, &decks);
                let existing = local.get(&record.id).cloned();
                note.status = classify_import(existing.is_some(), rule.existing_action);
                if note.status == NoteStatus::ImportUpdate {
                    note.last_import = existing.as_ref().and_then(|block| block.imported);
                }
                let text = encode_import(&fill_template(&rule.template, &note), record.id, now);

                match (note.status, existing) {
                    (NoteStatus::ImportUpdate, Some(block)) => {
                        if let Some(document) = vault.get_mut(&block.path) {
                            document.stage_replace(block.span, text);
                            touched.insert(block.path.clone());
                        }
                        stats.notes_updated += 1;
                    }
                    (NoteStatus::ImportIgnore, _) => stats.notes_ignored += 1,
                    _ => {
                        let path = target_path(rule, &note);
                        let document = vault.load_or_create(&path, state).await?;
                        let pos = document.insertion_point(insert_after(&rule.target));
                        let insertion = insertion_text(document.text(), pos, &text);
                        document.stage_insert(pos, insertion);
                        if rule.file_tag.enabled {
                            document.stage_front_matter_tag(&rule.file_tag.tag);
                        }
                        touched.insert(path);
                        stats.notes_created += 1;
                    }
                }
                state.register(record.id);
            }
        }
        Ok(())
    }

    /// Record the imported blocks already present where `rule` writes.
    async fn index_target(
        &self,
        vault: &mut Vault<'_>,
        state: &SyncState,
        rule: &ImportRule,
        local: &mut HashMap<i64, LocalBlock>,
        indexed: &mut BTreeSet<String>,
    ) -> Result<()> {
        let paths = match &rule.target {
            ImportTarget::File { path, .. } => {
                if vault.get(path).is_some() || self.store.exists(path).await? {
                    vec![path.clone()]
                } else {
                    Vec::new()
                }
            }
            ImportTarget::Folder { path, .. } => vault.documents_in(path, &[]).await?,
        };

        for path in paths {
            if !indexed.insert(path.clone()) {
                continue;
            }
            let document = vault.load(&path, state).await?;
            for block in find_note_blocks(document.text()) {
                let Some(id) = block.metadata.id else { continue };
                local.entry(id).or_insert_with(|| LocalBlock {
                    path: path.clone(),
                    span: block.span,
                    imported: block.metadata.imported,
                });
            }
        }
        Ok(())
    }
}

/// Document a new note from `rule` is written to.
pub fn target_path(rule: &ImportRule, note: &Note) -> String {
    match &rule.target {
        ImportTarget::File { path, .. } => path.clone(),
        ImportTarget::Folder { path, file_name } => {
            let mut name = escape_file_name(&fill_template(file_name, note));
            if name.is_empty() {
                name = note.id.map_or_else(|| "note".to_string(), |id| id.to_string());
            }
            if !name.ends_with(".md") {
                name.push_str(".md");
            }
            join_path(path, &name)
        }
    }
}

fn insert_after(target: &ImportTarget) -> Option<&str> {
    match target {
        ImportTarget::File { insert_after, .. } => insert_after.as_deref(),
        ImportTarget::Folder { .. } => None,
    }
}

/// Surround an encoded block with the blank lines needed at `pos`.
fn insertion_text(text: &str, pos: usize, block: &str) -> String {
    if pos < text.len() {
        format!("\n\n{}", block)
    } else if text.is_empty() || text.ends_with("\n\n") {
        format!("{}\n", block)
    } else if text.ends_with('\n') {
        format!("\n{}\n", block)
    } else {
        format!("\n\n{}\n", block)
    }
}
