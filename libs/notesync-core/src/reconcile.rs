//! Deciding what happens to each note in a run.

use std::collections::{BTreeSet, HashMap};

use crate::markers::NoteBlock;
use crate::note::{Note, NoteStatus};
use crate::settings::ExistingAction;
use crate::span::{Span, SpanSet};
use crate::state::SyncState;

/// Export classification of a scanned note: notes carrying an identifier update
/// their remote counterpart, the rest are created.
pub fn classify_export(note: &Note) -> NoteStatus {
    if note.id.is_some() {
        NoteStatus::ExportUpdate
    } else {
        NoteStatus::ExportCreate
    }
}

/// Import classification of a remote note, given whether a local block already
/// carries its identifier.
pub fn classify_import(exists_locally: bool, action: ExistingAction) -> NoteStatus {
    match (exists_locally, action) {
        (false, _) => NoteStatus::ImportCreate,
        (true, ExistingAction::Update) => NoteStatus::ImportUpdate,
        (true, ExistingAction::Append) => NoteStatus::ImportCreate,
        (true, ExistingAction::Ignore) => NoteStatus::ImportIgnore,
    }
}

/// A remote note to delete, and the leftover marker text to remove locally if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deletion {
    pub id: i64,
    pub document: Option<String>,
    pub span: Option<Span>,
}

/// Exported notes that no scan found this run.
///
/// `found` holds every identifier matched by a rule. `marker_runs` lists, per
/// scanned document, the marker runs in its text together with the spans rules
/// claimed there. Only identifiers exported by a rule in `active_rules` are
/// considered; the marker run of a deleted note, if it is still in the text and
/// unclaimed, is returned for removal.
pub fn detect_deletions<'a>(
    state: &SyncState,
    found: &BTreeSet<i64>,
    marker_runs: impl IntoIterator<Item = (&'a str, &'a [NoteBlock], &'a SpanSet)>,
    active_rules: &BTreeSet<String>,
) -> Vec<Deletion> {
    let candidates: BTreeSet<i64> = state
        .exported
        .iter()
        .filter(|(id, record)| !found.contains(*id) && active_rules.contains(&record.rule))
        .map(|(id, _)| *id)
        .collect();

    let mut located: HashMap<i64, (String, Span)> = HashMap::new();
    for (path, runs, claimed) in marker_runs {
        for run in runs {
            let Some(id) = run.metadata.id else { continue };
            if candidates.contains(&id) && !claimed.overlaps(&run.span) {
                located.entry(id).or_insert_with(|| (path.to_string(), run.span));
            }
        }
    }

    candidates
        .into_iter()
        .map(|id| match located.remove(&id) {
            Some((document, span)) => Deletion {
                id,
                document: Some(document),
                span: Some(span),
            },
            None => Deletion {
                id,
                document: None,
                span: None,
            },
        })
        .collect()
}

/// Deck shared by every card of a remote note. Mixed or unknown placements give `None`.
pub fn resolve_deck(cards: &[i64], decks: &HashMap<i64, String>) -> Option<String> {
    let mut placements = cards.iter().map(|card| decks.get(card));
    let first = placements.next()??;
    placements
        .all(|deck| deck == Some(first))
        .then(|| first.clone())
}

/// Restrict a remote query to one note type unless it already is.
pub fn qualify_query(query: &str, note_type: &str) -> String {
    let clause = format!("note:\"{}\"", note_type);
    let query = query.trim();
    if query.contains(&clause) {
        query.to_string()
    } else if query.is_empty() {
        clause
    } else {
        format!("({}) AND {}", query, clause)
    }
}
