//! Refreshing the cached note types, decks and field lists.

use futures::future::join_all;
use futures::join;
use serde::Serialize;
use tracing::{info, warn};

use crate::remote::RemoteService;
use crate::state::SyncState;

/// Outcome of a catalog refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub note_types: usize,
    pub decks: usize,
    pub field_lists: usize,
    pub failures: usize,
}

/// Fetch note types and decks, then the fields of every note type concurrently.
///
/// Results are merged into `state` only after all requests complete. A failed
/// request is logged and leaves the previously cached value in place.
pub async fn refresh_catalog(remote: &dyn RemoteService, state: &mut SyncState) -> CatalogStats {
    let mut stats = CatalogStats::default();
    let (note_types, decks) = join!(remote.note_types(), remote.decks());

    let note_types = match note_types {
        Ok(note_types) => Some(note_types),
        Err(err) => {
            warn!(error = %err, "failed to fetch note types");
            stats.failures += 1;
            None
        }
    };
    let known_types = note_types.clone().unwrap_or_else(|| state.note_types.clone());

    let fields = join_all(known_types.iter().map(|note_type| remote.fields(note_type))).await;

    if let Some(note_types) = note_types {
        stats.note_types = note_types.len();
        state.note_types = note_types;
    }
    match decks {
        Ok(decks) => {
            stats.decks = decks.len();
            state.decks = decks;
        }
        Err(err) => {
            warn!(error = %err, "failed to fetch decks");
            stats.failures += 1;
        }
    }
    for (note_type, result) in known_types.into_iter().zip(fields) {
        match result {
            Ok(names) => {
                state.fields.insert(note_type, names);
                stats.field_lists += 1;
            }
            Err(err) => {
                warn!(note_type = %note_type, error = %err, "failed to fetch fields");
                stats.failures += 1;
            }
        }
    }

    info!(
        note_types = stats.note_types,
        decks = stats.decks,
        failures = stats.failures,
        "catalog refreshed"
    );
    stats
}
