//! The remote flashcard service as seen by the sync engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::note::FieldSet;

/// Note creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    pub deck: String,
    pub note_type: String,
    pub fields: FieldSet,
    pub tags: Vec<String>,
}

/// Note update request. `tags: None` leaves remote tags as they are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUpdate {
    pub id: i64,
    pub fields: FieldSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// A note as stored remotely, with fields in the note type's declared order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNote {
    pub id: i64,
    pub note_type: String,
    pub tags: Vec<String>,
    pub fields: FieldSet,
    pub cards: Vec<i64>,
}

/// Deck placement of one remote card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardInfo {
    pub card_id: i64,
    pub deck: String,
}

/// Batch operations of the remote service.
///
/// Batch calls either fail as a whole with a [`RemoteError`] or return one
/// entry per input item, in input order.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn note_types(&self) -> Result<Vec<String>, RemoteError>;

    async fn decks(&self) -> Result<Vec<String>, RemoteError>;

    /// Field names of a note type in declared order.
    async fn fields(&self, note_type: &str) -> Result<Vec<String>, RemoteError>;

    async fn create_decks(&self, decks: &[String]) -> Result<(), RemoteError>;

    /// Create notes; `None` marks an item the service rejected.
    async fn create_notes(&self, notes: &[NewNote]) -> Result<Vec<Option<i64>>, RemoteError>;

    /// Update notes; `Err` carries the service's message for a rejected item.
    async fn update_notes(
        &self,
        updates: &[NoteUpdate],
    ) -> Result<Vec<Result<(), String>>, RemoteError>;

    async fn delete_notes(&self, ids: &[i64]) -> Result<(), RemoteError>;

    async fn query_notes(&self, query: &str) -> Result<Vec<RemoteNote>, RemoteError>;

    async fn cards_info(&self, card_ids: &[i64]) -> Result<Vec<CardInfo>, RemoteError>;
}
