//! AnkiConnect client.
//!
//! Every request is `POST {action, version, params}` answered with
//! `{result, error}`. Per-note calls are batched through the `multi` action.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use notesync_core::{
    CardInfo, FieldSet, NewNote, NoteUpdate, RemoteError, RemoteNote, RemoteService,
};

const API_VERSION: u32 = 6;

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoteInfo {
    note_id: i64,
    model_name: String,
    #[serde(default)]
    tags: Vec<String>,
    fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    cards: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct FieldValue {
    value: String,
    order: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardDeck {
    card_id: i64,
    deck_name: String,
}

struct AnkiClientInner {
    client: Client,
    url: String,
}

/// Remote service backed by a running AnkiConnect add-on.
///
/// Cheap to clone; clones share one HTTP connection pool.
#[derive(Clone)]
pub struct AnkiClient {
    inner: Arc<AnkiClientInner>,
}

impl AnkiClient {
    pub fn new(url: &str) -> Self {
        Self {
            inner: Arc::new(AnkiClientInner {
                client: Client::new(),
                url: url.trim_end_matches('/').to_string(),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    async fn invoke<T: DeserializeOwned>(
        &self,
        action: &str,
        params: Value,
    ) -> Result<T, RemoteError> {
        debug!(action, "anki request");
        let resp = self
            .inner
            .client
            .post(&self.inner.url)
            .json(&request_body(action, params))
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(RemoteError::Service {
                action: action.to_string(),
                message: format!("HTTP {}", resp.status().as_u16()),
            });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))?;
        parse_response(action, body)
    }

    /// Run `actions` in one `multi` request, returning each action's own outcome.
    async fn invoke_multi(
        &self,
        actions: Vec<Value>,
    ) -> Result<Vec<Result<Value, String>>, RemoteError> {
        if actions.is_empty() {
            return Ok(Vec::new());
        }
        let expected = actions.len();
        let results: Vec<Value> = self.invoke("multi", json!({ "actions": actions })).await?;
        if results.len() != expected {
            return Err(RemoteError::Parse(format!(
                "multi returned {} results for {} actions",
                results.len(),
                expected
            )));
        }
        Ok(results.into_iter().map(multi_item).collect())
    }
}

fn request_body(action: &str, params: Value) -> Value {
    let mut body = json!({ "action": action, "version": API_VERSION });
    if !params.is_null() {
        body["params"] = params;
    }
    body
}

fn action(action: &str, params: Value) -> Value {
    json!({ "action": action, "params": params })
}

fn parse_response<T: DeserializeOwned>(action: &str, body: Value) -> Result<T, RemoteError> {
    let response: Response =
        serde_json::from_value(body).map_err(|e| RemoteError::Parse(e.to_string()))?;
    if let Some(message) = response.error {
        return Err(RemoteError::Service {
            action: action.to_string(),
            message,
        });
    }
    serde_json::from_value(response.result)
        .map_err(|e| RemoteError::Parse(format!("{}: {}", action, e)))
}

/// A `multi` result entry is either `{result, error}` or the bare result.
fn multi_item(item: Value) -> Result<Value, String> {
    match item {
        Value::Object(mut map) if map.contains_key("error") && map.contains_key("result") => {
            match map.remove("error") {
                Some(Value::String(message)) => Err(message),
                Some(Value::Null) | None => Ok(map.remove("result").unwrap_or(Value::Null)),
                Some(other) => Err(other.to_string()),
            }
        }
        other => Ok(other),
    }
}

fn fields_json(fields: &FieldSet) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
            .collect(),
    )
}

fn add_note_params(note: &NewNote) -> Value {
    json!({
        "deckName": note.deck,
        "modelName": note.note_type,
        "fields": fields_json(&note.fields),
        "tags": note.tags,
    })
}

fn update_action(update: &NoteUpdate) -> Value {
    let mut note = json!({ "id": update.id, "fields": fields_json(&update.fields) });
    if let Some(tags) = &update.tags {
        note["tags"] = json!(tags);
    }
    action("updateNote", json!({ "note": note }))
}

/// Convert a `notesInfo` entry, ordering fields by their declared position.
fn remote_note(info: NoteInfo) -> RemoteNote {
    let mut fields: Vec<(String, FieldValue)> = info.fields.into_iter().collect();
    fields.sort_by_key(|(_, field)| field.order);
    RemoteNote {
        id: info.note_id,
        note_type: info.model_name,
        tags: info.tags,
        fields: fields.into_iter().map(|(name, field)| (name, field.value)).collect(),
        cards: info.cards,
    }
}

#[async_trait]
impl RemoteService for AnkiClient {
    async fn note_types(&self) -> Result<Vec<String>, RemoteError> {
        self.invoke("modelNames", Value::Null).await
    }

    async fn decks(&self) -> Result<Vec<String>, RemoteError> {
        self.invoke("deckNames", Value::Null).await
    }

    async fn fields(&self, note_type: &str) -> Result<Vec<String>, RemoteError> {
        self.invoke("modelFieldNames", json!({ "modelName": note_type })).await
    }

    async fn create_decks(&self, decks: &[String]) -> Result<(), RemoteError> {
        let actions = decks
            .iter()
            .map(|deck| action("createDeck", json!({ "deck": deck })))
            .collect();
        for (deck, result) in decks.iter().zip(self.invoke_multi(actions).await?) {
            if let Err(message) = result {
                return Err(RemoteError::Service {
                    action: format!("createDeck {}", deck),
                    message,
                });
            }
        }
        Ok(())
    }

    async fn create_notes(&self, notes: &[NewNote]) -> Result<Vec<Option<i64>>, RemoteError> {
        let params: Vec<Value> = notes.iter().map(add_note_params).collect();
        self.invoke("addNotes", json!({ "notes": params })).await
    }

    async fn update_notes(
        &self,
        updates: &[NoteUpdate],
    ) -> Result<Vec<Result<(), String>>, RemoteError> {
        let actions = updates.iter().map(update_action).collect();
        Ok(self
            .invoke_multi(actions)
            .await?
            .into_iter()
            .map(|result| result.map(|_| ()))
            .collect())
    }

    async fn delete_notes(&self, ids: &[i64]) -> Result<(), RemoteError> {
        let _: Value = self.invoke("deleteNotes", json!({ "notes": ids })).await?;
        Ok(())
    }

    async fn query_notes(&self, query: &str) -> Result<Vec<RemoteNote>, RemoteError> {
        let ids: Vec<i64> = self.invoke("findNotes", json!({ "query": query })).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let infos: Vec<Option<NoteInfo>> = self.invoke("notesInfo", json!({ "notes": ids })).await?;
        Ok(infos.into_iter().flatten().map(remote_note).collect())
    }

    async fn cards_info(&self, card_ids: &[i64]) -> Result<Vec<CardInfo>, RemoteError> {
        let cards: Vec<CardDeck> = self.invoke("cardsInfo", json!({ "cards": card_ids })).await?;
        Ok(cards
            .into_iter()
            .map(|card| CardInfo {
                card_id: card.card_id,
                deck: card.deck_name,
            })
            .collect())
    }
}
