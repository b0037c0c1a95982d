//! The in-memory flashcard note and its field set.

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::context::FileContext;
use crate::markers::Pinned;
use crate::remote::{NewNote, NoteUpdate, RemoteNote};
use crate::scanner::MatchRecord;
use crate::settings::ExportRule;
use crate::span::Span;

/// Which way a sync run moves notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Import,
    Export,
}

/// Reconciliation state of a note within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoteStatus {
    ExportCreate,
    ExportUpdate,
    ExportDelete,
    ImportCreate,
    ImportUpdate,
    ImportIgnore,
    Unresolved,
}

impl Default for NoteStatus {
    fn default() -> Self {
        Self::Unresolved
    }
}

/// Where a note was constructed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteOrigin {
    RegexMatch,
    TemplateMatch,
    RemoteRecord,
}

/// Ordered field name to value mapping. Names are unique; insertion order is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    entries: Vec<(String, String)>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, keeping its original position if it already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = FieldSet::new();
        for (name, value) in iter {
            fields.insert(name, value);
        }
        fields
    }
}

impl Serialize for FieldSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldSetVisitor;

        impl<'de> Visitor<'de> for FieldSetVisitor {
            type Value = FieldSet;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of field names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FieldSet, A::Error> {
                let mut fields = FieldSet::new();
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    fields.insert(name, value);
                }
                Ok(fields)
            }
        }

        deserializer.deserialize_map(FieldSetVisitor)
    }
}

/// Location of a locally scanned note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Path of the owning document; the vault owns the document itself.
    pub document: String,
    pub span: Span,
}

/// One flashcard note, regardless of where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Option<i64>,
    pub note_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deck: Option<String>,
    pub tags: Vec<String>,
    pub fields: FieldSet,
    /// Remote card identifiers (remote records only).
    #[serde(default)]
    pub cards: Vec<i64>,
    /// Deck, tags and cards from the note's own markers (local notes only).
    #[serde(default)]
    pub pinned: Pinned,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Provenance>,
    /// Matched body text without markers (local notes only).
    #[serde(default)]
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_import: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_export: Option<DateTime<Utc>>,
    pub status: NoteStatus,
    pub origin: NoteOrigin,
}

impl Note {
    /// Note produced by a regex rule match.
    pub fn from_regex_match(
        record: &MatchRecord,
        rule: &ExportRule,
        document: &str,
        context: &FileContext,
    ) -> Self {
        Self::scanned(NoteOrigin::RegexMatch, record, rule, document, context)
    }

    /// Note produced by a template rule match.
    pub fn from_template_match(
        record: &MatchRecord,
        rule: &ExportRule,
        document: &str,
        context: &FileContext,
    ) -> Self {
        Self::scanned(NoteOrigin::TemplateMatch, record, rule, document, context)
    }

    /// Note produced from a record returned by the remote service.
    pub fn from_remote_record(record: &RemoteNote) -> Self {
        Self::build(
            NoteOrigin::RemoteRecord,
            Some(record.id),
            record.note_type.clone(),
            record.fields.clone(),
        )
        .with_tags(record.tags.clone())
        .with_cards(record.cards.clone())
    }

    fn scanned(
        origin: NoteOrigin,
        record: &MatchRecord,
        rule: &ExportRule,
        document: &str,
        context: &FileContext,
    ) -> Self {
        let pos = record.span.start;
        let meta = &record.metadata;

        // Note marker > template capture > file context > rule default
        let deck = meta
            .deck
            .clone()
            .or_else(|| record.deck.clone())
            .or_else(|| context.deck_at(pos).map(str::to_string))
            .or_else(|| Some(rule.deck.clone()).filter(|d| !d.is_empty()));

        let tags = meta
            .tags
            .clone()
            .or_else(|| record.tags.clone())
            .or_else(|| context.tags_at(pos).map(<[String]>::to_vec))
            .unwrap_or_else(|| rule.tags.clone());

        let mut note = Self::build(origin, meta.id, rule.note_type.clone(), FieldSet::new());
        note.apply_fields(&record.fields);
        note.deck = deck;
        note.tags = tags;
        note.pinned = meta.pinned();
        note.body = record.body.clone();
        note.last_export = meta.exported;
        note.last_import = meta.imported;
        note.source = Some(Provenance {
            document: document.to_string(),
            span: record.span,
        });
        note
    }

    fn build(origin: NoteOrigin, id: Option<i64>, note_type: String, fields: FieldSet) -> Self {
        Self {
            id: id.filter(|id| *id > 0),
            note_type: note_type.trim().to_string(),
            deck: None,
            tags: Vec::new(),
            fields,
            cards: Vec::new(),
            pinned: Pinned::default(),
            source: None,
            body: String::new(),
            last_import: None,
            last_export: None,
            status: NoteStatus::Unresolved,
            origin,
        }
    }

    fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    fn with_cards(mut self, cards: Vec<i64>) -> Self {
        self.cards = cards;
        self
    }

    /// Merge captured fields. Fields absent from `fields` keep their current value.
    pub fn apply_fields(&mut self, fields: &FieldSet) {
        for (name, value) in fields.iter() {
            self.fields.insert(name, value);
        }
    }

    pub fn document(&self) -> Option<&str> {
        self.source.as_ref().map(|s| s.document.as_str())
    }

    pub fn span(&self) -> Option<Span> {
        self.source.as_ref().map(|s| s.span)
    }

    /// Request to create this note remotely. Requires a deck.
    pub fn to_new_note(&self) -> Option<NewNote> {
        let deck = self.deck.clone()?;
        Some(NewNote {
            deck,
            note_type: self.note_type.clone(),
            fields: self.fields.clone(),
            tags: self.tags.clone(),
        })
    }

    /// Request to update this note remotely. An empty tag list leaves remote tags untouched.
    pub fn to_update(&self) -> Option<NoteUpdate> {
        Some(NoteUpdate {
            id: self.id?,
            fields: self.fields.clone(),
            tags: if self.tags.is_empty() {
                None
            } else {
                Some(self.tags.clone())
            },
        })
    }
}
