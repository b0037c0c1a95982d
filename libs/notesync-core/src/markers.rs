//! Inline marker comments carried by notes in document text.
//!
//! # Format
//! ```markdown
//! <!-- Note start -->
//! Front: What is Rust?
//! Back: A systems programming language.
//! <!-- Note id: 1700000000001 -->
//! <!-- Note exported: 2024-03-01T10:00:00Z -->
//! <!-- Note end -->
//! ```
//!
//! Every marker is optional on its own; decoding tolerates any subset in any order.

use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::note::Direction;
use crate::span::Span;

pub const NOTE_START: &str = "<!-- Note start -->";
pub const NOTE_END: &str = "<!-- Note end -->";

/// Hierarchical deck name, `::` separated.
pub const DECK_PATTERN: &str = r"[\w ]+(?:::[\w ]+)*";

/// Comma separated tag list.
pub const TAGS_PATTERN: &str = r"[\w/-]+(?:,[ \t]*[\w/-]+)*";

/// Comma separated card template names.
pub const CARDS_PATTERN: &str = r"[\w /-]+(?:,[ \t]*[\w /-]+)*";

/// Zero or more metadata comment lines directly following a note body.
pub const METADATA_PATTERN: &str = r"(?:\r?\n[ \t]*<!--[ \t]*(?i:note)[ \t]+(?i:id|deck|tags|cards|exported|imported)[ \t]*:[^\n]*?-->)*";

/// Optional start marker line preceding a note body.
pub const START_PATTERN: &str = r"(?:[ \t]*<!--[ \t]*(?i:note start)[ \t]*-->[ \t]*\r?\n)?";

/// Optional end marker line following the metadata block.
pub const END_PATTERN: &str = r"(?:\r?\n[ \t]*<!--[ \t]*(?i:note end)[ \t]*-->)?";

static ID_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<!--[ \t]*note id:[ \t]*(\d+)[ \t]*-->").unwrap());

static DECK_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)<!--[ \t]*note deck:[ \t]*({DECK_PATTERN})[ \t]*-->")).unwrap()
});

static TAGS_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)<!--[ \t]*note tags:[ \t]*({TAGS_PATTERN})[ \t]*-->")).unwrap()
});

static CARDS_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)<!--[ \t]*note cards:[ \t]*({CARDS_PATTERN})[ \t]*-->")).unwrap()
});

static EXPORTED_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<!--[ \t]*note exported:[ \t]*(\S+)[ \t]*-->").unwrap());

static IMPORTED_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<!--[ \t]*note imported:[ \t]*(\S+)[ \t]*-->").unwrap());

static IMPORT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?m)^[ \t]*<!--[ \t]*(?i:note start)[ \t]*-->[ \t]*\r?\n(?P<body>(?s:.*?))(?P<meta>{METADATA_PATTERN})\r?\n[ \t]*<!--[ \t]*(?i:note end)[ \t]*-->"
    ))
    .unwrap()
});

static MARKER_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?m)^{START_PATTERN}[ \t]*<!--[ \t]*(?i:note)[ \t]+(?i:id|deck|tags|cards|exported|imported)[ \t]*:[^\n]*?-->{METADATA_PATTERN}{END_PATTERN}"
    ))
    .unwrap()
});

static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").unwrap());

static LIST_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*").unwrap());

/// Wrap text in an HTML comment.
pub fn comment(text: &str) -> String {
    format!("<!-- {} -->", text)
}

pub fn id_marker(id: i64) -> String {
    comment(&format!("Note id: {}", id))
}

pub fn timestamp_marker(timestamp: DateTime<Utc>, direction: Direction) -> String {
    let label = match direction {
        Direction::Export => "exported",
        Direction::Import => "imported",
    };
    comment(&format!("Note {}: {}", label, format_timestamp(timestamp)))
}

/// RFC 3339 with as many fractional digits as needed for an exact round trip.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Split a comma separated list, dropping empty entries.
pub fn split_list(value: &str) -> Vec<String> {
    LIST_SEPARATOR
        .split(value)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Values decoded from a note's metadata block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub id: Option<i64>,
    pub deck: Option<String>,
    pub tags: Option<Vec<String>>,
    pub cards: Option<Vec<String>>,
    pub exported: Option<DateTime<Utc>>,
    pub imported: Option<DateTime<Utc>>,
}

impl Metadata {
    /// Decode each marker independently; absent or malformed markers stay `None`.
    pub fn decode(block: &str) -> Self {
        Self {
            id: first_capture(&ID_MARKER, block).and_then(|id| id.parse().ok()),
            deck: first_capture(&DECK_MARKER, block),
            tags: first_capture(&TAGS_MARKER, block).map(|tags| split_list(&tags)),
            cards: first_capture(&CARDS_MARKER, block).map(|cards| split_list(&cards)),
            exported: first_capture(&EXPORTED_MARKER, block).and_then(|ts| parse_timestamp(&ts)),
            imported: first_capture(&IMPORTED_MARKER, block).and_then(|ts| parse_timestamp(&ts)),
        }
    }

    pub fn timestamp(&self, direction: Direction) -> Option<DateTime<Utc>> {
        match direction {
            Direction::Export => self.exported,
            Direction::Import => self.imported,
        }
    }

    pub fn pinned(&self) -> Pinned {
        Pinned {
            deck: self.deck.clone(),
            tags: self.tags.clone(),
            cards: self.cards.clone(),
        }
    }
}

/// Deck, tags and cards set by a note's own markers. Export writes them back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pinned {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deck: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<String>>,
}

impl Pinned {
    fn markers(&self) -> Vec<String> {
        let lists = [("tags", &self.tags), ("cards", &self.cards)];
        self.deck
            .iter()
            .map(|deck| comment(&format!("Note deck: {}", deck)))
            .chain(lists.into_iter().filter_map(|(label, values)| {
                let values = values.as_ref().filter(|v| !v.is_empty())?;
                Some(comment(&format!("Note {}: {}", label, values.join(", "))))
            }))
            .collect()
    }
}

/// Encode a note written by the export direction. The id marker is omitted until one is assigned.
pub fn encode_export(
    body: &str,
    id: Option<i64>,
    pinned: &Pinned,
    exported: DateTime<Utc>,
) -> String {
    encode(body, pinned.markers(), id, exported, Direction::Export)
}

/// Encode a note written by the import direction, which always knows the remote id.
pub fn encode_import(body: &str, id: i64, imported: DateTime<Utc>) -> String {
    encode(body, Vec::new(), Some(id), imported, Direction::Import)
}

fn encode(
    body: &str,
    pinned: Vec<String>,
    id: Option<i64>,
    timestamp: DateTime<Utc>,
    direction: Direction,
) -> String {
    let mut lines = vec![
        NOTE_START.to_string(),
        body.trim_start_matches(['\r', '\n']).trim_end().to_string(),
    ];
    lines.extend(pinned);
    if let Some(id) = id {
        lines.push(id_marker(id));
    }
    lines.push(timestamp_marker(timestamp, direction));
    lines.push(NOTE_END.to_string());

    collapse_blank_lines(&lines.join("\n")).trim_end().to_string()
}

/// Reduce runs of blank lines to a single blank line.
pub fn collapse_blank_lines(text: &str) -> String {
    BLANK_LINES.replace_all(text, "\n\n").into_owned()
}

/// A start/end delimited note block previously written by the import direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteBlock {
    pub span: Span,
    pub body: String,
    pub metadata: Metadata,
}

/// Find every delimited note block in `text`, left to right.
pub fn find_note_blocks(text: &str) -> Vec<NoteBlock> {
    IMPORT_BLOCK
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(NoteBlock {
                span: Span::from_match(&whole),
                body: caps.name("body").map_or("", |m| m.as_str()).to_string(),
                metadata: Metadata::decode(caps.name("meta").map_or("", |m| m.as_str())),
            })
        })
        .collect()
}

/// Find runs of consecutive metadata lines, with any directly adjacent start and end markers.
///
/// The returned blocks have an empty body; callers use these to locate markers
/// whose note body no longer matches any rule.
pub fn find_marker_runs(text: &str) -> Vec<NoteBlock> {
    MARKER_RUN
        .find_iter(text)
        .map(|m| NoteBlock {
            span: Span::from_match(&m),
            body: String::new(),
            metadata: Metadata::decode(m.as_str()),
        })
        .collect()
}
