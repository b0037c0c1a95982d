//! A loaded document and the edits staged against it.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::context::FileContext;
use crate::pattern::CompiledPattern;
use crate::scanner::{scan, MatchRecord};
use crate::span::{Span, SpanSet};

static FRONT_MATTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A---[ \t]*\r?\n(?P<yaml>.*?)(?m:^)---[ \t]*(?:\r?\n|\z)").unwrap()
});

/// Lowercase hex SHA-256 of the text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Change status of a document relative to the last run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Never seen with notes before.
    New,
    /// Same content as when last recorded.
    Unaltered,
    /// Changed outside the sync since last recorded.
    Altered,
    /// Spliced during this run.
    Modified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Splice {
    span: Span,
    text: String,
}

/// One document held for the duration of a run.
///
/// Edits are staged with offsets into the text as loaded and applied together
/// by [`Document::commit`], so staging never invalidates another staged span.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: String,
    text: String,
    pub status: DocumentStatus,
    pub context: FileContext,
    /// Spans claimed by rules during this run's scan.
    pub claimed: SpanSet,
    splices: Vec<Splice>,
    front_matter_tags: Vec<String>,
}

impl Document {
    pub fn new(path: impl Into<String>, text: impl Into<String>, status: DocumentStatus) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            status,
            context: FileContext::default(),
            claimed: SpanSet::new(),
            splices: Vec::new(),
            front_matter_tags: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Scan the loaded text with `pattern`, claiming accepted matches in this document.
    pub fn scan(&mut self, pattern: &CompiledPattern, should_override: bool) -> Vec<MatchRecord> {
        scan(pattern, &self.text, &mut self.claimed, should_override)
    }

    /// Stage replacing `span` with `text`. Returns false if the span does not fit the text.
    pub fn stage_replace(&mut self, span: Span, text: impl Into<String>) -> bool {
        let valid = span.end <= self.text.len()
            && self.text.is_char_boundary(span.start)
            && self.text.is_char_boundary(span.end);
        if !valid {
            warn!(
                path = %self.path,
                start = span.start,
                end = span.end,
                "splice outside document text, skipped"
            );
            return false;
        }
        self.splices.push(Splice {
            span,
            text: text.into(),
        });
        true
    }

    pub fn stage_insert(&mut self, pos: usize, text: impl Into<String>) -> bool {
        self.stage_replace(Span::empty(pos), text)
    }

    pub fn stage_remove(&mut self, span: Span) -> bool {
        self.stage_replace(span, String::new())
    }

    /// Stage adding `tag` to the front matter `tags` list.
    pub fn stage_front_matter_tag(&mut self, tag: &str) {
        let tag = tag.trim();
        if !tag.is_empty() && !self.front_matter_tags.iter().any(|t| t == tag) {
            self.front_matter_tags.push(tag.to_string());
        }
    }

    /// Offset just past the end of the line containing `needle`, or the end of the text.
    pub fn insertion_point(&self, needle: Option<&str>) -> usize {
        needle
            .filter(|n| !n.is_empty())
            .and_then(|n| self.text.find(n).map(|at| at + n.len()))
            .map(|at| self.text[at..].find('\n').map_or(self.text.len(), |nl| at + nl))
            .unwrap_or(self.text.len())
    }

    /// Apply all staged edits. Returns true if the text changed.
    pub fn commit(&mut self) -> bool {
        let mut splices = std::mem::take(&mut self.splices);
        if let Some(splice) = self.front_matter_splice() {
            splices.insert(0, splice);
        }
        self.front_matter_tags.clear();
        if splices.is_empty() {
            return false;
        }

        // Right to left; at equal offsets the later staged edit is applied first
        // so that insertions keep their staging order in the result.
        let mut ordered: Vec<(usize, Splice)> = splices.into_iter().enumerate().collect();
        ordered.sort_by(|(ia, a), (ib, b)| b.span.start.cmp(&a.span.start).then(ib.cmp(ia)));

        let mut text = self.text.clone();
        let mut floor = usize::MAX;
        for (_, splice) in ordered {
            if splice.span.end > floor {
                warn!(path = %self.path, start = splice.span.start, "overlapping splice dropped");
                continue;
            }
            text.replace_range(splice.span.start..splice.span.end, &splice.text);
            floor = splice.span.start;
        }

        if text == self.text {
            return false;
        }
        self.text = text;
        self.status = DocumentStatus::Modified;
        true
    }

    fn front_matter_splice(&self) -> Option<Splice> {
        if self.front_matter_tags.is_empty() {
            return None;
        }

        let (span, mut mapping) = match FRONT_MATTER.captures(&self.text) {
            Some(caps) => {
                let whole = caps.get(0)?;
                let yaml = caps.name("yaml").map_or("", |m| m.as_str());
                let mapping = match serde_yaml::from_str::<Value>(yaml) {
                    Ok(Value::Mapping(mapping)) => mapping,
                    Ok(Value::Null) => Mapping::new(),
                    Ok(_) | Err(_) => {
                        warn!(path = %self.path, "front matter is not a mapping, tags not added");
                        return None;
                    }
                };
                (Span::from_match(&whole), mapping)
            }
            None => (Span::empty(0), Mapping::new()),
        };

        let key = Value::String("tags".to_string());
        let mut tags: Vec<Value> = match mapping.get(&key) {
            Some(Value::Sequence(items)) => items.clone(),
            Some(Value::String(s)) => s
                .split([',', ' '])
                .filter(|t| !t.is_empty())
                .map(|t| Value::String(t.to_string()))
                .collect(),
            _ => Vec::new(),
        };
        let before = tags.len();
        for tag in &self.front_matter_tags {
            let value = Value::String(tag.clone());
            if !tags.contains(&value) {
                tags.push(value);
            }
        }
        if tags.len() == before && mapping.contains_key(&key) {
            return None;
        }
        mapping.insert(key, Value::Sequence(tags));

        let yaml = match serde_yaml::to_string(&mapping) {
            Ok(yaml) => yaml,
            Err(err) => {
                warn!(path = %self.path, error = %err, "failed to render front matter");
                return None;
            }
        };
        Some(Splice {
            span,
            text: format!("---\n{}---\n", yaml),
        })
    }
}
