//! File-level deck and tag comments.
//!
//! A document may carry comments such as `<!-- File deck: Languages::Rust -->`.
//! Each applies to every note that starts at or after it, until the next one.

use regex::Regex;

use crate::error::CompileError;
use crate::markers::{split_list, DECK_PATTERN, TAGS_PATTERN};

/// Compiled header comment patterns, built once per run.
#[derive(Debug, Clone)]
pub struct ContextPatterns {
    deck: Regex,
    tags: Regex,
}

impl ContextPatterns {
    pub fn new(deck_header: &str, tags_header: &str) -> Result<Self, CompileError> {
        Ok(Self {
            deck: header_regex(deck_header, DECK_PATTERN)?,
            tags: header_regex(tags_header, TAGS_PATTERN)?,
        })
    }

    /// Collect every context comment in `text`, ordered by position.
    pub fn scan(&self, text: &str) -> FileContext {
        let decks = self
            .deck
            .captures_iter(text)
            .filter_map(|caps| {
                let value = caps.get(1)?;
                Some((caps.get(0)?.start(), value.as_str().trim().to_string()))
            })
            .collect();

        let tags = self
            .tags
            .captures_iter(text)
            .filter_map(|caps| Some((caps.get(0)?.start(), split_list(caps.get(1)?.as_str()))))
            .collect();

        FileContext { decks, tags }
    }
}

fn header_regex(header: &str, value: &str) -> Result<Regex, CompileError> {
    let header = header.trim();
    if header.is_empty() {
        return Err(CompileError::EmptyPattern);
    }
    Ok(Regex::new(&format!(
        r"(?i)<!--[ \t]*{}[ \t]*:[ \t]*({})[ \t]*-->",
        regex::escape(header),
        value
    ))?)
}

/// Position-ordered context entries of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileContext {
    decks: Vec<(usize, String)>,
    tags: Vec<(usize, Vec<String>)>,
}

impl FileContext {
    /// Build from already ordered entries.
    pub fn from_entries(decks: Vec<(usize, String)>, tags: Vec<(usize, Vec<String>)>) -> Self {
        Self { decks, tags }
    }

    pub fn deck_at(&self, pos: usize) -> Option<&str> {
        find_match(pos, &self.decks).map(String::as_str)
    }

    pub fn tags_at(&self, pos: usize) -> Option<&[String]> {
        find_match(pos, &self.tags).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.decks.is_empty() && self.tags.is_empty()
    }
}

/// Value of the last entry whose position is at or before `pos`.
pub fn find_match<T>(pos: usize, entries: &[(usize, T)]) -> Option<&T> {
    let idx = entries.partition_point(|(at, _)| *at <= pos);
    idx.checked_sub(1).map(|i| &entries[i].1)
}
