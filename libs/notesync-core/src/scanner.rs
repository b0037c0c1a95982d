//! Finding rule matches in document text.

use tracing::trace;

use crate::markers::{split_list, Metadata};
use crate::note::FieldSet;
use crate::pattern::{CompiledPattern, BODY_GROUP, DECK_GROUP, META_GROUP, TAGS_GROUP};
use crate::span::{Span, SpanSet};

/// One accepted match of a compiled pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    /// Whole match, including any start, metadata and end markers.
    pub span: Span,
    pub text: String,
    /// Note body without markers.
    pub body: String,
    pub fields: FieldSet,
    /// Deck captured by a `{{Deck}}` token.
    pub deck: Option<String>,
    /// Tags captured by a `{{Tags}}` token.
    pub tags: Option<Vec<String>>,
    pub metadata: Metadata,
}

/// Scan `text` with `pattern`, skipping matches that overlap spans already in
/// `claimed` and claiming every accepted match.
///
/// When `should_override` is set a field whose group did not participate is
/// recorded as empty; otherwise it is left out so the note keeps its value.
pub fn scan(
    pattern: &CompiledPattern,
    text: &str,
    claimed: &mut SpanSet,
    should_override: bool,
) -> Vec<MatchRecord> {
    let mut records = Vec::new();

    for caps in pattern.regex().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let span = Span::from_match(&whole);

        if whole.as_str().trim().is_empty() {
            continue;
        }
        if claimed.overlaps(&span) {
            trace!(start = span.start, end = span.end, "match overlaps a claimed span, skipped");
            continue;
        }

        let mut fields = FieldSet::new();
        for binding in pattern.bindings() {
            match binding.capture(&caps) {
                Some(value) => fields.insert(binding.field.clone(), value.trim()),
                None if should_override => fields.insert(binding.field.clone(), ""),
                None => {}
            }
        }

        let group = |name: &str| caps.name(name).map(|m| m.as_str());

        records.push(MatchRecord {
            span,
            text: whole.as_str().to_string(),
            body: group(BODY_GROUP).unwrap_or_default().to_string(),
            fields,
            deck: group(DECK_GROUP)
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            tags: group(TAGS_GROUP).map(split_list),
            metadata: Metadata::decode(group(META_GROUP).unwrap_or_default()),
        });
        claimed.merge(span);
    }

    records
}
