//! Rendering notes through `{{Token}}` templates.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::note::Note;

pub const FIELDS_TOKEN: &str = "Fields";
pub const DECK_TOKEN: &str = "Deck";
pub const TAGS_TOKEN: &str = "Tags";

/// A `{{Name}}` placeholder. Names cannot contain `:` so cloze markup is never a token.
pub(crate) static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\{\{([^:"{}]*)\}\}"#).unwrap());

static CLOZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{c\d+::(?P<value>.+?)(?:::[^}]*)?\}\}").unwrap());

static FILE_NAME_FORBIDDEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\[\]#^|\\/?:*<>]").unwrap());

/// Render `note` through `template`.
///
/// Field tokens take the field value, `{{Fields}}` expands to one `Name: value`
/// line per set field, `{{Deck}}` takes the deck and `{{Tags}}` the comma joined
/// tags. Tokens with nothing to substitute are left as they are.
pub fn fill_template(template: &str, note: &Note) -> String {
    TOKEN
        .replace_all(template, |caps: &Captures| {
            let name = caps[1].trim();
            if let Some(value) = note.fields.get(name) {
                return value.to_string();
            }
            match name {
                FIELDS_TOKEN => note
                    .fields
                    .iter()
                    .map(|(field, value)| format!("{}: {}", field, value))
                    .collect::<Vec<_>>()
                    .join("\n"),
                DECK_TOKEN => note.deck.clone().unwrap_or_else(|| caps[0].to_string()),
                TAGS_TOKEN => note.tags.join(", "),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Turn rendered text into a safe file name: clozes reduce to their answer and
/// path or link syntax characters are removed.
pub fn escape_file_name(name: &str) -> String {
    let name = CLOZE.replace_all(name, "$value");
    let name = FILE_NAME_FORBIDDEN.replace_all(&name, "");
    name.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
