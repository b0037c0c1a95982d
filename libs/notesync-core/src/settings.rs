//! User configuration: export rules, import rules and run options.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_TEMPLATE: &str = "Deck: {{Deck}}\nTags: {{Tags}}\n{{Fields}}\n";
pub const DEFAULT_NOTE_TYPE: &str = "Basic";
pub const DEFAULT_DECK: &str = "Default";
pub const DEFAULT_IMPORT_TAG: &str = "anki/flashcard";
pub const DEFAULT_FILE_NAME_TEMPLATE: &str = "{{Front}}";

/// How an export rule recognizes notes in text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// `{{Token}}` template, also used to render notes on import.
    Template { template: String },
    /// Raw regular expression. `captures` maps a zero-based group index to a field name.
    Regex {
        pattern: String,
        #[serde(default)]
        captures: BTreeMap<usize, String>,
    },
}

impl Default for ExportFormat {
    fn default() -> Self {
        Self::Template {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// Which documents a rule reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentScope {
    /// Folder relative to the vault root; empty means the whole vault.
    pub folder: String,
    /// Glob patterns relative to the vault root. A leading `!` excludes.
    pub patterns: Vec<String>,
}

/// Rule recognizing notes of one note type in local documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportRule {
    pub name: String,
    pub enabled: bool,
    pub note_type: String,
    pub format: ExportFormat,
    /// Deck used when neither the note nor the file names one.
    pub deck: String,
    /// Tags used when neither the note nor the file names any.
    pub tags: Vec<String>,
    pub scope: DocumentScope,
    /// Record fields whose group did not participate in a match as empty.
    pub should_override: bool,
}

impl Default for ExportRule {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            enabled: true,
            note_type: DEFAULT_NOTE_TYPE.to_string(),
            format: ExportFormat::default(),
            deck: DEFAULT_DECK.to_string(),
            tags: Vec::new(),
            scope: DocumentScope::default(),
            should_override: false,
        }
    }
}

/// What import does with a remote note already present locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistingAction {
    /// Re-render the local block in place.
    Update,
    /// Write another copy at the insertion point.
    Append,
    /// Leave it alone.
    Ignore,
}

impl Default for ExistingAction {
    fn default() -> Self {
        Self::Update
    }
}

/// Where imported notes are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImportTarget {
    /// Every note goes into one document.
    File {
        path: String,
        /// Insert new notes after the line containing this text, or at the end
        /// when unset or absent.
        #[serde(default)]
        insert_after: Option<String>,
    },
    /// One document per note, named by rendering `file_name` through the note.
    Folder { path: String, file_name: String },
}

impl Default for ImportTarget {
    fn default() -> Self {
        Self::File {
            path: "Flashcards.md".to_string(),
            insert_after: None,
        }
    }
}

/// Front matter tag added to documents that receive imported notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTag {
    pub enabled: bool,
    pub tag: String,
}

impl Default for FileTag {
    fn default() -> Self {
        Self {
            enabled: true,
            tag: DEFAULT_IMPORT_TAG.to_string(),
        }
    }
}

/// Rule pulling remote notes matching a query into local documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportRule {
    pub name: String,
    pub enabled: bool,
    pub note_type: String,
    /// Remote search query; restricted to `note_type` before use.
    pub query: String,
    pub template: String,
    pub target: ImportTarget,
    pub existing_action: ExistingAction,
    pub file_tag: FileTag,
}

impl Default for ImportRule {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            enabled: true,
            note_type: DEFAULT_NOTE_TYPE.to_string(),
            query: String::new(),
            template: DEFAULT_TEMPLATE.to_string(),
            target: ImportTarget::default(),
            existing_action: ExistingAction::default(),
            file_tag: FileTag::default(),
        }
    }
}

impl ImportTarget {
    pub fn folder(path: impl Into<String>) -> Self {
        Self::Folder {
            path: path.into(),
            file_name: DEFAULT_FILE_NAME_TEMPLATE.to_string(),
        }
    }
}

/// Actions run when the agent starts without an explicit command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnLoad {
    pub refresh: bool,
    pub import: bool,
    pub export: bool,
}

/// Full user configuration. Rules run in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub export_rules: Vec<ExportRule>,
    pub import_rules: Vec<ImportRule>,
    pub file_deck_header: String,
    pub file_tags_header: String,
    pub on_load: OnLoad,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            export_rules: Vec::new(),
            import_rules: Vec::new(),
            file_deck_header: "File deck".to_string(),
            file_tags_header: "File tags".to_string(),
            on_load: OnLoad::default(),
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn enabled_export_rules(&self) -> impl Iterator<Item = &ExportRule> {
        self.export_rules.iter().filter(|r| r.enabled)
    }

    pub fn enabled_import_rules(&self) -> impl Iterator<Item = &ImportRule> {
        self.import_rules.iter().filter(|r| r.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_settings_fill_defaults() {
        let settings = Settings::from_json(
            r#"{
                "export_rules": [
                    {"name": "vocab", "format": {"regex": {"pattern": "^(\\w+) :: (\\w+)$", "captures": {"1": "Front"}}}}
                ],
                "import_rules": [
                    {"name": "all", "query": "deck:Rust", "target": {"type": "folder", "path": "cards", "file_name": "{{Front}}"}}
                ]
            }"#,
        )
        .unwrap();

        let export = &settings.export_rules[0];
        assert_eq!(export.name, "vocab");
        assert!(export.enabled);
        assert_eq!(export.note_type, "Basic");
        assert_eq!(export.deck, "Default");
        match &export.format {
            ExportFormat::Regex { captures, .. } => {
                assert_eq!(captures.get(&1).map(String::as_str), Some("Front"))
            }
            other => panic!("unexpected format {:?}", other),
        }

        let import = &settings.import_rules[0];
        assert_eq!(import.existing_action, ExistingAction::Update);
        assert_eq!(import.target, ImportTarget::folder("cards"));
        assert_eq!(import.template, DEFAULT_TEMPLATE);
        assert_eq!(settings.file_deck_header, "File deck");
    }

    #[test]
    fn settings_round_trip() {
        let settings = Settings {
            export_rules: vec![ExportRule::default()],
            import_rules: vec![ImportRule {
                existing_action: ExistingAction::Ignore,
                ..ImportRule::default()
            }],
            ..Settings::default()
        };
        let back = Settings::from_json(&settings.to_json().unwrap()).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let settings = Settings {
            export_rules: vec![
                ExportRule {
                    enabled: false,
                    ..ExportRule::default()
                },
                ExportRule {
                    name: "on".to_string(),
                    ..ExportRule::default()
                },
            ],
            ..Settings::default()
        };
        let names: Vec<_> = settings.enabled_export_rules().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["on"]);
    }
}
