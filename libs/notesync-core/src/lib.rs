//! Two-way sync between flashcard notes embedded in Markdown documents and a
//! remote flashcard service.
//!
//! Provides:
//! - Rule compilation from `{{Token}}` templates or raw regexes
//! - Span-tracked scanning so no text is claimed by two rules
//! - Inline marker encoding of note ids, decks, tags and sync timestamps
//! - Export and import pipelines over pluggable remote and document collaborators

pub mod catalog;
pub mod context;
pub mod document;
pub mod error;
pub mod export;
pub mod import;
pub mod markers;
pub mod note;
pub mod pattern;
pub mod reconcile;
pub mod remote;
pub mod scanner;
pub mod settings;
pub mod span;
pub mod state;
pub mod store;
pub mod template;
pub mod vault;

pub use catalog::{refresh_catalog, CatalogStats};
pub use document::{content_hash, Document, DocumentStatus};
pub use error::{CompileError, CompileWarning, RemoteError, Result, StoreError, SyncError};
pub use export::{ExportStats, Exporter};
pub use import::{ImportStats, Importer};
pub use note::{Direction, FieldSet, Note, NoteStatus};
pub use pattern::CompiledPattern;
pub use remote::{CardInfo, NewNote, NoteUpdate, RemoteNote, RemoteService};
pub use settings::{
    DocumentScope, ExistingAction, ExportFormat, ExportRule, FileTag, ImportRule, ImportTarget,
    OnLoad, Settings,
};
pub use span::{Span, SpanSet};
pub use state::SyncState;
pub use store::DocumentStore;
pub use vault::{follow_renames, Rename};
