//! The local document collection as seen by the sync engine.

use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use tracing::warn;

use crate::error::StoreError;

/// Access to documents by vault-relative path with `/` separators.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document path under `folder`, recursively. An empty folder means the whole vault.
    async fn list(&self, folder: &str) -> Result<Vec<String>, StoreError>;

    async fn read(&self, path: &str) -> Result<String, StoreError>;

    async fn write(&self, path: &str, text: &str) -> Result<(), StoreError>;

    async fn exists(&self, path: &str) -> Result<bool, StoreError>;

    /// Create an empty document, creating parent folders as needed.
    async fn create(&self, path: &str) -> Result<(), StoreError>;
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Include and exclude globs for a rule's document scope.
#[derive(Debug, Clone, Default)]
pub struct ScopeFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl ScopeFilter {
    /// Patterns starting with `!` exclude. Invalid patterns are logged and ignored.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut filter = Self::default();
        for raw in patterns {
            let raw = raw.as_ref().trim();
            if raw.is_empty() {
                continue;
            }
            let (negated, source) = match raw.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, raw),
            };
            match Pattern::new(source) {
                Ok(pattern) if negated => filter.exclude.push(pattern),
                Ok(pattern) => filter.include.push(pattern),
                Err(err) => warn!(pattern = raw, error = %err, "invalid glob pattern ignored"),
            }
        }
        filter
    }

    /// True if `path` matches an include pattern (or there are none) and no exclude pattern.
    pub fn matches(&self, path: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| p.matches_with(path, MATCH_OPTIONS));
        included && !self.exclude.iter().any(|p| p.matches_with(path, MATCH_OPTIONS))
    }
}

/// Join a vault-relative folder and a name.
pub fn join_path(folder: &str, name: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        name.trim_start_matches('/').to_string()
    } else {
        format!("{}/{}", folder, name.trim_start_matches('/'))
    }
}
