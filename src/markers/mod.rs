pub mod line_index;
pub mod reconciler;

use crate::{GrammarRule, Issue, IssueKind, Severity};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `source` of every marker this crate produces.
pub const SOURCE: &str = "spellcheck";

/// Owner tag the session writes under unless told otherwise.
pub const DEFAULT_OWNER: &str = "spellcheck";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerTag {
    Unnecessary,
}

/// Lookup key: at most one live marker per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarkerKey {
    pub line: usize,
    pub column: usize,
    pub code: String,
}

/// What the action provider needs to know about the issue behind a marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerData {
    pub word: String,
    pub offset: usize,
    pub length: usize,
    pub suggestions: Vec<String>,
    pub kind: IssueKind,
}

/// Editor-facing diagnostic. Columns are 1-based chars, the end is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
    pub message: String,
    pub severity: Severity,
    pub source: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<MarkerTag>,
    pub data: MarkerData,
}

impl Marker {
    pub fn from_issue(issue: &Issue) -> Self {
        let (mut end_line, mut end_column) = (issue.line, issue.column);
        crate::chunker::advance(&mut end_line, &mut end_column, &issue.word);

        let tags = match issue.kind {
            IssueKind::Grammar {
                rule: GrammarRule::RepeatedWords,
                ..
            } => vec![MarkerTag::Unnecessary],
            _ => Vec::new(),
        };

        Self {
            start_line: issue.line,
            start_column: issue.column,
            end_line,
            end_column,
            message: issue.message(),
            severity: issue.severity,
            source: SOURCE.to_string(),
            code: issue.kind.code().to_string(),
            tags,
            data: MarkerData {
                word: issue.word.clone(),
                offset: issue.offset,
                length: issue.length,
                suggestions: issue.suggestions.clone(),
                kind: issue.kind.clone(),
            },
        }
    }

    pub fn key(&self) -> MarkerKey {
        MarkerKey {
            line: self.start_line,
            column: self.start_column,
            code: self.code.clone(),
        }
    }

    pub fn start(&self) -> (usize, usize) {
        (self.start_line, self.start_column)
    }

    pub fn end(&self) -> (usize, usize) {
        (self.end_line, self.end_column)
    }

    /// Inclusive containment, so a caret right after the word still hits it.
    pub fn contains(&self, position: (usize, usize)) -> bool {
        self.start() <= position && position <= self.end()
    }

    pub fn intersects(&self, start: (usize, usize), end: (usize, usize)) -> bool {
        self.start() <= end && start <= self.end()
    }
}

/// Collapse markers to one per key (later entries win), sorted by key.
pub fn dedup_markers(markers: impl IntoIterator<Item = Marker>) -> Vec<Marker> {
    let by_key: BTreeMap<MarkerKey, Marker> = markers.into_iter().map(|m| (m.key(), m)).collect();
    by_key.into_values().collect()
}

/// The host editor's diagnostics surface.
///
/// The pipeline only ever touches the owner tag it was configured with.
pub trait DiagnosticsSurface: Send + Sync {
    fn set_diagnostics(&self, owner: &str, markers: Vec<Marker>);
    fn get_diagnostics(&self, owner: &str) -> Vec<Marker>;
    fn clear_diagnostics(&self, owner: &str);
}

/// In-memory surface, used by the CLI and in tests.
#[derive(Debug, Default)]
pub struct MemorySurface {
    owners: DashMap<String, Vec<Marker>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagnosticsSurface for MemorySurface {
    fn set_diagnostics(&self, owner: &str, markers: Vec<Marker>) {
        self.owners.insert(owner.to_string(), markers);
    }

    fn get_diagnostics(&self, owner: &str) -> Vec<Marker> {
        self.owners
            .get(owner)
            .map(|markers| markers.value().clone())
            .unwrap_or_default()
    }

    fn clear_diagnostics(&self, owner: &str) {
        self.owners.remove(owner);
    }
}
