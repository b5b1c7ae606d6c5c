pub mod actions;
pub mod checker;
pub mod chunker;
pub mod cli;
pub mod config;
pub mod dict;
pub mod error;
pub mod markers;
pub mod parser;
pub mod pool;

pub use actions::{ActionProvider, CodeAction, Hover, Position, QuickFix, TextEdit};
pub use checker::{CheckOptions, CustomWords};
pub use chunker::Chunk;
pub use config::Config;
pub use dict::store::{DictionaryStore, DictionaryTarget, WordScope};
pub use markers::reconciler::{ScanOutcome, SpellSession};
pub use markers::{DiagnosticsSurface, Marker, MarkerKey, MemorySurface};
pub use pool::{ScanProgress, WorkerPool};

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
            Severity::Hint => write!(f, "hint"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrammarRule {
    RepeatedWords,
    ArticleAgreement,
}

impl GrammarRule {
    pub fn code(&self) -> &'static str {
        match self {
            GrammarRule::RepeatedWords => "repeated-words",
            GrammarRule::ArticleAgreement => "article-agreement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StyleRule {
    LongSentence,
    WordyPhrase,
}

impl StyleRule {
    pub fn code(&self) -> &'static str {
        match self {
            StyleRule::LongSentence => "long-sentence",
            StyleRule::WordyPhrase => "wordy-phrase",
        }
    }
}

/// What kind of problem an [`Issue`] reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IssueKind {
    Spelling,
    Grammar { rule: GrammarRule, message: String },
    Style { rule: StyleRule, message: String },
}

impl IssueKind {
    /// Rule identifier, `None` for plain spelling issues.
    pub fn rule(&self) -> Option<&'static str> {
        match self {
            IssueKind::Spelling => None,
            IssueKind::Grammar { rule, .. } => Some(rule.code()),
            IssueKind::Style { rule, .. } => Some(rule.code()),
        }
    }

    pub fn code(&self) -> &'static str {
        self.rule().unwrap_or("spelling")
    }
}

/// One flagged span produced by a single chunk check.
///
/// `offset` and `length` are byte positions in the whole document, `line`
/// and `column` are 1-based with columns counted in chars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub word: String,
    pub suggestions: Vec<String>,
    #[serde(rename = "lineNumber")]
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub length: usize,
    pub severity: Severity,
    pub kind: IssueKind,
}

impl Issue {
    pub fn message(&self) -> String {
        match &self.kind {
            IssueKind::Spelling => format!("Unknown word: {}", self.word),
            IssueKind::Grammar { message, .. } | IssueKind::Style { message, .. } => {
                message.clone()
            }
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}
