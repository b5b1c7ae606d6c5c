pub mod dictionary;
pub mod grammar;
pub mod suggestions;
pub mod tokenizer;

use crate::chunker::{advance, Chunk};
use crate::parser::markdown::structural_prefix_len;
use crate::{Issue, IssueKind, Severity};
use dictionary::Lexicon;
use grammar::RuleSet;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokenizer::{case_forms, Token};

/// Chars of context searched on each side of a token for URLs and emails.
const CONTEXT_WINDOW: usize = 50;

lazy_static! {
    static ref URL: Regex =
        Regex::new(r"(?i)\b(?:(?:https?|ftp)://|www\.)[^\s<>()\[\]]+").unwrap();
    static ref EMAIL: Regex =
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}").unwrap();
}

/// Accepted words for one scope, shared read-only by every chunk of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct CustomWords(Arc<HashSet<String>>);

impl CustomWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = HashSet::new();
        for word in words {
            let word: String = word.into();
            let word = word.trim();
            if word.is_empty() {
                continue;
            }
            set.insert(word.to_lowercase());
            set.insert(word.to_string());
        }
        Self(Arc::new(set))
    }

    /// Whether `word` is accepted as-is, lowercased, uppercased or title-cased.
    pub fn contains(&self, word: &str) -> bool {
        !self.0.is_empty() && case_forms(word).iter().any(|form| self.0.contains(form))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for CustomWords {
    fn from(words: Vec<String>) -> Self {
        Self::new(words)
    }
}

impl From<CustomWords> for Vec<String> {
    fn from(words: CustomWords) -> Self {
        let mut list: Vec<String> = words.0.iter().cloned().collect();
        list.sort();
        list
    }
}

/// Per-pool checking knobs, fixed for the lifetime of the workers.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub max_suggestions: usize,
    pub rules: RuleSet,
    pub ignore_patterns: Vec<Regex>,
    pub max_sentence_words: usize,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            max_suggestions: 5,
            rules: RuleSet::all(),
            ignore_patterns: Vec::new(),
            max_sentence_words: 40,
        }
    }
}

/// A chunk-local finding, positioned into an [`Issue`] at the end of a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Finding {
    pub start: usize,
    pub end: usize,
    pub suggestions: Vec<String>,
    pub severity: Severity,
    pub kind: IssueKind,
}

/// Check one chunk. Pure: the same inputs always give the same issues.
pub fn check(
    chunk: &Chunk,
    custom_words: &CustomWords,
    lexicon: &dyn Lexicon,
    options: &CheckOptions,
) -> Vec<Issue> {
    let text = chunk.text.as_str();
    let mut seen = HashSet::new();
    let mut checkable: Vec<Token<'_>> = Vec::new();
    let mut findings = Vec::new();

    for token in tokenizer::tokens(text) {
        if !seen.insert((token.text, chunk.offset + token.start)) {
            continue;
        }
        if in_skip_region(chunk, token.start, token.end)
            || in_structural_prefix(chunk, token.start, token.end)
            || in_url_or_email(text, token)
            || in_html_tag(text, token.start, token.end)
        {
            continue;
        }
        checkable.push(token);

        if custom_words.contains(token.text) || should_ignore(token.text, options) {
            continue;
        }
        if lexicon.check(token.text) {
            continue;
        }

        findings.push(Finding {
            start: token.start,
            end: token.end,
            suggestions: lexicon.suggest(token.text, options.max_suggestions),
            severity: Severity::Error,
            kind: IssueKind::Spelling,
        });
    }

    findings.extend(grammar::findings(
        text,
        &checkable,
        options.rules,
        options.max_sentence_words,
        |start, end| overlaps_skip_region(chunk, start, end),
    ));

    position(chunk, findings)
}

/// Sort findings and turn them into issues with document-global positions.
fn position(chunk: &Chunk, mut findings: Vec<Finding>) -> Vec<Issue> {
    findings.sort_by(|a, b| {
        (a.start, a.kind.code(), a.end).cmp(&(b.start, b.kind.code(), b.end))
    });

    let (mut line, mut column, mut pos) = (chunk.line, chunk.column, 0);
    findings
        .into_iter()
        .map(|f| {
            advance(&mut line, &mut column, &chunk.text[pos..f.start]);
            pos = f.start;
            let word = chunk.text[f.start..f.end].to_string();
            Issue {
                length: word.len(),
                word,
                suggestions: f.suggestions,
                line,
                column,
                offset: chunk.offset + f.start,
                severity: f.severity,
                kind: f.kind,
            }
        })
        .collect()
}

fn in_skip_region(chunk: &Chunk, start: usize, end: usize) -> bool {
    chunk
        .skip_regions
        .iter()
        .any(|r| r.start <= start && end <= r.end)
}

fn overlaps_skip_region(chunk: &Chunk, start: usize, end: usize) -> bool {
    chunk
        .skip_regions
        .iter()
        .any(|r| r.start < end && start < r.end)
}

fn in_structural_prefix(chunk: &Chunk, start: usize, end: usize) -> bool {
    let text = chunk.text.as_str();
    let line_start = match text[..start].rfind('\n') {
        Some(i) => i + 1,
        // The chunk began mid-line; its prefix lives in the previous chunk.
        None if chunk.column != 1 => return false,
        None => 0,
    };
    let line_end = text[line_start..]
        .find('\n')
        .map_or(text.len(), |i| line_start + i);

    structural_prefix_len(&text[line_start..line_end])
        .is_some_and(|len| end - line_start <= len)
}

fn in_url_or_email(text: &str, token: Token<'_>) -> bool {
    if URL.is_match(token.text) || EMAIL.is_match(token.text) {
        return true;
    }

    let from = text[..token.start]
        .char_indices()
        .rev()
        .nth(CONTEXT_WINDOW - 1)
        .map_or(0, |(i, _)| i);
    let to = text[token.end..]
        .char_indices()
        .nth(CONTEXT_WINDOW)
        .map_or(text.len(), |(i, _)| token.end + i);
    let context = &text[from..to];

    let covers =
        |m: regex::Match<'_>| from + m.start() <= token.start && token.end <= from + m.end();
    URL.find_iter(context).any(covers) || EMAIL.find_iter(context).any(covers)
}

fn in_html_tag(text: &str, start: usize, end: usize) -> bool {
    let before = &text[..start];
    let open = match before.rfind('<') {
        Some(i) if !before[i..].contains('>') => i,
        _ => return false,
    };
    let tag_name_follows = before[open + 1..]
        .chars()
        .next()
        .map_or(true, |c| c.is_alphabetic() || c == '/' || c == '!');
    tag_name_follows
        && text[end..]
            .find(&['<', '>'][..])
            .is_some_and(|i| text[end + i..].starts_with('>'))
}

fn should_ignore(word: &str, options: &CheckOptions) -> bool {
    if word.chars().count() <= 1 {
        return true;
    }

    options.ignore_patterns.iter().any(|p| p.is_match(word))
}
