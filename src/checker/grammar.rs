use crate::checker::tokenizer::{match_case, Token};
use crate::checker::Finding;
use crate::{GrammarRule, IssueKind, Severity, StyleRule};
use aho_corasick::{AhoCorasick, MatchKind};
use lazy_static::lazy_static;

/// Words exempt from `repeated-words`: doubling them is usually intended.
const DOUBLING_ALLOWED: &[&str] = &["had", "that", "is", "bye", "no", "very"];

const AN_PREFIXES: &[&str] = &["hour", "honest", "honor", "honour", "heir"];
const A_PREFIXES: &[&str] = &["uni", "use", "usu", "uti", "one", "once", "eu", "ewe"];

const WORDY_PHRASES: &[(&str, &str)] = &[
    ("in order to", "to"),
    ("due to the fact that", "because"),
    ("at this point in time", "now"),
    ("in the event that", "if"),
    ("for the purpose of", "for"),
    ("with regard to", "about"),
    ("a large number of", "many"),
    ("is able to", "can"),
];

lazy_static! {
    static ref WORDY: AhoCorasick = AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .match_kind(MatchKind::LeftmostLongest)
        .build(WORDY_PHRASES.iter().map(|(phrase, _)| phrase))
        .unwrap();
}

/// Which grammar and style rules run. Spelling always runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSet {
    pub repeated_words: bool,
    pub article_agreement: bool,
    pub long_sentence: bool,
    pub wordy_phrase: bool,
}

impl RuleSet {
    pub const NAMES: &'static [&'static str] = &[
        "repeated-words",
        "article-agreement",
        "long-sentence",
        "wordy-phrase",
    ];

    pub fn all() -> Self {
        Self {
            repeated_words: true,
            article_agreement: true,
            long_sentence: true,
            wordy_phrase: true,
        }
    }

    pub fn none() -> Self {
        Self {
            repeated_words: false,
            article_agreement: false,
            long_sentence: false,
            wordy_phrase: false,
        }
    }

    /// Unknown names are ignored; callers validate them up front.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut rules = Self::none();
        for name in names {
            match name.as_ref() {
                "repeated-words" => rules.repeated_words = true,
                "article-agreement" => rules.article_agreement = true,
                "long-sentence" => rules.long_sentence = true,
                "wordy-phrase" => rules.wordy_phrase = true,
                _ => {}
            }
        }
        rules
    }
}

/// Run the enabled grammar and style rules over the checkable tokens of a
/// chunk. `overlaps_skip` reports whether a local byte range touches a skip
/// region.
pub(crate) fn findings(
    text: &str,
    tokens: &[Token<'_>],
    rules: RuleSet,
    max_sentence_words: usize,
    overlaps_skip: impl Fn(usize, usize) -> bool,
) -> Vec<Finding> {
    let mut found = Vec::new();

    for pair in tokens.windows(2) {
        let (first, second) = (pair[0], pair[1]);
        let gap = &text[first.end..second.start];
        if gap.is_empty() || !gap.chars().all(char::is_whitespace) {
            continue;
        }

        if rules.repeated_words {
            if let Some(finding) = repeated_word(text, first, second) {
                found.push(finding);
            }
        }
        if rules.article_agreement {
            if let Some(finding) = article_agreement(first, second) {
                found.push(finding);
            }
        }
    }

    if rules.long_sentence && max_sentence_words > 0 {
        found.extend(long_sentences(text, tokens, max_sentence_words));
    }

    if rules.wordy_phrase {
        found.extend(wordy_phrases(text, &overlaps_skip));
    }

    found
}

fn repeated_word(text: &str, first: Token<'_>, second: Token<'_>) -> Option<Finding> {
    let lower = first.text.to_lowercase();
    if lower != second.text.to_lowercase() || DOUBLING_ALLOWED.contains(&lower.as_str()) {
        return None;
    }

    Some(Finding {
        start: first.start,
        end: second.end,
        suggestions: vec![text[first.start..first.end].to_string()],
        severity: Severity::Warning,
        kind: IssueKind::Grammar {
            rule: GrammarRule::RepeatedWords,
            message: format!("Repeated word: \"{}\"", first.text),
        },
    })
}

fn article_agreement(article: Token<'_>, next: Token<'_>) -> Option<Finding> {
    let lower = article.text.to_lowercase();
    let has_an = match lower.as_str() {
        "a" => false,
        "an" => true,
        _ => return None,
    };

    let wants_an = wants_an(next.text)?;
    if wants_an == has_an {
        return None;
    }

    let expected = if wants_an { "an" } else { "a" };
    Some(Finding {
        start: article.start,
        end: article.end,
        suggestions: vec![match_case(article.text, expected)],
        severity: Severity::Warning,
        kind: IssueKind::Grammar {
            rule: GrammarRule::ArticleAgreement,
            message: format!("Use \"{}\" before \"{}\"", expected, next.text),
        },
    })
}

/// `None` when the sound of the word cannot be guessed from its spelling.
fn wants_an(word: &str) -> Option<bool> {
    let letters = word.chars().filter(|c| c.is_alphabetic()).count();
    if letters > 1 && word.chars().all(|c| !c.is_lowercase()) {
        return None; // acronyms
    }

    let lower = word.to_lowercase();
    if AN_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return Some(true);
    }
    if A_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return Some(false);
    }

    let first = lower.chars().next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    Some(matches!(first, 'a' | 'e' | 'i' | 'o' | 'u'))
}

fn long_sentences(text: &str, tokens: &[Token<'_>], max_words: usize) -> Vec<Finding> {
    let mut found = Vec::new();
    let Some(first) = tokens.first() else {
        return found;
    };

    let mut start = first.start;
    let mut words = 0;
    let mut prev: Option<Token<'_>> = None;

    let close = |start: usize, end: usize, words: usize, found: &mut Vec<Finding>| {
        if words > max_words {
            found.push(Finding {
                start,
                end,
                suggestions: Vec::new(),
                severity: Severity::Info,
                kind: IssueKind::Style {
                    rule: StyleRule::LongSentence,
                    message: format!(
                        "Sentence has {} words; consider splitting it (limit {})",
                        words, max_words
                    ),
                },
            });
        }
    };

    for token in tokens {
        if let Some(p) = prev {
            let gap = &text[p.end..token.start];
            if let Some(terminator) = sentence_break(gap) {
                close(start, p.end + terminator, words, &mut found);
                start = token.start;
                words = 0;
            }
        }
        words += 1;
        prev = Some(*token);
    }

    if let Some(p) = prev {
        let terminated = text[p.end..].starts_with(&['.', '!', '?'][..]);
        let end = p.end + usize::from(terminated);
        close(start, end, words, &mut found);
    }

    found
}

/// Byte length of the gap prefix that still belongs to the closing sentence,
/// if the gap ends a sentence.
fn sentence_break(gap: &str) -> Option<usize> {
    if let Some(i) = gap.find(&['.', '!', '?'][..]) {
        let rest = &gap[i + 1..];
        if rest.is_empty()
            || rest.starts_with(char::is_whitespace)
            || rest.starts_with(&['"', ')'][..])
        {
            return Some(i + 1);
        }
    }
    gap.contains("\n\n").then_some(0)
}

/// Whether a sentence ends with this line, so the next line starts a new one.
/// Blank lines end paragraphs and count as well.
pub(crate) fn line_ends_sentence(line: &str) -> bool {
    let line = line.trim_end();
    if line.is_empty() {
        return true;
    }
    let tail = match line.rfind(char::is_alphabetic) {
        Some(i) => line[i..].trim_start_matches(char::is_alphabetic),
        None => line,
    };
    sentence_break(&format!("{}\n", tail)).is_some()
}

fn wordy_phrases(text: &str, overlaps_skip: &impl Fn(usize, usize) -> bool) -> Vec<Finding> {
    WORDY
        .find_iter(text)
        .filter(|m| is_word_boundary(text, m.start(), m.end()))
        .filter(|m| !overlaps_skip(m.start(), m.end()))
        .map(|m| {
            let (phrase, replacement) = WORDY_PHRASES[m.pattern().as_usize()];
            Finding {
                start: m.start(),
                end: m.end(),
                suggestions: vec![replacement.to_string()],
                severity: Severity::Hint,
                kind: IssueKind::Style {
                    rule: StyleRule::WordyPhrase,
                    message: format!("\"{}\" is wordy; consider \"{}\"", phrase, replacement),
                },
            }
        })
        .collect()
}

fn is_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}
