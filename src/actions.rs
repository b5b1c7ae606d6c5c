//! Quick fixes and hover text for the markers under the cursor.

use crate::dict::store::{DictionaryTarget, WordScope};
use crate::markers::{Marker, MarkerKey};
use crate::{GrammarRule, IssueKind};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Hover text is wrapped at this many graphemes per line.
pub const HOVER_WRAP_WIDTH: usize = 60;

/// Suggestions listed in a hover.
const HOVER_SUGGESTIONS: usize = 3;

/// 1-based line and char column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    fn pair(self) -> (usize, usize) {
        (self.line, self.column)
    }
}

impl From<(usize, usize)> for Position {
    fn from((line, column): (usize, usize)) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEdit {
    pub start: Position,
    pub end: Position,
    pub new_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum QuickFix {
    Replace(TextEdit),
    AddWord {
        word: String,
        target: DictionaryTarget,
    },
    Rescan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeAction {
    pub title: String,
    pub fix: QuickFix,
    pub preferred: bool,
    /// Markers this action resolves.
    pub diagnostics: Vec<MarkerKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hover {
    pub start: Position,
    pub end: Position,
    pub contents: String,
}

/// Builds actions for the current markers; holds no state of its own
/// besides the scope new words are saved under.
#[derive(Debug, Clone)]
pub struct ActionProvider {
    scope: WordScope,
}

impl ActionProvider {
    pub fn new(scope: WordScope) -> Self {
        Self { scope }
    }

    /// Markers relevant to a caret (`start == end`) or a selection.
    ///
    /// When exactly one marker contains the whole range only that marker is
    /// returned, otherwise every marker the range touches.
    pub fn markers_at<'m>(
        &self,
        markers: &'m [Marker],
        start: Position,
        end: Position,
    ) -> Vec<&'m Marker> {
        let (start, end) = if end < start { (end, start) } else { (start, end) };

        let containing: Vec<&Marker> = markers
            .iter()
            .filter(|m| m.contains(start.pair()) && m.contains(end.pair()))
            .collect();
        if containing.len() == 1 {
            return containing;
        }

        markers
            .iter()
            .filter(|m| m.intersects(start.pair(), end.pair()))
            .collect()
    }

    pub fn actions(&self, markers: &[Marker], start: Position, end: Position) -> Vec<CodeAction> {
        let matched = self.markers_at(markers, start, end);
        let mut actions = Vec::new();

        for marker in &matched {
            match &marker.data.kind {
                IssueKind::Spelling => actions.extend(self.spelling_actions(marker)),
                IssueKind::Grammar { rule, .. } => actions.extend(grammar_action(marker, *rule)),
                IssueKind::Style { .. } => {}
            }
        }

        if !matched.is_empty() {
            actions.push(CodeAction {
                title: "Rescan document".to_string(),
                fix: QuickFix::Rescan,
                preferred: false,
                diagnostics: Vec::new(),
            });
        }

        actions
    }

    pub fn hover(&self, markers: &[Marker], position: Position) -> Option<Hover> {
        let matched = self.markers_at(markers, position, position);
        let first = matched.first()?;

        let mut start = first.start();
        let mut end = first.end();
        let mut sections = Vec::new();
        for marker in &matched {
            start = start.min(marker.start());
            end = end.max(marker.end());
            sections.push(hover_text(marker));
        }

        Some(Hover {
            start: start.into(),
            end: end.into(),
            contents: sections.join("\n\n"),
        })
    }

    fn spelling_actions(&self, marker: &Marker) -> Vec<CodeAction> {
        let word = &marker.data.word;
        let mut actions: Vec<CodeAction> = marker
            .data
            .suggestions
            .iter()
            .enumerate()
            .map(|(i, suggestion)| CodeAction {
                title: format!("Replace with \"{}\"", suggestion),
                fix: QuickFix::Replace(TextEdit {
                    start: marker.start().into(),
                    end: marker.end().into(),
                    new_text: suggestion.clone(),
                }),
                preferred: i == 0,
                diagnostics: vec![marker.key()],
            })
            .collect();

        let mut targets = Vec::new();
        if let Some(folder) = &self.scope.folder_path {
            targets.push(DictionaryTarget::Folder(folder.clone()));
        }
        if let Some(category) = &self.scope.category_id {
            targets.push(DictionaryTarget::Category(category.clone()));
        }
        targets.push(DictionaryTarget::User);

        actions.extend(targets.into_iter().map(|target| CodeAction {
            title: format!("Add \"{}\" to {}", word, target),
            fix: QuickFix::AddWord {
                word: word.clone(),
                target,
            },
            preferred: false,
            diagnostics: vec![marker.key()],
        }));

        actions
    }
}

fn grammar_action(marker: &Marker, rule: GrammarRule) -> Option<CodeAction> {
    let suggestion = marker.data.suggestions.first()?;

    let (title, start, new_text) = match rule {
        // Keep the first occurrence and drop everything after it.
        GrammarRule::RepeatedWords => {
            let (mut line, mut column) = marker.start();
            crate::chunker::advance(&mut line, &mut column, suggestion);
            (
                format!("Remove repeated \"{}\"", suggestion),
                Position::new(line, column),
                String::new(),
            )
        }
        GrammarRule::ArticleAgreement => (
            format!("Change to \"{}\"", suggestion),
            marker.start().into(),
            suggestion.clone(),
        ),
    };

    Some(CodeAction {
        title,
        fix: QuickFix::Replace(TextEdit {
            start,
            end: marker.end().into(),
            new_text,
        }),
        preferred: true,
        diagnostics: vec![marker.key()],
    })
}

fn hover_text(marker: &Marker) -> String {
    let mut paragraphs = vec![marker.message.clone()];
    if marker.data.kind == IssueKind::Spelling && !marker.data.suggestions.is_empty() {
        let top: Vec<&str> = marker
            .data
            .suggestions
            .iter()
            .take(HOVER_SUGGESTIONS)
            .map(String::as_str)
            .collect();
        paragraphs.push(format!("Suggestions: {}", top.join(", ")));
    }

    paragraphs
        .iter()
        .map(|p| wrap(p, HOVER_WRAP_WIDTH).join("\n"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Greedy word wrap counting graphemes. Words longer than `width` get a
/// line of their own instead of being cut.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;

    for word in text.split_whitespace() {
        let word_width = word.graphemes(true).count();
        if current_width > 0 && current_width + 1 + word_width > width {
            lines.push(std::mem::take(&mut current));
            current_width = 0;
        }
        if current_width > 0 {
            current.push(' ');
            current_width += 1;
        }
        current.push_str(word);
        current_width += word_width;
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Issue, Severity, StyleRule};

    fn marker(
        word: &str,
        line: usize,
        column: usize,
        suggestions: &[&str],
        kind: IssueKind,
    ) -> Marker {
        Marker::from_issue(&Issue {
            word: word.to_string(),
            suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
            line,
            column,
            offset: 0,
            length: word.len(),
            severity: Severity::Error,
            kind,
        })
    }

    fn scoped() -> ActionProvider {
        ActionProvider::new(WordScope {
            user_id: "alice".to_string(),
            folder_path: Some("/notes".to_string()),
            category_id: Some("work".to_string()),
        })
    }

    #[test]
    fn test_spelling_actions() {
        let markers = vec![marker("teh", 1, 5, &["the", "ten"], IssueKind::Spelling)];
        let caret = Position::new(1, 6);
        let actions = scoped().actions(&markers, caret, caret);

        let titles: Vec<_> = actions.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Replace with \"the\"",
                "Replace with \"ten\"",
                "Add \"teh\" to folder dictionary (/notes)",
                "Add \"teh\" to category dictionary (work)",
                "Add \"teh\" to user dictionary",
                "Rescan document",
            ]
        );
        assert!(actions[0].preferred);
        assert!(!actions[1].preferred);
        assert_eq!(
            actions[0].fix,
            QuickFix::Replace(TextEdit {
                start: Position::new(1, 5),
                end: Position::new(1, 8),
                new_text: "the".to_string(),
            })
        );
    }

    #[test]
    fn test_unscoped_provider_offers_user_dictionary_only() {
        let markers = vec![marker("teh", 1, 1, &[], IssueKind::Spelling)];
        let caret = Position::new(1, 1);
        let provider = ActionProvider::new(WordScope::for_user("bob"));
        let actions = provider.actions(&markers, caret, caret);
        assert_eq!(actions.len(), 2);
        assert_eq!(
            actions[0].fix,
            QuickFix::AddWord {
                word: "teh".to_string(),
                target: DictionaryTarget::User,
            }
        );
    }

    #[test]
    fn test_repeated_word_fix_deletes_the_duplicate() {
        let kind = IssueKind::Grammar {
            rule: GrammarRule::RepeatedWords,
            message: "Repeated word: \"the\"".to_string(),
        };
        let markers = vec![marker("the the", 2, 1, &["the"], kind)];
        let caret = Position::new(2, 2);
        let actions = scoped().actions(&markers, caret, caret);

        assert_eq!(actions[0].title, "Remove repeated \"the\"");
        assert_eq!(
            actions[0].fix,
            QuickFix::Replace(TextEdit {
                start: Position::new(2, 4),
                end: Position::new(2, 8),
                new_text: String::new(),
            })
        );
    }

    #[test]
    fn test_style_markers_only_offer_rescan() {
        let kind = IssueKind::Style {
            rule: StyleRule::WordyPhrase,
            message: "Wordy".to_string(),
        };
        let markers = vec![marker("in order to", 1, 1, &["to"], kind)];
        let caret = Position::new(1, 3);
        let actions = scoped().actions(&markers, caret, caret);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].fix, QuickFix::Rescan);

        let far = Position::new(5, 1);
        assert!(scoped().actions(&markers, far, far).is_empty());
    }

    #[test]
    fn test_precise_marker_wins_over_neighbours() {
        let article = IssueKind::Grammar {
            rule: GrammarRule::ArticleAgreement,
            message: "Use \"an\"".to_string(),
        };
        let markers = vec![
            marker("a", 1, 1, &["an"], article),
            marker("aple", 1, 3, &["apple"], IssueKind::Spelling),
        ];
        let provider = scoped();

        let inside = provider.markers_at(&markers, Position::new(1, 4), Position::new(1, 4));
        assert_eq!(inside.len(), 1);
        assert_eq!(inside[0].data.word, "aple");

        let selection = provider.markers_at(&markers, Position::new(1, 1), Position::new(1, 7));
        assert_eq!(selection.len(), 2);
    }

    #[test]
    fn test_hover_lists_top_suggestions() {
        let suggestions = ["the", "ten", "tea", "tee"];
        let markers = vec![marker("teh", 1, 1, &suggestions, IssueKind::Spelling)];
        let hover = scoped().hover(&markers, Position::new(1, 2)).unwrap();
        assert_eq!(hover.contents, "Unknown word: teh\nSuggestions: the, ten, tea");
        assert_eq!(hover.end, Position::new(1, 4));
        assert!(scoped().hover(&markers, Position::new(2, 1)).is_none());
    }

    #[test]
    fn test_wrap_never_truncates() {
        let long = "a".repeat(70);
        let text = format!("short words then {} end", long);
        let lines = wrap(&text, 20);
        assert_eq!(lines, vec!["short words then", long.as_str(), "end"]);
        assert!(lines.iter().all(|l| l.graphemes(true).count() <= 20 || !l.contains(' ')));
        assert_eq!(wrap("", 20), vec![""]);
    }
}
