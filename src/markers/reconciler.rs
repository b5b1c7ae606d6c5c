use super::line_index::LineIndex;
use super::{dedup_markers, DiagnosticsSurface, Marker, MarkerKey, DEFAULT_OWNER};
use crate::actions::{CodeAction, QuickFix};
use crate::checker::{grammar, CustomWords};
use crate::chunker::{self, DEFAULT_MAX_CHUNK_SIZE};
use crate::dict::store::{DictionaryStore, WordScope};
use crate::error::PipelineError;
use crate::parser::{self, FileType};
use crate::pool::{ScanProgress, WorkerPool};
use crate::{Issue, IssueKind};
use std::ops::{Range, RangeInclusive};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Owner tag for every marker this session writes.
    pub owner: String,
    pub max_chunk_size: usize,
    /// Lines of context around an edit that a local scan re-checks.
    pub local_window_lines: usize,
    pub file_type: FileType,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            owner: DEFAULT_OWNER.to_string(),
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            local_window_lines: 2,
            file_type: FileType::Markdown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Scanning,
    Applying,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanMode {
    Full,
    /// Re-check only these lines; markers outside them are left alone.
    Local { lines: RangeInclusive<usize> },
}

/// A scan that has been requested and not yet applied.
///
/// Dropping a ticket without applying it abandons the scan.
#[derive(Debug)]
pub struct ScanTicket {
    generation: u64,
    mode: ScanMode,
    in_flight: Arc<AtomicUsize>,
}

impl ScanTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn mode(&self) -> &ScanMode {
        &self.mode
    }
}

impl Drop for ScanTicket {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Applied { generation: u64, markers: usize },
    /// A newer scan made these results obsolete; nothing was written.
    Discarded { generation: u64 },
}

impl ScanOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ScanOutcome::Applied { .. })
    }
}

/// Keeps one document's diagnostics in step with its text.
///
/// Every write to the surface goes through `writer`. Only the most recently
/// requested scan may write: results of any scan that a later request
/// superseded are dropped when they arrive.
pub struct SpellSession {
    pool: Arc<WorkerPool>,
    surface: Arc<dyn DiagnosticsSurface>,
    store: Arc<dyn DictionaryStore>,
    scope: WordScope,
    options: SessionOptions,
    /// Generation of the most recent request.
    latest_requested: AtomicU64,
    /// Generation of the last applied scan.
    writer: Mutex<u64>,
    in_flight: Arc<AtomicUsize>,
    applying: AtomicBool,
}

impl SpellSession {
    pub fn new(
        pool: Arc<WorkerPool>,
        surface: Arc<dyn DiagnosticsSurface>,
        store: Arc<dyn DictionaryStore>,
        scope: WordScope,
        options: SessionOptions,
    ) -> Self {
        Self {
            pool,
            surface,
            store,
            scope,
            options,
            latest_requested: AtomicU64::new(0),
            writer: Mutex::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            applying: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SessionState {
        if self.applying.load(Ordering::Acquire) {
            SessionState::Applying
        } else if self.in_flight.load(Ordering::Acquire) > 0 {
            SessionState::Scanning
        } else {
            SessionState::Idle
        }
    }

    pub fn scope(&self) -> &WordScope {
        &self.scope
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Current markers of this session's owner.
    pub fn diagnostics(&self) -> Vec<Marker> {
        self.surface.get_diagnostics(&self.options.owner)
    }

    /// Custom words for this session's scope. A failing store is logged and
    /// treated as empty.
    pub async fn load_custom_words(&self) -> CustomWords {
        let store = self.store.clone();
        let scope = self.scope.clone();
        match tokio::task::spawn_blocking(move || store.lookup(&scope)).await {
            Ok(Ok(words)) => words,
            Ok(Err(e)) => {
                warn!(error = %format!("{:#}", e), "custom words unavailable");
                CustomWords::default()
            }
            Err(e) => {
                warn!(error = %e, "custom word lookup aborted");
                CustomWords::default()
            }
        }
    }

    /// Start a scan. Its results must be handed back through [`Self::apply`].
    pub fn begin(&self, mode: ScanMode) -> ScanTicket {
        let generation = self.latest_requested.fetch_add(1, Ordering::AcqRel) + 1;
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        debug!(generation, ?mode, "scan requested");
        ScanTicket {
            generation,
            mode,
            in_flight: self.in_flight.clone(),
        }
    }

    /// Write a scan's issues to the surface unless a newer scan superseded it.
    pub async fn apply(&self, ticket: ScanTicket, issues: Vec<Issue>) -> ScanOutcome {
        let mut last_applied = self.writer.lock().await;
        let generation = ticket.generation;

        let latest = self.latest_requested.load(Ordering::Acquire);
        if generation < latest || generation <= *last_applied {
            debug!(generation, latest, "discarding superseded scan results");
            return ScanOutcome::Discarded { generation };
        }

        self.applying.store(true, Ordering::Release);
        let fresh = issues.iter().map(Marker::from_issue);
        let markers = match &ticket.mode {
            ScanMode::Full => dedup_markers(fresh),
            ScanMode::Local { lines } => {
                let kept = self
                    .diagnostics()
                    .into_iter()
                    .filter(|m| m.end_line < *lines.start() || m.start_line > *lines.end());
                dedup_markers(kept.chain(fresh))
            }
        };
        let count = markers.len();
        self.surface.set_diagnostics(&self.options.owner, markers);
        *last_applied = generation;
        self.applying.store(false, Ordering::Release);

        debug!(generation, markers = count, "scan applied");
        ScanOutcome::Applied {
            generation,
            markers: count,
        }
    }

    pub async fn full_scan(&self, text: &str) -> ScanOutcome {
        self.full_scan_with_progress(text, |_| {}).await
    }

    pub async fn full_scan_with_progress<F>(&self, text: &str, on_progress: F) -> ScanOutcome
    where
        F: FnMut(ScanProgress),
    {
        let ticket = self.begin(ScanMode::Full);
        let custom_words = self.load_custom_words().await;
        let chunks =
            chunker::chunk_document(text, self.options.max_chunk_size, self.options.file_type);
        let issues = self.pool.run_on_chunks(chunks, custom_words, on_progress).await;
        self.apply(ticket, issues).await
    }

    /// Re-check the lines around `changed` (byte range in the current text).
    pub async fn local_scan(&self, text: &str, changed: Range<usize>) -> ScanOutcome {
        let lines = LineIndex::new(text).window(changed, self.options.local_window_lines);
        self.rescan_lines(text, lines).await
    }

    /// Re-check `lines`, grown first so that no sentence and no current
    /// marker crosses the window's edges.
    pub async fn rescan_lines(&self, text: &str, lines: RangeInclusive<usize>) -> ScanOutcome {
        let index = LineIndex::new(text);
        let lines = self.settle_window(&index, lines);
        let span = index.line_span(lines.clone());
        let ticket = self.begin(ScanMode::Local { lines });
        let custom_words = self.load_custom_words().await;

        // Regions come from the whole document so fences around the window count.
        let regions = parser::skip_regions(self.options.file_type, text);
        let chunks = chunker::split(text, span, self.options.max_chunk_size, &regions);
        let issues = self.pool.run_on_chunks(chunks, custom_words, |_| {}).await;
        self.apply(ticket, issues).await
    }

    /// Drop markers right away, ahead of any rescan.
    pub async fn remove_markers(&self, keys: &[MarkerKey]) {
        if keys.is_empty() {
            return;
        }
        let _writer = self.writer.lock().await;
        let markers: Vec<Marker> = self
            .diagnostics()
            .into_iter()
            .filter(|m| !keys.contains(&m.key()))
            .collect();
        self.surface.set_diagnostics(&self.options.owner, markers);
    }

    /// Carry out a quick fix against `text`.
    ///
    /// Returns the follow-up scan's outcome, or `None` when nothing was
    /// rescanned (the edit no longer fits the text, or the word could not
    /// be saved).
    pub async fn apply_action(
        &self,
        action: &CodeAction,
        text: &mut String,
    ) -> Option<ScanOutcome> {
        match &action.fix {
            QuickFix::Replace(edit) => {
                let index = LineIndex::new(text);
                let range = match (
                    index.offset(edit.start.line, edit.start.column),
                    index.offset(edit.end.line, edit.end.column),
                ) {
                    (Some(start), Some(end)) if start <= end => start..end,
                    _ => {
                        warn!(title = %action.title, "edit no longer fits the document; skipped");
                        return None;
                    }
                };

                let removed_lines = text[range.clone()].matches('\n').count();
                let added_lines = edit.new_text.matches('\n').count();
                text.replace_range(range.clone(), &edit.new_text);

                self.shift_after_edit(
                    &action.diagnostics,
                    edit.start.line..=edit.end.line,
                    added_lines as isize - removed_lines as isize,
                )
                .await;

                let changed = range.start..range.start + edit.new_text.len();
                Some(self.local_scan(text, changed).await)
            }
            QuickFix::AddWord { word, target } => {
                let keys: Vec<MarkerKey> = self
                    .diagnostics()
                    .iter()
                    .filter(|m| {
                        m.data.kind == IssueKind::Spelling
                            && m.data.word.to_lowercase() == word.to_lowercase()
                    })
                    .map(Marker::key)
                    .chain(action.diagnostics.iter().cloned())
                    .collect();
                self.remove_markers(&keys).await;

                let store = self.store.clone();
                let (owned_word, user_id, owned_target) =
                    (word.clone(), self.scope.user_id.clone(), target.clone());
                let persisted = tokio::task::spawn_blocking(move || {
                    store.add_word(&owned_word, &user_id, &owned_target)
                })
                .await;

                let reason = match persisted {
                    Ok(Ok(())) => return Some(self.full_scan(text).await),
                    Ok(Err(e)) => format!("{:#}", e),
                    Err(e) => e.to_string(),
                };
                let e = PipelineError::DictionaryPersist {
                    word: word.clone(),
                    target: target.to_string(),
                    reason,
                };
                warn!(error = %e, "word not saved; skipping rescan");
                None
            }
            QuickFix::Rescan => Some(self.full_scan(text).await),
        }
    }

    fn settle_window(
        &self,
        index: &LineIndex<'_>,
        lines: RangeInclusive<usize>,
    ) -> RangeInclusive<usize> {
        let count = index.line_count();
        let mut last = (*lines.end()).clamp(1, count);
        let mut first = (*lines.start()).clamp(1, last);
        let markers = self.diagnostics();

        loop {
            let before = (first, last);
            while first > 1 && !grammar::line_ends_sentence(index.line_text(first - 1)) {
                first -= 1;
            }
            while last < count && !grammar::line_ends_sentence(index.line_text(last)) {
                last += 1;
            }
            for m in &markers {
                if m.start_line <= last && m.end_line >= first {
                    first = first.min(m.start_line).max(1);
                    last = last.max(m.end_line).min(count);
                }
            }
            if (first, last) == before {
                break;
            }
        }

        if (first..=last) != lines {
            debug!(requested = ?lines, settled = ?(first..=last), "local window widened");
        }
        first..=last
    }

    /// Remove the fixed markers and those starting on the edited lines, then
    /// move markers below the edit by the change in line count.
    async fn shift_after_edit(
        &self,
        fixed: &[MarkerKey],
        edited: RangeInclusive<usize>,
        delta: isize,
    ) {
        let _writer = self.writer.lock().await;
        let last_edited = *edited.end();
        let markers: Vec<Marker> = self
            .diagnostics()
            .into_iter()
            .filter(|m| !fixed.contains(&m.key()) && !edited.contains(&m.start_line))
            .map(|mut m| {
                if delta != 0 && m.start_line > last_edited {
                    m.start_line = m.start_line.saturating_add_signed(delta).max(1);
                    m.end_line = m.end_line.saturating_add_signed(delta).max(1);
                }
                m
            })
            .collect();
        self.surface.set_diagnostics(&self.options.owner, markers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionProvider;
    use crate::checker::dictionary::{Dictionary, Lexicon};
    use crate::checker::CheckOptions;
    use crate::dict::store::{DictionaryTarget, MemoryDictionaryStore};
    use crate::markers::MemorySurface;
    use crate::Position;

    const WORDS: &[&str] = &["the", "say", "word", "line", "is", "fine", "here", "cat"];

    struct FailingStore;

    impl DictionaryStore for FailingStore {
        fn add_word(&self, _: &str, _: &str, _: &DictionaryTarget) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }

        fn lookup(&self, _: &WordScope) -> anyhow::Result<CustomWords> {
            Ok(CustomWords::default())
        }
    }

    fn pool() -> Arc<WorkerPool> {
        let source =
            || -> anyhow::Result<Box<dyn Lexicon>> { Ok(Box::new(Dictionary::from_words(WORDS)?)) };
        Arc::new(WorkerPool::new(2, Arc::new(source), CheckOptions::default()))
    }

    fn session_with(store: Arc<dyn DictionaryStore>) -> SpellSession {
        SpellSession::new(
            pool(),
            Arc::new(MemorySurface::new()),
            store,
            WordScope::for_user("alice"),
            SessionOptions::default(),
        )
    }

    fn session() -> SpellSession {
        session_with(Arc::new(MemoryDictionaryStore::new()))
    }

    fn spelling(word: &str, line: usize) -> Issue {
        Issue {
            word: word.to_string(),
            suggestions: vec![],
            line,
            column: 1,
            offset: 0,
            length: word.len(),
            severity: crate::Severity::Error,
            kind: IssueKind::Spelling,
        }
    }

    fn lines_with_typos(typo_lines: &[usize]) -> String {
        (1..=20)
            .map(|n| if typo_lines.contains(&n) { "teh line." } else { "fine line." })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn test_full_scan_is_idempotent() {
        let session = session();
        let text = "Say teh word\n\nteh cat";

        assert!(session.full_scan(text).await.is_applied());
        let first = session.diagnostics();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].start(), (1, 5));
        assert_eq!(first[1].start(), (3, 1));

        session.full_scan(text).await;
        assert_eq!(session.diagnostics(), first);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_local_rescan_leaves_other_lines_alone() {
        let session = session();
        session.full_scan(&lines_with_typos(&[1, 10, 20])).await;
        let before = session.diagnostics();
        assert_eq!(before.len(), 3);

        let text = lines_with_typos(&[1, 20]);
        let outcome = session.rescan_lines(&text, 9..=11).await;
        assert!(outcome.is_applied());

        let after = session.diagnostics();
        assert_eq!(after.len(), 2);
        assert_eq!(after[0], before[0]);
        assert_eq!(after[1], before[2]);
    }

    #[tokio::test]
    async fn test_local_scan_window_follows_edit() {
        let session = session();
        let text = lines_with_typos(&[1, 10, 20]);
        session.full_scan(&text).await;

        // Byte range of line 10.
        let index = LineIndex::new(&text);
        let start = index.offset(10, 1).unwrap();
        let mut edited = text.clone();
        edited.replace_range(start..start + 3, "the");

        session.local_scan(&edited, start..start + 3).await;
        let lines: Vec<_> = session.diagnostics().iter().map(|m| m.start_line).collect();
        assert_eq!(lines, vec![1, 20]);
    }

    #[tokio::test]
    async fn test_superseded_full_scan_is_discarded() {
        let session = session();
        let first = session.begin(ScanMode::Full);
        let second = session.begin(ScanMode::Full);
        assert_eq!(session.state(), SessionState::Scanning);

        let applied = session.apply(second, vec![spelling("newer", 2)]).await;
        assert!(applied.is_applied());

        let late = session.apply(first, vec![spelling("older", 1)]).await;
        assert_eq!(late, ScanOutcome::Discarded { generation: 1 });

        let words: Vec<_> = session.diagnostics().into_iter().map(|m| m.data.word).collect();
        assert_eq!(words, vec!["newer"]);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_requested_full_scan_invalidates_older_results() {
        let session = session();
        let local = session.begin(ScanMode::Local { lines: 1..=3 });
        let _full = session.begin(ScanMode::Full);

        let outcome = session.apply(local, vec![spelling("older", 1)]).await;
        assert!(!outcome.is_applied());
        assert!(session.diagnostics().is_empty());
    }

    #[tokio::test]
    async fn test_newer_local_request_supersedes_running_full_scan() {
        let session = session();
        let full = session.begin(ScanMode::Full);
        let local = session.begin(ScanMode::Local { lines: 5..=7 });

        let late = session.apply(full, vec![spelling("older", 1)]).await;
        assert_eq!(late, ScanOutcome::Discarded { generation: 1 });
        assert!(session.apply(local, vec![]).await.is_applied());
        assert!(session.diagnostics().is_empty());
    }

    #[tokio::test]
    async fn test_replace_during_full_scan_keeps_the_edit() {
        let session = session();
        let mut text = "teh cat is fine.\nsay the word.\nteh line.".to_string();
        session.full_scan(&text).await;

        // A full scan of the unedited text is still running when the fix lands.
        let running = session.begin(ScanMode::Full);
        let old_results: Vec<Issue> = session
            .diagnostics()
            .iter()
            .map(|m| spelling(&m.data.word, m.start_line))
            .collect();
        assert_eq!(old_results.len(), 2);

        let provider = ActionProvider::new(session.scope().clone());
        let caret = Position { line: 1, column: 1 };
        let actions = provider.actions(&session.diagnostics(), caret, caret);
        let fix = actions.iter().find(|a| a.preferred).unwrap();
        assert!(session.apply_action(fix, &mut text).await.unwrap().is_applied());
        assert_eq!(text, "the cat is fine.\nsay the word.\nteh line.");

        let late = session.apply(running, old_results).await;
        assert!(!late.is_applied());
        let starts: Vec<_> = session.diagnostics().iter().map(|m| m.start()).collect();
        assert_eq!(starts, vec![(3, 1)]);
    }

    #[tokio::test]
    async fn test_local_window_grows_to_cover_multiline_markers() {
        let session = session();
        let text = "say the\nthe word.\nfine line.\nfine line.";
        session.full_scan(text).await;
        let before = session.diagnostics();
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].code, "repeated-words");
        assert_eq!((before[0].start_line, before[0].end_line), (1, 2));

        let index = LineIndex::new(text);
        assert_eq!(session.settle_window(&index, 2..=2), 1..=2);
        assert_eq!(session.settle_window(&index, 3..=4), 3..=4);

        assert!(session.rescan_lines(text, 2..=3).await.is_applied());
        assert_eq!(session.diagnostics(), before);
    }

    #[tokio::test]
    async fn test_replace_action_fixes_text() {
        let session = session();
        let mut text = "Say teh word\nteh cat".to_string();
        session.full_scan(&text).await;

        let provider = ActionProvider::new(session.scope().clone());
        let markers = session.diagnostics();
        let caret = Position { line: 1, column: 6 };
        let actions = provider.actions(&markers, caret, caret);
        let fix = actions.iter().find(|a| a.preferred).unwrap();
        assert_eq!(fix.title, "Replace with \"the\"");

        let outcome = session.apply_action(fix, &mut text).await;
        assert!(outcome.unwrap().is_applied());
        assert_eq!(text, "Say the word\nteh cat");

        let remaining: Vec<_> = session.diagnostics().iter().map(|m| m.start()).collect();
        assert_eq!(remaining, vec![(2, 1)]);
    }

    #[tokio::test]
    async fn test_add_word_clears_every_occurrence() {
        let store = Arc::new(MemoryDictionaryStore::new());
        let session = session_with(store.clone());
        let mut text = "tokio is fine\nsay tokio".to_string();
        session.full_scan(&text).await;
        assert_eq!(session.diagnostics().len(), 2);

        let provider = ActionProvider::new(session.scope().clone());
        let markers = session.diagnostics();
        let caret = Position { line: 1, column: 2 };
        let add = provider
            .actions(&markers, caret, caret)
            .into_iter()
            .find(|a| matches!(a.fix, QuickFix::AddWord { .. }))
            .unwrap();

        let outcome = session.apply_action(&add, &mut text).await;
        assert!(outcome.unwrap().is_applied());
        assert!(session.diagnostics().is_empty());
        assert!(store.lookup(session.scope()).unwrap().contains("tokio"));
    }

    #[tokio::test]
    async fn test_failed_add_word_clears_without_rescan() {
        let session = session_with(Arc::new(FailingStore));
        let mut text = "tokio is fine".to_string();
        session.full_scan(&text).await;

        let add = CodeAction {
            title: "Add \"tokio\" to user dictionary".to_string(),
            fix: QuickFix::AddWord {
                word: "tokio".to_string(),
                target: DictionaryTarget::User,
            },
            preferred: false,
            diagnostics: session.diagnostics().iter().map(Marker::key).collect(),
        };

        assert_eq!(session.apply_action(&add, &mut text).await, None);
        assert!(session.diagnostics().is_empty());

        // The word was not learned: the next full scan flags it again.
        session.full_scan(&text).await;
        assert_eq!(session.diagnostics().len(), 1);
    }

    #[tokio::test]
    async fn test_line_removing_edit_shifts_markers_below() {
        let session = session();
        let mut text = "the\nthe cat\nline\nteh".to_string();
        session.full_scan(&text).await;
        let repeated = session
            .diagnostics()
            .into_iter()
            .find(|m| m.code == "repeated-words")
            .unwrap();
        assert_eq!(repeated.start(), (1, 1));

        let provider = ActionProvider::new(session.scope().clone());
        let caret = Position { line: 1, column: 1 };
        let actions = provider.actions(&[repeated], caret, caret);
        let fix = actions.iter().find(|a| a.preferred).unwrap();
        session.apply_action(fix, &mut text).await;

        assert_eq!(text, "the cat\nline\nteh");
        let starts: Vec<_> = session.diagnostics().iter().map(|m| m.start()).collect();
        assert_eq!(starts, vec![(3, 1)]);
    }
}
