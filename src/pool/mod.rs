pub mod protocol;
mod worker;

use crate::checker::dictionary::LexiconSource;
use crate::checker::{CheckOptions, CustomWords};
use crate::chunker::Chunk;
use crate::error::PipelineError;
use crate::Issue;
use protocol::{Completion, WorkerRequest, WorkerResponse};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use worker::WorkerHandle;

/// Upper bound on workers regardless of how many cores the machine has.
pub const HARD_WORKER_CAP: usize = 8;

/// Reported after every chunk completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    pub percent_complete: f64,
    /// Chunks completed so far.
    pub current_chunk: usize,
    pub total_chunks: usize,
}

/// Effective pool size: `min(requested, available cores, HARD_WORKER_CAP)`, at least 1.
pub fn pool_size(requested: usize) -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    requested.min(available).min(HARD_WORKER_CAP).max(1)
}

/// A fixed set of isolated checker threads fed from a FIFO task queue.
///
/// Scans on one pool run one at a time. A scan that has been superseded
/// still runs to completion; discarding its output is the caller's job.
pub struct WorkerPool {
    state: Mutex<PoolState>,
    size: usize,
}

struct PoolState {
    workers: Vec<WorkerHandle>,
    results: UnboundedReceiver<Completion>,
    next_request_id: u64,
}

/// Bookkeeping for a single `run_on_chunks` call.
struct ScanRun {
    idle: VecDeque<usize>,
    queue: VecDeque<(usize, Chunk)>,
    in_flight: HashMap<u64, usize>,
    results: Vec<Option<Vec<Issue>>>,
    completed: usize,
    total: usize,
}

impl ScanRun {
    fn new(chunks: Vec<Chunk>, workers: usize) -> Self {
        let total = chunks.len();
        Self {
            idle: (0..workers).collect(),
            queue: chunks.into_iter().enumerate().collect(),
            in_flight: HashMap::new(),
            results: vec![None; total],
            completed: 0,
            total,
        }
    }

    fn finish(
        &mut self,
        index: usize,
        issues: Vec<Issue>,
        on_progress: &mut impl FnMut(ScanProgress),
    ) {
        if self.results[index].replace(issues).is_some() {
            return;
        }
        self.completed += 1;
        on_progress(ScanProgress {
            percent_complete: self.completed as f64 / self.total as f64 * 100.0,
            current_chunk: self.completed,
            total_chunks: self.total,
        });
    }

    fn into_issues(self) -> Vec<Issue> {
        self.results.into_iter().flatten().flatten().collect()
    }
}

impl WorkerPool {
    /// Start `pool_size(requested)` workers. Workers that fail to start are
    /// logged and left out; with none at all the pool is disabled.
    pub fn new(
        requested: usize,
        source: Arc<dyn LexiconSource>,
        options: CheckOptions,
    ) -> Self {
        let size = pool_size(requested);
        let (tx, results) = mpsc::unbounded_channel();
        let options = Arc::new(options);

        let mut workers = Vec::with_capacity(size);
        for _ in 0..size {
            match worker::spawn(workers.len(), source.clone(), options.clone(), tx.clone()) {
                Ok(handle) => workers.push(handle),
                Err(e) => warn!(error = %e, "spellcheck worker unavailable"),
            }
        }

        if workers.is_empty() {
            warn!("no spellcheck worker could be started; spellchecking is disabled");
        } else {
            debug!(workers = workers.len(), requested, "spellcheck pool started");
        }

        Self::from_workers(workers, results)
    }

    /// A pool with no workers: every scan resolves to no issues.
    pub fn disabled() -> Self {
        let (_, results) = mpsc::unbounded_channel();
        Self::from_workers(Vec::new(), results)
    }

    fn from_workers(workers: Vec<WorkerHandle>, results: UnboundedReceiver<Completion>) -> Self {
        Self {
            size: workers.len(),
            state: Mutex::new(PoolState {
                workers,
                results,
                next_request_id: 0,
            }),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.size
    }

    pub fn is_enabled(&self) -> bool {
        self.size > 0
    }

    /// Check every chunk and return all issues in chunk order.
    ///
    /// Resolves once every chunk has a result; a chunk whose worker failed
    /// counts as issue-free. `on_progress` fires after each completion.
    pub async fn run_on_chunks<F>(
        &self,
        chunks: Vec<Chunk>,
        custom_words: CustomWords,
        mut on_progress: F,
    ) -> Vec<Issue>
    where
        F: FnMut(ScanProgress),
    {
        if chunks.is_empty() || !self.is_enabled() {
            return Vec::new();
        }

        let mut state = self.state.lock().await;
        let mut run = ScanRun::new(chunks, state.workers.len());
        debug!(chunks = run.total, workers = state.workers.len(), "scan started");

        state.dispatch(&mut run, &custom_words, &mut on_progress);
        while run.completed < run.total {
            let Some(completion) = state.results.recv().await else {
                warn!(
                    missing = run.total - run.completed,
                    "all spellcheck workers exited; remaining chunks skipped"
                );
                break;
            };

            let request_id = completion.response.request_id();
            let Some(index) = run.in_flight.remove(&request_id) else {
                debug!(request_id, "ignoring response for an unknown request");
                continue;
            };
            run.idle.push_back(completion.worker);

            let issues = match completion.response {
                WorkerResponse::CheckChunkResult { issues, .. } => issues,
                WorkerResponse::CheckChunkError { error, .. } => {
                    let e = PipelineError::ChunkCheck {
                        index,
                        reason: error,
                    };
                    warn!(worker = completion.worker, error = %e, "treating chunk as issue-free");
                    Vec::new()
                }
            };
            run.finish(index, issues, &mut on_progress);
            state.dispatch(&mut run, &custom_words, &mut on_progress);
        }

        debug!(chunks = run.total, "scan finished");
        run.into_issues()
    }
}

impl PoolState {
    /// Pair idle workers with queued chunks, oldest first.
    fn dispatch(
        &mut self,
        run: &mut ScanRun,
        custom_words: &CustomWords,
        on_progress: &mut impl FnMut(ScanProgress),
    ) {
        while !run.idle.is_empty() && !run.queue.is_empty() {
            let (Some(worker), Some((index, chunk))) = (run.idle.pop_front(), run.queue.pop_front())
            else {
                break;
            };

            let request_id = self.next_request_id;
            self.next_request_id += 1;

            let request = WorkerRequest::CheckChunk {
                request_id,
                chunk,
                custom_words: custom_words.clone(),
            };
            match self.workers[worker].send(request) {
                Ok(()) => {
                    run.in_flight.insert(request_id, index);
                }
                Err(_) => {
                    // The worker thread is gone; it is not returned to the idle list.
                    warn!(worker = self.workers[worker].id, index, "worker gone; chunk skipped");
                    run.finish(index, Vec::new(), on_progress);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::dictionary::{Dictionary, Lexicon};
    use crate::checker::grammar::RuleSet;
    use crate::chunker;
    use std::thread;
    use std::time::Duration;

    /// Knows "ok"; sleeps on "slow", panics on "boom".
    struct ScriptedLexicon;

    impl Lexicon for ScriptedLexicon {
        fn check(&self, word: &str) -> bool {
            match word {
                "slow" => {
                    thread::sleep(Duration::from_millis(150));
                    true
                }
                "boom" => panic!("lexicon exploded"),
                _ => word == "ok",
            }
        }

        fn suggest(&self, _word: &str, _max: usize) -> Vec<String> {
            vec!["ok".to_string()]
        }
    }

    fn scripted_pool(workers: usize) -> WorkerPool {
        let source = || -> anyhow::Result<Box<dyn Lexicon>> { Ok(Box::new(ScriptedLexicon)) };
        let options = CheckOptions {
            rules: RuleSet::none(),
            ..Default::default()
        };
        WorkerPool::new(workers, Arc::new(source), options)
    }

    fn chunk_at(text: &str, offset: usize) -> Chunk {
        Chunk {
            text: text.to_string(),
            offset,
            line: 1,
            column: offset + 1,
            skip_regions: Vec::new(),
        }
    }

    #[test]
    fn test_pool_size_bounds() {
        assert_eq!(pool_size(0), 1);
        assert_eq!(pool_size(1), 1);
        assert!(pool_size(1000) <= HARD_WORKER_CAP);
    }

    #[tokio::test]
    async fn test_results_keep_chunk_order() {
        let pool = scripted_pool(2);
        let chunks = vec![chunk_at("slow aa ", 0), chunk_at("bb ", 8), chunk_at("cc", 11)];

        let issues = pool
            .run_on_chunks(chunks, CustomWords::default(), |_| {})
            .await;

        let words: Vec<_> = issues.iter().map(|i| i.word.as_str()).collect();
        assert_eq!(words, vec!["aa", "bb", "cc"]);
    }

    #[tokio::test]
    async fn test_every_pool_size_completes() {
        let text = "aa ok bb ok cc ok dd ok ee ok ff ok gg";
        for workers in 1..=4 {
            let pool = scripted_pool(workers);
            let chunks = chunker::chunk(text, 6);
            let total = chunks.len();
            let mut updates = Vec::new();

            let issues = pool
                .run_on_chunks(chunks, CustomWords::default(), |p| updates.push(p))
                .await;

            assert_eq!(issues.len(), 7);
            assert_eq!(updates.len(), total);
            assert_eq!(updates.last().unwrap().percent_complete, 100.0);
            assert!(updates
                .windows(2)
                .all(|w| w[0].percent_complete <= w[1].percent_complete));
            let offsets: Vec<_> = issues.iter().map(|i| i.offset).collect();
            let mut sorted = offsets.clone();
            sorted.sort();
            assert_eq!(offsets, sorted);
        }
    }

    #[tokio::test]
    async fn test_panicking_chunk_counts_as_clean() {
        let pool = scripted_pool(2);
        let chunks = vec![chunk_at("aa boom ", 0), chunk_at("bb", 8)];
        let mut completed = 0;

        let issues = pool
            .run_on_chunks(chunks, CustomWords::default(), |p| completed = p.current_chunk)
            .await;

        assert_eq!(completed, 2);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].word, "bb");
    }

    #[tokio::test]
    async fn test_lexicon_load_failure_degrades() {
        let source = || -> anyhow::Result<Box<dyn Lexicon>> { anyhow::bail!("no dictionary") };
        let pool = WorkerPool::new(1, Arc::new(source), CheckOptions::default());

        let issues = pool
            .run_on_chunks(vec![chunk_at("zzz", 0)], CustomWords::default(), |_| {})
            .await;
        assert!(issues.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_pool_is_a_no_op() {
        let pool = WorkerPool::disabled();
        assert!(!pool.is_enabled());
        let issues = pool
            .run_on_chunks(vec![chunk_at("zzz", 0)], CustomWords::default(), |_| {})
            .await;
        assert!(issues.is_empty());
    }

    #[tokio::test]
    async fn test_custom_words_reach_workers() {
        let source = || -> anyhow::Result<Box<dyn Lexicon>> {
            Ok(Box::new(Dictionary::from_words(["the"])?))
        };
        let pool = WorkerPool::new(2, Arc::new(source), CheckOptions::default());
        let chunks = chunker::chunk("the tokio crate", 100);

        let issues = pool
            .run_on_chunks(chunks.clone(), CustomWords::default(), |_| {})
            .await;
        assert_eq!(issues.len(), 2);

        let issues = pool
            .run_on_chunks(chunks, CustomWords::new(["Tokio", "crate"]), |_| {})
            .await;
        assert!(issues.is_empty());
    }
}
