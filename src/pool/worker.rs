use crate::checker::dictionary::{Lexicon, LexiconSource};
use crate::checker::{self, CheckOptions};
use crate::error::PipelineError;
use crate::pool::protocol::{Completion, WorkerRequest, WorkerResponse};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// The scheduler's end of one worker thread.
pub(crate) struct WorkerHandle {
    pub id: usize,
    tasks: mpsc::Sender<WorkerRequest>,
}

impl WorkerHandle {
    /// Hand a request to the worker; gives it back if the worker is gone.
    pub fn send(&self, request: WorkerRequest) -> Result<(), WorkerRequest> {
        self.tasks.send(request).map_err(|e| e.0)
    }
}

pub(crate) fn spawn(
    id: usize,
    source: Arc<dyn LexiconSource>,
    options: Arc<CheckOptions>,
    results: UnboundedSender<Completion>,
) -> Result<WorkerHandle, PipelineError> {
    let (tasks, inbox) = mpsc::channel();

    thread::Builder::new()
        .name(format!("spellcheck-worker-{}", id))
        .spawn(move || {
            // Built on the worker thread: the lexicon never crosses threads.
            let worker = Worker {
                id,
                source,
                options,
                lexicon: None,
            };
            worker.run(inbox, results)
        })
        .map_err(|source| PipelineError::WorkerStartup { worker: id, source })?;

    Ok(WorkerHandle { id, tasks })
}

/// Thread-owned state. Nothing in here is reachable from another worker.
struct Worker {
    id: usize,
    source: Arc<dyn LexiconSource>,
    options: Arc<CheckOptions>,
    lexicon: Option<Box<dyn Lexicon>>,
}

impl Worker {
    fn run(mut self, inbox: mpsc::Receiver<WorkerRequest>, results: UnboundedSender<Completion>) {
        for request in inbox {
            let response = self.handle(request);
            let completion = Completion {
                worker: self.id,
                response,
            };
            if results.send(completion).is_err() {
                break;
            }
        }
        debug!(worker = self.id, "spellcheck worker stopped");
    }

    fn handle(&mut self, request: WorkerRequest) -> WorkerResponse {
        let WorkerRequest::CheckChunk {
            request_id,
            chunk,
            custom_words,
        } = request;

        let lexicon = match ensure_loaded(&mut self.lexicon, self.source.as_ref()) {
            Ok(lexicon) => lexicon,
            Err(e) => {
                return WorkerResponse::CheckChunkError {
                    request_id,
                    error: e.to_string(),
                }
            }
        };

        let options = self.options.as_ref();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            checker::check(&chunk, &custom_words, lexicon, options)
        }));

        match outcome {
            Ok(issues) => WorkerResponse::CheckChunkResult { request_id, issues },
            Err(payload) => {
                warn!(worker = self.id, offset = chunk.offset, "chunk check panicked");
                WorkerResponse::CheckChunkError {
                    request_id,
                    error: panic_message(payload.as_ref()),
                }
            }
        }
    }
}

/// Load the lexicon on first use and keep it for every later chunk.
fn ensure_loaded<'a>(
    slot: &'a mut Option<Box<dyn Lexicon>>,
    source: &dyn LexiconSource,
) -> Result<&'a dyn Lexicon, PipelineError> {
    let lexicon = match slot.take() {
        Some(lexicon) => lexicon,
        None => source
            .load()
            .map_err(|e| PipelineError::LexiconLoad(format!("{:#}", e)))?,
    };
    Ok(&**slot.insert(lexicon))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
