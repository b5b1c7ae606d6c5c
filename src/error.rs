use thiserror::Error;

/// Failures the checking pipeline recovers from on its own.
///
/// None of these ever reach the host editor: they are logged and the
/// pipeline degrades (fewer workers, an issue-free chunk, an unlearned word).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to start spellcheck worker {worker}: {source}")]
    WorkerStartup {
        worker: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("check of chunk {index} failed: {reason}")]
    ChunkCheck { index: usize, reason: String },

    #[error("failed to load base lexicon: {0}")]
    LexiconLoad(String),

    #[error("failed to persist \"{word}\" to the {target}: {reason}")]
    DictionaryPersist {
        word: String,
        target: String,
        reason: String,
    },
}
