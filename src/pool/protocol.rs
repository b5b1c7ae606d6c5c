//! Messages exchanged between the scheduler and its workers.
//!
//! Workers run in-process, so these travel over channels as plain values, but
//! the shapes serialize to the JSON protocol used by out-of-process workers.

use crate::checker::CustomWords;
use crate::chunker::Chunk;
use crate::Issue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerRequest {
    #[serde(rename_all = "camelCase")]
    CheckChunk {
        request_id: u64,
        chunk: Chunk,
        custom_words: CustomWords,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerResponse {
    #[serde(rename_all = "camelCase")]
    CheckChunkResult { request_id: u64, issues: Vec<Issue> },
    #[serde(rename_all = "camelCase")]
    CheckChunkError { request_id: u64, error: String },
}

impl WorkerResponse {
    pub fn request_id(&self) -> u64 {
        match self {
            WorkerResponse::CheckChunkResult { request_id, .. }
            | WorkerResponse::CheckChunkError { request_id, .. } => *request_id,
        }
    }
}

/// A response tagged with the worker that produced it.
#[derive(Debug)]
pub(crate) struct Completion {
    pub worker: usize,
    pub response: WorkerResponse,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = WorkerRequest::CheckChunk {
            request_id: 7,
            chunk: Chunk {
                text: "teh".to_string(),
                offset: 10,
                line: 2,
                column: 1,
                skip_regions: vec![],
            },
            custom_words: CustomWords::new(["rust"]),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "checkChunk");
        assert_eq!(value["requestId"], 7);
        assert_eq!(value["chunk"]["offset"], 10);
        assert_eq!(value["customWords"], json!(["rust"]));
    }

    #[test]
    fn test_error_response_parses() {
        let response: WorkerResponse = serde_json::from_value(json!({
            "type": "checkChunkError",
            "requestId": 3,
            "error": "boom",
        }))
        .unwrap();
        assert_eq!(response.request_id(), 3);
    }
}
