//! In-memory [`CompletionService`] that replays queued replies.
//!
//! Every request is recorded so tests can assert on the model chosen and
//! the prompt sent. When the queue runs dry the service answers with a
//! fatal error, which makes unexpected extra calls visible.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CompletionError, CompletionRequest, CompletionService};

/// Scripted completion service for tests and offline replays.
#[derive(Default)]
pub struct ScriptedService {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a service that answers with each reply in order.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let service = Self::new();
        for reply in replies {
            service.push_reply(reply);
        }
        service
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.queue().push_back(Ok(reply.into()));
    }

    pub fn push_failure(&self, error: CompletionError) {
        self.queue().push_back(Err(error));
    }

    /// Snapshot of every request received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn remaining(&self) -> usize {
        self.queue().len()
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String, CompletionError>>> {
        self.replies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        self.queue()
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::fatal("scripted service has no reply left")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{ContentPart, GenerationConfig};

    fn request(model: &str) -> CompletionRequest {
        CompletionRequest {
            model: model.to_string(),
            parts: vec![ContentPart::text("hi")],
            config: GenerationConfig::text(0.0, 10),
        }
    }

    #[tokio::test]
    async fn replays_in_order_then_fails() {
        let service = ScriptedService::with_replies(["one", "two"]);
        service.push_failure(CompletionError::rate_limited("slow down"));

        assert_eq!(service.complete(&request("a")).await.unwrap(), "one");
        assert_eq!(service.complete(&request("b")).await.unwrap(), "two");
        let err = service.complete(&request("c")).await.unwrap_err();
        assert_eq!(err.message, "slow down");
        let err = service.complete(&request("d")).await.unwrap_err();
        assert!(!err.is_retryable());

        let models: Vec<_> = service.requests().into_iter().map(|r| r.model).collect();
        assert_eq!(models, ["a", "b", "c", "d"]);
    }
}
