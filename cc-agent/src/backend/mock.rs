//! Mock LLM backend for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::traits::*;

/// Mock backend for testing.
///
/// Replies are scripted: queued replies are served in order and the last one
/// repeats. A reply may be a failure, and every call can be delayed to
/// exercise timeouts. Prompts are recorded for inspection.
pub struct MockBackend {
    model_id: String,
    available: AtomicBool,
    replies: Mutex<VecDeque<MockReply>>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
    call_count: AtomicU32,
}

#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Fail(String),
}

impl MockBackend {
    /// Create a new mock backend.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            available: AtomicBool::new(true),
            replies: Mutex::new(VecDeque::from([MockReply::Text("Mock response".to_string())])),
            delay: None,
            prompts: Mutex::new(Vec::new()),
            call_count: AtomicU32::new(0),
        }
    }

    /// Always reply with this content.
    pub fn with_response(self, content: impl Into<String>) -> Self {
        self.script(vec![MockReply::Text(content.into())])
    }

    /// Reply with these contents in order, repeating the last.
    pub fn with_responses<I, S>(self, contents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script(contents.into_iter().map(|c| MockReply::Text(c.into())).collect())
    }

    /// Fail every call with a request error.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.script(vec![MockReply::Fail(message.into())])
    }

    /// Delay every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set availability.
    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    fn script(self, replies: Vec<MockReply>) -> Self {
        if !replies.is_empty() {
            if let Ok(mut queue) = self.replies.lock() {
                *queue = replies.into();
            }
        }
        self
    }

    /// Get the number of times complete was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Prompts received so far, flattened.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// The most recent prompt, if any.
    pub fn last_prompt(&self) -> Option<String> {
        self.prompts().pop()
    }

    fn next_reply(&self) -> MockReply {
        let Ok(mut queue) = self.replies.lock() else {
            return MockReply::Fail("Mock backend poisoned".to_string());
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap_or(MockReply::Text(String::new()))
        } else {
            queue.front().cloned().unwrap_or(MockReply::Text(String::new()))
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new("mock-model")
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let prompt = request.flattened_prompt();
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if !self.available.load(Ordering::SeqCst) {
            return Err(LlmError::Unavailable("Mock backend disabled".to_string()));
        }

        let content = match self.next_reply() {
            MockReply::Text(content) => content,
            MockReply::Fail(message) => return Err(LlmError::RequestFailed(message)),
        };

        // Estimate token counts
        let prompt_tokens = prompt.len() as u32 / 4;
        let completion_tokens = content.len() as u32 / 4;

        Ok(CompletionResponse {
            content,
            finish_reason: FinishReason::Stop,
            usage: Usage {
                prompt_tokens,
                completion_tokens,
            },
        })
    }
}
