//! Reasoning service seam
//!
//! Routing, synthesis and SQL generation all go through one narrow
//! `complete(prompt)` call. Any failure surfaces as
//! `ReasoningServiceUnavailable` and is handled by the calling stage.

use crate::error::CoordinatorError;
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Scripted reasoner for development & testing
///
/// Replies from a queue in order and records every prompt it receives.
/// An exhausted queue behaves like an unreachable service.
pub struct ScriptedReasoner {
    responses: Mutex<VecDeque<std::result::Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedReasoner {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A reasoner whose every call fails
    pub fn unavailable() -> Self {
        Self::new(Vec::<String>::new())
    }

    pub fn push_response(&self, response: impl Into<String>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Ok(response.into()));
        }
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Err(message.into()));
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoner {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let next = self
            .responses
            .lock()
            .map_err(|_| {
                CoordinatorError::ReasoningServiceUnavailable("scripted reasoner poisoned".into())
            })?
            .pop_front();

        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(CoordinatorError::ReasoningServiceUnavailable(message)),
            None => Err(CoordinatorError::ReasoningServiceUnavailable(
                "no scripted response left".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_reasoner_order_and_exhaustion() {
        let reasoner = ScriptedReasoner::new(["first"]);
        reasoner.push_failure("boom");

        tokio_test::block_on(async {
            assert_eq!(reasoner.complete("a").await.unwrap(), "first");
            assert!(matches!(
                reasoner.complete("b").await,
                Err(CoordinatorError::ReasoningServiceUnavailable(m)) if m == "boom"
            ));
            assert!(reasoner.complete("c").await.is_err());
        });

        assert_eq!(reasoner.call_count(), 3);
        assert_eq!(reasoner.prompts(), vec!["a", "b", "c"]);
    }
}
