//! Mock backend for testing
//!
//! Returns a canned response (or a canned failure) after an optional delay.
//! Useful for unit tests and development without a running model server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::AIBackend;

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    response: Option<String>,
    error: Option<String>,
    delay: Option<Duration>,
    model: String,
    calls: Arc<AtomicUsize>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy, answers `{}`)
    pub fn new() -> Self {
        Self {
            healthy: true,
            response: None,
            error: None,
            delay: None,
            model: "mock".to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Answer every prompt with this text
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    /// Fail every prompt with a remote error
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `generate` calls made so far (shared across clones)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn generate(&self, _prompt: &str, _system: Option<&str>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(ref message) = self.error {
            return Err(Error::Remote(message.clone()));
        }

        Ok(self.response.clone().unwrap_or_else(|| "{}".to_string()))
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_error() {
        let mock = MockBackend::new().with_error("boom");
        let err = mock.generate("p", None).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_unhealthy() {
        assert!(!MockBackend::unhealthy().health_check().await);
    }

    #[tokio::test]
    async fn test_call_count_shared_across_clones() {
        let mock = MockBackend::new();
        let clone = mock.clone();
        clone.generate("p", None).await.unwrap();
        assert_eq!(mock.call_count(), 1);
        assert_eq!(clone.call_count(), 1);
    }
}
