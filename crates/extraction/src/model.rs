use crate::{ExtractionError, ExtractionResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One structured-output request to a vision model.
#[derive(Clone, Debug)]
pub struct ModelRequest {
    pub instruction: String,
    pub mime_type: String,
    /// Base64-encoded file content.
    pub data: String,
    /// Schema the output is constrained to.
    pub response_schema: serde_json::Value,
}

/// A vision-capable model that turns a file plus an instruction into JSON text.
///
/// The output is best effort: it is validated by the caller, never trusted.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn generate_structured(&self, request: &ModelRequest) -> ExtractionResult<String>;
}

type Responder = dyn Fn(&ModelRequest) -> ExtractionResult<String> + Send + Sync;

/// Mock model for testing. Answers every request through a closure and counts calls.
#[derive(Clone)]
pub struct MockVisionModel {
    responder: Arc<Responder>,
    calls: Arc<AtomicUsize>,
}

impl MockVisionModel {
    /// Always answers with `response`.
    pub fn new(response: &str) -> Self {
        let response = response.to_string();
        Self::from_fn(move |_| Ok(response.clone()))
    }

    /// Always fails with a model call error.
    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::from_fn(move |_| Err(ExtractionError::ModelCall(message.clone())))
    }

    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&ModelRequest) -> ExtractionResult<String> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of requests received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionModel for MockVisionModel {
    async fn generate_structured(&self, request: &ModelRequest) -> ExtractionResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.responder)(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ModelRequest {
        ModelRequest {
            instruction: "extract".into(),
            mime_type: "application/pdf".into(),
            data: "JVBERi0=".into(),
            response_schema: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn mock_returns_configured_response_and_counts_calls() {
        let model = MockVisionModel::new("{}");
        assert_eq!(model.generate_structured(&request()).await.unwrap(), "{}");
        assert_eq!(model.generate_structured(&request()).await.unwrap(), "{}");
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn failing_mock_reports_model_call_error() {
        let model = MockVisionModel::failing("quota exceeded");
        assert!(matches!(
            model.generate_structured(&request()).await,
            Err(ExtractionError::ModelCall(msg)) if msg == "quota exceeded"
        ));
    }
}
