use crate::file::OrderFile;
use crate::model::{ModelRequest, VisionModel};
use crate::prompt;
use crate::{ExtractionError, ExtractionResult};
use futures_util::future::join_all;
use orders::{ExtractedOrder, ValidationError};
use std::borrow::Borrow;
use std::sync::Arc;
use std::time::Duration;

/// Limits applied to every extraction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionSettings {
    pub max_upload_bytes: usize,
    pub timeout: Duration,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Result of extracting one file of a batch.
#[derive(Debug)]
pub struct ExtractionOutcome {
    pub file_name: String,
    pub result: ExtractionResult<ExtractedOrder>,
}

/// Per-file results of a batch, in submission order.
#[derive(Debug, Default)]
pub struct BatchExtraction {
    pub outcomes: Vec<ExtractionOutcome>,
}

impl BatchExtraction {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn error_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }
}

/// Turns order files into validated orders through a vision model.
#[derive(Clone)]
pub struct ExtractionClient {
    model: Arc<dyn VisionModel>,
    settings: ExtractionSettings,
    instruction: Arc<str>,
    schema: Arc<serde_json::Value>,
}

impl ExtractionClient {
    pub fn new(model: Arc<dyn VisionModel>, settings: ExtractionSettings) -> Self {
        Self {
            model,
            settings,
            instruction: prompt::instruction().into(),
            schema: Arc::new(prompt::response_schema()),
        }
    }

    pub fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    /// Extracts and validates one order.
    ///
    /// Unsupported, empty and oversized files are rejected before the model is called. The
    /// model call is bounded by the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an input rejection (see [`ExtractionError::is_input_rejection`]) or an
    /// extraction failure. Nothing is retried.
    pub async fn extract(&self, file: &OrderFile) -> ExtractionResult<ExtractedOrder> {
        file.check(self.settings.max_upload_bytes)?;

        let request = ModelRequest {
            instruction: self.instruction.to_string(),
            mime_type: file.mime_type.clone(),
            data: file.base64(),
            response_schema: (*self.schema).clone(),
        };

        tracing::info!(
            file = %file.file_name,
            mime = %file.mime_type,
            bytes = file.bytes.len(),
            "extracting order"
        );

        let text = tokio::time::timeout(
            self.settings.timeout,
            self.model.generate_structured(&request),
        )
        .await
        .map_err(|_| ExtractionError::Timeout(self.settings.timeout.as_secs()))??;

        parse_model_output(&text)
    }

    /// Extracts every file concurrently. One failure never affects the other files.
    pub async fn extract_batch(&self, files: &[OrderFile]) -> BatchExtraction {
        self.run_batch(files.iter().map(|file| (file.file_name.clone(), Ok(file))))
            .await
    }

    /// Extracts a batch whose files the caller decoded or read itself.
    ///
    /// A file that failed to load is reported as its own failed outcome, in position, and
    /// the model is never called for it. The other files are extracted as in
    /// [`Self::extract_batch`].
    pub async fn extract_loaded(
        &self,
        files: Vec<(String, ExtractionResult<OrderFile>)>,
    ) -> BatchExtraction {
        self.run_batch(files).await
    }

    async fn run_batch<F>(
        &self,
        files: impl IntoIterator<Item = (String, ExtractionResult<F>)>,
    ) -> BatchExtraction
    where
        F: Borrow<OrderFile>,
    {
        let outcomes = join_all(files.into_iter().map(|(file_name, file)| async move {
            let result = match file {
                Ok(file) => self.extract(file.borrow()).await,
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                tracing::error!(file = %file_name, "extraction failed: {}", e);
            }
            ExtractionOutcome { file_name, result }
        }))
        .await;

        let batch = BatchExtraction { outcomes };
        tracing::info!(
            succeeded = batch.success_count(),
            failed = batch.error_count(),
            "batch extraction finished"
        );
        batch
    }
}

/// Validates model text, tolerating a surrounding Markdown code fence.
fn parse_model_output(text: &str) -> ExtractionResult<ExtractedOrder> {
    ExtractedOrder::from_json_str(strip_code_fence(text)).map_err(|e| match e {
        ValidationError::MalformedJson(msg) => ExtractionError::MalformedResponse(msg),
        other => ExtractionError::Validation(other),
    })
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string (e.g. `json`) on the opening line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().trim_end_matches("```").trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MockVisionModel;
    use serde_json::json;

    fn order_json() -> String {
        json!({
            "patient": {
                "id": "123",
                "fullName": "JUAN PEREZ",
                "birthDate": "1980-06-15",
                "sex": "M",
                "entidad": "NUEVA EPS"
            },
            "studies": [{ "cups": "871121", "nombre": "RX DE TORAX" }],
            "diagnosis": { "code": "R05X", "description": "TOS" },
            "physician": {
                "fullName": "ANA GOMEZ",
                "registryNumber": "RM-5521",
                "specialty": "MEDICINA GENERAL"
            },
            "order": { "date": "2024-05-02", "institutionName": "HOSPITAL SAN JOSE" }
        })
        .to_string()
    }

    fn pdf(name: &str) -> OrderFile {
        OrderFile::new(name, "application/pdf", b"%PDF-1.4".to_vec())
    }

    fn client(model: MockVisionModel) -> ExtractionClient {
        ExtractionClient::new(Arc::new(model), ExtractionSettings::default())
    }

    #[tokio::test]
    async fn extracts_valid_order() {
        let model = MockVisionModel::new(&order_json());
        let order = client(model.clone()).extract(&pdf("orden.pdf")).await.unwrap();
        assert_eq!(order.patient.id.as_str(), "123");
        assert_eq!(order.studies[0].nombre.as_str(), "RX DE TORAX");
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn request_carries_instruction_and_file() {
        let model = MockVisionModel::from_fn(|req| {
            assert!(req.instruction.contains("**patient.fullName**"));
            assert_eq!(req.mime_type, "application/pdf");
            assert_eq!(req.data, "JVBERi0xLjQ=");
            assert_eq!(req.response_schema["type"], "OBJECT");
            Ok(order_json())
        });
        client(model).extract(&pdf("orden.pdf")).await.unwrap();
    }

    #[tokio::test]
    async fn unsupported_type_never_reaches_the_model() {
        let model = MockVisionModel::new(&order_json());
        let file = OrderFile::new("orden.docx", "application/msword", b"PK".to_vec());
        let err = client(model.clone()).extract(&file).await.unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedMediaType(_)));
        assert!(err.is_input_rejection());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn fenced_output_is_unwrapped() {
        let fenced = format!("```json\n{}\n```", order_json());
        let order = client(MockVisionModel::new(&fenced))
            .extract(&pdf("orden.pdf"))
            .await
            .unwrap();
        assert_eq!(order.patient.full_name.as_str(), "JUAN PEREZ");
    }

    #[tokio::test]
    async fn unparsable_output_is_an_extraction_failure() {
        let err = client(MockVisionModel::new("Lo siento, no puedo leer la orden."))
            .extract(&pdf("orden.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedResponse(_)));
        assert!(!err.is_input_rejection());
    }

    #[tokio::test]
    async fn invalid_output_names_the_field() {
        let mut value: serde_json::Value = serde_json::from_str(&order_json()).unwrap();
        value["order"]["date"] = json!("mayo 2 de 2024");
        let err = client(MockVisionModel::new(&value.to_string()))
            .extract(&pdf("orden.pdf"))
            .await
            .unwrap_err();
        match err {
            ExtractionError::Validation(v) => assert_eq!(v.field(), "order.date"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_model_times_out() {
        struct Slow;

        #[async_trait::async_trait]
        impl VisionModel for Slow {
            async fn generate_structured(&self, _: &ModelRequest) -> ExtractionResult<String> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(String::new())
            }
        }

        let client = ExtractionClient::new(
            Arc::new(Slow),
            ExtractionSettings {
                timeout: Duration::from_millis(20),
                ..ExtractionSettings::default()
            },
        );
        assert!(matches!(
            client.extract(&pdf("orden.pdf")).await,
            Err(ExtractionError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn batch_isolates_failures() {
        let model = MockVisionModel::from_fn(|req| {
            if req.mime_type == "image/png" {
                Err(ExtractionError::ModelCall("quota exceeded".into()))
            } else {
                Ok(order_json())
            }
        });
        let files = vec![
            pdf("a.pdf"),
            OrderFile::new("b.png", "image/png", vec![1, 2, 3]),
            OrderFile::new("c.txt", "text/plain", b"hola".to_vec()),
            pdf("d.pdf"),
        ];

        let batch = client(model.clone()).extract_batch(&files).await;
        assert_eq!(batch.success_count(), 2);
        assert_eq!(batch.error_count(), 2);
        let names: Vec<_> = batch.outcomes.iter().map(|o| o.file_name.as_str()).collect();
        assert_eq!(names, ["a.pdf", "b.png", "c.txt", "d.pdf"]);
        assert!(batch.outcomes[1].result.is_err());
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn files_that_failed_to_load_keep_their_place() {
        let model = MockVisionModel::new(&order_json());
        let files = vec![
            ("a.pdf".to_string(), Ok(pdf("a.pdf"))),
            (
                "b.pdf".to_string(),
                OrderFile::from_data_uri("b.pdf", "data:application/pdf;base64,%%%"),
            ),
            (
                "c.pdf".to_string(),
                OrderFile::from_path(std::path::Path::new("/nonexistent/c.pdf")),
            ),
            ("d.pdf".to_string(), Ok(pdf("d.pdf"))),
        ];

        let batch = client(model.clone()).extract_loaded(files).await;
        let names: Vec<_> = batch.outcomes.iter().map(|o| o.file_name.as_str()).collect();
        assert_eq!(names, ["a.pdf", "b.pdf", "c.pdf", "d.pdf"]);
        assert!(matches!(
            batch.outcomes[1].result,
            Err(ExtractionError::InvalidDataUri(_))
        ));
        assert!(matches!(
            batch.outcomes[2].result,
            Err(ExtractionError::FileRead { .. })
        ));
        assert_eq!(batch.success_count(), 2);
        assert_eq!(model.calls(), 2);
    }

    #[test]
    fn strip_code_fence_variants() {
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}```"), "{\"a\":1}");
    }
}
