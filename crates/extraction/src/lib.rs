//! AI-assisted order extraction.
//!
//! Takes an order file (PDF or image), sends it together with a fixed extraction instruction
//! to a vision-capable model, and validates the model's structured reply into an
//! [`orders::ExtractedOrder`].
//!
//! The model sits behind the [`VisionModel`] trait. [`GeminiClient`] is the production
//! implementation; [`MockVisionModel`] is used by tests across the workspace.
//!
//! There is no retry and no caching: every call re-invokes the model, and a failed file must
//! be resubmitted by the caller.

mod client;
mod file;
mod gemini;
mod model;
pub mod prompt;

pub use client::{BatchExtraction, ExtractionClient, ExtractionOutcome, ExtractionSettings};
pub use file::{is_supported_mime, OrderFile};
pub use gemini::GeminiClient;
pub use model::{MockVisionModel, ModelRequest, VisionModel};

/// Errors that can occur while extracting an order from a file.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("unsupported media type '{0}': only PDF and image files are accepted")]
    UnsupportedMediaType(String),

    #[error("file is {size} bytes, above the {limit} byte limit")]
    FileTooLarge { size: usize, limit: usize },

    #[error("file is empty")]
    EmptyFile,

    #[error("invalid data URI: {0}")]
    InvalidDataUri(String),

    #[error("failed to read '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("model client configuration error: {0}")]
    Config(String),

    #[error("model call failed: {0}")]
    ModelCall(String),

    #[error("model returned HTTP {status}: {body}")]
    ModelStatus { status: u16, body: String },

    #[error("model call timed out after {0}s")]
    Timeout(u64),

    #[error("model response could not be parsed: {0}")]
    MalformedResponse(String),

    #[error("model output failed validation: {0}")]
    Validation(#[from] orders::ValidationError),
}

impl ExtractionError {
    /// True for errors raised before any remote call was made.
    ///
    /// These are rejections of the submitted file itself; everything else is an extraction
    /// failure that the caller may retry by resubmitting.
    pub fn is_input_rejection(&self) -> bool {
        matches!(
            self,
            ExtractionError::UnsupportedMediaType(_)
                | ExtractionError::FileTooLarge { .. }
                | ExtractionError::EmptyFile
                | ExtractionError::InvalidDataUri(_)
                | ExtractionError::FileRead { .. }
        )
    }
}

/// Type alias for Results that can fail with an [`ExtractionError`].
pub type ExtractionResult<T> = Result<T, ExtractionError>;
