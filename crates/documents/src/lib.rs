//! Authorization document generation.
//!
//! An order is first laid out into pages of positioned drawing operations ([`layout`]), then
//! the pages are rendered to PDF bytes ([`render`]). The layout is a pure function of the
//! order and the document kind, so it is what tests compare against. Rendering only adds the
//! PDF container, whose timestamps come from [`DocumentOptions::generated_at`].

mod layout;
mod metrics;
mod render;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use layout::{layout, DrawOp, FontStyle, PageLayout, MARGIN, PAGE_HEIGHT, PAGE_WIDTH};
pub use metrics::text_width;
pub use render::render;

/// Errors raised while producing a PDF.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("PDF font error: {0}")]
    Font(String),

    #[error("PDF save error: {0}")]
    Save(String),

    #[error("invalid generation timestamp: {0}")]
    Timestamp(String),
}

/// Type alias for Results that can fail with a [`DocumentError`].
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Which authorization variant to produce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Authorization for the insurer.
    #[default]
    Standard,
    /// The institution's own authorization.
    Own,
}

impl DocumentKind {
    pub fn title(self) -> &'static str {
        match self {
            DocumentKind::Standard => "AUTORIZACIÓN DE SERVICIOS DE SALUD",
            DocumentKind::Own => "AUTORIZACIÓN PROPIA DE SERVICIOS DE SALUD",
        }
    }

    /// Download file name, `Autorizacion-<patientId>.pdf` or `Autorizacion-propia-<patientId>.pdf`.
    pub fn file_name(self, patient_id: &str) -> String {
        match self {
            DocumentKind::Standard => format!("Autorizacion-{patient_id}.pdf"),
            DocumentKind::Own => format!("Autorizacion-propia-{patient_id}.pdf"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentOptions {
    pub kind: DocumentKind,
    /// Embedded as the PDF creation date. The Unix epoch is used when absent.
    pub generated_at: Option<DateTime<Utc>>,
}
