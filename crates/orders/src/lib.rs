//! Medical imaging order schema and validation.
//!
//! This crate owns the structured shape of an imaging order as it comes back from the
//! extraction model or from the manual entry form:
//! - domain types ([`ExtractedOrder`] and its sections)
//! - the field table that drives the extraction prompt and the model response schema
//! - all-or-nothing validation of untyped input into the domain types
//!
//! It has no I/O and no knowledge of persistence; the ingestion layer copies the validated
//! sections into a tracked study.

pub mod fields;
pub mod order;
mod wire;

pub use fields::{fields_of, FieldKind, OrderField, Section, ORDER_FIELDS, STUDIES_DESCRIPTION};
pub use order::{Diagnosis, ExtractedOrder, OrderInfo, OrderPatient, Physician, RequestedStudy};

/// Reasons an order submission is rejected.
///
/// Each variant names the first field that violated the schema, using dotted paths with
/// sequence indices (`patient.birthDate`, `studies[0].cups`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("input is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("missing required field `{field}`")]
    MissingField { field: String },

    #[error("field `{field}` has the wrong type: {message}")]
    WrongType { field: String, message: String },

    #[error("field `{field}` must be a YYYY-MM-DD date, got '{value}'")]
    MalformedDate { field: String, value: String },

    #[error("`studies` must contain at least one requested study")]
    NoStudies,
}

impl ValidationError {
    /// The dotted path of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::MalformedJson(_) => "<root>",
            ValidationError::MissingField { field }
            | ValidationError::WrongType { field, .. }
            | ValidationError::MalformedDate { field, .. } => field,
            ValidationError::NoStudies => "studies",
        }
    }
}

/// Type alias for Results that can fail with a [`ValidationError`].
pub type ValidationResult<T> = Result<T, ValidationError>;
