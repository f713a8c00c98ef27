//! Validated imaging order domain types.
//!
//! These are the only order types the rest of the system handles. They are produced from
//! untyped input by [`ExtractedOrder::from_value`] and serialise back to the same camelCase
//! shape, which is also the persisted shape of the order sections of a tracked study.

use crate::wire::OrderWire;
use crate::{ValidationError, ValidationResult};
use radtrack_types::{IsoDate, NonEmptyText};
use serde::{Deserialize, Serialize};

/// Patient block of an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatient {
    /// Identity document number.
    pub id: NonEmptyText,
    pub full_name: NonEmptyText,
    pub birth_date: IsoDate,
    pub sex: NonEmptyText,
    /// Insurer / health administrator.
    pub entidad: NonEmptyText,
}

/// One requested imaging procedure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedStudy {
    /// CUPS procedure code.
    pub cups: NonEmptyText,
    pub nombre: NonEmptyText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<NonEmptyText>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    /// CIE-10 code.
    pub code: NonEmptyText,
    pub description: NonEmptyText,
}

/// Ordering physician.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Physician {
    pub full_name: NonEmptyText,
    pub registry_number: NonEmptyText,
    pub specialty: NonEmptyText,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInfo {
    pub date: IsoDate,
    pub institution_name: NonEmptyText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admission_number: Option<NonEmptyText>,
}

/// A complete, validated imaging order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedOrder {
    pub patient: OrderPatient,
    /// Never empty once validated. Only the first entry drives modality and summaries.
    pub studies: Vec<RequestedStudy>,
    pub diagnosis: Diagnosis,
    pub physician: Physician,
    pub order: OrderInfo,
}

impl ExtractedOrder {
    /// Validates an untyped nested mapping into an order.
    ///
    /// Validation is all-or-nothing: the first violated constraint is returned and nothing
    /// partial is produced. Type mismatches are detected while reading the structure, before
    /// required-field and date checks, which then run in field-table order. Keys that are not
    /// part of the schema are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] naming the offending field.
    pub fn from_value(value: serde_json::Value) -> ValidationResult<Self> {
        // serde accepts sequences for structs; an order is only ever an object
        if !value.is_object() {
            return Err(ValidationError::WrongType {
                field: "<root>".into(),
                message: "expected an object".into(),
            });
        }

        let wire = match serde_path_to_error::deserialize::<_, OrderWire>(value) {
            Ok(wire) => wire,
            Err(err) => {
                let path = err.path().to_string();
                let field = if path.is_empty() || path == "." {
                    "<root>".to_string()
                } else {
                    path
                };
                return Err(ValidationError::WrongType {
                    field,
                    message: err.into_inner().to_string(),
                });
            }
        };

        wire.into_domain()
    }

    /// Validates JSON text into an order.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedJson`] if the text is not JSON, otherwise as
    /// [`ExtractedOrder::from_value`].
    pub fn from_json_str(text: &str) -> ValidationResult<Self> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| ValidationError::MalformedJson(e.to_string()))?;
        Self::from_value(value)
    }

    /// The study that drives modality derivation and summary display.
    pub fn primary_study(&self) -> Option<&RequestedStudy> {
        self.studies.first()
    }
}
