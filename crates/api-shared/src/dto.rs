//! Request and response bodies of the REST API.
//!
//! Order payloads and stored records are carried as JSON objects; their shapes are the
//! camelCase documents described by the order schema (`patient`, `studies`, `diagnosis`,
//! `physician`, `order`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Error body returned by every failing endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
    /// Failing field path for validation errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// One uploaded order file, as a `data:<mime>;base64,<payload>` URI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractFile {
    pub file_name: String,
    pub data_uri: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExtractOrdersReq {
    pub files: Vec<ExtractFile>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFileRes {
    pub file_name: String,
    #[schema(value_type = Option<Object>)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractOrdersRes {
    pub results: Vec<ExtractedFileRes>,
    pub success_count: usize,
    pub error_count: usize,
}

/// Order data keyed in by hand, or returned by extraction and corrected by the user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderReq {
    #[schema(value_type = Object)]
    pub order: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderRes {
    /// The validated, normalized order.
    #[schema(value_type = Object)]
    pub order: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudyReq {
    #[schema(value_type = Object)]
    pub order: Value,
    /// Service area; the configured default is used when absent.
    #[serde(default)]
    pub service: Option<String>,
    /// Whether an authorization document was produced for this order before submitting.
    #[serde(default)]
    pub document_generated: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreateStudyRes {
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BatchStudiesReq {
    pub items: Vec<CreateStudyReq>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BatchItemRes {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchStudiesRes {
    pub results: Vec<BatchItemRes>,
    pub success_count: usize,
    pub error_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EditStudyReq {
    #[schema(value_type = Object)]
    pub order: Value,
    #[serde(default)]
    pub service: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusChangeReq {
    /// `Pendiente`, `Completado`, `Leído` or `Cancelado`.
    pub status: String,
    /// Required when cancelling, rejected otherwise.
    #[serde(default)]
    pub reason: Option<String>,
}

/// A stored study record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct StudyDocument(#[schema(value_type = Object)] pub Value);

/// Filtered feed, pending summaries and unfiltered total.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct FeedDocument(#[schema(value_type = Object)] pub Value);

/// A staff profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ProfileDocument(#[schema(value_type = Object)] pub Value);

/// Feed filters. List parameters are comma separated; an empty list matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FeedQuery {
    /// Case-insensitive substring of patient name or id.
    pub search: Option<String>,
    /// e.g. `RX,TAC`
    pub modality: Option<String>,
    /// e.g. `URG,C. EXT`
    pub service: Option<String>,
    /// e.g. `Pendiente,Leído`
    pub status: Option<String>,
    /// Inclusive `YYYY-MM-DD` lower bound on the request date.
    pub from: Option<String>,
    /// Inclusive `YYYY-MM-DD` upper bound on the request date.
    pub to: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DocumentQuery {
    /// `standard` (default) or `own`.
    pub kind: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileReq {
    pub nombre: Option<String>,
    pub rol: Option<String>,
    pub servicio_asignado: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoleAssignmentReq {
    pub email: Option<String>,
    pub role: Option<String>,
    pub service: Option<String>,
    pub area: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoleAssignmentRes {
    pub message: String,
}

/// Splits a comma separated query value into trimmed, non-empty items.
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_drops_blanks() {
        assert_eq!(split_list(Some("RX, TAC,,")), vec!["RX", "TAC"]);
        assert_eq!(split_list(Some("C. EXT")), vec!["C. EXT"]);
        assert!(split_list(None).is_empty());
    }

    #[test]
    fn create_study_defaults() {
        let req: CreateStudyReq = serde_json::from_str(r#"{"order": {}}"#).unwrap();
        assert!(req.service.is_none());
        assert!(!req.document_generated);
    }
}
