pub mod orders;
pub mod studies;
pub mod users;

use crate::error::ApiError;
use api_shared::{split_list, FeedQuery, HealthRes, HealthService};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Json, Response};
use documents::DocumentKind;
use radtrack_core::{FeedFilters, RenderedDocument, StudyStatus};
use radtrack_types::IsoDate;
use serde::Serialize;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks. Requires no credential.
pub async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!("response serialization failed: {}", e);
        ApiError::internal()
    })
}

pub(crate) fn document_kind(kind: Option<&str>) -> Result<DocumentKind, ApiError> {
    match kind.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
        None | Some("") | Some("standard") => Ok(DocumentKind::Standard),
        Some("own") | Some("propia") => Ok(DocumentKind::Own),
        Some(other) => Err(ApiError::bad_request(format!(
            "unknown document kind '{other}' (expected 'standard' or 'own')"
        ))),
    }
}

/// `Content-Disposition` for a download.
///
/// Names outside printable ASCII get an `_`-substituted `filename` for old clients plus an
/// RFC 5987 `filename*` carrying the exact UTF-8 name.
fn content_disposition(file_name: &str) -> Result<HeaderValue, ApiError> {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();
    let mut value = format!("attachment; filename=\"{fallback}\"");
    if fallback != file_name {
        value.push_str("; filename*=UTF-8''");
        for byte in file_name.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'!' | b'#' | b'$' | b'&' | b'+'
                | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~' => value.push(char::from(byte)),
                _ => value.push_str(&format!("%{byte:02X}")),
            }
        }
    }
    HeaderValue::from_str(&value).map_err(|e| {
        tracing::error!("content disposition for {:?} rejected: {}", file_name, e);
        ApiError::internal()
    })
}

pub(crate) fn pdf_response(document: RenderedDocument) -> Result<Response, ApiError> {
    let disposition = content_disposition(&document.file_name)?;
    Ok((
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (CONTENT_DISPOSITION, disposition),
        ],
        document.bytes,
    )
        .into_response())
}

pub(crate) fn feed_filters(query: FeedQuery) -> Result<FeedFilters, ApiError> {
    let statuses = split_list(query.status.as_deref())
        .iter()
        .map(|s| s.parse::<StudyStatus>())
        .collect::<Result<Vec<_>, _>>()?;
    let date = |value: Option<String>, name: &str| -> Result<_, ApiError> {
        value
            .filter(|v| !v.trim().is_empty())
            .map(|v| {
                IsoDate::parse(&v)
                    .map(|d| d.naive())
                    .map_err(|e| ApiError::bad_request(format!("'{name}': {e}")))
            })
            .transpose()
    };

    Ok(FeedFilters {
        search: query.search.filter(|s| !s.trim().is_empty()),
        modalities: split_list(query.modality.as_deref()),
        services: split_list(query.service.as_deref()),
        statuses,
        from: date(query.from, "from")?,
        to: date(query.to, "to")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn feed_query_becomes_filters() {
        let filters = feed_filters(FeedQuery {
            search: Some("perez".into()),
            modality: Some("RX,TAC".into()),
            service: Some("C. EXT".into()),
            status: Some("Pendiente, leído".into()),
            from: Some("2024-05-01".into()),
            to: None,
        })
        .unwrap();
        assert_eq!(filters.modalities, ["RX", "TAC"]);
        assert_eq!(filters.services, ["C. EXT"]);
        assert_eq!(filters.statuses, [StudyStatus::Pendiente, StudyStatus::Leido]);
        assert_eq!(filters.from.unwrap().to_string(), "2024-05-01");
        assert!(filters.to.is_none());
    }

    #[test]
    fn bad_feed_query_is_rejected() {
        let bad_status = FeedQuery {
            status: Some("Archivado".into()),
            ..FeedQuery::default()
        };
        assert_eq!(
            feed_filters(bad_status).unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );
        let bad_date = FeedQuery {
            to: Some("1/5/2024".into()),
            ..FeedQuery::default()
        };
        assert!(feed_filters(bad_date).is_err());
    }

    #[test]
    fn document_kinds() {
        assert_eq!(document_kind(None).unwrap(), DocumentKind::Standard);
        assert_eq!(document_kind(Some("OWN")).unwrap(), DocumentKind::Own);
        assert!(document_kind(Some("copy")).is_err());
    }

    #[test]
    fn plain_file_names_are_quoted_as_is() {
        assert_eq!(
            content_disposition("Autorizacion-123.pdf").unwrap(),
            "attachment; filename=\"Autorizacion-123.pdf\""
        );
    }

    #[test]
    fn non_ascii_file_names_get_an_encoded_variant() {
        assert_eq!(
            content_disposition("Autorizacion-propia-123ñ.pdf").unwrap(),
            "attachment; filename=\"Autorizacion-propia-123_.pdf\"; \
             filename*=UTF-8''Autorizacion-propia-123%C3%B1.pdf"
        );
        assert_eq!(
            content_disposition("Autorizacion-CC \"7\".pdf").unwrap(),
            "attachment; filename=\"Autorizacion-CC _7_.pdf\"; \
             filename*=UTF-8''Autorizacion-CC%20%227%22.pdf"
        );
    }
}
