use api_shared::ErrorRes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use extraction::ExtractionError;
use orders::ValidationError;
use radtrack_core::{CredentialError, StudyError};

/// An error body plus the status it is sent with.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    field: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            field: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorRes {
            error: self.message,
            field: self.field,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            field: Some(e.field().to_string()),
            message: e.to_string(),
        }
    }
}

impl From<ExtractionError> for ApiError {
    fn from(e: ExtractionError) -> Self {
        if e.is_input_rejection() {
            return Self::bad_request(e.to_string());
        }
        tracing::error!("extraction error: {}", e);
        Self::new(StatusCode::BAD_GATEWAY, e.to_string())
    }
}

impl From<CredentialError> for ApiError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::InvalidToken => Self::unauthorized(e.to_string()),
            CredentialError::UserNotFound(_) | CredentialError::UnknownUid(_) => {
                Self::new(StatusCode::NOT_FOUND, e.to_string())
            }
            CredentialError::FileRead { .. } | CredentialError::InvalidSeed(_) => {
                tracing::error!("credential provider error: {}", e);
                Self::internal()
            }
        }
    }
}

impl From<StudyError> for ApiError {
    fn from(e: StudyError) -> Self {
        match e {
            StudyError::Validation(v) => v.into(),
            StudyError::Credential(c) => c.into(),
            StudyError::Extraction(x) => x.into(),
            StudyError::InvalidInput(_)
            | StudyError::InvalidId(_)
            | StudyError::MissingCancellationReason
            | StudyError::UnknownCancellationReason(_)
            | StudyError::ServiceNotAllowed { .. } => Self::bad_request(e.to_string()),
            StudyError::PermissionDenied => Self::new(StatusCode::FORBIDDEN, "Permission denied"),
            StudyError::NotFound(_) | StudyError::ProfileNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, e.to_string())
            }
            StudyError::IllegalTransition { .. } | StudyError::ProfileExists(_) => {
                Self::new(StatusCode::CONFLICT, e.to_string())
            }
            StudyError::ProfileProjectionFailed { .. } => {
                tracing::error!("{}", e);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            StudyError::Store(_) | StudyError::Document(_) => {
                tracing::error!("{}", e);
                Self::internal()
            }
        }
    }
}
