use crate::error::ApiError;
use crate::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use radtrack_core::Caller;

/// The verified caller of a request.
///
/// Rejects with 401 when the bearer token is missing, malformed or unknown.
pub struct Authenticated(pub Caller);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let token = api_shared::auth::bearer_token(header)
            .map_err(|e| ApiError::unauthorized(e.to_string()))?;

        match state.ctx.credentials().verify_token(token).await {
            Ok(caller) => Ok(Self(caller)),
            Err(e) => {
                tracing::warn!(path = %parts.uri.path(), "rejected credential: {}", e);
                Err(ApiError::unauthorized("invalid credential"))
            }
        }
    }
}
