//! # API REST
//!
//! REST API implementation for RadTrack.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - Bearer-token authentication against the configured credential provider
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, status codes, CORS, server-sent events)
//!
//! Uses `api-shared` for wire types and `radtrack-core` for all behaviour.

#![warn(rust_2018_idioms)]

pub mod auth;
pub mod error;
pub mod handlers;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use radtrack_core::constants::MAX_REQUEST_FILES;
use radtrack_core::AppContext;
use tower_http::cors::CorsLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use handlers::{orders, studies, users};

/// Application state for the REST API server
///
/// Holds the process context; services are built from it per request.
#[derive(Clone)]
pub struct AppState {
    pub ctx: AppContext,
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        orders::extract_orders,
        orders::validate_order,
        orders::order_authorization,
        studies::create_study,
        studies::create_batch,
        studies::list_studies,
        studies::stream_studies,
        studies::get_study,
        studies::edit_study,
        studies::change_status,
        studies::study_authorization,
        users::register_profile,
        users::my_profile,
        users::assign_role,
    ),
    components(schemas(
        api_shared::HealthRes,
        api_shared::ErrorRes,
        api_shared::ExtractFile,
        api_shared::ExtractOrdersReq,
        api_shared::ExtractOrdersRes,
        api_shared::ExtractedFileRes,
        api_shared::OrderReq,
        api_shared::OrderRes,
        api_shared::CreateStudyReq,
        api_shared::CreateStudyRes,
        api_shared::BatchStudiesReq,
        api_shared::BatchStudiesRes,
        api_shared::BatchItemRes,
        api_shared::EditStudyReq,
        api_shared::StatusChangeReq,
        api_shared::StudyDocument,
        api_shared::FeedDocument,
        api_shared::ProfileDocument,
        api_shared::ProfileReq,
        api_shared::RoleAssignmentReq,
        api_shared::RoleAssignmentRes,
    )),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

/// Allowance per file for the data URI prefix and the surrounding JSON.
const UPLOAD_OVERHEAD_BYTES: usize = 4 * 1024;

/// Largest request body accepted: [`MAX_REQUEST_FILES`] base64 uploads of `max_upload_bytes`.
fn body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes
        .saturating_mul(4)
        .div_ceil(3)
        .saturating_add(UPLOAD_OVERHEAD_BYTES)
        .saturating_mul(MAX_REQUEST_FILES)
}

/// Builds the REST router over `ctx`, including Swagger UI at `/swagger-ui`.
///
/// Request bodies are capped by [`body_limit`] over the configured upload size, replacing
/// axum's 2 MB default.
pub fn router(ctx: AppContext) -> Router {
    let limit = body_limit(ctx.config().extraction().max_upload_bytes);
    Router::new()
        .route("/health", get(handlers::health))
        .route("/orders/extract", post(orders::extract_orders))
        .route("/orders/validate", post(orders::validate_order))
        .route("/orders/authorization", post(orders::order_authorization))
        .route("/studies", post(studies::create_study).get(studies::list_studies))
        .route("/studies/batch", post(studies::create_batch))
        .route("/studies/stream", get(studies::stream_studies))
        .route("/studies/:id", get(studies::get_study).put(studies::edit_study))
        .route("/studies/:id/status", post(studies::change_status))
        .route("/studies/:id/authorization", get(studies::study_authorization))
        .route("/users/profile", post(users::register_profile))
        .route("/users/me", get(users::my_profile))
        .route("/admin/roles", post(users::assign_role))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(limit))
        .layer(CorsLayer::permissive())
        .with_state(AppState { ctx })
}

/// Resolves configuration from the process environment and builds the context.
///
/// See [`AppContext::from_env`] for the variables read.
///
/// # Errors
/// Returns an error if any value is malformed, the accounts file cannot be loaded, or the
/// store cannot be opened.
pub fn context_from_env() -> anyhow::Result<AppContext> {
    Ok(AppContext::from_env()?)
}
