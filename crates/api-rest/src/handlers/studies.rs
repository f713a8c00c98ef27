use crate::auth::Authenticated;
use crate::error::ApiError;
use crate::handlers::{document_kind, feed_filters, pdf_response, to_json};
use crate::AppState;
use api_shared::{
    BatchItemRes, BatchStudiesReq, BatchStudiesRes, CreateStudyReq, CreateStudyRes,
    DocumentQuery, EditStudyReq, ErrorRes, FeedDocument, FeedQuery, StatusChangeReq,
    StudyDocument,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Json, Response};
use futures_util::stream::{Stream, StreamExt};
use radtrack_core::{BatchItem, StudyStatus};

#[utoipa::path(
    post,
    path = "/studies",
    request_body = CreateStudyReq,
    responses(
        (status = 201, description = "Study created", body = CreateStudyRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes),
        (status = 422, description = "Order failed validation", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// Create a tracked study from an order
///
/// The study starts as `Pendiente` with a server-assigned request date.
#[axum::debug_handler(state = AppState)]
pub async fn create_study(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Json(req): Json<CreateStudyReq>,
) -> Result<(StatusCode, Json<CreateStudyRes>), ApiError> {
    let id = state
        .ctx
        .ingestion()
        .create_study_from_value(req.order, req.service.as_deref(), req.document_generated)
        .await?;
    tracing::info!(uid = %caller.uid, study_id = %id, "study submitted");
    Ok((
        StatusCode::CREATED,
        Json(CreateStudyRes { id: id.to_string() }),
    ))
}

#[utoipa::path(
    post,
    path = "/studies/batch",
    request_body = BatchStudiesReq,
    responses(
        (status = 200, description = "Per-item results with counts", body = BatchStudiesRes),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// Create many studies
///
/// Items are independent: partial success is reported, never rolled back.
#[axum::debug_handler(state = AppState)]
pub async fn create_batch(
    State(state): State<AppState>,
    Authenticated(_caller): Authenticated,
    Json(req): Json<BatchStudiesReq>,
) -> Result<Json<BatchStudiesRes>, ApiError> {
    let items = req
        .items
        .into_iter()
        .map(|item| BatchItem {
            order: item.order,
            service: item.service,
            document_generated: item.document_generated,
        })
        .collect();
    let report = state.ctx.ingestion().create_batch(items).await;

    let success_count = report.success_count();
    let error_count = report.error_count();
    let results = report
        .outcomes
        .into_iter()
        .enumerate()
        .map(|(index, outcome)| match outcome {
            Ok(id) => BatchItemRes {
                index,
                id: Some(id.to_string()),
                error: None,
            },
            Err(e) => BatchItemRes {
                index,
                id: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    Ok(Json(BatchStudiesRes {
        results,
        success_count,
        error_count,
    }))
}

#[utoipa::path(
    get,
    path = "/studies",
    params(FeedQuery),
    responses(
        (status = 200, description = "Filtered studies and pending summaries", body = FeedDocument),
        (status = 400, description = "Bad filter", body = ErrorRes),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// Current study feed
#[axum::debug_handler(state = AppState)]
pub async fn list_studies(
    State(state): State<AppState>,
    Authenticated(_caller): Authenticated,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedDocument>, ApiError> {
    let filters = feed_filters(query)?;
    let view = state.ctx.feed().snapshot(&filters).await?;
    Ok(Json(FeedDocument(to_json(&view)?)))
}

#[utoipa::path(
    get,
    path = "/studies/stream",
    params(FeedQuery),
    responses(
        (status = 200, description = "Server-sent `feed` events carrying the recomputed view", content_type = "text/event-stream"),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// Live study feed
///
/// Sends the current view at once, then a fresh one after every change to the collection.
#[axum::debug_handler(state = AppState)]
pub async fn stream_studies(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Query(query): Query<FeedQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let filters = feed_filters(query)?;
    tracing::info!(uid = %caller.uid, "feed subscription opened");
    let events = state.ctx.feed().live(filters).map(|view| match view {
        Ok(view) => Event::default().event("feed").json_data(view),
        Err(e) => Ok(Event::default().event("error").data(e.to_string())),
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[utoipa::path(
    get,
    path = "/studies/{id}",
    params(("id" = String, Path, description = "Study id")),
    responses(
        (status = 200, description = "Stored study", body = StudyDocument),
        (status = 400, description = "Malformed id", body = ErrorRes),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes),
        (status = 404, description = "Unknown study", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// Fetch one study
#[axum::debug_handler(state = AppState)]
pub async fn get_study(
    State(state): State<AppState>,
    Authenticated(_caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<StudyDocument>, ApiError> {
    let study = state.ctx.studies().get(&id).await?;
    Ok(Json(StudyDocument(to_json(&study)?)))
}

#[utoipa::path(
    put,
    path = "/studies/{id}",
    params(("id" = String, Path, description = "Study id")),
    request_body = EditStudyReq,
    responses(
        (status = 200, description = "Edited study", body = StudyDocument),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes),
        (status = 404, description = "Unknown study", body = ErrorRes),
        (status = 422, description = "Order failed validation", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// Replace the order data and optionally the service of a study
#[axum::debug_handler(state = AppState)]
pub async fn edit_study(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    Json(req): Json<EditStudyReq>,
) -> Result<Json<StudyDocument>, ApiError> {
    let study = state
        .ctx
        .studies()
        .edit(&id, req.order, req.service.as_deref())
        .await?;
    tracing::info!(uid = %caller.uid, study_id = %study.id, "study edited via API");
    Ok(Json(StudyDocument(to_json(&study)?)))
}

#[utoipa::path(
    post,
    path = "/studies/{id}/status",
    params(("id" = String, Path, description = "Study id")),
    request_body = StatusChangeReq,
    responses(
        (status = 200, description = "Updated study", body = StudyDocument),
        (status = 400, description = "Unknown status or reason, or reason missing", body = ErrorRes),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes),
        (status = 404, description = "Unknown study", body = ErrorRes),
        (status = 409, description = "Transition not allowed", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// Change the status of a study
#[axum::debug_handler(state = AppState)]
pub async fn change_status(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    Json(req): Json<StatusChangeReq>,
) -> Result<Json<StudyDocument>, ApiError> {
    let status: StudyStatus = req.status.parse()?;
    let study = state
        .ctx
        .studies()
        .change_status(&id, status, req.reason.as_deref())
        .await?;
    tracing::info!(uid = %caller.uid, study_id = %study.id, status = %study.status, "status set");
    Ok(Json(StudyDocument(to_json(&study)?)))
}

#[utoipa::path(
    get,
    path = "/studies/{id}/authorization",
    params(("id" = String, Path, description = "Study id"), DocumentQuery),
    responses(
        (status = 200, description = "Authorization PDF", content_type = "application/pdf"),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes),
        (status = 404, description = "Unknown study", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// Render the authorization document of a stored study
#[axum::debug_handler(state = AppState)]
pub async fn study_authorization(
    State(state): State<AppState>,
    Authenticated(_caller): Authenticated,
    Path(id): Path<String>,
    Query(query): Query<DocumentQuery>,
) -> Result<Response, ApiError> {
    let kind = document_kind(query.kind.as_deref())?;
    let document = state.ctx.studies().authorization_document(&id, kind).await?;
    pdf_response(document)
}
