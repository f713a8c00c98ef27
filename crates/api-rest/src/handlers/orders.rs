use crate::auth::Authenticated;
use crate::error::ApiError;
use crate::handlers::{document_kind, pdf_response, to_json};
use crate::AppState;
use api_shared::{
    DocumentQuery, ErrorRes, ExtractOrdersReq, ExtractOrdersRes, ExtractedFileRes, OrderReq,
    OrderRes,
};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Json, Response};
use extraction::OrderFile;
use orders::ExtractedOrder;
use radtrack_core::render_authorization;

#[utoipa::path(
    post,
    path = "/orders/extract",
    request_body = ExtractOrdersReq,
    responses(
        (status = 200, description = "Per-file extraction results", body = ExtractOrdersRes),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes),
        (status = 503, description = "No extraction model configured", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// Extract orders from uploaded files
///
/// Each file is extracted independently and concurrently; a failing file is reported in its
/// own result and never affects the others. Nothing is retried.
#[axum::debug_handler(state = AppState)]
pub async fn extract_orders(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Json(req): Json<ExtractOrdersReq>,
) -> Result<Json<ExtractOrdersRes>, ApiError> {
    let client = state.ctx.extraction().ok_or_else(|| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "order extraction is not configured",
        )
    })?;
    tracing::info!(uid = %caller.uid, files = req.files.len(), "extraction requested");

    let files = req
        .files
        .into_iter()
        .map(|f| {
            let file = OrderFile::from_data_uri(f.file_name.clone(), &f.data_uri);
            (f.file_name, file)
        })
        .collect();
    let batch = client.extract_loaded(files).await;

    let results: Vec<ExtractedFileRes> = batch
        .outcomes
        .into_iter()
        .map(|outcome| {
            let order = outcome.result.map_err(|e| e.to_string()).and_then(|order| {
                serde_json::to_value(order).map_err(|e| e.to_string())
            });
            match order {
                Ok(order) => ExtractedFileRes {
                    file_name: outcome.file_name,
                    order: Some(order),
                    error: None,
                },
                Err(error) => ExtractedFileRes {
                    file_name: outcome.file_name,
                    order: None,
                    error: Some(error),
                },
            }
        })
        .collect();

    let success_count = results.iter().filter(|r| r.order.is_some()).count();
    Ok(Json(ExtractOrdersRes {
        error_count: results.len() - success_count,
        success_count,
        results,
    }))
}

#[utoipa::path(
    post,
    path = "/orders/validate",
    request_body = OrderReq,
    responses(
        (status = 200, description = "Order is valid", body = OrderRes),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes),
        (status = 422, description = "First violated field constraint", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// Validate manually keyed order data
#[axum::debug_handler(state = AppState)]
pub async fn validate_order(
    Authenticated(_caller): Authenticated,
    Json(req): Json<OrderReq>,
) -> Result<Json<OrderRes>, ApiError> {
    let order = ExtractedOrder::from_value(req.order)?;
    Ok(Json(OrderRes {
        order: to_json(&order)?,
    }))
}

#[utoipa::path(
    post,
    path = "/orders/authorization",
    request_body = OrderReq,
    params(DocumentQuery),
    responses(
        (status = 200, description = "Authorization PDF", content_type = "application/pdf"),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes),
        (status = 422, description = "Order failed validation", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// Render the authorization document for an order that has not been stored yet
#[axum::debug_handler(state = AppState)]
pub async fn order_authorization(
    Authenticated(_caller): Authenticated,
    Query(query): Query<DocumentQuery>,
    Json(req): Json<OrderReq>,
) -> Result<Response, ApiError> {
    let kind = document_kind(query.kind.as_deref())?;
    let order = ExtractedOrder::from_value(req.order)?;
    let document = render_authorization(&order, kind)?;
    pdf_response(document)
}
