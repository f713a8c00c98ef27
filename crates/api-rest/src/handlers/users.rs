use crate::auth::Authenticated;
use crate::error::ApiError;
use crate::handlers::to_json;
use crate::AppState;
use api_shared::{ErrorRes, ProfileDocument, ProfileReq, RoleAssignmentReq, RoleAssignmentRes};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use radtrack_core::{ProfileRequest, RoleAssignment};

#[utoipa::path(
    post,
    path = "/users/profile",
    request_body = ProfileReq,
    responses(
        (status = 201, description = "Profile created", body = ProfileDocument),
        (status = 400, description = "Role or service not allowed", body = ErrorRes),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes),
        (status = 409, description = "Profile already exists", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// Create the caller's own profile
#[axum::debug_handler(state = AppState)]
pub async fn register_profile(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Json(req): Json<ProfileReq>,
) -> Result<(StatusCode, Json<ProfileDocument>), ApiError> {
    let request = ProfileRequest {
        nombre: req.nombre,
        rol: req.rol,
        servicio_asignado: req.servicio_asignado,
    };
    let profile = state.ctx.users().register_profile(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(ProfileDocument(to_json(&profile)?))))
}

#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Caller's profile", body = ProfileDocument),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes),
        (status = 404, description = "No profile yet", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// The caller's profile
#[axum::debug_handler(state = AppState)]
pub async fn my_profile(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> Result<Json<ProfileDocument>, ApiError> {
    let profile = state.ctx.users().profile(&caller.uid).await?;
    Ok(Json(ProfileDocument(to_json(&profile)?)))
}

#[utoipa::path(
    post,
    path = "/admin/roles",
    request_body = RoleAssignmentReq,
    responses(
        (status = 200, description = "Role assigned", body = RoleAssignmentRes),
        (status = 400, description = "Email or role missing, or service not allowed", body = ErrorRes),
        (status = 401, description = "Missing or invalid credential", body = ErrorRes),
        (status = 403, description = "Caller is not an administrator", body = ErrorRes),
        (status = 404, description = "No account with that email", body = ErrorRes),
        (status = 500, description = "Claims applied but profile not written; safe to retry", body = ErrorRes)
    ),
    security(("bearer" = []))
)]
/// Assign a role to an account
///
/// Administrator only. Sets the `admin` and `role` claims on the account, then upserts its
/// profile.
#[axum::debug_handler(state = AppState)]
pub async fn assign_role(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Json(req): Json<RoleAssignmentReq>,
) -> Result<Json<RoleAssignmentRes>, ApiError> {
    let request = RoleAssignment {
        email: req.email,
        role: req.role,
        service: req.service,
        area: req.area,
    };
    let outcome = state.ctx.users().set_user_role(&caller, request).await?;
    Ok(Json(RoleAssignmentRes {
        message: outcome.message,
    }))
}
