use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Requirement;
use crate::errors::AppResult;
use crate::extract::JsonBody;
use crate::jwt::AuthUser;
use crate::models::admin_request::{AdminRequestCreate, DecisionRequest, ListRequestsQuery};
use crate::models::AdminRequest;

#[utoipa::path(
    post,
    path = "/admin-requests",
    tag = "Admin Requests",
    request_body = AdminRequestCreate,
    responses(
        (status = 201, description = "Request submitted", body = AdminRequest),
        (status = 400, description = "Empty reason"),
        (status = 409, description = "A pending request already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn submit(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(payload): JsonBody<AdminRequestCreate>,
) -> AppResult<(StatusCode, Json<AdminRequest>)> {
    let access = state.gate.authorize(auth.identity(), Requirement::Authenticated).await?;
    let request = access.lifecycle().submit(access.identity(), &payload.reason).await?;

    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    get,
    path = "/admin-requests/mine",
    tag = "Admin Requests",
    responses((status = 200, description = "Caller's requests, newest first", body = [AdminRequest])),
    security(("bearerAuth" = []))
)]
pub async fn mine(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<AdminRequest>>> {
    let access = state.gate.authorize(auth.identity(), Requirement::Authenticated).await?;
    let requests = access.stores().requests.list_requests_for_user(access.user_id()).await?;

    Ok(Json(requests))
}

#[utoipa::path(
    get,
    path = "/admin-requests",
    tag = "Admin Requests",
    params(ListRequestsQuery),
    responses(
        (status = 200, description = "All requests, newest first", body = [AdminRequest]),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListRequestsQuery>,
) -> AppResult<Json<Vec<AdminRequest>>> {
    let access = state.gate.authorize(auth.identity(), Requirement::Admin).await?;
    let requests = access.stores().requests.list_requests(query.status).await?;

    Ok(Json(requests))
}

#[utoipa::path(
    post,
    path = "/admin-requests/{id}/decision",
    tag = "Admin Requests",
    params(("id" = Uuid, Path, description = "Admin request ID")),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Request decided", body = AdminRequest),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already processed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn decide(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<DecisionRequest>,
) -> AppResult<Json<AdminRequest>> {
    let access = state.gate.authorize(auth.identity(), Requirement::Admin).await?;
    let request = access.lifecycle().decide(id, payload.action, access.identity()).await?;

    Ok(Json(request))
}
