//! Admin user management. Every handler requires the admin role.

use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Requirement;
use crate::errors::{AppError, AppResult};
use crate::events::publish;
use crate::extract::JsonBody;
use crate::jwt::AuthUser;
use crate::models::profile::RoleUpdateRequest;
use crate::models::Profile;
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "Admin",
    responses(
        (status = 200, description = "All profiles", body = [Profile]),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_users(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<Profile>>> {
    let access = state.gate.authorize(auth.identity(), Requirement::Admin).await?;
    let profiles = access.stores().profiles.list_profiles().await?;

    Ok(Json(profiles))
}

/// Direct role edit, outside the request lifecycle.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Profile ID")),
    request_body = RoleUpdateRequest,
    responses(
        (status = 200, description = "Role updated", body = Profile),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Profile not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<RoleUpdateRequest>,
) -> AppResult<Json<Profile>> {
    let access = state.gate.authorize(auth.identity(), Requirement::Admin).await?;
    let profiles = &access.stores().profiles;

    let before = profiles
        .find_profile(id)
        .await?
        .ok_or_else(|| AppError::not_found("profile not found"))?;

    if !profiles.set_role(id, payload.role, utc_now()).await? {
        return Err(AppError::not_found("profile not found"));
    }

    let after = profiles
        .find_profile(id)
        .await?
        .ok_or_else(|| AppError::not_found("profile not found"))?;

    tracing::info!(
        admin = %access.user_id(),
        user_id = %id,
        from = %before.role,
        to = %after.role,
        "role changed by admin"
    );
    publish(access.events(), "role_changed", Some(access.user_id()), &after, Some(&before));

    Ok(Json(after))
}
