use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::authz::Requirement;
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::profile::MeResponse;
use crate::models::Profile;
use crate::utils::utc_now;

/// Current caller's profile; creates it on first sign-in.
#[utoipa::path(
    get,
    path = "/profile/me",
    tag = "Profile",
    responses(
        (status = 200, description = "Caller profile and effective role", body = MeResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<MeResponse>> {
    let access = state.gate.authorize(auth.identity(), Requirement::Authenticated).await?;
    let identity = access.identity();

    let profile = access
        .stores()
        .profiles
        .upsert_profile(&Profile::new(identity.user_id, identity.email.clone(), None, utc_now()))
        .await?;

    Ok(Json(MeResponse {
        profile,
        effective_role: access.role().await,
    }))
}
