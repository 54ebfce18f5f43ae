use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::app::AppState;
use crate::authz::GuardState;
use crate::errors::{AppError, AppResult};
use crate::jwt::MaybeAuthUser;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NavigationQuery {
    /// UI path the client is about to render
    pub path: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NavigationResponse {
    pub path: String,
    #[schema(example = "redirecting")]
    pub state: String,
    #[schema(example = "/login?redirect=%2Fadmin")]
    pub location: Option<String>,
}

/// Route guard decision for a UI path, as the edge middleware would apply it.
#[utoipa::path(
    get,
    path = "/navigation/check",
    tag = "Navigation",
    params(NavigationQuery),
    responses(
        (status = 200, description = "Guard decision", body = NavigationResponse),
        (status = 400, description = "Path is not absolute")
    )
)]
pub async fn check(
    State(state): State<AppState>,
    MaybeAuthUser(identity): MaybeAuthUser,
    Query(query): Query<NavigationQuery>,
) -> AppResult<Json<NavigationResponse>> {
    if !query.path.starts_with('/') {
        return Err(AppError::validation("path must start with `/`"));
    }

    let decision = state.guard.check(identity.as_ref(), &query.path).await;
    let (label, location) = match decision {
        GuardState::Loading => ("loading", None),
        GuardState::Authorized => ("authorized", None),
        GuardState::Redirecting { location } => ("redirecting", Some(location)),
    };

    Ok(Json(NavigationResponse {
        path: query.path,
        state: label.to_string(),
        location,
    }))
}
