//! Groups: admins manage rosters, members read the roster and chat.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Requirement;
use crate::errors::{AppError, AppResult};
use crate::events::publish;
use crate::extract::JsonBody;
use crate::jwt::AuthUser;
use crate::models::group::{Group, GroupCreateRequest, GroupMember, MemberAddRequest, Message, MessageCreateRequest};
use crate::utils::{require_text, utc_now};

#[utoipa::path(
    post,
    path = "/groups",
    tag = "Groups",
    request_body = GroupCreateRequest,
    responses(
        (status = 201, description = "Group created", body = Group),
        (status = 403, description = "Caller is not an admin")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_group(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(payload): JsonBody<GroupCreateRequest>,
) -> AppResult<(StatusCode, Json<Group>)> {
    let access = state.gate.authorize(auth.identity(), Requirement::Admin).await?;

    let group = Group {
        id: Uuid::new_v4(),
        name: require_text("name", &payload.name)?.to_string(),
        created_at: utc_now(),
    };
    access.stores().groups.create_group(&group).await?;
    publish(access.events(), "created", Some(access.user_id()), &group, None);

    Ok((StatusCode::CREATED, Json(group)))
}

#[utoipa::path(
    post,
    path = "/groups/{id}/members",
    tag = "Groups",
    params(("id" = Uuid, Path, description = "Group ID")),
    request_body = MemberAddRequest,
    responses(
        (status = 201, description = "Member added", body = GroupMember),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Group or profile not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(group_id): Path<Uuid>,
    JsonBody(payload): JsonBody<MemberAddRequest>,
) -> AppResult<(StatusCode, Json<GroupMember>)> {
    let access = state.gate.authorize(auth.identity(), Requirement::Admin).await?;
    let stores = access.stores();

    if stores.groups.find_group(group_id).await?.is_none() {
        return Err(AppError::not_found("group not found"));
    }
    if stores.profiles.find_profile(payload.user_id).await?.is_none() {
        return Err(AppError::not_found("profile not found"));
    }

    let member = stores.groups.add_member(group_id, payload.user_id, utc_now()).await?;
    publish(access.events(), "added", Some(access.user_id()), &member, None);

    Ok((StatusCode::CREATED, Json(member)))
}

#[utoipa::path(
    get,
    path = "/groups/{id}/members",
    tag = "Groups",
    params(("id" = Uuid, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Group roster", body = [GroupMember]),
        (status = 403, description = "Caller is not a member")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_members(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(group_id): Path<Uuid>,
) -> AppResult<Json<Vec<GroupMember>>> {
    let access = state.gate.authorize(auth.identity(), Requirement::Member(group_id)).await?;
    let members = access.stores().groups.list_members(group_id).await?;

    Ok(Json(members))
}

#[utoipa::path(
    get,
    path = "/groups/{id}/messages",
    tag = "Groups",
    params(("id" = Uuid, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Messages, oldest first", body = [Message]),
        (status = 403, description = "Caller is not a member")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(group_id): Path<Uuid>,
) -> AppResult<Json<Vec<Message>>> {
    let access = state.gate.authorize(auth.identity(), Requirement::Member(group_id)).await?;
    let messages = access.stores().groups.list_messages(group_id).await?;

    Ok(Json(messages))
}

#[utoipa::path(
    post,
    path = "/groups/{id}/messages",
    tag = "Groups",
    params(("id" = Uuid, Path, description = "Group ID")),
    request_body = MessageCreateRequest,
    responses(
        (status = 201, description = "Message posted", body = Message),
        (status = 400, description = "Empty body"),
        (status = 403, description = "Caller is not a member")
    ),
    security(("bearerAuth" = []))
)]
pub async fn post_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(group_id): Path<Uuid>,
    JsonBody(payload): JsonBody<MessageCreateRequest>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let access = state.gate.authorize(auth.identity(), Requirement::Member(group_id)).await?;

    let message = Message {
        id: Uuid::new_v4(),
        group_id,
        user_id: access.user_id(),
        body: require_text("body", &payload.body)?.to_string(),
        created_at: utc_now(),
    };
    access.stores().groups.insert_message(&message).await?;

    Ok((StatusCode::CREATED, Json(message)))
}
