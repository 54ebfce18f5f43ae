use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::models::activity::ActivityEntry;
use crate::models::group::{Group, GroupMember, Message};
use crate::models::{AdminRequest, Profile, RequestStatus, Role};
use crate::store::StoreError;

// Ids are stored as canonical TEXT uuids.
fn uuid_col(row: &SqliteRow, col: &str) -> Result<Uuid, StoreError> {
    let raw: String = row.try_get(col)?;
    Uuid::parse_str(&raw).map_err(|err| StoreError::corrupt(format!("{col}: {err}")))
}

fn opt_uuid_col(row: &SqliteRow, col: &str) -> Result<Option<Uuid>, StoreError> {
    let raw: Option<String> = row.try_get(col)?;
    raw.map(|s| Uuid::parse_str(&s).map_err(|err| StoreError::corrupt(format!("{col}: {err}"))))
        .transpose()
}

pub fn profile_from_row(row: &SqliteRow) -> Result<Profile, StoreError> {
    let role: String = row.try_get("role")?;
    Ok(Profile {
        id: uuid_col(row, "id")?,
        email: row.try_get("email")?,
        full_name: row.try_get("full_name")?,
        role: role
            .parse::<Role>()
            .map_err(|err| StoreError::corrupt(err.to_string()))?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

pub fn admin_request_from_row(row: &SqliteRow) -> Result<AdminRequest, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(AdminRequest {
        id: uuid_col(row, "id")?,
        user_id: uuid_col(row, "user_id")?,
        reason: row.try_get("reason")?,
        status: status
            .parse::<RequestStatus>()
            .map_err(|err| StoreError::corrupt(err.to_string()))?,
        reviewed_by: opt_uuid_col(row, "reviewed_by")?,
        reviewed_at: row.try_get::<Option<DateTime<Utc>>, _>("reviewed_at")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

pub fn group_from_row(row: &SqliteRow) -> Result<Group, StoreError> {
    Ok(Group {
        id: uuid_col(row, "id")?,
        name: row.try_get("name")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

pub fn member_from_row(row: &SqliteRow) -> Result<GroupMember, StoreError> {
    Ok(GroupMember {
        group_id: uuid_col(row, "group_id")?,
        user_id: uuid_col(row, "user_id")?,
        email: row.try_get("email")?,
        joined_at: row.try_get::<DateTime<Utc>, _>("joined_at")?,
    })
}

pub fn message_from_row(row: &SqliteRow) -> Result<Message, StoreError> {
    Ok(Message {
        id: uuid_col(row, "id")?,
        group_id: uuid_col(row, "group_id")?,
        user_id: uuid_col(row, "user_id")?,
        body: row.try_get("body")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

pub fn activity_from_row(row: &SqliteRow) -> Result<ActivityEntry, StoreError> {
    Ok(ActivityEntry {
        id: uuid_col(row, "id")?,
        seq: row.try_get("seq")?,
        event_name: row.try_get("event_name")?,
        actor_id: opt_uuid_col(row, "actor_id")?,
        subject_id: opt_uuid_col(row, "subject_id")?,
        occurred_at: row.try_get::<DateTime<Utc>, _>("occurred_at")?,
        payload: row.try_get("payload")?,
        severity: row.try_get("severity")?,
        prev_hash: row.try_get("prev_hash")?,
        hash: row.try_get("hash")?,
    })
}
