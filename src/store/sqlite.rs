use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::row_parsers;
use crate::models::group::{Group, GroupMember, Message};
use crate::models::{AdminRequest, Profile, RequestStatus, Role};

use super::{AdminRequestStore, GroupStore, ProfileStore, StoreError};

const PROFILE_COLUMNS: &str = "id, email, full_name, role, created_at, updated_at";
const REQUEST_COLUMNS: &str = "id, user_id, reason, status, reviewed_by, reviewed_at, created_at";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_parsers::profile_from_row).transpose()
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, StoreError> {
        sqlx::query(
            "INSERT INTO profiles (id, email, full_name, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(profile.id.to_string())
        .bind(&profile.email)
        .bind(&profile.full_name)
        .bind(profile.role.as_str())
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await?;

        self.find_profile(profile.id)
            .await?
            .ok_or_else(|| StoreError::corrupt("profile missing after upsert"))
    }

    async fn set_role(&self, id: Uuid, role: Role, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE profiles SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_role_if(
        &self,
        id: Uuid,
        expected: Role,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE profiles SET role = ?, updated_at = ? WHERE id = ? AND role = ?")
            .bind(role.as_str())
            .bind(now)
            .bind(id.to_string())
            .bind(expected.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, StoreError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE email = ? ORDER BY created_at ASC LIMIT 1");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_parsers::profile_from_row).transpose()
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at ASC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(row_parsers::profile_from_row).collect()
    }
}

#[async_trait]
impl AdminRequestStore for SqliteStore {
    async fn find_request(&self, id: Uuid) -> Result<Option<AdminRequest>, StoreError> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM admin_requests WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_parsers::admin_request_from_row).transpose()
    }

    async fn find_pending_for_user(&self, user_id: Uuid) -> Result<Option<AdminRequest>, StoreError> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM admin_requests WHERE user_id = ? AND status = 'pending' LIMIT 1");
        let row = sqlx::query(&sql)
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_parsers::admin_request_from_row).transpose()
    }

    async fn insert_request(&self, request: &AdminRequest) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO admin_requests (id, user_id, reason, status, reviewed_by, reviewed_at, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(request.id.to_string())
        .bind(request.user_id.to_string())
        .bind(&request.reason)
        .bind(request.status.as_str())
        .bind(request.reviewed_by.map(|id| id.to_string()))
        .bind(request.reviewed_at)
        .bind(request.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict(format!(
                "user {} already has a pending request",
                request.user_id
            ))),
            Err(err) => Err(err.into()),
        }
    }

    async fn transition(
        &self,
        id: Uuid,
        from: RequestStatus,
        to: RequestStatus,
        reviewed_by: Option<Uuid>,
        reviewed_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE admin_requests SET status = ?, reviewed_by = ?, reviewed_at = ? WHERE id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(reviewed_by.map(|id| id.to_string()))
        .bind(reviewed_at)
        .bind(id.to_string())
        .bind(from.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            // reverting to pending collides with a newer pending request
            Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict(format!(
                "request {id} cannot return to {to}"
            ))),
            Err(err) => Err(err.into()),
        }
    }

    async fn list_requests(&self, status: Option<RequestStatus>) -> Result<Vec<AdminRequest>, StoreError> {
        let rows = match status {
            Some(status) => {
                let sql = format!("SELECT {REQUEST_COLUMNS} FROM admin_requests WHERE status = ? ORDER BY created_at DESC");
                sqlx::query(&sql)
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("SELECT {REQUEST_COLUMNS} FROM admin_requests ORDER BY created_at DESC");
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
        };

        rows.iter().map(row_parsers::admin_request_from_row).collect()
    }

    async fn list_requests_for_user(&self, user_id: Uuid) -> Result<Vec<AdminRequest>, StoreError> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM admin_requests WHERE user_id = ? ORDER BY created_at DESC");
        let rows = sqlx::query(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_parsers::admin_request_from_row).collect()
    }
}

#[async_trait]
impl GroupStore for SqliteStore {
    async fn create_group(&self, group: &Group) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO groups (id, name, created_at) VALUES (?, ?, ?)")
            .bind(group.id.to_string())
            .bind(&group.name)
            .bind(group.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_group(&self, id: Uuid) -> Result<Option<Group>, StoreError> {
        let row = sqlx::query("SELECT id, name, created_at FROM groups WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_parsers::group_from_row).transpose()
    }

    async fn add_member(&self, group_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Result<GroupMember, StoreError> {
        sqlx::query(
            "INSERT INTO group_members (group_id, user_id, joined_at) VALUES (?, ?, ?) \
             ON CONFLICT(group_id, user_id) DO NOTHING",
        )
        .bind(group_id.to_string())
        .bind(user_id.to_string())
        .bind(now)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT m.group_id, m.user_id, p.email, m.joined_at FROM group_members m \
             LEFT JOIN profiles p ON p.id = m.user_id WHERE m.group_id = ? AND m.user_id = ?",
        )
        .bind(group_id.to_string())
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        row_parsers::member_from_row(&row)
    }

    async fn is_member(&self, group_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM group_members WHERE group_id = ? AND user_id = ?")
            .bind(group_id.to_string())
            .bind(user_id.to_string())
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    async fn list_members(&self, group_id: Uuid) -> Result<Vec<GroupMember>, StoreError> {
        let rows = sqlx::query(
            "SELECT m.group_id, m.user_id, p.email, m.joined_at FROM group_members m \
             LEFT JOIN profiles p ON p.id = m.user_id WHERE m.group_id = ? ORDER BY m.joined_at ASC",
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_parsers::member_from_row).collect()
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO messages (id, group_id, user_id, body, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(message.id.to_string())
            .bind(message.group_id.to_string())
            .bind(message.user_id.to_string())
            .bind(&message.body)
            .bind(message.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_messages(&self, group_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, group_id, user_id, body, created_at FROM messages WHERE group_id = ? ORDER BY created_at ASC",
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_parsers::message_from_row).collect()
    }
}
