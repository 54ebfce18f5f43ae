//! Store seams for profiles, admin requests and groups.
//!
//! Components only ever see these traits. `SqliteStore` is the production
//! backend; `MemoryStore` backs tests and can inject faults.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::group::{Group, GroupMember, Message};
use crate::models::{AdminRequest, Profile, RequestStatus, Role};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("conflicting row: {0}")]
    Conflict(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Cheap reachability probe for health checks.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError>;

    /// Insert the profile if no row exists for `profile.id`; returns the
    /// stored row either way. Never overwrites an existing role.
    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, StoreError>;

    /// Unconditional role write. `Ok(false)` when no profile row exists.
    async fn set_role(&self, id: Uuid, role: Role, now: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Role write guarded by the current value. `Ok(false)` when the row is
    /// missing or its role is not `expected`.
    async fn set_role_if(
        &self,
        id: Uuid,
        expected: Role,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, StoreError>;

    async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError>;
}

#[async_trait]
pub trait AdminRequestStore: Send + Sync {
    async fn find_request(&self, id: Uuid) -> Result<Option<AdminRequest>, StoreError>;

    async fn find_pending_for_user(&self, user_id: Uuid) -> Result<Option<AdminRequest>, StoreError>;

    /// Fails with `StoreError::Conflict` when the requester already has a
    /// pending request.
    async fn insert_request(&self, request: &AdminRequest) -> Result<(), StoreError>;

    /// Compare-and-swap on `status`. Sets `reviewed_by`/`reviewed_at` to the
    /// given values (both `None` clears them). `Ok(false)` when the row is
    /// missing or not in `from`.
    async fn transition(
        &self,
        id: Uuid,
        from: RequestStatus,
        to: RequestStatus,
        reviewed_by: Option<Uuid>,
        reviewed_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError>;

    async fn list_requests(&self, status: Option<RequestStatus>) -> Result<Vec<AdminRequest>, StoreError>;

    async fn list_requests_for_user(&self, user_id: Uuid) -> Result<Vec<AdminRequest>, StoreError>;
}

#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn create_group(&self, group: &Group) -> Result<(), StoreError>;

    async fn find_group(&self, id: Uuid) -> Result<Option<Group>, StoreError>;

    async fn add_member(&self, group_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Result<GroupMember, StoreError>;

    async fn is_member(&self, group_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    async fn list_members(&self, group_id: Uuid) -> Result<Vec<GroupMember>, StoreError>;

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError>;

    async fn list_messages(&self, group_id: Uuid) -> Result<Vec<Message>, StoreError>;
}

/// The privileged store bundle. Owned by the authorization gate; handlers
/// reach it only through a `Privileged` handle.
#[derive(Clone)]
pub struct Stores {
    pub profiles: Arc<dyn ProfileStore>,
    pub requests: Arc<dyn AdminRequestStore>,
    pub groups: Arc<dyn GroupStore>,
}

impl Stores {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        requests: Arc<dyn AdminRequestStore>,
        groups: Arc<dyn GroupStore>,
    ) -> Self {
        Self {
            profiles,
            requests,
            groups,
        }
    }

    pub fn sqlite(store: SqliteStore) -> Self {
        let store = Arc::new(store);
        Self::new(store.clone(), store.clone(), store)
    }

    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self::new(store.clone(), store.clone(), store)
    }
}
