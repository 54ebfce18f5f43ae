use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::group::{Group, GroupMember, Message};
use crate::models::{AdminRequest, Profile, RequestStatus, Role};

use super::{AdminRequestStore, GroupStore, ProfileStore, StoreError};

#[derive(Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    requests: Vec<AdminRequest>,
    groups: HashMap<Uuid, Group>,
    members: Vec<GroupMember>,
    messages: Vec<Message>,
}

/// In-process store with the same semantics as `SqliteStore`, plus switches
/// for simulating store faults.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
    fail_role_writes: AtomicBool,
    profile_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation fails with `StoreError::Unavailable` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Only profile role writes fail while set.
    pub fn fail_role_writes(&self, fail: bool) {
        self.fail_role_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `find_profile` calls served so far.
    pub fn profile_reads(&self) -> usize {
        self.profile_reads.load(Ordering::SeqCst)
    }

    pub fn insert_profile(&self, profile: Profile) {
        self.lock().profiles.insert(profile.id, profile);
    }

    pub fn profile(&self, id: Uuid) -> Option<Profile> {
        self.lock().profiles.get(&id).cloned()
    }

    pub fn request(&self, id: Uuid) -> Option<AdminRequest> {
        self.lock().requests.iter().find(|r| r.id == id).cloned()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // a panicking test thread must not poison the other tests' view
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }

    fn check_role_write(&self) -> Result<(), StoreError> {
        self.check_available()?;
        if self.fail_role_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("profile role write rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }

    async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        self.profile_reads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.lock().profiles.get(&id).cloned())
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, StoreError> {
        self.check_available()?;
        let mut tables = self.lock();
        let stored = tables.profiles.entry(profile.id).or_insert_with(|| profile.clone());
        Ok(stored.clone())
    }

    async fn set_role(&self, id: Uuid, role: Role, now: DateTime<Utc>) -> Result<bool, StoreError> {
        self.check_role_write()?;
        let mut tables = self.lock();
        match tables.profiles.get_mut(&id) {
            Some(profile) => {
                profile.role = role;
                profile.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_role_if(
        &self,
        id: Uuid,
        expected: Role,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.check_role_write()?;
        let mut tables = self.lock();
        match tables.profiles.get_mut(&id) {
            Some(profile) if profile.role == expected => {
                profile.role = role;
                profile.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, StoreError> {
        self.check_available()?;
        Ok(self
            .lock()
            .profiles
            .values()
            .filter(|p| p.email == email)
            .min_by_key(|p| p.created_at)
            .cloned())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        self.check_available()?;
        let mut profiles: Vec<Profile> = self.lock().profiles.values().cloned().collect();
        profiles.sort_by_key(|p| p.created_at);
        Ok(profiles)
    }
}

#[async_trait]
impl AdminRequestStore for MemoryStore {
    async fn find_request(&self, id: Uuid) -> Result<Option<AdminRequest>, StoreError> {
        self.check_available()?;
        Ok(self.request(id))
    }

    async fn find_pending_for_user(&self, user_id: Uuid) -> Result<Option<AdminRequest>, StoreError> {
        self.check_available()?;
        Ok(self
            .lock()
            .requests
            .iter()
            .find(|r| r.user_id == user_id && r.is_pending())
            .cloned())
    }

    async fn insert_request(&self, request: &AdminRequest) -> Result<(), StoreError> {
        self.check_available()?;
        let mut tables = self.lock();
        let pending_exists = tables
            .requests
            .iter()
            .any(|r| r.user_id == request.user_id && r.is_pending());
        if request.is_pending() && pending_exists {
            return Err(StoreError::Conflict(format!(
                "user {} already has a pending request",
                request.user_id
            )));
        }
        tables.requests.push(request.clone());
        Ok(())
    }

    async fn transition(
        &self,
        id: Uuid,
        from: RequestStatus,
        to: RequestStatus,
        reviewed_by: Option<Uuid>,
        reviewed_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut tables = self.lock();
        let Some(index) = tables.requests.iter().position(|r| r.id == id && r.status == from) else {
            return Ok(false);
        };

        let user_id = tables.requests[index].user_id;
        let collides = to == RequestStatus::Pending
            && tables
                .requests
                .iter()
                .any(|r| r.id != id && r.user_id == user_id && r.is_pending());
        if collides {
            return Err(StoreError::Conflict(format!("request {id} cannot return to {to}")));
        }

        let request = &mut tables.requests[index];
        request.status = to;
        request.reviewed_by = reviewed_by;
        request.reviewed_at = reviewed_at;
        Ok(true)
    }

    async fn list_requests(&self, status: Option<RequestStatus>) -> Result<Vec<AdminRequest>, StoreError> {
        self.check_available()?;
        let mut requests: Vec<AdminRequest> = self
            .lock()
            .requests
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn list_requests_for_user(&self, user_id: Uuid) -> Result<Vec<AdminRequest>, StoreError> {
        self.check_available()?;
        let mut requests: Vec<AdminRequest> = self
            .lock()
            .requests
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn create_group(&self, group: &Group) -> Result<(), StoreError> {
        self.check_available()?;
        self.lock().groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn find_group(&self, id: Uuid) -> Result<Option<Group>, StoreError> {
        self.check_available()?;
        Ok(self.lock().groups.get(&id).cloned())
    }

    async fn add_member(&self, group_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> Result<GroupMember, StoreError> {
        self.check_available()?;
        let mut tables = self.lock();
        if !tables.groups.contains_key(&group_id) {
            return Err(StoreError::Conflict(format!("group {group_id} does not exist")));
        }
        if let Some(existing) = tables
            .members
            .iter()
            .find(|m| m.group_id == group_id && m.user_id == user_id)
        {
            return Ok(existing.clone());
        }
        let member = GroupMember {
            group_id,
            user_id,
            email: tables.profiles.get(&user_id).map(|p| p.email.clone()),
            joined_at: now,
        };
        tables.members.push(member.clone());
        Ok(member)
    }

    async fn is_member(&self, group_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        self.check_available()?;
        Ok(self
            .lock()
            .members
            .iter()
            .any(|m| m.group_id == group_id && m.user_id == user_id))
    }

    async fn list_members(&self, group_id: Uuid) -> Result<Vec<GroupMember>, StoreError> {
        self.check_available()?;
        Ok(self
            .lock()
            .members
            .iter()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        self.check_available()?;
        self.lock().messages.push(message.clone());
        Ok(())
    }

    async fn list_messages(&self, group_id: Uuid) -> Result<Vec<Message>, StoreError> {
        self.check_available()?;
        Ok(self
            .lock()
            .messages
            .iter()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect())
    }
}
