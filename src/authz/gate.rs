use std::fmt;

use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::events::EventBus;
use crate::lifecycle::AdminRequestLifecycle;
use crate::models::Role;
use crate::store::Stores;

use super::{Identity, RoleResolver};

/// Privilege level an API operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Authenticated,
    Admin,
    /// Caller must hold a membership row for the group.
    Member(Uuid),
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Authenticated => f.write_str("authenticated"),
            Requirement::Admin => f.write_str("admin"),
            Requirement::Member(group_id) => write!(f, "member of {group_id}"),
        }
    }
}

/// The single authorization check in front of every API operation.
///
/// The gate owns the store bundle. The only way to reach it is a
/// `Privileged` handle, and only `authorize` creates one.
pub struct Gate {
    resolver: RoleResolver,
    stores: Stores,
    events: EventBus,
}

impl Gate {
    pub fn new(resolver: RoleResolver, stores: Stores, events: EventBus) -> Self {
        Self {
            resolver,
            stores,
            events,
        }
    }

    pub fn resolver(&self) -> &RoleResolver {
        &self.resolver
    }

    /// Store reachability for the health endpoint. Exposes no data.
    pub async fn ping(&self) -> Result<(), crate::store::StoreError> {
        self.stores.profiles.ping().await
    }

    pub async fn authorize(&self, identity: &Identity, requirement: Requirement) -> AppResult<Privileged<'_>> {
        let role = OnceCell::new();

        match requirement {
            Requirement::Authenticated => {}
            Requirement::Admin => {
                let resolved = self.resolver.resolve(identity).await;
                if !resolved.is_admin() {
                    tracing::warn!(
                        user_id = %identity.user_id,
                        role = %resolved,
                        requirement = %requirement,
                        "access denied"
                    );
                    return Err(AppError::forbidden("admin role required"));
                }
                let _ = role.set(resolved);
            }
            Requirement::Member(group_id) => {
                // membership read errors surface; only role reads fail open
                let member = self.stores.groups.is_member(group_id, identity.user_id).await?;
                if !member {
                    tracing::warn!(
                        user_id = %identity.user_id,
                        requirement = %requirement,
                        "access denied"
                    );
                    return Err(AppError::forbidden("not a member of this group"));
                }
            }
        }

        Ok(Privileged {
            identity: identity.clone(),
            role,
            gate: self,
        })
    }
}

/// Proof that the caller passed `Gate::authorize` for some requirement.
pub struct Privileged<'a> {
    identity: Identity,
    /// Set by admin checks; resolved on first use otherwise.
    role: OnceCell<Role>,
    gate: &'a Gate,
}

impl<'a> Privileged<'a> {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn user_id(&self) -> Uuid {
        self.identity.user_id
    }

    pub async fn role(&self) -> Role {
        *self
            .role
            .get_or_init(|| self.gate.resolver.resolve(&self.identity))
            .await
    }

    pub fn stores(&self) -> &'a Stores {
        &self.gate.stores
    }

    pub fn events(&self) -> &'a EventBus {
        &self.gate.events
    }

    pub fn lifecycle(&self) -> AdminRequestLifecycle {
        AdminRequestLifecycle::new(
            self.gate.resolver.clone(),
            self.gate.stores.clone(),
            self.gate.events.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::init_event_bus;
    use crate::models::group::Group;
    use crate::models::Profile;
    use crate::store::{GroupStore, MemoryStore};
    use chrono::Utc;
    use std::sync::Arc;

    fn gate(store: &Arc<MemoryStore>) -> Gate {
        let (bus, _rx) = init_event_bus();
        Gate::new(
            RoleResolver::new(store.clone(), Some("root@outreach.example".to_string())),
            Stores::memory(store.clone()),
            bus,
        )
    }

    fn profile(store: &MemoryStore, role: Role) -> Identity {
        let id = Uuid::new_v4();
        let email = format!("{id}@example.org");
        let mut profile = Profile::new(id, email.clone(), None, Utc::now());
        profile.role = role;
        store.insert_profile(profile);
        Identity::new(id, email)
    }

    #[tokio::test]
    async fn admin_requirement_rejects_students() {
        let store = Arc::new(MemoryStore::new());
        let student = profile(&store, Role::Student);
        let pending = profile(&store, Role::PendingAdmin);
        let gate = gate(&store);

        assert!(matches!(
            gate.authorize(&student, Requirement::Admin).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            gate.authorize(&pending, Requirement::Admin).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn admin_requirement_accepts_admins_and_seeded_admin() {
        let store = Arc::new(MemoryStore::new());
        let admin = profile(&store, Role::Admin);
        let gate = gate(&store);

        let access = gate.authorize(&admin, Requirement::Admin).await.unwrap();
        assert_eq!(access.role().await, Role::Admin);

        let seeded = Identity::new(Uuid::new_v4(), "root@outreach.example");
        let access = gate.authorize(&seeded, Requirement::Admin).await.unwrap();
        assert_eq!(access.user_id(), seeded.user_id);
    }

    #[tokio::test]
    async fn member_requirement_checks_membership() {
        let store = Arc::new(MemoryStore::new());
        let member = profile(&store, Role::Student);
        let outsider = profile(&store, Role::Admin);
        let group = Group {
            id: Uuid::new_v4(),
            name: "week 1".to_string(),
            created_at: Utc::now(),
        };
        store.create_group(&group).await.unwrap();
        store.add_member(group.id, member.user_id, Utc::now()).await.unwrap();
        let gate = gate(&store);

        assert!(gate.authorize(&member, Requirement::Member(group.id)).await.is_ok());
        assert!(matches!(
            gate.authorize(&outsider, Requirement::Member(group.id)).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn membership_store_error_is_surfaced() {
        let store = Arc::new(MemoryStore::new());
        let member = profile(&store, Role::Student);
        let gate = gate(&store);
        store.set_unavailable(true);

        assert!(matches!(
            gate.authorize(&member, Requirement::Member(Uuid::new_v4())).await,
            Err(AppError::Store(_))
        ));
    }

    #[tokio::test]
    async fn authenticated_requirement_accepts_anyone_with_identity() {
        let store = Arc::new(MemoryStore::new());
        let gate = gate(&store);
        let stranger = Identity::new(Uuid::new_v4(), "stranger@example.org");

        let access = gate.authorize(&stranger, Requirement::Authenticated).await.unwrap();
        assert_eq!(access.role().await, Role::Student);
    }

    #[tokio::test]
    async fn member_requirement_does_not_read_the_profile() {
        let store = Arc::new(MemoryStore::new());
        let member = profile(&store, Role::Admin);
        let group = Group {
            id: Uuid::new_v4(),
            name: "week 2".to_string(),
            created_at: Utc::now(),
        };
        store.create_group(&group).await.unwrap();
        store.add_member(group.id, member.user_id, Utc::now()).await.unwrap();
        let gate = gate(&store);

        let access = gate.authorize(&member, Requirement::Member(group.id)).await.unwrap();
        assert_eq!(store.profile_reads(), 0);

        // resolved once on demand, then reused
        assert_eq!(access.role().await, Role::Admin);
        assert_eq!(access.role().await, Role::Admin);
        assert_eq!(store.profile_reads(), 1);
    }
}
