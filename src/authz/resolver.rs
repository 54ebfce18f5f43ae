use std::sync::Arc;

use crate::models::Role;
use crate::store::ProfileStore;

use super::Identity;

/// Derives the effective role of an identity.
///
/// Resolution order:
/// 1. seeded-admin email (exact match) -> admin, no store access
/// 2. profile row -> its role
/// 3. no row, or the read failed -> student
///
/// Every call is a fresh read; role changes take effect on the next request.
#[derive(Clone)]
pub struct RoleResolver {
    profiles: Arc<dyn ProfileStore>,
    seeded_admin_email: Option<String>,
}

impl RoleResolver {
    pub fn new(profiles: Arc<dyn ProfileStore>, seeded_admin_email: Option<String>) -> Self {
        Self {
            profiles,
            seeded_admin_email,
        }
    }

    pub fn is_seeded_admin(&self, email: &str) -> bool {
        self.seeded_admin_email.as_deref() == Some(email)
    }

    pub async fn resolve(&self, identity: &Identity) -> Role {
        if self.is_seeded_admin(&identity.email) {
            tracing::debug!(user_id = %identity.user_id, "seeded admin bypass");
            return Role::Admin;
        }

        match self.profiles.find_profile(identity.user_id).await {
            Ok(Some(profile)) => profile.role,
            Ok(None) => {
                tracing::debug!(user_id = %identity.user_id, "no profile, defaulting to student");
                Role::Student
            }
            // Reads fail open to the least privileged role.
            Err(err) => {
                tracing::warn!(
                    user_id = %identity.user_id,
                    error = %err,
                    "profile lookup failed, defaulting to student"
                );
                Role::Student
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Profile;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use uuid::Uuid;

    const OPERATOR: &str = "operator@outreach.example";

    fn resolver(store: &Arc<MemoryStore>) -> RoleResolver {
        RoleResolver::new(store.clone(), Some(OPERATOR.to_string()))
    }

    #[tokio::test]
    async fn seeded_admin_skips_the_store() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let identity = Identity::new(Uuid::new_v4(), OPERATOR);

        assert_eq!(resolver(&store).resolve(&identity).await, Role::Admin);
        assert_eq!(store.profile_reads(), 0);
    }

    #[tokio::test]
    async fn seeded_admin_overrides_a_student_profile() {
        let store = Arc::new(MemoryStore::new());
        let id = Uuid::new_v4();
        store.insert_profile(Profile::new(id, OPERATOR, None, Utc::now()));

        assert_eq!(resolver(&store).resolve(&Identity::new(id, OPERATOR)).await, Role::Admin);
    }

    #[tokio::test]
    async fn seeded_admin_match_is_exact() {
        let store = Arc::new(MemoryStore::new());
        let identity = Identity::new(Uuid::new_v4(), "Operator@outreach.example");

        assert_eq!(resolver(&store).resolve(&identity).await, Role::Student);
    }

    #[tokio::test]
    async fn missing_profile_is_student() {
        let store = Arc::new(MemoryStore::new());
        let identity = Identity::new(Uuid::new_v4(), "new@example.org");

        assert_eq!(resolver(&store).resolve(&identity).await, Role::Student);
        assert_eq!(store.profile_reads(), 1);
    }

    #[tokio::test]
    async fn store_error_fails_open_to_student() {
        let store = Arc::new(MemoryStore::new());
        let id = Uuid::new_v4();
        let mut profile = Profile::new(id, "a@example.org", None, Utc::now());
        profile.role = Role::Admin;
        store.insert_profile(profile);
        store.set_unavailable(true);

        assert_eq!(resolver(&store).resolve(&Identity::new(id, "a@example.org")).await, Role::Student);
    }

    #[tokio::test]
    async fn profile_role_is_returned() {
        let store = Arc::new(MemoryStore::new());
        let id = Uuid::new_v4();
        let mut profile = Profile::new(id, "p@example.org", None, Utc::now());
        profile.role = Role::PendingAdmin;
        store.insert_profile(profile);

        assert_eq!(resolver(&store).resolve(&Identity::new(id, "p@example.org")).await, Role::PendingAdmin);
    }

    #[tokio::test]
    async fn no_seeded_admin_configured() {
        let store = Arc::new(MemoryStore::new());
        let resolver = RoleResolver::new(store.clone(), None);

        assert!(!resolver.is_seeded_admin(""));
        assert_eq!(resolver.resolve(&Identity::new(Uuid::new_v4(), OPERATOR)).await, Role::Student);
    }
}
