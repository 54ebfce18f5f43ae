use serde::Serialize;

use crate::config::LandingPaths;
use crate::models::Role;

use super::{Identity, RoleResolver};

/// What a navigable route demands of the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardOptions {
    pub require_auth: bool,
    pub require_admin: bool,
    /// Admins are sent to their own landing page instead.
    pub student_only: bool,
}

impl GuardOptions {
    pub const PUBLIC: Self = Self {
        require_auth: false,
        require_admin: false,
        student_only: false,
    };
    pub const AUTHENTICATED: Self = Self {
        require_auth: true,
        require_admin: false,
        student_only: false,
    };
    pub const ADMIN: Self = Self {
        require_auth: true,
        require_admin: true,
        student_only: false,
    };
    pub const STUDENT_ONLY: Self = Self {
        require_auth: true,
        require_admin: false,
        student_only: true,
    };

    fn needs_identity(&self) -> bool {
        self.require_auth || self.require_admin || self.student_only
    }

    fn needs_role(&self) -> bool {
        self.require_admin || self.student_only
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GuardState {
    Loading,
    Authorized,
    Redirecting { location: String },
}

/// Pure transition out of `Loading` once identity and role are known.
pub fn decide(
    options: GuardOptions,
    identity: Option<&Identity>,
    role: Option<Role>,
    path: &str,
    landing: &LandingPaths,
) -> GuardState {
    if options.needs_identity() && identity.is_none() {
        return GuardState::Redirecting {
            location: format!("{}?redirect={}", landing.login, urlencoding::encode(path)),
        };
    }

    let role = role.unwrap_or_default();
    if options.require_admin && !role.is_admin() {
        return GuardState::Redirecting {
            location: landing.student_home.clone(),
        };
    }
    if options.student_only && role.is_admin() {
        return GuardState::Redirecting {
            location: landing.admin_home.clone(),
        };
    }

    GuardState::Authorized
}

/// Path-prefix table mapping UI routes to guard options.
#[derive(Debug, Clone)]
pub struct RouteRules {
    rules: Vec<(String, GuardOptions)>,
}

impl RouteRules {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with(mut self, prefix: impl Into<String>, options: GuardOptions) -> Self {
        self.rules.push((prefix.into(), options));
        self
    }

    /// Longest matching prefix wins; a prefix only matches whole segments.
    pub fn options_for(&self, path: &str) -> GuardOptions {
        self.rules
            .iter()
            .filter(|(prefix, _)| {
                path == prefix.as_str()
                    || path
                        .strip_prefix(prefix.as_str())
                        .map_or(false, |rest| rest.starts_with('/') || rest.starts_with('?'))
            })
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, options)| *options)
            .unwrap_or(GuardOptions::PUBLIC)
    }
}

impl Default for RouteRules {
    fn default() -> Self {
        Self::new()
            .with("/admin", GuardOptions::ADMIN)
            .with("/dashboard", GuardOptions::STUDENT_ONLY)
            .with("/uploads", GuardOptions::STUDENT_ONLY)
            .with("/chat", GuardOptions::STUDENT_ONLY)
            .with("/career", GuardOptions::STUDENT_ONLY)
            .with("/profile", GuardOptions::AUTHENTICATED)
    }
}

/// Navigation check shared by the edge endpoint and client-side sessions.
#[derive(Clone)]
pub struct RouteGuard {
    resolver: RoleResolver,
    landing: LandingPaths,
    rules: RouteRules,
}

impl RouteGuard {
    pub fn new(resolver: RoleResolver, landing: LandingPaths, rules: RouteRules) -> Self {
        Self {
            resolver,
            landing,
            rules,
        }
    }

    pub fn rules(&self) -> &RouteRules {
        &self.rules
    }

    /// Evaluate `path` against the route table.
    pub async fn check(&self, identity: Option<&Identity>, path: &str) -> GuardState {
        self.evaluate(self.rules.options_for(path), identity, path).await
    }

    /// Evaluate explicit options. The role is only resolved when the options
    /// depend on it.
    pub async fn evaluate(&self, options: GuardOptions, identity: Option<&Identity>, path: &str) -> GuardState {
        let role = match identity {
            Some(identity) if options.needs_role() => Some(self.resolver.resolve(identity).await),
            _ => None,
        };

        let state = decide(options, identity, role, path, &self.landing);
        if let GuardState::Redirecting { location } = &state {
            tracing::debug!(path, location = %location, "navigation redirected");
        }
        state
    }
}

/// One guarded mount per navigation. Each `navigate` starts a fresh mount in
/// `Loading`; a mount that redirected stays redirected.
#[derive(Debug)]
pub struct GuardSession {
    options: GuardOptions,
    state: GuardState,
    redirects: Vec<String>,
}

impl GuardSession {
    pub fn new(options: GuardOptions) -> Self {
        Self {
            options,
            state: GuardState::Loading,
            redirects: Vec::new(),
        }
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    pub fn renders_children(&self) -> bool {
        self.state == GuardState::Authorized
    }

    /// Every redirect issued so far, oldest first.
    pub fn redirects(&self) -> &[String] {
        &self.redirects
    }

    pub async fn navigate(&mut self, guard: &RouteGuard, identity: Option<&Identity>, path: &str) -> &GuardState {
        self.state = GuardState::Loading;
        let next = guard.evaluate(self.options, identity, path).await;
        self.settle(next)
    }

    /// Re-check the current mount, e.g. after the session changed.
    pub async fn refresh(&mut self, guard: &RouteGuard, identity: Option<&Identity>, path: &str) -> &GuardState {
        if matches!(self.state, GuardState::Redirecting { .. }) {
            return &self.state;
        }
        let next = guard.evaluate(self.options, identity, path).await;
        self.settle(next)
    }

    fn settle(&mut self, next: GuardState) -> &GuardState {
        if let GuardState::Redirecting { location } = &next {
            self.redirects.push(location.clone());
        }
        self.state = next;
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Profile;
    use crate::store::{MemoryStore, ProfileStore};
    use chrono::Utc;
    use std::sync::Arc;
    use uuid::Uuid;

    fn guard(store: &Arc<MemoryStore>) -> RouteGuard {
        RouteGuard::new(
            RoleResolver::new(store.clone(), None),
            LandingPaths::default(),
            RouteRules::default(),
        )
    }

    fn user(store: &MemoryStore, role: Role) -> Identity {
        let id = Uuid::new_v4();
        let mut profile = Profile::new(id, "someone@example.org", None, Utc::now());
        profile.role = role;
        store.insert_profile(profile);
        Identity::new(id, "someone@example.org")
    }

    #[test]
    fn anonymous_is_sent_to_login_with_return_path() {
        let state = decide(GuardOptions::AUTHENTICATED, None, None, "/profile/edit", &LandingPaths::default());
        assert_eq!(
            state,
            GuardState::Redirecting {
                location: "/login?redirect=%2Fprofile%2Fedit".to_string()
            }
        );
    }

    #[test]
    fn public_routes_need_nothing() {
        assert_eq!(
            decide(GuardOptions::PUBLIC, None, None, "/", &LandingPaths::default()),
            GuardState::Authorized
        );
    }

    #[test]
    fn route_rules_match_whole_segments() {
        let rules = RouteRules::default();
        assert_eq!(rules.options_for("/admin"), GuardOptions::ADMIN);
        assert_eq!(rules.options_for("/admin/requests"), GuardOptions::ADMIN);
        assert_eq!(rules.options_for("/administrivia"), GuardOptions::PUBLIC);
        assert_eq!(rules.options_for("/dashboard?week=3"), GuardOptions::STUDENT_ONLY);
        assert_eq!(rules.options_for("/login"), GuardOptions::PUBLIC);
    }

    #[tokio::test]
    async fn admin_route_redirects_student_exactly_once() {
        let store = Arc::new(MemoryStore::new());
        let student = user(&store, Role::Student);
        let guard = guard(&store);
        let mut session = GuardSession::new(GuardOptions::ADMIN);

        let state = session.navigate(&guard, Some(&student), "/admin").await.clone();
        assert_eq!(state, GuardState::Redirecting { location: "/dashboard".to_string() });
        assert!(!session.renders_children());

        // the redirecting mount is terminal
        session.refresh(&guard, Some(&student), "/admin").await;
        assert_eq!(session.redirects().to_vec(), vec!["/dashboard".to_string()]);
    }

    #[tokio::test]
    async fn admin_route_renders_for_admin_without_redirect() {
        let store = Arc::new(MemoryStore::new());
        let admin = user(&store, Role::Admin);
        let guard = guard(&store);
        let mut session = GuardSession::new(GuardOptions::ADMIN);

        session.navigate(&guard, Some(&admin), "/admin").await;
        assert!(session.renders_children());
        assert!(session.redirects().is_empty());
    }

    #[tokio::test]
    async fn admin_on_student_route_goes_to_admin_home() {
        let store = Arc::new(MemoryStore::new());
        let admin = user(&store, Role::Admin);
        let guard = guard(&store);

        assert_eq!(
            guard.check(Some(&admin), "/dashboard").await,
            GuardState::Redirecting { location: "/admin".to_string() }
        );
    }

    #[tokio::test]
    async fn role_change_is_seen_on_next_navigation() {
        let store = Arc::new(MemoryStore::new());
        let user_identity = user(&store, Role::PendingAdmin);
        let guard = guard(&store);
        let mut session = GuardSession::new(GuardOptions::ADMIN);

        session.navigate(&guard, Some(&user_identity), "/admin").await;
        assert!(!session.renders_children());

        store
            .set_role(user_identity.user_id, Role::Admin, Utc::now())
            .await
            .unwrap();

        session.navigate(&guard, Some(&user_identity), "/admin").await;
        assert!(session.renders_children());
        assert_eq!(session.redirects().len(), 1);
    }
}
