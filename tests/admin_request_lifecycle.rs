use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use outreach_access::authz::{Identity, RoleResolver};
use outreach_access::errors::AppError;
use outreach_access::events::init_event_bus;
use outreach_access::lifecycle::AdminRequestLifecycle;
use outreach_access::models::{AdminRequest, Decision, Profile, RequestStatus, Role};
use outreach_access::store::{AdminRequestStore, MemoryStore, StoreError, Stores};

const SEEDED_ADMIN: &str = "root@outreach.example";

fn lifecycle(store: &Arc<MemoryStore>) -> AdminRequestLifecycle {
    let (events, _rx) = init_event_bus();
    AdminRequestLifecycle::new(
        RoleResolver::new(store.clone(), Some(SEEDED_ADMIN.to_string())),
        Stores::memory(store.clone()),
        events,
    )
}

fn user(store: &MemoryStore, role: Role) -> Identity {
    let id = Uuid::new_v4();
    let email = format!("{id}@example.org");
    let mut profile = Profile::new(id, email.clone(), None, Utc::now());
    profile.role = role;
    store.insert_profile(profile);
    Identity::new(id, email)
}

#[tokio::test]
async fn empty_reason_is_rejected_without_a_row() {
    let store = Arc::new(MemoryStore::new());
    let student = user(&store, Role::Student);

    for reason in ["", "   ", "\n\t"] {
        let err = lifecycle(&store).submit(&student, reason).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)), "got {err:?}");
    }

    assert_eq!(store.request_count(), 0);
    assert_eq!(store.profile(student.user_id).unwrap().role, Role::Student);
}

#[tokio::test]
async fn second_submission_while_pending_is_a_duplicate() {
    let store = Arc::new(MemoryStore::new());
    let student = user(&store, Role::Student);
    let lifecycle = lifecycle(&store);

    lifecycle.submit(&student, "I run the Thursday sessions").await.unwrap();
    let err = lifecycle.submit(&student, "asking again").await.unwrap_err();

    assert!(matches!(err, AppError::DuplicateRequest(_)), "got {err:?}");
    assert_eq!(store.request_count(), 1);
}

#[tokio::test]
async fn resubmission_is_allowed_after_a_denial() {
    let store = Arc::new(MemoryStore::new());
    let student = user(&store, Role::Student);
    let admin = user(&store, Role::Admin);
    let lifecycle = lifecycle(&store);

    let first = lifecycle.submit(&student, "first try").await.unwrap();
    lifecycle.decide(first.id, Decision::Deny, &admin).await.unwrap();

    let second = lifecycle.submit(&student, "second try").await.unwrap();
    assert!(second.is_pending());
    assert_eq!(store.request_count(), 2);
}

#[tokio::test]
async fn submit_creates_profile_for_first_time_caller() {
    let store = Arc::new(MemoryStore::new());
    let newcomer = Identity::new(Uuid::new_v4(), "new@example.org");

    let request = lifecycle(&store).submit(&newcomer, "  trim me  ").await.unwrap();

    assert_eq!(request.reason, "trim me");
    let profile = store.profile(newcomer.user_id).expect("profile upserted");
    assert_eq!(profile.email, "new@example.org");
    assert_eq!(profile.role, Role::PendingAdmin);
}

#[tokio::test]
async fn submit_never_demotes_an_admin() {
    let store = Arc::new(MemoryStore::new());
    let admin = user(&store, Role::Admin);

    lifecycle(&store).submit(&admin, "already admin").await.unwrap();

    assert_eq!(store.profile(admin.user_id).unwrap().role, Role::Admin);
}

#[tokio::test]
async fn approve_promotes_and_second_decision_is_already_processed() {
    let store = Arc::new(MemoryStore::new());
    let student = user(&store, Role::Student);
    let admin = user(&store, Role::Admin);
    let lifecycle = lifecycle(&store);

    let request = lifecycle.submit(&student, "want to help").await.unwrap();
    let decided = lifecycle.decide(request.id, Decision::Approve, &admin).await.unwrap();

    assert_eq!(decided.status, RequestStatus::Approved);
    assert_eq!(decided.reviewed_by, Some(admin.user_id));
    assert!(decided.reviewed_at.is_some());
    assert_eq!(store.profile(student.user_id).unwrap().role, Role::Admin);

    let err = lifecycle.decide(request.id, Decision::Deny, &admin).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyProcessed(_)), "got {err:?}");

    let stored = store.request(request.id).unwrap();
    assert_eq!(stored, decided);
    assert_eq!(store.profile(student.user_id).unwrap().role, Role::Admin);
}

#[tokio::test]
async fn deny_returns_requester_to_student() {
    let store = Arc::new(MemoryStore::new());
    let student = user(&store, Role::Student);
    let admin = user(&store, Role::Admin);
    let lifecycle = lifecycle(&store);

    let request = lifecycle.submit(&student, "please").await.unwrap();
    assert_eq!(store.profile(student.user_id).unwrap().role, Role::PendingAdmin);

    let decided = lifecycle.decide(request.id, Decision::Deny, &admin).await.unwrap();

    assert_eq!(decided.status, RequestStatus::Denied);
    assert_eq!(store.profile(student.user_id).unwrap().role, Role::Student);
}

#[tokio::test]
async fn non_admin_reviewer_is_forbidden_and_nothing_changes() {
    let store = Arc::new(MemoryStore::new());
    let student = user(&store, Role::Student);
    let lifecycle = lifecycle(&store);
    let request = lifecycle.submit(&student, "please").await.unwrap();

    for role in [Role::Student, Role::PendingAdmin] {
        let reviewer = user(&store, role);
        let err = lifecycle
            .decide(request.id, Decision::Approve, &reviewer)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)), "got {err:?}");
    }

    assert_eq!(store.request(request.id).unwrap(), request);
    assert_eq!(store.profile(student.user_id).unwrap().role, Role::PendingAdmin);
}

#[tokio::test]
async fn seeded_admin_can_decide_without_a_profile() {
    let store = Arc::new(MemoryStore::new());
    let student = user(&store, Role::Student);
    let operator = Identity::new(Uuid::new_v4(), SEEDED_ADMIN);
    let lifecycle = lifecycle(&store);

    let request = lifecycle.submit(&student, "please").await.unwrap();
    let decided = lifecycle.decide(request.id, Decision::Approve, &operator).await.unwrap();

    assert_eq!(decided.reviewed_by, Some(operator.user_id));
    assert_eq!(store.profile(student.user_id).unwrap().role, Role::Admin);
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let admin = user(&store, Role::Admin);

    let err = lifecycle(&store)
        .decide(Uuid::new_v4(), Decision::Approve, &admin)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn failed_role_write_rolls_request_back_to_pending() {
    let store = Arc::new(MemoryStore::new());
    let student = user(&store, Role::Student);
    let admin = user(&store, Role::Admin);
    let lifecycle = lifecycle(&store);
    let request = lifecycle.submit(&student, "please").await.unwrap();

    store.fail_role_writes(true);
    let err = lifecycle.decide(request.id, Decision::Approve, &admin).await.unwrap_err();
    assert!(matches!(err, AppError::Store(_)), "got {err:?}");

    let stored = store.request(request.id).unwrap();
    assert_eq!(stored.status, RequestStatus::Pending);
    assert_eq!(stored.reviewed_by, None);
    assert_eq!(stored.reviewed_at, None);
    assert_eq!(store.profile(student.user_id).unwrap().role, Role::PendingAdmin);

    // the reverted request can be decided once the store recovers
    store.fail_role_writes(false);
    let decided = lifecycle.decide(request.id, Decision::Approve, &admin).await.unwrap();
    assert_eq!(decided.status, RequestStatus::Approved);
    assert_eq!(store.profile(student.user_id).unwrap().role, Role::Admin);
}

#[tokio::test]
async fn failed_role_write_on_deny_also_rolls_back() {
    let store = Arc::new(MemoryStore::new());
    let student = user(&store, Role::Student);
    let admin = user(&store, Role::Admin);
    let lifecycle = lifecycle(&store);
    let request = lifecycle.submit(&student, "please").await.unwrap();

    store.fail_role_writes(true);
    assert!(lifecycle.decide(request.id, Decision::Deny, &admin).await.is_err());

    assert!(store.request(request.id).unwrap().is_pending());
}

#[tokio::test]
async fn submitted_then_approved_requester_resolves_to_admin() {
    let store = Arc::new(MemoryStore::new());
    let u1 = user(&store, Role::Student);
    let a1 = user(&store, Role::Admin);
    let lifecycle = lifecycle(&store);
    let resolver = RoleResolver::new(store.clone(), Some(SEEDED_ADMIN.to_string()));

    let request = lifecycle.submit(&u1, "want to help manage content").await.unwrap();
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(resolver.resolve(&u1).await, Role::PendingAdmin);

    let decided = lifecycle.decide(request.id, Decision::Approve, &a1).await.unwrap();
    assert_eq!(decided.status, RequestStatus::Approved);
    assert_eq!(resolver.resolve(&u1).await, Role::Admin);
}

#[tokio::test]
async fn back_to_back_decisions_only_one_wins() {
    let store = Arc::new(MemoryStore::new());
    let student = user(&store, Role::Student);
    let admin = user(&store, Role::Admin);
    let request = lifecycle(&store).submit(&student, "please").await.unwrap();

    let approve = lifecycle(&store);
    let deny = lifecycle(&store);
    let (a, b) = tokio::join!(
        approve.decide(request.id, Decision::Approve, &admin),
        deny.decide(request.id, Decision::Deny, &admin)
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(AppError::AlreadyProcessed(_)))));

    let winner = results.iter().find_map(|r| r.as_ref().ok()).unwrap();
    let expected_role = if winner.status == RequestStatus::Approved {
        Role::Admin
    } else {
        Role::Student
    };
    assert_eq!(store.profile(student.user_id).unwrap().role, expected_role);
}

/// Serves a snapshot of one request from `find_request`, as a reader that
/// raced a concurrent decision would see it. Writes go to the real store.
struct SnapshotReads {
    inner: Arc<MemoryStore>,
    snapshot: AdminRequest,
}

#[async_trait]
impl AdminRequestStore for SnapshotReads {
    async fn find_request(&self, id: Uuid) -> Result<Option<AdminRequest>, StoreError> {
        if id == self.snapshot.id {
            return Ok(Some(self.snapshot.clone()));
        }
        self.inner.find_request(id).await
    }

    async fn find_pending_for_user(&self, user_id: Uuid) -> Result<Option<AdminRequest>, StoreError> {
        self.inner.find_pending_for_user(user_id).await
    }

    async fn insert_request(&self, request: &AdminRequest) -> Result<(), StoreError> {
        self.inner.insert_request(request).await
    }

    async fn transition(
        &self,
        id: Uuid,
        from: RequestStatus,
        to: RequestStatus,
        reviewed_by: Option<Uuid>,
        reviewed_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        self.inner.transition(id, from, to, reviewed_by, reviewed_at).await
    }

    async fn list_requests(&self, status: Option<RequestStatus>) -> Result<Vec<AdminRequest>, StoreError> {
        self.inner.list_requests(status).await
    }

    async fn list_requests_for_user(&self, user_id: Uuid) -> Result<Vec<AdminRequest>, StoreError> {
        self.inner.list_requests_for_user(user_id).await
    }
}

#[tokio::test]
async fn decision_on_a_stale_pending_read_loses_the_status_swap() {
    let store = Arc::new(MemoryStore::new());
    let student = user(&store, Role::Student);
    let first_admin = user(&store, Role::Admin);
    let second_admin = user(&store, Role::Admin);

    let request = lifecycle(&store).submit(&student, "please").await.unwrap();
    let stale = SnapshotReads {
        inner: store.clone(),
        snapshot: request.clone(),
    };

    let approved = lifecycle(&store)
        .decide(request.id, Decision::Approve, &first_admin)
        .await
        .unwrap();

    let (events, _rx) = init_event_bus();
    let racing = AdminRequestLifecycle::new(
        RoleResolver::new(store.clone(), None),
        Stores::new(store.clone(), Arc::new(stale), store.clone()),
        events,
    );
    let err = racing
        .decide(request.id, Decision::Deny, &second_admin)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::AlreadyProcessed(_)), "got {err:?}");
    assert_eq!(store.request(request.id).unwrap(), approved);
    // the deny never reached the profile
    assert_eq!(store.profile(student.user_id).unwrap().role, Role::Admin);
}
