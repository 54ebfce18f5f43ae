//! Admin request lifecycle: a student asks for promotion, an admin approves
//! or denies, and the requester's profile role mirrors the outcome.
//!
//! The request row and the profile row live in different stores with no
//! shared transaction. A failed profile write after a successful status
//! write is undone by moving the request back to `pending`.

use uuid::Uuid;

use crate::authz::{Identity, RoleResolver};
use crate::errors::{AppError, AppResult};
use crate::events::{publish, EventBus};
use crate::models::{AdminRequest, Decision, Profile, RequestStatus, Role};
use crate::store::{StoreError, Stores};
use crate::utils::{require_text, utc_now};

pub struct AdminRequestLifecycle {
    resolver: RoleResolver,
    stores: Stores,
    events: EventBus,
}

impl AdminRequestLifecycle {
    pub fn new(resolver: RoleResolver, stores: Stores, events: EventBus) -> Self {
        Self {
            resolver,
            stores,
            events,
        }
    }

    pub async fn submit(&self, requester: &Identity, reason: &str) -> AppResult<AdminRequest> {
        let reason = require_text("reason", reason)?;

        if self
            .stores
            .requests
            .find_pending_for_user(requester.user_id)
            .await?
            .is_some()
        {
            return Err(AppError::duplicate_request("a pending admin request already exists"));
        }

        let now = utc_now();
        self.stores
            .profiles
            .upsert_profile(&Profile::new(requester.user_id, requester.email.clone(), None, now))
            .await?;

        let request = AdminRequest::pending(requester.user_id, reason, now);
        match self.stores.requests.insert_request(&request).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                return Err(AppError::duplicate_request("a pending admin request already exists"));
            }
            Err(err) => return Err(err.into()),
        }

        // Best effort; never clobber an admin or an existing pending_admin.
        match self
            .stores
            .profiles
            .set_role_if(requester.user_id, Role::Student, Role::PendingAdmin, now)
            .await
        {
            Ok(true) => tracing::info!(user_id = %requester.user_id, "role set to pending_admin"),
            Ok(false) => tracing::debug!(user_id = %requester.user_id, "role left unchanged on submit"),
            Err(err) => tracing::warn!(
                user_id = %requester.user_id,
                error = %err,
                "could not mark requester as pending_admin"
            ),
        }

        tracing::info!(request_id = %request.id, user_id = %requester.user_id, "admin request submitted");
        publish(&self.events, "submitted", Some(requester.user_id), &request, None);

        Ok(request)
    }

    pub async fn decide(&self, request_id: Uuid, decision: Decision, reviewer: &Identity) -> AppResult<AdminRequest> {
        let reviewer_role = self.resolver.resolve(reviewer).await;
        if !reviewer_role.is_admin() {
            tracing::warn!(
                reviewer = %reviewer.user_id,
                role = %reviewer_role,
                %request_id,
                "non-admin attempted to decide an admin request"
            );
            return Err(AppError::forbidden("admin role required"));
        }

        let request = self
            .stores
            .requests
            .find_request(request_id)
            .await?
            .ok_or_else(|| AppError::not_found("admin request not found"))?;

        if !request.is_pending() {
            return Err(AppError::already_processed(format!("request is already {}", request.status)));
        }

        let now = utc_now();
        let target = decision.resulting_status();
        let swapped = self
            .stores
            .requests
            .transition(request_id, RequestStatus::Pending, target, Some(reviewer.user_id), Some(now))
            .await?;
        if !swapped {
            // lost the race against a concurrent decision
            return Err(AppError::already_processed("request was processed concurrently"));
        }

        let decided = AdminRequest {
            status: target,
            reviewed_by: Some(reviewer.user_id),
            reviewed_at: Some(now),
            ..request.clone()
        };

        let granted = decision.granted_role();
        let role_write = self.stores.profiles.set_role(request.user_id, granted, now).await;
        let failure = match role_write {
            Ok(true) => None,
            Ok(false) => Some(AppError::not_found("requester profile not found")),
            Err(err) => Some(AppError::from(err)),
        };
        if let Some(err) = failure {
            self.roll_back(&decided, reviewer).await;
            return Err(err);
        }

        tracing::info!(
            %request_id,
            reviewer = %reviewer.user_id,
            requester = %request.user_id,
            status = %target,
            role = %granted,
            "admin request decided"
        );
        publish(&self.events, target.as_str(), Some(reviewer.user_id), &decided, Some(&request));

        Ok(decided)
    }

    async fn roll_back(&self, decided: &AdminRequest, reviewer: &Identity) {
        match self
            .stores
            .requests
            .transition(decided.id, decided.status, RequestStatus::Pending, None, None)
            .await
        {
            Ok(true) => {
                tracing::warn!(request_id = %decided.id, "profile update failed, request reverted to pending");
                let reverted = AdminRequest {
                    status: RequestStatus::Pending,
                    reviewed_by: None,
                    reviewed_at: None,
                    ..decided.clone()
                };
                publish(&self.events, "rolled_back", Some(reviewer.user_id), &reverted, Some(decided));
            }
            Ok(false) => tracing::error!(
                request_id = %decided.id,
                "rollback skipped, request no longer in {}",
                decided.status
            ),
            Err(err) => tracing::error!(
                request_id = %decided.id,
                error = %err,
                "rollback failed, request left as {}",
                decided.status
            ),
        }
    }
}
