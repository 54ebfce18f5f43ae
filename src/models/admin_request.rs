use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::events::Severity;

use super::role::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Denied => "denied",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown request status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for RequestStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "denied" => Ok(RequestStatus::Denied),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Reviewer action on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Deny,
}

impl Decision {
    pub fn resulting_status(&self) -> RequestStatus {
        match self {
            Decision::Approve => RequestStatus::Approved,
            Decision::Deny => RequestStatus::Denied,
        }
    }

    /// Role mirrored onto the requester's profile.
    pub fn granted_role(&self) -> Role {
        match self {
            Decision::Approve => Role::Admin,
            Decision::Deny => Role::Student,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AdminRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reason: String,
    pub status: RequestStatus,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AdminRequest {
    pub fn pending(user_id: Uuid, reason: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            reason: reason.into(),
            status: RequestStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            created_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

impl crate::events::Loggable for AdminRequest {
    fn entity_type() -> &'static str { "admin_request" }
    fn subject_id(&self) -> Uuid { self.id }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "approved" | "rolled_back" => Severity::Critical,
            _ => self.severity(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminRequestCreate {
    #[schema(example = "want to help manage content")]
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DecisionRequest {
    pub action: Decision,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListRequestsQuery {
    /// Only return requests in this status
    pub status: Option<RequestStatus>,
}
