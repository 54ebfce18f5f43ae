use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::role::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    #[schema(example = "student@example.org")]
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// A fresh profile for a first sign-in; always starts as a student.
    pub fn new(id: Uuid, email: impl Into<String>, full_name: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            email: email.into(),
            full_name,
            role: Role::Student,
            created_at: now,
            updated_at: now,
        }
    }
}

impl crate::events::Loggable for Profile {
    fn entity_type() -> &'static str { "profile" }
    fn subject_id(&self) -> Uuid { self.id }
}

/// Response for `GET /profile/me`.
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub profile: Profile,
    /// Role after the seeded-admin override; may differ from `profile.role`.
    pub effective_role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleUpdateRequest {
    #[schema(example = "admin")]
    pub role: Role,
}
