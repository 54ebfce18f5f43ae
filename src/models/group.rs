use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupMember {
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub email: Option<String>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Message {
    pub id: Uuid,
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl crate::events::Loggable for Group {
    fn entity_type() -> &'static str { "group" }
    fn subject_id(&self) -> Uuid { self.id }
}

impl crate::events::Loggable for GroupMember {
    fn entity_type() -> &'static str { "group_member" }
    fn subject_id(&self) -> Uuid { self.user_id }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GroupCreateRequest {
    #[schema(example = "Week 3 team")]
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MemberAddRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MessageCreateRequest {
    #[schema(example = "Photos from Tuesday are up")]
    pub body: String,
}
