use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One persisted row of the hash-chained activity log.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub seq: i64,
    pub event_name: String,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    pub payload: String,
    pub severity: String,
    pub prev_hash: Option<String>,
    pub hash: String,
}
