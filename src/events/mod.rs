//! Activity log: an in-process event bus plus a listener that persists every
//! event into the hash-chained `activity_log` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod loggable;
pub use loggable::{Loggable, Severity};

use crate::models::activity::ActivityEntry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<T> {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub payload: T,
}

impl<T> DomainEvent<T> {
    pub fn new(name: impl Into<String>, actor_id: Option<Uuid>, subject_id: Option<Uuid>, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            occurred_at: Utc::now(),
            actor_id,
            subject_id,
            payload,
        }
    }
}

pub type EventBus = broadcast::Sender<Value>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<Value>) {
    broadcast::channel(1024)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPayload {
    #[serde(rename = "new")]
    pub current: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    pub severity: Severity,
}

/// Publish `<entity>.<action>` on the bus. Never fails the caller: with no
/// listener attached the event is dropped.
pub fn publish<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    actor_id: Option<Uuid>,
    entity: &T,
    old_entity: Option<&T>,
) {
    let payload = ActivityPayload {
        current: serde_json::to_value(entity).unwrap_or_default(),
        old: old_entity.map(|e| serde_json::to_value(e).unwrap_or_default()),
        severity: entity.severity_for_action(action),
    };

    let event = DomainEvent::new(
        format!("{}.{}", T::entity_type(), action),
        actor_id,
        Some(entity.subject_id()),
        payload,
    );

    if event_bus.send(serde_json::to_value(event).unwrap_or_default()).is_err() {
        tracing::debug!(action, entity = T::entity_type(), "no activity listener attached");
    }
}

/// `hex(sha256(prev_hash || payload))`
pub fn chain_hash(prev_hash: Option<&str>, payload: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

pub async fn start_activity_listener(mut rx: broadcast::Receiver<Value>, pool: SqlitePool) {
    tracing::info!("activity listener started");
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Err(err) = persist_event(&pool, &event).await {
                    tracing::error!(error = %err, "failed to persist activity event");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "activity listener lagged, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    tracing::info!("activity listener stopped");
}

async fn persist_event(pool: &SqlitePool, event: &Value) -> Result<(), sqlx::Error> {
    let name = event.get("name").and_then(Value::as_str).unwrap_or("unknown");
    let actor_id = event
        .get("actor_id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok());
    let subject_id = event
        .get("subject_id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok());
    let occurred_at = event
        .get("occurred_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    let severity = event
        .get("payload")
        .and_then(|p| p.get("severity"))
        .and_then(Value::as_str)
        .unwrap_or("important");
    let payload = serde_json::to_string(event).unwrap_or_default();

    let last = sqlx::query("SELECT seq, hash FROM activity_log ORDER BY seq DESC LIMIT 1")
        .fetch_optional(pool)
        .await?;
    let (seq, prev_hash) = match last {
        Some(row) => (row.try_get::<i64, _>("seq")? + 1, Some(row.try_get::<String, _>("hash")?)),
        None => (1, None),
    };
    let hash = chain_hash(prev_hash.as_deref(), &payload);

    sqlx::query(
        "INSERT INTO activity_log (id, seq, event_name, actor_id, subject_id, occurred_at, payload, severity, prev_hash, hash) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(seq)
    .bind(name)
    .bind(actor_id.map(|id| id.to_string()))
    .bind(subject_id.map(|id| id.to_string()))
    .bind(occurred_at)
    .bind(&payload)
    .bind(severity)
    .bind(&prev_hash)
    .bind(&hash)
    .execute(pool)
    .await?;

    tracing::debug!(event = name, seq, "activity event persisted");
    Ok(())
}

pub async fn fetch_activity(pool: &SqlitePool) -> anyhow::Result<Vec<ActivityEntry>> {
    let rows = sqlx::query(
        "SELECT id, seq, event_name, actor_id, subject_id, occurred_at, payload, severity, prev_hash, hash \
         FROM activity_log ORDER BY seq ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| crate::db::row_parsers::activity_from_row(row).map_err(anyhow::Error::from))
        .collect()
}

/// Outcome of walking the activity chain from the first entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainReport {
    Intact { entries: usize },
    Broken { seq: i64, reason: String },
}

pub fn verify_chain(entries: &[ActivityEntry]) -> ChainReport {
    let mut prev: Option<&str> = None;
    for entry in entries {
        if entry.prev_hash.as_deref() != prev {
            return ChainReport::Broken {
                seq: entry.seq,
                reason: "prev_hash does not match the preceding entry".to_string(),
            };
        }
        if chain_hash(prev, &entry.payload) != entry.hash {
            return ChainReport::Broken {
                seq: entry.seq,
                reason: "hash does not match payload".to_string(),
            };
        }
        prev = Some(entry.hash.as_str());
    }
    ChainReport::Intact { entries: entries.len() }
}
