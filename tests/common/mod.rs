#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use outreach_access::events::init_event_bus;
use outreach_access::store::{MemoryStore, Stores};
use outreach_access::{create_app, router, AppState, Config};

pub const SECRET: &str = "test-secret";
pub const SEEDED_ADMIN: &str = "root@outreach.example";

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    pub config: Config,
    // dropped last so the database file outlives the pool
    _dir: TempDir,
}

pub fn config() -> Config {
    Config::for_secret(SECRET).with_seeded_admin(SEEDED_ADMIN)
}

pub async fn sqlite_app() -> Result<TestApp> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator =
        sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    let config = config();
    let app = create_app(pool.clone(), config.clone()).await;

    Ok(TestApp {
        app,
        pool,
        config,
        _dir: dir,
    })
}

pub fn memory_app(store: Arc<MemoryStore>) -> Router {
    let (events, _rx) = init_event_bus();
    router(AppState::new(config(), Stores::memory(store), events))
}

pub fn token(user_id: Uuid, email: &str) -> String {
    config().jwt.encode(user_id, email).expect("token must sign")
}

/// Send a request and decode the JSON body (Null when empty).
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), 10_485_760).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };

    Ok((status, value))
}
