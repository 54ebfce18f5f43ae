mod common;

use anyhow::Result;
use axum::http::StatusCode;

use common::{send, sqlite_app};

#[tokio::test]
async fn health_endpoint_reports_db_ok() -> Result<()> {
    let t = sqlite_app().await?;

    let (status, body) = send(&t.app, "GET", "/api/health", None, None).await?;
    assert_eq!(status, StatusCode::OK, "health endpoint did not return 200");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["db_ok"], true, "expected db_ok: true, got: {}", body);

    Ok(())
}
