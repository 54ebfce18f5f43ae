use outreach_access::config::{load_env, Config};
use outreach_access::{create_app, db, docs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let config = Config::from_env()?;
    let port = config.port;
    if config.seeded_admin_email.is_none() {
        tracing::warn!("SEEDED_ADMIN_EMAIL not set; only profile roles grant admin");
    }

    let pool = db::init(&config.database_url).await?;
    let openapi = docs::build_openapi(port)?;
    let app = create_app(pool, config).await.merge(docs::swagger_routes(openapi)?);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{}", addr);
    tracing::info!("swagger ui at http://localhost:{}/docs", port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
