use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{Gate, RoleResolver, RouteGuard, RouteRules};
use crate::config::Config;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::routes::{admin, admin_requests, groups, health, navigation, profiles};
use crate::store::{SqliteStore, Stores};

/// Shared handler state. Handlers never see a pool or a store directly;
/// data access goes through `gate.authorize`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gate: Arc<Gate>,
    pub guard: Arc<RouteGuard>,
}

impl AppState {
    pub fn new(config: Config, stores: Stores, events: EventBus) -> Self {
        let resolver = RoleResolver::new(stores.profiles.clone(), config.seeded_admin_email.clone());
        let guard = RouteGuard::new(resolver.clone(), config.landing.clone(), RouteRules::default());
        let gate = Gate::new(resolver, stores, events);

        Self {
            config: Arc::new(config),
            gate: Arc::new(gate),
            guard: Arc::new(guard),
        }
    }
}

/// SQLite-backed application with the activity log listener running.
pub async fn create_app(pool: SqlitePool, config: Config) -> Router {
    let (events, rx) = init_event_bus();
    tokio::spawn(start_activity_listener(rx, pool.clone()));

    let stores = Stores::sqlite(SqliteStore::new(pool));
    router(AppState::new(config, stores, events))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let admin_request_routes = Router::new()
        .route("/", get(admin_requests::list).post(admin_requests::submit))
        .route("/mine", get(admin_requests::mine))
        .route("/:id/decision", post(admin_requests::decide));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/:id/role", put(admin::update_role));

    let group_routes = Router::new()
        .route("/", post(groups::create_group))
        .route("/:id/members", get(groups::list_members).post(groups::add_member))
        .route("/:id/messages", get(groups::list_messages).post(groups::post_message));

    Router::new()
        .route("/api/health", get(health::health))
        .route("/navigation/check", get(navigation::check))
        .route("/profile/me", get(profiles::me))
        .nest("/admin-requests", admin_request_routes)
        .nest("/admin", admin_routes)
        .nest("/groups", group_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
