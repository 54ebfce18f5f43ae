pub mod app;
pub mod authz;
pub mod config;
pub mod db;
pub mod docs;
pub mod errors;
pub mod events;
pub mod extract;
pub mod jwt;
pub mod lifecycle;
pub mod models;
pub mod routes;
pub mod store;
pub mod utils;

// Re-export commonly used items for tests
pub use app::{create_app, router, AppState};
pub use config::Config;
