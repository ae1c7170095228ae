//! Courier Logistics Service
//!
//! Consignment booking, vehicle manifests, delivery and returns for a
//! multi-branch courier network.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use store::Stores;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(stores: Stores, config: Config) -> Self {
        Self {
            stores,
            config: Arc::new(config),
        }
    }

    /// State backed by the in-memory store
    pub fn in_memory() -> Self {
        Self::new(Stores::in_memory(), Config::in_memory())
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Courier Logistics Service API v1"
}
