//! HTTP front end for actiongate.
//!
//! Provides:
//! - `GET /execute` - public, keyed action invocation
//! - Operator login with a sliding session cookie
//! - `/api/*` management of definitions and execution logs (session required)

pub mod auth;
pub mod config;
pub mod error;
pub mod protocol;
pub mod routes;
pub mod state;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;

use crate::routes::{definitions, execute, executions, health, session, stats};

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    let management = Router::new()
        .route("/api/session", get(session::current))
        .route(
            "/api/definitions",
            get(definitions::list).post(definitions::create),
        )
        .route(
            "/api/definitions/{id}",
            get(definitions::get)
                .put(definitions::update)
                .delete(definitions::delete),
        )
        .route("/api/definitions/{id}/toggle", put(definitions::toggle))
        .route(
            "/api/definitions/{id}/toggle-logging",
            put(definitions::toggle_logging),
        )
        .route(
            "/api/definitions/{id}/logs",
            get(definitions::logs).delete(definitions::clear_logs),
        )
        .route("/api/executions", get(executions::list))
        .route(
            "/api/executions/{id}",
            axum::routing::delete(executions::delete),
        )
        .route("/api/stats", get(stats::stats))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/execute", get(execute::execute))
        .route("/login", post(session::login))
        .route("/logout", post(session::logout))
        .merge(management)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
