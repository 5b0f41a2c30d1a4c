//! Highlight Anchor
//!
//! Durable text highlights for HTML documents. A selection is described by a
//! structural path plus a quote with surrounding context, stored per document
//! URL, and re-located after reloads or edits.
//!
//! # Modules
//!
//! - `dom`: arena document tree, HTML parsing and serialization, live ranges
//! - `anchor`: text index, structural paths, quote context, resolver
//! - `highlights`: record types and the key-value backed store
//! - `render`: wrapper injection, quote and word renderers, interaction events
//! - `routes`: HTTP API served by the binary

pub mod anchor;
pub mod config;
pub mod dom;
pub mod error;
pub mod highlights;
pub mod render;
pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the HTTP application
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/health", get(routes::health::health_check))
        .nest("/api/v1/highlights", routes::highlights::router())
        .nest("/api/v1/preferences", routes::preferences::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
