//! HTTP API
//!
//! Thin axum layer over the party registry: routing, extraction and
//! status mapping live here, all party semantics live in the actor.

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::catalog::Catalog;
use crate::party::PartyRegistry;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: PartyRegistry,
    pub catalog: Option<Arc<dyn Catalog>>,
}

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/party", post(handlers::mint_party))
        .route("/api/party/:handle", get(handlers::party_snapshot))
        .route("/api/party/:handle/raw", get(handlers::party_raw))
        .route("/api/party/:handle/events", get(handlers::party_events))
        .route("/api/party/:handle/message", post(handlers::party_message))
        .route("/api/party/:handle/start", post(handlers::party_start))
        .route("/api/party/:handle/pause", post(handlers::party_pause))
        .route("/api/party/:handle/close", post(handlers::party_close))
        .route("/api/party/:handle/settings", post(handlers::party_settings))
        .route("/api/party/:handle/current", post(handlers::party_current))
        .route(
            "/api/party/:handle/songs/:external_id/priority",
            post(handlers::song_priority),
        )
        .route(
            "/api/party/:handle/songs/:external_id/position",
            post(handlers::song_position),
        )
        .route("/api/search", get(handlers::search))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
