//! HTTP request handlers

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    Json,
};
use futures::stream::Stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;

use micdrop_common::wire::{ClientMessage, PartyView, RawPartyView, VideoInfo};

use crate::api::AppState;
use crate::error::ApiError;
use crate::party::OperatorAction;

// Request/response types

#[derive(Debug, Serialize)]
pub struct MintResponse {
    pub handle: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRequest {
    pub fairness_enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSongRequest {
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub remaining_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityRequest {
    pub is_priority: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRequest {
    #[serde(default)]
    pub order_index: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

// Service endpoints

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "micdrop-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /api/party
pub async fn mint_party(State(state): State<AppState>) -> Result<Json<MintResponse>, ApiError> {
    let handle = state.registry.mint().await?;
    Ok(Json(MintResponse { handle }))
}

// Party state

/// GET /api/party/:handle
pub async fn party_snapshot(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<PartyView>, ApiError> {
    let view = state.registry.snapshot(&handle).await?;
    Ok(Json(view))
}

/// GET /api/party/:handle/raw
pub async fn party_raw(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<RawPartyView>, ApiError> {
    let view = state.registry.raw_state(&handle).await?;
    Ok(Json(view))
}

/// GET /api/party/:handle/events
///
/// SSE stream: the initial snapshot followed by one `party` event per
/// broadcast. The stream ends when the party expires; clients
/// re-establish and re-fetch on reconnect.
pub async fn party_events(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let (initial, rx) = state.registry.connect(&handle).await?;
    tracing::debug!(handle = %handle, "sse client connected");

    let stream = async_stream::stream! {
        match Event::default().event("party").json_data(&initial) {
            Ok(event) => yield Ok(event),
            Err(e) => tracing::error!(error = %e, "failed to encode initial snapshot"),
        }

        let mut updates = BroadcastStream::new(rx);
        while let Some(update) = updates.next().await {
            match update {
                Ok(view) => {
                    if let Ok(event) = Event::default().event("party").json_data(&view) {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    // Lagged receiver: skipped snapshots are fine, the
                    // next one is complete anyway.
                    tracing::warn!(handle = %handle, error = %e, "sse receiver lagged");
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}

/// POST /api/party/:handle/message
///
/// Client protocol endpoint. Accepted messages return the fresh
/// snapshot; malformed or unknown messages are dropped with a 204 so
/// one bad client cannot disturb the party.
pub async fn party_message(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, ApiError> {
    let msg = match ClientMessage::from_value(body) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!(handle = %handle, error = %e, "dropping invalid message");
            return Ok(StatusCode::NO_CONTENT.into_response());
        }
    };

    let view = state.registry.message(&handle, msg).await?;
    Ok(Json(view).into_response())
}

// Operator actions

/// POST /api/party/:handle/start
pub async fn party_start(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<PartyView>, ApiError> {
    let view = state.registry.operator(&handle, OperatorAction::Start).await?;
    Ok(Json(view))
}

/// POST /api/party/:handle/pause
pub async fn party_pause(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<PartyView>, ApiError> {
    let view = state.registry.operator(&handle, OperatorAction::Pause).await?;
    Ok(Json(view))
}

/// POST /api/party/:handle/close
pub async fn party_close(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<PartyView>, ApiError> {
    let view = state.registry.operator(&handle, OperatorAction::Close).await?;
    Ok(Json(view))
}

/// POST /api/party/:handle/settings
pub async fn party_settings(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    Json(req): Json<SettingsRequest>,
) -> Result<Json<PartyView>, ApiError> {
    let view = state
        .registry
        .operator(
            &handle,
            OperatorAction::SetFairness {
                enabled: req.fairness_enabled,
            },
        )
        .await?;
    Ok(Json(view))
}

/// POST /api/party/:handle/current
pub async fn party_current(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    Json(req): Json<CurrentSongRequest>,
) -> Result<Json<PartyView>, ApiError> {
    let view = state
        .registry
        .operator(
            &handle,
            OperatorAction::SetCurrentSong {
                external_id: req.external_id,
                remaining_seconds: req.remaining_seconds,
            },
        )
        .await?;
    Ok(Json(view))
}

/// POST /api/party/:handle/songs/:external_id/priority
pub async fn song_priority(
    State(state): State<AppState>,
    Path((handle, external_id)): Path<(String, String)>,
    Json(req): Json<PriorityRequest>,
) -> Result<Json<PartyView>, ApiError> {
    let view = state
        .registry
        .operator(
            &handle,
            OperatorAction::SetPriority {
                external_id,
                is_priority: req.is_priority,
            },
        )
        .await?;
    Ok(Json(view))
}

/// POST /api/party/:handle/songs/:external_id/position
pub async fn song_position(
    State(state): State<AppState>,
    Path((handle, external_id)): Path<(String, String)>,
    Json(req): Json<PositionRequest>,
) -> Result<Json<PartyView>, ApiError> {
    let view = state
        .registry
        .operator(
            &handle,
            OperatorAction::SetPosition {
                external_id,
                order_index: req.order_index,
            },
        )
        .await?;
    Ok(Json(view))
}

// Catalog passthrough

/// GET /api/search?q=
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<VideoInfo>>, ApiError> {
    let Some(catalog) = &state.catalog else {
        return Err(ApiError::CatalogUnavailable);
    };
    let videos = catalog.search_videos(&params.q).await?;
    Ok(Json(videos))
}
