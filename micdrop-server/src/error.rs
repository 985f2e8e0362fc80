//! HTTP error mapping
//!
//! Wraps domain errors so handlers can use `?` and still produce
//! consistent JSON error bodies with the right status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use micdrop_common::Error;

/// Errors surfaced to HTTP clients.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] Error),

    /// Track search requested but no catalog backend is configured.
    #[error("catalog backend is not configured")]
    CatalogUnavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Domain(Error::NotFound(msg)) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Domain(Error::InvalidInput(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Domain(Error::PartyClosed(handle)) => (
                StatusCode::CONFLICT,
                format!("party '{}' is closed", handle),
            ),
            ApiError::Domain(Error::Catalog(msg)) => {
                tracing::warn!("catalog request failed: {}", msg);
                (StatusCode::BAD_GATEWAY, "catalog lookup failed".to_string())
            }
            ApiError::Domain(err) => {
                tracing::error!("internal error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            ApiError::CatalogUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let resp = ApiError::from(Error::NotFound("party 'x'".into())).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn closed_party_maps_to_409() {
        let resp = ApiError::from(Error::PartyClosed("friday".into())).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn database_error_maps_to_500() {
        let resp = ApiError::from(Error::Database(sqlx::Error::PoolClosed)).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
