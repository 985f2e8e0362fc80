//! External catalog collaborators
//!
//! Video search and track matching are separate services; this server
//! only speaks their HTTP interface. Both are optional: without a
//! configured catalog, search returns 503 and added songs simply keep
//! whatever hints the submitter supplied.

use std::time::Duration;

use async_trait::async_trait;

use micdrop_common::wire::{TrackMatch, VideoInfo};
use micdrop_common::{Error, Result};

const USER_AGENT: &str = concat!("micdrop/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Interface to the external video-search and track-matching services.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Free-text video search, e.g. for "karaoke <song title>".
    async fn search_videos(&self, query: &str) -> Result<Vec<VideoInfo>>;

    /// Split a messy video title into artist/song. `None` when the
    /// matcher has no confident answer.
    async fn match_track(&self, title: &str) -> Result<Option<TrackMatch>>;
}

/// HTTP-backed catalog client.
pub struct HttpCatalog {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCatalog {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Catalog(e.to_string()))?;

        Ok(HttpCatalog {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn search_videos(&self, query: &str) -> Result<Vec<VideoInfo>> {
        let url = format!("{}/search", self.base_url);
        tracing::debug!(query = %query, "querying video search");

        let response = self
            .client
            .get(&url)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| Error::Catalog(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Catalog(format!("search returned {}", status)));
        }

        let videos: Vec<VideoInfo> = response
            .json()
            .await
            .map_err(|e| Error::Catalog(format!("bad search response: {}", e)))?;

        tracing::debug!(count = videos.len(), "video search complete");
        Ok(videos)
    }

    async fn match_track(&self, title: &str) -> Result<Option<TrackMatch>> {
        let url = format!("{}/match", self.base_url);
        tracing::debug!(title = %title, "querying track matcher");

        let response = self
            .client
            .get(&url)
            .query(&[("title", title)])
            .send()
            .await
            .map_err(|e| Error::Catalog(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::Catalog(format!("match returned {}", status)));
        }

        let matched: TrackMatch = response
            .json()
            .await
            .map_err(|e| Error::Catalog(format!("bad match response: {}", e)))?;

        Ok(Some(matched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation_succeeds() {
        assert!(HttpCatalog::new("http://localhost:9000").is_ok());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let catalog = HttpCatalog::new("http://localhost:9000/").unwrap();
        assert_eq!(catalog.base_url, "http://localhost:9000");
    }
}
