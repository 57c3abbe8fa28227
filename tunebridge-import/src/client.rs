//! Destination catalog HTTP client
//!
//! reqwest-backed implementation of `DestinationCatalog`. Constructed
//! from an opaque pre-authorized session token — the credential
//! collaborator owns the OAuth handshake; this client only attaches the
//! token it was given. HTTP statuses map onto the `CallError`
//! classification the invoker keys its retry policy on.

use crate::catalog::{CallError, CallResult, DestinationCatalog};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tunebridge_common::{MatchCandidate, RecordKind};

const USER_AGENT: &str = concat!("tunebridge/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Destination id that may arrive as a JSON number or string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    items: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: RawId,
    /// Track/album title or artist name, depending on the endpoint
    #[serde(alias = "name")]
    title: String,
    artist: Option<NamedRef>,
    album: Option<NamedRef>,
    /// Seconds
    duration: Option<u32>,
    isrc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    #[serde(alias = "name")]
    title: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistPage {
    #[serde(default)]
    items: Vec<PlaylistHit>,
}

#[derive(Debug, Deserialize)]
struct PlaylistHit {
    id: RawId,
    title: String,
}

#[derive(Debug, Deserialize)]
struct CreatedPlaylist {
    id: RawId,
}

pub struct HttpCatalogClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpCatalogClient {
    /// Build a client over a pre-authorized session token
    pub fn new(base_url: &str, token: &str) -> CallResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CallError::Transient(format!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn search_path(kind: RecordKind) -> &'static str {
        match kind {
            RecordKind::Track | RecordKind::Playlist => "search/tracks",
            RecordKind::Album => "search/albums",
            RecordKind::Artist => "search/artists",
        }
    }

    fn favorite_path(kind: RecordKind) -> &'static str {
        match kind {
            RecordKind::Track | RecordKind::Playlist => "users/me/favorites/tracks",
            RecordKind::Album => "users/me/favorites/albums",
            RecordKind::Artist => "users/me/favorites/artists",
        }
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> CallResult<Response> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(classify_transport_error)?;
        Ok(response)
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> CallResult<Response> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;
        Ok(response)
    }

    /// Existence probe: 200 means present, 404 means absent
    async fn probe(&self, path: &str) -> CallResult<bool> {
        let response = self.get(path, &[]).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(classify_status(response).await),
        }
    }
}

#[async_trait]
impl DestinationCatalog for HttpCatalogClient {
    async fn search(
        &self,
        kind: RecordKind,
        query: &str,
        limit: usize,
    ) -> CallResult<Vec<MatchCandidate>> {
        let response = self
            .get(
                Self::search_path(kind),
                &[
                    ("query", query.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        let response = ensure_success(response).await?;

        let page: SearchPage = response
            .json()
            .await
            .map_err(|e| CallError::Transient(format!("Unparseable search response: {}", e)))?;

        tracing::debug!(kind = %kind, query = %query, hits = page.items.len(), "Search response");

        Ok(page
            .items
            .into_iter()
            .map(|hit| MatchCandidate {
                destination_id: hit.id.into_string(),
                artist: hit
                    .artist
                    .map(|a| a.title)
                    // Artist search returns bare names; the hit title is
                    // the artist
                    .unwrap_or_else(|| hit.title.clone()),
                album: hit.album.map(|a| a.title),
                duration_secs: hit.duration,
                isrc: hit.isrc,
                title: hit.title,
            })
            .collect())
    }

    async fn is_favorite(&self, kind: RecordKind, destination_id: &str) -> CallResult<bool> {
        let path = format!("{}/{}", Self::favorite_path(kind), destination_id);
        self.probe(&path).await
    }

    async fn add_favorite(&self, kind: RecordKind, destination_id: &str) -> CallResult<()> {
        let response = self
            .post(
                Self::favorite_path(kind),
                serde_json::json!({ "id": destination_id }),
            )
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn find_playlist(&self, name: &str) -> CallResult<Option<String>> {
        let response = self
            .get("users/me/playlists", &[("name", name.to_string())])
            .await?;
        let response = ensure_success(response).await?;

        let page: PlaylistPage = response
            .json()
            .await
            .map_err(|e| CallError::Transient(format!("Unparseable playlist response: {}", e)))?;

        // The name filter may match loosely; require exact equality
        Ok(page
            .items
            .into_iter()
            .find(|p| p.title == name)
            .map(|p| p.id.into_string()))
    }

    async fn create_playlist(&self, name: &str) -> CallResult<String> {
        let response = self
            .post(
                "users/me/playlists",
                serde_json::json!({
                    "title": name,
                    "description": "Imported by tunebridge",
                }),
            )
            .await?;
        let response = ensure_success(response).await?;

        let created: CreatedPlaylist = response
            .json()
            .await
            .map_err(|e| CallError::Transient(format!("Unparseable create response: {}", e)))?;
        Ok(created.id.into_string())
    }

    async fn playlist_contains(&self, playlist_id: &str, track_id: &str) -> CallResult<bool> {
        let path = format!("playlists/{}/items/{}", playlist_id, track_id);
        self.probe(&path).await
    }

    async fn add_to_playlist(&self, playlist_id: &str, track_id: &str) -> CallResult<()> {
        let response = self
            .post(
                &format!("playlists/{}/items", playlist_id),
                serde_json::json!({ "track_id": track_id }),
            )
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

/// Map transport-level reqwest errors to the call classification
fn classify_transport_error(error: reqwest::Error) -> CallError {
    if error.is_timeout() || error.is_connect() {
        CallError::Transient(format!("network: {}", error))
    } else {
        CallError::Rejected(format!("request: {}", error))
    }
}

async fn ensure_success(response: Response) -> CallResult<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(classify_status(response).await)
    }
}

/// Map an unsuccessful HTTP status to the call classification
async fn classify_status(response: Response) -> CallError {
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CallError::Unauthorized(format!("destination returned {}", status))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            CallError::RateLimited { retry_after }
        }
        status if status.is_server_error() => {
            CallError::Transient(format!("destination returned {}", status))
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            CallError::Rejected(format!("destination returned {}: {}", status, body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_trims_trailing_slash() {
        let client = HttpCatalogClient::new("https://api.example/v1/", "token").unwrap();
        assert_eq!(client.base_url, "https://api.example/v1");
    }

    #[test]
    fn test_search_paths_per_kind() {
        assert_eq!(
            HttpCatalogClient::search_path(RecordKind::Track),
            "search/tracks"
        );
        // Playlist rows search as tracks
        assert_eq!(
            HttpCatalogClient::search_path(RecordKind::Playlist),
            "search/tracks"
        );
        assert_eq!(
            HttpCatalogClient::search_path(RecordKind::Album),
            "search/albums"
        );
        assert_eq!(
            HttpCatalogClient::search_path(RecordKind::Artist),
            "search/artists"
        );
    }

    #[test]
    fn test_raw_id_accepts_number_or_string() {
        let n: RawId = serde_json::from_str("77646170").unwrap();
        assert_eq!(n.into_string(), "77646170");

        let s: RawId = serde_json::from_str("\"trk-77646170\"").unwrap();
        assert_eq!(s.into_string(), "trk-77646170");
    }

    #[test]
    fn test_search_hit_parses_track_shape() {
        let json = r#"{
            "id": 42,
            "title": "Dreams",
            "artist": { "name": "Fleetwood Mac" },
            "album": { "title": "Rumours" },
            "duration": 257,
            "isrc": "GBACB7700057"
        }"#;
        let hit: SearchHit = serde_json::from_str(json).unwrap();
        assert_eq!(hit.title, "Dreams");
        assert_eq!(hit.artist.unwrap().title, "Fleetwood Mac");
        assert_eq!(hit.duration, Some(257));
    }

    #[test]
    fn test_search_hit_parses_artist_shape() {
        // Artist hits carry "name" and nothing else
        let json = r#"{ "id": "art-9", "name": "Fleetwood Mac" }"#;
        let hit: SearchHit = serde_json::from_str(json).unwrap();
        assert_eq!(hit.title, "Fleetwood Mac");
        assert!(hit.artist.is_none());
        assert!(hit.duration.is_none());
    }
}
