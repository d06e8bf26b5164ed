//! SpClient (§4.G): a thin request builder over the service's REST-ish
//! endpoints. Every call resolves a host + the client/access tokens through
//! the credentials resolver and attaches them as headers. Grounded on the
//! teacher's `network.rs` request helpers (`start_collection_playback` et
//! al.), which follow the same resolve-host/attach-headers/send shape using
//! a shared `reqwest::Client`.

use crate::auth::{AuthBlob, CredentialsResolver, EndpointKind};
use crate::codec::messages::PutStateRequest;
use crate::codec::WireMessage;
use crate::error::{CoreError, CoreResult};
use std::sync::Arc;
use std::time::Duration;

const PUT_STATE_RETRY_COUNT: u32 = 3;
const PUT_STATE_BACKOFF_BASE: Duration = Duration::from_millis(250);

/// Request/response facade over `connect-state`, `context-resolve`, and
/// `metadata` endpoints (§4.G).
pub struct SpClient {
    http: reqwest::Client,
    resolver: Arc<CredentialsResolver>,
    username: String,
    device_id: String,
    country: String,
}

impl SpClient {
    pub fn new(
        resolver: Arc<CredentialsResolver>,
        username: String,
        device_id: String,
        country: String,
    ) -> Self {
        Self {
            http: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(3))
                .build()
                .expect("reqwest client builds with default TLS backend"),
            resolver,
            username,
            device_id,
            country,
        }
    }

    async fn authed_request(
        &self,
        method: reqwest::Method,
        path_after_host: &str,
        auth_blob: &AuthBlob,
    ) -> CoreResult<reqwest::RequestBuilder> {
        let host = self.resolver.ap_address(EndpointKind::SpClient).await?;
        let client_token = self.resolver.client_token().await?;
        let access_token = self.resolver.access_key(&self.username, auth_blob).await?;
        let url = format!("https://{host}/{path_after_host}");
        Ok(self
            .http
            .request(method, url)
            .header("Client-Token", client_token)
            .header("Authorization", format!("Bearer {access_token}")))
    }

    /// `PUT connect-state/v1/devices/<device_id>` (§4.G). Retries on
    /// `TryAgain` with exponential backoff capped at `PUT_STATE_RETRY_COUNT`
    /// attempts, per the Design Notes' open question on `putConnectState`
    /// retry behavior.
    pub async fn put_connect_state(
        &self,
        request: &PutStateRequest,
        connection_id: &str,
        auth_blob: &AuthBlob,
    ) -> CoreResult<()> {
        let mut body = Vec::new();
        request.encode(&mut body);

        let salt: u32 = rand::random();
        let path = format!(
            "connect-state/v1/devices/{}?product=0&country={}&salt={salt}",
            self.device_id, self.country
        );

        let mut attempt = 0u32;
        loop {
            let outcome = self
                .authed_request(reqwest::Method::PUT, &path, auth_blob)
                .await?
                .header("Content-Type", "application/x-protobuf")
                .header("X-Spotify-Connection-Id", connection_id)
                .body(body.clone())
                .send()
                .await;

            let result = match outcome {
                Ok(response) if response.status().is_success() => Ok(()),
                Ok(response) => Err(CoreError::bad_message(format!(
                    "putConnectState returned {}",
                    response.status()
                ))),
                Err(e) => Err(CoreError::from(e)),
            };

            match result {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < PUT_STATE_RETRY_COUNT => {
                    attempt += 1;
                    tokio::time::sleep(PUT_STATE_BACKOFF_BASE * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// `GET context-resolve/v1/<context_uri>` (§4.G).
    pub async fn resolve_context(
        &self,
        context_uri: &str,
        auth_blob: &AuthBlob,
    ) -> CoreResult<serde_json::Value> {
        let path = format!("context-resolve/v1/{context_uri}");
        let response = self
            .authed_request(reqwest::Method::GET, &path, auth_blob)
            .await?
            .send()
            .await
            .map_err(CoreError::from)?;
        fetch_json(response).await
    }

    /// `GET <page_url_without_scheme>` — fetches an arbitrary context page
    /// by the URL the previous page handed back (§4.G, §4.H).
    pub async fn fetch_context_page(
        &self,
        page_url_without_scheme: &str,
        auth_blob: &AuthBlob,
    ) -> CoreResult<serde_json::Value> {
        let response = self
            .authed_request(reqwest::Method::GET, page_url_without_scheme, auth_blob)
            .await?
            .send()
            .await
            .map_err(CoreError::from)?;
        fetch_json(response).await
    }

    /// `GET metadata/4/track/<hex_gid>` (§4.G).
    pub async fn track_metadata(
        &self,
        hex_gid: &str,
        auth_blob: &AuthBlob,
    ) -> CoreResult<serde_json::Value> {
        let path = format!("metadata/4/track/{hex_gid}");
        let response = self
            .authed_request(reqwest::Method::GET, &path, auth_blob)
            .await?
            .send()
            .await
            .map_err(CoreError::from)?;
        fetch_json(response).await
    }

    /// `GET metadata/4/episode/<hex_gid>` (§4.G).
    pub async fn episode_metadata(
        &self,
        hex_gid: &str,
        auth_blob: &AuthBlob,
    ) -> CoreResult<serde_json::Value> {
        let path = format!("metadata/4/episode/{hex_gid}");
        let response = self
            .authed_request(reqwest::Method::GET, &path, auth_blob)
            .await?
            .send()
            .await
            .map_err(CoreError::from)?;
        fetch_json(response).await
    }
}

async fn fetch_json(response: reqwest::Response) -> CoreResult<serde_json::Value> {
    if !response.status().is_success() {
        return Err(CoreError::bad_message(format!(
            "request returned {}",
            response.status()
        )));
    }
    response
        .json()
        .await
        .map_err(|e| CoreError::bad_message(e.to_string()))
}
