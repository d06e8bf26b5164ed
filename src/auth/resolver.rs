//! The endpoint/token resolver (§4.C): resolves access-point, dealer, and
//! API host lists, and mints/refreshes `client_token`/`access_token`.
//!
//! Mirrors the teacher's raw-`reqwest` calls (`network.rs::start_collection_playback`,
//! `update_global_song_count`) for the handful of endpoints that aren't
//! covered by a higher-level client crate.

use crate::auth::blob::AuthBlob;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

const APRESOLVE_URL: &str = "https://apresolve.spotify.com/";
const CLIENT_TOKEN_URL: &str = "https://clienttoken.spotify.com/v1/clienttoken";
const LOGIN5_URL: &str = "https://login5.spotify.com/v3/login";
const ENDPOINT_TTL: Duration = Duration::from_secs(60 * 60);
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const REFRESH_RETRY_COUNT: u32 = 3;
const REFRESH_BACKOFF_BASE: Duration = Duration::from_millis(250);

/// Retries `attempt_fn` on a retryable error up to `REFRESH_RETRY_COUNT`
/// times with linear backoff (§7 "recover locally only for idempotent
/// refreshes"). Shared by endpoint refetch and token minting.
async fn with_refresh_retry<T, F, Fut>(mut attempt_fn: F) -> CoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = CoreResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < REFRESH_RETRY_COUNT => {
                attempt += 1;
                tokio::time::sleep(REFRESH_BACKOFF_BASE * attempt).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    AccessPoint,
    Dealer,
    SpClient,
}

#[derive(Debug, Default, Clone)]
struct EndpointLists {
    access_point: Vec<String>,
    dealer: Vec<String>,
    spclient: Vec<String>,
    expires_at: Option<Instant>,
}

impl EndpointLists {
    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() >= at,
            None => true,
        }
    }

    fn list_for(&self, kind: EndpointKind) -> &[String] {
        match kind {
            EndpointKind::AccessPoint => &self.access_point,
            EndpointKind::Dealer => &self.dealer,
            EndpointKind::SpClient => &self.spclient,
        }
    }
}

#[derive(Debug, Clone)]
struct TokenEntry {
    token: String,
    expires_at: Instant,
}

impl TokenEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Deserialize)]
struct ApResolveResponse {
    accesspoint: Vec<String>,
    dealer: Vec<String>,
    spclient: Vec<String>,
}

#[derive(Serialize)]
struct ClientTokenRequestBody<'a> {
    client_id: &'a str,
    device_id: &'a str,
}

#[derive(Deserialize)]
struct ClientTokenResponseBody {
    granted_token: GrantedToken,
}

#[derive(Deserialize)]
struct GrantedToken {
    token: String,
    expires_after_seconds: u64,
}

#[derive(Serialize)]
struct LoginRequestBody<'a> {
    stored_credential: StoredCredential<'a>,
    client_info: ClientInfo<'a>,
}

#[derive(Serialize)]
struct StoredCredential<'a> {
    username: &'a str,
    data: String,
}

#[derive(Serialize)]
struct ClientInfo<'a> {
    client_id: &'a str,
    device_id: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LoginResponseBody {
    Ok {
        ok: LoginOk,
    },
    Error {
        #[allow(dead_code)]
        error: serde_json::Value,
    },
}

#[derive(Deserialize)]
struct LoginOk {
    access_token: String,
    access_token_expires_in: u64,
}

struct ResolverState {
    endpoints: EndpointLists,
    client_token: Option<TokenEntry>,
    access_token: Option<TokenEntry>,
}

/// Resolves endpoint lists and mints/refreshes tokens. All public operations
/// take the single re-entrant lock (§3 Tokens, §5 Shared data); the lock is
/// held only across local computation and the outbound HTTP call.
pub struct CredentialsResolver {
    http: reqwest::Client,
    client_id: String,
    device_id: String,
    state: Mutex<ResolverState>,
}

impl CredentialsResolver {
    pub fn new(client_id: String, device_id: String) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
            .expect("reqwest client builds with default TLS backend");
        Self {
            http,
            client_id,
            device_id,
            state: Mutex::new(ResolverState {
                endpoints: EndpointLists::default(),
                client_token: None,
                access_token: None,
            }),
        }
    }

    /// Returns the first endpoint of `kind`, refetching all three lists
    /// atomically if they've expired.
    pub async fn ap_address(&self, kind: EndpointKind) -> CoreResult<String> {
        let mut state = self.state.lock().await;
        if state.endpoints.is_expired() {
            self.refetch_endpoints(&mut state).await?;
        }
        state
            .endpoints
            .list_for(kind)
            .first()
            .cloned()
            .ok_or_else(|| CoreError::try_again("no endpoints of requested kind"))
    }

    async fn refetch_endpoints(&self, state: &mut ResolverState) -> CoreResult<()> {
        let parsed: ApResolveResponse = with_refresh_retry(|| async {
            let response = self
                .http
                .get(APRESOLVE_URL)
                .send()
                .await
                .map_err(|_| CoreError::try_again("apresolve request failed"))?;
            if !response.status().is_success() {
                return Err(CoreError::try_again(format!(
                    "apresolve returned {}",
                    response.status()
                )));
            }
            response
                .json()
                .await
                .map_err(|e| CoreError::bad_message(e.to_string()))
        })
        .await?;

        state.endpoints = EndpointLists {
            access_point: parsed.accesspoint,
            dealer: parsed.dealer,
            spclient: parsed.spclient,
            expires_at: Some(Instant::now() + ENDPOINT_TTL),
        };
        Ok(())
    }

    /// Mints or returns the cached `client_token`.
    pub async fn client_token(&self) -> CoreResult<String> {
        let mut state = self.state.lock().await;
        if state
            .client_token
            .as_ref()
            .map(TokenEntry::is_expired)
            .unwrap_or(true)
        {
            let body = ClientTokenRequestBody {
                client_id: &self.client_id,
                device_id: &self.device_id,
            };
            let parsed: ClientTokenResponseBody = with_refresh_retry(|| async {
                let response = self
                    .http
                    .post(CLIENT_TOKEN_URL)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|_| CoreError::try_again("clienttoken request failed"))?;
                if !response.status().is_success() {
                    return Err(CoreError::try_again(format!(
                        "clienttoken returned {}",
                        response.status()
                    )));
                }
                response
                    .json()
                    .await
                    .map_err(|e| CoreError::bad_message(e.to_string()))
            })
            .await?;
            state.client_token = Some(TokenEntry {
                token: parsed.granted_token.token,
                expires_at: Instant::now()
                    + Duration::from_secs(parsed.granted_token.expires_after_seconds),
            });
        }
        Ok(state.client_token.as_ref().unwrap().token.clone())
    }

    /// Mints or returns the cached `access_token`. Requires a valid
    /// `client_token` and an authenticated blob.
    pub async fn access_key(&self, username: &str, auth_blob: &AuthBlob) -> CoreResult<String> {
        let client_token = self.client_token().await?;

        let mut state = self.state.lock().await;
        if state
            .access_token
            .as_ref()
            .map(TokenEntry::is_expired)
            .unwrap_or(true)
        {
            let body = LoginRequestBody {
                stored_credential: StoredCredential {
                    username,
                    data: base64::Engine::encode(
                        &base64::engine::general_purpose::STANDARD,
                        &auth_blob.data,
                    ),
                },
                client_info: ClientInfo {
                    client_id: &self.client_id,
                    device_id: &self.device_id,
                },
            };
            let parsed: LoginResponseBody = with_refresh_retry(|| async {
                let response = self
                    .http
                    .post(LOGIN5_URL)
                    .header("Client-Token", &client_token)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|_| CoreError::try_again("login5 request failed"))?;
                if !response.status().is_success() {
                    return Err(CoreError::try_again(format!(
                        "login5 returned {}",
                        response.status()
                    )));
                }
                response
                    .json()
                    .await
                    .map_err(|e| CoreError::bad_message(e.to_string()))
            })
            .await?;
            match parsed {
                LoginResponseBody::Ok { ok } => {
                    state.access_token = Some(TokenEntry {
                        token: ok.access_token,
                        expires_at: Instant::now()
                            + Duration::from_secs(ok.access_token_expires_in),
                    });
                }
                LoginResponseBody::Error { error } => {
                    return Err(CoreError::not_permitted(error.to_string()));
                }
            }
        }
        Ok(state.access_token.as_ref().unwrap().token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_lists_start_expired() {
        let lists = EndpointLists::default();
        assert!(lists.is_expired());
    }

    #[test]
    fn token_entry_expiry_is_time_based() {
        let entry = TokenEntry {
            token: "t".into(),
            expires_at: Instant::now() - Duration::from_secs(1),
        };
        assert!(entry.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn endpoints_survive_fifty_nine_minutes_but_not_sixty_one() {
        let mut endpoints = EndpointLists {
            access_point: vec!["ap1".into()],
            dealer: vec![],
            spclient: vec![],
            expires_at: Some(Instant::now() + ENDPOINT_TTL),
        };
        assert!(!endpoints.is_expired());

        tokio::time::advance(Duration::from_secs(59 * 60)).await;
        assert!(!endpoints.is_expired());

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        assert!(endpoints.is_expired());
        endpoints.access_point.clear();
    }
}
