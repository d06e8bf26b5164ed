//! The composition root (§4.K): wires the resolver, SpClient, dealer, context
//! resolver, track provider, and connect-state handler into one running
//! session. Mirrors the teacher's `App`/`Network` split — one place builds
//! every collaborator and wires the event channel between them — generalized
//! from the teacher's TUI main loop to a headless dealer-driven one.

use crate::auth::{AuthBlob, CredentialsResolver, EndpointKind};
use crate::codec::messages::{DeviceInfoWire, PutStateReason};
use crate::connect_state::ConnectStateHandler;
use crate::context::{ContextResolver, ContextResolverConfig};
use crate::dealer::{self, DealerClient};
use crate::error::{CoreError, CoreResult};
use crate::events::{EventLoop, EventType};
use crate::spclient::SpClient;
use crate::track_provider::TrackProvider;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Everything a running speaker needs: identity, the resolved credential,
/// and the device's advertised capabilities (§3 Device info).
pub struct SessionConfig {
    pub client_id: String,
    pub device_id: String,
    pub username: String,
    pub country: String,
    pub auth_blob: AuthBlob,
    pub device: DeviceInfoWire,
}

/// Owns every long-lived collaborator for one speaker session (§4.K).
pub struct Session {
    resolver: Arc<CredentialsResolver>,
    spclient: Arc<SpClient>,
    auth_blob: AuthBlob,
    username: String,
    connect_state: Arc<Mutex<ConnectStateHandler>>,
    event_loop: EventLoop,
    dealer: Option<DealerClient>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let resolver = Arc::new(CredentialsResolver::new(config.client_id, config.device_id.clone()));
        let spclient = Arc::new(SpClient::new(
            resolver.clone(),
            config.username.clone(),
            config.device_id,
            config.country,
        ));
        let context_resolver = ContextResolver::new(
            spclient.clone(),
            config.auth_blob.clone(),
            ContextResolverConfig::default(),
        );
        let track_provider = TrackProvider::new(context_resolver);
        let connect_state = ConnectStateHandler::new(spclient.clone(), track_provider, config.device);

        Self {
            resolver,
            spclient,
            auth_blob: config.auth_blob,
            username: config.username,
            connect_state: Arc::new(Mutex::new(connect_state)),
            event_loop: EventLoop::new(),
            dealer: None,
        }
    }

    /// Opens the dealer connection, registers handlers for the two dealer
    /// event kinds, and runs the event loop until the dealer socket closes
    /// (§4.K, §5).
    pub async fn run(mut self) -> CoreResult<()> {
        let dealer_host = self.resolver.ap_address(EndpointKind::Dealer).await?;
        let access_token = self.resolver.access_key(&self.username, &self.auth_blob).await?;
        let poster = self.event_loop.poster();
        let dealer = DealerClient::connect(&dealer_host, &access_token, poster).await?;
        self.dealer = Some(dealer.clone());

        let message_state = self.connect_state.clone();
        let message_dealer = dealer.clone();
        let message_auth_blob = self.auth_blob.clone();
        self.event_loop.on("DealerMessage", move |event| {
            if let EventType::DealerMessage(payload) = event {
                let state = message_state.clone();
                let dealer = message_dealer.clone();
                let auth_blob = message_auth_blob.clone();
                tokio::spawn(async move {
                    handle_dealer_message(&state, &dealer, &payload, &auth_blob).await;
                });
            }
        });

        let request_state = self.connect_state.clone();
        let request_dealer = dealer.clone();
        let request_auth_blob = self.auth_blob.clone();
        self.event_loop.on("DealerRequest", move |event| {
            if let EventType::DealerRequest(payload) = event {
                let state = request_state.clone();
                let dealer = request_dealer.clone();
                let auth_blob = request_auth_blob.clone();
                tokio::spawn(async move {
                    handle_dealer_request(&state, &dealer, &payload, &auth_blob).await;
                });
            }
        });

        self.event_loop.run().await;
        Ok(())
    }

    pub fn spclient(&self) -> &Arc<SpClient> {
        &self.spclient
    }
}

/// `hm://pusher/v1/connections` latches the connection id and announces a
/// fresh device state; anything else is ignored (only requests carry player
/// commands, §4.K).
async fn handle_dealer_message(
    state: &Arc<Mutex<ConnectStateHandler>>,
    dealer: &DealerClient,
    payload: &Value,
    auth_blob: &AuthBlob,
) {
    if !dealer::is_pusher_connection_message(payload) {
        return;
    }
    let Some(connection_id) = dealer::extract_connection_id(payload) else {
        return;
    };
    let mut handler = state.lock().await;
    handler.set_connection_id(connection_id);
    if let Err(e) = handler.put_state(PutStateReason::NewConnection, auth_blob).await {
        log::warn!("initial put_state failed: {e}");
    }
}

const PLAYER_COMMAND_MESSAGE_IDENT: &str = "hm://connect-state/v1/player/command";

/// Routes a `hm://connect-state/v1/player/command` request to the handler
/// and replies with its outcome; any other `message_ident` is acknowledged
/// with `success=false` without being dispatched (§4.K, I6).
async fn handle_dealer_request(
    state: &Arc<Mutex<ConnectStateHandler>>,
    dealer: &DealerClient,
    payload: &Value,
    auth_blob: &AuthBlob,
) {
    let key = payload.get("key").and_then(Value::as_str).unwrap_or_default();
    let message_ident = payload.get("message_ident").and_then(Value::as_str).unwrap_or_default();

    let success = if message_ident == PLAYER_COMMAND_MESSAGE_IDENT {
        let command_payload = payload.get("payload").unwrap_or(payload);
        let result: CoreResult<()> = {
            let mut handler = state.lock().await;
            handler.handle_player_command(command_payload, auth_blob).await
        };
        if let Err(e) = &result {
            log::warn!("player command failed: {e}");
        }
        result.is_ok()
    } else {
        log::debug!("dropping dealer request of unknown message_ident {message_ident}");
        false
    };

    if let Err(e) = dealer.reply_to_request(success, key) {
        log::warn!("failed to reply to dealer request: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::messages::DeviceInfoWire;

    fn config() -> SessionConfig {
        SessionConfig {
            client_id: "client".into(),
            device_id: "device".into(),
            username: "user".into(),
            country: "US".into(),
            auth_blob: AuthBlob {
                auth_type: 0,
                data: vec![],
            },
            device: DeviceInfoWire::default(),
        }
    }

    #[test]
    fn builds_every_collaborator_without_network_access() {
        let session = Session::new(config());
        assert!(session.dealer.is_none());
        let _ = session.spclient();
    }
}
