//! The connect state handler (§4.J): owns the published device state,
//! interprets inbound player commands, and schedules state-publishes.

use crate::codec::messages::{
    ContextIndexWire, DeviceInfoWire, PlayerStateWire, ProvidedTrackWire, PutStateReason,
    PutStateRequest, TransferState,
};
use crate::context::model::TrackProvider as ProviderTag;
use crate::error::{CoreError, CoreResult};
use crate::ids::{SpotifyId, SpotifyItemKind};
use crate::spclient::SpClient;
use crate::track_provider::TrackProvider;
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const MEMBER_TYPE_CONNECT_STATE: u32 = 0;
const SESSION_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SESSION_ID_LEN: usize = 16;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn random_session_id() -> String {
    let mut rng = rand::thread_rng();
    (0..SESSION_ID_LEN)
        .map(|_| SESSION_ID_ALPHABET[rng.gen_range(0..SESSION_ID_ALPHABET.len())] as char)
        .collect()
}

/// Owns the single `PutStateRequest` and dispatches inbound player commands
/// (§4.J). Only the worker that drains the event loop touches this (§5).
pub struct ConnectStateHandler {
    spclient: Arc<SpClient>,
    track_provider: TrackProvider,
    state: PutStateRequest,
    connection_id: String,
    message_counter: AtomicU32,
}

impl ConnectStateHandler {
    pub fn new(spclient: Arc<SpClient>, track_provider: TrackProvider, device: DeviceInfoWire) -> Self {
        Self {
            spclient,
            track_provider,
            state: PutStateRequest {
                device,
                ..PutStateRequest::default()
            },
            connection_id: String::new(),
            message_counter: AtomicU32::new(0),
        }
    }

    pub fn set_connection_id(&mut self, connection_id: String) {
        self.connection_id = connection_id;
    }

    pub fn state(&self) -> &PutStateRequest {
        &self.state
    }

    /// Dispatches by `payload.command.endpoint` (§4.J). Latches
    /// `message_id`/`sent_by_device_id` before dispatch regardless of which
    /// endpoint fires.
    pub async fn handle_player_command(
        &mut self,
        payload: &serde_json::Value,
        auth_blob: &crate::auth::AuthBlob,
    ) -> CoreResult<()> {
        if let Some(message_id) = payload.get("message_id").and_then(|v| v.as_u64()) {
            self.state.last_command_message_id = message_id as u32;
        }
        if let Some(device_id) = payload.get("sent_by_device_id").and_then(|v| v.as_str()) {
            self.state.last_command_sent_by_device_id = device_id.to_string();
        }

        let endpoint = payload
            .get("command")
            .and_then(|c| c.get("endpoint"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| CoreError::invalid_argument("command missing endpoint"))?;

        match endpoint {
            "transfer" => {
                let data_b64 = payload
                    .get("command")
                    .and_then(|c| c.get("data"))
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| CoreError::invalid_argument("transfer missing data"))?;
                let raw = STANDARD
                    .decode(data_b64)
                    .map_err(|e| CoreError::bad_message(e.to_string()))?;
                let transfer = TransferState::decode(&raw)?;
                self.apply_transfer(&transfer, auth_blob).await
            }
            "skip_next" => {
                self.track_provider.skip_to_next_track().await?;
                self.refresh_track_and_index();
                self.state.player_state.position_as_of_timestamp = 0;
                self.state.player_state.timestamp = now_millis();
                self.put_state(PutStateReason::PlayerStateChanged, auth_blob)
                    .await
            }
            other => {
                log::debug!("player command endpoint {other} accepted silently");
                Ok(())
            }
        }
    }

    /// §4.J `apply_transfer` algorithm, steps 1-10.
    async fn apply_transfer(
        &mut self,
        transfer: &TransferState,
        auth_blob: &crate::auth::AuthBlob,
    ) -> CoreResult<()> {
        self.state.is_active = true; // 1

        self.state.player_state.session_id = if !transfer.current_session.original_session_id.is_empty() {
            transfer.current_session.original_session_id.clone()
        } else {
            random_session_id()
        }; // 2

        self.state.player_state.is_playing = true;
        self.state.player_state.is_buffering = false;
        self.state.player_state.timestamp = transfer.playback.timestamp;
        self.state.player_state.position_as_of_timestamp = transfer.playback.position_as_of_timestamp; // 3

        self.state.player_state.is_paused =
            transfer.options.restore_paused == "restore" && transfer.playback.is_paused; // 4

        self.state.player_state.context_uri = transfer.context.uri.clone();
        self.state.player_state.context_url = transfer.context.url.clone();
        self.state.player_state.playback_speed = transfer.options.playback_speed;
        // shuffle/repeat_context/repeat_track aren't projected fields of
        // PlayerStateWire today; a future PlayerOptions wire message would
        // carry them verbatim alongside playback_speed. // 5

        self.state.player_state.track = Some(ProvidedTrackWire {
            uri: String::new(),
            uid: transfer.current_session.current_uid.clone(),
            provider: ProviderTag::Context.as_str().to_string(),
        }); // 6

        self.state.started_playing_at = transfer.playback.timestamp;
        self.state.has_been_playing_for_ms = 0; // 7

        let current_track_uri = transfer
            .playback
            .current_track
            .as_ref()
            .filter(|t| !t.gid.is_empty())
            .and_then(|t| {
                let mut gid = [0u8; 16];
                if t.gid.len() == 16 {
                    gid.copy_from_slice(&t.gid);
                    Some(SpotifyId::from_gid(gid, SpotifyItemKind::Track).to_uri())
                } else {
                    None
                }
            });

        self.track_provider.set_queue(&transfer.queue);
        self.track_provider
            .load_track_and_context(
                Some(transfer.current_session.current_uid.clone()),
                current_track_uri,
                &transfer.context,
            )
            .await?; // 8

        self.refresh_track_and_index(); // 9

        self.put_state(PutStateReason::PlayerStateChanged, auth_blob).await // 10
    }

    fn refresh_track_and_index(&mut self) {
        self.state.player_state.track = self.track_provider.current_track().map(|t| ProvidedTrackWire {
            uri: t.uri,
            uid: t.uid,
            provider: t.provider.as_str().to_string(),
        });
        self.state.player_state.index =
            self.track_provider
                .current_context_index()
                .map(|(page, track)| ContextIndexWire { page, track });
    }

    /// Stamps timestamps/reason and publishes via SpClient (§4.J `put_state`).
    pub async fn put_state(&mut self, reason: PutStateReason, auth_blob: &crate::auth::AuthBlob) -> CoreResult<()> {
        self.state.client_side_timestamp = now_millis();
        self.state.member_type = MEMBER_TYPE_CONNECT_STATE;
        self.state.put_state_reason = reason;
        self.state.message_id = self.message_counter.fetch_add(1, Ordering::SeqCst);

        self.spclient
            .put_connect_state(&self.state, &self.connection_id, auth_blob)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CredentialsResolver;
    use crate::codec::messages::{
        TransferContext, TransferCurrentSession, TransferOptions, TransferPlayback, TransferQueue,
    };
    use crate::context::{ContextResolver, ContextResolverConfig};

    fn handler() -> ConnectStateHandler {
        let resolver = Arc::new(CredentialsResolver::new("client".into(), "device".into()));
        let spclient = Arc::new(SpClient::new(resolver, "user".into(), "device".into(), "US".into()));
        let auth_blob = crate::auth::AuthBlob {
            auth_type: 0,
            data: vec![],
        };
        let context_resolver = ContextResolver::new(spclient.clone(), auth_blob, ContextResolverConfig::default());
        let track_provider = TrackProvider::new(context_resolver);
        ConnectStateHandler::new(spclient, track_provider, DeviceInfoWire::default())
    }

    #[test]
    fn restore_paused_only_applies_when_requested() {
        let mut transfer = TransferState::default();
        transfer.playback.is_paused = true;
        transfer.options.restore_paused = "restore".into();
        assert!(transfer.options.restore_paused == "restore" && transfer.playback.is_paused);

        transfer.options.restore_paused = String::new();
        assert!(!(transfer.options.restore_paused == "restore" && transfer.playback.is_paused));
    }

    #[test]
    fn session_id_falls_back_to_random_when_absent() {
        let session = TransferCurrentSession::default();
        assert!(session.original_session_id.is_empty());
        let id = random_session_id();
        assert_eq!(id.len(), SESSION_ID_LEN);
    }

    #[tokio::test]
    async fn handle_player_command_latches_message_id_before_dispatch() {
        let mut handler = handler();
        let payload = serde_json::json!({
            "command": {"endpoint": "unsupported_endpoint"},
            "message_id": 7,
            "sent_by_device_id": "phone",
        });
        let auth_blob = crate::auth::AuthBlob {
            auth_type: 0,
            data: vec![],
        };
        handler.handle_player_command(&payload, &auth_blob).await.unwrap();
        assert_eq!(handler.state().last_command_message_id, 7);
        assert_eq!(handler.state().last_command_sent_by_device_id, "phone");
    }

    // silence unused-import warnings for fixture types referenced only by name above
    #[allow(dead_code)]
    fn _touch(_: TransferContext, _: TransferPlayback, _: TransferOptions, _: TransferQueue) {}
}
