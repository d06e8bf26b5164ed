//! Concrete message types the wire codec carries: `PutStateRequest` (the
//! outward device state, §3) and `TransferState` (the payload of a
//! `"transfer"` player command, §4.J). Field numbers are this
//! implementation's own — the real Spotify `.proto` definitions are assumed
//! given and out of scope (§1).

use super::{
    bytes_to_string, write_bool_field, write_bytes_field, write_message_field, write_string_field,
    write_varint_field, Field, WireMessage,
};
use crate::error::CoreResult;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvidedTrackWire {
    pub uri: String,
    pub uid: String,
    pub provider: String,
}

impl WireMessage for ProvidedTrackWire {
    fn encode(&self, out: &mut Vec<u8>) {
        write_string_field(out, 1, &self.uri);
        write_string_field(out, 2, &self.uid);
        write_string_field(out, 3, &self.provider);
    }

    fn bind_field(&mut self, field_number: u32, value: Field<'_>) -> CoreResult<()> {
        if let Field::Bytes(b) = value {
            match field_number {
                1 => self.uri = bytes_to_string(b)?,
                2 => self.uid = bytes_to_string(b)?,
                3 => self.provider = bytes_to_string(b)?,
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContextIndexWire {
    pub page: u32,
    pub track: u32,
}

impl WireMessage for ContextIndexWire {
    fn encode(&self, out: &mut Vec<u8>) {
        write_varint_field(out, 1, self.page as u64);
        write_varint_field(out, 2, self.track as u64);
    }

    fn bind_field(&mut self, field_number: u32, value: Field<'_>) -> CoreResult<()> {
        if let Field::Varint(v) = value {
            match field_number {
                1 => self.page = v as u32,
                2 => self.track = v as u32,
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerStateWire {
    pub track: Option<ProvidedTrackWire>,
    pub prev_tracks: Vec<ProvidedTrackWire>,
    pub next_tracks: Vec<ProvidedTrackWire>,
    pub context_uri: String,
    pub context_url: String,
    pub session_id: String,
    pub timestamp: u64,
    pub position_as_of_timestamp: u64,
    pub is_playing: bool,
    pub is_paused: bool,
    pub is_buffering: bool,
    pub playback_speed: f64,
    pub is_system_initiated: bool,
    pub index: Option<ContextIndexWire>,
}

impl WireMessage for PlayerStateWire {
    fn encode(&self, out: &mut Vec<u8>) {
        if let Some(track) = &self.track {
            write_message_field(out, 1, track);
        }
        for track in &self.prev_tracks {
            write_message_field(out, 2, track);
        }
        for track in &self.next_tracks {
            write_message_field(out, 3, track);
        }
        write_string_field(out, 4, &self.context_uri);
        write_string_field(out, 5, &self.context_url);
        write_string_field(out, 6, &self.session_id);
        write_varint_field(out, 7, self.timestamp);
        write_varint_field(out, 8, self.position_as_of_timestamp);
        write_bool_field(out, 9, self.is_playing);
        write_bool_field(out, 10, self.is_paused);
        write_bool_field(out, 11, self.is_buffering);
        // playback_speed travels as its bit pattern in a varint, matching
        // the rest of this codec's varint-only numeric handling.
        write_varint_field(out, 12, self.playback_speed.to_bits());
        write_bool_field(out, 13, self.is_system_initiated);
        if let Some(index) = &self.index {
            write_message_field(out, 14, index);
        }
    }

    fn bind_field(&mut self, field_number: u32, value: Field<'_>) -> CoreResult<()> {
        match (field_number, value) {
            (1, Field::Bytes(b)) => self.track = Some(ProvidedTrackWire::decode(b)?),
            (2, Field::Bytes(b)) => self.prev_tracks.push(ProvidedTrackWire::decode(b)?),
            (3, Field::Bytes(b)) => self.next_tracks.push(ProvidedTrackWire::decode(b)?),
            (4, Field::Bytes(b)) => self.context_uri = bytes_to_string(b)?,
            (5, Field::Bytes(b)) => self.context_url = bytes_to_string(b)?,
            (6, Field::Bytes(b)) => self.session_id = bytes_to_string(b)?,
            (7, Field::Varint(v)) => self.timestamp = v,
            (8, Field::Varint(v)) => self.position_as_of_timestamp = v,
            (9, Field::Varint(v)) => self.is_playing = v != 0,
            (10, Field::Varint(v)) => self.is_paused = v != 0,
            (11, Field::Varint(v)) => self.is_buffering = v != 0,
            (12, Field::Varint(v)) => self.playback_speed = f64::from_bits(v),
            (13, Field::Varint(v)) => self.is_system_initiated = v != 0,
            (14, Field::Bytes(b)) => self.index = Some(ContextIndexWire::decode(b)?),
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceInfoWire {
    pub can_play: bool,
    pub volume: u32,
    pub name: String,
    pub device_id: String,
    pub software_version: String,
    pub supported_types: Vec<String>,
}

impl WireMessage for DeviceInfoWire {
    fn encode(&self, out: &mut Vec<u8>) {
        write_bool_field(out, 1, self.can_play);
        write_varint_field(out, 2, self.volume as u64);
        write_string_field(out, 3, &self.name);
        write_string_field(out, 4, &self.device_id);
        write_string_field(out, 5, &self.software_version);
        for supported_type in &self.supported_types {
            write_string_field(out, 6, supported_type);
        }
    }

    fn bind_field(&mut self, field_number: u32, value: Field<'_>) -> CoreResult<()> {
        match (field_number, value) {
            (1, Field::Varint(v)) => self.can_play = v != 0,
            (2, Field::Varint(v)) => self.volume = v as u32,
            (3, Field::Bytes(b)) => self.name = bytes_to_string(b)?,
            (4, Field::Bytes(b)) => self.device_id = bytes_to_string(b)?,
            (5, Field::Bytes(b)) => self.software_version = bytes_to_string(b)?,
            (6, Field::Bytes(b)) => self.supported_types.push(bytes_to_string(b)?),
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutStateReason {
    NewConnection,
    PlayerStateChanged,
}

impl PutStateReason {
    fn as_u64(self) -> u64 {
        match self {
            PutStateReason::NewConnection => 0,
            PutStateReason::PlayerStateChanged => 1,
        }
    }

    fn from_u64(v: u64) -> Self {
        match v {
            0 => PutStateReason::NewConnection,
            _ => PutStateReason::PlayerStateChanged,
        }
    }
}

impl Default for PutStateReason {
    fn default() -> Self {
        PutStateReason::PlayerStateChanged
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PutStateRequest {
    pub device: DeviceInfoWire,
    pub player_state: PlayerStateWire,
    pub is_active: bool,
    pub member_type: u32,
    pub put_state_reason: PutStateReason,
    pub message_id: u32,
    pub last_command_message_id: u32,
    pub last_command_sent_by_device_id: String,
    pub client_side_timestamp: u64,
    pub started_playing_at: u64,
    pub has_been_playing_for_ms: u64,
}

impl WireMessage for PutStateRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        write_message_field(out, 1, &self.device);
        write_message_field(out, 2, &self.player_state);
        write_bool_field(out, 3, self.is_active);
        write_varint_field(out, 4, self.member_type as u64);
        write_varint_field(out, 5, self.put_state_reason.as_u64());
        write_varint_field(out, 6, self.message_id as u64);
        write_varint_field(out, 7, self.last_command_message_id as u64);
        write_string_field(out, 8, &self.last_command_sent_by_device_id);
        write_varint_field(out, 9, self.client_side_timestamp);
        write_varint_field(out, 10, self.started_playing_at);
        write_varint_field(out, 11, self.has_been_playing_for_ms);
    }

    fn bind_field(&mut self, field_number: u32, value: Field<'_>) -> CoreResult<()> {
        match (field_number, value) {
            (1, Field::Bytes(b)) => self.device = DeviceInfoWire::decode(b)?,
            (2, Field::Bytes(b)) => self.player_state = PlayerStateWire::decode(b)?,
            (3, Field::Varint(v)) => self.is_active = v != 0,
            (4, Field::Varint(v)) => self.member_type = v as u32,
            (5, Field::Varint(v)) => self.put_state_reason = PutStateReason::from_u64(v),
            (6, Field::Varint(v)) => self.message_id = v as u32,
            (7, Field::Varint(v)) => self.last_command_message_id = v as u32,
            (8, Field::Bytes(b)) => self.last_command_sent_by_device_id = bytes_to_string(b)?,
            (9, Field::Varint(v)) => self.client_side_timestamp = v,
            (10, Field::Varint(v)) => self.started_playing_at = v,
            (11, Field::Varint(v)) => self.has_been_playing_for_ms = v,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferCurrentSession {
    pub original_session_id: String,
    pub current_uid: String,
}

impl WireMessage for TransferCurrentSession {
    fn encode(&self, out: &mut Vec<u8>) {
        write_string_field(out, 1, &self.original_session_id);
        write_string_field(out, 2, &self.current_uid);
    }

    fn bind_field(&mut self, field_number: u32, value: Field<'_>) -> CoreResult<()> {
        if let Field::Bytes(b) = value {
            match field_number {
                1 => self.original_session_id = bytes_to_string(b)?,
                2 => self.current_uid = bytes_to_string(b)?,
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferCurrentTrack {
    pub gid: Vec<u8>,
}

impl WireMessage for TransferCurrentTrack {
    fn encode(&self, out: &mut Vec<u8>) {
        write_bytes_field(out, 1, &self.gid);
    }

    fn bind_field(&mut self, field_number: u32, value: Field<'_>) -> CoreResult<()> {
        if let (1, Field::Bytes(b)) = (field_number, value) {
            self.gid = b.to_vec();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferPlayback {
    pub timestamp: u64,
    pub position_as_of_timestamp: u64,
    pub is_paused: bool,
    pub current_track: Option<TransferCurrentTrack>,
}

impl WireMessage for TransferPlayback {
    fn encode(&self, out: &mut Vec<u8>) {
        write_varint_field(out, 1, self.timestamp);
        write_varint_field(out, 2, self.position_as_of_timestamp);
        write_bool_field(out, 3, self.is_paused);
        if let Some(track) = &self.current_track {
            write_message_field(out, 4, track);
        }
    }

    fn bind_field(&mut self, field_number: u32, value: Field<'_>) -> CoreResult<()> {
        match (field_number, value) {
            (1, Field::Varint(v)) => self.timestamp = v,
            (2, Field::Varint(v)) => self.position_as_of_timestamp = v,
            (3, Field::Varint(v)) => self.is_paused = v != 0,
            (4, Field::Bytes(b)) => self.current_track = Some(TransferCurrentTrack::decode(b)?),
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferOptions {
    pub restore_paused: String,
    pub shuffle: bool,
    pub repeat_context: bool,
    pub repeat_track: bool,
    pub playback_speed: f64,
}

impl WireMessage for TransferOptions {
    fn encode(&self, out: &mut Vec<u8>) {
        write_string_field(out, 1, &self.restore_paused);
        write_bool_field(out, 2, self.shuffle);
        write_bool_field(out, 3, self.repeat_context);
        write_bool_field(out, 4, self.repeat_track);
        write_varint_field(out, 5, self.playback_speed.to_bits());
    }

    fn bind_field(&mut self, field_number: u32, value: Field<'_>) -> CoreResult<()> {
        match (field_number, value) {
            (1, Field::Bytes(b)) => self.restore_paused = bytes_to_string(b)?,
            (2, Field::Varint(v)) => self.shuffle = v != 0,
            (3, Field::Varint(v)) => self.repeat_context = v != 0,
            (4, Field::Varint(v)) => self.repeat_track = v != 0,
            (5, Field::Varint(v)) => self.playback_speed = f64::from_bits(v),
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferContext {
    pub uri: String,
    pub url: String,
}

impl WireMessage for TransferContext {
    fn encode(&self, out: &mut Vec<u8>) {
        write_string_field(out, 1, &self.uri);
        write_string_field(out, 2, &self.url);
    }

    fn bind_field(&mut self, field_number: u32, value: Field<'_>) -> CoreResult<()> {
        if let Field::Bytes(b) = value {
            match field_number {
                1 => self.uri = bytes_to_string(b)?,
                2 => self.url = bytes_to_string(b)?,
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueTrack {
    pub uri: String,
    pub uid: String,
}

impl WireMessage for QueueTrack {
    fn encode(&self, out: &mut Vec<u8>) {
        write_string_field(out, 1, &self.uri);
        write_string_field(out, 2, &self.uid);
    }

    fn bind_field(&mut self, field_number: u32, value: Field<'_>) -> CoreResult<()> {
        if let Field::Bytes(b) = value {
            match field_number {
                1 => self.uri = bytes_to_string(b)?,
                2 => self.uid = bytes_to_string(b)?,
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferQueue {
    pub tracks: Vec<QueueTrack>,
    pub is_playing_queue: bool,
}

impl WireMessage for TransferQueue {
    fn encode(&self, out: &mut Vec<u8>) {
        for track in &self.tracks {
            write_message_field(out, 1, track);
        }
        write_bool_field(out, 2, self.is_playing_queue);
    }

    fn bind_field(&mut self, field_number: u32, value: Field<'_>) -> CoreResult<()> {
        match (field_number, value) {
            (1, Field::Bytes(b)) => self.tracks.push(QueueTrack::decode(b)?),
            (2, Field::Varint(v)) => self.is_playing_queue = v != 0,
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferState {
    pub current_session: TransferCurrentSession,
    pub playback: TransferPlayback,
    pub options: TransferOptions,
    pub context: TransferContext,
    pub queue: TransferQueue,
}

impl WireMessage for TransferState {
    fn encode(&self, out: &mut Vec<u8>) {
        write_message_field(out, 1, &self.current_session);
        write_message_field(out, 2, &self.playback);
        write_message_field(out, 3, &self.options);
        write_message_field(out, 4, &self.context);
        write_message_field(out, 5, &self.queue);
    }

    fn bind_field(&mut self, field_number: u32, value: Field<'_>) -> CoreResult<()> {
        match (field_number, value) {
            (1, Field::Bytes(b)) => self.current_session = TransferCurrentSession::decode(b)?,
            (2, Field::Bytes(b)) => self.playback = TransferPlayback::decode(b)?,
            (3, Field::Bytes(b)) => self.options = TransferOptions::decode(b)?,
            (4, Field::Bytes(b)) => self.context = TransferContext::decode(b)?,
            (5, Field::Bytes(b)) => self.queue = TransferQueue::decode(b)?,
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_state_request_round_trips() {
        let mut req = PutStateRequest::default();
        req.is_active = true;
        req.player_state.context_uri = "spotify:playlist:abc".into();
        req.player_state.prev_tracks.push(ProvidedTrackWire {
            uri: "spotify:track:a".into(),
            uid: "u1".into(),
            provider: "context".into(),
        });
        req.player_state.index = Some(ContextIndexWire { page: 1, track: 2 });

        let mut buf = Vec::new();
        req.encode(&mut buf);
        let decoded = PutStateRequest::decode(&buf).unwrap();
        assert_eq!(req, decoded);
    }

    #[test]
    fn transfer_state_round_trips() {
        let mut transfer = TransferState::default();
        transfer.current_session.current_uid = "uid-42".into();
        transfer.context.uri = "spotify:playlist:37i9dQZF1DXcBWIGoYBM5M".into();
        transfer.playback.timestamp = 1000;
        transfer.playback.position_as_of_timestamp = 500;

        let mut buf = Vec::new();
        transfer.encode(&mut buf);
        let decoded = TransferState::decode(&buf).unwrap();
        assert_eq!(transfer, decoded);
    }
}
