//! Identity types (§3): `SpotifyId` and the `TrackId` used to match a
//! context track against a target during resolution.

use crate::crypto::base62;
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpotifyItemKind {
    Track,
    Episode,
    Playlist,
}

impl SpotifyItemKind {
    fn as_uri_segment(self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Episode => "episode",
            Self::Playlist => "playlist",
        }
    }

    fn from_uri_segment(s: &str) -> CoreResult<Self> {
        match s {
            "track" => Ok(Self::Track),
            "episode" => Ok(Self::Episode),
            "playlist" => Ok(Self::Playlist),
            other => Err(CoreError::invalid_argument(format!(
                "unknown spotify id kind: {other}"
            ))),
        }
    }
}

/// A 16-byte opaque id plus its kind. Base62 and URI forms are derived, never
/// stored, so the three representations can never drift out of sync (§3 I7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpotifyId {
    pub gid: [u8; 16],
    pub kind: SpotifyItemKind,
}

impl SpotifyId {
    pub fn from_gid(gid: [u8; 16], kind: SpotifyItemKind) -> Self {
        Self { gid, kind }
    }

    pub fn from_hex(hex: &str, kind: SpotifyItemKind) -> CoreResult<Self> {
        if hex.len() != 32 {
            return Err(CoreError::invalid_argument("spotify id hex must be 32 chars"));
        }
        let mut gid = [0u8; 16];
        for i in 0..16 {
            gid[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|e| CoreError::invalid_argument(e.to_string()))?;
        }
        Ok(Self { gid, kind })
    }

    pub fn from_base62(id: &str, kind: SpotifyItemKind) -> CoreResult<Self> {
        Ok(Self {
            gid: base62::decode(id)?,
            kind,
        })
    }

    /// Parses a canonical `spotify:<kind>:<base62>` URI.
    pub fn from_uri(uri: &str) -> CoreResult<Self> {
        let mut parts = uri.split(':');
        let scheme = parts.next().unwrap_or_default();
        let kind_segment = parts.next().unwrap_or_default();
        let id = parts.next().unwrap_or_default();
        if scheme != "spotify" || id.is_empty() {
            return Err(CoreError::invalid_argument(format!("malformed uri: {uri}")));
        }
        let kind = SpotifyItemKind::from_uri_segment(kind_segment)?;
        Self::from_base62(id, kind)
    }

    pub fn to_base62(self) -> String {
        base62::encode(&self.gid)
    }

    pub fn to_hex(self) -> String {
        self.gid.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn to_uri(self) -> String {
        format!("spotify:{}:{}", self.kind.as_uri_segment(), self.to_base62())
    }
}

/// `{uri, uid}` pair used to identify a track within a context. §3: either
/// field uniquely identifies a track; compare `uid`-first, then `uri`;
/// empty-both never matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TrackId {
    pub uid: Option<String>,
    pub uri: Option<String>,
}

impl TrackId {
    pub fn new(uid: Option<String>, uri: Option<String>) -> Self {
        Self { uid, uri }
    }

    pub fn from_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            uri: None,
        }
    }

    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            uid: None,
            uri: Some(uri.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.uid.is_none() && self.uri.is_none()
    }

    /// `uid` match takes priority; falls back to `uri`; empty-both never matches.
    pub fn matches(&self, other: &TrackId) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        if let (Some(a), Some(b)) = (&self.uid, &other.uid) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.uri, &other.uri) {
            return a == b;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_gid_base62_and_uri() {
        let id = SpotifyId::from_gid([7u8; 16], SpotifyItemKind::Track);
        let via_base62 = SpotifyId::from_base62(&id.to_base62(), SpotifyItemKind::Track).unwrap();
        let via_uri = SpotifyId::from_uri(&id.to_uri()).unwrap();
        assert_eq!(id, via_base62);
        assert_eq!(id, via_uri);
    }

    #[test]
    fn track_id_matches_on_uid_first() {
        let a = TrackId::new(Some("u1".into()), Some("spotify:track:a".into()));
        let b = TrackId::new(Some("u1".into()), Some("spotify:track:b".into()));
        assert!(a.matches(&b));
    }

    #[test]
    fn track_id_falls_back_to_uri() {
        let a = TrackId::from_uri("spotify:track:aaaa");
        let b = TrackId::from_uri("spotify:track:aaaa");
        assert!(a.matches(&b));
    }

    #[test]
    fn empty_track_id_never_matches() {
        let a = TrackId::default();
        let b = TrackId::default();
        assert!(!a.matches(&b));
    }
}
