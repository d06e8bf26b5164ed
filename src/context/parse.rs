//! JSON parsing for context pages (§4.H Parse model). Walks the page with a
//! key-stack visitor instead of building a full `serde_json::Value` DOM
//! first, per the Design Notes' streaming-parser guidance — context pages
//! can run to thousands of tracks and the acceptor only ever needs to keep a
//! bounded slice of them.

use crate::context::model::{ContextTrack, ContextTrackParseState};
use crate::error::{CoreError, CoreResult};
use crate::ids::TrackId;
use serde::de::{DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use std::fmt;

/// What a page's JSON body carries besides its track list (§3). The
/// observed-id/track-count fields describe every track the parser walked,
/// independent of which ones the fetch-mode acceptor chose to keep, so the
/// page's own bookkeeping (`first_id`/`last_id`) stays accurate even when
/// the acceptor only retains a bounded slice.
#[derive(Debug, Clone, Default)]
pub struct PageMetadata {
    pub page_url: Option<String>,
    pub next_page_url: Option<String>,
    pub first_observed_id: Option<TrackId>,
    pub last_observed_id: Option<TrackId>,
    pub track_count: usize,
}

/// Parses one page's JSON, feeding every track it contains through
/// `state`'s fetch-mode acceptor (mutating `state.tracks` in place), and
/// returns the page's own `pageUrl`/`nextPageUrl` metadata.
pub fn parse_context_page(
    json: &str,
    page_index: u32,
    state: &mut ContextTrackParseState,
) -> CoreResult<PageMetadata> {
    let mut de = serde_json::Deserializer::from_str(json);
    let metadata = de
        .deserialize_map(PageVisitor { page_index, state })
        .map_err(|e| CoreError::invalid_argument(e.to_string()))?;
    de.end()
        .map_err(|e| CoreError::invalid_argument(e.to_string()))?;
    Ok(metadata)
}

struct PageVisitor<'s> {
    page_index: u32,
    state: &'s mut ContextTrackParseState,
}

impl<'de, 's> Visitor<'de> for PageVisitor<'s> {
    type Value = PageMetadata;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a context page object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut metadata = PageMetadata::default();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "pageUrl" => metadata.page_url = map.next_value()?,
                "nextPageUrl" => metadata.next_page_url = map.next_value()?,
                "tracks" => {
                    let observed = map.next_value_seed(TracksSeed {
                        page_index: self.page_index,
                        state: self.state,
                    })?;
                    metadata.first_observed_id = observed.first;
                    metadata.last_observed_id = observed.last;
                    metadata.track_count = observed.count;
                }
                _ => {
                    let _ignored: IgnoredAny = map.next_value()?;
                }
            }
        }
        Ok(metadata)
    }
}

#[derive(Debug, Default)]
struct ObservedTracks {
    first: Option<TrackId>,
    last: Option<TrackId>,
    count: usize,
}

struct TracksSeed<'s> {
    page_index: u32,
    state: &'s mut ContextTrackParseState,
}

impl<'de, 's> DeserializeSeed<'de> for TracksSeed<'s> {
    type Value = ObservedTracks;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, 's> Visitor<'de> for TracksSeed<'s> {
    type Value = ObservedTracks;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "an array of track objects")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut track_index = 0u32;
        let mut observed = ObservedTracks::default();
        // Every element must be consumed so the outer map's cursor lands
        // correctly on whatever key follows "tracks" — the acceptor still
        // only *keeps* a bounded slice in `state.tracks`.
        while let Some(raw) = seq.next_element_seed(RawTrackSeed)? {
            let track = ContextTrack {
                uri: raw.uri,
                uid: raw.uid,
                gid: raw.gid,
                page_index: self.page_index,
                track_index,
            };
            if observed.first.is_none() {
                observed.first = Some(track.track_id());
            }
            observed.last = Some(track.track_id());
            observed.count += 1;
            track_index += 1;
            self.state.accept(track);
        }
        Ok(observed)
    }
}

#[derive(Debug, Default)]
struct RawTrack {
    uri: Option<String>,
    uid: Option<String>,
    gid: Option<[u8; 16]>,
}

struct RawTrackSeed;

impl<'de> DeserializeSeed<'de> for RawTrackSeed {
    type Value = RawTrack;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(RawTrackVisitor)
    }
}

struct RawTrackVisitor;

impl<'de> Visitor<'de> for RawTrackVisitor {
    type Value = RawTrack;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a track object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut raw = RawTrack::default();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "uri" => raw.uri = map.next_value()?,
                "uid" => raw.uid = map.next_value()?,
                "gid" => {
                    let hex: Option<String> = map.next_value()?;
                    raw.gid = hex.and_then(|h| parse_gid_hex(&h));
                }
                _ => {
                    let _ignored: IgnoredAny = map.next_value()?;
                }
            }
        }
        Ok(raw)
    }
}

fn parse_gid_hex(hex: &str) -> Option<[u8; 16]> {
    if hex.len() != 32 {
        return None;
    }
    let mut gid = [0u8; 16];
    for i in 0..16 {
        gid[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(gid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::model::FetchMode;
    use crate::ids::TrackId;

    #[test]
    fn parses_tracks_and_metadata() {
        let json = r#"{
            "pageUrl": "https://example/page0",
            "nextPageUrl": "https://example/page1",
            "tracks": [
                {"uri": "spotify:track:a", "uid": "u0"},
                {"uri": "spotify:track:b", "uid": "u1"},
                {"uri": "spotify:track:c", "uid": "u2"}
            ]
        }"#;
        let mut state = ContextTrackParseState::new(TrackId::from_uid("u1"), FetchMode::AroundId, 4);
        let metadata = parse_context_page(json, 0, &mut state).unwrap();
        assert_eq!(metadata.next_page_url.as_deref(), Some("https://example/page1"));
        assert_eq!(metadata.track_count, 3);
        assert!(state.found_index.is_some());
        assert!(state.tracks.iter().any(|t| t.uid.as_deref() == Some("u1")));
    }

    #[test]
    fn malformed_json_fails_with_invalid_argument() {
        let mut state = ContextTrackParseState::new(TrackId::from_uid("u1"), FetchMode::AroundId, 4);
        let err = parse_context_page("{not json", 0, &mut state).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }
}
