//! Data model for the context track resolver (§3, §4.H).

use crate::ids::TrackId;

/// One track inside a context, tagged with where it sits (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextTrack {
    pub uri: Option<String>,
    pub uid: Option<String>,
    pub gid: Option<[u8; 16]>,
    pub page_index: u32,
    pub track_index: u32,
}

impl ContextTrack {
    pub fn track_id(&self) -> TrackId {
        TrackId::new(self.uid.clone(), self.uri.clone())
    }

    /// Its position in the context, for ordering across page boundaries.
    pub fn position(&self) -> (u32, u32) {
        (self.page_index, self.track_index)
    }
}

/// The device's outward view of a track (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvidedTrack {
    pub uri: String,
    pub uid: String,
    pub provider: TrackProvider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackProvider {
    Context,
    Queue,
}

impl TrackProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackProvider::Context => "context",
            TrackProvider::Queue => "queue",
        }
    }
}

/// One page of the context, inline or materialized from a URL (§3).
///
/// Invariants: `fetch_window_start <= fetch_window_end <= tracks.len()`;
/// `first_id` is the id of element 0 once any track has been seen;
/// `last_id` is the id of the last track observed on this page.
#[derive(Debug, Clone)]
pub struct ResolvedContextPage {
    pub page_index: u32,
    pub page_url: Option<String>,
    pub next_page_url: Option<String>,
    pub first_id: Option<TrackId>,
    pub last_id: Option<TrackId>,
    pub is_in_root: bool,
    pub fetch_window_start: usize,
    pub fetch_window_end: usize,
    pub tracks: Vec<ContextTrack>,
}

impl ResolvedContextPage {
    pub fn url_only(page_index: u32, page_url: String) -> Self {
        Self {
            page_index,
            page_url: Some(page_url),
            next_page_url: None,
            first_id: None,
            last_id: None,
            is_in_root: false,
            fetch_window_start: 0,
            fetch_window_end: 0,
            tracks: Vec::new(),
        }
    }

    pub fn is_materialized(&self) -> bool {
        !self.tracks.is_empty() || self.fetch_window_end > 0
    }

    pub fn set_tracks(&mut self, tracks: Vec<ContextTrack>) {
        self.first_id = tracks.first().map(ContextTrack::track_id);
        self.last_id = tracks.last().map(ContextTrack::track_id);
        self.tracks = tracks;
    }
}

/// How the parser's acceptor should treat each track it walks (§4.H Parse model).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    AroundId,
    AddNext,
    AddPrevious,
}

/// Transient state while parsing a page's JSON (§3).
///
/// `max_window` is interpreted per `fetch_mode`: `AroundId` splits it evenly
/// into a previous- and next-half (so the total kept is `max_window + 1`);
/// `AddNext`/`AddPrevious` use it directly as their one-sided bound. This
/// keeps the data model to the single field §3 names while matching the
/// per-mode behavior the Parse model table describes.
#[derive(Debug, Clone)]
pub struct ContextTrackParseState {
    pub target: TrackId,
    pub fetch_mode: FetchMode,
    pub max_window: usize,
    pub tracks: Vec<ContextTrack>,
    pub found_index: Option<usize>,
    /// Position boundary for `AddNext`/`AddPrevious`: tracks are only
    /// accepted strictly beyond (or before) this point.
    pub anchor: Option<(u32, u32)>,
    accepted_after_found: usize,
}

impl ContextTrackParseState {
    pub fn new(target: TrackId, fetch_mode: FetchMode, max_window: usize) -> Self {
        Self {
            target,
            fetch_mode,
            max_window,
            tracks: Vec::new(),
            found_index: None,
            anchor: None,
            accepted_after_found: 0,
        }
    }

    pub fn with_anchor(mut self, anchor: (u32, u32)) -> Self {
        self.anchor = Some(anchor);
        self
    }

    fn max_previous(&self) -> usize {
        match self.fetch_mode {
            FetchMode::AroundId => self.max_window / 2,
            FetchMode::AddPrevious => self.max_window,
            FetchMode::AddNext => 0,
        }
    }

    fn max_next(&self) -> usize {
        match self.fetch_mode {
            FetchMode::AroundId => self.max_window - self.max_window / 2,
            FetchMode::AddNext => self.max_window,
            FetchMode::AddPrevious => 0,
        }
    }

    /// Feeds one parsed track through the fetch-mode-aware acceptor
    /// (§4.H Parse model table). Returns `true` if the operation should keep
    /// accepting further tracks from later pages (only relevant to
    /// `AroundId`, which must cross page boundaries while unresolved).
    pub fn accept(&mut self, track: ContextTrack) -> bool {
        match self.fetch_mode {
            FetchMode::AroundId => {
                if self.found_index.is_some() {
                    if self.accepted_after_found < self.max_next() {
                        self.tracks.push(track);
                        self.accepted_after_found += 1;
                    }
                    return self.accepted_after_found < self.max_next();
                }
                let matched = track.track_id().matches(&self.target);
                self.tracks.push(track);
                let cap = self.max_previous() + self.max_next() + 1;
                if self.tracks.len() > cap {
                    self.tracks.remove(0);
                }
                if matched {
                    self.found_index = Some(self.tracks.len() - 1);
                    self.accepted_after_found = 0;
                }
                true
            }
            FetchMode::AddNext => {
                let beyond_anchor = self
                    .anchor
                    .map(|anchor| track.position() > anchor)
                    .unwrap_or(true);
                if beyond_anchor && self.tracks.len() < self.max_next() {
                    self.tracks.push(track);
                }
                self.tracks.len() < self.max_next()
            }
            FetchMode::AddPrevious => {
                let before_anchor = self
                    .anchor
                    .map(|anchor| track.position() < anchor)
                    .unwrap_or(true);
                if before_anchor {
                    self.tracks.push(track);
                    if self.tracks.len() > self.max_previous() {
                        self.tracks.remove(0);
                    }
                }
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(page: u32, idx: u32, uid: &str) -> ContextTrack {
        ContextTrack {
            uri: None,
            uid: Some(uid.into()),
            gid: None,
            page_index: page,
            track_index: idx,
        }
    }

    #[test]
    fn around_id_slides_window_before_match_then_caps_after() {
        let mut state =
            ContextTrackParseState::new(TrackId::from_uid("t5"), FetchMode::AroundId, 4);
        for i in 0..10u32 {
            state.accept(track(0, i, &format!("t{i}")));
        }
        assert!(state.found_index.is_some());
        assert!(state.tracks.len() <= 4 / 2 + (4 - 4 / 2) + 1);
        assert!(state.tracks.iter().any(|t| t.uid.as_deref() == Some("t5")));
    }

    #[test]
    fn add_next_stops_after_max_next() {
        let mut state =
            ContextTrackParseState::new(TrackId::default(), FetchMode::AddNext, 3)
                .with_anchor((0, 5));
        for i in 0..10u32 {
            state.accept(track(0, i, &format!("t{i}")));
        }
        assert_eq!(state.tracks.len(), 3);
        assert_eq!(state.tracks[0].track_index, 6);
    }

    #[test]
    fn add_previous_keeps_closest_to_anchor() {
        let mut state =
            ContextTrackParseState::new(TrackId::default(), FetchMode::AddPrevious, 3)
                .with_anchor((0, 5));
        for i in 0..5u32 {
            state.accept(track(0, i, &format!("t{i}")));
        }
        assert_eq!(state.tracks.len(), 3);
        assert_eq!(state.tracks.last().unwrap().track_index, 4);
    }
}
