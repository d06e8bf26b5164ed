//! The context track resolver (§4.H) — the hardest subsystem: a windowed,
//! lazily-paged navigator over a tree of track pages. Single-threaded,
//! owned by the track provider (§5 Concurrency).

use crate::auth::blob::AuthBlob;
use crate::context::model::{ContextTrack, ContextTrackParseState, FetchMode, ResolvedContextPage};
use crate::context::parse::parse_context_page;
use crate::error::{CoreError, CoreResult};
use crate::ids::TrackId;
use crate::spclient::SpClient;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct ContextResolverConfig {
    pub max_window: usize,
    pub update_threshold: usize,
}

impl Default for ContextResolverConfig {
    fn default() -> Self {
        Self {
            max_window: 16,
            update_threshold: 8,
        }
    }
}

/// Paged, windowed navigator over a context (§3 Track cache, §4.H).
///
/// Invariants maintained across every public operation:
/// 1. `cache` is a contiguous slice of the underlying context.
/// 2. If `current` is set, `cache[current]` is the playing track.
/// 3. `cache.len() <= max_window + update_threshold`.
pub struct ContextResolver {
    spclient: Arc<SpClient>,
    auth_blob: AuthBlob,
    config: ContextResolverConfig,
    context_url: String,
    target: TrackId,
    pages: Vec<ResolvedContextPage>,
    cache: Vec<ContextTrack>,
    current: Option<usize>,
}

impl ContextResolver {
    pub fn new(spclient: Arc<SpClient>, auth_blob: AuthBlob, config: ContextResolverConfig) -> Self {
        Self {
            spclient,
            auth_blob,
            config,
            context_url: String::new(),
            target: TrackId::default(),
            pages: Vec::new(),
            cache: Vec::new(),
            current: None,
        }
    }

    /// Resets all state and stores the target for the next
    /// `ensure_context_tracks` call (§4.H `update_context`).
    pub fn update_context(&mut self, root_url: &str, current_uid: Option<String>, current_uri: Option<String>) {
        self.context_url = root_url.strip_prefix("context://").unwrap_or(root_url).to_string();
        self.target = TrackId::new(current_uid, current_uri);
        self.pages.clear();
        self.cache.clear();
        self.current = None;
    }

    pub fn current_context_index(&self) -> Option<(u32, u32)> {
        let track = self.current.and_then(|i| self.cache.get(i))?;
        Some((track.page_index, track.track_index))
    }

    pub async fn current_track(&mut self) -> CoreResult<&ContextTrack> {
        if self.current.is_none() {
            self.ensure_context_tracks().await?;
        }
        let idx = self.current.ok_or(CoreError::NoMessage)?;
        self.cache.get(idx).ok_or(CoreError::NoMessage)
    }

    pub fn previous_tracks(&self) -> &[ContextTrack] {
        match self.current {
            Some(i) => &self.cache[..i],
            None => &[],
        }
    }

    pub fn next_tracks(&self) -> &[ContextTrack] {
        match self.current {
            Some(i) => &self.cache[i + 1..],
            None => &[],
        }
    }

    /// First resolution of the context: fetches the root, walking pages with
    /// an `AroundId` acceptor until the target is found or the context is
    /// exhausted (§4.H Parse model, I4). On failure no partial state is
    /// retained — `self.pages`/`self.cache`/`self.current` are only written
    /// once the whole walk succeeds.
    async fn ensure_context_tracks(&mut self) -> CoreResult<()> {
        let root = self
            .spclient
            .resolve_context(&self.context_url, &self.auth_blob)
            .await?;
        let root_pages = root
            .get("pages")
            .and_then(|v| v.as_array())
            .ok_or_else(|| CoreError::invalid_argument("root context missing pages array"))?;

        let mut pages = Vec::with_capacity(root_pages.len());
        for (i, page_json) in root_pages.iter().enumerate() {
            let page_index = i as u32;
            if page_json.get("tracks").is_some() {
                pages.push(ResolvedContextPage {
                    page_index,
                    page_url: None,
                    next_page_url: None,
                    first_id: None,
                    last_id: None,
                    is_in_root: true,
                    fetch_window_start: 0,
                    fetch_window_end: 0,
                    tracks: Vec::new(),
                });
            } else if let Some(page_url) = page_json.get("pageUrl").and_then(|v| v.as_str()) {
                pages.push(ResolvedContextPage::url_only(page_index, page_url.to_string()));
            } else {
                return Err(CoreError::invalid_argument("page has neither tracks nor pageUrl"));
            }
        }
        if pages.is_empty() {
            return Err(CoreError::invalid_argument("context has no pages"));
        }

        let mut state =
            ContextTrackParseState::new(self.target.clone(), FetchMode::AroundId, self.config.max_window);
        let mut page_index = 0usize;
        loop {
            if page_index >= pages.len() {
                return Err(CoreError::invalid_argument("target track not found in context"));
            }
            self.materialize_page(&mut pages, page_index, &mut state).await?;
            if state.found_index.is_some() {
                break;
            }
            page_index += 1;
        }

        self.pages = pages;
        self.cache = state.tracks;
        self.current = state.found_index;
        Ok(())
    }

    /// Fetches page `index`'s JSON (by URL, or by re-resolving the root for
    /// an inline page), streams it through `state`'s acceptor, and updates
    /// `pages[index]`'s bookkeeping. Appends a fresh URL-only stub page
    /// (invariant 5) when the fetched page carries a `nextPageUrl` and
    /// `index` is still the last known page.
    async fn materialize_page(
        &self,
        pages: &mut Vec<ResolvedContextPage>,
        index: usize,
        state: &mut ContextTrackParseState,
    ) -> CoreResult<()> {
        let is_in_root = pages[index].is_in_root;
        let json = if is_in_root {
            let root = self
                .spclient
                .resolve_context(&self.context_url, &self.auth_blob)
                .await?;
            let page = root
                .get("pages")
                .and_then(|v| v.as_array())
                .and_then(|pages| pages.get(index))
                .ok_or_else(|| CoreError::invalid_argument("root page vanished between reads"))?;
            serde_json::to_string(page).map_err(|e| CoreError::invalid_argument(e.to_string()))?
        } else {
            let page_url = pages[index]
                .page_url
                .clone()
                .ok_or_else(|| CoreError::invalid_argument("url-only page missing pageUrl"))?;
            let body = self
                .spclient
                .fetch_context_page(&page_url, &self.auth_blob)
                .await?;
            serde_json::to_string(&body).map_err(|e| CoreError::invalid_argument(e.to_string()))?
        };

        let metadata = parse_context_page(&json, index as u32, state)?;

        pages[index].next_page_url = metadata.next_page_url.clone();
        pages[index].first_id = metadata.first_observed_id;
        pages[index].last_id = metadata.last_observed_id;
        pages[index].fetch_window_start = 0;
        pages[index].fetch_window_end = metadata.track_count;

        if metadata.next_page_url.is_some() && index + 1 == pages.len() {
            let next_url = metadata.next_page_url.unwrap();
            pages.push(ResolvedContextPage::url_only(index as u32 + 1, next_url));
        }
        Ok(())
    }

    /// Advances one track forward, fetching the next page first if the
    /// window has drifted within `update_threshold` of the tail (§4.H `next`).
    pub async fn next(&mut self) -> CoreResult<&ContextTrack> {
        let current = self.current.ok_or(CoreError::NoMessage)?;
        if self.cache.len() - 1 - current <= self.config.update_threshold {
            self.fetch_forward().await?;
        }
        let current = self.current.ok_or(CoreError::NoMessage)?;
        if current + 1 >= self.cache.len() {
            return Err(CoreError::NoMessage);
        }
        self.current = Some(current + 1);
        self.trim_front();
        self.current_cached_ref()
    }

    /// Symmetric to `next` (§4.H `previous`).
    pub async fn previous(&mut self) -> CoreResult<&ContextTrack> {
        let current = self.current.ok_or(CoreError::NoMessage)?;
        if current <= self.config.update_threshold {
            self.fetch_backward().await?;
        }
        let current = self.current.ok_or(CoreError::NoMessage)?;
        if current == 0 {
            return Err(CoreError::NoMessage);
        }
        self.current = Some(current - 1);
        self.trim_back();
        self.current_cached_ref()
    }

    pub fn skip_forward(&mut self, _track: &TrackId) -> CoreResult<()> {
        Err(CoreError::not_supported("skip_forward"))
    }

    pub fn skip_backward(&mut self, _track: &TrackId) -> CoreResult<()> {
        Err(CoreError::not_supported("skip_backward"))
    }

    fn current_cached_ref(&self) -> CoreResult<&ContextTrack> {
        let idx = self.current.ok_or(CoreError::NoMessage)?;
        self.cache.get(idx).ok_or(CoreError::NoMessage)
    }

    /// Page selection for forward boundary-crossing (§4.H Page selection).
    async fn fetch_forward(&mut self) -> CoreResult<()> {
        let last = match self.cache.last() {
            Some(t) => t.clone(),
            None => return Ok(()),
        };
        let p = last.page_index as usize;
        let at_page_tail = self.pages[p]
            .last_id
            .as_ref()
            .map(|id| id.matches(&last.track_id()))
            .unwrap_or(false);
        if !at_page_tail {
            return Ok(());
        }
        let next_p = p + 1;
        if next_p >= self.pages.len() {
            return Ok(()); // end of context reached; next() will simply stop advancing
        }

        let mut state = ContextTrackParseState::new(TrackId::default(), FetchMode::AddNext, self.config.max_window)
            .with_anchor(last.position());
        let mut pages = std::mem::take(&mut self.pages);
        self.materialize_page(&mut pages, next_p, &mut state).await?;
        self.pages = pages;
        self.cache.extend(state.tracks);
        Ok(())
    }

    /// Page selection for backward boundary-crossing (§4.H Page selection).
    async fn fetch_backward(&mut self) -> CoreResult<()> {
        let first = match self.cache.first() {
            Some(t) => t.clone(),
            None => return Ok(()),
        };
        let p = first.page_index as usize;
        let at_page_head = self.pages[p]
            .first_id
            .as_ref()
            .map(|id| id.matches(&first.track_id()))
            .unwrap_or(false);
        if at_page_head && p == 0 {
            return Ok(()); // start of context reached
        }
        let prev_p = if at_page_head { p.saturating_sub(1) } else { p };
        if prev_p == p && !at_page_head {
            return Ok(()); // current page still has untouched earlier indices
        }

        let mut state =
            ContextTrackParseState::new(TrackId::default(), FetchMode::AddPrevious, self.config.max_window)
                .with_anchor(first.position());
        let mut pages = std::mem::take(&mut self.pages);
        self.materialize_page(&mut pages, prev_p, &mut state).await?;
        self.pages = pages;
        let shift = state.tracks.len();
        let mut new_cache = state.tracks;
        new_cache.append(&mut self.cache);
        self.cache = new_cache;
        if let Some(current) = self.current {
            self.current = Some(current + shift);
        }
        Ok(())
    }

    fn trim_front(&mut self) {
        let cap = self.config.max_window + self.config.update_threshold;
        while self.cache.len() > cap {
            match self.current {
                Some(0) | None => break,
                Some(current) => self.current = Some(current - 1),
            }
            self.cache.remove(0);
        }
    }

    fn trim_back(&mut self) {
        let cap = self.config.max_window + self.config.update_threshold;
        while self.cache.len() > cap {
            let last = self.cache.len() - 1;
            if self.current == Some(last) {
                break;
            }
            self.cache.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CredentialsResolver;

    fn test_spclient() -> Arc<SpClient> {
        Arc::new(SpClient::new(
            Arc::new(CredentialsResolver::new("client".into(), "device".into())),
            "user".into(),
            "device".into(),
            "US".into(),
        ))
    }

    fn test_auth_blob() -> AuthBlob {
        AuthBlob {
            auth_type: 0,
            data: vec![1, 2, 3],
        }
    }

    #[test]
    fn fresh_resolver_has_no_current_track() {
        let resolver = ContextResolver::new(test_spclient(), test_auth_blob(), ContextResolverConfig::default());
        assert_eq!(resolver.current_context_index(), None);
        assert!(resolver.previous_tracks().is_empty());
        assert!(resolver.next_tracks().is_empty());
    }

    #[test]
    fn update_context_strips_context_scheme() {
        let mut resolver =
            ContextResolver::new(test_spclient(), test_auth_blob(), ContextResolverConfig::default());
        resolver.update_context("context://spotify:playlist:abc", Some("u1".into()), None);
        assert_eq!(resolver.context_url, "spotify:playlist:abc");
    }

    #[test]
    fn trim_front_never_drops_current() {
        let mut resolver =
            ContextResolver::new(test_spclient(), test_auth_blob(), ContextResolverConfig {
                max_window: 2,
                update_threshold: 0,
            });
        resolver.cache = vec![
            ContextTrack { uri: None, uid: Some("a".into()), gid: None, page_index: 0, track_index: 0 },
            ContextTrack { uri: None, uid: Some("b".into()), gid: None, page_index: 0, track_index: 1 },
            ContextTrack { uri: None, uid: Some("c".into()), gid: None, page_index: 0, track_index: 2 },
        ];
        resolver.current = Some(0);
        resolver.trim_front();
        assert_eq!(resolver.current, Some(0));
    }
}
