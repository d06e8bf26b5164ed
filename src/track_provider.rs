//! The track provider (§4.I): fuses a manual queue with the context
//! resolver's windowed view into the player's outward prev/current/next
//! projection.

use crate::codec::messages::{TransferContext, TransferQueue};
use crate::context::{ContextResolver, ProvidedTrack, TrackProvider as ProviderTag};
use crate::error::CoreResult;

const MAX_ENCODED_TRACKS_WINDOW: usize = 10;

#[derive(Debug, Clone)]
struct QueueEntry {
    uri: String,
    uid: String,
}

/// Combines a manual queue with the resolver's context view (§4.I).
pub struct TrackProvider {
    resolver: ContextResolver,
    queue: Vec<QueueEntry>,
    queue_index: usize,
    is_playing_queue: bool,
    current: Option<ProvidedTrack>,
    prev_tracks: Vec<ProvidedTrack>,
    next_tracks: Vec<ProvidedTrack>,
}

impl TrackProvider {
    pub fn new(resolver: ContextResolver) -> Self {
        Self {
            resolver,
            queue: Vec::new(),
            queue_index: 0,
            is_playing_queue: false,
            current: None,
            prev_tracks: Vec::new(),
            next_tracks: Vec::new(),
        }
    }

    /// Replaces the manual queue; sets `is_playing_queue` from the transfer
    /// payload's `Queue.is_playing_queue` field (§4.I `set_queue`).
    pub fn set_queue(&mut self, queue: &TransferQueue) {
        self.queue = queue
            .tracks
            .iter()
            .map(|t| QueueEntry {
                uri: t.uri.clone(),
                uid: t.uid.clone(),
            })
            .collect();
        self.queue_index = 0;
        self.is_playing_queue = queue.is_playing_queue;
    }

    /// Forwards `(context.url, uid, uri)` to the resolver, resolves the
    /// current track and a bounded window each side, and materializes the
    /// outward `prev_tracks`/`next_tracks` projections (§4.I).
    pub async fn load_track_and_context(
        &mut self,
        uid: Option<String>,
        uri: Option<String>,
        context: &TransferContext,
    ) -> CoreResult<()> {
        self.resolver.update_context(&context.url, uid, uri);
        let track = self.resolver.current_track().await?;
        self.current = Some(ProvidedTrack {
            uri: track.uri.clone().unwrap_or_default(),
            uid: track.uid.clone().unwrap_or_default(),
            provider: ProviderTag::Context,
        });
        self.rebuild_projections();
        Ok(())
    }

    fn rebuild_projections(&mut self) {
        self.prev_tracks = self
            .resolver
            .previous_tracks()
            .iter()
            .rev()
            .take(MAX_ENCODED_TRACKS_WINDOW)
            .map(|t| ProvidedTrack {
                uri: t.uri.clone().unwrap_or_default(),
                uid: t.uid.clone().unwrap_or_default(),
                provider: ProviderTag::Context,
            })
            .collect();
        self.next_tracks = self
            .resolver
            .next_tracks()
            .iter()
            .take(MAX_ENCODED_TRACKS_WINDOW)
            .map(|t| ProvidedTrack {
                uri: t.uri.clone().unwrap_or_default(),
                uid: t.uid.clone().unwrap_or_default(),
                provider: ProviderTag::Context,
            })
            .collect();
    }

    /// `queue[queue_index]` with `provider="queue"` while a queue is
    /// playing; otherwise the resolver's current track (§4.I `current_track`).
    pub fn current_track(&self) -> Option<ProvidedTrack> {
        if self.is_playing_queue {
            self.queue.get(self.queue_index).map(|entry| ProvidedTrack {
                uri: entry.uri.clone(),
                uid: format!("q{}", self.queue_index),
                provider: ProviderTag::Queue,
            })
        } else {
            self.current.clone()
        }
    }

    pub fn previous_tracks(&self) -> &[ProvidedTrack] {
        &self.prev_tracks
    }

    pub fn next_tracks(&self) -> &[ProvidedTrack] {
        &self.next_tracks
    }

    /// Advances the resolver (or the queue, toggling back to context once
    /// it drains) and rebuilds the outward projections (§4.I).
    pub async fn skip_to_next_track(&mut self) -> CoreResult<()> {
        if self.is_playing_queue {
            self.queue_index += 1;
            if self.queue_index >= self.queue.len() {
                self.is_playing_queue = false;
            }
            return Ok(());
        }
        let track = self.resolver.next().await?;
        self.current = Some(ProvidedTrack {
            uri: track.uri.clone().unwrap_or_default(),
            uid: track.uid.clone().unwrap_or_default(),
            provider: ProviderTag::Context,
        });
        self.rebuild_projections();
        Ok(())
    }

    pub async fn skip_to_previous_track(&mut self) -> CoreResult<()> {
        if self.is_playing_queue {
            self.queue_index = self.queue_index.saturating_sub(1);
            return Ok(());
        }
        let track = self.resolver.previous().await?;
        self.current = Some(ProvidedTrack {
            uri: track.uri.clone().unwrap_or_default(),
            uid: track.uid.clone().unwrap_or_default(),
            provider: ProviderTag::Context,
        });
        self.rebuild_projections();
        Ok(())
    }

    /// From the resolver; `None` while playing a queue (§4.I).
    pub fn current_context_index(&self) -> Option<(u32, u32)> {
        if self.is_playing_queue {
            return None;
        }
        self.resolver.current_context_index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::blob::AuthBlob;
    use crate::auth::CredentialsResolver;
    use crate::codec::messages::QueueTrack;
    use crate::context::ContextResolverConfig;
    use crate::spclient::SpClient;
    use std::sync::Arc;

    fn provider() -> TrackProvider {
        let spclient = Arc::new(SpClient::new(
            Arc::new(CredentialsResolver::new("client".into(), "device".into())),
            "user".into(),
            "device".into(),
            "US".into(),
        ));
        let auth_blob = AuthBlob {
            auth_type: 0,
            data: vec![],
        };
        let resolver = ContextResolver::new(spclient, auth_blob, ContextResolverConfig::default());
        TrackProvider::new(resolver)
    }

    fn queue_of(uris: &[&str]) -> TransferQueue {
        TransferQueue {
            tracks: uris
                .iter()
                .map(|uri| QueueTrack {
                    uri: uri.to_string(),
                    uid: String::new(),
                })
                .collect(),
            is_playing_queue: true,
        }
    }

    #[tokio::test]
    async fn plays_from_the_manual_queue_when_flagged() {
        let mut provider = provider();
        provider.set_queue(&queue_of(&["spotify:track:a", "spotify:track:b"]));

        let current = provider.current_track().unwrap();
        assert_eq!(current.uri, "spotify:track:a");
        assert_eq!(current.uid, "q0");
        assert_eq!(current.provider, crate::context::model::TrackProvider::Queue);

        provider.skip_to_next_track().await.unwrap();
        assert_eq!(provider.current_track().unwrap().uri, "spotify:track:b");
    }

    #[tokio::test]
    async fn queue_toggles_back_to_context_once_drained() {
        let mut provider = provider();
        provider.set_queue(&queue_of(&["spotify:track:a"]));
        provider.skip_to_next_track().await.unwrap();
        assert!(!provider.is_playing_queue);
    }

    #[test]
    fn current_context_index_is_none_while_playing_queue() {
        let mut provider = provider();
        provider.set_queue(&queue_of(&["spotify:track:a"]));
        assert_eq!(provider.current_context_index(), None);
    }
}
