//! Network-idle detection from CDP network events.
//!
//! A page counts as settled once no more than `max_inflight` requests have
//! stayed open for a full quiet window. Requiring zero would never finish on
//! pages with long-polling or analytics beacons.

use std::collections::HashSet;
use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::{EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent};
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use tokio::time::Instant;

use super::RenderError;

pub(crate) enum NetEvent {
    Started(String),
    Settled(String),
}

pub(crate) struct NetworkIdle {
    events: BoxStream<'static, NetEvent>,
    max_inflight: usize,
    window: Duration,
}

impl NetworkIdle {
    /// Subscribe to `page`'s network events. Call before navigating.
    pub(crate) async fn watch(page: &Page, max_inflight: usize, window: Duration) -> Result<Self, RenderError> {
        let listen = |e: chromiumoxide::error::CdpError| RenderError::Navigation(format!("event subscription: {e}"));

        let started = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(listen)?
            .map(|e| NetEvent::Started(e.request_id.inner().clone()));
        let finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(listen)?
            .map(|e| NetEvent::Settled(e.request_id.inner().clone()));
        let failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(listen)?
            .map(|e| NetEvent::Settled(e.request_id.inner().clone()));

        let events = stream::select_all([started.boxed(), finished.boxed(), failed.boxed()]).boxed();

        Ok(Self { events, max_inflight, window })
    }

    /// Resolve once the page has been quiet for the window.
    ///
    /// Callers bound this with their own timeout.
    pub(crate) async fn settled(self) {
        settle(self.events, self.max_inflight, self.window).await;
    }
}

/// Consume `events` until at most `max_inflight` requests have been open for
/// a full `window`. The window restarts whenever the count goes above the
/// limit. Returns early if the stream ends.
pub(crate) async fn settle<S>(mut events: S, max_inflight: usize, window: Duration)
where
    S: Stream<Item = NetEvent> + Unpin,
{
    let mut inflight = HashSet::new();
    let mut quiet_since = Some(Instant::now());

    loop {
        let next = match quiet_since {
            Some(since) => match tokio::time::timeout_at(since + window, events.next()).await {
                Ok(event) => event,
                Err(_) => return,
            },
            None => events.next().await,
        };

        match next {
            Some(NetEvent::Started(id)) => {
                inflight.insert(id);
            }
            Some(NetEvent::Settled(id)) => {
                inflight.remove(&id);
            }
            None => return,
        }

        if inflight.len() <= max_inflight {
            quiet_since.get_or_insert_with(Instant::now);
        } else {
            quiet_since = None;
        }
    }
}
