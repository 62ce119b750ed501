//! Request orchestration: key derivation, store lookup, capture and write.

use std::sync::Arc;

use bytes::Bytes;
use ogsnap_client::{Origin, SnapshotCapturer};
use ogsnap_core::{ContentStore, Error, Key, ServeInstruction, Snapshot, derive_key, is_root};
use tracing::{debug, info};

/// Successful answer to a snapshot request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// 302 to this location.
    Redirect(String),
    /// 200 with a JPEG body.
    Image(Bytes),
}

pub struct Orchestrator {
    origin: Origin,
    store: Arc<dyn ContentStore>,
    capturer: Arc<dyn SnapshotCapturer>,
    auth_token: Option<String>,
    flights: crate::flight::SingleFlight<Key, Result<Snapshot, Error>>,
}

impl Orchestrator {
    pub fn new(
        origin: Origin, store: Arc<dyn ContentStore>, capturer: Arc<dyn SnapshotCapturer>, auth_token: Option<String>,
    ) -> Self {
        Self { origin, store, capturer, auth_token, flights: Default::default() }
    }

    pub fn supports_delete(&self) -> bool {
        self.store.supports_delete()
    }

    /// Answer `GET path`. `path` includes the query string, if any.
    pub async fn get(&self, path: &str) -> Result<Reply, Error> {
        if is_root(path) {
            return Ok(Reply::Redirect(self.origin.homepage().to_string()));
        }

        let key = derive_key(path);
        if !key.is_storable() {
            return Err(Error::InvalidKey(key.to_string()));
        }

        if self.store.exists(&key).await? {
            match self.store.read_or_serve(&key).await {
                Ok(ServeInstruction::Bytes(bytes)) => {
                    debug!(key = %key, store = self.store.name(), "cache hit");
                    return Ok(Reply::Image(bytes));
                }
                Ok(ServeInstruction::RedirectTo(location)) => {
                    debug!(key = %key, store = self.store.name(), "cache hit, redirecting");
                    return Ok(Reply::Redirect(location));
                }
                Err(Error::CacheMiss(_)) => debug!(key = %key, "entry vanished before read"),
                Err(e) => return Err(e),
            }
        }

        let snapshot = self.fill(key, path).await?;
        Ok(Reply::Image(snapshot.bytes))
    }

    /// Capture `path` and store it under `key`, coalescing concurrent misses.
    async fn fill(&self, key: Key, path: &str) -> Result<Snapshot, Error> {
        let url = self.origin.page_url(path)?;
        let store = Arc::clone(&self.store);
        let capturer = Arc::clone(&self.capturer);
        let flight_key = key.clone();

        self.flights
            .run(key, move || async move {
                debug!(key = %flight_key, %url, "cache miss, capturing");
                let snapshot = capturer.capture(&url).await?;
                store.write(&flight_key, &snapshot).await?;
                info!(key = %flight_key, bytes = snapshot.len(), store = store.name(), "stored snapshot");
                Ok(snapshot)
            })
            .await
            .unwrap_or_else(|| Err(Error::CaptureFailed("capture task aborted".into())))
    }

    /// Answer `DELETE path` authorized by `token`.
    ///
    /// The root always succeeds. Deleting an absent entry succeeds.
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<(), Error> {
        if is_root(path) {
            return Ok(());
        }

        if !self.token_matches(token) {
            return Err(Error::AuthMismatch);
        }

        let key = derive_key(path);
        if !key.is_storable() {
            return Ok(());
        }

        if self.store.exists(&key).await? {
            self.store.delete(&key).await?;
            info!(key = %key, store = self.store.name(), "deleted snapshot");
        }

        Ok(())
    }

    /// An empty secret or an empty header counts as absent.
    fn token_matches(&self, token: Option<&str>) -> bool {
        let secret = self.auth_token.as_deref().filter(|s| !s.is_empty());
        let given = token.filter(|t| !t.is_empty());
        matches!((secret, given), (Some(secret), Some(given)) if secret == given)
    }
}
