//! Local on-disk store with time-based expiry.
//!
//! Entries live as one file per key in a directory that is wiped when the
//! store is opened. Write instants are tracked in memory; a lookup past the
//! TTL reports the entry absent and removes the file, and a background reaper
//! sweeps whatever nobody asked for again.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{ContentStore, Presence, ServeInstruction, Snapshot};
use crate::{Error, Key};

/// Prefix of in-progress writes inside the cache directory.
const PARTIAL_PREFIX: &str = ".partial-";

pub struct EphemeralStore {
    dir: PathBuf,
    ttl: Duration,
    written: Mutex<HashMap<Key, Instant>>,
}

impl EphemeralStore {
    /// Open the store at `dir`, discarding anything a previous process left.
    pub async fn open(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self, Error> {
        let dir = dir.into();

        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(dir = %dir.display(), "cleared previous cache directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&dir).await?;

        info!(dir = %dir.display(), ttl_ms = ttl.as_millis() as u64, "ephemeral store initialized");

        Ok(Self { dir, ttl, written: Mutex::new(HashMap::new()) })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn path_for(&self, key: &Key) -> Result<PathBuf, Error> {
        if !key.is_storable() {
            return Err(Error::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key.as_str()))
    }

    /// Whether `key` was written within the TTL. Expired entries are evicted.
    async fn is_live(&self, key: &Key) -> bool {
        {
            let mut written = self.written.lock().await;
            match written.get(key) {
                Some(at) if at.elapsed() < self.ttl => return true,
                Some(_) => {
                    written.remove(key);
                }
                None => return false,
            }
        }

        self.evict(key).await;
        false
    }

    async fn evict(&self, key: &Key) {
        let Ok(path) = self.path_for(key) else { return };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(key = %key, "evicted expired snapshot"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(key = %key, error = %e, "failed to evict snapshot"),
        }
    }

    /// Remove every entry older than the TTL.
    ///
    /// Returns the number of entries dropped from the index.
    pub async fn purge_expired(&self) -> usize {
        let expired: Vec<Key> = {
            let mut written = self.written.lock().await;
            let ttl = self.ttl;
            let mut expired = Vec::new();
            written.retain(|key, at| {
                let live = at.elapsed() < ttl;
                if !live {
                    expired.push(key.clone());
                }
                live
            });
            expired
        };

        for key in &expired {
            self.evict(key).await;
        }

        expired.len()
    }

    /// Spawn a task that calls [`EphemeralStore::purge_expired`] every `every`.
    pub fn spawn_reaper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let purged = self.purge_expired().await;
                if purged > 0 {
                    debug!(purged, "reaped expired snapshots");
                }
            }
        })
    }
}

#[async_trait]
impl ContentStore for EphemeralStore {
    fn name(&self) -> &'static str {
        "ephemeral"
    }

    async fn lookup(&self, key: &Key) -> Presence {
        let Ok(path) = self.path_for(key) else { return Presence::NotFound };
        if !self.is_live(key).await {
            return Presence::NotFound;
        }

        // Any failure to see the file counts as absent.
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Presence::Found,
            _ => Presence::NotFound,
        }
    }

    async fn write(&self, key: &Key, snapshot: &Snapshot) -> Result<(), Error> {
        let path = self.path_for(key)?;
        let dir = self.dir.clone();
        let bytes = snapshot.bytes.clone();

        tokio::task::spawn_blocking(move || -> Result<(), Error> {
            let mut tmp = tempfile::Builder::new().prefix(PARTIAL_PREFIX).tempfile_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.persist(&path).map_err(|e| Error::from(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::StoreUnavailable(format!("write task failed: {e}")))??;

        self.written.lock().await.insert(key.clone(), Instant::now());

        debug!(key = %key, size = snapshot.len(), "stored snapshot on disk");
        Ok(())
    }

    async fn read_or_serve(&self, key: &Key) -> Result<ServeInstruction, Error> {
        let path = self.path_for(key)?;
        if !self.is_live(key).await {
            return Err(Error::CacheMiss(key.to_string()));
        }

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(ServeInstruction::Bytes(bytes.into())),
            Err(e) => {
                debug!(key = %key, error = %e, "snapshot unreadable, treating as miss");
                Err(Error::CacheMiss(key.to_string()))
            }
        }
    }
}
