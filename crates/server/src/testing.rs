//! In-memory collaborators for orchestrator and router tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ogsnap_client::{Origin, SnapshotCapturer};
use ogsnap_core::{ContentStore, Error, Key, Presence, ServeInstruction, Snapshot};
use tokio::sync::Mutex;
use url::Url;

use crate::orchestrator::Orchestrator;

pub const TOKEN: &str = "s3cret";

/// Capturer answering with the requested URL as image bytes.
pub struct FakeCapturer {
    pub calls: AtomicUsize,
    pub status: AtomicU16,
    pub delay: Duration,
}

impl FakeCapturer {
    pub fn new() -> Self {
        Self { calls: AtomicUsize::new(0), status: AtomicU16::new(200), delay: Duration::ZERO }
    }

    pub fn slow(delay: Duration) -> Self {
        Self { delay, ..Self::new() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotCapturer for FakeCapturer {
    async fn capture(&self, url: &Url) -> Result<Snapshot, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match self.status.load(Ordering::SeqCst) {
            200 => Ok(Snapshot::new(url.to_string().into_bytes())),
            status => Err(Error::NonOkResponse(status)),
        }
    }
}

/// Store keeping entries in a map.
///
/// With `redirect_base` set it answers hits like the durable backend.
/// With `failing_writes` set every write is counted and then rejected.
#[derive(Default)]
pub struct MemoryStore {
    pub entries: Mutex<HashMap<Key, Snapshot>>,
    pub writes: AtomicUsize,
    pub redirect_base: Option<String>,
    pub unavailable: bool,
    pub failing_writes: bool,
}

impl MemoryStore {
    pub fn durable() -> Self {
        Self { redirect_base: Some("https://cdn.test/snaps".into()), ..Default::default() }
    }

    pub fn broken() -> Self {
        Self { unavailable: true, ..Default::default() }
    }

    pub fn failing() -> Self {
        Self { failing_writes: true, ..Default::default() }
    }

    pub async fn insert(&self, path: &str, bytes: &'static [u8]) {
        let key = ogsnap_core::derive_key(path);
        self.entries.lock().await.insert(key, Snapshot::new(bytes));
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.entries.lock().await.contains_key(&ogsnap_core::derive_key(path))
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn lookup(&self, key: &Key) -> Presence {
        if self.unavailable {
            return Presence::Unavailable("connection refused".into());
        }
        if self.entries.lock().await.contains_key(key) { Presence::Found } else { Presence::NotFound }
    }

    async fn write(&self, key: &Key, snapshot: &Snapshot) -> Result<(), Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.failing_writes {
            return Err(Error::StoreUnavailable("disk full".into()));
        }
        self.entries.lock().await.insert(key.clone(), snapshot.clone());
        Ok(())
    }

    async fn read_or_serve(&self, key: &Key) -> Result<ServeInstruction, Error> {
        if let Some(base) = &self.redirect_base {
            return Ok(ServeInstruction::RedirectTo(format!("{base}/{key}")));
        }
        match self.entries.lock().await.get(key) {
            Some(snapshot) => Ok(ServeInstruction::Bytes(snapshot.bytes.clone())),
            None => Err(Error::CacheMiss(key.to_string())),
        }
    }

    async fn delete(&self, key: &Key) -> Result<(), Error> {
        if self.redirect_base.is_none() {
            return Err(Error::DeleteUnsupported);
        }
        self.entries.lock().await.remove(key);
        Ok(())
    }

    fn supports_delete(&self) -> bool {
        self.redirect_base.is_some()
    }
}

pub fn orchestrator(store: Arc<MemoryStore>, capturer: Arc<FakeCapturer>) -> Orchestrator {
    let origin = Origin::parse("https://changelog.com").expect("valid origin");
    Orchestrator::new(origin, store, capturer, Some(TOKEN.to_string()))
}
