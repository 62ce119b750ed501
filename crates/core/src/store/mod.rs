//! Content store contract shared by the durable and ephemeral backends.
//!
//! A store binds a [`Key`] to the raw bytes of one snapshot. There is no
//! index or sidecar: an entry exists when the backend holds an object or file
//! under its key.

mod ephemeral;

pub use ephemeral::EphemeralStore;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{Error, Key};

/// A captured viewport image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub bytes: Bytes,
}

impl Snapshot {
    /// Content type of every stored and served snapshot.
    pub const CONTENT_TYPE: &'static str = "image/jpeg";

    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self { bytes: bytes.into() }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Outcome of an existence check.
///
/// Backends classify their own failures here instead of leaking
/// transport errors that callers would have to sniff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Found,
    NotFound,
    Unavailable(String),
}

/// How a cache hit should be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServeInstruction {
    /// Serve these bytes inline.
    Bytes(Bytes),
    /// Answer with a 302 pointing at the stored object.
    RedirectTo(String),
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Classify whether `key` currently has an entry.
    async fn lookup(&self, key: &Key) -> Presence;

    /// `true` if `key` has an entry. Missing entries are never an error.
    async fn exists(&self, key: &Key) -> Result<bool, Error> {
        match self.lookup(key).await {
            Presence::Found => Ok(true),
            Presence::NotFound => Ok(false),
            Presence::Unavailable(reason) => Err(Error::StoreUnavailable(reason)),
        }
    }

    /// Store `snapshot` under `key`, replacing any previous entry.
    async fn write(&self, key: &Key, snapshot: &Snapshot) -> Result<(), Error>;

    /// Answer a hit for `key`.
    ///
    /// Returns `Error::CacheMiss` if the entry vanished after `exists`.
    async fn read_or_serve(&self, key: &Key) -> Result<ServeInstruction, Error>;

    /// Remove the entry for `key`; absent keys are not an error.
    async fn delete(&self, key: &Key) -> Result<(), Error> {
        let _ = key;
        Err(Error::DeleteUnsupported)
    }

    /// Whether [`ContentStore::delete`] is available on this backend.
    fn supports_delete(&self) -> bool {
        false
    }
}
