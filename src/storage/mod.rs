//! Revisioned value stores.
//!
//! Two shapes share one contract: [`ValueStore`] holds a single logical
//! key, [`KeyValueStore`] a namespace of keys. Both version every commit
//! with a store-assigned, monotonically increasing revision, support
//! revision-gated compare-and-swap writes, fan events out to any number of
//! watchers, and answer historical queries. The in-memory backend lives in
//! [`mem`]; durable backends must satisfy the same contract.

pub mod mem;

mod lock;
mod options;

pub use lock::*;
pub use options::*;

#[cfg(test)]
use mockall::automock;

use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::Result;

/// One revision of a key. The value is populated only when the reader
/// asked for values; the revision field *inside* the value is never
/// populated by the store.
#[derive(Clone, Debug)]
pub struct KeyRevision<T> {
    pub key: String,
    pub value: Option<T>,
    pub revision: i64,
    pub timestamp: Option<SystemTime>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchEventKind {
    /// A commit that created or modified a key. The watch API does not
    /// distinguish create from modify; clients that need the distinction
    /// cannot get it reliably across truncated histories.
    Put,
    /// A commit that removed a key. The previous revision is carried when
    /// the backend has it; a Put may follow if the key is recreated.
    Delete,
}

/// Emitted for every committed write, including synthetic replays when a
/// watch declared a starting revision.
#[derive(Clone, Debug)]
pub struct WatchEvent<T> {
    pub kind: WatchEventKind,
    pub current: Option<KeyRevision<T>>,
    pub previous: Option<KeyRevision<T>>,
}

/// Channel of store events, buffered to hold at least
/// [`WATCH_BUFFER_SIZE`](crate::constants::WATCH_BUFFER_SIZE) entries.
/// Dropping the receiver cancels the watch and promptly frees backend
/// resources.
pub type WatchStream<T> = mpsc::Receiver<WatchEvent<T>>;

/// A revisioned store of a single logical value.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ValueStore<T: Clone + Send + Sync + 'static>: Send + Sync {
    /// Commits `value` at a new revision and returns it. With
    /// `if_revision` set, the commit succeeds only when the current head
    /// matches (zero matching "not present"); mismatches are
    /// [`Conflict`](crate::errors::StoreError::Conflict), and a non-zero
    /// guard against an absent key is
    /// [`NotFound`](crate::errors::StoreError::NotFound).
    async fn put(&self, value: T, options: PutOptions) -> Result<i64>;

    /// The committed value at the given or latest revision, plus that
    /// revision.
    async fn get(&self, options: GetOptions) -> Result<(T, i64)>;

    /// Removes the current head, recording a tombstone revision. The
    /// revision sequence keeps increasing across deletes.
    async fn delete(&self, options: DeleteOptions) -> Result<()>;

    /// Starts a watch. Does not block; an error is returned only when the
    /// watch cannot be established. See [`WatchOptions`] for replay
    /// semantics. Every active watch receives a full copy of every event;
    /// no event at or after the declared starting revision is ever missed.
    async fn watch(&self, options: WatchOptions) -> Result<WatchStream<T>>;

    /// Chronological (oldest first) revisions, starting at the most recent
    /// creation revision <= the bound. NotFound when the value never
    /// existed.
    async fn history(&self, options: HistoryOptions) -> Result<Vec<KeyRevision<T>>>;
}

/// A revisioned store of a namespace of keys.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyValueStore<T: Clone + Send + Sync + 'static>: Send + Sync {
    async fn put(&self, key: &str, value: T, options: PutOptions) -> Result<i64>;

    async fn get(&self, key: &str, options: GetOptions) -> Result<(T, i64)>;

    async fn delete(&self, key: &str, options: DeleteOptions) -> Result<()>;

    /// Watches `key`, or every key under it when
    /// [`WatchOptions::prefix`] is set. Watches on overlapping scopes each
    /// receive a full copy of every matching event.
    async fn watch(&self, key: &str, options: WatchOptions) -> Result<WatchStream<T>>;

    /// Lexicographically sorted present keys under `prefix`.
    async fn list_keys(&self, prefix: &str, options: ListOptions) -> Result<Vec<String>>;

    async fn history(&self, key: &str, options: HistoryOptions) -> Result<Vec<KeyRevision<T>>>;
}

/// A [`ValueStore`] view over one key of a [`KeyValueStore`]. This is how
/// the tracker addresses a keyed active store once the context key is
/// known.
pub struct KeyedValueStore<T> {
    kv: std::sync::Arc<dyn KeyValueStore<T>>,
    key: String,
}

impl<T> KeyedValueStore<T> {
    pub fn new(kv: std::sync::Arc<dyn KeyValueStore<T>>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> ValueStore<T> for KeyedValueStore<T> {
    async fn put(&self, value: T, options: PutOptions) -> Result<i64> {
        self.kv.put(&self.key, value, options).await
    }

    async fn get(&self, options: GetOptions) -> Result<(T, i64)> {
        self.kv.get(&self.key, options).await
    }

    async fn delete(&self, options: DeleteOptions) -> Result<()> {
        self.kv.delete(&self.key, options).await
    }

    async fn watch(&self, options: WatchOptions) -> Result<WatchStream<T>> {
        self.kv.watch(&self.key, options).await
    }

    async fn history(&self, options: HistoryOptions) -> Result<Vec<KeyRevision<T>>> {
        self.kv.history(&self.key, options).await
    }
}
