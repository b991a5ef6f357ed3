//! Distributed lock abstraction.
//!
//! Implementations coordinate access to a resource across processes and
//! must satisfy:
//!
//! - Liveliness: a lock is always eventually released when its holder
//!   crashes or its backend becomes unavailable.
//! - Atomicity: no two holders at once, and releasing always eventually
//!   succeeds.
//!
//! The in-memory [`LocalLock`] is a process-local mutex whose lease never
//! expires; durable backends carry the full guarantees.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};

use crate::errors::Result;

/// A held lock. Dropping the lease releases the lock.
pub struct LockLease {
    expired: watch::Receiver<bool>,
    _expired_tx: Option<watch::Sender<bool>>,
    _guard: Option<OwnedMutexGuard<()>>,
}

impl LockLease {
    /// A channel that flips to `true` when the backend expires the lease
    /// out from under the holder.
    pub fn expired(&self) -> watch::Receiver<bool> {
        self.expired.clone()
    }
}

#[async_trait]
pub trait SharedLock: Send + Sync {
    /// Blocks until the lock is acquired.
    async fn acquire(&self) -> Result<LockLease>;

    /// Makes one attempt to acquire the lock; `None` when it is known to
    /// be held elsewhere.
    async fn try_acquire(&self) -> Result<Option<LockLease>>;
}

/// Process-local lock backing the in-memory store.
#[derive(Clone, Default)]
pub struct LocalLock {
    inner: Arc<Mutex<()>>,
}

impl LocalLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn lease(guard: OwnedMutexGuard<()>) -> LockLease {
        // Local leases never expire; the sender lives and dies with the
        // lease itself.
        let (tx, rx) = watch::channel(false);
        LockLease {
            expired: rx,
            _expired_tx: Some(tx),
            _guard: Some(guard),
        }
    }
}

#[async_trait]
impl SharedLock for LocalLock {
    async fn acquire(&self) -> Result<LockLease> {
        let guard = self.inner.clone().lock_owned().await;
        Ok(Self::lease(guard))
    }

    async fn try_acquire(&self) -> Result<Option<LockLease>> {
        match self.inner.clone().try_lock_owned() {
            Ok(guard) => Ok(Some(Self::lease(guard))),
            Err(_) => Ok(None),
        }
    }
}
