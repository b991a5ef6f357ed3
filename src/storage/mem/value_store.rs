//! In-memory single-value revision log.

use async_trait::async_trait;

use crate::config::StoreSettings;
use crate::errors::{Result, StoreError};
use crate::storage::{
    DeleteOptions, GetOptions, HistoryOptions, KeyRevision, KeyValueStore, PutOptions,
    ValueStore, WatchOptions, WatchStream,
};

use super::MemoryKeyValueStore;

/// Internal key the single value lives under.
const VALUE_KEY: &str = "@value";

/// In-memory [`ValueStore`], sharing the keyed log machinery with a fixed
/// key. Cloning shares the underlying state.
pub struct MemoryValueStore<T> {
    kv: MemoryKeyValueStore<T>,
}

impl<T> Clone for MemoryValueStore<T> {
    fn clone(&self) -> Self {
        Self {
            kv: self.kv.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> MemoryValueStore<T> {
    pub fn new() -> Self {
        Self::with_settings(StoreSettings::default())
    }

    pub fn with_settings(settings: StoreSettings) -> Self {
        Self {
            kv: MemoryKeyValueStore::with_settings(settings),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for MemoryValueStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> ValueStore<T> for MemoryValueStore<T> {
    async fn put(&self, value: T, options: PutOptions) -> Result<i64> {
        self.kv.put(VALUE_KEY, value, options).await
    }

    async fn get(&self, options: GetOptions) -> Result<(T, i64)> {
        self.kv.get(VALUE_KEY, options).await
    }

    async fn delete(&self, options: DeleteOptions) -> Result<()> {
        self.kv.delete(VALUE_KEY, options).await
    }

    async fn watch(&self, options: WatchOptions) -> Result<WatchStream<T>> {
        if options.prefix {
            return Err(StoreError::InvalidPrefix(
                "prefix watch is not supported on a single-value store".to_owned(),
            )
            .into());
        }
        self.kv.watch(VALUE_KEY, options).await
    }

    async fn history(&self, options: HistoryOptions) -> Result<Vec<KeyRevision<T>>> {
        self.kv.history(VALUE_KEY, options).await
    }
}
