//! In-memory keyed revision log.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::trace;

use crate::config::StoreSettings;
use crate::errors::{Result, StoreError};
use crate::storage::{
    DeleteOptions, GetOptions, HistoryOptions, KeyRevision, KeyValueStore, ListOptions,
    PutOptions, WatchEvent, WatchEventKind, WatchOptions, WatchStream,
};

/// In-memory [`KeyValueStore`]: a store-wide revision counter over per-key
/// append-only logs. Cloning shares the underlying state.
pub struct MemoryKeyValueStore<T> {
    inner: Arc<StoreInner<T>>,
}

impl<T> Clone for MemoryKeyValueStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct StoreInner<T> {
    state: RwLock<StoreState<T>>,
    settings: StoreSettings,
}

struct StoreState<T> {
    revision: i64,
    keys: BTreeMap<String, KeyLog<T>>,
    watchers: Vec<WatcherEntry<T>>,
    next_watcher: u64,
}

struct KeyLog<T> {
    entries: Vec<LogEntry<T>>,
}

#[derive(Clone)]
struct LogEntry<T> {
    revision: i64,
    /// `None` marks a tombstone left by a delete.
    value: Option<T>,
    timestamp: SystemTime,
}

struct WatcherEntry<T> {
    id: u64,
    scope: WatchScope,
    tx: mpsc::UnboundedSender<WatchEvent<T>>,
}

enum WatchScope {
    Exact(String),
    Prefix(String),
}

impl WatchScope {
    fn matches(&self, key: &str) -> bool {
        match self {
            WatchScope::Exact(k) => k == key,
            WatchScope::Prefix(p) => key.starts_with(p.as_str()),
        }
    }
}

impl<T> KeyLog<T> {
    /// The live head entry, unless the log ends in a tombstone.
    fn head(&self) -> Option<&LogEntry<T>> {
        self.entries.last().filter(|e| e.value.is_some())
    }

    /// Indices of entries since the most recent creation revision that is
    /// <= `bound`: trailing tombstones are skipped to find the latest
    /// lifetime, then its live run is walked back to the creation.
    fn lifetime_range(&self, bound: i64) -> std::ops::Range<usize> {
        let mut end = self.entries.len();
        while end > 0 && self.entries[end - 1].revision > bound {
            end -= 1;
        }
        let mut cursor = end;
        while cursor > 0 && self.entries[cursor - 1].value.is_none() {
            cursor -= 1;
        }
        let mut start = cursor;
        while start > 0 && self.entries[start - 1].value.is_some() {
            start -= 1;
        }
        start..end
    }
}

impl<T: Clone + Send + Sync + 'static> MemoryKeyValueStore<T> {
    pub fn new() -> Self {
        Self::with_settings(StoreSettings::default())
    }

    pub fn with_settings(settings: StoreSettings) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(StoreState {
                    revision: 0,
                    keys: BTreeMap::new(),
                    watchers: Vec::new(),
                    next_watcher: 0,
                }),
                settings,
            }),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for MemoryKeyValueStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> StoreState<T> {
    fn check_guard(&self, key: &str, if_revision: Option<i64>, for_delete: bool) -> Result<()> {
        let head = self.keys.get(key).and_then(|log| log.head());
        match (if_revision, head) {
            (_, None) if for_delete => Err(StoreError::NotFound.into()),
            (Some(expected), None) => {
                if expected == 0 {
                    Ok(())
                } else {
                    Err(StoreError::NotFound.into())
                }
            }
            (Some(expected), Some(entry)) => {
                if expected == entry.revision {
                    Ok(())
                } else {
                    Err(StoreError::Conflict {
                        expected,
                        current: entry.revision,
                    }
                    .into())
                }
            }
            (None, _) => Ok(()),
        }
    }

    fn previous_of(&self, key: &str) -> Option<KeyRevision<T>> {
        let entry = self.keys.get(key)?.head()?;
        Some(KeyRevision {
            key: key.to_owned(),
            value: entry.value.clone(),
            revision: entry.revision,
            timestamp: Some(entry.timestamp),
        })
    }

    /// Delivery never runs on the committing task: events are enqueued on
    /// each watcher's unbounded queue while the write lock is held, so the
    /// total order per key is preserved, and a dedicated task per watcher
    /// drains the queue into the bounded consumer channel.
    fn notify(&mut self, key: &str, event: &WatchEvent<T>) {
        self.watchers.retain(|w| {
            if !w.scope.matches(key) {
                return true;
            }
            w.tx.send(event.clone()).is_ok()
        });
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> KeyValueStore<T> for MemoryKeyValueStore<T> {
    async fn put(&self, key: &str, value: T, options: PutOptions) -> Result<i64> {
        let mut state = self.inner.state.write();
        state.check_guard(key, options.if_revision, false)?;

        let previous = state.previous_of(key);
        state.revision += 1;
        let revision = state.revision;
        let timestamp = SystemTime::now();

        let log = state.keys.entry(key.to_owned()).or_insert_with(|| KeyLog {
            entries: Vec::new(),
        });
        log.entries.push(LogEntry {
            revision,
            value: Some(value.clone()),
            timestamp,
        });
        if let Some(limit) = self.inner.settings.history_retention {
            if log.entries.len() > limit {
                let excess = log.entries.len() - limit;
                log.entries.drain(..excess);
            }
        }

        trace!(key, revision, "committed put");
        let event = WatchEvent {
            kind: WatchEventKind::Put,
            current: Some(KeyRevision {
                key: key.to_owned(),
                value: Some(value),
                revision,
                timestamp: Some(timestamp),
            }),
            previous,
        };
        state.notify(key, &event);
        Ok(revision)
    }

    async fn get(&self, key: &str, options: GetOptions) -> Result<(T, i64)> {
        let state = self.inner.state.read();
        let log = state.keys.get(key).ok_or(StoreError::NotFound)?;
        let entry = match options.revision {
            Some(revision) => log
                .entries
                .iter()
                .rev()
                .find(|e| e.revision <= revision),
            None => log.entries.last(),
        };
        match entry.and_then(|e| e.value.as_ref().map(|v| (v.clone(), e.revision))) {
            Some(found) => Ok(found),
            None => Err(StoreError::NotFound.into()),
        }
    }

    async fn delete(&self, key: &str, options: DeleteOptions) -> Result<()> {
        let mut state = self.inner.state.write();
        state.check_guard(key, options.if_revision, true)?;

        let previous = state.previous_of(key);
        state.revision += 1;
        let revision = state.revision;
        let timestamp = SystemTime::now();
        state
            .keys
            .get_mut(key)
            .expect("guard checked presence")
            .entries
            .push(LogEntry {
                revision,
                value: None,
                timestamp,
            });

        trace!(key, revision, "committed delete");
        let event = WatchEvent {
            kind: WatchEventKind::Delete,
            current: None,
            previous,
        };
        state.notify(key, &event);
        Ok(())
    }

    async fn watch(&self, key: &str, options: WatchOptions) -> Result<WatchStream<T>> {
        let capacity = self
            .inner
            .settings
            .watch_buffer_capacity
            .max(crate::constants::WATCH_BUFFER_SIZE);
        let (out_tx, out_rx) = mpsc::channel(capacity);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scope = if options.prefix {
            WatchScope::Prefix(key.to_owned())
        } else {
            WatchScope::Exact(key.to_owned())
        };

        let id;
        {
            // Replay and registration happen under one write lock so no
            // commit can slip between them.
            let mut state = self.inner.state.write();
            if let Some(from) = options.from_revision {
                let mut replay: Vec<(i64, WatchEvent<T>)> = Vec::new();
                for (k, log) in &state.keys {
                    if !scope.matches(k) || log.head().is_none() {
                        continue;
                    }
                    for entry in &log.entries[log.lifetime_range(i64::MAX)] {
                        if entry.revision < from {
                            continue;
                        }
                        replay.push((
                            entry.revision,
                            WatchEvent {
                                kind: WatchEventKind::Put,
                                current: Some(KeyRevision {
                                    key: k.clone(),
                                    value: entry.value.clone(),
                                    revision: entry.revision,
                                    timestamp: Some(entry.timestamp),
                                }),
                                previous: None,
                            },
                        ));
                    }
                }
                replay.sort_by_key(|(revision, _)| *revision);
                for (_, event) in replay {
                    let _ = tx.send(event);
                }
            }
            id = state.next_watcher;
            state.next_watcher += 1;
            state.watchers.push(WatcherEntry {
                id,
                scope,
                tx,
            });
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = out_tx.closed() => break,
                    event = rx.recv() => match event {
                        Some(event) => {
                            if out_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            inner.state.write().watchers.retain(|w| w.id != id);
        });

        Ok(out_rx)
    }

    async fn list_keys(&self, prefix: &str, options: ListOptions) -> Result<Vec<String>> {
        let state = self.inner.state.read();
        let mut keys: Vec<String> = state
            .keys
            .iter()
            .filter(|(k, log)| k.starts_with(prefix) && log.head().is_some())
            .map(|(k, _)| k.clone())
            .collect();
        if let Some(limit) = options.limit {
            keys.truncate(limit);
        }
        Ok(keys)
    }

    async fn history(&self, key: &str, options: HistoryOptions) -> Result<Vec<KeyRevision<T>>> {
        let state = self.inner.state.read();
        let log = state.keys.get(key).ok_or(StoreError::NotFound)?;
        let bound = options.up_to_revision.unwrap_or(i64::MAX);
        let entries = &log.entries[log.lifetime_range(bound)];
        Ok(entries
            .iter()
            .filter(|e| e.value.is_some())
            .map(|e| KeyRevision {
                key: key.to_owned(),
                value: options.include_values.then(|| {
                    e.value.clone().expect("tombstones filtered out")
                }),
                revision: e.revision,
                timestamp: Some(e.timestamp),
            })
            .collect())
    }
}
