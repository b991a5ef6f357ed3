//! Reactive controller: a path-indexed registry of per-field values over
//! one document type, fed by the tracker's active store.
//!
//! Each store event is decomposed into field-level updates: every
//! materialized node re-projects the new document at its path, and only
//! nodes whose value actually changed notify their subscribers. Multi-path
//! [`bind`](Controller::bind) callbacks fire once per document revision,
//! after all affected nodes have been updated, with the latest value of
//! every bound path.

mod value;

pub use value::*;

#[cfg(test)]
mod controller_test;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::warn;

use crate::errors::{Error, Result};
use crate::schema::{ConfigMessage, FieldPath, Value};
use crate::storage::{GetOptions, ValueStore, WatchEvent, WatchEventKind, WatchOptions};
use crate::tracker::DefaultingConfigTracker;

pub struct Controller<T: ConfigMessage> {
    inner: Arc<ControllerInner<T>>,
}

impl<T: ConfigMessage> Clone for Controller<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct ControllerInner<T: ConfigMessage> {
    store: Arc<dyn ValueStore<T>>,
    nodes: DashMap<String, Arc<ReactiveValue>>,
    binds: Mutex<Vec<Arc<BindEntry>>>,
    next_bind: AtomicU64,
    current: ArcSwapOption<T>,
    last_revision: AtomicI64,
    started: AtomicBool,
}

struct BindEntry {
    id: u64,
    paths: Vec<String>,
    nodes: Vec<Arc<ReactiveValue>>,
    callback: Box<dyn Fn(&[Option<Value>]) + Send + Sync>,
}

/// Cancels its bind when dropped.
pub struct BindHandle<T: ConfigMessage> {
    id: u64,
    inner: Weak<ControllerInner<T>>,
}

impl<T: ConfigMessage> Drop for BindHandle<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.binds.lock().retain(|entry| entry.id != self.id);
        }
    }
}

impl<T: ConfigMessage> Controller<T> {
    /// Builds a controller over the tracker's active store. Keyed trackers
    /// have no single active stream, which is a precondition error here.
    pub fn new(tracker: &DefaultingConfigTracker<T>) -> Result<Self> {
        let store = tracker.active_value_store().ok_or_else(|| {
            Error::InvalidArgument(
                "reactive controller requires a single-value active store".to_owned(),
            )
        })?;
        Ok(Self {
            inner: Arc::new(ControllerInner {
                store,
                nodes: DashMap::new(),
                binds: Mutex::new(Vec::new()),
                next_bind: AtomicU64::new(0),
                current: ArcSwapOption::empty(),
                last_revision: AtomicI64::new(0),
                started: AtomicBool::new(false),
            }),
        })
    }

    /// Snapshots the current active document and starts consuming the
    /// store watch from its revision (or from the oldest live revision
    /// when none exists), so no commit is missed. The update task runs
    /// until the shutdown sender signals or is dropped, then every watcher
    /// channel closes.
    pub async fn start(&self, mut shutdown: watch::Receiver<()>) -> Result<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(Error::InvalidArgument("controller already started".to_owned()));
        }
        let from_revision = match self.inner.store.get(GetOptions::new()).await {
            Ok((_, revision)) => revision,
            Err(err) if err.is_not_found() => 0,
            Err(err) => return Err(err),
        };
        let mut events = self
            .inner
            .store
            .watch(WatchOptions::new().from_revision(from_revision))
            .await?;

        let inner = self.inner.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    event = events.recv() => match event {
                        Some(event) => inner.process(event).await,
                        None => break,
                    },
                }
            }
            inner.close();
        });
        Ok(())
    }

    /// The reactive value for `path`, created on demand. Identical paths
    /// return the identical node. Nodes created after a document has been
    /// observed start from the cached current document.
    pub fn reactive(&self, path: FieldPath) -> Arc<ReactiveValue> {
        let key = path.dotted();
        self.inner
            .nodes
            .entry(key)
            .or_insert_with(|| {
                let node = Arc::new(ReactiveValue::new(path.clone()));
                if let Some(document) = self.inner.current.load_full() {
                    match document.field_value(&path) {
                        Ok(value) => node.seed(value),
                        Err(err) => {
                            warn!(path = %path, error = %err, "reactive path is not part of the schema");
                        }
                    }
                }
                node
            })
            .clone()
    }

    /// Registers a multi-path binder. The callback fires once per coherent
    /// document update whose changed paths intersect the bound set,
    /// receiving the latest value of *every* bound path; it also fires
    /// immediately when a document has already been observed.
    pub fn bind<F>(&self, values: Vec<Arc<ReactiveValue>>, callback: F) -> BindHandle<T>
    where
        F: Fn(&[Option<Value>]) + Send + Sync + 'static,
    {
        let id = self.inner.next_bind.fetch_add(1, Ordering::SeqCst);
        let entry = Arc::new(BindEntry {
            id,
            paths: values.iter().map(|v| v.path().dotted()).collect(),
            nodes: values,
            callback: Box::new(callback),
        });
        if self.inner.last_revision.load(Ordering::SeqCst) > 0 {
            let current: Vec<Option<Value>> = entry.nodes.iter().map(|n| n.value()).collect();
            (entry.callback)(&current);
        }
        self.inner.binds.lock().push(entry);
        BindHandle {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl<T: ConfigMessage> ControllerInner<T> {
    async fn process(&self, event: WatchEvent<T>) {
        let (document, revision) = match event.kind {
            WatchEventKind::Put => match event.current {
                Some(current) => (current.value, current.revision),
                None => (None, 0),
            },
            WatchEventKind::Delete => (
                None,
                event.previous.as_ref().map(|p| p.revision).unwrap_or(0),
            ),
        };
        self.current.store(document.clone().map(Arc::new));
        self.last_revision.store(revision.max(1), Ordering::SeqCst);

        let nodes: Vec<(String, Arc<ReactiveValue>)> = self
            .nodes
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let mut changed: HashSet<String> = HashSet::new();
        for (path, node) in nodes {
            let projected = match &document {
                Some(doc) => match doc.field_value(node.path()) {
                    Ok(value) => value,
                    Err(err) => {
                        // One malformed path must not halt the update loop
                        // for the others.
                        warn!(%path, error = %err, "skipping reactive projection");
                        continue;
                    }
                },
                None => None,
            };
            if node.update(projected).await {
                changed.insert(path);
            }
        }
        if changed.is_empty() {
            return;
        }

        let binds: Vec<Arc<BindEntry>> = self.binds.lock().clone();
        for bind in binds {
            if bind.paths.iter().any(|path| changed.contains(path)) {
                let values: Vec<Option<Value>> =
                    bind.nodes.iter().map(|node| node.value()).collect();
                (bind.callback)(&values);
            }
        }
    }

    fn close(&self) {
        for entry in self.nodes.iter() {
            entry.value().close_watchers();
        }
        self.binds.lock().clear();
    }
}
