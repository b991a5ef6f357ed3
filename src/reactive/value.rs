//! Per-path reactive values.

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::constants::REACTIVE_BUFFER_SIZE;
use crate::schema::{FieldPath, Value};

/// One field path's cached value plus its subscriber set. Obtained from
/// [`Controller::reactive`](super::Controller::reactive); identical paths
/// share the identical node.
pub struct ReactiveValue {
    path: FieldPath,
    state: Mutex<NodeState>,
}

#[derive(Default)]
struct NodeState {
    value: Option<Value>,
    /// Bumped every time the held value changes by structural equality.
    /// Zero until the first observed value.
    version: u64,
    watchers: Vec<mpsc::Sender<Option<Value>>>,
}

impl ReactiveValue {
    pub(super) fn new(path: FieldPath) -> Self {
        Self {
            path,
            state: Mutex::new(NodeState::default()),
        }
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// The last observed value; `None` when the field is unset or nothing
    /// has been observed yet.
    pub fn value(&self) -> Option<Value> {
        self.state.lock().value.clone()
    }

    pub fn version(&self) -> u64 {
        self.state.lock().version
    }

    /// Subscribes to the node. The current value is delivered immediately
    /// when the node holds one; every subsequent change (value or clear)
    /// follows in document-transition order. The channel closes when the
    /// controller shuts down.
    pub fn watch(&self) -> mpsc::Receiver<Option<Value>> {
        let (tx, rx) = mpsc::channel(REACTIVE_BUFFER_SIZE);
        let mut state = self.state.lock();
        if state.version > 0 && state.value.is_some() {
            let _ = tx.try_send(state.value.clone());
        }
        state.watchers.push(tx);
        rx
    }

    /// Initializes a freshly created node from the controller's cached
    /// document without notifying anyone (there are no subscribers yet).
    pub(super) fn seed(&self, value: Option<Value>) {
        let mut state = self.state.lock();
        if state.version == 0 && value.is_some() {
            state.value = value;
            state.version = 1;
        }
    }

    /// Applies a newly projected value. Returns whether the value actually
    /// changed; subscribers are notified only then.
    pub(super) async fn update(&self, next: Option<Value>) -> bool {
        let watchers: Vec<mpsc::Sender<Option<Value>>>;
        {
            let mut state = self.state.lock();
            if state.version == 0 && next.is_none() {
                return false;
            }
            if state.version > 0 && state.value == next {
                return false;
            }
            state.value = next.clone();
            state.version += 1;
            watchers = state.watchers.clone();
        }
        let mut any_closed = false;
        for watcher in &watchers {
            // A full channel suspends delivery for this subscriber only
            // until it catches up; the store-side watch is unaffected.
            if watcher.send(next.clone()).await.is_err() {
                any_closed = true;
            }
        }
        if any_closed {
            self.state.lock().watchers.retain(|w| !w.is_closed());
        }
        true
    }

    pub(super) fn close_watchers(&self) {
        self.state.lock().watchers.clear();
    }
}
