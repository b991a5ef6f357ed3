//! Shared fixtures for the test suite.

pub mod gen;
pub mod sample;

pub use gen::*;
pub use sample::*;

use std::sync::Arc;

use crate::storage::mem::MemoryKeyValueStore;
use crate::storage::KeyValueStore;

pub fn new_kv_store() -> Arc<dyn KeyValueStore<SampleConfig>> {
    Arc::new(MemoryKeyValueStore::new())
}
