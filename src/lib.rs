//! # conftrack
//!
//! A typed, revisioned configuration tracking engine.
//!
//! Clients store two parallel documents per resource, a *default* and an
//! *active*, read them back with inherited defaults, mutate them through
//! merge/reset/patch operations, subscribe to fine-grained field-level
//! updates, preview changes without committing, and roll back to prior
//! revisions. Secrets are redacted on read and re-bound on write; every
//! mutation is versioned and validated with optimistic concurrency.
//!
//! ## Features
//! - **Revisioned stores**: in-memory value and key-value logs with
//!   revision-gated CAS, watch fan-out and historical queries
//! - **Defaults layering**: active documents merge over a shared default
//! - **Secret hygiene**: masked fields are redacted on every read and
//!   restored from stored values on write
//! - **Reactive watches**: per-field nodes with multi-path bind callbacks
//! - **Dry-run and rollback**: preview and revert without surprises
//!
//! ## Quick Start
//! ```no_run
//! use std::sync::Arc;
//!
//! use conftrack::storage::mem::MemoryValueStore;
//! use conftrack::tracker::{merge_defaults_loader, DefaultingConfigTracker, RequestScope};
//! # use conftrack::schema::ConfigMessage;
//! # async fn example<MyConfig: ConfigMessage>(defaults: MyConfig, incoming: MyConfig) -> conftrack::Result<()> {
//! let tracker = DefaultingConfigTracker::new(
//!     Arc::new(MemoryValueStore::<MyConfig>::new()),
//!     Arc::new(MemoryValueStore::<MyConfig>::new()),
//!     merge_defaults_loader(defaults),
//! );
//! let scope = RequestScope::unkeyed();
//! tracker.apply(&scope, incoming).await?;
//! let active = tracker.get(&scope, None).await?;
//! # let _ = active;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod proto;
pub mod reactive;
pub mod schema;
pub mod server;
pub mod storage;
pub mod tracker;

mod constants;
mod errors;

pub use constants::*;
pub use errors::*;

#[cfg(test)]
mod test_utils;
