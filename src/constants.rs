//! Shared constants.

/// Minimum capacity of the channel handed to a store watcher. Watch
/// consumers that fall further behind than this block their own delivery
/// only; writers are never stalled.
pub const WATCH_BUFFER_SIZE: usize = 64;

/// Capacity of the channel handed to a reactive value subscriber.
pub const REACTIVE_BUFFER_SIZE: usize = 64;

/// Placeholder written over secret fields when a document is redacted.
/// A client that sends the placeholder back is asking the tracker to keep
/// the stored secret value.
pub const REDACTED: &str = "***";
