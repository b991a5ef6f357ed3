//! Runtime settings for the in-memory backend.
//!
//! Settings come from the environment (`CONFTRACK_*`) or are built in
//! code; either way [`StoreSettings::validate`] runs before a store is
//! constructed with them.

use config::ConfigError;
use serde::{Deserialize, Serialize};

use crate::constants::WATCH_BUFFER_SIZE;
use crate::errors::{Error, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Capacity of each watcher's consumer channel.
    ///
    /// The store contract guarantees at least [`WATCH_BUFFER_SIZE`]
    /// buffered events per watcher; larger values trade memory for
    /// tolerance of slow consumers.
    #[serde(default = "default_watch_buffer_capacity")]
    pub watch_buffer_capacity: usize,

    /// Maximum number of revision-log entries retained per key.
    ///
    /// `None` (the default) retains everything. Truncation shortens the
    /// history visible to `history` and to watch replays.
    #[serde(default)]
    pub history_retention: Option<usize>,
}

fn default_watch_buffer_capacity() -> usize {
    WATCH_BUFFER_SIZE
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            watch_buffer_capacity: default_watch_buffer_capacity(),
            history_retention: None,
        }
    }
}

impl StoreSettings {
    /// Loads settings from `CONFTRACK_`-prefixed environment variables,
    /// falling back to defaults for anything unset.
    pub fn load() -> Result<Self> {
        let settings: StoreSettings = ::config::Config::builder()
            .add_source(
                ::config::Environment::with_prefix("CONFTRACK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.watch_buffer_capacity < WATCH_BUFFER_SIZE {
            return Err(Error::Config(ConfigError::Message(format!(
                "watch_buffer_capacity must be at least {WATCH_BUFFER_SIZE}, got {}",
                self.watch_buffer_capacity
            ))));
        }
        if let Some(retention) = self.history_retention {
            // One entry would make every commit its own creation, which
            // destroys the history lower-bound semantics.
            if retention < 2 {
                return Err(Error::Config(ConfigError::Message(format!(
                    "history_retention must be at least 2, got {retention}"
                ))));
            }
        }
        Ok(())
    }
}
