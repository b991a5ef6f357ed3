//! Per-operation store options.
//!
//! Builder-style setters stand in for functional options; revisions that
//! the original surfaced through out-parameters are returned by the
//! operations instead.

#[derive(Clone, Copy, Debug, Default)]
pub struct GetOptions {
    /// Read the value at this revision instead of the latest.
    pub revision: Option<i64>,
}

impl GetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_revision(mut self, revision: i64) -> Self {
        self.revision = Some(revision);
        self
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PutOptions {
    /// Commit only if the current head revision matches. Zero matches
    /// "not present".
    pub if_revision: Option<i64>,
}

impl PutOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn if_revision(mut self, revision: i64) -> Self {
        self.if_revision = Some(revision);
        self
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeleteOptions {
    /// Delete only if the current head revision matches.
    pub if_revision: Option<i64>,
}

impl DeleteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn if_revision(mut self, revision: i64) -> Self {
        self.if_revision = Some(revision);
        self
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct WatchOptions {
    /// Starting revision. When unset, only future events are delivered.
    /// When set, every live revision >= the value is replayed as a
    /// synthetic Put before live events; zero means "the oldest live
    /// revision".
    pub from_revision: Option<i64>,

    /// Watch every key under the given prefix instead of the exact key.
    pub prefix: bool,
}

impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_revision(mut self, revision: i64) -> Self {
        self.from_revision = Some(revision);
        self
    }

    pub fn with_prefix(mut self) -> Self {
        self.prefix = true;
        self
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ListOptions {
    /// Maximum number of keys to return.
    pub limit: Option<usize>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct HistoryOptions {
    /// Latest modification revision to include. The returned history
    /// starts at the most recent creation revision that is <= the bound.
    pub up_to_revision: Option<i64>,

    /// Include the stored values, not just revision metadata.
    pub include_values: bool,
}

impl HistoryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn up_to_revision(mut self, revision: i64) -> Self {
        self.up_to_revision = Some(revision);
        self
    }

    pub fn include_values(mut self, include: bool) -> Self {
        self.include_values = include;
        self
    }
}
