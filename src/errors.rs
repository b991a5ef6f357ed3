//! Error hierarchy for the configuration tracking engine,
//! categorized by subsystem and operational concern.

use crate::schema::FieldPath;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Store-level failures (missing keys, revision conflicts)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Schema reflection failures (unknown paths, malformed masks)
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A redacted secret could not be resolved from its reference document
    #[error(transparent)]
    Discontinuity(#[from] DiscontinuityError),

    /// Malformed or inconsistent request input
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Settings validation failures
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    /// Unrecoverable backend failures; no partial state is observable
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Target key or revision absent
    #[error("not found")]
    NotFound,

    /// CAS guard did not match the current head revision
    #[error("revision conflict: expected {expected}, current head is {current}")]
    Conflict { expected: i64, current: i64 },

    /// Watch requested with an unsupported prefix
    #[error("invalid watch prefix: {0}")]
    InvalidPrefix(String),

    /// Backend-specific failure
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaError {
    /// Path does not name a field of the schema
    #[error("unknown field path: {0}")]
    UnknownPath(String),

    /// Value kind does not match the field at the path
    #[error("type mismatch at {path}: expected {expected}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
    },

    /// Field mask names a path outside the schema
    #[error("invalid field mask path: {0}")]
    InvalidMask(String),

    /// Path string contains an empty segment
    #[error("invalid field path {0:?}: empty segment")]
    EmptySegment(String),
}

/// A write needed a secret out of an older revision, but the secret has
/// since been cleared and its redacted placeholder cannot be resolved.
///
/// Carries every affected field path so callers (notably the rollback
/// orchestrator) can prompt for fresh values and retry.
#[derive(Debug, Clone, thiserror::Error)]
#[error("redacted secrets cannot be resolved from the reference document: {}", join_paths(.fields))]
pub struct DiscontinuityError {
    pub fields: Vec<FieldPath>,
}

fn join_paths(fields: &[FieldPath]) -> String {
    fields.iter().map(|p| p.dotted()).collect::<Vec<_>>().join(", ")
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Store(StoreError::NotFound))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Store(StoreError::Conflict { .. }))
    }

    pub fn is_discontinuity(&self) -> bool {
        matches!(self, Error::Discontinuity(_))
    }
}
