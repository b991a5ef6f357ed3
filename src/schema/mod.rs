//! The message-reflection contract consumed by the tracker, the stores and
//! the reactive controller.
//!
//! Documents are typed messages whose generated accessors expose a small
//! reflection surface: presence tests, path projection, recursive
//! merge-with-replace, secret redaction and masked-field metadata. The
//! engine is generic over any type implementing [`ConfigMessage`]; nothing
//! here depends on a particular schema.

mod mask;
mod path;
mod value;

pub use mask::*;
pub use path::*;
pub use value::*;


use crate::errors::{DiscontinuityError, SchemaError};
use crate::proto::{Revision, Violations};

/// A structured configuration document.
///
/// Implementations are generated-accessor style: each method dispatches on
/// the static field layout of the concrete schema. Semantics required of
/// every implementation:
///
/// - `merge_with_replace`: scalar and leaf fields of `other` overwrite the
///   receiver, sub-messages recurse, list and map fields replace wholesale.
/// - `redact_secrets`: every *present* secret field is replaced in place by
///   the [`REDACTED`](crate::constants::REDACTED) placeholder. Redaction is
///   idempotent.
/// - `unredact_secrets`: every placeholder in the receiver is replaced by
///   the corresponding value of `base`; a placeholder with no value to
///   resolve it is a [`DiscontinuityError`]. Non-secret fields are never
///   touched.
pub trait ConfigMessage:
    Clone + Default + PartialEq + std::fmt::Debug + Send + Sync + 'static
{
    fn type_name() -> &'static str;

    /// Top-level secret fields, by name. The tracker clears these from
    /// every incoming spec, and the server facade pins them into reset
    /// masks.
    fn masked_fields() -> &'static [&'static str];

    /// Every addressable field path of the schema, parents before
    /// children. The server-owned revision field is not addressable.
    fn all_paths() -> Vec<FieldPath>;

    fn revision(&self) -> Option<&Revision>;
    fn set_revision(&mut self, revision: Option<Revision>);

    fn merge_with_replace(&mut self, other: &Self);
    fn redact_secrets(&mut self);
    fn unredact_secrets(&mut self, base: &Self) -> Result<(), DiscontinuityError>;

    /// Presence test. Unknown paths are simply not present.
    fn has_field(&self, path: &FieldPath) -> bool;

    /// Projects the document at `path`. `Ok(None)` means the field (or one
    /// of its ancestors) is unset; `Err` means the path is not part of the
    /// schema.
    fn field_value(&self, path: &FieldPath) -> Result<Option<Value>, SchemaError>;

    fn set_field(&mut self, path: &FieldPath, value: Value) -> Result<(), SchemaError>;

    fn clear_field(&mut self, path: &FieldPath) -> Result<(), SchemaError>;

    /// Schema validation hook evaluated by dry-run against the modified
    /// document. Violations are reported structurally, never raised.
    fn validate_spec(&self) -> Violations {
        Violations::default()
    }
}

/// A request whose schema marks one field as the context key, identifying
/// the namespace of the active store for keyed resources.
pub trait ContextKeyed {
    fn context_key(&self) -> Option<&str>;
}
