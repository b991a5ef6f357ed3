//! Wire-level message types.
//!
//! Non-generic leaves are prost messages written in the generated style
//! (transport wiring and protobuf codegen are out of scope, so the field
//! tags live here instead of in a `.proto` file). Request and response
//! wrappers that are generic over the document type are plain structs with
//! the same field layout.

mod revision_ext;
mod status_ext;

pub use revision_ext::*;
pub use status_ext::*;


use std::collections::HashMap;

use crate::schema::{ConfigMessage, ContextKeyed, FieldMask};

/// Opaque, monotonically increasing identifier of a committed state.
/// Zero or absent means "unset". Assigned by the store, never by writers.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Revision {
    #[prost(int64, optional, tag = "1")]
    pub revision: Option<i64>,
    #[prost(message, optional, tag = "2")]
    pub timestamp: Option<::prost_types::Timestamp>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Target {
    Unspecified = 0,
    Active = 1,
    Default = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Action {
    Unspecified = 0,
    Set = 1,
    Reset = 2,
}

/// One schema validation failure.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Violation {
    #[prost(string, tag = "1")]
    pub field: String,
    #[prost(string, tag = "2")]
    pub constraint: String,
    #[prost(string, tag = "3")]
    pub message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Violations {
    #[prost(message, repeated, tag = "1")]
    pub violations: Vec<Violation>,
}

impl Violations {
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Machine-readable error detail attached to a status.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ErrorInfo {
    #[prost(string, tag = "1")]
    pub reason: String,
    #[prost(map = "string, string", tag = "2")]
    pub metadata: HashMap<String, String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Code {
    Ok = 0,
    InvalidArgument = 3,
    NotFound = 5,
    FailedPrecondition = 9,
    Aborted = 10,
    Internal = 13,
}

/// Dense structured error: code, message and typed details.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcStatus {
    #[prost(enumeration = "Code", tag = "1")]
    pub code_raw: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(message, repeated, tag = "3")]
    pub details: Vec<ErrorInfo>,
}

// ---------------------------------------------------------------------------
// Request / response wrappers

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GetRequest {
    pub revision: Option<Revision>,
    pub key: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SetRequest<T> {
    pub spec: Option<T>,
    pub key: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResetRequest<T> {
    pub revision: Option<Revision>,
    pub mask: Option<FieldMask>,
    pub patch: Option<T>,
    pub key: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistoryRequest {
    pub target: Target,
    pub revision: Option<Revision>,
    pub include_values: bool,
    pub key: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistoryResponse<T> {
    pub entries: Vec<T>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DryRunResponse<T> {
    pub current: Option<T>,
    pub modified: Option<T>,
    pub validation_errors: Option<Violations>,
}

impl ContextKeyed for GetRequest {
    fn context_key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl<T: ConfigMessage> ContextKeyed for SetRequest<T> {
    fn context_key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl<T: ConfigMessage> ContextKeyed for ResetRequest<T> {
    fn context_key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl ContextKeyed for HistoryRequest {
    fn context_key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}
