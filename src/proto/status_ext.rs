//! Mapping between the internal error hierarchy and the wire status shape.

use crate::errors::{DiscontinuityError, Error, SchemaError, StoreError};
use crate::schema::FieldPath;

use super::{Code, ErrorInfo, RpcStatus};

/// Reason attached to discontinuity details; each detail carries the
/// affected field path under the `field` metadata key.
pub const DISCONTINUITY_REASON: &str = "DISCONTINUITY";

const FIELD_METADATA_KEY: &str = "field";

impl RpcStatus {
    pub fn code(&self) -> Code {
        Code::try_from(self.code_raw).unwrap_or(Code::Internal)
    }

    /// The field paths of every discontinuity detail, sorted.
    pub fn discontinuity_fields(&self) -> Vec<FieldPath> {
        let mut fields: Vec<FieldPath> = self
            .details
            .iter()
            .filter(|d| d.reason == DISCONTINUITY_REASON)
            .filter_map(|d| d.metadata.get(FIELD_METADATA_KEY))
            .filter_map(|p| FieldPath::parse(p).ok())
            .collect();
        fields.sort();
        fields
    }
}

impl From<&Error> for RpcStatus {
    fn from(err: &Error) -> Self {
        let code = match err {
            Error::Store(StoreError::NotFound) => Code::NotFound,
            Error::Store(StoreError::Conflict { .. }) => Code::Aborted,
            Error::Store(_) => Code::Internal,
            Error::Schema(_) | Error::InvalidArgument(_) => Code::InvalidArgument,
            Error::Discontinuity(_) => Code::FailedPrecondition,
            Error::Config(_) => Code::InvalidArgument,
            Error::Internal(_) => Code::Internal,
        };
        let details = match err {
            Error::Discontinuity(d) => d
                .fields
                .iter()
                .map(|field| ErrorInfo {
                    reason: DISCONTINUITY_REASON.to_owned(),
                    metadata: [(FIELD_METADATA_KEY.to_owned(), field.dotted())]
                        .into_iter()
                        .collect(),
                })
                .collect(),
            _ => Vec::new(),
        };
        RpcStatus {
            code_raw: code as i32,
            message: err.to_string(),
            details,
        }
    }
}

impl From<RpcStatus> for Error {
    fn from(status: RpcStatus) -> Self {
        let fields = status.discontinuity_fields();
        if !fields.is_empty() {
            return Error::Discontinuity(DiscontinuityError { fields });
        }
        match status.code() {
            Code::NotFound => StoreError::NotFound.into(),
            Code::Aborted => StoreError::Conflict {
                expected: 0,
                current: 0,
            }
            .into(),
            Code::InvalidArgument => Error::InvalidArgument(status.message),
            Code::FailedPrecondition => {
                Error::Discontinuity(DiscontinuityError { fields: Vec::new() })
            }
            _ => Error::Internal(status.message),
        }
    }
}

impl Error {
    pub fn to_status(&self) -> RpcStatus {
        RpcStatus::from(self)
    }
}

// Schema errors surface over the wire as InvalidArgument.
impl SchemaError {
    pub fn to_status(&self) -> RpcStatus {
        Error::Schema(self.clone()).to_status()
    }
}
