//! Revision helpers shared by the tracker and the server facade.

use std::time::SystemTime;

use crate::schema::ConfigMessage;

use super::Revision;

impl Revision {
    pub fn new(revision: i64) -> Self {
        Self {
            revision: Some(revision),
            timestamp: None,
        }
    }

    pub fn with_timestamp(revision: i64, timestamp: SystemTime) -> Self {
        Self {
            revision: Some(revision),
            timestamp: Some(::prost_types::Timestamp::from(timestamp)),
        }
    }

    /// The revision number, with zero standing in for "unset".
    pub fn get(&self) -> i64 {
        self.revision.unwrap_or(0)
    }
}

/// The revision number carried by `msg`, if any.
pub fn revision_of<T: ConfigMessage>(msg: &T) -> Option<i64> {
    msg.revision().and_then(|r| r.revision)
}

/// Stamps `revision` onto `msg`, clearing any timestamp.
pub fn set_revision<T: ConfigMessage>(msg: &mut T, revision: i64) {
    msg.set_revision(Some(Revision::new(revision)));
}

/// Stamps `revision` plus an optional commit timestamp onto `msg`.
pub fn set_revision_with_timestamp<T: ConfigMessage>(
    msg: &mut T,
    revision: i64,
    timestamp: Option<SystemTime>,
) {
    let rev = match timestamp {
        Some(ts) => Revision::with_timestamp(revision, ts),
        None => Revision::new(revision),
    };
    msg.set_revision(Some(rev));
}

pub fn unset_revision<T: ConfigMessage>(msg: &mut T) {
    msg.set_revision(None);
}

/// Copies the full revision field (number and timestamp) of `src` onto
/// `dst`.
pub fn copy_revision<T: ConfigMessage>(dst: &mut T, src: &T) {
    dst.set_revision(src.revision().cloned());
}
