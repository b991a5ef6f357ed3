//! Server facade: a thin adapter translating request messages into
//! tracker calls. Implementations of the transport surface should not
//! vary between deployments, so they are provided here once.

mod client;
mod rollback;

pub use client::*;
pub use rollback::*;


use std::sync::Arc;

use crate::errors::{Error, Result};
use crate::proto::{
    set_revision_with_timestamp, Action, DryRunResponse, GetRequest, HistoryRequest,
    HistoryResponse, ResetRequest, Revision, SetRequest, Target,
};
use crate::schema::{ConfigMessage, ContextKeyed, FieldMask, FieldPath};
use crate::storage::{HistoryOptions, KeyValueStore, ValueStore};
use crate::tracker::{DefaultLoader, DefaultingConfigTracker, DryRunRequest, RequestScope};

pub struct ConfigServer<T: ConfigMessage> {
    tracker: Arc<DefaultingConfigTracker<T>>,
}

impl<T: ConfigMessage> ConfigServer<T> {
    pub fn new(
        default_store: Arc<dyn ValueStore<T>>,
        active_store: Arc<dyn ValueStore<T>>,
        load_defaults: DefaultLoader<T>,
    ) -> Self {
        Self::from_tracker(Arc::new(DefaultingConfigTracker::new(
            default_store,
            active_store,
            load_defaults,
        )))
    }

    /// A server whose active store is namespaced by each request's context
    /// key. The default store stays shared across every key.
    pub fn new_keyed(
        default_store: Arc<dyn ValueStore<T>>,
        active_store: Arc<dyn KeyValueStore<T>>,
        load_defaults: DefaultLoader<T>,
    ) -> Self {
        Self::from_tracker(Arc::new(DefaultingConfigTracker::new_keyed(
            default_store,
            active_store,
            load_defaults,
        )))
    }

    pub fn from_tracker(tracker: Arc<DefaultingConfigTracker<T>>) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> Arc<DefaultingConfigTracker<T>> {
        self.tracker.clone()
    }

    fn scope<R: ContextKeyed>(request: &R) -> RequestScope {
        RequestScope::for_request(request)
    }

    fn revision_arg(revision: &Option<Revision>) -> Option<i64> {
        revision.as_ref().map(Revision::get)
    }

    /// The active configuration, falling back to the default when none is
    /// set.
    pub async fn get(&self, request: &GetRequest) -> Result<T> {
        self.tracker
            .get_active_or_default(&Self::scope(request), Self::revision_arg(&request.revision))
            .await
    }

    pub async fn get_default(&self, request: &GetRequest) -> Result<T> {
        self.tracker
            .get_default(Self::revision_arg(&request.revision))
            .await
    }

    pub async fn set(&self, request: &SetRequest<T>) -> Result<()> {
        let spec = request
            .spec
            .clone()
            .ok_or_else(|| Error::InvalidArgument("set request is missing a spec".to_owned()))?;
        self.tracker.apply(&Self::scope(request), spec).await
    }

    pub async fn set_default(&self, request: &SetRequest<T>) -> Result<()> {
        let spec = request
            .spec
            .clone()
            .ok_or_else(|| Error::InvalidArgument("set request is missing a spec".to_owned()))?;
        self.tracker.set_default(spec).await
    }

    /// Enforces the masked-field policy on a reset's mask and patch: the
    /// mask always includes every masked field and the patch is stripped
    /// of them, so secrets can neither be dropped nor injected through a
    /// reset. The resulting non-nil mask also means the active entry is
    /// rewritten rather than deleted, preserving history.
    fn apply_masked_reset_policy(
        mask: &mut Option<FieldMask>,
        patch: &mut Option<T>,
    ) -> Result<()> {
        let masked = T::masked_fields();
        if masked.is_empty() {
            return Ok(());
        }
        let mask = mask.get_or_insert_with(FieldMask::new);
        for field in masked {
            mask.append(*field);
        }
        if let Some(patch) = patch {
            for field in masked {
                let path = FieldPath::parse(field).map_err(Error::Schema)?;
                let _ = patch.clear_field(&path);
            }
        }
        Ok(())
    }

    /// Resets the active configuration, under the masked-field policy of
    /// [`apply_masked_reset_policy`](Self::apply_masked_reset_policy).
    pub async fn reset(&self, request: &ResetRequest<T>) -> Result<()> {
        let mut mask = request.mask.clone();
        let mut patch = request.patch.clone();
        Self::apply_masked_reset_policy(&mut mask, &mut patch)?;
        self.tracker
            .reset(
                &Self::scope(request),
                mask.as_ref(),
                patch.as_ref(),
                Self::revision_arg(&request.revision),
            )
            .await
    }

    pub async fn reset_default(&self) -> Result<()> {
        self.tracker.reset_default().await
    }

    pub async fn history(&self, request: &HistoryRequest) -> Result<HistoryResponse<T>> {
        let mut options = HistoryOptions::new().include_values(request.include_values);
        if let Some(revision) = Self::revision_arg(&request.revision) {
            options = options.up_to_revision(revision);
        }
        let revisions = self
            .tracker
            .history(&Self::scope(request), request.target, options)
            .await?;
        let entries = revisions
            .into_iter()
            .map(|entry| match entry.value {
                // Values come back from the tracker already redacted and
                // revision-stamped.
                Some(value) if request.include_values => value,
                _ => {
                    let mut blank = T::default();
                    set_revision_with_timestamp(&mut blank, entry.revision, entry.timestamp);
                    blank
                }
            })
            .collect();
        Ok(HistoryResponse { entries })
    }

    /// Simulates a mutation and reports the outcome without persisting.
    /// An active reset is simulated under the same masked-field policy the
    /// live [`reset`](Self::reset) handler enforces.
    pub async fn dry_run(&self, request: &DryRunRequest<T>) -> Result<DryRunResponse<T>> {
        let scope = Self::scope(request);
        let mut request = request.clone();
        if request.target == Target::Active && request.action == Action::Reset {
            let mut mask = request.mask.take();
            let mut patch = request.patch.take();
            Self::apply_masked_reset_policy(&mut mask, &mut patch)?;
            request.mask = mask;
            request.patch = patch;
        }
        let results = self.tracker.dry_run(&scope, request).await?;
        Ok(DryRunResponse {
            current: Some(results.current),
            modified: Some(results.modified),
            validation_errors: results.validation_errors,
        })
    }
}
