//! Dry-run: simulate a mutation and report `{current, modified}` without
//! persisting anything. Each entry point shares the live write path's
//! merge and masked-field handling, so the report is exactly what the
//! corresponding write would commit.

use crate::errors::{Error, Result};
use crate::proto::{set_revision, Action, Revision, Target, Violations};
use crate::schema::{ConfigMessage, ContextKeyed, FieldMask};
use crate::storage::GetOptions;

use super::{DefaultingConfigTracker, RequestScope};

/// Composite dry-run request mirroring the wire shape.
#[derive(Clone, Debug, Default)]
pub struct DryRunRequest<T> {
    pub target: Target,
    pub action: Action,
    pub spec: Option<T>,
    pub revision: Option<Revision>,
    pub patch: Option<T>,
    pub mask: Option<FieldMask>,
    pub key: Option<String>,
}

impl<T: ConfigMessage> ContextKeyed for DryRunRequest<T> {
    fn context_key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

/// What a dry-run reports: the state a read would return now, the state it
/// would return after the simulated write, and any schema violations found
/// in the modified document.
#[derive(Clone, Debug)]
pub struct DryRunResults<T> {
    pub current: T,
    pub modified: T,
    pub validation_errors: Option<Violations>,
}

/// Fluent constructor for [`DryRunRequest`], mirroring the original
/// request-builder surface.
#[derive(Clone, Debug)]
pub struct DryRunRequestBuilder<T> {
    request: DryRunRequest<T>,
}

impl<T: ConfigMessage> Default for DryRunRequestBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ConfigMessage> DryRunRequestBuilder<T> {
    pub fn new() -> Self {
        Self {
            request: DryRunRequest::default(),
        }
    }

    pub fn active(mut self) -> Self {
        self.request.target = Target::Active;
        self
    }

    pub fn default_target(mut self) -> Self {
        self.request.target = Target::Default;
        self
    }

    pub fn set(mut self, spec: T) -> Self {
        self.request.action = Action::Set;
        self.request.spec = Some(spec);
        self
    }

    pub fn reset(mut self) -> Self {
        self.request.action = Action::Reset;
        self
    }

    pub fn revision(mut self, revision: Revision) -> Self {
        self.request.revision = Some(revision);
        self
    }

    pub fn mask(mut self, mask: FieldMask) -> Self {
        self.request.mask = Some(mask);
        self
    }

    pub fn patch(mut self, patch: T) -> Self {
        self.request.patch = Some(patch);
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.request.key = Some(key.into());
        self
    }

    pub fn build(self) -> DryRunRequest<T> {
        self.request
    }
}

fn some_violations(violations: Violations) -> Option<Violations> {
    if violations.is_empty() {
        None
    } else {
        Some(violations)
    }
}

impl<T: ConfigMessage> DefaultingConfigTracker<T> {
    /// Dispatches a composite dry-run request to the matching simulation.
    pub async fn dry_run(
        &self,
        scope: &RequestScope,
        request: DryRunRequest<T>,
    ) -> Result<DryRunResults<T>> {
        match (request.target, request.action) {
            (Target::Active, Action::Set) => {
                let spec = request.spec.ok_or_else(|| {
                    Error::InvalidArgument("dry-run set requires a spec".to_owned())
                })?;
                self.dry_run_apply(scope, spec).await
            }
            (Target::Default, Action::Set) => {
                let spec = request.spec.ok_or_else(|| {
                    Error::InvalidArgument("dry-run set requires a spec".to_owned())
                })?;
                self.dry_run_set_default(spec).await
            }
            (Target::Active, Action::Reset) => {
                self.dry_run_reset(
                    scope,
                    request.mask.as_ref(),
                    request.patch.as_ref(),
                    request.revision.as_ref().map(Revision::get),
                )
                .await
            }
            (Target::Default, Action::Reset) => self.dry_run_reset_default().await,
            (target, action) => Err(Error::InvalidArgument(format!(
                "unsupported dry-run combination: target {target:?}, action {action:?}"
            ))),
        }
    }

    pub async fn dry_run_apply(
        &self,
        scope: &RequestScope,
        mut incoming: T,
    ) -> Result<DryRunResults<T>> {
        Self::clear_masked(&mut incoming);
        let store = self.active_for(scope)?;
        let (base, base_revision) = match store.get(GetOptions::new()).await {
            Ok(found) => found,
            Err(err) if err.is_not_found() => self.default_unredacted(None).await?,
            Err(err) => return Err(err),
        };
        let (merged, _) = Self::merge_incoming(&base, incoming)?;
        let violations = merged.validate_spec();

        let mut current = base;
        current.redact_secrets();
        set_revision(&mut current, base_revision);
        let mut modified = merged;
        modified.redact_secrets();
        set_revision(&mut modified, base_revision);
        Ok(DryRunResults {
            current,
            modified,
            validation_errors: some_violations(violations),
        })
    }

    pub async fn dry_run_set_default(&self, mut incoming: T) -> Result<DryRunResults<T>> {
        Self::clear_masked(&mut incoming);
        let (base, base_revision) = self.default_unredacted(None).await?;
        let (merged, _) = Self::merge_incoming(&base, incoming)?;
        let violations = merged.validate_spec();

        let mut current = base;
        current.redact_secrets();
        set_revision(&mut current, base_revision);
        let mut modified = merged;
        modified.redact_secrets();
        set_revision(&mut modified, base_revision);
        Ok(DryRunResults {
            current,
            modified,
            validation_errors: some_violations(violations),
        })
    }

    pub async fn dry_run_reset(
        &self,
        scope: &RequestScope,
        mask: Option<&FieldMask>,
        patch: Option<&T>,
        _revision: Option<i64>,
    ) -> Result<DryRunResults<T>> {
        let store = self.active_for(scope)?;
        let patch_empty = patch.map_or(true, |p| Self::is_empty_spec(p));
        if mask.is_none() && patch_empty {
            // Deleting the active entry makes reads fall back to the
            // default.
            let current = self.get(scope, None).await?;
            let modified = self.get_default(None).await?;
            return Ok(DryRunResults {
                current,
                modified,
                validation_errors: None,
            });
        }

        let mask = mask.cloned().unwrap_or_default();
        mask.validate::<T>()?;
        let (current_raw, current_revision) = store.get(GetOptions::new()).await?;
        let (defaults, _) = self.default_unredacted(None).await?;
        let merged = Self::compose_reset(defaults, &current_raw, &mask, patch)?;
        let violations = merged.validate_spec();

        let mut current = current_raw;
        current.redact_secrets();
        set_revision(&mut current, current_revision);
        let mut modified = merged;
        modified.redact_secrets();
        set_revision(&mut modified, current_revision);
        Ok(DryRunResults {
            current,
            modified,
            validation_errors: some_violations(violations),
        })
    }

    pub async fn dry_run_reset_default(&self) -> Result<DryRunResults<T>> {
        let current = self.get_default(None).await?;
        let mut modified = self.loaded_defaults();
        let violations = modified.validate_spec();
        modified.redact_secrets();
        set_revision(&mut modified, 0);
        Ok(DryRunResults {
            current,
            modified,
            validation_errors: some_violations(violations),
        })
    }
}
