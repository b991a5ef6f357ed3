//! Rollback orchestration.
//!
//! Reverting to a prior revision is an ordinary mutation applied in a
//! specific way: a Set for the default configuration, or a
//! reset-with-mask-by-presence for the active configuration. The
//! orchestrator dry-runs the mutation first, resolves secret
//! discontinuities with the injected interaction, presents the pending
//! change for review, and only then commits.
//!
//! A discontinuity arises when the target revision held a secret that has
//! since been cleared: the client only ever saw the redacted placeholder,
//! so the original value is unrecoverable and a fresh one must be
//! supplied. When both the current and target revisions hold values for
//! the same secret fields there is no discontinuity, and the secrets
//! simply keep their current values.

use async_trait::async_trait;

use crate::errors::{Error, Result};
use crate::proto::{
    copy_revision, revision_of, DryRunResponse, GetRequest, ResetRequest, Revision, SetRequest,
    Target, Violations,
};
use crate::schema::{mask_by_presence, ConfigMessage, FieldPath, Value};
use crate::tracker::DryRunRequestBuilder;

use super::ConfigClient;

/// The pending change a rollback would commit.
#[derive(Clone, Debug)]
pub struct RollbackPlan<T> {
    pub target: Target,
    pub revision: i64,
    pub current: T,
    pub modified: T,
    pub validation_errors: Option<Violations>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RollbackDecision {
    Apply,
    /// Required instead of [`Apply`](RollbackDecision::Apply) when the
    /// plan carries validation errors; they warn, not block, but only
    /// behind an explicit bypass.
    ApplyBypassingValidation,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RollbackOutcome {
    Applied,
    NoChanges,
    Cancelled,
}

/// External interaction points (prompting and diff rendering live outside
/// this crate).
#[async_trait]
pub trait RollbackInteraction<T: ConfigMessage>: Send + Sync {
    /// Supplies fresh values for secret fields hit by a discontinuity.
    /// Returning no answers aborts the rollback with the original error.
    async fn resolve_secrets(&self, fields: &[FieldPath]) -> Result<Vec<(FieldPath, String)>>;

    /// Reviews the pending change.
    async fn review(&self, plan: &RollbackPlan<T>) -> Result<RollbackDecision>;
}

pub async fn rollback<T, C, I>(
    client: &C,
    target: Target,
    revision: i64,
    key: Option<String>,
    interaction: &I,
) -> Result<RollbackOutcome>
where
    T: ConfigMessage,
    C: ConfigClient<T>,
    I: RollbackInteraction<T>,
{
    let head_request = GetRequest {
        revision: None,
        key: key.clone(),
    };
    let target_request = GetRequest {
        revision: Some(Revision::new(revision)),
        key: key.clone(),
    };
    let (current, mut target_config) = match target {
        Target::Active => (
            client.get(head_request).await?,
            client.get(target_request).await?,
        ),
        Target::Default => (
            client.get_default(head_request).await?,
            client.get_default(target_request).await?,
        ),
        Target::Unspecified => {
            return Err(Error::InvalidArgument("rollback target is required".to_owned()))
        }
    };
    if revision_of(&current) == revision_of(&target_config) {
        return Err(Error::InvalidArgument(format!(
            "configuration is already at revision {revision}"
        )));
    }
    // The current head revision guards the eventual write.
    copy_revision(&mut target_config, &current);

    loop {
        let request = match target {
            Target::Active => {
                let mut builder = DryRunRequestBuilder::new()
                    .active()
                    .reset()
                    .mask(mask_by_presence(&target_config))
                    .patch(target_config.clone());
                if let Some(rev) = current.revision() {
                    builder = builder.revision(rev.clone());
                }
                builder
            }
            _ => DryRunRequestBuilder::new()
                .default_target()
                .set(target_config.clone()),
        };
        let request = match &key {
            Some(key) => request.key(key.clone()),
            None => request,
        }
        .build();

        let response = match client.dry_run(request).await {
            Ok(response) => response,
            Err(Error::Discontinuity(discontinuity)) => {
                let answers = interaction.resolve_secrets(&discontinuity.fields).await?;
                if answers.is_empty() {
                    return Err(discontinuity.into());
                }
                for (path, secret) in answers {
                    target_config
                        .set_field(&path, Value::String(secret))
                        .map_err(Error::Schema)?;
                }
                continue;
            }
            Err(err) => return Err(err),
        };

        let plan = plan_from(target, revision, response)?;
        if unchanged(&plan) {
            return Ok(RollbackOutcome::NoChanges);
        }
        match interaction.review(&plan).await? {
            RollbackDecision::Cancel => return Ok(RollbackOutcome::Cancelled),
            RollbackDecision::Apply if plan.validation_errors.is_some() => {
                // Validation warnings need the explicit bypass decision.
                return Ok(RollbackOutcome::Cancelled);
            }
            RollbackDecision::Apply | RollbackDecision::ApplyBypassingValidation => {}
        }

        match target {
            Target::Active => {
                client
                    .reset(ResetRequest {
                        revision: current.revision().cloned(),
                        mask: Some(mask_by_presence(&target_config)),
                        patch: Some(target_config.clone()),
                        key: key.clone(),
                    })
                    .await?;
            }
            _ => {
                client
                    .set_default(SetRequest {
                        spec: Some(target_config.clone()),
                        key: key.clone(),
                    })
                    .await?;
            }
        }
        return Ok(RollbackOutcome::Applied);
    }
}

fn plan_from<T: ConfigMessage>(
    target: Target,
    revision: i64,
    response: DryRunResponse<T>,
) -> Result<RollbackPlan<T>> {
    let current = response
        .current
        .ok_or_else(|| Error::Internal("dry-run response is missing current".to_owned()))?;
    let modified = response
        .modified
        .ok_or_else(|| Error::Internal("dry-run response is missing modified".to_owned()))?;
    Ok(RollbackPlan {
        target,
        revision,
        current,
        modified,
        validation_errors: response.validation_errors,
    })
}

fn unchanged<T: ConfigMessage>(plan: &RollbackPlan<T>) -> bool {
    let mut current = plan.current.clone();
    let mut modified = plan.modified.clone();
    current.set_revision(None);
    modified.set_revision(None);
    current == modified
}
