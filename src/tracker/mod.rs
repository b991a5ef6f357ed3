//! Defaulting configuration tracker.
//!
//! Composes a default store and an active store over one document type.
//! Reads layer the active document over the defaults and redact secrets on
//! the way out; writes merge into the current state under optimistic
//! concurrency and keep secrets flowing only through unredaction of
//! previously stored values.

mod dryrun;

pub use dryrun::*;


use std::sync::Arc;

use tracing::debug;

use crate::errors::{Error, Result};
use crate::proto::{set_revision, set_revision_with_timestamp, Target};
use crate::schema::{exclusive_keep, ConfigMessage, ContextKeyed, FieldMask, FieldPath};
use crate::storage::{
    DeleteOptions, GetOptions, HistoryOptions, KeyRevision, KeyValueStore, KeyedValueStore,
    PutOptions, ValueStore,
};

/// Populates an empty document with process-wide defaults. Used whenever
/// the default store has no entry.
pub type DefaultLoader<T> = Arc<dyn Fn(&mut T) + Send + Sync>;

/// A loader that merges a fixed defaults document into its argument.
pub fn merge_defaults_loader<T: ConfigMessage>(defaults: T) -> DefaultLoader<T> {
    Arc::new(move |target: &mut T| target.merge_with_replace(&defaults))
}

/// Request-scoped context. Carries the context key extracted by the server
/// facade; the tracker itself is key-agnostic and only reads it here.
#[derive(Clone, Debug, Default)]
pub struct RequestScope {
    key: Option<String>,
}

impl RequestScope {
    pub fn unkeyed() -> Self {
        Self::default()
    }

    pub fn keyed(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
        }
    }

    pub fn for_request<R: ContextKeyed>(request: &R) -> Self {
        Self {
            key: request.context_key().map(str::to_owned),
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

enum ActiveBackend<T> {
    Single(Arc<dyn ValueStore<T>>),
    Keyed(Arc<dyn KeyValueStore<T>>),
}

pub struct DefaultingConfigTracker<T: ConfigMessage> {
    default_store: Arc<dyn ValueStore<T>>,
    active: ActiveBackend<T>,
    load_defaults: DefaultLoader<T>,
}

impl<T: ConfigMessage> DefaultingConfigTracker<T> {
    pub fn new(
        default_store: Arc<dyn ValueStore<T>>,
        active_store: Arc<dyn ValueStore<T>>,
        load_defaults: DefaultLoader<T>,
    ) -> Self {
        Self {
            default_store,
            active: ActiveBackend::Single(active_store),
            load_defaults,
        }
    }

    /// A tracker whose active side is namespaced by the request's context
    /// key. The default side is never keyed: one default document is
    /// shared by every namespace.
    pub fn new_keyed(
        default_store: Arc<dyn ValueStore<T>>,
        active_store: Arc<dyn KeyValueStore<T>>,
        load_defaults: DefaultLoader<T>,
    ) -> Self {
        Self {
            default_store,
            active: ActiveBackend::Keyed(active_store),
            load_defaults,
        }
    }

    /// The active store when it is a single-value store. Keyed trackers
    /// have no single active stream to subscribe to.
    pub fn active_value_store(&self) -> Option<Arc<dyn ValueStore<T>>> {
        match &self.active {
            ActiveBackend::Single(store) => Some(store.clone()),
            ActiveBackend::Keyed(_) => None,
        }
    }

    fn active_for(&self, scope: &RequestScope) -> Result<Arc<dyn ValueStore<T>>> {
        match &self.active {
            ActiveBackend::Single(store) => Ok(store.clone()),
            ActiveBackend::Keyed(kv) => {
                let key = scope.key().ok_or_else(|| {
                    Error::InvalidArgument("request is missing its context key".to_owned())
                })?;
                Ok(Arc::new(KeyedValueStore::new(kv.clone(), key)))
            }
        }
    }

    fn loaded_defaults(&self) -> T {
        let mut defaults = T::default();
        (self.load_defaults)(&mut defaults);
        defaults
    }

    /// The unredacted default document and its revision; loader defaults
    /// at revision 0 when the default store has no entry.
    async fn default_unredacted(&self, revision: Option<i64>) -> Result<(T, i64)> {
        let options = match revision {
            Some(revision) => GetOptions::new().at_revision(revision),
            None => GetOptions::new(),
        };
        match self.default_store.get(options).await {
            Ok(found) => Ok(found),
            Err(err) if err.is_not_found() => Ok((self.loaded_defaults(), 0)),
            Err(err) => Err(err),
        }
    }

    fn clear_masked(spec: &mut T) {
        for name in T::masked_fields() {
            if let Ok(path) = FieldPath::parse(name) {
                let _ = spec.clear_field(&path);
            }
        }
    }

    fn is_empty_spec(spec: &T) -> bool {
        let mut clone = spec.clone();
        clone.set_revision(None);
        clone == T::default()
    }

    /// The write-side merge: unredact the incoming spec against the base,
    /// then merge-with-replace. Returns the merged document (revision
    /// unset) and the CAS guard taken from the incoming revision.
    fn merge_incoming(base: &T, mut incoming: T) -> Result<(T, Option<i64>)> {
        let guard = incoming.revision().map(|r| r.get());
        incoming.set_revision(None);
        incoming.unredact_secrets(base)?;
        let mut merged = base.clone();
        merged.merge_with_replace(&incoming);
        merged.set_revision(None);
        Ok((merged, guard))
    }

    /// The reset composition: defaults, overlaid with the current active's
    /// fields selected by the mask, overlaid with the patch's fields
    /// selected by the mask. Placeholders in the patch resolve against the
    /// current active.
    fn compose_reset(
        defaults: T,
        current: &T,
        mask: &FieldMask,
        patch: Option<&T>,
    ) -> Result<T> {
        let mut kept = current.clone();
        kept.set_revision(None);
        exclusive_keep(&mut kept, mask);
        let mut modified = defaults;
        modified.merge_with_replace(&kept);
        if let Some(patch) = patch {
            let mut patch = patch.clone();
            patch.set_revision(None);
            patch.unredact_secrets(current)?;
            exclusive_keep(&mut patch, mask);
            modified.merge_with_replace(&patch);
        }
        modified.set_revision(None);
        Ok(modified)
    }

    // -----------------------------------------------------------------
    // Reads

    pub async fn get_default(&self, revision: Option<i64>) -> Result<T> {
        let (mut value, rev) = self.default_unredacted(revision).await?;
        value.redact_secrets();
        set_revision(&mut value, rev);
        Ok(value)
    }

    pub async fn get(&self, scope: &RequestScope, revision: Option<i64>) -> Result<T> {
        let store = self.active_for(scope)?;
        let options = match revision {
            Some(revision) => GetOptions::new().at_revision(revision),
            None => GetOptions::new(),
        };
        let (mut value, rev) = store.get(options).await?;
        value.redact_secrets();
        set_revision(&mut value, rev);
        Ok(value)
    }

    pub async fn get_active_or_default(
        &self,
        scope: &RequestScope,
        revision: Option<i64>,
    ) -> Result<T> {
        match self.get(scope, revision).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_not_found() => self.get_default(revision).await,
            Err(err) => Err(err),
        }
    }

    // -----------------------------------------------------------------
    // Writes

    /// Merges `incoming` over the current active document (or the defaults
    /// when none exists) and commits the result, guarded by the incoming
    /// revision when one is present.
    pub async fn apply(&self, scope: &RequestScope, mut incoming: T) -> Result<()> {
        Self::clear_masked(&mut incoming);
        let store = self.active_for(scope)?;
        let base = match store.get(GetOptions::new()).await {
            Ok((value, _)) => value,
            Err(err) if err.is_not_found() => self.default_unredacted(None).await?.0,
            Err(err) => return Err(err),
        };
        let (merged, guard) = Self::merge_incoming(&base, incoming)?;
        let mut options = PutOptions::new();
        if let Some(guard) = guard {
            options = options.if_revision(guard);
        }
        let revision = store.put(merged, options).await?;
        debug!(type_name = T::type_name(), revision, "applied active configuration");
        Ok(())
    }

    /// Same merge as [`apply`](Self::apply), against the default store.
    pub async fn set_default(&self, mut incoming: T) -> Result<()> {
        Self::clear_masked(&mut incoming);
        let (base, _) = self.default_unredacted(None).await?;
        let (merged, guard) = Self::merge_incoming(&base, incoming)?;
        let mut options = PutOptions::new();
        if let Some(guard) = guard {
            options = options.if_revision(guard);
        }
        let revision = self.default_store.put(merged, options).await?;
        debug!(type_name = T::type_name(), revision, "set default configuration");
        Ok(())
    }

    /// Resets the active document. Without a mask or patch the entry is
    /// deleted outright; with either, a new active is composed from the
    /// defaults (see [`compose_reset`](Self::compose_reset)) and committed
    /// against the current active revision, so history is preserved.
    pub async fn reset(
        &self,
        scope: &RequestScope,
        mask: Option<&FieldMask>,
        patch: Option<&T>,
        revision: Option<i64>,
    ) -> Result<()> {
        let store = self.active_for(scope)?;
        let patch_empty = patch.map_or(true, |p| Self::is_empty_spec(p));
        if mask.is_none() && patch_empty {
            let mut options = DeleteOptions::new();
            if let Some(revision) = revision {
                options = options.if_revision(revision);
            }
            return store.delete(options).await;
        }

        let mask = mask.cloned().unwrap_or_default();
        mask.validate::<T>()?;
        let (current, current_revision) = store.get(GetOptions::new()).await?;
        let (defaults, _) = self.default_unredacted(None).await?;
        let modified = Self::compose_reset(defaults, &current, &mask, patch)?;
        let guard = revision.unwrap_or(current_revision);
        store
            .put(modified, PutOptions::new().if_revision(guard))
            .await?;
        debug!(type_name = T::type_name(), "reset active configuration");
        Ok(())
    }

    pub async fn reset_default(&self) -> Result<()> {
        self.default_store.delete(DeleteOptions::new()).await
    }

    // -----------------------------------------------------------------
    // History

    /// Revision history of the given target. When values are requested,
    /// each entry is redacted and its revision field populated from the
    /// store metadata.
    pub async fn history(
        &self,
        scope: &RequestScope,
        target: Target,
        options: HistoryOptions,
    ) -> Result<Vec<KeyRevision<T>>> {
        let store = match target {
            Target::Active => self.active_for(scope)?,
            Target::Default => self.default_store.clone(),
            Target::Unspecified => {
                return Err(Error::InvalidArgument("history target is required".to_owned()))
            }
        };
        let mut entries = store.history(options).await?;
        if options.include_values {
            for entry in &mut entries {
                if let Some(value) = &mut entry.value {
                    value.redact_secrets();
                    set_revision_with_timestamp(value, entry.revision, entry.timestamp);
                }
            }
        }
        Ok(entries)
    }
}
