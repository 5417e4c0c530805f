//! Validated path configuration.

use super::actions::{ActionBuilders, PropagateHooks};
use super::spec::{FilterFn, PathSpec, PathSpecs};
use super::tracked::TrackedTable;
use crate::dispatch::{self, Dispatch};
use crate::error::{Result, SyncError};
use crate::reconcile::{self, Classification};
use crate::source::ChangeSource;
use crate::types::ChangeNotification;
use std::fmt;
use std::sync::Arc;

/// One feed subscription: its source, filter, actions, hooks and the
/// tracking table it owns exclusively.
pub struct PathConfig<A> {
    name: String,
    source: Arc<dyn ChangeSource>,
    filter: Option<FilterFn>,
    actions: ActionBuilders<A>,
    hooks: PropagateHooks<A>,
    tracked: TrackedTable,
}

impl<A> PathConfig<A> {
    /// Validate a merged spec. The tracking table always starts empty.
    fn from_spec(spec: PathSpec<A>, index: usize) -> Result<Self> {
        let source = spec.source.ok_or(SyncError::MissingSource { index })?;
        Ok(Self {
            name: spec.name.unwrap_or_else(|| format!("path-{}", index)),
            source,
            filter: spec.filter,
            actions: spec.actions,
            hooks: spec.hooks,
            tracked: TrackedTable::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Arc<dyn ChangeSource> {
        &self.source
    }

    pub fn actions(&self) -> &ActionBuilders<A> {
        &self.actions
    }

    pub fn tracked(&self) -> &TrackedTable {
        &self.tracked
    }

    /// Classify a notification against this path's table, updating it.
    pub fn reconcile(&mut self, change: &ChangeNotification) -> Classification {
        reconcile::reconcile(change, self.filter.as_ref(), &mut self.tracked)
    }

    /// Hand a classified change to the matching hook.
    /// Returns false when the change was ignored.
    pub fn propagate(&self, classification: &Classification, sink: &dyn Dispatch<A>) -> Result<bool> {
        dispatch::propagate(classification, &self.actions, &self.hooks, sink)
    }
}

impl<A> fmt::Debug for PathConfig<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathConfig")
            .field("name", &self.name)
            .field("source", &self.source.name())
            .field("filter", &self.filter.is_some())
            .field("actions", &self.actions)
            .field("hooks", &self.hooks)
            .field("tracked", &self.tracked.len())
            .finish()
    }
}

/// Merge each spec over `template` and validate the result.
///
/// Fails with [`SyncError::NoPaths`] for an empty input and with
/// [`SyncError::MissingSource`] for the first spec lacking a source; no
/// partial result is returned.
pub fn normalize<A>(specs: impl Into<PathSpecs<A>>, template: &PathSpec<A>) -> Result<Vec<PathConfig<A>>> {
    let PathSpecs(specs) = specs.into();
    if specs.is_empty() {
        return Err(SyncError::NoPaths);
    }

    specs
        .into_iter()
        .enumerate()
        .map(|(index, spec)| PathConfig::from_spec(spec.merge_over(template), index))
        .collect()
}
