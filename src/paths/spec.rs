//! Raw path specifications and their merge rules.

use super::actions::{ActionBuilders, ActionKind, PropagateHooks};
use crate::dispatch::Dispatch;
use crate::error::Result;
use crate::source::ChangeSource;
use crate::types::Document;
use std::fmt;
use std::sync::Arc;

/// Predicate deciding whether a change is observable on a path.
pub type FilterFn = Arc<dyn Fn(&Document) -> bool + Send + Sync>;

/// Unvalidated configuration for one feed subscription.
///
/// Every field is optional here; [`normalize`](super::normalize) merges
/// it over a template and checks that a source is present.
pub struct PathSpec<A> {
    /// Label used in logs.
    pub name: Option<String>,

    /// Feed provider.
    pub source: Option<Arc<dyn ChangeSource>>,

    /// Changes whose document fails this predicate are dropped.
    pub filter: Option<FilterFn>,

    pub actions: ActionBuilders<A>,

    pub hooks: PropagateHooks<A>,
}

impl<A> PathSpec<A> {
    pub fn new() -> Self {
        Self {
            name: None,
            source: None,
            filter: None,
            actions: ActionBuilders::new(),
            hooks: PropagateHooks::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_source(mut self, source: Arc<dyn ChangeSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Document) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn on_insert<F>(mut self, f: F) -> Self
    where
        F: Fn(&Document) -> A + Send + Sync + 'static,
    {
        self.actions.set(ActionKind::Insert, f);
        self
    }

    pub fn on_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&Document) -> A + Send + Sync + 'static,
    {
        self.actions.set(ActionKind::Update, f);
        self
    }

    pub fn on_remove<F>(mut self, f: F) -> Self
    where
        F: Fn(&Document) -> A + Send + Sync + 'static,
    {
        self.actions.set(ActionKind::Remove, f);
        self
    }

    pub fn propagate_insert<F>(mut self, f: F) -> Self
    where
        F: Fn(&Document, &ActionBuilders<A>, &dyn Dispatch<A>) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.set(ActionKind::Insert, f);
        self
    }

    pub fn propagate_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&Document, &ActionBuilders<A>, &dyn Dispatch<A>) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.set(ActionKind::Update, f);
        self
    }

    pub fn propagate_delete<F>(mut self, f: F) -> Self
    where
        F: Fn(&Document, &ActionBuilders<A>, &dyn Dispatch<A>) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.set(ActionKind::Remove, f);
        self
    }

    /// Overlay this spec on `template`. Fields set here win; action
    /// builders and hooks merge key by key rather than wholesale.
    pub fn merge_over(self, template: &PathSpec<A>) -> PathSpec<A> {
        PathSpec {
            name: self.name.or_else(|| template.name.clone()),
            source: self.source.or_else(|| template.source.clone()),
            filter: self.filter.or_else(|| template.filter.clone()),
            actions: self.actions.merge_over(&template.actions),
            hooks: self.hooks.merge_over(&template.hooks),
        }
    }
}

impl<A> Default for PathSpec<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for PathSpec<A> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            source: self.source.clone(),
            filter: self.filter.clone(),
            actions: self.actions.clone(),
            hooks: self.hooks.clone(),
        }
    }
}

impl<A> fmt::Debug for PathSpec<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathSpec")
            .field("name", &self.name)
            .field("source", &self.source.as_ref().map(|s| s.name().to_string()))
            .field("filter", &self.filter.is_some())
            .field("actions", &self.actions)
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// One or many path specs, as accepted by the middleware.
pub struct PathSpecs<A>(pub Vec<PathSpec<A>>);

impl<A> From<PathSpec<A>> for PathSpecs<A> {
    fn from(spec: PathSpec<A>) -> Self {
        PathSpecs(vec![spec])
    }
}

impl<A> From<Vec<PathSpec<A>>> for PathSpecs<A> {
    fn from(specs: Vec<PathSpec<A>>) -> Self {
        PathSpecs(specs)
    }
}

impl<A> From<Option<PathSpec<A>>> for PathSpecs<A> {
    fn from(spec: Option<PathSpec<A>>) -> Self {
        PathSpecs(spec.into_iter().collect())
    }
}
