//! Action builders and propagate hooks.

use crate::dispatch::Dispatch;
use crate::error::{Result, SyncError};
use crate::types::Document;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which kind of change an action or hook handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Insert,
    Update,
    Remove,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Insert => "insert",
            ActionKind::Update => "update",
            ActionKind::Remove => "remove",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds an instruction from a document.
pub type ActionFn<A> = Arc<dyn Fn(&Document) -> A + Send + Sync>;

/// Custom propagation for one change kind.
///
/// Receives the document, the path's action builders and the sink.
pub type HookFn<A> =
    Arc<dyn Fn(&Document, &ActionBuilders<A>, &dyn Dispatch<A>) -> Result<()> + Send + Sync>;

/// The three instruction builders of a path. `None` means unconfigured:
/// invoking it fails with [`SyncError::UnconfiguredAction`].
pub struct ActionBuilders<A> {
    pub insert: Option<ActionFn<A>>,
    pub update: Option<ActionFn<A>>,
    pub remove: Option<ActionFn<A>>,
}

impl<A> ActionBuilders<A> {
    pub fn new() -> Self {
        Self {
            insert: None,
            update: None,
            remove: None,
        }
    }

    pub fn get(&self, kind: ActionKind) -> Option<&ActionFn<A>> {
        match kind {
            ActionKind::Insert => self.insert.as_ref(),
            ActionKind::Update => self.update.as_ref(),
            ActionKind::Remove => self.remove.as_ref(),
        }
    }

    fn slot(&mut self, kind: ActionKind) -> &mut Option<ActionFn<A>> {
        match kind {
            ActionKind::Insert => &mut self.insert,
            ActionKind::Update => &mut self.update,
            ActionKind::Remove => &mut self.remove,
        }
    }

    pub fn is_configured(&self, kind: ActionKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn set<F>(&mut self, kind: ActionKind, f: F)
    where
        F: Fn(&Document) -> A + Send + Sync + 'static,
    {
        *self.slot(kind) = Some(Arc::new(f));
    }

    /// Build the instruction for `kind`.
    pub fn build(&self, kind: ActionKind, doc: &Document) -> Result<A> {
        match self.get(kind) {
            Some(f) => Ok(f(doc)),
            None => Err(SyncError::UnconfiguredAction(kind)),
        }
    }

    /// Overlay `self` on `base` key by key: a builder set here wins,
    /// otherwise the one from `base` is kept.
    pub fn merge_over(self, base: &ActionBuilders<A>) -> ActionBuilders<A> {
        ActionBuilders {
            insert: self.insert.or_else(|| base.insert.clone()),
            update: self.update.or_else(|| base.update.clone()),
            remove: self.remove.or_else(|| base.remove.clone()),
        }
    }
}

impl<A> Default for ActionBuilders<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for ActionBuilders<A> {
    fn clone(&self) -> Self {
        Self {
            insert: self.insert.clone(),
            update: self.update.clone(),
            remove: self.remove.clone(),
        }
    }
}

impl<A> fmt::Debug for ActionBuilders<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionBuilders")
            .field("insert", &self.insert.is_some())
            .field("update", &self.update.is_some())
            .field("remove", &self.remove.is_some())
            .finish()
    }
}

/// Overrides for how each change kind reaches the sink. Unset hooks use
/// the default: build via the matching action builder, then dispatch.
pub struct PropagateHooks<A> {
    pub insert: Option<HookFn<A>>,
    pub update: Option<HookFn<A>>,
    pub delete: Option<HookFn<A>>,
}

impl<A> PropagateHooks<A> {
    pub fn new() -> Self {
        Self {
            insert: None,
            update: None,
            delete: None,
        }
    }

    pub fn get(&self, kind: ActionKind) -> Option<&HookFn<A>> {
        match kind {
            ActionKind::Insert => self.insert.as_ref(),
            ActionKind::Update => self.update.as_ref(),
            ActionKind::Remove => self.delete.as_ref(),
        }
    }

    pub fn set<F>(&mut self, kind: ActionKind, f: F)
    where
        F: Fn(&Document, &ActionBuilders<A>, &dyn Dispatch<A>) -> Result<()> + Send + Sync + 'static,
    {
        let hook: HookFn<A> = Arc::new(f);
        match kind {
            ActionKind::Insert => self.insert = Some(hook),
            ActionKind::Update => self.update = Some(hook),
            ActionKind::Remove => self.delete = Some(hook),
        }
    }

    /// Run the hook for `kind`, falling back to build-then-dispatch.
    pub fn propagate(
        &self,
        kind: ActionKind,
        doc: &Document,
        actions: &ActionBuilders<A>,
        sink: &dyn Dispatch<A>,
    ) -> Result<()> {
        match self.get(kind) {
            Some(hook) => hook(doc, actions, sink),
            None => {
                sink.dispatch(actions.build(kind, doc)?);
                Ok(())
            }
        }
    }

    /// Key-by-key overlay, same precedence as [`ActionBuilders::merge_over`].
    pub fn merge_over(self, base: &PropagateHooks<A>) -> PropagateHooks<A> {
        PropagateHooks {
            insert: self.insert.or_else(|| base.insert.clone()),
            update: self.update.or_else(|| base.update.clone()),
            delete: self.delete.or_else(|| base.delete.clone()),
        }
    }
}

impl<A> Default for PropagateHooks<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for PropagateHooks<A> {
    fn clone(&self) -> Self {
        Self {
            insert: self.insert.clone(),
            update: self.update.clone(),
            delete: self.delete.clone(),
        }
    }
}

impl<A> fmt::Debug for PropagateHooks<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropagateHooks")
            .field("insert", &self.insert.is_some())
            .field("update", &self.update.is_some())
            .field("delete", &self.delete.is_some())
            .finish()
    }
}
