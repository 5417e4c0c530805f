//! Dispatcher adapter: routes classified changes to propagate hooks.

use crate::error::Result;
use crate::paths::{ActionBuilders, PropagateHooks};
use crate::reconcile::Classification;

/// The single entry point receiving produced instructions.
pub trait Dispatch<A> {
    fn dispatch(&self, action: A);
}

impl<A, F> Dispatch<A> for F
where
    F: Fn(A),
{
    fn dispatch(&self, action: A) {
        self(action)
    }
}

/// Invoke the hook matching `classification` exactly once.
///
/// Returns `Ok(false)` for ignored changes, without touching the sink.
pub fn propagate<A>(
    classification: &Classification,
    actions: &ActionBuilders<A>,
    hooks: &PropagateHooks<A>,
    sink: &dyn Dispatch<A>,
) -> Result<bool> {
    let (kind, doc) = match (classification.kind(), classification.document()) {
        (Some(kind), Some(doc)) => (kind, doc),
        _ => return Ok(false),
    };

    hooks.propagate(kind, doc, actions, sink)?;
    Ok(true)
}
