//! Path configuration: one entry per independent feed subscription.
//!
//! A path couples a change source with an optional filter, the three
//! action builders (`insert`, `update`, `remove`), optional propagate
//! hooks and a private [`TrackedTable`].
//!
//! # Example
//!
//! ```ignore
//! let spec = PathSpec::new()
//!     .with_source(db.clone())
//!     .with_filter(|doc| !doc.is_truthy("draft"))
//!     .on_insert(|doc| Action::Insert(doc.clone()))
//!     .on_update(|doc| Action::Update(doc.clone()))
//!     .on_remove(|doc| Action::Delete(doc.id()));
//!
//! let paths = normalize(spec, &PathSpec::new())?;
//! ```

mod actions;
mod config;
mod spec;
mod tracked;

pub use actions::{ActionBuilders, ActionFn, ActionKind, HookFn, PropagateHooks};
pub use config::{normalize, PathConfig};
pub use spec::{FilterFn, PathSpec, PathSpecs};
pub use tracked::TrackedTable;
