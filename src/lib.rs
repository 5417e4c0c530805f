//! # Feed Sync
//!
//! Bridges live document-store change feeds into a single dispatch point.
//!
//! ## Core Concepts
//!
//! - **Paths**: Independent feed subscriptions, each with its own filter,
//!   action builders and tracking table
//! - **Reconciliation**: Each change is classified as insert, update or
//!   delete against what the path has seen before
//! - **Dispatch**: Classified changes become instructions handed to one sink
//! - **Sources**: Anything that opens a live change feed
//!
//! ## Example
//!
//! ```ignore
//! use feedsync::{Middleware, MemoryDb, PathSpec};
//!
//! let db = Arc::new(MemoryDb::new("todos"));
//!
//! let running = Middleware::new(
//!     PathSpec::new()
//!         .with_source(db.clone())
//!         .with_filter(|doc| !doc.is_truthy("hidden"))
//!         .on_insert(|doc| Action::Insert(doc.clone()))
//!         .on_update(|doc| Action::Update(doc.clone()))
//!         .on_remove(|doc| Action::Delete(doc.id())),
//! )?
//! .attach(move |action| store.dispatch(action))?;
//!
//! db.put(doc(json!({"_id": "a", "text": "pay bills"}))?)?;
//! ```

pub mod bridge;
pub mod dispatch;
pub mod error;
pub mod memory;
pub mod paths;
pub mod reconcile;
pub mod source;
pub mod types;

// Re-exports
pub use bridge::{Attached, BridgeConfig, DispatchApi, Middleware, Pump, Running, Turn};
pub use dispatch::{propagate, Dispatch};
pub use error::{Result, SyncError};
pub use memory::{doc, MemoryDb};
pub use paths::{
    normalize, ActionBuilders, ActionFn, ActionKind, FilterFn, HookFn, PathConfig, PathSpec,
    PathSpecs, PropagateHooks, TrackedTable,
};
pub use reconcile::{reconcile, Classification, IgnoreReason};
pub use source::{ChangeSource, ChangesFeed, ChangesOptions, DropReason, FeedEvent, FeedId};
pub use types::*;
