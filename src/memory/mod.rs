//! In-memory document store.
//!
//! [`MemoryDb`] is a small revisioned document store with a live change
//! feed. It implements [`ChangeSource`](crate::source::ChangeSource) and is
//! what tests and demos attach the bridge to:
//! - `put`/`post`/`remove` with revision checks
//! - history replay from a sequence, latest change per document
//! - bounded live feeds; slow feeds are dropped

mod db;
mod feeds;

pub use db::{doc, MemoryDb};
