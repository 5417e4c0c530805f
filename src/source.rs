//! Change-feed collaborator interface.
//!
//! A [`ChangeSource`] is anything that can open a live change subscription:
//! an in-process store such as [`MemoryDb`](crate::memory::MemoryDb), or an
//! adapter around a remote document database. Each opened feed delivers
//! [`FeedEvent`]s over a bounded channel in feed order.

use crate::error::Result;
use crate::types::{ChangeNotification, Sequence};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Options for opening a change feed.
#[derive(Clone, Debug)]
pub struct ChangesOptions {
    /// Replay changes after this sequence before streaming live ones.
    /// Default: `Sequence(0)` (full history)
    pub since: Sequence,

    /// Keep the feed open for future changes.
    pub live: bool,

    /// Include full document bodies. When false, documents carry only
    /// their reserved fields.
    pub include_docs: bool,

    /// Max buffered events before the feed is dropped.
    /// Default: 1000
    pub buffer_size: usize,
}

impl Default for ChangesOptions {
    fn default() -> Self {
        Self {
            since: Sequence(0),
            live: false,
            include_docs: false,
            buffer_size: 1000,
        }
    }
}

impl ChangesOptions {
    /// Live feed with full documents, as the bridge consumes it.
    pub fn live_with_docs() -> Self {
        Self {
            live: true,
            include_docs: true,
            ..Default::default()
        }
    }
}

/// Unique identifier for an open feed within its source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FeedId(pub u64);

/// Events delivered on a feed.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// A document changed.
    Change { change: ChangeNotification },

    /// The source stopped delivering on this feed.
    Dropped { reason: DropReason },
}

/// Why a feed was dropped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Feed was cancelled by its consumer.
    Cancelled,
    /// Non-live feed finished replaying history.
    Complete,
    /// Source-side failure.
    Error(String),
}

/// Handle to an open feed.
pub struct ChangesFeed {
    pub id: FeedId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<FeedEvent>,
}

impl ChangesFeed {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> std::result::Result<FeedEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> std::result::Result<FeedEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> std::result::Result<FeedEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

impl fmt::Debug for ChangesFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangesFeed")
            .field("id", &self.id)
            .field("pending", &self.receiver.len())
            .finish()
    }
}

/// A provider of change feeds.
pub trait ChangeSource: Send + Sync {
    /// Open a feed. Events for changes after `options.since` arrive in
    /// sequence order.
    fn changes(&self, options: ChangesOptions) -> Result<ChangesFeed>;

    /// Stop delivering on a feed. Unknown ids are ignored.
    fn cancel(&self, id: FeedId);

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        "source"
    }
}
