//! Feed registry for broadcasting document changes.

use crate::source::{ChangesOptions, DropReason, FeedEvent, FeedId};
use crate::types::ChangeNotification;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Internal feed state.
struct Feed {
    options: ChangesOptions,
    sender: Sender<FeedEvent>,
}

impl Feed {
    /// Try to send a change. Returns false if the buffer is full or the
    /// receiver is gone (the feed will be dropped).
    ///
    /// The last slot of the channel is never used for changes, so the
    /// closing `Dropped` event always fits.
    fn try_send_change(&self, change: ChangeNotification) -> bool {
        if let Some(capacity) = self.sender.capacity() {
            if self.sender.len() + 1 >= capacity {
                return false;
            }
        }
        match self.sender.try_send(FeedEvent::Change { change }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Open live feeds of one store.
///
/// Not synchronized on its own: the owning store keeps it under the same
/// lock as its documents, so registration and history replay cannot race
/// with writes.
pub(crate) struct FeedRegistry {
    feeds: HashMap<FeedId, Feed>,
    next_id: u64,
}

impl FeedRegistry {
    pub(crate) fn new() -> Self {
        Self {
            feeds: HashMap::new(),
            next_id: 1,
        }
    }

    /// Create a channel sized for `backlog` replayed changes, the live
    /// buffer and one closing event, and push the backlog into it.
    ///
    /// Live feeds are registered for future broadcasts; non-live feeds
    /// end with [`DropReason::Complete`] and are never registered.
    pub(crate) fn open(
        &mut self,
        options: ChangesOptions,
        backlog: Vec<ChangeNotification>,
    ) -> (FeedId, Receiver<FeedEvent>) {
        let id = FeedId(self.next_id);
        self.next_id += 1;

        let (sender, receiver) = bounded(options.buffer_size.max(1) + backlog.len() + 1);
        for change in backlog {
            // Capacity covers the backlog, so this cannot fail.
            let _ = sender.try_send(FeedEvent::Change { change });
        }

        if options.live {
            debug!(feed = id.0, "live feed registered");
            self.feeds.insert(id, Feed { options, sender });
        } else {
            let _ = sender.try_send(FeedEvent::Dropped {
                reason: DropReason::Complete,
            });
        }

        (id, receiver)
    }

    /// Remove a feed, telling the consumer why (best effort).
    pub(crate) fn close(&mut self, id: FeedId, reason: DropReason) {
        if let Some(feed) = self.feeds.remove(&id) {
            debug!(feed = id.0, ?reason, "feed closed");
            let _ = feed.sender.try_send(FeedEvent::Dropped { reason });
        }
    }

    /// Close every feed, e.g. when the store goes away.
    pub(crate) fn close_all(&mut self, reason: DropReason) {
        let ids: Vec<FeedId> = self.feeds.keys().copied().collect();
        for id in ids {
            self.close(id, reason.clone());
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.feeds.len()
    }

    /// Send a change to every live feed. Feeds that cannot keep up are
    /// dropped.
    ///
    /// `strip` produces the body-less form for feeds opened without
    /// `include_docs`.
    pub(crate) fn broadcast<F>(&mut self, change: &ChangeNotification, strip: F)
    where
        F: Fn(&ChangeNotification) -> ChangeNotification,
    {
        let mut to_remove = Vec::new();

        for (id, feed) in self.feeds.iter() {
            let change = if feed.options.include_docs {
                change.clone()
            } else {
                strip(change)
            };
            if !feed.try_send_change(change) {
                to_remove.push(*id);
            }
        }

        for id in to_remove {
            warn!(feed = id.0, "dropping slow feed");
            self.close(id, DropReason::BufferOverflow);
        }
    }
}
