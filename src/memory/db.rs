//! In-process document store with a change feed.

use super::feeds::FeedRegistry;
use crate::error::{Result, SyncError};
use crate::source::{ChangeSource, ChangesFeed, ChangesOptions, DropReason, FeedId};
use crate::types::{
    ChangeNotification, Document, DocumentId, Revision, Sequence, DELETED_FIELD, ID_FIELD,
    REV_FIELD,
};
use parking_lot::RwLock;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Latest state of one document.
struct Entry {
    rev: Revision,
    seq: Sequence,
    /// Stored form, reserved fields included. Tombstone when deleted.
    doc: Document,
    deleted: bool,
}

impl Entry {
    fn notification(&self, id: &DocumentId, include_docs: bool) -> ChangeNotification {
        let doc = if include_docs {
            self.doc.clone()
        } else {
            stub(id, &self.rev, self.deleted)
        };
        ChangeNotification {
            seq: self.seq,
            id: id.clone(),
            doc,
            deleted: self.deleted,
        }
    }
}

/// Reserved fields only.
fn stub(id: &DocumentId, rev: &Revision, deleted: bool) -> Document {
    if deleted {
        return Document::tombstone(id, rev);
    }
    Document::new()
        .with(ID_FIELD, id.as_str())
        .with(REV_FIELD, rev.as_str())
}

struct DbState {
    docs: HashMap<DocumentId, Entry>,
    /// Latest sequence of each document; older ones are removed.
    log: BTreeMap<Sequence, DocumentId>,
    update_seq: Sequence,
    feeds: FeedRegistry,
}

impl DbState {
    /// Record a new revision of `id` and broadcast it.
    fn commit(&mut self, id: DocumentId, mut doc: Document, deleted: bool) -> Revision {
        let previous = self.docs.get(&id).map(|e| e.rev.clone());
        let rev = Revision::next(previous.as_ref(), &doc.body());
        let seq = self.update_seq.next();
        self.update_seq = seq;

        let doc = if deleted {
            Document::tombstone(&id, &rev)
        } else {
            doc.set(ID_FIELD, id.as_str());
            doc.set(REV_FIELD, rev.as_str());
            doc.0.remove(DELETED_FIELD);
            doc
        };

        let entry = Entry {
            rev: rev.clone(),
            seq,
            doc,
            deleted,
        };
        if let Some(old) = self.docs.insert(id.clone(), entry) {
            self.log.remove(&old.seq);
        }
        self.log.insert(seq, id.clone());
        debug!(%id, %seq, %rev, deleted, "document committed");

        if let Some(entry) = self.docs.get(&id) {
            let change = entry.notification(&id, true);
            self.feeds.broadcast(&change, |c| ChangeNotification {
                doc: stub(&c.id, &entry.rev, c.deleted),
                ..c.clone()
            });
        }

        rev
    }

    /// Live entry for `id`, if any.
    fn live(&self, id: &DocumentId) -> Option<&Entry> {
        self.docs.get(id).filter(|e| !e.deleted)
    }

    /// Reject writes whose `_rev` does not match the live revision.
    fn check_rev(&self, id: &DocumentId, given: Option<Revision>) -> Result<()> {
        let current = self.live(id).map(|e| e.rev.clone());
        match (&current, &given) {
            (None, _) => Ok(()),
            (Some(cur), Some(got)) if cur == got => Ok(()),
            _ => Err(SyncError::Conflict {
                id: id.clone(),
                expected: current,
                got: given,
            }),
        }
    }
}

/// An in-memory document store exposing a live change feed.
///
/// Every write gets the next sequence number and a new revision. Writes to
/// an existing document must carry its current `_rev`.
pub struct MemoryDb {
    name: String,
    state: RwLock<DbState>,
}

impl MemoryDb {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(DbState {
                docs: HashMap::new(),
                log: BTreeMap::new(),
                update_seq: Sequence(0),
                feeds: FeedRegistry::new(),
            }),
        }
    }

    /// Create or update a document identified by its `_id`.
    pub fn put(&self, doc: Document) -> Result<Revision> {
        let id = doc
            .id()
            .ok_or_else(|| SyncError::InvalidDocument("missing _id".to_string()))?;
        if doc.is_deleted() {
            return self.remove(&doc);
        }

        let mut state = self.state.write();
        state.check_rev(&id, doc.rev())?;
        Ok(state.commit(id, doc, false))
    }

    /// Create a document, generating an `_id` when it has none.
    pub fn post(&self, mut doc: Document) -> Result<(DocumentId, Revision)> {
        let id = match doc.id() {
            Some(id) => id,
            None => {
                let id = self.generate_id();
                doc.set(ID_FIELD, id.as_str());
                id
            }
        };
        let rev = self.put(doc)?;
        Ok((id, rev))
    }

    /// Current version of a live document.
    pub fn get(&self, id: &DocumentId) -> Result<Document> {
        self.state
            .read()
            .live(id)
            .map(|e| e.doc.clone())
            .ok_or_else(|| SyncError::DocumentNotFound(id.clone()))
    }

    /// Delete a document. `doc` must carry the current `_rev`.
    pub fn remove(&self, doc: &Document) -> Result<Revision> {
        let id = doc
            .id()
            .ok_or_else(|| SyncError::InvalidDocument("missing _id".to_string()))?;

        let mut state = self.state.write();
        if state.live(&id).is_none() {
            return Err(SyncError::DocumentNotFound(id));
        }
        state.check_rev(&id, doc.rev())?;
        Ok(state.commit(id, Document::new(), true))
    }

    /// Sequence of the latest write.
    pub fn update_seq(&self) -> Sequence {
        self.state.read().update_seq
    }

    /// Number of live documents.
    pub fn doc_count(&self) -> usize {
        self.state.read().docs.values().filter(|e| !e.deleted).count()
    }

    /// Number of open live feeds.
    pub fn feed_count(&self) -> usize {
        self.state.read().feeds.len()
    }

    /// Close every live feed with [`DropReason::Error`].
    pub fn fail_feeds(&self, reason: impl Into<String>) {
        self.state
            .write()
            .feeds
            .close_all(DropReason::Error(reason.into()));
    }

    fn generate_id(&self) -> DocumentId {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update(self.update_seq().next().0.to_be_bytes());
        hasher.update(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
                .to_be_bytes(),
        );
        DocumentId(hex::encode(&hasher.finalize()[..8]))
    }
}

impl ChangeSource for MemoryDb {
    fn changes(&self, options: ChangesOptions) -> Result<ChangesFeed> {
        let mut state = self.state.write();

        let backlog: Vec<ChangeNotification> = state
            .log
            .range(options.since.next()..)
            .filter_map(|(_, id)| {
                state
                    .docs
                    .get(id)
                    .map(|entry| entry.notification(id, options.include_docs))
            })
            .collect();

        debug!(
            db = %self.name,
            since = %options.since,
            backlog = backlog.len(),
            live = options.live,
            "opening changes feed"
        );
        let (id, receiver) = state.feeds.open(options, backlog);
        Ok(ChangesFeed { id, receiver })
    }

    fn cancel(&self, id: FeedId) {
        self.state.write().feeds.close(id, DropReason::Cancelled);
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for MemoryDb {
    fn drop(&mut self) {
        self.state.get_mut().feeds.close_all(DropReason::Cancelled);
    }
}

impl std::fmt::Debug for MemoryDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("MemoryDb")
            .field("name", &self.name)
            .field("update_seq", &state.update_seq)
            .field("docs", &state.docs.len())
            .field("feeds", &state.feeds.len())
            .finish()
    }
}

/// Convenience: build a document from a JSON object literal or any value
/// that serializes to a JSON object.
pub fn doc<T: Serialize>(value: T) -> Result<Document> {
    let value = serde_json::to_value(value)?;
    Document::from_value(value)
        .ok_or_else(|| SyncError::InvalidDocument("expected a JSON object".to_string()))
}
