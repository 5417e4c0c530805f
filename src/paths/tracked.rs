//! Per-path table of last-observed documents.

use crate::types::{Document, DocumentId};
use std::collections::HashMap;

/// Last non-deleted snapshot seen for each document id on one path.
///
/// An id is absent if it was never observed or its latest change was a
/// deletion. Only the reconciler mutates the table.
#[derive(Clone, Debug, Default)]
pub struct TrackedTable {
    docs: HashMap<DocumentId, Document>,
}

impl TrackedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &DocumentId) -> Option<&Document> {
        self.docs.get(id)
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.docs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Store `doc` for `id`, returning the previous snapshot.
    pub(crate) fn upsert(&mut self, id: DocumentId, doc: Document) -> Option<Document> {
        self.docs.insert(id, doc)
    }

    pub(crate) fn remove(&mut self, id: &DocumentId) -> Option<Document> {
        self.docs.remove(id)
    }
}
