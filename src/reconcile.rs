//! Change classification against a path's tracking table.
//!
//! One pass per notification, no look-ahead:
//!
//! 1. Filtered out: ignored, table untouched.
//! 2. Deletion of a tracked id: removed from the table, `Delete`.
//! 3. Deletion of an untracked id: ignored, so repeated deletes never
//!    propagate twice.
//! 4. Otherwise the snapshot is stored, then `Update` if the id was
//!    already tracked and `Insert` if not.
//!
//! The filter sees the deletion marker on deletions, which lacks the
//! document's live fields. A filter that rejects on a missing field will
//! therefore also reject the deletion, leaving the id tracked.

use crate::paths::{ActionKind, FilterFn, TrackedTable};
use crate::types::{ChangeNotification, Document};
use tracing::trace;

/// Why a notification produced no propagation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The path's filter rejected the document.
    Filtered,
    /// Deletion of an id that is not tracked.
    UntrackedDelete,
}

/// Result of reconciling one notification.
#[derive(Clone, Debug, PartialEq)]
pub enum Classification {
    Insert(Document),
    Update(Document),
    Delete(Document),
    Ignored(IgnoreReason),
}

impl Classification {
    /// Action kind for propagated changes, `None` when ignored.
    pub fn kind(&self) -> Option<ActionKind> {
        match self {
            Classification::Insert(_) => Some(ActionKind::Insert),
            Classification::Update(_) => Some(ActionKind::Update),
            Classification::Delete(_) => Some(ActionKind::Remove),
            Classification::Ignored(_) => None,
        }
    }

    pub fn document(&self) -> Option<&Document> {
        match self {
            Classification::Insert(doc)
            | Classification::Update(doc)
            | Classification::Delete(doc) => Some(doc),
            Classification::Ignored(_) => None,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Classification::Ignored(_))
    }
}

/// Classify `change` and apply it to `tracked`.
///
/// The table write completes before the classification is returned.
pub fn reconcile(
    change: &ChangeNotification,
    filter: Option<&FilterFn>,
    tracked: &mut TrackedTable,
) -> Classification {
    if let Some(filter) = filter {
        if !filter(&change.doc) {
            trace!(id = %change.id, seq = %change.seq, "change filtered");
            return Classification::Ignored(IgnoreReason::Filtered);
        }
    }

    if change.deleted {
        return match tracked.remove(&change.id) {
            Some(_) => Classification::Delete(change.doc.clone()),
            None => {
                trace!(id = %change.id, seq = %change.seq, "delete of untracked document");
                Classification::Ignored(IgnoreReason::UntrackedDelete)
            }
        };
    }

    match tracked.upsert(change.id.clone(), change.doc.clone()) {
        Some(_) => Classification::Update(change.doc.clone()),
        None => Classification::Insert(change.doc.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentId, Revision, Sequence};
    use serde_json::json;
    use std::sync::Arc;

    fn upsert(seq: u64, value: serde_json::Value) -> ChangeNotification {
        ChangeNotification::upsert(Sequence(seq), Document::from_value(value).unwrap()).unwrap()
    }

    fn delete(seq: u64, id: &str) -> ChangeNotification {
        let doc = Document::tombstone(&DocumentId::from(id), &Revision("9-x".to_string()));
        ChangeNotification::deletion(Sequence(seq), doc).unwrap()
    }

    #[test]
    fn test_insert_update_delete_sequence() {
        let mut tracked = TrackedTable::new();
        let id = DocumentId::from("x");

        let first = reconcile(&upsert(1, json!({"_id": "x", "n": 1})), None, &mut tracked);
        assert!(matches!(first, Classification::Insert(_)));
        assert_eq!(tracked.get(&id).unwrap().get("n"), Some(&json!(1)));

        let second = reconcile(&upsert(2, json!({"_id": "x", "n": 2})), None, &mut tracked);
        assert!(matches!(second, Classification::Update(_)));
        assert_eq!(tracked.get(&id).unwrap().get("n"), Some(&json!(2)));

        let third = reconcile(&delete(3, "x"), None, &mut tracked);
        assert!(matches!(third, Classification::Delete(_)));
        assert!(!tracked.contains(&id));

        let fourth = reconcile(&delete(4, "x"), None, &mut tracked);
        assert_eq!(fourth, Classification::Ignored(IgnoreReason::UntrackedDelete));
        assert!(tracked.is_empty());
    }

    #[test]
    fn test_delete_of_never_seen_document_is_ignored() {
        let mut tracked = TrackedTable::new();
        let result = reconcile(&delete(1, "ghost"), None, &mut tracked);
        assert!(result.is_ignored());
        assert_eq!(result.kind(), None);
    }

    #[test]
    fn test_filter_blocks_every_kind() {
        let filter: FilterFn = Arc::new(|doc: &Document| !doc.is_truthy("flag"));
        let mut tracked = TrackedTable::new();

        let result = reconcile(
            &upsert(1, json!({"_id": "b", "flag": true})),
            Some(&filter),
            &mut tracked,
        );
        assert_eq!(result, Classification::Ignored(IgnoreReason::Filtered));
        assert!(tracked.is_empty());

        // Track a document, then filter its update out.
        reconcile(&upsert(2, json!({"_id": "c"})), Some(&filter), &mut tracked);
        let before = tracked.get(&DocumentId::from("c")).cloned();
        let result = reconcile(
            &upsert(3, json!({"_id": "c", "flag": 1})),
            Some(&filter),
            &mut tracked,
        );
        assert!(result.is_ignored());
        assert_eq!(tracked.get(&DocumentId::from("c")).cloned(), before);
    }

    #[test]
    fn test_filter_sees_deletion_marker() {
        // Requires a field the tombstone does not carry.
        let filter: FilterFn = Arc::new(|doc: &Document| doc.get("text").is_some());
        let mut tracked = TrackedTable::new();

        reconcile(&upsert(1, json!({"_id": "a", "text": "hi"})), Some(&filter), &mut tracked);
        let result = reconcile(&delete(2, "a"), Some(&filter), &mut tracked);

        assert_eq!(result, Classification::Ignored(IgnoreReason::Filtered));
        assert!(tracked.contains(&DocumentId::from("a")));
    }

    #[test]
    fn test_update_carries_new_snapshot() {
        let mut tracked = TrackedTable::new();
        reconcile(&upsert(1, json!({"_id": "a", "text": "pay bills"})), None, &mut tracked);
        let result = reconcile(
            &upsert(2, json!({"_id": "a", "text": "wash dishes"})),
            None,
            &mut tracked,
        );

        let doc = result.document().unwrap();
        assert_eq!(doc.get("text"), Some(&json!("wash dishes")));
    }
}
