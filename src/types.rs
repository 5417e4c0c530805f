//! Core types for documents and change notifications.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// Reserved document field holding the identifier.
pub const ID_FIELD: &str = "_id";
/// Reserved document field holding the revision.
pub const REV_FIELD: &str = "_rev";
/// Reserved document field marking a deletion.
pub const DELETED_FIELD: &str = "_deleted";

/// Identifier of a document within one store.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        DocumentId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        DocumentId(s.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        DocumentId(s)
    }
}

/// Position in a store's change feed.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Sequence(pub u64);

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq({})", self.0)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Sequence {
    pub fn next(self) -> Self {
        Sequence(self.0.saturating_add(1))
    }
}

/// Document revision in `<generation>-<digest>` form.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(pub String);

impl Revision {
    /// Compute the revision following `previous` for the given body.
    pub fn next(previous: Option<&Revision>, body: &Map<String, Value>) -> Self {
        let generation = previous.and_then(Revision::generation).unwrap_or(0) + 1;
        let mut hasher = Sha256::new();
        hasher.update(generation.to_be_bytes());
        // Map serialization cannot fail: keys are strings and values are JSON.
        hasher.update(serde_json::to_vec(body).unwrap_or_default());
        let digest = hasher.finalize();
        Revision(format!("{}-{}", generation, &hex::encode(digest)[..16]))
    }

    /// Generation number (the part before the dash).
    pub fn generation(&self) -> Option<u64> {
        self.0.split_once('-').and_then(|(g, _)| g.parse().ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rev({})", self.0)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A JSON document with reserved `_id`, `_rev` and `_deleted` fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(pub Map<String, Value>);

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from a JSON value. Non-objects are rejected.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Document(map)),
            _ => None,
        }
    }

    /// Deletion marker for `id` at `rev`.
    pub fn tombstone(id: &DocumentId, rev: &Revision) -> Self {
        let mut map = Map::new();
        map.insert(ID_FIELD.to_string(), Value::String(id.0.clone()));
        map.insert(REV_FIELD.to_string(), Value::String(rev.0.clone()));
        map.insert(DELETED_FIELD.to_string(), Value::Bool(true));
        Document(map)
    }

    pub fn id(&self) -> Option<DocumentId> {
        self.0
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .map(DocumentId::from)
    }

    pub fn rev(&self) -> Option<Revision> {
        self.0
            .get(REV_FIELD)
            .and_then(Value::as_str)
            .map(|r| Revision(r.to_string()))
    }

    pub fn is_deleted(&self) -> bool {
        self.0
            .get(DELETED_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Truthiness of a field: absent, null, false, 0 and "" are falsy.
    pub fn is_truthy(&self, field: &str) -> bool {
        match self.0.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map_or(true, |v| v != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Builder-style variant of [`Document::set`].
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Body without reserved fields.
    pub fn body(&self) -> Map<String, Value> {
        self.0
            .iter()
            .filter(|(k, _)| !k.starts_with('_'))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// A single change emitted by a feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotification {
    /// Feed position of this change.
    pub seq: Sequence,

    /// Identifier of the changed document.
    pub id: DocumentId,

    /// Current snapshot, or the deletion marker.
    pub doc: Document,

    /// True when the change removed the document.
    pub deleted: bool,
}

impl ChangeNotification {
    /// Notification for a live (inserted or updated) document.
    pub fn upsert(seq: Sequence, doc: Document) -> Option<Self> {
        let id = doc.id()?;
        Some(Self {
            seq,
            id,
            doc,
            deleted: false,
        })
    }

    /// Notification for a deletion.
    pub fn deletion(seq: Sequence, doc: Document) -> Option<Self> {
        let id = doc.id()?;
        Some(Self {
            seq,
            id,
            doc,
            deleted: true,
        })
    }
}
