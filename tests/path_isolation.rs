//! Tests that paths keep separate tracking state and feeds.

use feedsync::{doc, ChangeSource, DocumentId, MemoryDb, Middleware, PathSpec, Turn};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

fn labelled(db: &Arc<MemoryDb>, label: &'static str) -> PathSpec<String> {
    PathSpec::new()
        .with_name(label)
        .with_source(db.clone() as Arc<dyn ChangeSource>)
        .on_insert(move |d| format!("{}:insert:{}", label, d.id().unwrap()))
        .on_update(move |d| format!("{}:update:{}", label, d.id().unwrap()))
        .on_remove(move |d| format!("{}:remove:{}", label, d.id().unwrap()))
}

fn recorder() -> (Log, impl Fn(String)) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let sink_log = Arc::clone(&log);
    (log, move |a: String| sink_log.lock().push(a))
}

#[test]
fn test_same_ids_on_different_sources() {
    let todos = Arc::new(MemoryDb::new("todos"));
    let notes = Arc::new(MemoryDb::new("notes"));
    let (log, sink) = recorder();

    let mut pump = Middleware::new(vec![labelled(&todos, "todos"), labelled(&notes, "notes")])
        .unwrap()
        .pump(sink)
        .unwrap();

    todos.put(doc(json!({"_id": "a"})).unwrap()).unwrap();
    pump.drain().unwrap();

    let id = DocumentId::from("a");
    assert!(pump.path(0).unwrap().tracked().contains(&id));
    assert!(!pump.path(1).unwrap().tracked().contains(&id));

    // First sighting on the second path is an insert, not an update.
    notes.put(doc(json!({"_id": "a"})).unwrap()).unwrap();
    pump.drain().unwrap();
    assert_eq!(
        *log.lock(),
        vec!["todos:insert:a".to_string(), "notes:insert:a".to_string()]
    );

    // Deleting on one path leaves the other tracked.
    let a = todos.get(&id).unwrap();
    todos.remove(&a).unwrap();
    pump.drain().unwrap();
    assert!(!pump.path(0).unwrap().tracked().contains(&id));
    assert!(pump.path(1).unwrap().tracked().contains(&id));
}

#[test]
fn test_two_paths_over_one_source() {
    let db = Arc::new(MemoryDb::new("shared"));
    let (log, sink) = recorder();

    let visible = labelled(&db, "visible").with_filter(|d| !d.is_truthy("hidden"));
    let everything = labelled(&db, "all");
    let mut pump = Middleware::new(vec![visible, everything])
        .unwrap()
        .pump(sink)
        .unwrap();

    db.put(doc(json!({"_id": "h", "hidden": true})).unwrap())
        .unwrap();
    db.put(doc(json!({"_id": "v"})).unwrap()).unwrap();
    assert_eq!(pump.drain().unwrap(), 4);

    let mut seen = log.lock().clone();
    seen.sort();
    assert_eq!(
        seen,
        vec!["all:insert:h", "all:insert:v", "visible:insert:v"]
    );
    assert_eq!(pump.path(0).unwrap().tracked().len(), 1);
    assert_eq!(pump.path(1).unwrap().tracked().len(), 2);
}

#[test]
fn test_per_path_order_is_preserved() {
    let first = Arc::new(MemoryDb::new("first"));
    let second = Arc::new(MemoryDb::new("second"));
    let (_, sink) = recorder();

    let mut pump = Middleware::new(vec![labelled(&first, "first"), labelled(&second, "second")])
        .unwrap()
        .pump(sink)
        .unwrap();

    for i in 0..50 {
        first.put(doc(json!({"_id": format!("f{}", i)})).unwrap()).unwrap();
        second.put(doc(json!({"_id": format!("s{}", i)})).unwrap()).unwrap();
    }

    let mut last = [0u64; 2];
    loop {
        match pump.turn(Some(std::time::Duration::ZERO)).unwrap() {
            Turn::Processed { path, seq, .. } => {
                assert!(seq.0 > last[path], "out of order on path {}", path);
                last[path] = seq.0;
            }
            Turn::Timeout => break,
            other => panic!("unexpected turn {:?}", other),
        }
    }
    assert_eq!(last, [50, 50]);
}
