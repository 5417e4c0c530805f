//! Middleware entry point: validate paths, attach feeds, run the pump.

use super::pump::Pump;
use crate::dispatch::Dispatch;
use crate::error::{Result, SyncError};
use crate::paths::{normalize, PathConfig, PathSpec, PathSpecs};
use crate::types::Sequence;
use crossbeam_channel::{bounded, Sender};
use std::fmt;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Bridge configuration.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Max buffered notifications per feed before the source drops it.
    /// Default: 1000
    pub buffer_size: usize,

    /// Feed position to start from. Default: `Sequence(0)` (full history)
    pub since: Sequence,

    /// Name of the worker thread spawned by [`Middleware::attach`].
    pub worker_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            since: Sequence(0),
            worker_name: "feedsync-pump".to_string(),
        }
    }
}

/// Something that hands out its dispatch capability, e.g. a state store.
pub trait DispatchApi<A> {
    type Sink: Dispatch<A> + Send + 'static;

    fn dispatcher(&self) -> Self::Sink;
}

/// Validated set of paths, ready to attach to a dispatch sink.
///
/// Construction checks every path; no feed is opened until
/// [`attach`](Middleware::attach), [`apply`](Middleware::apply) or
/// [`pump`](Middleware::pump).
pub struct Middleware<A> {
    paths: Vec<PathConfig<A>>,
    config: BridgeConfig,
}

impl<A: 'static> Middleware<A> {
    /// Build from one spec or a list of specs, over the default template.
    pub fn new(specs: impl Into<PathSpecs<A>>) -> Result<Self> {
        Self::with_template(specs, &PathSpec::new())
    }

    /// Build with a caller-supplied template merged under every spec.
    pub fn with_template(specs: impl Into<PathSpecs<A>>, template: &PathSpec<A>) -> Result<Self> {
        let paths = normalize(specs, template)?;
        debug!(paths = paths.len(), "middleware configured");
        Ok(Self {
            paths,
            config: BridgeConfig::default(),
        })
    }

    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn paths(&self) -> &[PathConfig<A>] {
        &self.paths
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Open every feed and return the pump for the caller to drive.
    pub fn pump<D: Dispatch<A>>(self, sink: D) -> Result<Pump<A, D>> {
        Pump::open(self.paths, sink, &self.config)
    }

    /// Open every feed and run the pump on a dedicated thread.
    ///
    /// Feed opening happens before this returns, so setup failures are
    /// reported here and no thread is left behind.
    pub fn attach<D>(self, sink: D) -> Result<Running>
    where
        D: Dispatch<A> + Send + 'static,
    {
        let worker_name = self.config.worker_name.clone();
        let (control, control_rx) = bounded(1);
        let mut pump = Pump::open(self.paths, sink, &self.config)?.with_control(control_rx);
        let paths = pump.open_feeds();

        let handle = thread::Builder::new()
            .name(worker_name.clone())
            .spawn(move || {
                let result = pump.run();
                if let Err(e) = &result {
                    error!(error = %e, "pump stopped on error");
                }
                result
            })?;

        info!(worker = %worker_name, paths, "bridge attached");
        Ok(Running {
            control,
            handle: Some(handle),
            worker_name,
        })
    }

    /// Attach to `api`'s dispatcher and return the pass-through
    /// continuation used when composing middleware.
    pub fn apply<S>(self, api: &S) -> Result<Attached>
    where
        S: DispatchApi<A>,
    {
        let running = self.attach(api.dispatcher())?;
        Ok(Attached { running })
    }
}

impl<A> fmt::Debug for Middleware<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware")
            .field("paths", &self.paths)
            .field("config", &self.config)
            .finish()
    }
}

/// Handle to a pump running on its own thread.
///
/// Dropping the handle leaves the worker running for the rest of the
/// process; use [`stop`](Running::stop) to tear it down.
pub struct Running {
    control: Sender<()>,
    handle: Option<JoinHandle<Result<()>>>,
    worker_name: String,
}

impl Running {
    pub fn worker_name(&self) -> &str {
        &self.worker_name
    }

    /// True once the worker has returned (stopped, idle or failed).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Signal the worker, cancel its feeds and wait for it.
    pub fn stop(self) -> Result<()> {
        // Fails only when the worker is already gone.
        let _ = self.control.try_send(());
        self.join()
    }

    /// Wait for the worker to return on its own, surfacing its error.
    pub fn join(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| SyncError::WorkerPanicked)?,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Running {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Running")
            .field("worker", &self.worker_name)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Result of [`Middleware::apply`]: the running bridge plus the
/// pass-through continuation.
#[derive(Debug)]
pub struct Attached {
    running: Running,
}

impl Attached {
    /// The continuation: hands `next` back unchanged.
    pub fn wrap<N>(&self, next: N) -> N {
        next
    }

    pub fn running(&self) -> &Running {
        &self.running
    }

    pub fn into_running(self) -> Running {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{doc, MemoryDb};
    use crate::source::ChangeSource;
    use crossbeam_channel::{unbounded, Receiver};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn spec(db: &Arc<MemoryDb>) -> PathSpec<String> {
        PathSpec::new()
            .with_source(db.clone())
            .on_insert(|d| format!("insert:{}", d.id().unwrap()))
            .on_update(|d| format!("update:{}", d.id().unwrap()))
            .on_remove(|d| format!("remove:{}", d.id().unwrap()))
    }

    fn channel_sink() -> (impl Fn(String) + Send + 'static, Receiver<String>) {
        let (tx, rx) = unbounded();
        (move |a: String| {
            let _ = tx.send(a);
        }, rx)
    }

    #[test]
    fn test_setup_errors_before_any_feed() {
        let db = Arc::new(MemoryDb::new("todos"));
        let specs = vec![spec(&db), PathSpec::new()];

        let err = Middleware::new(specs).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(db.feed_count(), 0);
    }

    #[test]
    fn test_attach_and_stop() {
        let db = Arc::new(MemoryDb::new("todos"));
        let (sink, rx) = channel_sink();
        let running = Middleware::new(spec(&db)).unwrap().attach(sink).unwrap();
        assert_eq!(db.feed_count(), 1);

        db.put(doc(json!({"_id": "a"})).unwrap()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "insert:a");

        running.stop().unwrap();
        assert_eq!(db.feed_count(), 0);
    }

    #[test]
    fn test_worker_error_surfaces_on_join() {
        let db = Arc::new(MemoryDb::new("todos"));
        let insert_only = PathSpec::new()
            .with_source(db.clone() as Arc<dyn ChangeSource>)
            .on_insert(|d| format!("insert:{}", d.id().unwrap()));
        let (sink, rx) = channel_sink();
        let running = Middleware::new(insert_only).unwrap().attach(sink).unwrap();

        db.put(doc(json!({"_id": "a"})).unwrap()).unwrap();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let current = db.get(&"a".into()).unwrap();
        db.remove(&current).unwrap();

        let err = running.join().unwrap_err();
        assert!(matches!(err, SyncError::UnconfiguredAction(_)));
    }

    struct Store {
        tx: Sender<String>,
    }

    impl DispatchApi<String> for Store {
        type Sink = Box<dyn Fn(String) + Send>;

        fn dispatcher(&self) -> Self::Sink {
            let tx = self.tx.clone();
            Box::new(move |a| {
                let _ = tx.send(a);
            })
        }
    }

    #[test]
    fn test_apply_returns_pass_through() {
        let db = Arc::new(MemoryDb::new("todos"));
        let (tx, rx) = unbounded();
        let store = Store { tx };

        let attached = Middleware::new(spec(&db))
            .unwrap()
            .with_config(BridgeConfig {
                worker_name: "todos-pump".to_string(),
                ..Default::default()
            })
            .apply(&store)
            .unwrap();

        let next = |x: u32| x + 1;
        assert_eq!(attached.wrap(next)(1), 2);
        assert_eq!(attached.running().worker_name(), "todos-pump");

        db.put(doc(json!({"_id": "z"})).unwrap()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), "insert:z");
        attached.into_running().stop().unwrap();
    }
}
