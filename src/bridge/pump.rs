//! Single-consumer event loop over all path feeds.

use super::middleware::BridgeConfig;
use crate::dispatch::Dispatch;
use crate::error::Result;
use crate::paths::PathConfig;
use crate::reconcile::Classification;
use crate::source::{ChangesFeed, ChangesOptions, DropReason, FeedEvent};
use crate::types::Sequence;
use crossbeam_channel::{Receiver, RecvError, Select};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, warn};

/// One path and its open feed.
struct Lane<A> {
    config: PathConfig<A>,
    feed: ChangesFeed,
    open: bool,
}

/// What a call to [`Pump::turn`] did.
#[derive(Debug)]
pub enum Turn {
    /// A notification was reconciled and, unless ignored, propagated.
    Processed {
        path: usize,
        seq: Sequence,
        classification: Classification,
    },
    /// A feed ended; `reason` is `None` when its channel disconnected.
    FeedClosed {
        path: usize,
        reason: Option<DropReason>,
    },
    /// Nothing arrived within the timeout.
    Timeout,
    /// A stop signal was received.
    Stopped,
    /// No feed is open any more.
    Idle,
}

enum Selected {
    Control(std::result::Result<(), RecvError>),
    Lane(usize, std::result::Result<FeedEvent, RecvError>),
    Timeout,
    Idle,
}

/// Multiplexes the feeds of every path onto one consumer.
///
/// Notifications are handled one at a time: reconcile, then propagate,
/// before the next is taken. Within a path this follows feed order; across
/// paths no order is implied. A feed that closes retires only its own
/// path.
pub struct Pump<A, D> {
    lanes: Vec<Lane<A>>,
    sink: D,
    control: Option<Receiver<()>>,
}

impl<A, D> Pump<A, D>
where
    D: Dispatch<A>,
{
    /// Open one live, full-document feed per path.
    ///
    /// All or nothing: if any feed fails to open, those already opened are
    /// cancelled and the error is returned.
    pub fn open(paths: Vec<PathConfig<A>>, sink: D, config: &BridgeConfig) -> Result<Self> {
        let mut lanes: Vec<Lane<A>> = Vec::with_capacity(paths.len());

        for path in paths {
            let options = ChangesOptions {
                since: config.since,
                buffer_size: config.buffer_size,
                ..ChangesOptions::live_with_docs()
            };
            match path.source().changes(options) {
                Ok(feed) => {
                    debug!(path = path.name(), source = path.source().name(), "feed opened");
                    lanes.push(Lane {
                        config: path,
                        feed,
                        open: true,
                    });
                }
                Err(e) => {
                    error!(path = path.name(), error = %e, "failed to open feed");
                    for lane in &lanes {
                        lane.config.source().cancel(lane.feed.id);
                    }
                    return Err(e);
                }
            }
        }

        Ok(Self {
            lanes,
            sink,
            control: None,
        })
    }

    /// Stop the loop when a message arrives on `control`.
    pub(crate) fn with_control(mut self, control: Receiver<()>) -> Self {
        self.control = Some(control);
        self
    }

    /// Wait for one event and handle it. `None` waits indefinitely.
    pub fn turn(&mut self, timeout: Option<Duration>) -> Result<Turn> {
        match self.select(timeout) {
            Selected::Idle => Ok(Turn::Idle),
            Selected::Timeout => Ok(Turn::Timeout),
            Selected::Control(Ok(())) => Ok(Turn::Stopped),
            Selected::Control(Err(_)) => {
                // Handle dropped without stopping: keep running detached.
                self.control = None;
                self.turn(timeout)
            }
            Selected::Lane(index, Ok(FeedEvent::Change { change })) => {
                let lane = &mut self.lanes[index];
                let classification = lane.config.reconcile(&change);
                debug!(
                    path = lane.config.name(),
                    id = %change.id,
                    seq = %change.seq,
                    kind = ?classification.kind(),
                    "change reconciled"
                );

                if let Err(e) = lane.config.propagate(&classification, &self.sink) {
                    error!(
                        path = lane.config.name(),
                        id = %change.id,
                        error = %e,
                        "propagation failed"
                    );
                    return Err(e);
                }

                Ok(Turn::Processed {
                    path: index,
                    seq: change.seq,
                    classification,
                })
            }
            Selected::Lane(index, Ok(FeedEvent::Dropped { reason })) => {
                let lane = &mut self.lanes[index];
                lane.open = false;
                warn!(path = lane.config.name(), ?reason, "feed dropped");
                Ok(Turn::FeedClosed {
                    path: index,
                    reason: Some(reason),
                })
            }
            Selected::Lane(index, Err(_)) => {
                let lane = &mut self.lanes[index];
                lane.open = false;
                warn!(path = lane.config.name(), "feed disconnected");
                Ok(Turn::FeedClosed {
                    path: index,
                    reason: None,
                })
            }
        }
    }

    /// Handle events until stopped or every feed has closed. A propagation
    /// error ends the loop and is returned; feeds are cancelled either way.
    pub fn run(&mut self) -> Result<()> {
        loop {
            match self.turn(None) {
                Ok(Turn::Stopped) | Ok(Turn::Idle) => {
                    self.shutdown();
                    return Ok(());
                }
                Ok(_) => continue,
                Err(e) => {
                    self.shutdown();
                    return Err(e);
                }
            }
        }
    }

    /// Handle everything already queued, without blocking.
    pub fn drain(&mut self) -> Result<usize> {
        let mut handled = 0;
        loop {
            match self.turn(Some(Duration::ZERO))? {
                Turn::Timeout | Turn::Idle | Turn::Stopped => return Ok(handled),
                _ => handled += 1,
            }
        }
    }

    fn select(&self, timeout: Option<Duration>) -> Selected {
        let mut sel = Select::new();
        let mut lanes = Vec::new();
        for (index, lane) in self.lanes.iter().enumerate() {
            if lane.open {
                sel.recv(&lane.feed.receiver);
                lanes.push(index);
            }
        }
        if lanes.is_empty() {
            return Selected::Idle;
        }
        let control_op = self.control.as_ref().map(|rx| sel.recv(rx));

        let oper = match timeout {
            Some(t) => match sel.select_timeout(t) {
                Ok(oper) => oper,
                Err(_) => return Selected::Timeout,
            },
            None => sel.select(),
        };

        let op = oper.index();
        if let (Some(control_op), Some(rx)) = (control_op, self.control.as_ref()) {
            if op == control_op {
                return Selected::Control(oper.recv(rx));
            }
        }

        let index = lanes[op];
        Selected::Lane(index, oper.recv(&self.lanes[index].feed.receiver))
    }
}

impl<A, D> Pump<A, D> {
    pub fn path(&self, index: usize) -> Option<&PathConfig<A>> {
        self.lanes.get(index).map(|lane| &lane.config)
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathConfig<A>> {
        self.lanes.iter().map(|lane| &lane.config)
    }

    /// Number of feeds still delivering.
    pub fn open_feeds(&self) -> usize {
        self.lanes.iter().filter(|lane| lane.open).count()
    }

    /// Cancel every feed that is still open.
    pub fn shutdown(&mut self) {
        for lane in self.lanes.iter_mut().filter(|lane| lane.open) {
            lane.config.source().cancel(lane.feed.id);
            lane.open = false;
            debug!(path = lane.config.name(), "feed cancelled");
        }
    }
}

impl<A, D> Drop for Pump<A, D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<A, D> fmt::Debug for Pump<A, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pump")
            .field("paths", &self.lanes.len())
            .field("open_feeds", &self.open_feeds())
            .finish()
    }
}
