//! Subscription management: one live feed per path, one consumer for all.
//!
//! [`Middleware`] validates the path specs, then either hands back a
//! [`Pump`] for the caller to drive or runs it on a worker thread.
//!
//! # Example
//!
//! ```ignore
//! let running = Middleware::new(vec![todos, projects])?
//!     .attach(move |action| store.dispatch(action))?;
//!
//! // ... later
//! running.stop()?;
//! ```

mod middleware;
mod pump;

pub use middleware::{Attached, BridgeConfig, DispatchApi, Middleware, Running};
pub use pump::{Pump, Turn};
