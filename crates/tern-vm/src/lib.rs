//! Goroutine scheduling and deferred cleanup on top of `tern-runtime`.
//!
//! Goroutines are futures multiplexed onto the calling thread by
//! [`Scheduler`]. Channel operations and `select` from `tern-runtime` are
//! their suspension points; [`sleep`] and [`after`] add timers.

pub mod config;
pub mod defer;
pub mod error;
pub mod fiber;
pub mod goroutine;
pub mod scheduler;
pub mod time;

pub use config::{PanicPolicy, RuntimeConfig};
pub use defer::{with_async_defers, with_defers, AsyncDeferStack, DeferStack, Unwinding};
pub use error::VmError;
pub use fiber::{FiberId, FiberStatus};
pub use goroutine::{go, yield_now, YieldNow};
pub use scheduler::{block_on, is_running, Scheduler, MAIN_GOID};
pub use time::{after, sleep, Sleep};
