//! `go` statements and cooperative yields.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tern_runtime::{Panic, RtResult};

use crate::scheduler;

/// Start `future` as a new goroutine on the scheduler running this thread.
/// It first runs after the caller next suspends.
pub fn go<F>(future: F) -> RtResult<()>
where
    F: Future<Output = RtResult<()>> + 'static,
{
    match scheduler::current() {
        Some(shared) => {
            shared.spawn(Box::pin(future));
            Ok(())
        }
        None => Err(Panic::new("go: no scheduler is running on this thread")),
    }
}

/// Let every other ready goroutine run once before continuing.
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_go_outside_scheduler_faults() {
        let err = go(async { Ok::<(), Panic>(()) }).unwrap_err();
        assert!(err.message().contains("no scheduler"));
    }
}
