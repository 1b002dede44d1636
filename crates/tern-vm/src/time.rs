//! Timers: `time.Sleep` and `time.After`.

use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tern_runtime::reflect::basic;
use tern_runtime::{Channel, Kind, Panic, RtResult};

use crate::scheduler::{self, TimerAction};

/// Suspend the calling goroutine for at least `duration`.
pub fn sleep(duration: Duration) -> Sleep {
    Sleep { deadline: Instant::now() + duration, timer: None }
}

#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Sleep {
    deadline: Instant,
    timer: Option<Rc<Cell<bool>>>,
}

impl Sleep {
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if Instant::now() >= self.deadline {
            return Poll::Ready(());
        }
        if self.timer.is_none() {
            match scheduler::current() {
                Some(shared) => {
                    let timer = shared.add_timer(self.deadline, TimerAction::Wake(cx.waker().clone()));
                    self.timer = Some(timer);
                }
                // No timer heap to register with: poll again.
                None => cx.waker().wake_by_ref(),
            }
        }
        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some(timer) = &self.timer {
            timer.set(false);
        }
    }
}

/// A receive-only channel that yields the current Unix time in nanoseconds
/// once `duration` has elapsed. Use it as a timeout case in a select.
pub fn after(duration: Duration) -> RtResult<Channel> {
    let shared = scheduler::current().ok_or_else(|| Panic::new("time.After: no scheduler is running on this thread"))?;
    let chan = Channel::new(&basic(Kind::Int64), 1)?;
    shared.add_timer(Instant::now() + duration, TimerAction::Deliver(chan.clone()));
    Ok(chan.as_recv_only())
}
