//! Goroutine slots and their wakers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Wake, Waker};

use parking_lot::Mutex;
use tern_runtime::RtResult;

/// A spawned goroutine body.
pub type GoFuture = Pin<Box<dyn Future<Output = RtResult<()>>>>;

/// Identifies a schedulable activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FiberId {
    /// The activation passed to `block_on`.
    Main,
    /// Index into the scheduler's fiber slots.
    Go(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiberStatus {
    /// In the ready queue.
    Ready,
    /// Being polled.
    Running,
    /// Waiting for a wake-up.
    Suspended,
    Dead,
}

/// Wake-ups recorded by wakers, drained by the scheduler between polls.
/// The generation tells a stale waker from one belonging to the slot's
/// current occupant.
pub(crate) type WakeQueue = Arc<Mutex<Vec<(FiberId, u32)>>>;

pub(crate) struct FiberWaker {
    id: FiberId,
    generation: u32,
    queue: WakeQueue,
}

impl FiberWaker {
    pub(crate) fn waker(id: FiberId, generation: u32, queue: &WakeQueue) -> Waker {
        Waker::from(Arc::new(FiberWaker { id, generation, queue: queue.clone() }))
    }
}

impl Wake for FiberWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.queue.lock().push((self.id, self.generation));
    }
}

pub struct Fiber {
    /// Goroutine number as reported in diagnostics. Main is 1.
    pub goid: u64,
    pub status: FiberStatus,
    pub generation: u32,
    pub(crate) future: Option<GoFuture>,
    pub(crate) waker: Waker,
}

impl Fiber {
    pub(crate) fn new(goid: u64, future: GoFuture, waker: Waker) -> Self {
        Fiber { goid, status: FiberStatus::Ready, generation: 0, future: Some(future), waker }
    }

    /// Reuse a dead slot for a new goroutine.
    pub(crate) fn reset(&mut self, goid: u64, future: GoFuture, waker: Waker) {
        self.goid = goid;
        self.status = FiberStatus::Ready;
        self.future = Some(future);
        self.waker = waker;
    }

    /// Mark dead and invalidate wakers handed out so far.
    pub(crate) fn kill(&mut self) -> Option<GoFuture> {
        self.status = FiberStatus::Dead;
        self.generation = self.generation.wrapping_add(1);
        self.future.take()
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.status == FiberStatus::Dead
    }
}

impl std::fmt::Debug for Fiber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fiber")
            .field("goid", &self.goid)
            .field("status", &self.status)
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waker_records_generation() {
        let queue: WakeQueue = Arc::new(Mutex::new(Vec::new()));
        let waker = FiberWaker::waker(FiberId::Go(3), 7, &queue);
        waker.wake_by_ref();
        waker.wake();
        assert_eq!(*queue.lock(), vec![(FiberId::Go(3), 7), (FiberId::Go(3), 7)]);
    }

    #[test]
    fn test_kill_bumps_generation() {
        let queue: WakeQueue = Arc::new(Mutex::new(Vec::new()));
        let waker = FiberWaker::waker(FiberId::Go(0), 0, &queue);
        let mut fiber = Fiber::new(2, Box::pin(async { Ok::<(), tern_runtime::Panic>(()) }), waker);
        assert!(fiber.kill().is_some());
        assert!(fiber.is_dead());
        assert_eq!(fiber.generation, 1);
        assert!(fiber.kill().is_none());
    }
}
