//! Cooperative scheduler for goroutines.
//!
//! Everything runs on the thread that called [`Scheduler::block_on`]. A
//! goroutine only gives up control at an `.await` that returns `Pending`;
//! its waker records the wake-up and the scheduler requeues it once the
//! current poll has returned.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::future::Future;
use std::pin::pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tern_runtime::{Channel, RtResult, Value};

use crate::config::{PanicPolicy, RuntimeConfig};
use crate::error::VmError;
use crate::fiber::{Fiber, FiberId, FiberStatus, FiberWaker, GoFuture, WakeQueue};

const DEADLOCK: &str = "all goroutines are asleep - deadlock!";

/// Goroutine number of the main activation.
pub const MAIN_GOID: u64 = 1;

pub(crate) enum TimerAction {
    Wake(Waker),
    /// Send the current time on a capacity-1 channel.
    Deliver(Channel),
}

struct Timer {
    deadline: Instant,
    seq: u64,
    live: Rc<Cell<bool>>,
    action: TimerAction,
}

// Reversed so the std max-heap pops the earliest deadline first.
impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        other.deadline.cmp(&self.deadline).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Timer {}

/// State reachable from inside a running goroutine.
#[derive(Default)]
pub(crate) struct Shared {
    spawned: RefCell<Vec<GoFuture>>,
    timers: RefCell<BinaryHeap<Timer>>,
    timer_seq: Cell<u64>,
}

impl Shared {
    pub(crate) fn spawn(&self, future: GoFuture) {
        self.spawned.borrow_mut().push(future);
    }

    /// Register a timer. Clearing the returned flag cancels it.
    pub(crate) fn add_timer(&self, deadline: Instant, action: TimerAction) -> Rc<Cell<bool>> {
        let live = Rc::new(Cell::new(true));
        let seq = self.timer_seq.get();
        self.timer_seq.set(seq + 1);
        self.timers.borrow_mut().push(Timer { deadline, seq, live: live.clone(), action });
        live
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Rc<Shared>>> = const { RefCell::new(None) };
}

/// The scheduler running on this thread, if any.
pub(crate) fn current() -> Option<Rc<Shared>> {
    CURRENT.with(|c| c.borrow().clone())
}

pub fn is_running() -> bool {
    CURRENT.with(|c| c.borrow().is_some())
}

struct Enter;

impl Enter {
    fn install(shared: Rc<Shared>) -> Self {
        CURRENT.with(|c| *c.borrow_mut() = Some(shared));
        Enter
    }
}

impl Drop for Enter {
    fn drop(&mut self) {
        CURRENT.with(|c| c.borrow_mut().take());
    }
}

pub struct Scheduler {
    config: RuntimeConfig,
    /// Goroutines indexed by slot (slot == index).
    fibers: Vec<Fiber>,
    /// Slots of dead goroutines, available for reuse.
    free_slots: Vec<u32>,
    ready_queue: VecDeque<FiberId>,
    main_status: FiberStatus,
    wakes: WakeQueue,
    shared: Rc<Shared>,
    next_goid: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Scheduler {
            config,
            fibers: Vec::new(),
            free_slots: Vec::new(),
            ready_queue: VecDeque::new(),
            main_status: FiberStatus::Dead,
            wakes: Arc::new(Mutex::new(Vec::new())),
            shared: Rc::new(Shared::default()),
            next_goid: MAIN_GOID + 1,
        }
    }

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Queue a goroutine to start when the next run begins (or, during a
    /// run, on the next scheduling round). Returns its goroutine number.
    /// Reuses dead slots when available.
    pub fn spawn(&mut self, future: GoFuture) -> u64 {
        let goid = self.next_goid;
        self.next_goid += 1;
        let slot = if let Some(slot) = self.free_slots.pop() {
            let fiber = &mut self.fibers[slot as usize];
            let waker = FiberWaker::waker(FiberId::Go(slot), fiber.generation, &self.wakes);
            fiber.reset(goid, future, waker);
            slot
        } else {
            let slot = self.fibers.len() as u32;
            let waker = FiberWaker::waker(FiberId::Go(slot), 0, &self.wakes);
            self.fibers.push(Fiber::new(goid, future, waker));
            slot
        };
        self.ready_queue.push_back(FiberId::Go(slot));
        tracing::trace!(goroutine = goid, slot, "spawned goroutine");
        goid
    }

    /// Number of goroutines that have not exited, main excluded.
    pub fn live_goroutines(&self) -> usize {
        self.fibers.iter().filter(|f| !f.is_dead()).count()
    }

    /// Run `main` and every goroutine it spawns until `main` returns.
    /// Goroutines still alive at that point are dropped.
    pub fn block_on<T, F>(&mut self, main: F) -> Result<T, VmError>
    where
        F: Future<Output = RtResult<T>>,
    {
        if is_running() {
            return Err(VmError::NestedRun);
        }
        let _enter = Enter::install(self.shared.clone());
        if let Some(seed) = self.config.select_seed {
            fastrand::seed(seed);
        }
        let result = self.run(main);
        self.reset();
        result
    }

    fn run<T, F>(&mut self, main: F) -> Result<T, VmError>
    where
        F: Future<Output = RtResult<T>>,
    {
        let mut main = pin!(main);
        let main_waker = FiberWaker::waker(FiberId::Main, 0, &self.wakes);
        self.main_status = FiberStatus::Ready;
        self.ready_queue.push_front(FiberId::Main);

        loop {
            self.fire_due_timers();
            self.adopt_spawned();
            self.collect_wakes();

            let Some(id) = self.ready_queue.pop_front() else {
                self.idle()?;
                continue;
            };
            match id {
                FiberId::Main => {
                    self.main_status = FiberStatus::Running;
                    let mut cx = Context::from_waker(&main_waker);
                    match main.as_mut().poll(&mut cx) {
                        Poll::Ready(result) => {
                            self.main_status = FiberStatus::Dead;
                            tracing::trace!(live = self.live_goroutines(), "main returned");
                            return result.map_err(VmError::Panicked);
                        }
                        Poll::Pending => self.main_status = FiberStatus::Suspended,
                    }
                }
                FiberId::Go(slot) => self.poll_fiber(slot)?,
            }
        }
    }

    fn poll_fiber(&mut self, slot: u32) -> Result<(), VmError> {
        let fiber = &mut self.fibers[slot as usize];
        let Some(mut future) = fiber.future.take() else {
            return Ok(());
        };
        fiber.status = FiberStatus::Running;
        let goid = fiber.goid;
        let waker = fiber.waker.clone();

        let poll = future.as_mut().poll(&mut Context::from_waker(&waker));

        let fiber = &mut self.fibers[slot as usize];
        let result = match poll {
            Poll::Pending => {
                fiber.future = Some(future);
                fiber.status = FiberStatus::Suspended;
                return Ok(());
            }
            Poll::Ready(result) => result,
        };
        fiber.kill();
        self.free_slots.push(slot);
        drop(future);

        match result {
            Ok(()) => {
                tracing::trace!(goroutine = goid, "goroutine exited");
                Ok(())
            }
            Err(panic) => {
                tracing::error!(goroutine = goid, "{}", panic);
                match self.config.goroutine_panic {
                    PanicPolicy::Abort => Err(VmError::GoroutinePanicked { id: goid, panic }),
                    PanicPolicy::Log => Ok(()),
                }
            }
        }
    }

    /// Move wake-ups recorded by wakers into the ready queue.
    fn collect_wakes(&mut self) {
        let wakes = std::mem::take(&mut *self.wakes.lock());
        for (id, generation) in wakes {
            match id {
                FiberId::Main => {
                    if self.main_status == FiberStatus::Suspended {
                        self.main_status = FiberStatus::Ready;
                        self.ready_queue.push_back(id);
                    }
                }
                FiberId::Go(slot) => {
                    let Some(fiber) = self.fibers.get_mut(slot as usize) else {
                        continue;
                    };
                    if fiber.generation == generation && fiber.status == FiberStatus::Suspended {
                        fiber.status = FiberStatus::Ready;
                        self.ready_queue.push_back(id);
                    }
                }
            }
        }
    }

    fn adopt_spawned(&mut self) {
        let spawned = std::mem::take(&mut *self.shared.spawned.borrow_mut());
        for future in spawned {
            self.spawn(future);
        }
    }

    fn fire_due_timers(&mut self) {
        let now = Instant::now();
        loop {
            let due = {
                let mut timers = self.shared.timers.borrow_mut();
                match timers.peek() {
                    Some(t) if t.deadline <= now => timers.pop(),
                    _ => None,
                }
            };
            let Some(timer) = due else {
                break;
            };
            if !timer.live.get() {
                continue;
            }
            match timer.action {
                TimerAction::Wake(waker) => waker.wake(),
                TimerAction::Deliver(chan) => {
                    if let Err(panic) = chan.try_send(Value::Int(unix_nanos())) {
                        tracing::warn!("timer delivery failed: {}", panic);
                    }
                }
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        let mut timers = self.shared.timers.borrow_mut();
        while let Some(t) = timers.peek() {
            if t.live.get() {
                return Some(t.deadline);
            }
            timers.pop();
        }
        None
    }

    /// Nothing is ready: sleep until the earliest timer, or report deadlock.
    fn idle(&mut self) -> Result<(), VmError> {
        let Some(deadline) = self.next_deadline() else {
            return Err(self.deadlock());
        };
        let now = Instant::now();
        if deadline > now {
            tracing::debug!(wait = ?(deadline - now), "waiting for timer");
            std::thread::sleep(deadline - now);
        }
        Ok(())
    }

    fn deadlock(&self) -> VmError {
        let mut msg = String::from(DEADLOCK);
        msg.push_str(&format!("\n\ngoroutine {} [blocked]", MAIN_GOID));
        for fiber in self.fibers.iter().filter(|f| f.status == FiberStatus::Suspended) {
            msg.push_str(&format!("\n\ngoroutine {} [blocked]", fiber.goid));
        }
        tracing::debug!(blocked = self.live_goroutines() + 1, "deadlock");
        VmError::Deadlock(msg)
    }

    /// Drop what is left of a finished run so the scheduler can be reused.
    fn reset(&mut self) {
        // Goroutine futures may touch the scheduler while dropping.
        let fibers = std::mem::take(&mut self.fibers);
        drop(fibers);
        let spawned = std::mem::take(&mut *self.shared.spawned.borrow_mut());
        drop(spawned);
        let timers = std::mem::take(&mut *self.shared.timers.borrow_mut());
        drop(timers);
        self.free_slots.clear();
        self.ready_queue.clear();
        self.wakes.lock().clear();
        self.main_status = FiberStatus::Dead;
        self.next_goid = MAIN_GOID + 1;
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("fibers", &self.fibers)
            .field("ready_queue", &self.ready_queue)
            .finish()
    }
}

/// Run `main` on a fresh scheduler configured from the environment.
pub fn block_on<T>(main: impl Future<Output = RtResult<T>>) -> Result<T, VmError> {
    Scheduler::with_config(RuntimeConfig::from_env()).block_on(main)
}

fn unix_nanos() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_runtime::Panic;

    #[test]
    fn test_main_result() {
        let mut sched = Scheduler::new();
        assert_eq!(sched.block_on(async { Ok::<_, Panic>(7) }).unwrap(), 7);
        let err = sched.block_on(async { Err::<(), _>(Panic::new("boom")) }).unwrap_err();
        assert_eq!(err.panic().unwrap().message(), "boom");
    }

    #[test]
    fn test_slot_reuse() {
        let mut sched = Scheduler::new();
        sched.spawn(Box::pin(async { Ok::<(), Panic>(()) }));
        assert_eq!(sched.live_goroutines(), 1);
        sched.poll_fiber(0).unwrap();
        assert_eq!(sched.live_goroutines(), 0);
        assert_eq!(sched.free_slots, vec![0]);

        let goid = sched.spawn(Box::pin(async { Ok::<(), Panic>(()) }));
        assert_eq!(goid, 3);
        assert_eq!(sched.fibers.len(), 1);
        assert_eq!(sched.fibers[0].generation, 1);
    }

    #[test]
    fn test_stale_wake_ignored() {
        let mut sched = Scheduler::new();
        sched.spawn(Box::pin(std::future::pending::<RtResult<()>>()));
        sched.ready_queue.clear();
        sched.poll_fiber(0).unwrap();
        assert_eq!(sched.fibers[0].status, FiberStatus::Suspended);

        sched.wakes.lock().push((FiberId::Go(0), 5));
        sched.collect_wakes();
        assert!(sched.ready_queue.is_empty());

        sched.wakes.lock().push((FiberId::Go(0), 0));
        sched.wakes.lock().push((FiberId::Go(0), 0));
        sched.collect_wakes();
        assert_eq!(sched.ready_queue, VecDeque::from(vec![FiberId::Go(0)]));
    }

    #[test]
    fn test_timers_pop_earliest_first() {
        let shared = Shared::default();
        let base = Instant::now();
        let queue: WakeQueue = Arc::new(Mutex::new(Vec::new()));
        let waker = FiberWaker::waker(FiberId::Main, 0, &queue);
        for ms in [30u64, 10, 20] {
            shared.add_timer(base + std::time::Duration::from_millis(ms), TimerAction::Wake(waker.clone()));
        }
        let mut timers = shared.timers.borrow_mut();
        let order: Vec<u128> = std::iter::from_fn(|| timers.pop()).map(|t| (t.deadline - base).as_millis()).collect();
        assert_eq!(order, vec![10, 20, 30]);
    }

    #[test]
    fn test_nested_run_rejected() {
        let mut outer = Scheduler::new();
        let result = outer.block_on(async {
            let mut inner = Scheduler::new();
            Ok::<_, Panic>(matches!(inner.block_on(async { Ok::<_, Panic>(()) }), Err(VmError::NestedRun)))
        });
        assert!(result.unwrap());
        assert!(!is_running());
    }
}
