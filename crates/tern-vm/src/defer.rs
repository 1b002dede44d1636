//! Deferred-cleanup stacks.
//!
//! Actions run last-in first-out when the owning activation exits, whether it
//! returned normally or faulted. Each action sees the in-flight fault through
//! an [`Unwinding`] handle and may recover it. A fault raised by an action
//! replaces the in-flight one, which is kept as its superseded cause.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use tern_runtime::{Panic, RtResult, Value};

/// The fault, if any, that the owning activation is exiting with.
#[derive(Clone, Default)]
pub struct Unwinding(Rc<RefCell<Option<Panic>>>);

impl Unwinding {
    fn new(panic: Option<Panic>) -> Self {
        Unwinding(Rc::new(RefCell::new(panic)))
    }

    /// Stop the in-flight fault and return its payload. `None` when the
    /// activation is not panicking.
    pub fn recover(&self) -> Option<Value> {
        self.0.borrow_mut().take().map(Panic::into_value)
    }

    #[inline]
    pub fn is_panicking(&self) -> bool {
        self.0.borrow().is_some()
    }

    /// The in-flight fault, left in place.
    pub fn panic(&self) -> Option<Panic> {
        self.0.borrow().clone()
    }

    fn raise(&self, panic: Panic) {
        let mut slot = self.0.borrow_mut();
        let panic = match slot.take() {
            Some(previous) => panic.supersede(previous),
            None => panic,
        };
        *slot = Some(panic);
    }

    fn take(&self) -> Option<Panic> {
        self.0.borrow_mut().take()
    }
}

impl fmt::Debug for Unwinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Unwinding").field(&*self.0.borrow()).finish()
    }
}

type SyncAction<'a> = Box<dyn FnOnce(&Unwinding) -> RtResult<()> + 'a>;
type AsyncAction = Box<dyn FnOnce(Unwinding) -> Pin<Box<dyn Future<Output = RtResult<()>>>>>;

fn split<T>(outcome: RtResult<T>) -> (Option<T>, Option<Panic>) {
    match outcome {
        Ok(value) => (Some(value), None),
        Err(panic) => (None, Some(panic)),
    }
}

fn settle<T>(value: Option<T>, unwinding: &Unwinding, on_recover: impl FnOnce() -> T) -> RtResult<T> {
    match unwinding.take() {
        Some(panic) => Err(panic),
        None => Ok(value.unwrap_or_else(on_recover)),
    }
}

fn report_abandoned(panic: &Panic) {
    tracing::error!("deferred action faulted after its scope was abandoned: {}", panic);
}

/// Cleanup stack whose actions must not suspend.
#[derive(Default)]
pub struct DeferStack<'a> {
    actions: Vec<SyncAction<'a>>,
}

impl<'a> DeferStack<'a> {
    pub fn new() -> Self {
        DeferStack { actions: Vec::new() }
    }

    pub fn defer<F>(&mut self, action: F)
    where
        F: FnOnce(&Unwinding) -> RtResult<()> + 'a,
    {
        self.actions.push(Box::new(action));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every action and produce the activation's result. A recovered
    /// fault returns `T::default()`.
    pub fn finish<T: Default>(self, outcome: RtResult<T>) -> RtResult<T> {
        self.finish_with(outcome, T::default)
    }

    /// Like [`finish`](Self::finish), with the value to return after a
    /// recovery supplied by `on_recover`.
    pub fn finish_with<T>(mut self, outcome: RtResult<T>, on_recover: impl FnOnce() -> T) -> RtResult<T> {
        let (value, panic) = split(outcome);
        let unwinding = Unwinding::new(panic);
        self.drain(&unwinding);
        settle(value, &unwinding, on_recover)
    }

    fn drain(&mut self, unwinding: &Unwinding) {
        while let Some(action) = self.actions.pop() {
            if let Err(panic) = action(unwinding) {
                unwinding.raise(panic);
            }
        }
    }
}

impl Drop for DeferStack<'_> {
    fn drop(&mut self) {
        if self.actions.is_empty() {
            return;
        }
        let unwinding = Unwinding::default();
        self.drain(&unwinding);
        if let Some(panic) = unwinding.take() {
            report_abandoned(&panic);
        }
    }
}

impl fmt::Debug for DeferStack<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferStack").field("pending", &self.actions.len()).finish()
    }
}

/// Run `body` with a fresh [`DeferStack`] and drain it on exit.
pub fn with_defers<'a, T, F>(body: F) -> RtResult<T>
where
    T: Default,
    F: FnOnce(&mut DeferStack<'a>) -> RtResult<T>,
{
    let mut defers = DeferStack::new();
    let outcome = body(&mut defers);
    defers.finish(outcome)
}

enum AsyncEntry {
    Sync(SyncAction<'static>),
    Async(AsyncAction),
}

#[derive(Default)]
struct AsyncInner {
    actions: RefCell<Vec<AsyncEntry>>,
}

impl Drop for AsyncInner {
    fn drop(&mut self) {
        let actions = std::mem::take(self.actions.get_mut());
        if actions.is_empty() {
            return;
        }
        let unwinding = Unwinding::default();
        let mut skipped = 0usize;
        for entry in actions.into_iter().rev() {
            match entry {
                AsyncEntry::Sync(action) => {
                    if let Err(panic) = action(&unwinding) {
                        unwinding.raise(panic);
                    }
                }
                AsyncEntry::Async(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, "async defer stack dropped before it was finished");
        }
        if let Some(panic) = unwinding.take() {
            report_abandoned(&panic);
        }
    }
}

/// Cleanup stack whose actions may await. Clones share the same stack, so
/// a handle can be moved into the activation body.
#[derive(Clone, Default)]
pub struct AsyncDeferStack {
    inner: Rc<AsyncInner>,
}

impl AsyncDeferStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer<F, Fut>(&self, action: F)
    where
        F: FnOnce(Unwinding) -> Fut + 'static,
        Fut: Future<Output = RtResult<()>> + 'static,
    {
        let action: AsyncAction = Box::new(move |unwinding: Unwinding| -> Pin<Box<dyn Future<Output = RtResult<()>>>> {
            Box::pin(action(unwinding))
        });
        self.inner.actions.borrow_mut().push(AsyncEntry::Async(action));
    }

    pub fn defer_sync<F>(&self, action: F)
    where
        F: FnOnce(&Unwinding) -> RtResult<()> + 'static,
    {
        self.inner.actions.borrow_mut().push(AsyncEntry::Sync(Box::new(action)));
    }

    pub fn len(&self) -> usize {
        self.inner.actions.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn finish<T: Default>(&self, outcome: RtResult<T>) -> RtResult<T> {
        self.finish_with(outcome, T::default).await
    }

    pub async fn finish_with<T>(&self, outcome: RtResult<T>, on_recover: impl FnOnce() -> T) -> RtResult<T> {
        let (value, panic) = split(outcome);
        let unwinding = Unwinding::new(panic);
        loop {
            // Released before awaiting; actions may defer more.
            let next = self.inner.actions.borrow_mut().pop();
            let Some(entry) = next else {
                break;
            };
            let result = match entry {
                AsyncEntry::Sync(action) => action(&unwinding),
                AsyncEntry::Async(action) => action(unwinding.clone()).await,
            };
            if let Err(panic) = result {
                unwinding.raise(panic);
            }
        }
        settle(value, &unwinding, on_recover)
    }
}

impl fmt::Debug for AsyncDeferStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncDeferStack").field("pending", &self.len()).finish()
    }
}

/// Run `body` with a fresh [`AsyncDeferStack`] and drain it on exit.
pub async fn with_async_defers<T, F, Fut>(body: F) -> RtResult<T>
where
    T: Default,
    F: FnOnce(AsyncDeferStack) -> Fut,
    Fut: Future<Output = RtResult<T>>,
{
    let defers = AsyncDeferStack::new();
    let outcome = body(defers.clone()).await;
    defers.finish(outcome).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_lifo_order() {
        let log = RefCell::new(Vec::new());
        let result = with_defers(|d| {
            for name in ["A", "B", "C"] {
                let log = &log;
                d.defer(move |_| {
                    log.borrow_mut().push(name);
                    Ok(())
                });
            }
            Ok(1)
        });
        assert_eq!(result.unwrap(), 1);
        assert_eq!(*log.borrow(), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_faulting_action_still_runs_the_rest() {
        let ran_a = RefCell::new(false);
        let mut d = DeferStack::new();
        d.defer(|_| {
            *ran_a.borrow_mut() = true;
            Ok(())
        });
        d.defer(|_| Err(Panic::new("B")));
        d.defer(|_| Ok(()));
        let err = d.finish::<()>(Ok(())).unwrap_err();
        assert!(*ran_a.borrow());
        assert_eq!(err.message(), "B");
    }

    #[test]
    fn test_recover_returns_normally() {
        let seen = RefCell::new(None);
        let mut d = DeferStack::new();
        d.defer(|u| {
            assert!(u.is_panicking());
            *seen.borrow_mut() = u.recover();
            assert!(!u.is_panicking());
            Ok(())
        });
        let result = d.finish_with(Err(Panic::new("boom")), || -1);
        assert_eq!(result.unwrap(), -1);
        assert_eq!(seen.borrow().as_ref().and_then(Value::as_str), Some("boom"));
    }

    #[test]
    fn test_recover_without_panic_is_none() {
        let result = with_defers(|d| {
            d.defer(|u| {
                assert!(u.recover().is_none());
                Ok(())
            });
            Ok(5)
        });
        assert_eq!(result.unwrap(), 5);
    }

    #[test]
    fn test_later_fault_supersedes() {
        let mut d = DeferStack::new();
        d.defer(|_| Err(Panic::new("cleanup")));
        let err = d.finish::<()>(Err(Panic::new("body"))).unwrap_err();
        assert_eq!(err.message(), "cleanup");
        assert_eq!(err.superseded().unwrap().message(), "body");
    }

    #[test]
    fn test_drop_drains() {
        let count = RefCell::new(0);
        {
            let mut d = DeferStack::new();
            d.defer(|_| {
                *count.borrow_mut() += 1;
                Ok(())
            });
            d.defer(|_| Err(Panic::new("lost")));
        }
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_dropped_async_stack_runs_sync_actions() {
        let count = Rc::new(RefCell::new(0));
        let stack = AsyncDeferStack::new();
        let c = count.clone();
        stack.defer_sync(move |_| {
            *c.borrow_mut() += 1;
            Ok(())
        });
        stack.defer(|_| async { Ok::<(), Panic>(()) });
        assert_eq!(stack.len(), 2);
        let handle = stack.clone();
        drop(stack);
        assert_eq!(*count.borrow(), 0);
        drop(handle);
        assert_eq!(*count.borrow(), 1);
    }
}
