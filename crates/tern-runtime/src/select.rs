//! Select engine.
//!
//! A select first collects the cases that could complete right now, without
//! touching any channel. If there are any, one is drawn uniformly at random
//! and committed. Otherwise the default case is taken if present, or a single
//! [`Parker`] is registered on every listed channel and the select suspends
//! until the first match fires it. Every other registration is then
//! withdrawn, so exactly one case commits.
//!
//! Nil channels (`None`) are never ready and never registered. A select with
//! no channel and no default suspends forever.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::objects::channel::Channel;
use crate::objects::queue_state::{Parker, RecvResult, SendResult, WakeOutcome, Waiter, Wakeup};
use crate::panic::{Panic, RtResult};
use crate::value::Value;

// =============================================================================
// Cases and outcome
// =============================================================================

#[derive(Debug, Clone)]
enum CaseOp {
    Send(Value),
    Recv,
}

/// One send or receive candidate, tagged with a caller-chosen id.
#[derive(Debug, Clone)]
pub struct SelectCase {
    id: usize,
    chan: Option<Channel>,
    op: CaseOp,
}

impl SelectCase {
    /// `case ch <- value:`
    pub fn send(id: usize, chan: impl Into<Option<Channel>>, value: impl Into<Value>) -> Self {
        Self { id, chan: chan.into(), op: CaseOp::Send(value.into()) }
    }

    /// `case v, ok := <-ch:`
    pub fn recv(id: usize, chan: impl Into<Option<Channel>>) -> Self {
        Self { id, chan: chan.into(), op: CaseOp::Recv }
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_send(&self) -> bool {
        matches!(self.op, CaseOp::Send(_))
    }

    fn check_dir(&self) -> RtResult<()> {
        match (&self.chan, &self.op) {
            (Some(chan), CaseOp::Send(_)) => chan.check_send(),
            (Some(chan), CaseOp::Recv) => chan.check_recv(),
            (None, _) => Ok(()),
        }
    }

    fn is_ready(&self) -> bool {
        let chan = match &self.chan {
            Some(chan) => chan,
            None => return false,
        };
        let state = chan.state();
        match self.op {
            CaseOp::Send(_) => state.can_send(chan.cap()),
            CaseOp::Recv => state.can_recv(),
        }
    }

    /// Perform the operation. `Ok(None)` if it would block after all.
    fn try_commit(&self) -> RtResult<Option<SelectOutcome>> {
        let chan = match &self.chan {
            Some(chan) => chan,
            None => return Ok(None),
        };
        match &self.op {
            CaseOp::Send(value) => {
                let result = chan.state().try_send(value.clone(), chan.cap());
                match result {
                    SendResult::DirectSend | SendResult::Buffered => Ok(Some(SelectOutcome::sent(self.id))),
                    SendResult::Closed => Err(Panic::send_on_closed()),
                    SendResult::WouldBlock(_) | SendResult::Blocked => Ok(None),
                }
            }
            CaseOp::Recv => {
                let result = chan.state().try_recv();
                match result {
                    RecvResult::Success(value) => Ok(Some(SelectOutcome::received(self.id, value, true))),
                    RecvResult::Closed => {
                        Ok(Some(SelectOutcome::received(self.id, chan.zero_value(), false)))
                    }
                    RecvResult::WouldBlock | RecvResult::Blocked => Ok(None),
                }
            }
        }
    }

    fn register(&self, parker: &Rc<Parker>, index: usize) {
        let chan = match &self.chan {
            Some(chan) => chan,
            None => return,
        };
        let waiter = Waiter::new(parker.clone(), index);
        let mut state = chan.state();
        match &self.op {
            CaseOp::Send(value) => state.waiting_senders.push_back((waiter, value.clone())),
            CaseOp::Recv => state.waiting_receivers.push_back(waiter),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selected {
    Case(usize),
    Default,
}

/// The committed case. `value` and `ok` are only meaningful for receives.
#[derive(Debug, Clone)]
pub struct SelectOutcome {
    pub selected: Selected,
    pub value: Value,
    pub ok: bool,
}

impl SelectOutcome {
    fn sent(id: usize) -> Self {
        Self { selected: Selected::Case(id), value: Value::Nil, ok: false }
    }

    fn received(id: usize, value: Value, ok: bool) -> Self {
        Self { selected: Selected::Case(id), value, ok }
    }

    fn default_case() -> Self {
        Self { selected: Selected::Default, value: Value::Nil, ok: false }
    }
}

// =============================================================================
// select
// =============================================================================

/// Evaluate a case set. Sending on a closed channel, or in the wrong
/// direction, faults.
pub fn select(cases: Vec<SelectCase>, has_default: bool) -> SelectFuture {
    SelectFuture { cases, has_default, parker: None, done: false }
}

#[must_use = "futures do nothing unless awaited"]
pub struct SelectFuture {
    cases: Vec<SelectCase>,
    has_default: bool,
    parker: Option<Rc<Parker>>,
    done: bool,
}

impl SelectFuture {
    fn evaluate(&mut self) -> RtResult<Option<SelectOutcome>> {
        for case in &self.cases {
            case.check_dir()?;
        }
        let mut ready: Vec<usize> = (0..self.cases.len()).filter(|&i| self.cases[i].is_ready()).collect();
        while !ready.is_empty() {
            let index = ready.swap_remove(fastrand::usize(..ready.len()));
            if let Some(outcome) = self.cases[index].try_commit()? {
                return Ok(Some(outcome));
            }
        }
        if self.has_default {
            return Ok(Some(SelectOutcome::default_case()));
        }
        Ok(None)
    }

    fn finish(&self, wakeup: Wakeup) -> RtResult<SelectOutcome> {
        let id = self.cases[wakeup.case_index].id;
        match wakeup.outcome {
            WakeOutcome::Sent => Ok(SelectOutcome::sent(id)),
            WakeOutcome::Received(value, ok) => Ok(SelectOutcome::received(id, value, ok)),
            WakeOutcome::SendClosed => Err(Panic::send_on_closed()),
        }
    }

    fn cancel(&self, parker: &Rc<Parker>) {
        for chan in self.cases.iter().filter_map(|case| case.chan.as_ref()) {
            chan.state().cancel_waiters(parker);
        }
    }
}

impl Future for SelectFuture {
    type Output = RtResult<SelectOutcome>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.done {
            return Poll::Pending;
        }

        if let Some(parker) = this.parker.clone() {
            return match parker.take() {
                Some(wakeup) => {
                    this.cancel(&parker);
                    this.parker = None;
                    this.done = true;
                    Poll::Ready(this.finish(wakeup))
                }
                None => {
                    parker.update_waker(cx.waker());
                    Poll::Pending
                }
            };
        }

        match this.evaluate() {
            Ok(Some(outcome)) => {
                this.done = true;
                Poll::Ready(Ok(outcome))
            }
            Err(p) => {
                this.done = true;
                Poll::Ready(Err(p))
            }
            Ok(None) => {
                let parker = Parker::new(cx.waker());
                for (index, case) in this.cases.iter().enumerate() {
                    case.register(&parker, index);
                }
                this.parker = Some(parker);
                Poll::Pending
            }
        }
    }
}

impl Drop for SelectFuture {
    fn drop(&mut self) {
        if let Some(parker) = &self.parker {
            if parker.is_live() {
                self.cancel(parker);
            }
        }
    }
}

// =============================================================================
// SelectStatement
// =============================================================================

type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;
type Arm<'a, T> = Box<dyn FnOnce(Value, bool) -> LocalBoxFuture<'a, RtResult<SelectFlow<T>>> + 'a>;
type DefaultArm<'a, T> = Box<dyn FnOnce() -> LocalBoxFuture<'a, RtResult<SelectFlow<T>>> + 'a>;

/// What a select arm asks of the enclosing function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectFlow<T> {
    /// Fall through to the statement after the select.
    Continue,
    /// Return `T` from the enclosing function.
    Return(T),
}

impl<T> SelectFlow<T> {
    pub fn into_return(self) -> Option<T> {
        match self {
            SelectFlow::Return(value) => Some(value),
            SelectFlow::Continue => None,
        }
    }
}

/// A `select` statement whose arms may return from the enclosing function.
///
/// ```ignore
/// let flow = SelectStatement::new()
///     .recv(data.clone(), |v, _ok| async move { Ok(SelectFlow::Return(v)) })
///     .recv(quit.clone(), |_, _| async { Ok(SelectFlow::Continue) })
///     .run()
///     .await?;
/// ```
pub struct SelectStatement<'a, T> {
    cases: Vec<SelectCase>,
    arms: Vec<Arm<'a, T>>,
    default: Option<DefaultArm<'a, T>>,
}

impl<'a, T: 'a> Default for SelectStatement<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T: 'a> SelectStatement<'a, T> {
    pub fn new() -> Self {
        Self { cases: Vec::new(), arms: Vec::new(), default: None }
    }

    pub fn recv<F, Fut>(mut self, chan: impl Into<Option<Channel>>, arm: F) -> Self
    where
        F: FnOnce(Value, bool) -> Fut + 'a,
        Fut: Future<Output = RtResult<SelectFlow<T>>> + 'a,
    {
        self.cases.push(SelectCase::recv(self.arms.len(), chan));
        self.arms.push(Box::new(move |value, ok| Box::pin(arm(value, ok))));
        self
    }

    pub fn send<F, Fut>(mut self, chan: impl Into<Option<Channel>>, value: impl Into<Value>, arm: F) -> Self
    where
        F: FnOnce() -> Fut + 'a,
        Fut: Future<Output = RtResult<SelectFlow<T>>> + 'a,
    {
        self.cases.push(SelectCase::send(self.arms.len(), chan, value));
        self.arms.push(Box::new(move |_, _| Box::pin(arm())));
        self
    }

    /// A later call replaces an earlier default arm.
    pub fn default_case<F, Fut>(mut self, arm: F) -> Self
    where
        F: FnOnce() -> Fut + 'a,
        Fut: Future<Output = RtResult<SelectFlow<T>>> + 'a,
    {
        self.default = Some(Box::new(move || Box::pin(arm())));
        self
    }

    /// Commit one case and run its arm.
    pub async fn run(self) -> RtResult<SelectFlow<T>> {
        let Self { cases, arms, default } = self;
        let outcome = select(cases, default.is_some()).await?;
        match outcome.selected {
            Selected::Case(id) => match arms.into_iter().nth(id) {
                Some(arm) => arm(outcome.value, outcome.ok).await,
                None => Ok(SelectFlow::Continue),
            },
            Selected::Default => match default {
                Some(arm) => arm().await,
                None => Ok(SelectFlow::Continue),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::basic;
    use std::sync::Arc;
    use std::task::{Wake, Waker};
    use tern_common_core::Kind;

    struct Noop;
    impl Wake for Noop {
        fn wake(self: Arc<Self>) {}
    }

    fn poll_once<F: Future>(fut: Pin<&mut F>) -> Poll<F::Output> {
        let waker = Waker::from(Arc::new(Noop));
        let mut cx = Context::from_waker(&waker);
        fut.poll(&mut cx)
    }

    fn int_chan(cap: usize) -> Channel {
        Channel::new(&basic(Kind::Int), cap).unwrap()
    }

    #[test]
    fn test_ready_case_beats_default() {
        let ch = int_chan(1);
        ch.try_send(Value::Int(7)).unwrap();
        let mut fut = select(vec![SelectCase::recv(0, ch.clone())], true);
        match poll_once(Pin::new(&mut fut)) {
            Poll::Ready(Ok(outcome)) => {
                assert_eq!(outcome.selected, Selected::Case(0));
                assert!(matches!(outcome.value, Value::Int(7)));
                assert!(outcome.ok);
            }
            _ => panic!("select should be ready"),
        }
    }

    #[test]
    fn test_default_when_nothing_ready() {
        let ch = int_chan(0);
        let mut fut = select(vec![SelectCase::recv(0, ch), SelectCase::recv(1, None)], true);
        match poll_once(Pin::new(&mut fut)) {
            Poll::Ready(Ok(outcome)) => assert_eq!(outcome.selected, Selected::Default),
            _ => panic!("default should be taken"),
        }
    }

    #[test]
    fn test_uniform_choice_among_ready_cases() {
        let a = int_chan(1);
        let b = int_chan(1);
        let mut counts = [0usize; 2];
        for _ in 0..2000 {
            if a.is_empty() {
                a.try_send(Value::Int(1)).unwrap();
            }
            if b.is_empty() {
                b.try_send(Value::Int(2)).unwrap();
            }
            let mut fut = select(vec![SelectCase::recv(0, a.clone()), SelectCase::recv(1, b.clone())], false);
            if let Poll::Ready(Ok(SelectOutcome { selected: Selected::Case(id), .. })) = poll_once(Pin::new(&mut fut)) {
                counts[id] += 1;
            }
        }
        assert_eq!(counts[0] + counts[1], 2000);
        assert!(counts[0] > 800, "{:?}", counts);
        assert!(counts[1] > 800, "{:?}", counts);
    }

    #[test]
    fn test_blocked_select_commits_exactly_one() {
        let a = int_chan(0);
        let b = int_chan(0);
        let mut fut = select(vec![SelectCase::recv(10, a.clone()), SelectCase::recv(20, b.clone())], false);
        assert!(poll_once(Pin::new(&mut fut)).is_pending());
        assert_eq!(a.state().waiting_count(), (0, 1));

        assert!(b.try_send(Value::Int(5)).unwrap());
        assert!(!a.try_send(Value::Int(6)).unwrap());
        match poll_once(Pin::new(&mut fut)) {
            Poll::Ready(Ok(outcome)) => {
                assert_eq!(outcome.selected, Selected::Case(20));
                assert!(matches!(outcome.value, Value::Int(5)));
            }
            _ => panic!("select should have been fired"),
        }
        assert_eq!(a.state().waiting_count(), (0, 0));
        assert!(a.state().waiting_receivers.is_empty());
    }

    #[test]
    fn test_dropped_select_deregisters() {
        let ch = int_chan(0);
        {
            let mut fut = select(vec![SelectCase::recv(0, ch.clone())], false);
            assert!(poll_once(Pin::new(&mut fut)).is_pending());
        }
        assert!(!ch.try_send(Value::Int(1)).unwrap());
    }

    #[test]
    fn test_send_case_on_closed_channel_faults() {
        let ch = int_chan(0);
        ch.close().unwrap();
        let mut fut = select(vec![SelectCase::send(0, ch, 1i64)], true);
        match poll_once(Pin::new(&mut fut)) {
            Poll::Ready(Err(p)) => assert_eq!(p.message(), "send on closed channel"),
            _ => panic!("expected a fault"),
        }
    }

    #[test]
    fn test_nil_channels_without_default_never_complete() {
        let mut fut = select(vec![SelectCase::recv(0, None), SelectCase::send(1, None, 1i64)], false);
        assert!(poll_once(Pin::new(&mut fut)).is_pending());
        assert!(poll_once(Pin::new(&mut fut)).is_pending());
    }

    #[test]
    fn test_statement_early_return() {
        let ch = int_chan(1);
        ch.try_send(Value::Int(3)).unwrap();
        let stmt = SelectStatement::new()
            .recv(ch.clone(), |v, _| async move { Ok(SelectFlow::Return(v.as_int().unwrap_or(0) * 2)) })
            .default_case(|| async { Ok(SelectFlow::Continue) });
        let mut fut = Box::pin(stmt.run());
        match poll_once(fut.as_mut()) {
            Poll::Ready(Ok(flow)) => assert_eq!(flow.into_return(), Some(6)),
            _ => panic!("statement should complete"),
        }
    }
}
