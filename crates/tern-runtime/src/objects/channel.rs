//! Channels.
//!
//! A channel is a capacity bound plus a [`QueueState`]. Blocking operations
//! are futures: the first poll tries the transition and, if it would block,
//! registers a waiter in the same step; later polls look at the parker.
//! Dropping a suspended future deregisters it, so a cancelled operation never
//! consumes a value.
//!
//! A nil channel is `None`: sends and receives on it suspend forever.

use std::cell::{RefCell, RefMut};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use tern_common_core::ChanDir;

use super::queue_state::{Parker, QueueState, RecvResult, SendResult, WakeOutcome, Waiter, Wakeup};
use crate::copy::copy_value;
use crate::panic::{Panic, RuntimeTrapKind, RtResult};
use crate::reflect::{self, type_of, Type};
use crate::value::Value;

struct ChannelInner {
    cap: usize,
    elem: Type,
    zero: Value,
    state: RefCell<QueueState>,
}

/// A channel reference, possibly restricted to one direction.
#[derive(Clone)]
pub struct Channel {
    inner: Rc<ChannelInner>,
    dir: ChanDir,
}

/// `make(chan T, capacity)` where `zero` is T's zero value.
pub fn make_channel(capacity: i64, zero: Value, dir: ChanDir) -> RtResult<Channel> {
    if capacity < 0 {
        return Err(Panic::runtime(RuntimeTrapKind::MakeChan, "makechan: size out of range"));
    }
    let elem = type_of(&zero).unwrap_or_else(reflect::any_type);
    Ok(Channel::from_parts(capacity as usize, elem, zero, dir))
}

impl Channel {
    /// Bidirectional channel of `elem`.
    pub fn new(elem: &Type, capacity: usize) -> RtResult<Self> {
        Ok(Self::from_parts(capacity, elem.clone(), elem.zero()?, ChanDir::Both))
    }

    fn from_parts(cap: usize, elem: Type, zero: Value, dir: ChanDir) -> Self {
        let inner = ChannelInner { cap, elem, zero, state: RefCell::new(QueueState::new(cap)) };
        Self { inner: Rc::new(inner), dir }
    }

    #[inline]
    pub fn cap(&self) -> usize {
        self.inner.cap
    }

    /// Number of buffered elements.
    pub fn len(&self) -> usize {
        self.inner.state.borrow().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.borrow().closed
    }

    #[inline]
    pub fn dir(&self) -> ChanDir {
        self.dir
    }

    pub fn elem_type(&self) -> &Type {
        &self.inner.elem
    }

    /// A fresh zero element. Struct and array zeros are never shared
    /// between receivers.
    pub fn zero_value(&self) -> Value {
        copy_value(&self.inner.zero)
    }

    /// `chan<- T` view of the same channel.
    pub fn as_send_only(&self) -> Channel {
        Channel { inner: self.inner.clone(), dir: ChanDir::Send }
    }

    /// `<-chan T` view of the same channel.
    pub fn as_recv_only(&self) -> Channel {
        Channel { inner: self.inner.clone(), dir: ChanDir::Recv }
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Channel) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    pub(crate) fn state(&self) -> RefMut<'_, QueueState> {
        self.inner.state.borrow_mut()
    }

    pub(crate) fn check_send(&self) -> RtResult<()> {
        if self.dir.can_send() {
            Ok(())
        } else {
            Err(Panic::runtime(RuntimeTrapKind::InvalidChanDir, "send to receive-only channel"))
        }
    }

    pub(crate) fn check_recv(&self) -> RtResult<()> {
        if self.dir.can_recv() {
            Ok(())
        } else {
            Err(Panic::runtime(RuntimeTrapKind::InvalidChanDir, "receive from send-only channel"))
        }
    }

    /// Send without suspending. `Ok(false)` means it would block.
    pub fn try_send(&self, value: Value) -> RtResult<bool> {
        self.check_send()?;
        match self.state().try_send(value, self.inner.cap) {
            SendResult::DirectSend | SendResult::Buffered => Ok(true),
            SendResult::WouldBlock(_) | SendResult::Blocked => Ok(false),
            SendResult::Closed => Err(Panic::send_on_closed()),
        }
    }

    /// Receive without suspending. `None` means it would block; a closed,
    /// drained channel yields `(zero, false)`.
    pub fn try_recv(&self) -> RtResult<Option<(Value, bool)>> {
        self.check_recv()?;
        let result = self.state().try_recv();
        Ok(match result {
            RecvResult::Success(value) => Some((value, true)),
            RecvResult::Closed => Some((self.zero_value(), false)),
            RecvResult::WouldBlock | RecvResult::Blocked => None,
        })
    }

    /// `close(ch)`: buffered values stay receivable; waiters are woken.
    pub fn close(&self) -> RtResult<()> {
        if !self.dir.can_send() {
            return Err(Panic::runtime(RuntimeTrapKind::InvalidChanDir, "close of receive-only channel"));
        }
        let mut state = self.state();
        if state.closed {
            return Err(Panic::close_of_closed());
        }
        state.close(&self.inner.zero);
        Ok(())
    }

    /// `ch <- value`
    pub fn send(&self, value: Value) -> SendFuture {
        SendFuture { chan: Some(self.clone()), value: Some(value), parker: None }
    }

    /// `<-ch`
    pub fn recv(&self) -> RecvFuture {
        RecvFuture(RecvWithOkFuture::new(Some(self.clone())))
    }

    /// `v, ok := <-ch`
    pub fn recv_with_ok(&self) -> RecvWithOkFuture {
        RecvWithOkFuture::new(Some(self.clone()))
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} (0x{:x})", self.dir.prefix(), self.inner.elem, self.addr())
    }
}

// =============================================================================
// Nil-aware entry points
// =============================================================================

/// `ch <- value`; suspends forever on a nil channel.
pub fn send(chan: Option<&Channel>, value: Value) -> SendFuture {
    SendFuture { chan: chan.cloned(), value: Some(value), parker: None }
}

/// `<-ch`; suspends forever on a nil channel.
pub fn recv(chan: Option<&Channel>) -> RecvFuture {
    RecvFuture(RecvWithOkFuture::new(chan.cloned()))
}

pub fn recv_with_ok(chan: Option<&Channel>) -> RecvWithOkFuture {
    RecvWithOkFuture::new(chan.cloned())
}

/// `close(ch)`; closing a nil channel faults.
pub fn close(chan: Option<&Channel>) -> RtResult<()> {
    match chan {
        Some(chan) => chan.close(),
        None => Err(Panic::close_of_nil()),
    }
}

// =============================================================================
// Futures
// =============================================================================

#[must_use = "futures do nothing unless awaited"]
pub struct SendFuture {
    chan: Option<Channel>,
    value: Option<Value>,
    parker: Option<Rc<Parker>>,
}

impl Future for SendFuture {
    type Output = RtResult<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let chan = match &this.chan {
            Some(chan) => chan.clone(),
            None => return Poll::Pending,
        };

        if let Some(parker) = &this.parker {
            return match parker.take() {
                Some(Wakeup { outcome: WakeOutcome::SendClosed, .. }) => {
                    this.parker = None;
                    Poll::Ready(Err(Panic::send_on_closed()))
                }
                Some(_) => {
                    this.parker = None;
                    Poll::Ready(Ok(()))
                }
                None => {
                    parker.update_waker(cx.waker());
                    Poll::Pending
                }
            };
        }

        let value = match this.value.take() {
            Some(value) => value,
            None => return Poll::Ready(Ok(())),
        };
        if let Err(p) = chan.check_send() {
            return Poll::Ready(Err(p));
        }
        let parker = Parker::new(cx.waker());
        let result = chan.state().send_or_block(value, chan.cap(), Waiter::new(parker.clone(), 0));
        match result {
            SendResult::DirectSend | SendResult::Buffered => Poll::Ready(Ok(())),
            SendResult::Closed => Poll::Ready(Err(Panic::send_on_closed())),
            SendResult::Blocked | SendResult::WouldBlock(_) => {
                this.parker = Some(parker);
                Poll::Pending
            }
        }
    }
}

impl Drop for SendFuture {
    fn drop(&mut self) {
        if let (Some(chan), Some(parker)) = (&self.chan, &self.parker) {
            if parker.is_live() {
                chan.state().cancel_waiters(parker);
            }
        }
    }
}

#[must_use = "futures do nothing unless awaited"]
pub struct RecvWithOkFuture {
    chan: Option<Channel>,
    parker: Option<Rc<Parker>>,
    done: bool,
}

impl RecvWithOkFuture {
    fn new(chan: Option<Channel>) -> Self {
        Self { chan, parker: None, done: false }
    }
}

impl Future for RecvWithOkFuture {
    type Output = RtResult<(Value, bool)>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let chan = match &this.chan {
            Some(chan) if !this.done => chan.clone(),
            _ => return Poll::Pending,
        };

        if let Some(parker) = &this.parker {
            return match parker.take() {
                Some(Wakeup { outcome: WakeOutcome::Received(value, ok), .. }) => {
                    this.parker = None;
                    this.done = true;
                    Poll::Ready(Ok((value, ok)))
                }
                Some(_) => {
                    this.parker = None;
                    this.done = true;
                    Poll::Ready(Ok((chan.zero_value(), false)))
                }
                None => {
                    parker.update_waker(cx.waker());
                    Poll::Pending
                }
            };
        }

        if let Err(p) = chan.check_recv() {
            this.done = true;
            return Poll::Ready(Err(p));
        }
        let parker = Parker::new(cx.waker());
        let result = chan.state().recv_or_block(Waiter::new(parker.clone(), 0));
        match result {
            RecvResult::Success(value) => {
                this.done = true;
                Poll::Ready(Ok((value, true)))
            }
            RecvResult::Closed => {
                this.done = true;
                Poll::Ready(Ok((chan.zero_value(), false)))
            }
            RecvResult::Blocked | RecvResult::WouldBlock => {
                this.parker = Some(parker);
                Poll::Pending
            }
        }
    }
}

impl Drop for RecvWithOkFuture {
    fn drop(&mut self) {
        if let (Some(chan), Some(parker)) = (&self.chan, &self.parker) {
            if parker.is_live() {
                chan.state().cancel_waiters(parker);
            }
        }
    }
}

/// `<-ch` without the ok flag.
#[must_use = "futures do nothing unless awaited"]
pub struct RecvFuture(RecvWithOkFuture);

impl Future for RecvFuture {
    type Output = RtResult<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().0).poll(cx).map(|r| r.map(|(value, _)| value))
    }
}
