//! Channel queue state machine.
//!
//! This module provides:
//! - `Parker`: the one-shot slot a blocked send/receive/select waits on
//! - `Waiter`: a parker registered on one channel for one select case
//! - `QueueState`: buffer + waiter queues, with the send/receive/close transitions
//!
//! A blocked operation registers a waiter and suspends. The party that later
//! completes the match fires the waiter's parker with the outcome and wakes
//! its task. A select registers the same parker on several channels; only the
//! first fire takes effect, and stale registrations are skipped by every
//! transition until the select cancels them.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::task::Waker;

use crate::copy::copy_value;
use crate::value::Value;

/// What happened to a parked operation.
#[derive(Debug, Clone)]
pub enum WakeOutcome {
    /// The parked value was taken by a receiver.
    Sent,
    /// A value was handed over; `false` means the channel was closed.
    Received(Value, bool),
    /// The channel was closed while the sender waited.
    SendClosed,
}

#[derive(Debug, Clone)]
pub struct Wakeup {
    pub case_index: usize,
    pub outcome: WakeOutcome,
}

/// One-shot rendezvous slot. Once fired it stays fired.
pub struct Parker {
    fired: Cell<bool>,
    wakeup: RefCell<Option<Wakeup>>,
    waker: RefCell<Option<Waker>>,
}

impl Parker {
    pub fn new(waker: &Waker) -> Rc<Self> {
        Rc::new(Self {
            fired: Cell::new(false),
            wakeup: RefCell::new(None),
            waker: RefCell::new(Some(waker.clone())),
        })
    }

    /// Still waiting for a match.
    #[inline]
    pub fn is_live(&self) -> bool {
        !self.fired.get()
    }

    fn fire(&self, case_index: usize, outcome: WakeOutcome) {
        debug_assert!(self.is_live());
        self.fired.set(true);
        *self.wakeup.borrow_mut() = Some(Wakeup { case_index, outcome });
        if let Some(waker) = self.waker.borrow_mut().take() {
            waker.wake();
        }
    }

    /// The outcome, once fired.
    pub fn take(&self) -> Option<Wakeup> {
        self.wakeup.borrow_mut().take()
    }

    pub fn update_waker(&self, waker: &Waker) {
        let mut slot = self.waker.borrow_mut();
        match slot.as_ref() {
            Some(current) if current.will_wake(waker) => {}
            _ => *slot = Some(waker.clone()),
        }
    }
}

/// A parker registered on a channel for one case.
#[derive(Clone)]
pub struct Waiter {
    pub parker: Rc<Parker>,
    pub case_index: usize,
}

impl Waiter {
    pub fn new(parker: Rc<Parker>, case_index: usize) -> Self {
        Self { parker, case_index }
    }

    #[inline]
    fn is_live(&self) -> bool {
        self.parker.is_live()
    }

    fn fire(self, outcome: WakeOutcome) {
        self.parker.fire(self.case_index, outcome);
    }
}

/// Result of a send operation.
#[derive(Debug)]
pub enum SendResult {
    /// Value handed directly to a waiting receiver (receiver woken).
    DirectSend,
    /// Value buffered.
    Buffered,
    /// Buffer full and no receivers. Returns the value back.
    WouldBlock(Value),
    /// Waiter registered (send_or_block only).
    Blocked,
    Closed,
}

/// Result of a receive operation.
#[derive(Debug)]
pub enum RecvResult {
    /// Received a value, waking a sender if one was promoted.
    Success(Value),
    WouldBlock,
    /// Waiter registered (recv_or_block only).
    Blocked,
    /// Closed and drained.
    Closed,
}

pub struct QueueState {
    pub buffer: VecDeque<Value>,
    pub closed: bool,
    pub waiting_senders: VecDeque<(Waiter, Value)>,
    pub waiting_receivers: VecDeque<Waiter>,
}

impl QueueState {
    pub fn new(cap: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(cap),
            closed: false,
            waiting_senders: VecDeque::new(),
            waiting_receivers: VecDeque::new(),
        }
    }

    fn pop_live_receiver(&mut self) -> Option<Waiter> {
        while let Some(receiver) = self.waiting_receivers.pop_front() {
            if receiver.is_live() {
                return Some(receiver);
            }
        }
        None
    }

    fn pop_live_sender(&mut self) -> Option<(Waiter, Value)> {
        while let Some((sender, value)) = self.waiting_senders.pop_front() {
            if sender.is_live() {
                return Some((sender, value));
            }
        }
        None
    }

    /// Try to send without blocking. Returns the value back if it would block.
    pub fn try_send(&mut self, value: Value, cap: usize) -> SendResult {
        if self.closed {
            return SendResult::Closed;
        }
        if let Some(receiver) = self.pop_live_receiver() {
            receiver.fire(WakeOutcome::Received(value, true));
            return SendResult::DirectSend;
        }
        if self.buffer.len() < cap {
            self.buffer.push_back(value);
            return SendResult::Buffered;
        }
        SendResult::WouldBlock(value)
    }

    /// Send, registering `waiter` in the same step if it would block.
    pub fn send_or_block(&mut self, value: Value, cap: usize, waiter: Waiter) -> SendResult {
        match self.try_send(value, cap) {
            SendResult::WouldBlock(value) => {
                self.waiting_senders.push_back((waiter, value));
                SendResult::Blocked
            }
            other => other,
        }
    }

    /// Try to receive without blocking.
    ///
    /// Taking from a full buffer promotes the first pending sender's value
    /// into the freed slot; on an unbuffered channel the sender's value is
    /// taken directly.
    pub fn try_recv(&mut self) -> RecvResult {
        if let Some(value) = self.buffer.pop_front() {
            if let Some((sender, sender_value)) = self.pop_live_sender() {
                self.buffer.push_back(sender_value);
                sender.fire(WakeOutcome::Sent);
            }
            return RecvResult::Success(value);
        }
        if let Some((sender, value)) = self.pop_live_sender() {
            sender.fire(WakeOutcome::Sent);
            return RecvResult::Success(value);
        }
        if self.closed {
            RecvResult::Closed
        } else {
            RecvResult::WouldBlock
        }
    }

    /// Receive, registering `waiter` in the same step if it would block.
    pub fn recv_or_block(&mut self, waiter: Waiter) -> RecvResult {
        match self.try_recv() {
            RecvResult::WouldBlock => {
                self.waiting_receivers.push_back(waiter);
                RecvResult::Blocked
            }
            other => other,
        }
    }

    /// A send would complete or fault without blocking.
    pub fn can_send(&self, cap: usize) -> bool {
        self.closed
            || self.waiting_receivers.iter().any(Waiter::is_live)
            || self.buffer.len() < cap
    }

    /// A receive would complete without blocking.
    pub fn can_recv(&self) -> bool {
        !self.buffer.is_empty() || self.closed || self.waiting_senders.iter().any(|(w, _)| w.is_live())
    }

    /// Mark closed and wake every waiter: receivers get `(zero, false)`,
    /// senders fault when they resume. Returns the number woken.
    pub fn close(&mut self, zero: &Value) -> usize {
        self.closed = true;
        let mut woken = 0;
        for receiver in self.waiting_receivers.drain(..) {
            if receiver.is_live() {
                receiver.fire(WakeOutcome::Received(copy_value(zero), false));
                woken += 1;
            }
        }
        for (sender, _) in self.waiting_senders.drain(..) {
            if sender.is_live() {
                sender.fire(WakeOutcome::SendClosed);
                woken += 1;
            }
        }
        woken
    }

    /// Drop every registration made with `parker`.
    pub fn cancel_waiters(&mut self, parker: &Rc<Parker>) {
        self.waiting_receivers.retain(|w| !Rc::ptr_eq(&w.parker, parker));
        self.waiting_senders.retain(|(w, _)| !Rc::ptr_eq(&w.parker, parker));
    }

    pub fn waiting_count(&self) -> (usize, usize) {
        let senders = self.waiting_senders.iter().filter(|(w, _)| w.is_live()).count();
        let receivers = self.waiting_receivers.iter().filter(|w| w.is_live()).count();
        (senders, receivers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::task::Waker;

    fn noop_waker() -> Waker {
        use std::sync::Arc;
        use std::task::Wake;

        struct Noop;
        impl Wake for Noop {
            fn wake(self: Arc<Self>) {}
        }
        Waker::from(Arc::new(Noop))
    }

    #[test]
    fn test_buffered_fifo() {
        let mut q = QueueState::new(2);
        assert!(matches!(q.try_send(Value::Int(1), 2), SendResult::Buffered));
        assert!(matches!(q.try_send(Value::Int(2), 2), SendResult::Buffered));
        assert!(matches!(q.try_send(Value::Int(3), 2), SendResult::WouldBlock(_)));
        assert!(matches!(q.try_recv(), RecvResult::Success(Value::Int(1))));
        assert!(matches!(q.try_recv(), RecvResult::Success(Value::Int(2))));
        assert!(matches!(q.try_recv(), RecvResult::WouldBlock));
    }

    #[test]
    fn test_recv_promotes_pending_sender() {
        let waker = noop_waker();
        let mut q = QueueState::new(1);
        q.try_send(Value::Int(1), 1);
        let parker = Parker::new(&waker);
        assert!(matches!(q.send_or_block(Value::Int(2), 1, Waiter::new(parker.clone(), 0)), SendResult::Blocked));

        assert!(matches!(q.try_recv(), RecvResult::Success(Value::Int(1))));
        assert!(matches!(parker.take().map(|w| w.outcome), Some(WakeOutcome::Sent)));
        assert!(matches!(q.try_recv(), RecvResult::Success(Value::Int(2))));
    }

    #[test]
    fn test_rendezvous_hands_value_to_receiver() {
        let waker = noop_waker();
        let mut q = QueueState::new(0);
        let parker = Parker::new(&waker);
        assert!(matches!(q.recv_or_block(Waiter::new(parker.clone(), 3)), RecvResult::Blocked));
        assert!(q.can_send(0));
        assert!(matches!(q.try_send(Value::Int(9), 0), SendResult::DirectSend));
        let wakeup = parker.take().unwrap();
        assert_eq!(wakeup.case_index, 3);
        assert!(matches!(wakeup.outcome, WakeOutcome::Received(Value::Int(9), true)));
        assert!(q.buffer.is_empty());
    }

    #[test]
    fn test_fired_waiters_are_skipped() {
        let waker = noop_waker();
        let mut q1 = QueueState::new(0);
        let mut q2 = QueueState::new(0);
        let parker = Parker::new(&waker);
        q1.recv_or_block(Waiter::new(parker.clone(), 0));
        q2.recv_or_block(Waiter::new(parker.clone(), 1));

        assert!(matches!(q1.try_send(Value::Int(1), 0), SendResult::DirectSend));
        assert!(!q2.can_send(0));
        assert!(matches!(q2.try_send(Value::Int(2), 0), SendResult::WouldBlock(_)));

        q2.cancel_waiters(&parker);
        assert!(q2.waiting_receivers.is_empty());
    }

    #[test]
    fn test_close_wakes_everyone() {
        let waker = noop_waker();
        let mut q = QueueState::new(0);
        let receiver = Parker::new(&waker);
        q.recv_or_block(Waiter::new(receiver.clone(), 0));
        assert_eq!(q.close(&Value::Int(0)), 1);
        assert!(matches!(
            receiver.take().map(|w| w.outcome),
            Some(WakeOutcome::Received(Value::Int(0), false))
        ));
        assert!(matches!(q.try_send(Value::Int(1), 0), SendResult::Closed));
        assert!(matches!(q.try_recv(), RecvResult::Closed));
    }
}
