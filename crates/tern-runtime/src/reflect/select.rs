//! `reflect.Select`: a select over a case list built at run time.

use super::value::ReflectValue;
use crate::panic::{Panic, RtResult};
use crate::select::{self as engine, Selected};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectDir {
    Send,
    Recv,
    Default,
}

/// One case. `chan` may be the invalid value or a nil channel, in which case
/// the case is never chosen.
#[derive(Debug, Clone)]
pub struct SelectCase {
    pub dir: SelectDir,
    pub chan: ReflectValue,
    pub send: ReflectValue,
}

impl SelectCase {
    pub fn send(chan: ReflectValue, value: ReflectValue) -> Self {
        Self { dir: SelectDir::Send, chan, send: value }
    }

    pub fn recv(chan: ReflectValue) -> Self {
        Self { dir: SelectDir::Recv, chan, send: ReflectValue::invalid() }
    }

    pub fn default_case() -> Self {
        Self { dir: SelectDir::Default, chan: ReflectValue::invalid(), send: ReflectValue::invalid() }
    }
}

/// Run the cases and return `(chosen index, received value, ok)`. The
/// received value is the invalid value unless a receive case was chosen.
pub async fn select(cases: &[SelectCase]) -> RtResult<(usize, ReflectValue, bool)> {
    let mut default_index = None;
    let mut engine_cases = Vec::with_capacity(cases.len());
    for (i, case) in cases.iter().enumerate() {
        match case.dir {
            SelectDir::Default => {
                if default_index.is_some() {
                    return Err(Panic::reflect("reflect.Select: multiple default cases"));
                }
                if case.chan.is_valid() {
                    return Err(Panic::reflect("reflect.Select: default case has Chan value"));
                }
                default_index = Some(i);
            }
            SelectDir::Send => {
                if !case.chan.is_valid() {
                    engine_cases.push(engine::SelectCase::send(i, None, Value::Nil));
                    continue;
                }
                let elem = case.chan.chan_elem("Select")?;
                let value = case.send.assign_to(&elem, "Select")?;
                engine_cases.push(engine::SelectCase::send(i, case.chan.chan_value(), value));
            }
            SelectDir::Recv => {
                if case.send.is_valid() {
                    return Err(Panic::reflect("reflect.Select: RecvDir case has Send value"));
                }
                if !case.chan.is_valid() {
                    engine_cases.push(engine::SelectCase::recv(i, None));
                    continue;
                }
                case.chan.chan_elem("Select")?;
                engine_cases.push(engine::SelectCase::recv(i, case.chan.chan_value()));
            }
        }
    }

    let outcome = engine::select(engine_cases, default_index.is_some()).await?;
    match outcome.selected {
        Selected::Case(i) if cases[i].dir == SelectDir::Recv => {
            let elem = cases[i].chan.chan_elem("Select")?;
            Ok((i, ReflectValue::received(elem, outcome.value), outcome.ok))
        }
        Selected::Case(i) => Ok((i, ReflectValue::invalid(), false)),
        Selected::Default => Ok((default_index.unwrap_or_default(), ReflectValue::invalid(), false)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::channel::Channel;
    use crate::reflect::{basic, value_of};
    use crate::value::Value;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll, Wake, Waker};
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

    #[test]
    fn test_dynamic_case_list() {
        let chans: Vec<Channel> = (0..3).map(|_| Channel::new(&basic(Kind::Int), 1).unwrap()).collect();
        chans[2].try_send(Value::Int(30)).unwrap();
        let cases: Vec<SelectCase> = chans.iter().map(|c| SelectCase::recv(value_of(c.clone()))).collect();
        let mut fut = Box::pin(select(&cases));
        match poll_once(fut.as_mut()) {
            Poll::Ready(Ok((chosen, v, ok))) => {
                assert_eq!(chosen, 2);
                assert_eq!(v.int().unwrap(), 30);
                assert!(ok);
            }
            _ => panic!("case 2 is ready"),
        }
    }

    #[test]
    fn test_send_and_default() {
        let ch = Channel::new(&basic(Kind::Int), 0).unwrap();
        let cases = vec![SelectCase::send(value_of(ch.clone()), value_of(1i64)), SelectCase::default_case()];
        let mut fut = Box::pin(select(&cases));
        match poll_once(fut.as_mut()) {
            Poll::Ready(Ok((chosen, v, _))) => {
                assert_eq!(chosen, 1);
                assert!(!v.is_valid());
            }
            _ => panic!("default should be taken"),
        }
    }

    #[test]
    fn test_two_defaults_fault() {
        let cases = vec![SelectCase::default_case(), SelectCase::default_case()];
        let mut fut = Box::pin(select(&cases));
        assert!(matches!(poll_once(fut.as_mut()), Poll::Ready(Err(_))));
    }
}
