use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tern_runtime::{make_channel, ChanDir, Channel, Panic, RtResult, Value};
use tern_vm::{go, sleep, yield_now, PanicPolicy, RuntimeConfig, Scheduler, VmError};

fn run<T>(main: impl Future<Output = RtResult<T>>) -> Result<T, VmError> {
    Scheduler::new().block_on(main)
}

fn int_chan(cap: i64) -> Channel {
    make_channel(cap, Value::Int(0), ChanDir::Both).unwrap()
}

#[test]
fn test_unbuffered_send_waits_for_receiver() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let ch = int_chan(0);
    let result = run(async {
        let (tx, l) = (ch.clone(), log.clone());
        go(async move {
            l.borrow_mut().push("send start");
            tx.send(Value::Int(7)).await?;
            l.borrow_mut().push("send done");
            Ok(())
        })?;
        yield_now().await;
        log.borrow_mut().push("recv start");
        let v = ch.recv().await?;
        log.borrow_mut().push("recv done");
        yield_now().await;
        Ok(v)
    });
    assert_eq!(result.unwrap().as_int(), Some(7));
    assert_eq!(*log.borrow(), vec!["send start", "recv start", "recv done", "send done"]);
}

#[test]
fn test_pipeline_with_close() {
    let total = run(async {
        let ch = int_chan(4);
        let tx = ch.clone();
        go(async move {
            for i in 1..=100 {
                tx.send(Value::Int(i)).await?;
            }
            tx.close()
        })?;
        let mut total = 0;
        loop {
            let (v, ok) = ch.recv_with_ok().await?;
            if !ok {
                break;
            }
            total += v.as_int().unwrap_or(0);
        }
        Ok(total)
    });
    assert_eq!(total.unwrap(), 5050);
}

#[test]
fn test_blocked_receivers_served_first_come_first_served() {
    let log = Rc::new(RefCell::new(Vec::new()));
    run(async {
        let ch = int_chan(0);
        let done = int_chan(2);
        for name in ["first", "second"] {
            let (rx, done, log) = (ch.clone(), done.clone(), log.clone());
            go(async move {
                let v = rx.recv().await?;
                log.borrow_mut().push((name, v.as_int().unwrap_or(-1)));
                done.send(Value::Int(0)).await
            })?;
        }
        yield_now().await;
        ch.send(Value::Int(1)).await?;
        ch.send(Value::Int(2)).await?;
        done.recv().await?;
        done.recv().await?;
        Ok(())
    })
    .unwrap();
    assert_eq!(*log.borrow(), vec![("first", 1), ("second", 2)]);
}

#[test]
fn test_many_goroutines_fan_in() {
    let sum = run(async {
        let results = int_chan(0);
        for i in 0..50 {
            let tx = results.clone();
            go(async move { tx.send(Value::Int(i)).await })?;
        }
        let mut sum = 0;
        for _ in 0..50 {
            sum += results.recv().await?.as_int().unwrap_or(0);
        }
        Ok(sum)
    });
    assert_eq!(sum.unwrap(), (0..50).sum::<i64>());
}

#[test]
fn test_deadlock_detected() {
    let err = run(async { int_chan(0).recv().await }).unwrap_err();
    assert!(err.is_deadlock());
    assert!(err.to_string().starts_with("all goroutines are asleep - deadlock!"));
}

#[test]
fn test_deadlock_lists_blocked_goroutines() {
    let err = run(async {
        let ch = int_chan(0);
        let tx = ch.clone();
        go(async move { tx.send(Value::Int(1)).await })?;
        go(async move { std::future::pending::<RtResult<()>>().await })?;
        int_chan(0).recv().await?;
        Ok(())
    })
    .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("goroutine 1 [blocked]"));
    assert!(msg.contains("goroutine 2 [blocked]"));
    assert!(msg.contains("goroutine 3 [blocked]"));
}

#[test]
fn test_goroutine_fault_aborts_run() {
    let err = run(async {
        go(async { Err(Panic::new("worker failed")) })?;
        yield_now().await;
        yield_now().await;
        Ok(())
    })
    .unwrap_err();
    match err {
        VmError::GoroutinePanicked { id, panic } => {
            assert_eq!(id, 2);
            assert_eq!(panic.message(), "worker failed");
        }
        other => panic!("expected a goroutine fault, got {}", other),
    }
}

#[test]
fn test_goroutine_fault_logged_under_log_policy() {
    let config = RuntimeConfig::default().with_goroutine_panic(PanicPolicy::Log);
    let result = Scheduler::with_config(config).block_on(async {
        go(async { Err(Panic::new("worker failed")) })?;
        yield_now().await;
        yield_now().await;
        Ok(42)
    });
    assert_eq!(result.unwrap(), 42);
}

#[test]
fn test_main_fault_is_reported() {
    let err = run(async {
        let ch = int_chan(0);
        ch.close()?;
        ch.close()?;
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(err, VmError::Panicked(_)));
    assert_eq!(err.to_string(), "panic: close of closed channel");
}

#[test]
fn test_sleep_orders_by_deadline() {
    let order = Rc::new(RefCell::new(Vec::new()));
    let done = int_chan(2);
    let start = Instant::now();
    run(async {
        for ms in [30u64, 5] {
            let (order, done) = (order.clone(), done.clone());
            go(async move {
                sleep(Duration::from_millis(ms)).await;
                order.borrow_mut().push(ms);
                done.send(Value::Int(0)).await
            })?;
        }
        done.recv().await?;
        done.recv().await?;
        Ok(())
    })
    .unwrap();
    assert_eq!(*order.borrow(), vec![5, 30]);
    assert!(start.elapsed() >= Duration::from_millis(30));
}

#[test]
fn test_remaining_goroutines_dropped_when_main_returns() {
    let token = Rc::new(());
    let held = token.clone();
    let mut sched = Scheduler::new();
    sched
        .block_on(async move {
            go(async move {
                let _held = held;
                std::future::pending::<RtResult<()>>().await
            })?;
            yield_now().await;
            Ok(())
        })
        .unwrap();
    assert_eq!(Rc::strong_count(&token), 1);
    assert_eq!(sched.live_goroutines(), 0);

    // The scheduler is reusable after a run.
    assert_eq!(sched.block_on(async { Ok::<_, Panic>("again") }).unwrap(), "again");
}

#[test]
fn test_go_outside_run_faults() {
    assert!(go(async { Ok::<(), Panic>(()) }).is_err());
    assert!(!tern_vm::is_running());
}
