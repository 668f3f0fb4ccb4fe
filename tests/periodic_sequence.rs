use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;
use proptest::prelude::*;
use tickflow::timer::{ManualTimers, TimerFacility};
use tickflow::{AsyncSequence, AsyncSequenceExt, Error, SequenceState, Timers};

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::thread;
use std::time::Duration;

const PERIOD: Duration = Duration::from_secs(1);

#[test]
fn test_ticks_until_four_then_break_releases_timer() {
    let manual = ManualTimers::new();
    let timers = Timers::from(manual.clone());
    let origin = manual.now();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut pool = LocalPool::new();

    let record = seen.clone();
    let clock = manual.clone();
    pool.spawner()
        .spawn_local(async move {
            let mut ticks = timers.schedule_periodically(origin, PERIOD, move |tick| {
                (tick, clock.elapsed())
            });

            let mut cursor = ticks.begin().await.unwrap();
            while !cursor.is_at_end() {
                let (t, at) = *cursor.current_value().unwrap();
                record.lock().unwrap().push((t, at));
                if t >= 4 {
                    assert!(!cursor.sequence().is_armed());
                    break;
                }
                cursor.advance().await.unwrap();
            }
        })
        .unwrap();

    pool.run_until_stalled();
    manual.fire_due();
    pool.run_until_stalled();
    for _ in 1..=4 {
        manual.advance(PERIOD);
        pool.run_until_stalled();
    }

    let expected: Vec<_> = (0..=4i64).map(|t| (t, PERIOD * t as u32)).collect();
    assert_eq!(*seen.lock().unwrap(), expected);

    let counts = manual.counts();
    assert_eq!(counts.created, 5);
    assert_eq!(counts.fired, 5);
    assert_eq!(counts.released, 5);
    assert_eq!(counts.live, 0);
    assert_eq!(manual.advance(PERIOD * 10), 0);
}

#[test]
fn test_work_error_on_third_tick_ends_iteration() {
    let manual = ManualTimers::new();
    let timers = Timers::from(manual.clone());
    let outcome = Arc::new(Mutex::new(None));
    let mut pool = LocalPool::new();

    let result = outcome.clone();
    pool.spawner()
        .spawn_local(async move {
            let mut ticks = timers.try_schedule_periodically(timers.now(), PERIOD, |tick| {
                if tick == 2 { Err("tick 2 failed") } else { Ok(tick) }
            });

            let mut values = Vec::new();
            let mut cursor = ticks.begin().await.unwrap();
            let error = loop {
                values.push(*cursor.current_value().unwrap());
                if let Err(error) = cursor.advance().await {
                    break error;
                }
            };

            assert!(cursor.is_at_end());
            assert!(matches!(cursor.current_value(), Err(Error::UseAfterEnd)));
            assert!(matches!(cursor.advance().await, Err(Error::UseAfterEnd)));
            drop(cursor);
            assert_eq!(ticks.state(), SequenceState::Completed);

            *result.lock().unwrap() = Some((values, error.to_string()));
        })
        .unwrap();

    pool.run_until_stalled();
    manual.fire_due();
    pool.run_until_stalled();
    for _ in 0..2 {
        manual.advance(PERIOD);
        pool.run_until_stalled();
    }

    let (values, error) = outcome.lock().unwrap().take().unwrap();
    assert_eq!(values, vec![0, 1]);
    assert_eq!(error, "work function failed: tick 2 failed");
    assert_eq!(manual.counts().live, 0);
}

#[test]
fn test_cancel_from_another_thread_ends_pending_advance() {
    let manual = ManualTimers::new();
    let timers = Timers::from(manual.clone());
    let mut ticks = timers.schedule_periodically(timers.now() + PERIOD, PERIOD, |tick| tick);
    let cancel = ticks.cancel_handle();
    let ended = Arc::new(Mutex::new(None));
    let mut pool = LocalPool::new();

    let result = ended.clone();
    pool.spawner()
        .spawn_local(async move {
            let advanced = ticks.advance().await;
            *result.lock().unwrap() = Some((advanced.unwrap(), ticks.state()));
        })
        .unwrap();

    pool.run_until_stalled();
    assert_eq!(manual.counts().live, 1);

    thread::spawn(move || {
        cancel.cancel();
        cancel.cancel();
    })
    .join()
    .unwrap();

    pool.run_until_stalled();

    assert_eq!(ended.lock().unwrap().take(), Some((false, SequenceState::Closed)));
    let counts = manual.counts();
    assert_eq!((counts.live, counts.released, counts.fired), (0, 1, 0));
    assert_eq!(manual.advance(PERIOD * 5), 0);
}

#[test]
fn test_zero_sleep_and_past_schedule_complete_without_timer() {
    let manual = ManualTimers::new();
    let timers = Timers::from(manual.clone());
    let mut pool = LocalPool::new();

    let answer = pool.run_until(async {
        timers.sleep_for(Duration::ZERO).await.unwrap();
        timers.sleep_until(timers.now()).await.unwrap();
        timers.schedule(timers.now(), || 42).await.unwrap()
    });

    assert_eq!(answer, 42);
    assert_eq!(manual.counts().created, 0);
}

#[test]
fn test_completed_suspension_reports_use_after_end() {
    let manual = ManualTimers::new();
    let timers = Timers::from(manual.clone());
    let waker = futures::task::noop_waker();
    let mut cx = Context::from_waker(&waker);

    let mut answer = timers.schedule(timers.now() + PERIOD, || 42);
    assert!(Pin::new(&mut answer).poll(&mut cx).is_pending());
    assert!(answer.is_suspended());

    manual.advance(PERIOD);
    assert!(matches!(Pin::new(&mut answer).poll(&mut cx), Poll::Ready(Ok(42))));
    assert!(matches!(
        Pin::new(&mut answer).poll(&mut cx),
        Poll::Ready(Err(Error::UseAfterEnd))
    ));
    assert_eq!(manual.counts().live, 0);
}

#[test]
fn test_timer_creation_failure_fails_the_wait() {
    let manual = ManualTimers::new();
    let timers = Timers::from(manual.clone());
    let mut pool = LocalPool::new();

    manual.fail_next_create();
    let result = pool.run_until(timers.sleep_for(PERIOD));

    assert!(matches!(result, Err(Error::TimerCreation(_))));
    assert_eq!(manual.counts().live, 0);
}

#[test]
fn test_values_stream_yields_clones_then_error() {
    use futures::StreamExt;

    let manual = ManualTimers::new();
    let timers = Timers::from(manual.clone());
    let mut values = timers
        .try_schedule_periodically(timers.now(), PERIOD, |tick| {
            if tick < 2 { Ok(tick) } else { Err("done") }
        })
        .values();
    let waker = futures::task::noop_waker();
    let mut cx = Context::from_waker(&waker);

    let mut seen = Vec::new();
    for _ in 0..3 {
        assert!(values.poll_next_unpin(&mut cx).is_pending());
        manual.advance(PERIOD);
        match values.poll_next_unpin(&mut cx) {
            Poll::Ready(Some(item)) => seen.push(item.map_err(|error| error.to_string())),
            other => panic!("unexpected poll result: {other:?}"),
        }
    }

    assert_eq!(
        seen,
        vec![Ok(0), Ok(1), Err("work function failed: done".to_string())]
    );
    assert!(matches!(values.poll_next_unpin(&mut cx), Poll::Ready(None)));
    assert_eq!(values.into_inner().state(), SequenceState::Completed);
}

proptest! {
    #[test]
    fn interleaved_waits_never_leak(
        waits in prop::collection::vec((1u64..50, any::<bool>()), 1..32)
    ) {
        let manual = ManualTimers::new();
        let timers = Timers::from(manual.clone());
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut kept = Vec::new();
        for &(millis, keep) in &waits {
            let mut sleep = timers.sleep_for(Duration::from_millis(millis));
            prop_assert!(Pin::new(&mut sleep).poll(&mut cx).is_pending());
            if keep {
                kept.push(sleep);
            }
        }

        manual.advance(Duration::from_millis(50));
        for mut sleep in kept {
            prop_assert!(matches!(Pin::new(&mut sleep).poll(&mut cx), Poll::Ready(Ok(()))));
        }

        let counts = manual.counts();
        let kept = waits.iter().filter(|(_, keep)| *keep).count() as u64;
        prop_assert_eq!(counts.live, 0);
        prop_assert_eq!(counts.created, waits.len() as u64);
        prop_assert_eq!(counts.released, waits.len() as u64);
        prop_assert_eq!(counts.fired, kept);
    }
}
