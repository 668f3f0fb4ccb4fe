use tickflow::sequence::{self, PushSequence};
use tickflow::timer::{ManualTimers, TimerFacility};
use tickflow::{
    AsyncSequenceExt, Error, Runtime, Subscription, Task, Timers, subscriber, to_observable,
    yield_now,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PERIOD: Duration = Duration::from_secs(1);

fn manual_runtime() -> (Arc<ManualTimers>, Runtime) {
    let manual = ManualTimers::new();
    let rt = Runtime::builder()
        .timer_facility(manual.clone())
        .build()
        .unwrap();

    (manual, rt)
}

#[test]
fn test_published_fan_out_in_registration_order() {
    let (manual, mut rt) = manual_runtime();
    let log = Arc::new(Mutex::new(Vec::new()));

    rt.block_on(async {
        let timers = Timers::current();
        let published = to_observable(move || {
            timers.schedule_periodically(timers.now(), PERIOD, |tick| tick)
        })
        .publish();

        for name in ["a", "b", "c"] {
            let log = log.clone();
            published.subscribe(subscriber(move |tick: &i64| {
                log.lock().unwrap().push((name, *tick));
            }));
        }

        let connection = published.connect();
        assert!(connection.is_connected());
        yield_now().await;

        manual.fire_due();
        yield_now().await;
        manual.advance(PERIOD);
        yield_now().await;

        connection.disconnect();
        yield_now().await;
    });

    assert_eq!(
        *log.lock().unwrap(),
        vec![("a", 0), ("b", 0), ("c", 0), ("a", 1), ("b", 1), ("c", 1)]
    );
    assert_eq!(manual.counts().live, 0);
}

#[test]
fn test_unsubscribe_during_delivery_skips_only_that_subscriber() {
    let (manual, mut rt) = manual_runtime();
    let log = Arc::new(Mutex::new(Vec::new()));

    rt.block_on(async {
        let timers = Timers::current();
        let published = to_observable(move || {
            timers.schedule_periodically(timers.now(), PERIOD, |tick| tick)
        })
        .publish();

        let victim: Arc<Mutex<Option<Subscription>>> = Arc::default();

        let (a_log, target) = (log.clone(), victim.clone());
        published.subscribe(subscriber(move |tick: &i64| {
            a_log.lock().unwrap().push(("a", *tick));
            if *tick == 1
                && let Some(subscription) = target.lock().unwrap().as_ref()
            {
                subscription.unsubscribe();
            }
        }));

        let b_log = log.clone();
        let b = published.subscribe(subscriber(move |tick: &i64| {
            b_log.lock().unwrap().push(("b", *tick));
        }));
        *victim.lock().unwrap() = Some(b.clone());

        let c_log = log.clone();
        published.subscribe(subscriber(move |tick: &i64| {
            c_log.lock().unwrap().push(("c", *tick));
        }));

        let connection = published.connect();
        yield_now().await;
        manual.fire_due();
        yield_now().await;
        assert!(b.is_subscribed());

        for _ in 0..2 {
            manual.advance(PERIOD);
            yield_now().await;
        }

        assert!(!b.is_subscribed());
        assert_eq!(published.subscriber_count(), 2);
        connection.disconnect();
    });

    let log = log.lock().unwrap();
    let b_values: Vec<_> = log
        .iter()
        .filter(|(name, _)| *name == "b")
        .map(|(_, tick)| *tick)
        .collect();
    assert_eq!(b_values, vec![0]);
    assert_eq!(
        *log,
        vec![
            ("a", 0),
            ("b", 0),
            ("c", 0),
            ("a", 1),
            ("c", 1),
            ("a", 2),
            ("c", 2)
        ]
    );
}

#[test]
fn test_cold_subscriptions_drive_independent_sequences() {
    let (manual, mut rt) = manual_runtime();
    let log = Arc::new(Mutex::new(Vec::new()));

    rt.block_on(async {
        let timers = Timers::current();
        let observable = to_observable(move || {
            timers.schedule_periodically(timers.now(), PERIOD, |tick| tick)
        });

        let first_log = log.clone();
        let first = observable.subscribe(subscriber(move |tick: &i64| {
            first_log.lock().unwrap().push(("first", *tick));
        }));
        yield_now().await;
        manual.fire_due();
        yield_now().await;

        let second_log = log.clone();
        let second = observable.subscribe(subscriber(move |tick: &i64| {
            second_log.lock().unwrap().push(("second", *tick));
        }));
        yield_now().await;
        assert_eq!(manual.counts().live, 2);

        manual.advance(PERIOD);
        yield_now().await;

        first.unsubscribe();
        second.unsubscribe();
        yield_now().await;
    });

    let mut entries = log.lock().unwrap().clone();
    entries.sort();
    assert_eq!(
        entries,
        vec![("first", 0), ("first", 1), ("second", 0)]
    );
    assert_eq!(manual.counts().live, 0);
}

#[test]
fn test_work_error_reaches_subscriber_and_late_subscriber() {
    let (manual, mut rt) = manual_runtime();
    let events = Arc::new(Mutex::new(Vec::new()));

    rt.block_on(async {
        let timers = Timers::current();
        let published = to_observable(move || {
            timers.try_schedule_periodically(timers.now(), PERIOD, |tick| {
                if tick == 1 { Err("sensor offline") } else { Ok(tick) }
            })
        })
        .publish();

        let (next, error, complete) = (events.clone(), events.clone(), events.clone());
        published.subscribe(
            subscriber(move |tick: &i64| next.lock().unwrap().push(format!("next {tick}")))
                .with_error(move |e: &Error| error.lock().unwrap().push(format!("error {e}")))
                .with_complete(move || complete.lock().unwrap().push("complete".to_string())),
        );

        published.connect();
        yield_now().await;
        manual.fire_due();
        yield_now().await;
        manual.advance(PERIOD);
        yield_now().await;

        let late = events.clone();
        let subscription = published.subscribe(
            subscriber(|_: &i64| {}).with_error(move |_: &Error| {
                late.lock().unwrap().push("late error".to_string());
            }),
        );
        assert!(!subscription.is_subscribed());
    });

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "next 0".to_string(),
            "error work function failed: sensor offline".to_string(),
            "late error".to_string(),
        ]
    );
    assert_eq!(manual.counts().live, 0);
}

#[test]
fn test_observable_consumed_through_push_channel() {
    let (manual, mut rt) = manual_runtime();

    let seen = rt.block_on(async {
        let timers = Timers::current();
        let observable = to_observable(move || {
            timers.schedule_periodically(timers.now(), PERIOD, |tick| tick * 100)
        });

        let (sender, mut ticks): (_, PushSequence<i64>) = sequence::channel();
        let subscription = observable.subscribe(sender);

        let done = Arc::new(AtomicBool::new(false));
        let clock_done = done.clone();
        let clock = manual.clone();
        Task::spawn(async move {
            while !clock_done.load(Ordering::Acquire) {
                clock.fire_due();
                yield_now().await;
                clock.advance(PERIOD);
                yield_now().await;
            }
        });

        let mut seen = Vec::new();
        let mut cursor = ticks.begin().await?;
        while seen.len() < 3 {
            seen.push(*cursor.current_value()?);
            cursor.advance().await?;
        }

        done.store(true, Ordering::Release);
        subscription.unsubscribe();
        Ok::<_, Error>(seen)
    });

    assert_eq!(seen.unwrap(), vec![0, 100, 200]);
    drop(rt);
    assert_eq!(manual.counts().live, 0);
}
