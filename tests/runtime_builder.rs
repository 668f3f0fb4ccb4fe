use tickflow::timer::{ManualTimers, TimerFacility};
use tickflow::{Error, RuntimeBuilder, Timers};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[test]
fn test_builder_creation() {
    let rt = RuntimeBuilder::new().build().unwrap();
    drop(rt);
}

#[test]
fn test_builder_immediate_result() {
    let mut rt = RuntimeBuilder::new().build().unwrap();
    let value = 42;

    let result = rt.block_on(async { value });

    assert_eq!(result, 42, "Future should return correct value");
}

#[test]
fn test_builder_multiple_instances() {
    let mut rt1 = RuntimeBuilder::new().thread_name("first-timer").build().unwrap();
    let mut rt2 = RuntimeBuilder::new().thread_name("second-timer").build().unwrap();

    let result1 = rt1.block_on(async { 10 });
    let result2 = rt2.block_on(async { 20 });

    assert_eq!(result1, 10);
    assert_eq!(result2, 20);
}

#[test]
fn test_spawn_multiple_tasks() {
    let mut rt = RuntimeBuilder::new().timer_worker_threads(0).build().unwrap();
    let counter = Arc::new(Mutex::new(0));

    for _ in 0..5 {
        let counter_clone = counter.clone();
        rt.spawn(async move {
            *counter_clone.lock().unwrap() += 1;
        });
    }

    rt.block_on(async {});

    assert_eq!(*counter.lock().unwrap(), 5, "All 5 tasks should have run");
}

#[test]
fn test_builder_uses_supplied_facility() {
    let manual = ManualTimers::new();
    let mut rt = RuntimeBuilder::new()
        .timer_facility(manual.clone())
        .build()
        .unwrap();

    let elapsed = rt.block_on(async {
        let timers = Timers::current();
        timers.sleep_for(Duration::ZERO).await.unwrap();
        timers.facility().now() - manual.now()
    });

    assert_eq!(elapsed, Duration::ZERO);
    assert_eq!(manual.counts().created, 0);
}

#[test]
fn test_max_timers_limits_pending_waits() {
    let mut rt = RuntimeBuilder::new().max_timers(1).build().unwrap();

    let result = rt.block_on(async {
        let timers = Timers::current();
        let first = Box::pin(timers.sleep_for(Duration::from_millis(20)));
        let second = timers.sleep_for(Duration::from_millis(20));

        futures::future::select(first, second).await.factor_first().0
    });

    assert!(matches!(result, Err(Error::TimerCreation(_))));
}
