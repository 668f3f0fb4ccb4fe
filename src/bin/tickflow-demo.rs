//! Walkthrough of the crate's primitives on real time: a delay, a scheduled computation,
//! a periodic sequence, then the same ticks as cold and published streams.
//!
//! Set `RUST_LOG=tickflow=debug` to see timers being armed and released.

use tickflow::sequence::{self, PushSequence};
use tickflow::{AsyncSequence, AsyncSequenceExt, Error, Runtime, Timers, time, to_observable};

use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

const PERIOD: Duration = Duration::from_secs(1);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .init();

    let mut rt = Runtime::builder().thread_name("demo-timer").build()?;

    rt.block_on(sleep_test())?;
    info!("tested sleep_for");

    let answer = rt.block_on(schedule_test())?;
    info!(answer, "tested schedule");

    rt.block_on(periodic_schedule_test())?;
    info!("tested schedule_periodically");

    rt.block_on(observable_test())?;
    info!("tested to_observable");

    Ok(())
}

async fn sleep_test() -> Result<(), Error> {
    time::sleep_for(Duration::from_secs(2)).await?;
    info!("slept");
    Ok(())
}

async fn schedule_test() -> Result<i32, Error> {
    let at = Timers::current().now() + Duration::from_secs(1);

    let answer = time::schedule(at, || {
        info!("computing answer");
        42
    })
    .await?;

    info!(answer, "scheduled");
    Ok(answer)
}

async fn periodic_schedule_test() -> Result<(), Error> {
    let timers = Timers::current();
    let mut ticks = timers.schedule_periodically(timers.now(), PERIOD, |tick| {
        info!(tick, "producing tick");
        tick
    });

    let mut count = 0;
    let mut cursor = ticks.begin().await?;
    while !cursor.is_at_end() {
        let t = *cursor.current_value()?;
        info!(t, "for");
        count += 1;
        if t >= 4 {
            break;
        }
        cursor.advance().await?;
    }

    info!(ticks = count, "periodically scheduled");
    Ok(())
}

async fn observable_test() -> Result<(), Error> {
    let timers = Timers::current();
    let ticks =
        to_observable(move || timers.schedule_periodically(timers.now(), PERIOD, |tick| tick));

    let (sender, mut cold) = sequence::channel();
    let subscription = ticks.subscribe(sender);
    take_even(&mut cold, 5, "cold").await?;
    subscription.unsubscribe();

    let published = ticks.publish();
    let (first, mut hot_a) = sequence::channel();
    let (second, mut hot_b) = sequence::channel();
    published.subscribe(first);
    published.subscribe(second);

    let connection = published.connect();
    take_even(&mut hot_a, 5, "hot-a").await?;
    take_even(&mut hot_b, 5, "hot-b").await?;
    connection.disconnect();

    Ok(())
}

async fn take_even(ticks: &mut PushSequence<i64>, count: usize, label: &str) -> Result<(), Error> {
    let mut taken = 0;

    while taken < count && ticks.advance().await? {
        if let Some(&t) = ticks.current()
            && t % 2 == 0
        {
            info!(label, t, "on_next");
            taken += 1;
        }
    }

    Ok(())
}
