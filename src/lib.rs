//! Timer-driven lazy asynchronous sequences.
//!
//! This crate lets a computation suspend until a point in time, one-shot or periodic, and
//! resume with a value, without blocking a thread while it waits. It owns the whole protocol
//! between a platform-style timer facility, whose callbacks fire on arbitrary threads, and
//! the consumer iterating over the produced values.
//!
//! # Architecture
//!
//! - **Timer facility** ([`timer`]): create / set / close timers with callbacks. Comes as a
//!   threaded implementation and a manually driven virtual clock.
//! - **Timer binding** ([`timer::binding`]): one owned timer per pending wait, released on
//!   every exit path.
//! - **Suspension points** ([`time`]): delay, scheduled work and periodic tick, all driven
//!   through the same ready / suspend / resume protocol.
//! - **Sequences** ([`sequence`]): lazy pull sequences with cursor iteration and
//!   cancellation from any thread.
//! - **Bridge** ([`bridge`]): pull sequences exposed as cold or published push streams.
//! - **Runtime**: a small executor running the consumers, fed by timer wakes from other
//!   threads.
//!
//! # Example
//!
//! ```ignore
//! use tickflow::{AsyncSequenceExt, Runtime, time};
//! use std::time::Duration;
//!
//! let mut rt = Runtime::new()?;
//! rt.block_on(async {
//!     time::sleep_for(Duration::from_secs(2)).await?;
//!
//!     let mut ticks = time::interval(Duration::from_secs(1));
//!     let mut cursor = ticks.begin().await?;
//!     while *cursor.current_value()? < 4 {
//!         cursor.advance().await?;
//!     }
//!     Ok::<_, tickflow::Error>(())
//! })?;
//! ```

pub mod bridge;
mod builder;
pub mod error;
mod runtime;
pub mod sequence;
mod task;
pub mod time;
pub mod timer;
mod utils;

pub use bridge::{Observable, Published, Subscriber, Subscription, subscriber, to_observable};
pub use builder::RuntimeBuilder;
pub use error::{BoxError, Error, TimerError};
pub use runtime::{Runtime, yield_now};
pub use sequence::{AsyncSequence, AsyncSequenceExt, CancelHandle, Cursor, SequenceState};
pub use task::{JoinHandle, Task};
pub use time::Timers;
