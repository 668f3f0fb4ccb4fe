//! Sequence-to-stream bridge.
//!
//! An [`Observable`] turns a factory of pull sequences into a push stream. Every
//! [`subscribe`](Observable::subscribe) creates a fresh sequence and spawns a task driving
//! it, delivering each value to the subscriber until the sequence ends, fails, or the
//! subscriber goes away. [`Observable::publish`] instead shares one driven sequence among
//! all subscribers.

pub mod publish;

pub use publish::{Connection, Published};

use crate::error::Error;
use crate::sequence::{AsyncSequence, AsyncSequenceExt};
use crate::task::Task;

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

/// Receiver of a push stream.
///
/// A subscriber sees any number of `on_next` calls followed by at most one of `on_error`
/// or `on_complete`.
pub trait Subscriber<T>: Send {
    fn on_next(&mut self, value: &T);

    fn on_error(&mut self, error: &Error);

    fn on_complete(&mut self);

    /// Whether the subscriber stopped accepting values. Checked before every delivery; a
    /// closed subscriber is treated like an unsubscription.
    fn is_closed(&self) -> bool {
        false
    }
}

impl<T, S: Subscriber<T> + ?Sized> Subscriber<T> for Box<S> {
    fn on_next(&mut self, value: &T) {
        (**self).on_next(value);
    }

    fn on_error(&mut self, error: &Error) {
        (**self).on_error(error);
    }

    fn on_complete(&mut self) {
        (**self).on_complete();
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

type NextFn<T> = Box<dyn FnMut(&T) + Send>;
type ErrorFn = Box<dyn FnMut(&Error) + Send>;
type CompleteFn = Box<dyn FnMut() + Send>;

/// Subscriber made of closures, built by [`subscriber`].
pub struct CallbackSubscriber<T> {
    next: NextFn<T>,
    error: Option<ErrorFn>,
    complete: Option<CompleteFn>,
}

/// Subscriber calling `on_next` for every value and ignoring the end of the stream.
pub fn subscriber<T, F>(on_next: F) -> CallbackSubscriber<T>
where
    F: FnMut(&T) + Send + 'static,
{
    CallbackSubscriber {
        next: Box::new(on_next),
        error: None,
        complete: None,
    }
}

impl<T> CallbackSubscriber<T> {
    pub fn with_error<F>(mut self, on_error: F) -> Self
    where
        F: FnMut(&Error) + Send + 'static,
    {
        self.error = Some(Box::new(on_error));
        self
    }

    pub fn with_complete<F>(mut self, on_complete: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.complete = Some(Box::new(on_complete));
        self
    }
}

impl<T> Subscriber<T> for CallbackSubscriber<T> {
    fn on_next(&mut self, value: &T) {
        (self.next)(value);
    }

    fn on_error(&mut self, error: &Error) {
        match self.error.as_mut() {
            Some(on_error) => on_error(error),
            None => debug!(%error, "stream failed with no error callback"),
        }
    }

    fn on_complete(&mut self) {
        if let Some(on_complete) = self.complete.as_mut() {
            on_complete();
        }
    }
}

type Teardown = Box<dyn FnOnce() + Send>;

struct SubscriptionState {
    active: AtomicBool,
    teardown: Mutex<Option<Teardown>>,
}

/// Handle to an active subscription.
///
/// Clones refer to the same subscription. Dropping the handle does not unsubscribe.
#[derive(Clone)]
pub struct Subscription {
    state: Arc<SubscriptionState>,
}

impl Subscription {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(SubscriptionState {
                active: AtomicBool::new(true),
                teardown: Mutex::new(None),
            }),
        }
    }

    /// Installs what [`unsubscribe`](Self::unsubscribe) runs; runs it now if the
    /// subscription already ended.
    pub(crate) fn set_teardown<F>(&self, teardown: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut slot = self.state.teardown.lock();
            if self.is_subscribed() {
                *slot = Some(Box::new(teardown));
                return;
            }
        }

        teardown();
    }

    pub fn is_subscribed(&self) -> bool {
        self.state.active.load(Ordering::Acquire)
    }

    /// Stops delivery to this subscriber. Idempotent, callable from any thread.
    ///
    /// No terminal notification is delivered after an unsubscription.
    pub fn unsubscribe(&self) {
        if !self.finish() {
            return;
        }

        let teardown = self.state.teardown.lock().take();
        if let Some(teardown) = teardown {
            teardown();
        }
        trace!("unsubscribed");
    }

    /// Marks the subscription ended. Returns true for the caller that ended it.
    pub(crate) fn finish(&self) -> bool {
        self.state.active.swap(false, Ordering::AcqRel)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

type Factory<S> = Arc<dyn Fn() -> S + Send + Sync>;

/// Cold push stream over a sequence factory.
pub struct Observable<S> {
    factory: Factory<S>,
}

/// Wraps a sequence factory into an [`Observable`].
///
/// ```ignore
/// let ticks = to_observable(|| interval(Duration::from_secs(1)));
/// let subscription = ticks.subscribe(subscriber(|tick: &i64| println!("{tick}")));
/// ```
pub fn to_observable<S, F>(factory: F) -> Observable<S>
where
    F: Fn() -> S + Send + Sync + 'static,
{
    Observable {
        factory: Arc::new(factory),
    }
}

impl<S> Clone for Observable<S> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
        }
    }
}

impl<S> Observable<S>
where
    S: AsyncSequence + Send + 'static,
    S::Item: Send + 'static,
{
    /// Starts an independent sequence and drives it into `subscriber`.
    ///
    /// # Panics
    /// Panics if called outside of [`Runtime::block_on`](crate::Runtime::block_on).
    pub fn subscribe<U>(&self, subscriber: U) -> Subscription
    where
        U: Subscriber<S::Item> + 'static,
    {
        let sequence = (self.factory)();
        let subscription = Subscription::new();

        let cancel = sequence.cancel_handle();
        subscription.set_teardown(move || cancel.cancel());

        Task::spawn(drive(sequence, subscriber, subscription.clone()));

        subscription
    }

    /// Shares a single underlying sequence among every subscriber. Nothing runs until
    /// [`Published::connect`] is called.
    pub fn publish(&self) -> Published<S> {
        Published::new(self.factory.clone())
    }
}

impl<S> fmt::Debug for Observable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable").finish_non_exhaustive()
    }
}

async fn drive<S, U>(mut sequence: S, mut subscriber: U, subscription: Subscription)
where
    S: AsyncSequence,
    U: Subscriber<S::Item>,
{
    loop {
        if !subscription.is_subscribed() || subscriber.is_closed() {
            break;
        }

        match sequence.advance().await {
            Ok(true) => {
                if !subscription.is_subscribed() || subscriber.is_closed() {
                    break;
                }
                if let Some(value) = sequence.current() {
                    subscriber.on_next(value);
                }
            }
            Ok(false) => {
                if subscription.finish() {
                    subscriber.on_complete();
                }
                return;
            }
            Err(error) => {
                if subscription.finish() {
                    subscriber.on_error(&error);
                }
                return;
            }
        }
    }

    subscription.finish();
    sequence.cancel_handle().cancel();
    trace!("subscriber gone, sequence cancelled");
}
