//! Shared (published) streams.
//!
//! A [`Published`] stream drives exactly one sequence, started by
//! [`connect`](Published::connect), and fans every value out to the subscribers registered
//! at that moment, in registration order.
//!
//! Membership is guarded by a lock that is only held to add, remove or snapshot
//! subscribers. Delivery iterates over a snapshot without it, so a subscriber may
//! unsubscribe itself or others, or subscribe new ones, from inside a callback.

use super::{Factory, Subscriber, Subscription};
use crate::error::Error;
use crate::sequence::{AsyncSequence, AsyncSequenceExt, CancelHandle};
use crate::task::Task;

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

#[derive(Clone)]
enum Terminal {
    Completed,
    Failed(Arc<Error>),
}

impl Terminal {
    fn deliver<T>(&self, subscriber: &mut dyn Subscriber<T>) {
        match self {
            Terminal::Completed => subscriber.on_complete(),
            Terminal::Failed(error) => subscriber.on_error(error),
        }
    }
}

struct Member<T> {
    id: u64,
    subscription: Subscription,
    subscriber: Mutex<Box<dyn Subscriber<T>>>,
}

struct Members<T> {
    next_id: u64,
    slots: Vec<Arc<Member<T>>>,
    terminal: Option<Terminal>,
}

struct Hub<T> {
    members: Mutex<Members<T>>,
}

impl<T> Hub<T> {
    fn remove(&self, id: u64) {
        self.members.lock().slots.retain(|member| member.id != id);
    }

    fn deliver_next(&self, value: &T) {
        let snapshot = self.members.lock().slots.clone();

        for member in snapshot {
            if !member.subscription.is_subscribed() {
                continue;
            }

            let mut subscriber = member.subscriber.lock();
            if subscriber.is_closed() {
                drop(subscriber);
                member.subscription.unsubscribe();
                continue;
            }

            subscriber.on_next(value);
        }
    }

    fn terminate(&self, terminal: Terminal) {
        let members = {
            let mut members = self.members.lock();
            members.terminal = Some(terminal.clone());
            std::mem::take(&mut members.slots)
        };

        for member in members {
            if member.subscription.finish() {
                terminal.deliver(&mut **member.subscriber.lock());
            }
        }
    }
}

/// Handle to the running shared sequence of a [`Published`] stream.
#[derive(Clone)]
pub struct Connection {
    connected: Arc<AtomicBool>,
    cancel: CancelHandle,
}

impl Connection {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Cancels the shared sequence. Subscribers receive no further notification.
    pub fn disconnect(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            self.cancel.cancel();
            debug!("published stream disconnected");
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Hot stream sharing one sequence among all subscribers.
///
/// Created by [`Observable::publish`](super::Observable::publish).
pub struct Published<S: AsyncSequence> {
    factory: Factory<S>,
    hub: Arc<Hub<S::Item>>,
    connection: Mutex<Option<Connection>>,
}

impl<S> Published<S>
where
    S: AsyncSequence + Send + 'static,
    S::Item: Send + 'static,
{
    pub(crate) fn new(factory: Factory<S>) -> Self {
        Self {
            factory,
            hub: Arc::new(Hub {
                members: Mutex::new(Members {
                    next_id: 0,
                    slots: Vec::new(),
                    terminal: None,
                }),
            }),
            connection: Mutex::new(None),
        }
    }

    /// Registers a subscriber for the values produced from now on.
    ///
    /// If the stream already terminated, the subscriber receives the terminal
    /// notification immediately.
    pub fn subscribe<U>(&self, subscriber: U) -> Subscription
    where
        U: Subscriber<S::Item> + 'static,
    {
        let subscription = Subscription::new();
        let mut members = self.hub.members.lock();

        if let Some(terminal) = members.terminal.clone() {
            drop(members);
            subscription.finish();
            let mut subscriber = subscriber;
            terminal.deliver(&mut subscriber);
            return subscription;
        }

        let subscriber: Box<dyn Subscriber<S::Item>> = Box::new(subscriber);
        let id = members.next_id;
        members.next_id += 1;
        members.slots.push(Arc::new(Member {
            id,
            subscription: subscription.clone(),
            subscriber: Mutex::new(subscriber),
        }));
        drop(members);

        let hub: Weak<Hub<S::Item>> = Arc::downgrade(&self.hub);
        subscription.set_teardown(move || {
            if let Some(hub) = hub.upgrade() {
                hub.remove(id);
            }
        });

        trace!(id, "subscriber registered");
        subscription
    }

    /// Starts the shared sequence, or returns the connection already made.
    ///
    /// After [`Connection::disconnect`], connecting again starts a new sequence.
    ///
    /// # Panics
    /// Panics if it has to start a sequence outside of
    /// [`Runtime::block_on`](crate::Runtime::block_on).
    pub fn connect(&self) -> Connection {
        let mut current = self.connection.lock();

        if let Some(connection) = current.as_ref()
            && (connection.is_connected() || self.hub.members.lock().terminal.is_some())
        {
            return connection.clone();
        }

        let sequence = (self.factory)();
        let connection = Connection {
            connected: Arc::new(AtomicBool::new(true)),
            cancel: sequence.cancel_handle(),
        };

        Task::spawn(drive_shared(
            sequence,
            self.hub.clone(),
            connection.connected.clone(),
        ));
        debug!("published stream connected");

        *current = Some(connection.clone());
        connection
    }

    /// Number of subscribers currently registered.
    pub fn subscriber_count(&self) -> usize {
        self.hub.members.lock().slots.len()
    }
}

impl<S: AsyncSequence> fmt::Debug for Published<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Published")
            .field("connection", &*self.connection.lock())
            .finish_non_exhaustive()
    }
}

async fn drive_shared<S>(mut sequence: S, hub: Arc<Hub<S::Item>>, connected: Arc<AtomicBool>)
where
    S: AsyncSequence,
{
    while connected.load(Ordering::Acquire) {
        match sequence.advance().await {
            Ok(true) => {
                if !connected.load(Ordering::Acquire) {
                    break;
                }
                if let Some(value) = sequence.current() {
                    hub.deliver_next(value);
                }
            }
            Ok(false) => {
                if connected.swap(false, Ordering::AcqRel) {
                    hub.terminate(Terminal::Completed);
                }
                return;
            }
            Err(error) => {
                if connected.swap(false, Ordering::AcqRel) {
                    hub.terminate(Terminal::Failed(Arc::new(error)));
                }
                return;
            }
        }
    }

    sequence.cancel_handle().cancel();
}
