//! Push-to-pull adapter.
//!
//! [`channel`] pairs a [`PushSender`], which any producer can push values into, with a
//! [`PushSequence`] that exposes them through the regular iteration protocol. The sender is
//! also a [`Subscriber`], so subscribing it to an [`Observable`] turns a push stream back
//! into a pull sequence.
//!
//! [`Observable`]: crate::bridge::Observable

use super::{AsyncSequence, Cancel, CancelHandle};
use crate::bridge::Subscriber;
use crate::error::Error;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use tracing::trace;

struct State<T> {
    items: VecDeque<T>,
    end: Option<Result<(), Error>>,
    closed: bool,
    waker: Option<Waker>,
}

struct Inner<T> {
    state: Mutex<State<T>>,
}

impl<T> Inner<T> {
    fn finish(&self, end: Result<(), Error>) {
        let waker = {
            let mut state = self.state.lock();
            if state.closed || state.end.is_some() {
                return;
            }
            state.end = Some(end);
            state.waker.take()
        };

        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T: Send> Cancel for Inner<T> {
    fn cancel(&self) {
        let (items, waker) = {
            let mut state = self.state.lock();
            state.closed = true;
            (std::mem::take(&mut state.items), state.waker.take())
        };

        drop(items);
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Creates a connected sender and sequence.
pub fn channel<T>() -> (PushSender<T>, PushSequence<T>) {
    let inner = Arc::new(Inner {
        state: Mutex::new(State {
            items: VecDeque::new(),
            end: None,
            closed: false,
            waker: None,
        }),
    });

    let sender = PushSender {
        inner: inner.clone(),
    };
    let sequence = PushSequence {
        inner,
        current: None,
        end_reported: false,
    };

    (sender, sequence)
}

/// Producer half of a [`channel`]. Dropping it completes the sequence.
pub struct PushSender<T> {
    inner: Arc<Inner<T>>,
}

impl<T> PushSender<T> {
    /// Queues a value. Returns false if the sequence was closed or already ended.
    pub fn send(&self, value: T) -> bool {
        let waker = {
            let mut state = self.inner.state.lock();
            if state.closed || state.end.is_some() {
                return false;
            }
            state.items.push_back(value);
            state.waker.take()
        };

        if let Some(waker) = waker {
            waker.wake();
        }

        true
    }

    /// Ends the sequence after the queued values.
    pub fn complete(&self) {
        self.inner.finish(Ok(()));
    }

    /// Ends the sequence with `error` after the queued values.
    pub fn fail(&self, error: Error) {
        self.inner.finish(Err(error));
    }

    /// Whether the consumer cancelled or dropped the sequence.
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }
}

impl<T> Drop for PushSender<T> {
    fn drop(&mut self) {
        self.inner.finish(Ok(()));
    }
}

impl<T> fmt::Debug for PushSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushSender")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T: Clone + Send> Subscriber<T> for PushSender<T> {
    fn on_next(&mut self, value: &T) {
        if !self.send(value.clone()) {
            trace!("value pushed into a closed sequence dropped");
        }
    }

    fn on_error(&mut self, error: &Error) {
        self.fail(Error::Upstream(error.to_string()));
    }

    fn on_complete(&mut self) {
        self.complete();
    }

    fn is_closed(&self) -> bool {
        PushSender::is_closed(self)
    }
}

/// Consumer half of a [`channel`].
///
/// Values are delivered in the order they were sent, then the end or the error.
/// Dropping the sequence closes it; later sends are refused.
pub struct PushSequence<T> {
    inner: Arc<Inner<T>>,
    current: Option<T>,
    end_reported: bool,
}

impl<T> PushSequence<T> {
    /// Values queued and not yet consumed.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().items.len()
    }
}

impl<T: Send + 'static> AsyncSequence for PushSequence<T> {
    type Item = T;

    fn poll_advance(&mut self, cx: &mut Context<'_>) -> Poll<Result<bool, Error>> {
        if self.end_reported {
            return Poll::Ready(Err(Error::UseAfterEnd));
        }

        self.current = None;
        let mut state = self.inner.state.lock();

        if let Some(value) = state.items.pop_front() {
            drop(state);
            self.current = Some(value);
            return Poll::Ready(Ok(true));
        }

        let end = if state.closed {
            Ok(())
        } else {
            match state.end.take() {
                Some(end) => end,
                None => {
                    state.waker = Some(cx.waker().clone());
                    return Poll::Pending;
                }
            }
        };

        state.closed = true;
        drop(state);
        self.end_reported = true;

        Poll::Ready(end.map(|()| false))
    }

    fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    fn cancel_handle(&self) -> CancelHandle {
        CancelHandle::new(&self.inner)
    }
}

impl<T> Drop for PushSequence<T> {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        state.closed = true;
        state.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::AsyncSequenceExt;

    use futures::executor::block_on;

    #[test]
    fn values_arrive_in_order_then_end() {
        let (sender, mut sequence) = channel();

        assert!(sender.send(1));
        assert!(sender.send(2));
        assert_eq!(sequence.pending(), 2);
        drop(sender);

        let seen = block_on(async {
            let mut seen = Vec::new();
            let mut cursor = sequence.begin().await?;
            while !cursor.is_at_end() {
                seen.push(*cursor.current_value()?);
                cursor.advance().await?;
            }
            Ok::<_, Error>(seen)
        })
        .unwrap();

        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn failure_is_reported_after_queued_values() {
        let (sender, mut sequence) = channel();

        sender.send("a");
        sender.fail(Error::Upstream("link lost".into()));

        block_on(async {
            assert!(sequence.advance().await.unwrap());
            assert_eq!(sequence.current(), Some(&"a"));
            assert!(matches!(sequence.advance().await, Err(Error::Upstream(_))));
            assert!(matches!(sequence.advance().await, Err(Error::UseAfterEnd)));
        });
    }

    #[test]
    fn cancelling_closes_the_sender() {
        let (sender, mut sequence) = channel::<u32>();

        sender.send(7);
        sequence.cancel_handle().cancel();

        assert!(sender.is_closed());
        assert!(!sender.send(8));
        assert!(!block_on(sequence.advance()).unwrap());
    }
}
