//! Iteration protocol over asynchronous sequences.
//!
//! ```ignore
//! let mut cursor = sequence.begin().await?;
//! while !cursor.is_at_end() {
//!     println!("{}", cursor.current_value()?);
//!     cursor.advance().await?;
//! }
//! ```
//!
//! The value returned by [`Cursor::current_value`] borrows the cursor, so it cannot be
//! held across the next [`Cursor::advance`], which reuses its storage.

use super::AsyncSequence;
use crate::error::Error;

use futures::Stream;
use futures::stream::FusedStream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

/// Async helpers available on every [`AsyncSequence`].
pub trait AsyncSequenceExt: AsyncSequence {
    /// Advances the sequence once. See [`AsyncSequence::poll_advance`].
    fn advance(&mut self) -> Advance<'_, Self> {
        Advance { sequence: self }
    }

    /// Performs the first advance and yields a cursor positioned on its result.
    fn begin(&mut self) -> Begin<'_, Self> {
        Begin {
            sequence: Some(self),
        }
    }

    /// Stream of clones of the produced values.
    ///
    /// The stream ends after the sequence ends or after yielding its error.
    fn values(self) -> Values<Self>
    where
        Self: Sized,
        Self::Item: Clone,
    {
        Values {
            sequence: self,
            done: false,
        }
    }
}

impl<S: AsyncSequence + ?Sized> AsyncSequenceExt for S {}

/// Future returned by [`AsyncSequenceExt::advance`].
#[must_use = "futures do nothing unless awaited"]
pub struct Advance<'a, S: ?Sized> {
    sequence: &'a mut S,
}

impl<S: AsyncSequence + ?Sized> Future for Advance<'_, S> {
    type Output = Result<bool, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.sequence.poll_advance(cx)
    }
}

/// Future returned by [`AsyncSequenceExt::begin`].
#[must_use = "futures do nothing unless awaited"]
pub struct Begin<'a, S: ?Sized> {
    sequence: Option<&'a mut S>,
}

impl<'a, S: AsyncSequence + ?Sized> Future for Begin<'a, S> {
    type Output = Result<Cursor<'a, S>, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let result = match self.sequence.as_deref_mut() {
            Some(sequence) => ready!(sequence.poll_advance(cx)),
            None => return Poll::Ready(Err(Error::UseAfterEnd)),
        };

        Poll::Ready(match (result, self.sequence.take()) {
            (Ok(has_value), Some(sequence)) => Ok(Cursor {
                sequence,
                at_end: !has_value,
            }),
            (Err(error), _) => Err(error),
            (Ok(_), None) => Err(Error::UseAfterEnd),
        })
    }
}

/// Position in a sequence, produced by [`AsyncSequenceExt::begin`].
pub struct Cursor<'a, S: ?Sized> {
    sequence: &'a mut S,
    at_end: bool,
}

impl<S: AsyncSequence + ?Sized> Cursor<'_, S> {
    pub fn is_at_end(&self) -> bool {
        self.at_end
    }

    /// Value at the cursor.
    ///
    /// # Errors
    /// [`Error::UseAfterEnd`] once the cursor reached the end.
    pub fn current_value(&self) -> Result<&S::Item, Error> {
        if self.at_end {
            return Err(Error::UseAfterEnd);
        }

        self.sequence.current().ok_or(Error::UseAfterEnd)
    }

    /// Moves to the next value.
    ///
    /// An error from the sequence is returned here and leaves the cursor at the end.
    /// Advancing a cursor already at the end yields [`Error::UseAfterEnd`].
    pub async fn advance(&mut self) -> Result<(), Error> {
        if self.at_end {
            return Err(Error::UseAfterEnd);
        }

        let advance = Advance {
            sequence: &mut *self.sequence,
        };

        match advance.await {
            Ok(has_value) => {
                self.at_end = !has_value;
                Ok(())
            }
            Err(error) => {
                self.at_end = true;
                Err(error)
            }
        }
    }

    /// The sequence being iterated.
    pub fn sequence(&self) -> &S {
        &*self.sequence
    }
}

/// Stream returned by [`AsyncSequenceExt::values`].
#[must_use = "streams do nothing unless polled"]
pub struct Values<S> {
    sequence: S,
    done: bool,
}

impl<S> Values<S> {
    /// Consumes the stream, returning the sequence it drives.
    pub fn into_inner(self) -> S {
        self.sequence
    }
}

impl<S> Stream for Values<S>
where
    S: AsyncSequence + Unpin,
    S::Item: Clone,
{
    type Item = Result<S::Item, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        if this.done {
            return Poll::Ready(None);
        }

        let item = match ready!(this.sequence.poll_advance(cx)) {
            Ok(true) => this.sequence.current().cloned().ok_or(Error::UseAfterEnd),
            Ok(false) => {
                this.done = true;
                return Poll::Ready(None);
            }
            Err(error) => Err(error),
        };

        if item.is_err() {
            this.done = true;
        }

        Poll::Ready(Some(item))
    }
}

impl<S> FusedStream for Values<S>
where
    S: AsyncSequence + Unpin,
    S::Item: Clone,
{
    fn is_terminated(&self) -> bool {
        self.done
    }
}
