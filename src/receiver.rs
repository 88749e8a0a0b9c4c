//! # Receiver capability: two-phase readiness and consumption.
//!
//! A [`Receiver`] produces messages through a two-phase protocol:
//!
//! - [`ready()`](Receiver::ready) suspends until a message is available (or
//!   the receiver has terminated) and *parks* that message in the receiver's
//!   pending slot without handing it out.
//! - [`consume()`](Receiver::consume) returns the parked message.
//!
//! The split exists so that a [`Select`](crate::select::Select) or
//! [`Merge`](crate::merge::Merge) can await readiness on many receivers at
//! once and commit to exactly one of them: a `ready()` future that is dropped
//! before completing never takes a message, and a `ready()` that completed
//! keeps its message parked until somebody consumes it. Repeated `ready()`
//! calls return immediately while a message is parked.
//!
//! [`receive()`](Receiver::receive) is the everyday composition of the two
//! phases, and [`into_stream()`](Receiver::into_stream) adapts a receiver to
//! a [`Stream`] that ends cleanly on termination:
//!
//! ```no_run
//! use futures::StreamExt;
//! use taskbus::{Anycast, Receiver};
//!
//! # async fn demo() {
//! let channel = Anycast::<u32>::new("data", 8);
//! let receiver = channel.new_receiver();
//!
//! let mut doubled = receiver.map(|n| n * 2).into_stream();
//! while let Some(message) = doubled.next().await {
//!     println!("got {message}");
//! }
//! # }
//! ```

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::error::ReceiverStopped;

/// An endpoint to receive messages.
///
/// ## Contract
///
/// - `ready()` is cancel-safe: dropping its future never loses a message and
///   never leaves the receiver registered as a waiter.
/// - After `ready()` resolved to `true`, the next `consume()` returns the
///   message that completed it. Until then, further `ready()` calls return
///   immediately.
/// - After `ready()` resolved to `false` the receiver is terminated:
///   `consume()` reports [`ReceiverStopped`], now and on every later call.
/// - `consume()` without a preceding successful `ready()` is a programmer
///   error and panics.
#[async_trait]
pub trait Receiver<T: Send>: Send {
    /// Suspends until a message is parked in the pending slot, returning
    /// `true`, or until the receiver is permanently drained, returning
    /// `false`.
    async fn ready(&mut self) -> bool;

    /// Returns the message parked by the last successful [`ready()`](Self::ready).
    ///
    /// # Panics
    ///
    /// Panics if called while the receiver is live but no message is parked.
    fn consume(&mut self) -> Result<T, ReceiverStopped>;

    /// Waits for and returns the next message.
    async fn receive(&mut self) -> Result<T, ReceiverStopped> {
        self.ready().await;
        self.consume()
    }

    /// Returns a receiver that lazily applies `transform` to every message.
    ///
    /// Termination carries through unchanged: the mapped receiver stops
    /// exactly when `self` does.
    fn map<U, F>(self, transform: F) -> Map<Self, F, T>
    where
        Self: Sized,
        U: Send,
        F: FnMut(T) -> U + Send,
    {
        Map {
            inner: self,
            transform,
            _marker: std::marker::PhantomData,
        }
    }

    /// Adapts this receiver into a [`Stream`](futures::Stream) of messages.
    ///
    /// The stream ends when the receiver terminates; a [`ReceiverStopped`]
    /// is absorbed into the end of the stream rather than surfaced as an item.
    fn into_stream(self) -> BoxStream<'static, T>
    where
        Self: Sized + 'static,
        T: 'static,
    {
        futures::stream::unfold(self, |mut receiver| async move {
            receiver.receive().await.ok().map(|message| (message, receiver))
        })
        .boxed()
    }
}

#[async_trait]
impl<T, R> Receiver<T> for Box<R>
where
    T: Send,
    R: Receiver<T> + ?Sized,
{
    async fn ready(&mut self) -> bool {
        (**self).ready().await
    }

    fn consume(&mut self) -> Result<T, ReceiverStopped> {
        (**self).consume()
    }
}

/// A receiver applying a transform function on every received message.
///
/// Created by [`Receiver::map`].
pub struct Map<R, F, T> {
    inner: R,
    transform: F,
    _marker: std::marker::PhantomData<fn() -> T>,
}

#[async_trait]
impl<T, U, R, F> Receiver<U> for Map<R, F, T>
where
    T: Send,
    U: Send,
    R: Receiver<T>,
    F: FnMut(T) -> U + Send,
{
    async fn ready(&mut self) -> bool {
        self.inner.ready().await
    }

    fn consume(&mut self) -> Result<U, ReceiverStopped> {
        self.inner.consume().map(&mut self.transform)
    }
}

impl<R: std::fmt::Display, F, T> std::fmt::Display for Map<R, F, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Map:{}", self.inner)
    }
}
