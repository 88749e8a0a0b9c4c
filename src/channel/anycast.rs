//! # Anycast channel: bounded MPMC queue with exactly-once delivery.
//!
//! An [`Anycast`] channel is a single bounded queue shared by any number of
//! senders and receivers. Every message is received by exactly one receiver.
//!
//! ## Rules
//! - Senders **block** while the queue is full (backpressure, no loss).
//! - Receivers pop the head into their pending slot inside `ready()`; the
//!   pop and the `not_full` wakeup happen under the channel lock, so a
//!   message is owned by at most one receiver at all times.
//! - `close()` is idempotent: it wakes every blocked sender and receiver so
//!   they observe the terminal state. Pending messages can still be drained.
//! - Wakeups are FIFO per wait queue ([`Notify`] semantics), so neither
//!   senders nor receivers can be starved while traffic keeps flowing.
//!
//! A sender blocked longer than [`SLOW_SEND_WARN_AFTER`] logs a saturation
//! warning once per send. This is purely observational.
//!
//! ```no_run
//! use taskbus::{Anycast, Receiver, Sender};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = Anycast::<String>::new("jobs", 16);
//! let sender = channel.new_sender();
//! let mut receiver = channel.new_receiver();
//!
//! sender.send("first".to_string()).await?;
//! assert_eq!(receiver.receive().await?, "first");
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::timeout;

use crate::error::{ChannelClosed, ReceiverStopped, SendError};
use crate::receiver::Receiver;
use crate::sender::Sender;

/// How long a sender may block on a full queue before a saturation warning
/// is logged.
pub const SLOW_SEND_WARN_AFTER: Duration = Duration::from_secs(5);

struct State<T> {
    buffer: VecDeque<T>,
    closed: bool,
}

struct Shared<T> {
    name: String,
    limit: usize,
    state: Mutex<State<T>>,
    /// Signaled when a message is dequeued or the channel closes.
    not_full: Notify,
    /// Signaled when a message is enqueued or the channel closes.
    not_empty: Notify,
}

/// A channel where each message is delivered to exactly one receiver.
///
/// The channel itself is a cheap handle; clones share the same queue.
/// It stays usable as long as any handle (channel, sender, or receiver)
/// exists, and only [`close()`](Anycast::close) shuts it down.
pub struct Anycast<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Anycast<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send> Anycast<T> {
    /// Creates a channel with the given name and queue capacity.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is zero.
    pub fn new(name: impl Into<String>, limit: usize) -> Self {
        assert!(limit > 0, "anycast channel capacity must be at least 1");
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                limit,
                state: Mutex::new(State {
                    buffer: VecDeque::with_capacity(limit),
                    closed: false,
                }),
                not_full: Notify::new(),
                not_empty: Notify::new(),
            }),
        }
    }

    /// Creates a new sender attached to this channel.
    pub fn new_sender(&self) -> AnycastSender<T> {
        AnycastSender {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Creates a new receiver attached to this channel.
    pub fn new_receiver(&self) -> AnycastReceiver<T> {
        AnycastReceiver {
            shared: Arc::clone(&self.shared),
            pending: None,
        }
    }

    /// Closes the channel. Idempotent.
    ///
    /// Further sends fail with [`SendError::Closed`]. Receivers drain the
    /// remaining messages and then terminate.
    pub fn close(&self) {
        self.shared.state.lock().closed = true;
        self.shared.not_full.notify_waiters();
        self.shared.not_empty.notify_waiters();
    }

    /// The channel's name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The queue capacity.
    pub fn limit(&self) -> usize {
        self.shared.limit
    }

    /// Whether the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Number of messages currently queued.
    pub fn len(&self) -> usize {
        self.shared.state.lock().buffer.len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> fmt::Display for Anycast<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        write!(
            f,
            "Anycast:{}<limit={}, len={}, closed={}>",
            self.shared.name,
            self.shared.limit,
            state.buffer.len(),
            state.closed,
        )
    }
}

/// A sender for an [`Anycast`] channel.
///
/// Created with [`Anycast::new_sender`]. Cheap to clone; all clones are peers.
pub struct AnycastSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for AnycastSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

#[async_trait]
impl<T: Send> Sender<T> for AnycastSender<T> {
    /// Sends a message, blocking while the queue is full.
    ///
    /// Cancel-safe: dropping the future before it resolves leaves the queue
    /// untouched; once it resolved, the message is in the queue and cannot be
    /// retracted.
    async fn send(&self, message: T) -> Result<(), SendError> {
        let mut warned = false;
        loop {
            let notified = self.shared.not_full.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.shared.state.lock();
                if state.closed {
                    return Err(ChannelClosed::new(&self.shared.name).into());
                }
                if state.buffer.len() < self.shared.limit {
                    state.buffer.push_back(message);
                    drop(state);
                    self.shared.not_empty.notify_one();
                    return Ok(());
                }
            }

            if warned {
                notified.await;
            } else if timeout(SLOW_SEND_WARN_AFTER, notified).await.is_err() {
                warn!(
                    "anycast channel '{}' is saturated: sender blocked for over {:?}",
                    self.shared.name, SLOW_SEND_WARN_AFTER,
                );
                warned = true;
            }
        }
    }
}

impl<T> fmt::Display for AnycastSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnycastSender:{}", self.shared.name)
    }
}

/// A receiver for an [`Anycast`] channel.
///
/// Created with [`Anycast::new_receiver`]. Receivers are peers competing for
/// messages from the shared queue.
pub struct AnycastReceiver<T> {
    shared: Arc<Shared<T>>,
    pending: Option<T>,
}

#[async_trait]
impl<T: Send> Receiver<T> for AnycastReceiver<T> {
    async fn ready(&mut self) -> bool {
        if self.pending.is_some() {
            return true;
        }
        loop {
            let notified = self.shared.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.shared.state.lock();
                if let Some(message) = state.buffer.pop_front() {
                    self.pending = Some(message);
                    drop(state);
                    self.shared.not_full.notify_one();
                    return true;
                }
                if state.closed {
                    return false;
                }
            }

            notified.await;
        }
    }

    fn consume(&mut self) -> Result<T, ReceiverStopped> {
        if let Some(message) = self.pending.take() {
            return Ok(message);
        }
        let state = self.shared.state.lock();
        if state.closed && state.buffer.is_empty() {
            return Err(ReceiverStopped::channel_closed(&self.shared.name));
        }
        panic!("`consume()` requires a preceding successful `ready()`");
    }
}

impl<T> fmt::Display for AnycastReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnycastReceiver:{}", self.shared.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn fifo_through_competing_senders() {
        let channel = Anycast::<&str>::new("a", 2);
        let mut receiver = channel.new_receiver();

        channel.new_sender().send("x").await.unwrap();
        channel.new_sender().send("y").await.unwrap();

        assert_eq!(receiver.receive().await.unwrap(), "x");

        channel.new_sender().send("z").await.unwrap();

        assert_eq!(receiver.receive().await.unwrap(), "y");
        assert_eq!(receiver.receive().await.unwrap(), "z");
    }

    #[tokio::test]
    async fn exactly_once_across_receivers() {
        let channel = Anycast::<u32>::new("work", 4);
        let sender = channel.new_sender();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let mut receiver = channel.new_receiver();
            handles.push(tokio::spawn(async move {
                let mut got = Vec::new();
                while let Ok(n) = receiver.receive().await {
                    got.push(n);
                }
                got
            }));
        }

        for n in 0..100u32 {
            sender.send(n).await.unwrap();
        }
        channel.close();

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn backpressure_caps_queue_and_blocks_surplus_senders() {
        let channel = Anycast::<u32>::new("tight", 2);
        let delivered = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for n in 0..5u32 {
            let sender = channel.new_sender();
            let delivered = Arc::clone(&delivered);
            handles.push(tokio::spawn(async move {
                sender.send(n).await.unwrap();
                delivered.fetch_add(1, Ordering::SeqCst);
            }));
        }

        tokio::task::yield_now().await;
        assert_eq!(channel.len(), 2);
        assert_eq!(delivered.load(Ordering::SeqCst), 2);

        let mut receiver = channel.new_receiver();
        for _ in 0..5 {
            receiver.receive().await.unwrap();
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(delivered.load(Ordering::SeqCst), 5);
        assert!(channel.is_empty());
    }

    #[tokio::test]
    async fn close_lets_receivers_drain_then_stops_them() {
        let channel = Anycast::<u32>::new("drain", 4);
        let sender = channel.new_sender();
        let mut receiver = channel.new_receiver();

        sender.send(1).await.unwrap();
        sender.send(2).await.unwrap();
        channel.close();

        assert!(sender.send(3).await.unwrap_err().is_closed());
        assert_eq!(receiver.receive().await.unwrap(), 1);
        assert_eq!(receiver.receive().await.unwrap(), 2);

        let stopped = receiver.receive().await.unwrap_err();
        assert!(stopped.is_channel_closed());
        // Termination keeps being reported.
        assert!(receiver.receive().await.is_err());
    }

    #[tokio::test]
    async fn close_wakes_blocked_receiver() {
        let channel = Anycast::<u32>::new("idle", 1);
        let mut receiver = channel.new_receiver();

        let waiter = tokio::spawn(async move { receiver.receive().await });
        tokio::task::yield_now().await;

        channel.close();
        assert!(waiter.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn ready_is_sticky_until_consumed() {
        let channel = Anycast::<u32>::new("sticky", 1);
        let mut receiver = channel.new_receiver();

        channel.new_sender().send(7).await.unwrap();
        assert!(receiver.ready().await);
        assert!(receiver.ready().await);
        assert_eq!(receiver.consume().unwrap(), 7);
    }

    #[tokio::test]
    async fn map_transforms_and_forwards_termination() {
        let channel = Anycast::<u32>::new("nums", 4);
        channel.new_sender().send(20).await.unwrap();
        channel.close();

        let mut mapped = channel.new_receiver().map(|n| n + 1);
        assert_eq!(mapped.receive().await.unwrap(), 21);
        assert!(mapped.receive().await.is_err());
    }

    #[test]
    #[should_panic(expected = "capacity")]
    fn zero_capacity_panics() {
        let _ = Anycast::<u32>::new("bad", 0);
    }
}
