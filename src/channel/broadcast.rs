//! # Broadcast channel: per-receiver buffered fan-out.
//!
//! A [`Broadcast`] channel delivers every message to every live receiver.
//! Each receiver owns a private bounded buffer; a full buffer drops its
//! oldest message to admit the new one, so one slow receiver can never
//! stall the senders or the other receivers.
//!
//! ## Rules
//! - `send` never suspends; dispatch to all live receivers is serialized
//!   behind the channel's dispatch lock, so every receiver observes sends
//!   in the same order.
//! - The channel tracks receivers through **weak** references: dropping a
//!   receiver handle is enough to free its buffer. Stale registry entries
//!   are removed by the receiver's drop hook and swept on the send path.
//! - The most recent message is kept in the `latest` slot. With
//!   [`Broadcast::with_resend_latest`], new receivers are primed with it, so
//!   late subscribers to a slow stream don't wait for the next send.
//!
//! ## Diagram
//! ```text
//!    send(msg)
//!        │ (dispatch lock: latest ← msg)
//!        ├────────────► [buffer rx-1] ─► wakeup rx-1
//!        ├────────────► [buffer rx-2] ─► wakeup rx-2
//!        └──── stale weak entries pruned
//! ```
//!
//! ```no_run
//! use taskbus::{Broadcast, Receiver, Sender};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = Broadcast::<u64>::with_resend_latest("ticks");
//! let sender = channel.new_sender();
//!
//! sender.send(1).await?;
//! // Created after the send, still sees the latest message.
//! let mut late = channel.new_receiver();
//! assert_eq!(late.receive().await?, 1);
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, warn};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{timeout, Duration};

use crate::error::{ChannelClosed, ReceiverStopped, SendError};
use crate::receiver::Receiver;
use crate::sender::Sender;

/// Default capacity of a broadcast receiver's buffer.
pub const DEFAULT_RECEIVER_CAPACITY: usize = 50;

/// State serialized behind the dispatch lock: closing, the latest message,
/// and every send's fan-out run under it.
struct Dispatch<T> {
    closed: bool,
    latest: Option<T>,
}

/// Per-receiver record. The receiver handle holds the only strong reference;
/// the channel's registry keeps a weak one.
struct Slot<T> {
    id: u64,
    name: String,
    limit: usize,
    queue: Mutex<VecDeque<T>>,
    wakeup: Notify,
}

impl<T> Slot<T> {
    /// Enqueue on behalf of a sender, evicting the oldest message on overflow.
    fn enqueue(&self, message: T, channel: &str) {
        let mut queue = self.queue.lock();
        if queue.len() == self.limit {
            queue.pop_front();
            warn!(
                "broadcast receiver [{}:{}] is full; dropped the oldest message",
                channel, self.name,
            );
        }
        queue.push_back(message);
    }
}

struct Shared<T> {
    name: String,
    resend_latest: bool,
    dispatch: Mutex<Dispatch<T>>,
    receivers: DashMap<u64, Weak<Slot<T>>>,
    next_id: AtomicU64,
    /// Signaled when the receiver registry changes or the channel closes.
    registry_changed: Notify,
}

/// A channel that broadcasts every message to all live receivers.
///
/// Cheap to clone; clones share the same state.
pub struct Broadcast<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send> Broadcast<T> {
    /// Creates a broadcast channel with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), false)
    }

    /// Creates a broadcast channel that primes every new receiver with the
    /// latest message sent so far.
    pub fn with_resend_latest(name: impl Into<String>) -> Self {
        Self::build(name.into(), true)
    }

    fn build(name: String, resend_latest: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                name,
                resend_latest,
                dispatch: Mutex::new(Dispatch {
                    closed: false,
                    latest: None,
                }),
                receivers: DashMap::new(),
                next_id: AtomicU64::new(0),
                registry_changed: Notify::new(),
            }),
        }
    }

    /// Creates a new sender attached to this channel.
    pub fn new_sender(&self) -> BroadcastSender<T> {
        BroadcastSender {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Creates a new receiver with a generated name and the
    /// [default buffer capacity](DEFAULT_RECEIVER_CAPACITY).
    pub fn new_receiver(&self) -> BroadcastReceiver<T> {
        self.register(None, DEFAULT_RECEIVER_CAPACITY)
    }

    /// Creates a new receiver with an explicit name and buffer capacity.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is zero.
    pub fn new_receiver_named(&self, name: impl Into<String>, limit: usize) -> BroadcastReceiver<T> {
        self.register(Some(name.into()), limit)
    }

    fn register(&self, name: Option<String>, limit: usize) -> BroadcastReceiver<T> {
        assert!(limit > 0, "broadcast receiver capacity must be at least 1");
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(Slot {
            id,
            name: name.unwrap_or_else(|| format!("rx-{id}")),
            limit,
            queue: Mutex::new(VecDeque::with_capacity(limit.min(64))),
            wakeup: Notify::new(),
        });

        // Serialized with sends so the primed message and subsequent
        // deliveries cannot race or duplicate.
        {
            let dispatch = self.shared.dispatch.lock();
            if self.shared.resend_latest {
                if let Some(latest) = dispatch.latest.clone() {
                    slot.queue.lock().push_back(latest);
                }
            }
            self.shared.receivers.insert(id, Arc::downgrade(&slot));
        }
        self.shared.registry_changed.notify_waiters();

        BroadcastReceiver {
            shared: Arc::clone(&self.shared),
            slot,
            pending: None,
        }
    }

    /// Closes the channel. Idempotent.
    ///
    /// Receivers drain their buffers and then terminate; further sends fail.
    /// The `latest` slot is cleared.
    pub fn close(&self) {
        {
            let mut dispatch = self.shared.dispatch.lock();
            dispatch.closed = true;
            dispatch.latest = None;
        }
        for entry in self.shared.receivers.iter() {
            if let Some(slot) = entry.value().upgrade() {
                slot.wakeup.notify_waiters();
            }
        }
        self.shared.registry_changed.notify_waiters();
    }

    /// The channel's name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Whether the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.dispatch.lock().closed
    }

    /// The most recent message sent, if any send has happened and the
    /// channel is still open.
    pub fn latest(&self) -> Option<T> {
        self.shared.dispatch.lock().latest.clone()
    }

    /// Number of live receivers currently registered.
    pub fn receiver_count(&self) -> usize {
        self.shared
            .receivers
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }

    /// Suspends until at least `count` live receivers are registered.
    ///
    /// Returns `false` if the channel is closed before that happens.
    pub async fn wait_for_receiver(&self, count: usize) -> bool {
        loop {
            let notified = self.shared.registry_changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.receiver_count() >= count {
                return true;
            }
            if self.is_closed() {
                return false;
            }

            notified.await;
        }
    }

    /// Like [`wait_for_receiver`](Self::wait_for_receiver), giving up after
    /// `deadline` and returning `false`.
    pub async fn wait_for_receiver_timeout(&self, count: usize, deadline: Duration) -> bool {
        timeout(deadline, self.wait_for_receiver(count))
            .await
            .unwrap_or(false)
    }
}

impl<T> fmt::Display for Broadcast<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Broadcast:{}<receivers={}, closed={}>",
            self.shared.name,
            self.shared.receivers.len(),
            self.shared.dispatch.lock().closed,
        )
    }
}

/// A sender for a [`Broadcast`] channel.
///
/// Created with [`Broadcast::new_sender`]. Cheap to clone.
pub struct BroadcastSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BroadcastSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

#[async_trait]
impl<T: Clone + Send> Sender<T> for BroadcastSender<T> {
    /// Dispatches the message to every live receiver's buffer.
    ///
    /// Never suspends: a full receiver buffer drops its oldest message
    /// instead of applying backpressure. Stale registry entries found along
    /// the way are pruned.
    async fn send(&self, message: T) -> Result<(), SendError> {
        let mut stale = Vec::new();
        {
            let mut dispatch = self.shared.dispatch.lock();
            if dispatch.closed {
                return Err(ChannelClosed::new(&self.shared.name).into());
            }
            dispatch.latest = Some(message.clone());

            for entry in self.shared.receivers.iter() {
                match entry.value().upgrade() {
                    Some(slot) => {
                        slot.enqueue(message.clone(), &self.shared.name);
                        slot.wakeup.notify_one();
                    }
                    None => stale.push(*entry.key()),
                }
            }
        }
        for id in stale {
            self.shared.receivers.remove(&id);
            debug!(
                "broadcast channel '{}' pruned stale receiver {}",
                self.shared.name, id,
            );
        }
        Ok(())
    }
}

impl<T> fmt::Display for BroadcastSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BroadcastSender:{}", self.shared.name)
    }
}

/// A receiver for a [`Broadcast`] channel, owning its private buffer.
///
/// Created with [`Broadcast::new_receiver`]. Dropping the handle releases the
/// buffer and unregisters the receiver; no explicit close is needed.
pub struct BroadcastReceiver<T> {
    shared: Arc<Shared<T>>,
    slot: Arc<Slot<T>>,
    pending: Option<T>,
}

impl<T> BroadcastReceiver<T> {
    /// The receiver's name.
    pub fn name(&self) -> &str {
        &self.slot.name
    }

    /// Number of unconsumed messages in this receiver's buffer.
    pub fn len(&self) -> usize {
        self.slot.queue.lock().len()
    }

    /// Whether this receiver's buffer is currently empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<T: Clone + Send> Receiver<T> for BroadcastReceiver<T> {
    async fn ready(&mut self) -> bool {
        if self.pending.is_some() {
            return true;
        }
        loop {
            let notified = self.slot.wakeup.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.slot.queue.lock().pop_front() {
                self.pending = Some(message);
                return true;
            }
            if self.shared.dispatch.lock().closed {
                return false;
            }

            notified.await;
        }
    }

    fn consume(&mut self) -> Result<T, ReceiverStopped> {
        if let Some(message) = self.pending.take() {
            return Ok(message);
        }
        if self.shared.dispatch.lock().closed && self.slot.queue.lock().is_empty() {
            return Err(ReceiverStopped::channel_closed(&self.shared.name));
        }
        panic!("`consume()` requires a preceding successful `ready()`");
    }
}

impl<T> Drop for BroadcastReceiver<T> {
    fn drop(&mut self) {
        self.shared.receivers.remove(&self.slot.id);
        self.shared.registry_changed.notify_waiters();
    }
}

impl<T> fmt::Display for BroadcastReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BroadcastReceiver:{}:{}<limit={}, len={}>",
            self.shared.name,
            self.slot.name,
            self.slot.limit,
            self.slot.queue.lock().len(),
        )
    }
}
