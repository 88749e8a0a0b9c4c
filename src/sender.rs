//! # Sender capability.
//!
//! A [`Sender`] delivers one message into a channel or fails with
//! a [`SendError`]. Senders are cheap handles: a channel can hand out any
//! number of them and they are all peers. Dropping every sender does **not**
//! close the channel; channels only close through their explicit `close()`.

use async_trait::async_trait;

use crate::error::SendError;

/// An endpoint to send messages into a channel.
///
/// `send` suspends until the message has been accepted by the channel and
/// resolves to an error if the channel is closed before acceptance. What
/// "accepted" means is channel specific: an anycast channel places the message
/// in its shared queue (blocking while the queue is full), a broadcast channel
/// enqueues it to every live receiver without ever blocking.
#[async_trait]
pub trait Sender<T: Send>: Send + Sync {
    /// Sends a message across the channel.
    async fn send(&self, message: T) -> Result<(), SendError>;
}
