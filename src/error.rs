//! # Error types used by channels, receivers, and the selector.
//!
//! This module defines the error taxonomy of the crate:
//!
//! - [`ChannelClosed`] the terminal cause: a channel was closed.
//! - [`SendError`] errors raised when sending a message.
//! - [`ReceiverStopped`] a receiver terminated and will produce no more messages.
//! - [`SelectAborted`] terminal notices collected while tearing down a selector.
//!
//! Closed-channel failures always chain a [`ChannelClosed`] as their source, so
//! callers can walk the chain with [`std::error::Error::source`] to find out
//! which channel closed.
//!
//! Usage errors (calling `consume()` without a successful `ready()`, merging
//! zero receivers, constructing a channel with zero capacity) are programmer
//! errors and panic instead of returning one of these types.

use thiserror::Error;

/// A channel was closed.
///
/// This is never returned directly; it is the source of [`SendError::Closed`]
/// and of a [`ReceiverStopped`] produced by a drained receiver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("channel '{channel}' is closed")]
pub struct ChannelClosed {
    /// Name of the channel that was closed.
    pub channel: String,
}

impl ChannelClosed {
    pub(crate) fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }
}

/// # Errors produced when sending a message.
///
/// Senders fail fast: the message is either accepted by the channel or the
/// send returns an error, never half-delivered.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SendError {
    /// The channel was closed before the message was accepted.
    #[error("send failed: {0}")]
    Closed(#[from] ChannelClosed),
}

impl SendError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SendError::Closed(_) => "send_channel_closed",
        }
    }

    /// Whether the send failed because the channel was closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, SendError::Closed(_))
    }
}

/// # A receiver terminated cleanly and will produce no more messages.
///
/// Returned by `consume()` and `receive()` once a receiver is permanently
/// drained (its channel closed and its buffer empty, or its timer stopped).
/// Subsequent calls keep returning it.
#[derive(Error, Debug, Default)]
#[error("receiver stopped producing messages")]
pub struct ReceiverStopped {
    /// The channel closure that stopped the receiver, if that was the cause.
    #[source]
    pub cause: Option<ChannelClosed>,
}

impl ReceiverStopped {
    /// A receiver that stopped without an underlying channel closure
    /// (a stopped timer, an exhausted merge).
    pub fn new() -> Self {
        Self { cause: None }
    }

    /// A receiver that stopped because its channel was closed.
    pub fn channel_closed(channel: impl Into<String>) -> Self {
        Self {
            cause: Some(ChannelClosed::new(channel)),
        }
    }

    /// Whether the receiver stopped due to a channel closure.
    pub fn is_channel_closed(&self) -> bool {
        self.cause.is_some()
    }
}

/// # Terminal notices observed while tearing down a selector.
///
/// Returned by [`Select::stop`](crate::select::Select::stop) when retiring the
/// remaining inputs surfaces receivers that had already terminated. The
/// individual causes are preserved rather than reported one by one.
#[derive(Error, Debug)]
#[error("select teardown observed {} stopped receiver(s)", .causes.len())]
pub struct SelectAborted {
    /// One entry per input that turned out to be terminated during teardown.
    pub causes: Vec<ReceiverStopped>,
}
