//! # Channel implementations.
//!
//! Two channel flavors with the same sender/receiver capabilities but
//! opposite delivery rules:
//!
//! - [`Anycast`]: a bounded shared queue; every message is delivered to
//!   exactly one receiver and senders block while the queue is full.
//! - [`Broadcast`]: fan-out; every live receiver observes every message in
//!   its own bounded buffer, and a full buffer drops its oldest message
//!   instead of blocking the sender.

mod anycast;
mod broadcast;

pub use anycast::{Anycast, AnycastReceiver, AnycastSender, SLOW_SEND_WARN_AFTER};
pub use broadcast::{Broadcast, BroadcastReceiver, BroadcastSender, DEFAULT_RECEIVER_CAPACITY};
