//! # taskbus
//!
//! **Taskbus** is a typed message-passing library for async tasks.
//!
//! It provides channels with opposite delivery rules, a fair multiplexer
//! over heterogeneous receivers, a stream merger, and a drift-aware periodic
//! timer. All of them meet in one capability pair: producers hold
//! a [`Sender`], consumers hold a [`Receiver`], and everything that yields
//! messages — channel endpoints, merged streams, timers — is a [`Receiver`]
//! and composes with everything else.
//!
//! ## Features
//!
//! | Area            | Description                                                          | Key types / traits                    |
//! |-----------------|----------------------------------------------------------------------|---------------------------------------|
//! | **Capabilities**| Two-phase `ready()`/`consume()` receive, mapping, stream adaptation. | [`Sender`], [`Receiver`]              |
//! | **Anycast**     | Bounded MPMC queue; each message reaches exactly one receiver.       | [`Anycast`]                           |
//! | **Broadcast**   | Fan-out with per-receiver bounded buffers and latest-message replay. | [`Broadcast`]                         |
//! | **Select**      | Await many receivers, consume exactly one, round-robin fairness.     | [`Select`](select::Select), [`Selected`](select::Selected) |
//! | **Merge**       | Fold many receivers into one arrival-ordered stream.                 | [`merge`], [`Merge`]                  |
//! | **Timer**       | Monotonic periodic receiver with pluggable missed-tick policies.     | [`Timer`], [`MissedTickPolicy`]       |
//! | **Errors**      | Typed errors with closed-channel causes chained as sources.          | [`SendError`], [`ReceiverStopped`]    |
//!
//! ```no_run
//! use std::time::Duration;
//! use taskbus::{Anycast, Receiver, Sender, Timer};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let channel = Anycast::<String>::new("jobs", 8);
//!     let sender = channel.new_sender();
//!     let mut receiver = channel.new_receiver();
//!
//!     tokio::spawn(async move {
//!         sender.send("hello".to_string()).await.ok();
//!     });
//!
//!     println!("got: {}", receiver.receive().await?);
//!
//!     // Receivers compose: a timer is just another receiver.
//!     let mut ticks = Timer::periodic(Duration::from_secs(1));
//!     println!("tick, {:?} late", ticks.receive().await?);
//!     Ok(())
//! }
//! ```
//!
//! ---

mod channel;
mod error;
mod merge;
mod receiver;
mod sender;
mod timer;

pub mod select;

// ---- Public re-exports ----

pub use channel::{
    Anycast, AnycastReceiver, AnycastSender, Broadcast, BroadcastReceiver, BroadcastSender,
    DEFAULT_RECEIVER_CAPACITY, SLOW_SEND_WARN_AFTER,
};
pub use error::{ChannelClosed, ReceiverStopped, SelectAborted, SendError};
pub use merge::{merge, Merge};
pub use receiver::{Map, Receiver};
pub use sender::Sender;
pub use timer::{
    MissedTickPolicy, SkipMissedAndDrift, SkipMissedAndResync, Timer, TimerHandle,
    TriggerAllMissed,
};
