//! # Select: await readiness on many receivers, consume exactly one.
//!
//! [`Select`] multiplexes a set of receivers: each call to
//! [`next()`](Select::next) suspends until one input has a message (or
//! terminates), consumes exactly that input, and yields a [`Selected`]
//! binding the input's [`ReceiverKey`] to the outcome.
//!
//! ## Rules
//! - **Fairness**: the winner among simultaneously ready inputs is picked
//!   by a start index that rotates on every yield, so a hot source cannot
//!   starve the others.
//! - **Cancellation safety**: readiness probes never take a message; a
//!   message observed by a probe stays parked in its receiver until the
//!   selector commits to it. Dropping the selector mid-wait (or dropping a
//!   `next()` future) eats nothing: every input's next `receive()` yields
//!   its next unconsumed message.
//! - **Termination**: an input that terminates yields one final selection
//!   with [`was_stopped`](Selected::was_stopped) set and is then retired.
//!   `next()` returns `None` once every input has been retired.
//!
//! Inputs with different message types are selected by mapping them into a
//! caller-defined enum first (see [`Receiver::map`]), which also gives the
//! dispatch `match` compile-time exhaustiveness:
//!
//! ```no_run
//! use std::time::Duration;
//! use taskbus::select::{selected_from, Select};
//! use taskbus::{Anycast, Receiver, Timer};
//!
//! enum Event {
//!     Data(String),
//!     Tick(Duration),
//! }
//!
//! # async fn demo() {
//! let channel = Anycast::<String>::new("data", 8);
//! let mut data = channel.new_receiver().map(Event::Data);
//! let mut ticks = Timer::timeout(Duration::from_secs(1)).map(Event::Tick);
//!
//! let mut select = Select::new();
//! let from_data = select.add(&mut data);
//! select.add(&mut ticks);
//!
//! while let Some(selected) = select.next().await {
//!     if selected.was_stopped() {
//!         if selected_from(&selected, from_data) {
//!             break; // the data channel closed
//!         }
//!         continue;
//!     }
//!     match selected.into_message() {
//!         Event::Data(message) => println!("got {message}"),
//!         Event::Tick(drift) => println!("tick, {drift:?} late"),
//!     }
//! }
//! # }
//! ```

mod selected;

use std::fmt;
use std::task::Poll;

use futures::future::poll_fn;
use futures::FutureExt;

use crate::error::SelectAborted;
use crate::receiver::Receiver;

pub use selected::{selected_from, ReceiverKey, Selected};

struct Entry<'a, T> {
    key: ReceiverKey,
    recv: &'a mut (dyn Receiver<T> + 'a),
    retired: bool,
}

/// A fair, cancellation-safe multiplexer over borrowed receivers.
///
/// Inputs are registered with [`add`](Select::add), which returns the
/// [`ReceiverKey`] used to attribute selections. The selector borrows its
/// inputs for its whole lifetime; dropping it returns them untouched.
pub struct Select<'a, T> {
    inputs: Vec<Entry<'a, T>>,
    start: usize,
}

impl<'a, T: Send> Select<'a, T> {
    /// Creates an empty selector.
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            start: 0,
        }
    }

    /// Registers a receiver and returns its key.
    pub fn add<R: Receiver<T>>(&mut self, receiver: &'a mut R) -> ReceiverKey {
        let key = ReceiverKey(self.inputs.len());
        self.inputs.push(Entry {
            key,
            recv: receiver,
            retired: false,
        });
        key
    }

    /// Number of inputs that have not yet been retired.
    pub fn live(&self) -> usize {
        self.inputs.iter().filter(|entry| !entry.retired).count()
    }

    /// Suspends until one input is ready, consumes it, and yields the
    /// tagged outcome. Returns `None` once every input has terminated.
    ///
    /// Cancel-safe: dropping the returned future consumes nothing.
    pub async fn next(&mut self) -> Option<Selected<T>> {
        let count = self.inputs.len();
        if self.inputs.iter().all(|entry| entry.retired) {
            return None;
        }

        let start = self.start % count;
        let mut probes: Vec<Option<_>> = self
            .inputs
            .iter_mut()
            .map(|entry| (!entry.retired).then(|| entry.recv.ready()))
            .collect();

        // Race the probes, scanning from the rotating start index so ties
        // are broken fairly.
        let (winner, alive) = poll_fn(|cx| {
            for offset in 0..count {
                let index = (start + offset) % count;
                if let Some(probe) = probes[index].as_mut() {
                    if let Poll::Ready(alive) = probe.as_mut().poll(cx) {
                        return Poll::Ready((index, alive));
                    }
                }
            }
            Poll::Pending
        })
        .await;
        drop(probes);

        self.start = self.start.wrapping_add(1);
        let entry = &mut self.inputs[winner];
        let result = entry.recv.consume();
        if !alive {
            entry.retired = true;
        }
        Some(Selected {
            key: entry.key,
            result,
        })
    }

    /// Tears the selector down, surfacing terminal notices found while
    /// retiring the remaining inputs.
    ///
    /// Inputs that already have a parked message keep it (it will be the
    /// next message their owner receives); inputs that turn out to be
    /// terminated contribute their notice to the aggregate error.
    pub fn stop(mut self) -> Result<(), SelectAborted> {
        let mut causes = Vec::new();
        for entry in self.inputs.iter_mut().filter(|entry| !entry.retired) {
            if let Some(false) = entry.recv.ready().now_or_never() {
                if let Err(stopped) = entry.recv.consume() {
                    causes.push(stopped);
                }
            }
        }
        if causes.is_empty() {
            Ok(())
        } else {
            Err(SelectAborted { causes })
        }
    }
}

impl<'a, T: Send> Default for Select<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> fmt::Display for Select<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let retired = self.inputs.iter().filter(|entry| entry.retired).count();
        write!(
            f,
            "Select<inputs={}, retired={}>",
            self.inputs.len(),
            retired,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Anycast;
    use crate::error::ReceiverStopped;
    use crate::sender::Sender;
    use crate::timer::Timer;
    use std::time::Duration;

    #[tokio::test]
    async fn empty_selector_finishes_immediately() {
        let mut select = Select::<u32>::new();
        assert!(select.next().await.is_none());
    }

    #[tokio::test]
    async fn two_hot_inputs_alternate() {
        let left = Anycast::<u32>::new("left", 10);
        let right = Anycast::<u32>::new("right", 10);
        for n in 0..5 {
            left.new_sender().send(n).await.unwrap();
            right.new_sender().send(100 + n).await.unwrap();
        }

        let mut left_rx = left.new_receiver();
        let mut right_rx = right.new_receiver();
        let mut select = Select::new();
        let from_left = select.add(&mut left_rx);
        let from_right = select.add(&mut right_rx);

        let mut left_count = 0;
        let mut right_count = 0;
        for _ in 0..10 {
            let selected = select.next().await.unwrap();
            if selected_from(&selected, from_left) {
                left_count += 1;
            } else {
                assert!(selected_from(&selected, from_right));
                right_count += 1;
            }
        }
        assert_eq!(left_count, 5);
        assert_eq!(right_count, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_channel_yields_message_then_stop_then_timer_keeps_ticking() {
        let channel = Anycast::<&str>::new("data", 4);
        let sender = channel.new_sender();

        tokio::spawn({
            let channel = channel.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                sender.send("payload").await.unwrap();
                tokio::time::sleep(Duration::from_millis(100)).await;
                channel.close();
            }
        });

        let mut timer = Timer::periodic(Duration::from_millis(500));
        let mut data = channel.new_receiver();
        let mut select = Select::new();
        let from_timer = select.add(&mut timer);
        let from_data = select.add(&mut data);

        let first = select.next().await.unwrap();
        assert!(selected_from(&first, from_data));
        assert_eq!(*first.message(), "payload");

        let second = select.next().await.unwrap();
        assert!(selected_from(&second, from_data));
        assert!(second.was_stopped());

        for _ in 0..3 {
            let tick = select.next().await.unwrap();
            assert!(selected_from(&tick, from_timer));
            assert!(!tick.was_stopped());
        }
    }

    #[tokio::test]
    async fn dropping_the_selector_eats_no_messages() {
        let channel = Anycast::<u32>::new("safe", 4);
        let sender = channel.new_sender();
        sender.send(1).await.unwrap();
        sender.send(2).await.unwrap();

        let mut receiver = channel.new_receiver();
        let mut idle = Timer::periodic(Duration::from_secs(3600));
        {
            let mut select = Select::new();
            select.add(&mut idle);
            let from_rx = select.add(&mut receiver);
            let selected = select.next().await.unwrap();
            assert!(selected_from(&selected, from_rx));
            assert_eq!(selected.into_message(), 1);
        }

        // The loser probe left the second message untouched.
        assert_eq!(receiver.receive().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn cancelled_next_keeps_parked_messages_for_the_owner() {
        let channel = Anycast::<u32>::new("parked", 4);
        let mut receiver = channel.new_receiver();
        let mut idle = Timer::periodic(Duration::from_secs(3600));

        let mut select = Select::new();
        select.add(&mut idle);
        select.add(&mut receiver);

        // No message yet: the next() future goes pending, then is dropped.
        futures::future::select(
            std::pin::pin!(select.next()),
            std::pin::pin!(tokio::task::yield_now()),
        )
        .await;

        channel.new_sender().send(5).await.unwrap();
        let selected = select.next().await.unwrap();
        assert_eq!(selected.into_message(), 5);
    }

    #[tokio::test]
    async fn stop_aggregates_terminal_notices() {
        let closed = Anycast::<u32>::new("closed", 1);
        closed.close();
        let open = Anycast::<u32>::new("open", 1);
        open.new_sender().send(8).await.unwrap();

        let mut dead_rx = closed.new_receiver();
        let mut live_rx = open.new_receiver();
        let mut select = Select::new();
        select.add(&mut dead_rx);
        select.add(&mut live_rx);

        let aborted = select.stop().unwrap_err();
        assert_eq!(aborted.causes.len(), 1);
        assert!(aborted.causes[0].is_channel_closed());

        // The live receiver's message survived teardown.
        assert_eq!(live_rx.receive().await.unwrap(), 8);

        let stopped: ReceiverStopped = dead_rx.receive().await.unwrap_err();
        assert!(stopped.is_channel_closed());
    }
}
