//! # Merge: combine many receivers into one.
//!
//! [`merge`] folds any number of receivers of the same message type into a
//! single [`Receiver`] yielding their messages in arrival order. Messages of
//! one input are never reordered; across inputs there is no ordering. Inputs
//! that terminate are absorbed silently, and the merged receiver terminates
//! once all of them have.
//!
//! ```no_run
//! use taskbus::{merge, Broadcast, Receiver};
//!
//! # async fn demo() {
//! let alpha = Broadcast::<u32>::new("alpha");
//! let beta = Broadcast::<u32>::new("beta");
//!
//! let mut all = merge(vec![alpha.new_receiver(), beta.new_receiver()]);
//! while let Ok(message) = all.receive().await {
//!     println!("got {message}");
//! }
//! # }
//! ```
//!
//! To merge receivers of different concrete types, box them first (boxed
//! receivers are receivers too).

use std::collections::VecDeque;
use std::fmt;
use std::task::Poll;

use async_trait::async_trait;
use futures::future::poll_fn;

use crate::error::ReceiverStopped;
use crate::receiver::Receiver;

/// Merges the given receivers into one.
///
/// # Panics
///
/// Panics if `receivers` is empty.
pub fn merge<T, R>(receivers: Vec<R>) -> Merge<T>
where
    T: Send,
    R: Receiver<T> + 'static,
{
    assert!(
        !receivers.is_empty(),
        "merge requires at least one receiver"
    );
    Merge {
        inputs: receivers
            .into_iter()
            .map(|receiver| Input {
                recv: Box::new(receiver),
                terminated: false,
            })
            .collect(),
        arrivals: VecDeque::new(),
    }
}

struct Input<T> {
    recv: Box<dyn Receiver<T>>,
    terminated: bool,
}

/// A receiver yielding the union of its inputs' messages.
///
/// Created with [`merge`]. Owns its inputs; dropping it drops them along
/// with any internally queued messages. Dropping is probe-safe: an input
/// whose readiness was observed but not yet drained keeps its message
/// parked, and the input is dropped with it.
pub struct Merge<T> {
    inputs: Vec<Input<T>>,
    arrivals: VecDeque<T>,
}

#[async_trait]
impl<T: Send> Receiver<T> for Merge<T> {
    async fn ready(&mut self) -> bool {
        loop {
            if !self.arrivals.is_empty() {
                return true;
            }
            if self.inputs.iter().all(|input| input.terminated) {
                return false;
            }

            // Race one probe per live input; a single poll pass may complete
            // several of them, and all completions are drained before the
            // next race so no input gets ahead of the others.
            let mut probes: Vec<Option<_>> = self
                .inputs
                .iter_mut()
                .map(|input| (!input.terminated).then(|| input.recv.ready()))
                .collect();

            let completed = poll_fn(|cx| {
                let mut done = Vec::new();
                for (index, slot) in probes.iter_mut().enumerate() {
                    if let Some(probe) = slot.as_mut() {
                        if let Poll::Ready(alive) = probe.as_mut().poll(cx) {
                            done.push((index, alive));
                            *slot = None;
                        }
                    }
                }
                if done.is_empty() {
                    Poll::Pending
                } else {
                    Poll::Ready(done)
                }
            })
            .await;
            drop(probes);

            for (index, alive) in completed {
                let input = &mut self.inputs[index];
                if alive {
                    if let Ok(message) = input.recv.consume() {
                        self.arrivals.push_back(message);
                    }
                } else {
                    input.terminated = true;
                }
            }
        }
    }

    fn consume(&mut self) -> Result<T, ReceiverStopped> {
        if let Some(message) = self.arrivals.pop_front() {
            return Ok(message);
        }
        if self.inputs.iter().all(|input| input.terminated) {
            return Err(ReceiverStopped::new());
        }
        panic!("`consume()` requires a preceding successful `ready()`");
    }
}

impl<T> fmt::Display for Merge<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terminated = self.inputs.iter().filter(|input| input.terminated).count();
        write!(
            f,
            "Merge<inputs={}, terminated={}, queued={}>",
            self.inputs.len(),
            terminated,
            self.arrivals.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Anycast, Broadcast};
    use crate::sender::Sender;

    #[tokio::test]
    async fn yields_messages_from_both_inputs() {
        let alpha = Broadcast::<char>::new("alpha");
        let beta = Broadcast::<char>::new("beta");
        let mut merged = merge(vec![alpha.new_receiver(), beta.new_receiver()]);

        alpha.new_sender().send('A').await.unwrap();
        beta.new_sender().send('B').await.unwrap();

        let mut got = vec![
            merged.receive().await.unwrap(),
            merged.receive().await.unwrap(),
        ];
        got.sort_unstable();
        assert_eq!(got, vec!['A', 'B']);
    }

    #[tokio::test]
    async fn preserves_per_input_order() {
        let channel = Broadcast::<u32>::new("ordered");
        let sender = channel.new_sender();
        let mut merged = merge(vec![channel.new_receiver(), channel.new_receiver()]);

        for n in 1..=4 {
            sender.send(n).await.unwrap();
        }
        channel.close();

        // Both inputs contribute 1..=4; the merged stream must be an
        // interleaving that keeps each input's contribution in send order.
        let mut cursor = [0u32, 0];
        for _ in 0..8 {
            let n = merged.receive().await.unwrap();
            let owner = (0..2)
                .find(|&i| cursor[i] + 1 == n)
                .expect("value arrived out of per-input order");
            cursor[owner] += 1;
        }
        assert_eq!(cursor, [4, 4]);
    }

    #[tokio::test]
    async fn terminates_only_after_all_inputs_do() {
        let first = Anycast::<u32>::new("first", 2);
        let second = Anycast::<u32>::new("second", 2);
        let mut merged = merge(vec![first.new_receiver(), second.new_receiver()]);

        first.new_sender().send(1).await.unwrap();
        first.close();

        assert_eq!(merged.receive().await.unwrap(), 1);

        // One input is gone; the other still delivers.
        second.new_sender().send(2).await.unwrap();
        assert_eq!(merged.receive().await.unwrap(), 2);

        second.close();
        assert!(merged.receive().await.is_err());
        assert!(merged.receive().await.is_err());
    }

    #[test]
    #[should_panic(expected = "at least one receiver")]
    fn zero_inputs_panic() {
        let _ = merge(Vec::<crate::channel::AnycastReceiver<u32>>::new());
    }
}
