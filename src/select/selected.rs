//! # Selected values yielded by [`Select`](crate::select::Select).
//!
//! Each iteration of a selector yields a [`Selected`]: the identity of the
//! input that became ready, bound to either its consumed message or its
//! terminal notice. Identities are opaque [`ReceiverKey`]s handed out by
//! [`Select::add`](crate::select::Select::add); dispatching on the key (or on
//! a caller-side enum built with [`Receiver::map`](crate::receiver::Receiver::map))
//! keeps the handling code checkable by the compiler.

use crate::error::ReceiverStopped;

/// Identity of one input registered with a selector.
///
/// Keys are only meaningful for the selector that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiverKey(pub(super) usize);

/// The result of one selector iteration: a source identity bound to the
/// message (or terminal notice) that unblocked the selector.
#[derive(Debug)]
pub struct Selected<T> {
    pub(super) key: ReceiverKey,
    pub(super) result: Result<T, ReceiverStopped>,
}

impl<T> Selected<T> {
    /// The key of the input this selection came from.
    pub fn key(&self) -> ReceiverKey {
        self.key
    }

    /// The received message.
    ///
    /// # Panics
    ///
    /// Panics if the selected input terminated instead of producing a
    /// message; check [`was_stopped`](Self::was_stopped) or
    /// [`exception`](Self::exception) first when that is a live possibility.
    pub fn message(&self) -> &T {
        match &self.result {
            Ok(message) => message,
            Err(stopped) => panic!("selected receiver produced no message: {stopped}"),
        }
    }

    /// Consumes the selection, returning the message.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`message`](Self::message).
    pub fn into_message(self) -> T {
        match self.result {
            Ok(message) => message,
            Err(stopped) => panic!("selected receiver produced no message: {stopped}"),
        }
    }

    /// The terminal notice carried by this selection, if any.
    pub fn exception(&self) -> Option<&ReceiverStopped> {
        self.result.as_ref().err()
    }

    /// Whether the selected input terminated on this iteration.
    pub fn was_stopped(&self) -> bool {
        self.result.is_err()
    }

    /// The selection as a plain `Result`.
    pub fn into_result(self) -> Result<T, ReceiverStopped> {
        self.result
    }
}

/// Whether `selected` came from the input registered under `key`.
///
/// The free-function form keeps dispatch chains symmetrical:
///
/// ```no_run
/// # use taskbus::{select::{Select, selected_from}, Receiver};
/// # async fn demo(mut a: impl Receiver<u32>, mut b: impl Receiver<u32>) {
/// let mut select = Select::new();
/// let from_a = select.add(&mut a);
/// let from_b = select.add(&mut b);
///
/// while let Some(selected) = select.next().await {
///     if selected_from(&selected, from_a) {
///         // ...
///     } else if selected_from(&selected, from_b) {
///         // ...
///     }
/// }
/// # }
/// ```
pub fn selected_from<T>(selected: &Selected<T>, key: ReceiverKey) -> bool {
    selected.key == key
}
