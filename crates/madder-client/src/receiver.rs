//! Continuations for pending requests.
//!
//! A [`Receiver`] says what to do with the response to one request. The set
//! of variants is closed; the Communicator matches on it exhaustively.

use serde_json::Value;
use std::fmt;

/// Callback consuming a single response body.
pub type Callback = Box<dyn FnOnce(Value)>;

/// Callback consuming each body of a streamed exchange.
pub type StreamCallback = Box<dyn FnMut(Value)>;

/// Predicate deciding whether a streamed exchange is over.
pub type FinishPredicate = Box<dyn FnMut(&Value) -> bool>;

/// What to do with the eventual response to a request.
pub enum Receiver {
    /// Drop the response.
    Discard,
    /// Hand the body to the callback, once.
    Receive(Callback),
    /// Hand every body to `callback` until `is_finished` returns true.
    ReceiveUntil {
        callback: StreamCallback,
        is_finished: FinishPredicate,
    },
}

/// Result of delivering one successful body to a receiver.
pub(crate) enum Delivery {
    Complete,
    /// The exchange expects more messages; the receiver goes back in the queue.
    Continue(Receiver),
}

impl Receiver {
    pub fn discard() -> Self {
        Receiver::Discard
    }

    pub fn receive(callback: impl FnOnce(Value) + 'static) -> Self {
        Receiver::Receive(Box::new(callback))
    }

    pub fn receive_until(
        callback: impl FnMut(Value) + 'static,
        is_finished: impl FnMut(&Value) -> bool + 'static,
    ) -> Self {
        Receiver::ReceiveUntil {
            callback: Box::new(callback),
            is_finished: Box::new(is_finished),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Receiver::Discard => "discard",
            Receiver::Receive(_) => "receive",
            Receiver::ReceiveUntil { .. } => "receive_until",
        }
    }

    /// Run the continuation for a successful response.
    pub(crate) fn deliver(self, body: Value) -> Delivery {
        match self {
            Receiver::Discard => Delivery::Complete,
            Receiver::Receive(callback) => {
                callback(body);
                Delivery::Complete
            }
            Receiver::ReceiveUntil {
                mut callback,
                mut is_finished,
            } => {
                callback(body.clone());
                if is_finished(&body) {
                    Delivery::Complete
                } else {
                    Delivery::Continue(Receiver::ReceiveUntil {
                        callback,
                        is_finished,
                    })
                }
            }
        }
    }
}

impl fmt::Debug for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Receiver").field(&self.kind()).finish()
    }
}
