//! FIFO of exchanges awaiting a response.

use crate::receiver::Receiver;
use crate::request::Method;
use std::collections::VecDeque;

/// A receiver together with the request it answers.
#[derive(Debug)]
pub(crate) struct PendingExchange {
    pub method: Method,
    pub path: String,
    pub receiver: Receiver,
}

/// Pending exchanges in the order their requests went on the wire.
///
/// Messages carry no correlation id; the head of the queue always belongs to
/// the next inbound message.
#[derive(Debug, Default)]
pub(crate) struct PendingQueue {
    entries: VecDeque<PendingExchange>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, exchange: PendingExchange) {
        self.entries.push_back(exchange);
    }

    pub fn pop(&mut self) -> Option<PendingExchange> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = PendingExchange> + '_ {
        self.entries.drain(..)
    }
}
