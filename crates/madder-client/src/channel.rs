//! Transport abstraction the Communicator sits on.
//!
//! A channel moves whole messages in order, one at a time. Whoever owns the
//! transport feeds its [`ChannelEvent`]s into the Communicator.

use crate::Result;

/// Outbound half of a bidirectional, message-oriented transport.
pub trait Channel {
    /// Hand one complete message to the transport.
    fn transmit(&mut self, message: Vec<u8>) -> Result<()>;

    /// Tear the transport down. Further transmits may fail.
    fn close(&mut self) {}
}

/// Inbound events a channel delivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Opened,
    Message(Vec<u8>),
    Closed,
}
