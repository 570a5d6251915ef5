//! Drives a Communicator from an [`EventStream`].
//!
//! The pump runs on the calling task. Communicator callbacks are not `Send`
//! and never leave that task.

use super::tcp::EventStream;
use crate::channel::{Channel, ChannelEvent};
use crate::communicator::{Communicator, ConnectionState};
use crate::Result;
use tracing::debug;

/// Feed events until the connection closes.
///
/// A fatal protocol error stops the pump and is returned; the Communicator
/// is closed at that point.
pub async fn pump<C: Channel>(
    communicator: &mut Communicator<C>,
    events: &mut EventStream,
) -> Result<()> {
    while let Some(event) = events.next().await {
        let closing = event == ChannelEvent::Closed;
        communicator.handle_event(event)?;
        if closing {
            return Ok(());
        }
    }

    debug!("Event stream ended without a close event");
    communicator.handle_close();
    Ok(())
}

/// Feed events until the Communicator is idle or the connection closes.
///
/// Returns the connection state at the point the pump stopped. Call it again
/// after sending more requests.
pub async fn pump_until_idle<C: Channel>(
    communicator: &mut Communicator<C>,
    events: &mut EventStream,
) -> Result<ConnectionState> {
    if communicator.is_idle() || communicator.state() == ConnectionState::Closed {
        return Ok(communicator.state());
    }

    while let Some(event) = events.next().await {
        communicator.handle_event(event)?;
        if communicator.is_idle() || communicator.state() == ConnectionState::Closed {
            return Ok(communicator.state());
        }
    }

    debug!("Event stream ended without a close event");
    communicator.handle_close();
    Ok(communicator.state())
}
