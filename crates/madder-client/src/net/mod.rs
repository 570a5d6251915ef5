//! TCP transport for the Communicator.
//!
//! Length-prefixed JSON frames over a local TCP connection.
//!
//! # Architecture
//!
//! - **Protocol**: framing shared by both sides
//! - **TCP channel**: client connection split into a [`Channel`](crate::Channel) and an event stream
//! - **Pump**: feeds the event stream into a Communicator on the current task
//! - **Server**: the backend side, used for local development and tests

pub mod protocol;
pub mod pump;
pub mod server;
pub mod tcp;

pub use pump::{pump, pump_until_idle};
pub use server::{FrameServer, FrameServerHandle, RequestDispatch};
pub use tcp::{connect, EventStream, TcpChannel};
