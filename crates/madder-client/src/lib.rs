//! Madder Client - request/response correlation for the madder editor.
//!
//! The editor backend speaks a simple protocol: the client sends
//! `{method, path, entity}` requests over one ordered connection and the
//! backend answers each with one or more `{status, body}` envelopes, in the
//! same order. Messages carry no ids; this crate keeps the queue that pairs
//! each inbound message with the request it answers.
//!
//! # Example
//!
//! ```rust,ignore
//! use madder_client::{net, Communicator, Receiver, Request};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> madder_client::Result<()> {
//!     let (channel, mut events) = net::connect("127.0.0.1:3000".parse().unwrap());
//!     let mut com = Communicator::new(channel, |body| eprintln!("error: {}", body));
//!
//!     com.send(
//!         Request::get("/component"),
//!         Receiver::receive(|components| println!("{}", components)),
//!     )?;
//!
//!     net::pump_until_idle(&mut com, &mut events).await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod communicator;
pub mod config;
pub mod error;
pub mod net;
pub mod receiver;
pub mod request;
pub mod response;

mod queue;

// Re-export commonly used types
pub use channel::{Channel, ChannelEvent};
pub use communicator::{Aborted, Communicator, CommunicatorBuilder, ConnectionState};
pub use error::{ClientError, Result};
pub use receiver::Receiver;
pub use request::{Method, Request};
pub use response::ResponseEnvelope;
