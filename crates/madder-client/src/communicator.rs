//! The request/response correlator.
//!
//! A [`Communicator`] owns a [`Channel`], the queue of pending exchanges and
//! the connection state. Requests go out through [`Communicator::send`];
//! inbound messages come back through [`Communicator::handle_event`] and are
//! matched to receivers strictly in send order.
//!
//! # Ordering
//!
//! Messages carry no correlation id. The channel must deliver responses in
//! the order requests were sent. An unfinished `ReceiveUntil` is re-enqueued
//! at the tail, so while a streamed exchange is open the caller must not send
//! other requests whose responses could arrive in between.
//!
//! # Before the channel opens
//!
//! Requests sent while `Connecting` are serialized immediately and held in a
//! buffer. They are transmitted, in call order, as soon as the channel opens.
//! Sending after the connection closed fails with
//! [`ClientError::NotConnected`].
//!
//! # Single context
//!
//! The Communicator is driven through `&mut self` from one event context.
//! Callbacks run inside `handle_event` and cannot reach back into it.

use crate::channel::{Channel, ChannelEvent};
use crate::queue::{PendingExchange, PendingQueue};
use crate::receiver::{Delivery, Receiver};
use crate::request::{Method, Request};
use crate::response::ResponseEnvelope;
use crate::{ClientError, Result};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Handler for responses whose status is not 200.
pub type ErrorHandler = Box<dyn FnMut(Value)>;

/// Hook run once the channel opens and buffered requests are flushed.
pub type OpenHook = Box<dyn FnMut()>;

/// Hook run for every exchange dropped by a close.
pub type AbortHook = Box<dyn FnMut(&Aborted)>;

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An exchange that ended because the connection went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aborted {
    pub method: Method,
    pub path: String,
    /// Whether the request reached the channel before the close.
    pub transmitted: bool,
}

struct BufferedRequest {
    message: Vec<u8>,
    exchange: PendingExchange,
}

/// Correlates requests on a channel with the messages that answer them.
pub struct Communicator<C: Channel> {
    channel: C,
    state: ConnectionState,
    pending: PendingQueue,
    buffered: VecDeque<BufferedRequest>,
    on_error: ErrorHandler,
    on_open: Option<OpenHook>,
    on_abort: Option<AbortHook>,
}

impl<C: Channel> Communicator<C> {
    /// Create a Communicator on a channel that has not opened yet.
    ///
    /// `on_error` receives the body of every response with a non-200 status.
    pub fn new(channel: C, on_error: impl FnMut(Value) + 'static) -> Self {
        Self::builder(channel, on_error).build()
    }

    /// Create a builder for registering the optional hooks.
    pub fn builder(channel: C, on_error: impl FnMut(Value) + 'static) -> CommunicatorBuilder<C> {
        CommunicatorBuilder::new(channel, on_error)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of transmitted requests still waiting for a response.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of requests held until the channel opens.
    pub fn buffered_len(&self) -> usize {
        self.buffered.len()
    }

    /// Open, with nothing pending and nothing buffered.
    pub fn is_idle(&self) -> bool {
        self.state == ConnectionState::Open && self.pending.is_empty() && self.buffered.is_empty()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Send a request and register what to do with its response.
    pub fn send(&mut self, request: Request, receiver: Receiver) -> Result<()> {
        let message = request.encode()?;
        let exchange = PendingExchange {
            method: request.method(),
            path: request.path().to_string(),
            receiver,
        };

        match self.state {
            ConnectionState::Open => self.transmit(message, exchange),
            ConnectionState::Connecting => {
                debug!(
                    "Buffering {} {} until the channel opens",
                    exchange.method, exchange.path
                );
                self.buffered.push_back(BufferedRequest { message, exchange });
                Ok(())
            }
            ConnectionState::Closed => Err(ClientError::NotConnected(self.state)),
        }
    }

    /// Feed one channel event.
    ///
    /// An error return is fatal: the Communicator is closed and every
    /// outstanding exchange has been aborted.
    pub fn handle_event(&mut self, event: ChannelEvent) -> Result<()> {
        match event {
            ChannelEvent::Opened => self.handle_open(),
            ChannelEvent::Message(raw) => self.handle_message(&raw),
            ChannelEvent::Closed => {
                self.handle_close();
                Ok(())
            }
        }
    }

    /// The channel opened: flush buffered requests in call order.
    pub fn handle_open(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Connecting => {}
            ConnectionState::Open => {
                return Err(self.fail(ClientError::protocol("channel opened twice")));
            }
            ConnectionState::Closed => return Err(ClientError::NotConnected(self.state)),
        }

        info!("Channel open, flushing {} buffered request(s)", self.buffered.len());
        self.state = ConnectionState::Open;

        while let Some(BufferedRequest { message, exchange }) = self.buffered.pop_front() {
            self.transmit(message, exchange)?;
        }

        if let Some(hook) = self.on_open.as_mut() {
            hook();
        }
        Ok(())
    }

    /// Match one inbound message to the oldest pending receiver.
    pub fn handle_message(&mut self, raw: &[u8]) -> Result<()> {
        if self.state != ConnectionState::Open {
            let state = self.state;
            return Err(self.fail(ClientError::protocol(format!(
                "message received while {}",
                state
            ))));
        }

        let envelope = match ResponseEnvelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => return Err(self.fail(e)),
        };

        let Some(exchange) = self.pending.pop() else {
            return Err(self.fail(ClientError::Unsolicited {
                status: envelope.status,
            }));
        };

        if !envelope.is_success() {
            warn!(
                "{} {} failed with status {}",
                exchange.method, exchange.path, envelope.status
            );
            (self.on_error)(envelope.body);
            return Ok(());
        }

        debug!(
            "Dispatching response for {} {} to {} receiver",
            exchange.method,
            exchange.path,
            exchange.receiver.kind()
        );

        let PendingExchange {
            method,
            path,
            receiver,
        } = exchange;
        match receiver.deliver(envelope.body) {
            Delivery::Complete => {}
            Delivery::Continue(receiver) => self.pending.push(PendingExchange {
                method,
                path,
                receiver,
            }),
        }
        Ok(())
    }

    /// The channel closed: abort everything outstanding.
    ///
    /// Returns the aborted exchanges, oldest first: transmitted requests,
    /// then buffered ones.
    pub fn handle_close(&mut self) -> Vec<Aborted> {
        if self.state == ConnectionState::Closed {
            return Vec::new();
        }
        info!("Channel closed");
        self.state = ConnectionState::Closed;
        self.abort_all()
    }

    fn transmit(&mut self, message: Vec<u8>, exchange: PendingExchange) -> Result<()> {
        debug!("Sending {} {}", exchange.method, exchange.path);

        if let Err(e) = self.channel.transmit(message) {
            let aborted = Aborted {
                method: exchange.method,
                path: exchange.path,
                transmitted: false,
            };
            self.report_abort(&aborted);
            let e = match e {
                ClientError::Transmit { .. } => e,
                other => ClientError::Transmit {
                    message: other.to_string(),
                },
            };
            return Err(self.fail(e));
        }

        self.pending.push(exchange);
        Ok(())
    }

    /// Close after a fatal error and hand the error back to the caller.
    fn fail(&mut self, err: ClientError) -> ClientError {
        error!("Closing connection: {}", err);
        self.state = ConnectionState::Closed;
        self.channel.close();
        self.abort_all();
        err
    }

    fn abort_all(&mut self) -> Vec<Aborted> {
        let mut aborted: Vec<Aborted> = self
            .pending
            .drain()
            .map(|e| Aborted {
                method: e.method,
                path: e.path,
                transmitted: true,
            })
            .collect();
        aborted.extend(self.buffered.drain(..).map(|b| Aborted {
            method: b.exchange.method,
            path: b.exchange.path,
            transmitted: false,
        }));

        for entry in &aborted {
            self.report_abort(entry);
        }
        aborted
    }

    fn report_abort(&mut self, aborted: &Aborted) {
        warn!("Aborted {} {}", aborted.method, aborted.path);
        if let Some(hook) = self.on_abort.as_mut() {
            hook(aborted);
        }
    }
}

impl<C: Channel> fmt::Debug for Communicator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Communicator")
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .field("buffered", &self.buffered.len())
            .finish()
    }
}

/// Builder for a [`Communicator`] with optional lifecycle hooks.
///
/// # Example
///
/// ```rust,ignore
/// let communicator = Communicator::builder(channel, |body| eprintln!("error: {}", body))
///     .on_open(|| println!("connected!"))
///     .on_abort(|aborted| eprintln!("lost {} {}", aborted.method, aborted.path))
///     .build();
/// ```
pub struct CommunicatorBuilder<C: Channel> {
    channel: C,
    on_error: ErrorHandler,
    on_open: Option<OpenHook>,
    on_abort: Option<AbortHook>,
}

impl<C: Channel> CommunicatorBuilder<C> {
    pub fn new(channel: C, on_error: impl FnMut(Value) + 'static) -> Self {
        Self {
            channel,
            on_error: Box::new(on_error),
            on_open: None,
            on_abort: None,
        }
    }

    /// Run `hook` each time the channel opens, after buffered requests are sent.
    pub fn on_open(mut self, hook: impl FnMut() + 'static) -> Self {
        self.on_open = Some(Box::new(hook));
        self
    }

    /// Run `hook` for every exchange the connection drops.
    pub fn on_abort(mut self, hook: impl FnMut(&Aborted) + 'static) -> Self {
        self.on_abort = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> Communicator<C> {
        Communicator {
            channel: self.channel,
            state: ConnectionState::Connecting,
            pending: PendingQueue::new(),
            buffered: VecDeque::new(),
            on_error: self.on_error,
            on_open: self.on_open,
            on_abort: self.on_abort,
        }
    }
}
