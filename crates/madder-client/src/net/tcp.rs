//! TCP channel to the editor backend.
//!
//! [`connect`] returns the outbound half ([`TcpChannel`], handed to a
//! Communicator) and the inbound half ([`EventStream`], fed to the pump).
//! A background task owns the socket: it connects, reports `Opened`,
//! forwards every frame as `Message` and reports `Closed` exactly once when
//! the connection ends or could not be made.

use super::protocol::{check_size, read_frame, write_frame};
use crate::channel::{Channel, ChannelEvent};
use crate::config::NetConfig;
use crate::{ClientError, Result};
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Outbound half of a TCP connection.
#[derive(Debug)]
pub struct TcpChannel {
    outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
    addr: SocketAddr,
}

impl TcpChannel {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Channel for TcpChannel {
    fn transmit(&mut self, message: Vec<u8>) -> Result<()> {
        check_size(message.len())?;
        let outbound = self.outbound.as_ref().ok_or_else(|| ClientError::Transmit {
            message: "channel closed".to_string(),
        })?;
        outbound.send(message).map_err(|_| ClientError::Transmit {
            message: format!("connection to {} is gone", self.addr),
        })
    }

    fn close(&mut self) {
        // Dropping the sender stops the writer task, which shuts the socket down.
        if self.outbound.take().is_some() {
            debug!("Closing channel to {}", self.addr);
        }
    }
}

/// Inbound events of a TCP connection.
#[derive(Debug)]
pub struct EventStream {
    events: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl EventStream {
    /// Wait for the next event. `None` once the connection task is gone.
    pub async fn next(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }
}

/// Start connecting to `addr`.
///
/// Must be called within a tokio runtime. Connection failures surface as a
/// `Closed` event without a preceding `Opened`.
pub fn connect(addr: SocketAddr) -> (TcpChannel, EventStream) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    tokio::spawn(run_connection(addr, outbound_rx, events_tx));

    (
        TcpChannel {
            outbound: Some(outbound_tx),
            addr,
        },
        EventStream { events: events_rx },
    )
}

async fn run_connection(
    addr: SocketAddr,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    let stream = match tokio::time::timeout(NetConfig::CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            warn!("Failed to connect to {}: {}", addr, e);
            let _ = events.send(ChannelEvent::Closed);
            return;
        }
        Err(_) => {
            warn!(
                "Failed to connect to {}: timed out after {:?}",
                addr,
                NetConfig::CONNECT_TIMEOUT
            );
            let _ = events.send(ChannelEvent::Closed);
            return;
        }
    };

    info!("Connected to {}", addr);
    let (mut reader, writer) = stream.into_split();
    if events.send(ChannelEvent::Opened).is_err() {
        return;
    }

    let writer_task = tokio::spawn(write_loop(writer, outbound));

    loop {
        match read_frame(&mut reader).await {
            Ok(Some(frame)) => {
                if events.send(ChannelEvent::Message(frame)).is_err() {
                    break;
                }
            }
            Ok(None) => {
                debug!("Connection to {} closed by peer", addr);
                break;
            }
            Err(e) => {
                warn!("Connection to {} failed: {}", addr, e);
                break;
            }
        }
    }

    writer_task.abort();
    let _ = events.send(ChannelEvent::Closed);
}

async fn write_loop(mut writer: OwnedWriteHalf, mut outbound: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(message) = outbound.recv().await {
        if let Err(e) = write_frame(&mut writer, &message).await {
            warn!("Write failed: {}", e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_to_dead_port_reports_closed() {
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let (_channel, mut events) = connect(addr);

        assert_eq!(events.next().await, Some(ChannelEvent::Closed));
    }

    #[tokio::test]
    async fn test_frames_round_trip_through_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let (mut reader, mut writer) = stream.split();
            let frame = read_frame(&mut reader).await.unwrap().unwrap();
            write_frame(&mut writer, &frame).await.unwrap();
        });

        let (mut channel, mut events) = connect(addr);
        assert_eq!(events.next().await, Some(ChannelEvent::Opened));

        channel.transmit(b"ping".to_vec()).unwrap();
        assert_eq!(
            events.next().await,
            Some(ChannelEvent::Message(b"ping".to_vec()))
        );

        server.await.unwrap();
        assert_eq!(events.next().await, Some(ChannelEvent::Closed));
    }

    #[tokio::test]
    async fn test_transmit_after_close_fails() {
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let (mut channel, _events) = connect(addr);

        channel.close();
        let err = channel.transmit(b"late".to_vec()).unwrap_err();
        assert!(matches!(err, ClientError::Transmit { .. }));
    }
}
