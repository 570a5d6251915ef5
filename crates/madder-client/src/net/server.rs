//! Frame server speaking the editor backend's side of the protocol.
//!
//! Listens on `127.0.0.1:0` (OS-assigned port), reads one [`Request`] per
//! frame and writes back the envelopes produced by a [`RequestDispatch`].
//! A dispatcher may answer one request with several envelopes, in order,
//! which is how streamed exchanges (render progress, screen updates) look
//! on the wire.
//!
//! Each connection is handled in its own spawned task and processes its
//! requests strictly one after another.

use super::protocol::{read_frame, write_frame};
use crate::config::{NetConfig, ProtocolConfig};
use crate::request::Request;
use crate::response::ResponseEnvelope;
use crate::Result;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

/// Handle to a running frame server. Dropping shuts down the server.
pub struct FrameServerHandle {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    conn_shutdown_tx: watch::Sender<bool>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl FrameServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and close the active ones.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.conn_shutdown_tx.send(true);
    }
}

impl Drop for FrameServerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

/// Produces the response envelopes for one request.
#[async_trait::async_trait]
pub trait RequestDispatch: Send + Sync + 'static {
    /// Answer `request`. Every returned envelope is sent as its own message.
    async fn dispatch(&self, request: Request) -> Vec<ResponseEnvelope>;
}

/// Server accepting client connections.
pub struct FrameServer;

impl FrameServer {
    /// Start the server on a random local port.
    pub async fn start<D: RequestDispatch>(dispatch: Arc<D>) -> Result<FrameServerHandle> {
        Self::bind(SocketAddr::from(([127, 0, 0, 1], 0)), dispatch).await
    }

    /// Start the server on a specific address.
    pub async fn bind<D: RequestDispatch>(
        addr: SocketAddr,
        dispatch: Arc<D>,
    ) -> Result<FrameServerHandle> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;

        info!("Frame server listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (conn_shutdown_tx, conn_shutdown_rx) = watch::channel(false);
        let active_connections = Arc::new(AtomicUsize::new(0));

        let task_handle = tokio::spawn(Self::accept_loop(
            listener,
            dispatch,
            shutdown_rx,
            conn_shutdown_rx,
            active_connections,
        ));

        Ok(FrameServerHandle {
            addr,
            shutdown_tx: Some(shutdown_tx),
            conn_shutdown_tx,
            task_handle: Some(task_handle),
        })
    }

    async fn accept_loop<D: RequestDispatch>(
        listener: TcpListener,
        dispatch: Arc<D>,
        mut shutdown_rx: oneshot::Receiver<()>,
        conn_shutdown_rx: watch::Receiver<bool>,
        active_connections: Arc<AtomicUsize>,
    ) {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Frame server shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            if !try_acquire(&active_connections, NetConfig::MAX_CONNECTIONS) {
                                warn!(
                                    "Rejecting connection from {}: at max capacity ({})",
                                    peer_addr,
                                    NetConfig::MAX_CONNECTIONS
                                );
                                continue;
                            }

                            let dispatch = dispatch.clone();
                            let conns = active_connections.clone();
                            let mut conn_shutdown = conn_shutdown_rx.clone();

                            tokio::spawn(async move {
                                debug!("Connection from {}", peer_addr);
                                if let Err(e) = Self::handle_connection(stream, &*dispatch, &mut conn_shutdown).await {
                                    debug!("Connection {} ended: {}", peer_addr, e);
                                }
                                conns.fetch_sub(1, Ordering::AcqRel);
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
            }
        }
    }

    async fn handle_connection<D: RequestDispatch>(
        mut stream: TcpStream,
        dispatch: &D,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let (mut reader, mut writer) = stream.split();

        loop {
            let frame = tokio::select! {
                result = read_frame(&mut reader) => {
                    match result? {
                        Some(f) => f,
                        None => return Ok(()),
                    }
                }
                _ = shutdown_rx.changed() => {
                    return Ok(());
                }
            };

            for envelope in Self::process_request(&frame, dispatch).await {
                write_frame(&mut writer, &envelope.encode()?).await?;
            }
        }
    }

    async fn process_request<D: RequestDispatch>(
        frame: &[u8],
        dispatch: &D,
    ) -> Vec<ResponseEnvelope> {
        let request: Request = match serde_json::from_slice(frame) {
            Ok(req) => req,
            Err(e) => {
                return vec![ResponseEnvelope::error(
                    ProtocolConfig::BAD_REQUEST_STATUS,
                    Value::String(format!("Parse error: {}", e)),
                )];
            }
        };

        if let Err(e) = request.validate() {
            return vec![ResponseEnvelope::error(
                ProtocolConfig::BAD_REQUEST_STATUS,
                Value::String(e.to_string()),
            )];
        }

        debug!("Request: {} {}", request.method(), request.path());
        dispatch.dispatch(request).await
    }
}

/// Take one connection slot unless `max` are already in use.
fn try_acquire(active: &AtomicUsize, max: usize) -> bool {
    active
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
            (n < max).then_some(n + 1)
        })
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_try_acquire_stops_at_max() {
        let active = AtomicUsize::new(0);
        assert!(try_acquire(&active, 2));
        assert!(try_acquire(&active, 2));
        assert!(!try_acquire(&active, 2));
        assert_eq!(active.load(Ordering::Relaxed), 2);

        active.fetch_sub(1, Ordering::AcqRel);
        assert!(try_acquire(&active, 2));
    }

    struct EchoDispatch;

    #[async_trait::async_trait]
    impl RequestDispatch for EchoDispatch {
        async fn dispatch(&self, request: Request) -> Vec<ResponseEnvelope> {
            vec![ResponseEnvelope::ok(request.entity().clone())]
        }
    }

    async fn roundtrip(addr: SocketAddr, payload: &[u8]) -> ResponseEnvelope {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let (mut reader, mut writer) = stream.split();
        write_frame(&mut writer, payload).await.unwrap();
        let frame = read_frame(&mut reader).await.unwrap().unwrap();
        ResponseEnvelope::decode(&frame).unwrap()
    }

    #[tokio::test]
    async fn test_server_answers_request() {
        let mut handle = FrameServer::start(Arc::new(EchoDispatch)).await.unwrap();

        let request = Request::create("/component", json!({"component_type": "Text"}));
        let envelope = roundtrip(handle.addr(), &request.encode().unwrap()).await;

        assert_eq!(envelope, ResponseEnvelope::ok(json!({"component_type": "Text"})));
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_server_rejects_garbage_with_400() {
        let handle = FrameServer::start(Arc::new(EchoDispatch)).await.unwrap();

        let envelope = roundtrip(handle.addr(), b"not json").await;

        assert_eq!(envelope.status, ProtocolConfig::BAD_REQUEST_STATUS);
        assert!(envelope.body.as_str().unwrap().starts_with("Parse error"));
    }

    #[tokio::test]
    async fn test_server_rejects_relative_path_with_400() {
        let handle = FrameServer::start(Arc::new(EchoDispatch)).await.unwrap();

        let envelope = roundtrip(
            handle.addr(),
            br#"{"method":"Get","path":"component","entity":{}}"#,
        )
        .await;

        assert_eq!(envelope.status, ProtocolConfig::BAD_REQUEST_STATUS);
    }
}
