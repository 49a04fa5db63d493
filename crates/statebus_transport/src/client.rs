//! Tokio TCP client transport.
//!
//! The client owns one outbound connection and keeps it alive: on
//! connect failure or disconnect it sleeps and retries. Messages sent
//! while disconnected queue up and are flushed, in order, once the
//! connection is back.

use crate::envelope::{read_frame, write_frame, Envelope};
use crate::error::{TransportError, TransportResult};
use crate::handler::{MessageContext, MessageSender, ProtocolHandler, Transport};
use parking_lot::RwLock;
use statebus_state::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Configuration for [`TcpClientTransport`].
#[derive(Debug, Clone)]
pub struct TcpClientConfig {
    /// Address of the server, `host:port`.
    pub addr: String,
    /// Delay between reconnection attempts.
    pub reconnect_delay: Duration,
}

impl TcpClientConfig {
    /// Creates a config for the given server address with default timing.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            reconnect_delay: Duration::from_secs(3),
        }
    }

    /// Sets the delay between reconnection attempts.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }
}

struct ClientShared {
    protocols: RwLock<HashMap<String, Arc<dyn ProtocolHandler>>>,
    open: AtomicBool,
    shutdown: AtomicBool,
    shutdown_signal: Notify,
}

impl ClientShared {
    fn handler(&self, protocol: &str) -> Option<Arc<dyn ProtocolHandler>> {
        self.protocols.read().get(protocol).cloned()
    }

    fn notify_open(&self) {
        let handlers: Vec<_> = self.protocols.read().values().cloned().collect();
        for handler in handlers {
            handler.on_open();
        }
    }

    fn dispatch(&self, envelope: Envelope, tx: &UnboundedSender<Envelope>) {
        let Some(handler) = self.handler(&envelope.protocol) else {
            debug!(protocol = %envelope.protocol, "no handler registered, dropping message");
            return;
        };

        let protocol = envelope.protocol;
        let tx = tx.clone();
        let respond = move |reply: Value| {
            if tx.send(Envelope::new(protocol.clone(), reply)).is_err() {
                debug!("dropping reply, client is shut down");
            }
        };
        handler.on_message(envelope.data, &MessageContext::new(&respond));
    }
}

struct ClientSender {
    tx: UnboundedSender<Envelope>,
    protocol: String,
}

impl MessageSender for ClientSender {
    fn send(&self, message: Value) -> TransportResult<()> {
        self.tx
            .send(Envelope::new(self.protocol.clone(), message))
            .map_err(|_| TransportError::Closed)
    }

    fn send_to(
        &self,
        _connection: crate::handler::ConnectionId,
        _message: Value,
    ) -> TransportResult<()> {
        Err(TransportError::SendToUnsupported)
    }
}

/// A client transport over one TCP connection, with automatic reconnect.
#[derive(Clone)]
pub struct TcpClientTransport {
    shared: Arc<ClientShared>,
    tx: UnboundedSender<Envelope>,
}

impl TcpClientTransport {
    /// Starts the client. The connection loop runs until [`shutdown`]
    /// is called.
    ///
    /// [`shutdown`]: TcpClientTransport::shutdown
    pub fn connect(config: TcpClientConfig) -> Self {
        let (tx, rx) = unbounded_channel();
        let shared = Arc::new(ClientShared {
            protocols: RwLock::new(HashMap::new()),
            open: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            shutdown_signal: Notify::new(),
        });

        tokio::spawn(run_client(Arc::clone(&shared), config, tx.clone(), rx));

        Self { shared, tx }
    }

    /// True while the connection is established.
    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }

    /// Stops the connection loop and drops the connection.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.shutdown_signal.notify_waiters();
    }
}

impl Transport for TcpClientTransport {
    fn register_protocol(&self, name: &str, handler: Arc<dyn ProtocolHandler>) {
        handler.bind(Arc::new(ClientSender {
            tx: self.tx.clone(),
            protocol: name.to_string(),
        }));

        self.shared
            .protocols
            .write()
            .insert(name.to_string(), Arc::clone(&handler));

        if self.is_open() {
            handler.on_open();
        }
    }
}

async fn run_client(
    shared: Arc<ClientShared>,
    config: TcpClientConfig,
    tx: UnboundedSender<Envelope>,
    mut rx: UnboundedReceiver<Envelope>,
) {
    // Messages that were pulled off the queue but could not be written
    // before the connection dropped. Flushed ahead of the queue on
    // reconnect so ordering is preserved.
    let mut backlog: VecDeque<Envelope> = VecDeque::new();

    loop {
        if shared.shutdown.load(Ordering::SeqCst) {
            return;
        }

        let stream = tokio::select! {
            result = TcpStream::connect(&config.addr) => match result {
                Ok(stream) => stream,
                Err(error) => {
                    debug!(addr = %config.addr, %error, "connect failed, retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(config.reconnect_delay) => continue,
                        _ = shared.shutdown_signal.notified() => return,
                    }
                }
            },
            _ = shared.shutdown_signal.notified() => return,
        };

        info!(addr = %config.addr, "connected");
        let (read_half, write_half) = stream.into_split();
        let mut writer = BufWriter::new(write_half);

        // Reads get their own task: frame reads must never be cancelled
        // halfway through, and the select below cancels losing branches.
        let (closed_tx, mut closed_rx) = tokio::sync::oneshot::channel::<()>();
        let reader_shared = Arc::clone(&shared);
        let reader_tx = tx.clone();
        let reader_task = tokio::spawn(async move {
            let mut reader = BufReader::new(read_half);
            loop {
                match read_frame(&mut reader).await {
                    Ok(envelope) => reader_shared.dispatch(envelope, &reader_tx),
                    Err(error) => {
                        info!(%error, "connection lost");
                        break;
                    }
                }
            }
            let _ = closed_tx.send(());
        });

        shared.open.store(true, Ordering::SeqCst);
        shared.notify_open();

        let mut write_failed = false;
        while let Some(envelope) = backlog.pop_front() {
            if let Err(error) = write_frame(&mut writer, &envelope).await {
                warn!(%error, "write failed while flushing backlog");
                backlog.push_front(envelope);
                write_failed = true;
                break;
            }
        }

        if !write_failed {
            loop {
                tokio::select! {
                    outbound = rx.recv() => {
                        let Some(envelope) = outbound else {
                            reader_task.abort();
                            return;
                        };
                        if let Err(error) = write_frame(&mut writer, &envelope).await {
                            warn!(%error, "write failed, reconnecting");
                            backlog.push_back(envelope);
                            break;
                        }
                    }
                    _ = &mut closed_rx => break,
                    _ = shared.shutdown_signal.notified() => {
                        shared.open.store(false, Ordering::SeqCst);
                        let _ = writer.shutdown().await;
                        reader_task.abort();
                        return;
                    }
                }
            }
        }

        reader_task.abort();
        shared.open.store(false, Ordering::SeqCst);

        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = shared.shutdown_signal.notified() => return,
        }
    }
}
