//! Tokio TCP server transport.
//!
//! Accepts any number of client connections, assigns each a
//! [`ConnectionId`], and routes inbound frames to the registered
//! protocol handlers with the originating connection attached. Replies
//! and targeted sends go back over that connection only; plain sends
//! broadcast to every connection.

use crate::envelope::{read_frame, write_frame, Envelope};
use crate::error::{TransportError, TransportResult};
use crate::handler::{ConnectionId, MessageContext, MessageSender, ProtocolHandler, Transport};
use parking_lot::RwLock;
use statebus_state::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

struct ServerShared {
    protocols: RwLock<HashMap<String, Arc<dyn ProtocolHandler>>>,
    connections: RwLock<HashMap<ConnectionId, UnboundedSender<Envelope>>>,
    shutdown: AtomicBool,
    shutdown_signal: Notify,
}

impl ServerShared {
    fn handlers(&self) -> Vec<Arc<dyn ProtocolHandler>> {
        self.protocols.read().values().cloned().collect()
    }

    fn dispatch(&self, envelope: Envelope, connection: ConnectionId) {
        let handler = self.protocols.read().get(&envelope.protocol).cloned();
        let Some(handler) = handler else {
            debug!(protocol = %envelope.protocol, "no handler registered, dropping message");
            return;
        };

        let reply_tx = self.connections.read().get(&connection).cloned();
        let protocol = envelope.protocol;
        let respond = move |reply: Value| {
            let Some(tx) = &reply_tx else {
                debug!("dropping reply, connection is gone");
                return;
            };
            if tx.send(Envelope::new(protocol.clone(), reply)).is_err() {
                debug!("dropping reply, connection is gone");
            }
        };
        handler.on_message(envelope.data, &MessageContext::from_connection(connection, &respond));
    }
}

struct ServerSender {
    shared: Arc<ServerShared>,
    protocol: String,
}

impl MessageSender for ServerSender {
    /// Broadcasts to every live connection.
    fn send(&self, message: Value) -> TransportResult<()> {
        let connections: Vec<_> = self.shared.connections.read().values().cloned().collect();
        for tx in connections {
            // A connection mid-teardown is not an error for broadcast.
            let _ = tx.send(Envelope::new(self.protocol.clone(), message.clone()));
        }
        Ok(())
    }

    fn send_to(&self, connection: ConnectionId, message: Value) -> TransportResult<()> {
        let tx = self
            .shared
            .connections
            .read()
            .get(&connection)
            .cloned()
            .ok_or_else(|| TransportError::NoSuchConnection(connection.to_string()))?;
        tx.send(Envelope::new(self.protocol.clone(), message))
            .map_err(|_| TransportError::NoSuchConnection(connection.to_string()))
    }
}

/// A multi-connection server transport listening on TCP.
#[derive(Clone)]
pub struct TcpServerTransport {
    shared: Arc<ServerShared>,
    local_addr: SocketAddr,
}

impl TcpServerTransport {
    /// Binds the listener and starts accepting connections.
    pub async fn bind(addr: impl tokio::net::ToSocketAddrs) -> TransportResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let shared = Arc::new(ServerShared {
            protocols: RwLock::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
            shutdown: AtomicBool::new(false),
            shutdown_signal: Notify::new(),
        });

        tokio::spawn(run_accept_loop(Arc::clone(&shared), listener));
        info!(%local_addr, "listening");

        Ok(Self { shared, local_addr })
    }

    /// The address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.shared.connections.read().len()
    }

    /// Stops accepting and drops all connections.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.shutdown_signal.notify_waiters();
        self.shared.connections.write().clear();
    }
}

impl Transport for TcpServerTransport {
    fn register_protocol(&self, name: &str, handler: Arc<dyn ProtocolHandler>) {
        handler.bind(Arc::new(ServerSender {
            shared: Arc::clone(&self.shared),
            protocol: name.to_string(),
        }));

        self.shared
            .protocols
            .write()
            .insert(name.to_string(), handler);
    }
}

async fn run_accept_loop(shared: Arc<ServerShared>, listener: TcpListener) {
    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = shared.shutdown_signal.notified() => return,
        };

        match accepted {
            Ok((stream, peer)) => {
                let id = ConnectionId::new();
                debug!(connection = %id, %peer, "connection accepted");
                tokio::spawn(run_connection(Arc::clone(&shared), stream, id));
            }
            Err(error) => {
                if shared.shutdown.load(Ordering::SeqCst) {
                    return;
                }
                warn!(%error, "accept failed");
            }
        }
    }
}

async fn run_connection(shared: Arc<ServerShared>, stream: TcpStream, id: ConnectionId) {
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = unbounded_channel();

    shared.connections.write().insert(id, tx);
    for handler in shared.handlers() {
        handler.on_connection(id);
    }

    let writer_task = tokio::spawn(run_writer(write_half, rx));

    let mut reader = tokio::io::BufReader::new(read_half);
    loop {
        tokio::select! {
            inbound = read_frame(&mut reader) => match inbound {
                Ok(envelope) => shared.dispatch(envelope, id),
                Err(error) => {
                    debug!(connection = %id, %error, "connection closed");
                    break;
                }
            },
            _ = shared.shutdown_signal.notified() => break,
        }
    }

    shared.connections.write().remove(&id);
    writer_task.abort();
    for handler in shared.handlers() {
        handler.on_close(id);
    }
}

async fn run_writer(write_half: OwnedWriteHalf, mut rx: UnboundedReceiver<Envelope>) {
    let mut writer = tokio::io::BufWriter::new(write_half);
    while let Some(envelope) = rx.recv().await {
        if let Err(error) = write_frame(&mut writer, &envelope).await {
            debug!(%error, "write failed, dropping connection");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::io::{BufReader, BufWriter};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    #[derive(Default)]
    struct RecordingHandler {
        sender: Mutex<Option<Arc<dyn MessageSender>>>,
        messages: Mutex<Vec<(Value, Option<ConnectionId>)>>,
        connections: Mutex<Vec<ConnectionId>>,
        closes: Mutex<Vec<ConnectionId>>,
        reply_with: Mutex<Option<Value>>,
    }

    impl ProtocolHandler for RecordingHandler {
        fn bind(&self, sender: Arc<dyn MessageSender>) {
            *self.sender.lock() = Some(sender);
        }

        fn on_message(&self, message: Value, ctx: &MessageContext<'_>) {
            self.messages.lock().push((message, ctx.connection()));
            if let Some(reply) = self.reply_with.lock().take() {
                ctx.respond(reply);
            }
        }

        fn on_connection(&self, connection: ConnectionId) {
            self.connections.lock().push(connection);
        }

        fn on_close(&self, connection: ConnectionId) {
            self.closes.lock().push(connection);
        }
    }

    async fn raw_client(addr: SocketAddr) -> (BufReader<tokio::net::tcp::OwnedReadHalf>, BufWriter<OwnedWriteHalf>) {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        (BufReader::new(read_half), BufWriter::new(write_half))
    }

    async fn wait_for(check: impl Fn() -> bool) {
        timeout(WAIT, async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn routes_inbound_with_connection_id() {
        let server = TcpServerTransport::bind("127.0.0.1:0").await.unwrap();
        let handler = Arc::new(RecordingHandler::default());
        server.register_protocol("sync", handler.clone());

        let (_reader, mut writer) = raw_client(server.local_addr()).await;
        write_frame(&mut writer, &Envelope::new("sync", Value::Integer(5)))
            .await
            .unwrap();

        wait_for(|| !handler.messages.lock().is_empty()).await;

        let (message, connection) = handler.messages.lock()[0].clone();
        assert_eq!(message, Value::Integer(5));
        assert_eq!(connection, handler.connections.lock().first().copied());
        server.shutdown();
    }

    #[tokio::test]
    async fn replies_go_back_to_origin_only() {
        let server = TcpServerTransport::bind("127.0.0.1:0").await.unwrap();
        let handler = Arc::new(RecordingHandler::default());
        *handler.reply_with.lock() = Some(Value::from("reply"));
        server.register_protocol("sync", handler.clone());

        let (mut asker_reader, mut asker_writer) = raw_client(server.local_addr()).await;
        let (mut other_reader, _other_writer) = raw_client(server.local_addr()).await;
        wait_for(|| server.connection_count() == 2).await;

        write_frame(&mut asker_writer, &Envelope::new("sync", Value::from("ask")))
            .await
            .unwrap();

        let reply = timeout(WAIT, read_frame(&mut asker_reader))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply, Envelope::new("sync", Value::from("reply")));

        // The bystander must not see the reply.
        let nothing = timeout(Duration::from_millis(100), read_frame(&mut other_reader)).await;
        assert!(nothing.is_err());
        server.shutdown();
    }

    #[tokio::test]
    async fn send_broadcasts_to_all_connections() {
        let server = TcpServerTransport::bind("127.0.0.1:0").await.unwrap();
        let handler = Arc::new(RecordingHandler::default());
        server.register_protocol("sync", handler.clone());

        let (mut reader_a, _writer_a) = raw_client(server.local_addr()).await;
        let (mut reader_b, _writer_b) = raw_client(server.local_addr()).await;
        wait_for(|| server.connection_count() == 2).await;

        let sender = handler.sender.lock().clone().unwrap();
        sender.send(Value::Integer(9)).unwrap();

        let expected = Envelope::new("sync", Value::Integer(9));
        assert_eq!(timeout(WAIT, read_frame(&mut reader_a)).await.unwrap().unwrap(), expected);
        assert_eq!(timeout(WAIT, read_frame(&mut reader_b)).await.unwrap().unwrap(), expected);
        server.shutdown();
    }

    #[tokio::test]
    async fn send_to_targets_one_connection() {
        let server = TcpServerTransport::bind("127.0.0.1:0").await.unwrap();
        let handler = Arc::new(RecordingHandler::default());
        server.register_protocol("sync", handler.clone());

        let (mut reader_a, _writer_a) = raw_client(server.local_addr()).await;
        wait_for(|| server.connection_count() == 1).await;
        let target = handler.connections.lock()[0];

        let sender = handler.sender.lock().clone().unwrap();
        sender.send_to(target, Value::Integer(3)).unwrap();

        let frame = timeout(WAIT, read_frame(&mut reader_a)).await.unwrap().unwrap();
        assert_eq!(frame, Envelope::new("sync", Value::Integer(3)));

        assert!(matches!(
            sender.send_to(ConnectionId::new(), Value::Null),
            Err(TransportError::NoSuchConnection(_))
        ));
        server.shutdown();
    }

    #[tokio::test]
    async fn disconnect_fires_on_close() {
        let server = TcpServerTransport::bind("127.0.0.1:0").await.unwrap();
        let handler = Arc::new(RecordingHandler::default());
        server.register_protocol("sync", handler.clone());

        let (reader, writer) = raw_client(server.local_addr()).await;
        wait_for(|| server.connection_count() == 1).await;
        let id = handler.connections.lock()[0];

        drop(reader);
        drop(writer);
        wait_for(|| !handler.closes.lock().is_empty()).await;

        assert_eq!(*handler.closes.lock(), vec![id]);
        assert_eq!(server.connection_count(), 0);
        server.shutdown();
    }
}
