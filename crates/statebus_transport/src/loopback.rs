//! In-memory connected transport pair for tests.
//!
//! Delivery is synchronous and run-to-completion: a message handed to one
//! end is dispatched to the other end's handler before `send` returns,
//! which mirrors the single-threaded event model the protocols assume.

use crate::error::{TransportError, TransportResult};
use crate::handler::{ConnectionId, MessageContext, MessageSender, ProtocolHandler, Transport};
use parking_lot::RwLock;
use statebus_state::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

struct LoopbackEnd {
    /// Identity of this end as seen by its peer.
    id: ConnectionId,
    protocols: RwLock<HashMap<String, Arc<dyn ProtocolHandler>>>,
    peer: RwLock<Weak<LoopbackEnd>>,
    open: AtomicBool,
}

impl LoopbackEnd {
    fn handler(&self, protocol: &str) -> Option<Arc<dyn ProtocolHandler>> {
        self.protocols.read().get(protocol).cloned()
    }

    fn peer(&self) -> Option<Arc<LoopbackEnd>> {
        self.peer.read().upgrade()
    }

    /// Delivers a message to this end's handler for `protocol`.
    ///
    /// `from` identifies the sending end; replies route straight back to
    /// the sender's handler for the same protocol.
    fn deliver(self: &Arc<Self>, protocol: &str, message: Value, from: &Arc<LoopbackEnd>) {
        let Some(handler) = self.handler(protocol) else {
            debug!(protocol, "no handler registered, dropping message");
            return;
        };

        let respond_to = Arc::clone(from);
        let respond_protocol = protocol.to_string();
        let this = Arc::clone(self);
        let respond = move |reply: Value| {
            respond_to.deliver(&respond_protocol, reply, &this);
        };

        let ctx = MessageContext::from_connection(from.id, &respond);
        handler.on_message(message, &ctx);
    }

    fn notify_open(&self, peer_id: ConnectionId) {
        let handlers: Vec<_> = self.protocols.read().values().cloned().collect();
        for handler in handlers {
            handler.on_open();
            handler.on_connection(peer_id);
        }
    }

    fn notify_close(&self, peer_id: ConnectionId) {
        let handlers: Vec<_> = self.protocols.read().values().cloned().collect();
        for handler in handlers {
            handler.on_close(peer_id);
        }
    }
}

struct LoopbackSender {
    end: Weak<LoopbackEnd>,
    protocol: String,
}

impl MessageSender for LoopbackSender {
    fn send(&self, message: Value) -> TransportResult<()> {
        let end = self.end.upgrade().ok_or(TransportError::Closed)?;
        if !end.open.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let peer = end.peer().ok_or(TransportError::Closed)?;
        peer.deliver(&self.protocol, message, &end);
        Ok(())
    }

    fn send_to(&self, connection: ConnectionId, message: Value) -> TransportResult<()> {
        let end = self.end.upgrade().ok_or(TransportError::Closed)?;
        let peer = end.peer().ok_or(TransportError::Closed)?;
        if peer.id != connection {
            return Err(TransportError::NoSuchConnection(connection.to_string()));
        }
        self.send(message)
    }
}

/// One end of an in-memory transport pair.
///
/// Each handle keeps both ends alive, so the link carries messages as long
/// as either side of the pair is still held. The ends themselves reference
/// each other weakly to avoid a reference cycle.
#[derive(Clone)]
pub struct LoopbackTransport {
    inner: Arc<LoopbackEnd>,
    peer: Arc<LoopbackEnd>,
}

impl LoopbackTransport {
    /// Creates a connected-but-closed pair of transports.
    pub fn pair() -> (Self, Self) {
        let a = Arc::new(LoopbackEnd {
            id: ConnectionId::new(),
            protocols: RwLock::new(HashMap::new()),
            peer: RwLock::new(Weak::new()),
            open: AtomicBool::new(false),
        });
        let b = Arc::new(LoopbackEnd {
            id: ConnectionId::new(),
            protocols: RwLock::new(HashMap::new()),
            peer: RwLock::new(Weak::new()),
            open: AtomicBool::new(false),
        });

        *a.peer.write() = Arc::downgrade(&b);
        *b.peer.write() = Arc::downgrade(&a);

        (
            Self {
                inner: Arc::clone(&a),
                peer: Arc::clone(&b),
            },
            Self { inner: b, peer: a },
        )
    }

    /// The identity of this end as seen by its peer.
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Opens both ends of the link and notifies registered handlers.
    pub fn open(&self) {
        self.inner.open.store(true, Ordering::SeqCst);
        self.peer.open.store(true, Ordering::SeqCst);

        self.inner.notify_open(self.peer.id);
        self.peer.notify_open(self.inner.id);
    }

    /// Closes both ends of the link and notifies registered handlers.
    pub fn close(&self) {
        self.inner.open.store(false, Ordering::SeqCst);
        self.peer.open.store(false, Ordering::SeqCst);

        self.inner.notify_close(self.peer.id);
        self.peer.notify_close(self.inner.id);
    }

    /// Returns true while the link is open.
    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }
}

impl Transport for LoopbackTransport {
    fn register_protocol(&self, name: &str, handler: Arc<dyn ProtocolHandler>) {
        handler.bind(Arc::new(LoopbackSender {
            end: Arc::downgrade(&self.inner),
            protocol: name.to_string(),
        }));

        self.inner
            .protocols
            .write()
            .insert(name.to_string(), Arc::clone(&handler));

        // Late registration on an already-open link still sees on_open.
        if self.is_open() {
            handler.on_open();
            handler.on_connection(self.peer.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingHandler {
        sender: Mutex<Option<Arc<dyn MessageSender>>>,
        messages: Mutex<Vec<Value>>,
        opens: Mutex<usize>,
        closes: Mutex<Vec<ConnectionId>>,
        reply_with: Mutex<Option<Value>>,
    }

    impl RecordingHandler {
        fn send(&self, message: Value) -> TransportResult<()> {
            self.sender
                .lock()
                .as_ref()
                .ok_or(TransportError::Closed)?
                .send(message)
        }
    }

    impl ProtocolHandler for RecordingHandler {
        fn bind(&self, sender: Arc<dyn MessageSender>) {
            *self.sender.lock() = Some(sender);
        }

        fn on_open(&self) {
            *self.opens.lock() += 1;
        }

        fn on_message(&self, message: Value, ctx: &MessageContext<'_>) {
            self.messages.lock().push(message);
            if let Some(reply) = self.reply_with.lock().take() {
                ctx.respond(reply);
            }
        }

        fn on_close(&self, connection: ConnectionId) {
            self.closes.lock().push(connection);
        }
    }

    #[test]
    fn messages_route_between_ends() {
        let (left, right) = LoopbackTransport::pair();
        let left_handler = Arc::new(RecordingHandler::default());
        let right_handler = Arc::new(RecordingHandler::default());

        left.register_protocol("sync", left_handler.clone());
        right.register_protocol("sync", right_handler.clone());
        left.open();

        left_handler.send(Value::Integer(42)).unwrap();

        assert_eq!(*right_handler.messages.lock(), vec![Value::Integer(42)]);
        assert!(left_handler.messages.lock().is_empty());
    }

    #[test]
    fn protocols_are_isolated() {
        let (left, right) = LoopbackTransport::pair();
        let sync = Arc::new(RecordingHandler::default());
        let rpc = Arc::new(RecordingHandler::default());
        let sender = Arc::new(RecordingHandler::default());

        right.register_protocol("sync", sync.clone());
        right.register_protocol("rpc", rpc.clone());
        left.register_protocol("sync", sender.clone());
        left.open();

        sender.send(Value::from("hello")).unwrap();

        assert_eq!(sync.messages.lock().len(), 1);
        assert!(rpc.messages.lock().is_empty());
    }

    #[test]
    fn respond_routes_back_to_origin() {
        let (left, right) = LoopbackTransport::pair();
        let asker = Arc::new(RecordingHandler::default());
        let answerer = Arc::new(RecordingHandler::default());
        *answerer.reply_with.lock() = Some(Value::from("pong"));

        left.register_protocol("rpc", asker.clone());
        right.register_protocol("rpc", answerer.clone());
        left.open();

        asker.send(Value::from("ping")).unwrap();

        assert_eq!(*answerer.messages.lock(), vec![Value::from("ping")]);
        assert_eq!(*asker.messages.lock(), vec![Value::from("pong")]);
    }

    #[test]
    fn send_while_closed_fails() {
        let (left, right) = LoopbackTransport::pair();
        let handler = Arc::new(RecordingHandler::default());
        left.register_protocol("sync", handler.clone());
        right.register_protocol("sync", Arc::new(RecordingHandler::default()));

        assert!(matches!(
            handler.send(Value::Null),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn open_notifies_both_ends() {
        let (left, right) = LoopbackTransport::pair();
        let left_handler = Arc::new(RecordingHandler::default());
        let right_handler = Arc::new(RecordingHandler::default());

        left.register_protocol("sync", left_handler.clone());
        right.register_protocol("sync", right_handler.clone());
        left.open();

        assert_eq!(*left_handler.opens.lock(), 1);
        assert_eq!(*right_handler.opens.lock(), 1);
    }

    #[test]
    fn late_registration_sees_open() {
        let (left, right) = LoopbackTransport::pair();
        right.register_protocol("sync", Arc::new(RecordingHandler::default()));
        left.open();

        let late = Arc::new(RecordingHandler::default());
        left.register_protocol("sync", late.clone());
        assert_eq!(*late.opens.lock(), 1);
    }

    #[test]
    fn close_reports_peer_connection() {
        let (left, right) = LoopbackTransport::pair();
        let handler = Arc::new(RecordingHandler::default());
        left.register_protocol("sync", handler.clone());
        right.register_protocol("sync", Arc::new(RecordingHandler::default()));

        left.open();
        left.close();

        assert_eq!(*handler.closes.lock(), vec![right.id()]);
    }

    #[test]
    fn link_survives_dropping_one_handle() {
        let (left, right) = LoopbackTransport::pair();
        let left_handler = Arc::new(RecordingHandler::default());
        let right_handler = Arc::new(RecordingHandler::default());
        left.register_protocol("sync", left_handler.clone());
        right.register_protocol("sync", right_handler.clone());

        drop(right);
        left.open();

        left_handler.send(Value::Integer(9)).unwrap();
        assert_eq!(*right_handler.messages.lock(), vec![Value::Integer(9)]);
    }

    #[test]
    fn send_to_checks_connection_id() {
        let (left, right) = LoopbackTransport::pair();
        let handler = Arc::new(RecordingHandler::default());
        let receiver = Arc::new(RecordingHandler::default());
        left.register_protocol("sync", handler.clone());
        right.register_protocol("sync", receiver.clone());
        left.open();

        let sender = handler.sender.lock().clone().unwrap();
        sender.send_to(right.id(), Value::Integer(7)).unwrap();
        assert_eq!(*receiver.messages.lock(), vec![Value::Integer(7)]);

        assert!(matches!(
            sender.send_to(ConnectionId::new(), Value::Null),
            Err(TransportError::NoSuchConnection(_))
        ));
    }
}
