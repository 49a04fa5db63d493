//! The seams between transports and the protocols they carry.

use crate::error::TransportResult;
use statebus_state::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Identifies one remote connection on a multi-connection transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Creates a fresh connection id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outbound capability handed to a protocol at registration.
pub trait MessageSender: Send + Sync {
    /// Sends a message to the peer (on servers: to every connection).
    fn send(&self, message: Value) -> TransportResult<()>;

    /// Sends a message to one specific connection.
    fn send_to(&self, connection: ConnectionId, message: Value) -> TransportResult<()>;
}

/// Context for one inbound message.
pub struct MessageContext<'a> {
    connection: Option<ConnectionId>,
    respond: Option<&'a dyn Fn(Value)>,
}

impl<'a> MessageContext<'a> {
    /// Creates a context with a responder and no connection id.
    pub fn new(respond: &'a dyn Fn(Value)) -> Self {
        Self {
            connection: None,
            respond: Some(respond),
        }
    }

    /// Creates a context for a message from a specific connection.
    pub fn from_connection(connection: ConnectionId, respond: &'a dyn Fn(Value)) -> Self {
        Self {
            connection: Some(connection),
            respond: Some(respond),
        }
    }

    /// Creates a context that cannot be responded to.
    pub fn detached() -> Self {
        Self {
            connection: None,
            respond: None,
        }
    }

    /// The connection the message arrived on, for multi-connection roles.
    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    /// Sends a reply back along the path the message arrived on.
    pub fn respond(&self, message: Value) {
        match self.respond {
            Some(respond) => respond(message),
            None => debug!("dropping reply on detached message context"),
        }
    }
}

/// A protocol multiplexed over a transport.
///
/// Handlers are called from the transport's event loop one message at a
/// time; processing runs to completion before the next message is
/// delivered.
pub trait ProtocolHandler: Send + Sync {
    /// Receives the outbound capability at registration time.
    fn bind(&self, sender: Arc<dyn MessageSender>);

    /// The transport (re)opened.
    fn on_open(&self) {}

    /// A message arrived for this protocol.
    fn on_message(&self, message: Value, ctx: &MessageContext<'_>);

    /// A new connection arrived (multi-connection transports only).
    fn on_connection(&self, _connection: ConnectionId) {}

    /// A connection went away (multi-connection transports only).
    fn on_close(&self, _connection: ConnectionId) {}
}

/// A multiplexed duplex connection.
pub trait Transport: Send + Sync {
    /// Registers a named protocol and hands it the outbound capability.
    fn register_protocol(&self, name: &str, handler: Arc<dyn ProtocolHandler>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn context_respond_routes_to_closure() {
        let seen = Mutex::new(Vec::new());
        let respond = |message: Value| seen.lock().push(message);

        let ctx = MessageContext::new(&respond);
        ctx.respond(Value::Integer(1));
        ctx.respond(Value::Integer(2));

        assert_eq!(
            *seen.lock(),
            vec![Value::Integer(1), Value::Integer(2)]
        );
        assert_eq!(ctx.connection(), None);
    }

    #[test]
    fn detached_context_drops_replies() {
        let ctx = MessageContext::detached();
        // No panic, reply is dropped.
        ctx.respond(Value::Null);
    }

    #[test]
    fn context_carries_connection() {
        let respond = |_: Value| {};
        let id = ConnectionId::new();
        let ctx = MessageContext::from_connection(id, &respond);
        assert_eq!(ctx.connection(), Some(id));
    }
}
