//! Two-peer scenario harness over an in-memory transport pair.

use statebus_engine::{ClientEndpoint, ServerEndpoint, SyncStore, SYNC_PROTOCOL};
use statebus_transport::{LoopbackTransport, Transport};
use std::sync::Arc;

/// A connected client/server pair sharing a loopback link.
///
/// Delivery is synchronous: any message sent by one side is fully
/// processed by the other before the sending call returns, so tests can
/// assert on both stores immediately after a dispatch.
pub struct TwoPeerScenario {
    /// The dependent endpoint.
    pub client: Arc<ClientEndpoint>,
    /// The authoritative endpoint.
    pub server: Arc<ServerEndpoint>,
    /// The link; close and reopen it to simulate outages.
    pub link: LoopbackTransport,
}

impl TwoPeerScenario {
    /// Wires both endpoints onto a fresh pair and opens the link.
    pub fn connect(client_store: Arc<SyncStore>, server_store: Arc<SyncStore>) -> Self {
        let scenario = Self::wire(client_store, server_store);
        scenario.link.open();
        scenario
    }

    /// Wires both endpoints but leaves the link closed, for tests that
    /// control the open moment themselves.
    pub fn wire(client_store: Arc<SyncStore>, server_store: Arc<SyncStore>) -> Self {
        let (client_side, server_side) = LoopbackTransport::pair();
        let client = ClientEndpoint::new(client_store);
        let server = ServerEndpoint::new(server_store);

        client_side.register_protocol(SYNC_PROTOCOL, client.clone());
        server_side.register_protocol(SYNC_PROTOCOL, server.clone());

        Self {
            client,
            server,
            link: client_side,
        }
    }
}
