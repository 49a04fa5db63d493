//! The sync server hub.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use statebus_engine::{Action, ServerEndpoint, SyncStore, SYNC_PROTOCOL};
use statebus_rpc::{RpcServer, RpcService, RPC_PROTOCOL};
use statebus_transport::{TcpServerTransport, Transport};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// The authoritative sync server over TCP.
///
/// Owns the synchronized state and serves any number of client
/// connections: version checks are answered per connection, local
/// dispatches broadcast update batches to all of them, and RPC services
/// share the same connections under their own protocol name.
pub struct SyncServer {
    endpoint: Arc<ServerEndpoint>,
    rpc: Arc<RpcServer>,
    transport: TcpServerTransport,
}

impl SyncServer {
    /// Binds the listener and starts serving the store.
    pub async fn start(config: ServerConfig, store: Arc<SyncStore>) -> ServerResult<Self> {
        store.config().validate()?;

        let transport = TcpServerTransport::bind(config.bind_addr).await?;
        let endpoint = ServerEndpoint::new(store);
        transport.register_protocol(SYNC_PROTOCOL, endpoint.clone());

        let rpc = RpcServer::new();
        transport.register_protocol(RPC_PROTOCOL, rpc.clone());

        info!(addr = %transport.local_addr(), "sync server started");
        Ok(Self {
            endpoint,
            rpc,
            transport,
        })
    }

    /// Dispatches an action against the authoritative store, broadcasting
    /// any resulting update batch.
    pub fn dispatch(&self, action: &Action) {
        self.endpoint.dispatch(action);
    }

    /// The authoritative store.
    pub fn store(&self) -> &Arc<SyncStore> {
        self.endpoint.store()
    }

    /// Registers an RPC service available to all clients.
    pub fn register_service(&self, name: impl Into<String>, service: Arc<dyn RpcService>) {
        self.rpc.register_service(name, service);
    }

    /// The address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Number of live client connections.
    pub fn connection_count(&self) -> usize {
        self.transport.connection_count()
    }

    /// Stops accepting and drops all connections.
    pub fn shutdown(&self) {
        self.transport.shutdown();
    }
}
