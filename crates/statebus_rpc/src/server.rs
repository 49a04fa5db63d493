//! The answering side of the RPC protocol.

use crate::error::{RpcError, RpcResult};
use crate::message::{RpcRequest, RpcResponse};
use parking_lot::RwLock;
use statebus_state::Value;
use statebus_transport::{MessageContext, MessageSender, ProtocolHandler};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// A named group of callable methods.
pub trait RpcService: Send + Sync {
    /// Handles one call. The error's display string is what the caller
    /// sees; anything sensitive stays out of it.
    fn call(&self, method: &str, args: Value) -> RpcResult<Value>;
}

impl<F> RpcService for F
where
    F: Fn(&str, Value) -> RpcResult<Value> + Send + Sync,
{
    fn call(&self, method: &str, args: Value) -> RpcResult<Value> {
        self(method, args)
    }
}

/// Dispatches inbound calls to explicitly registered services.
#[derive(Default)]
pub struct RpcServer {
    services: RwLock<HashMap<String, Arc<dyn RpcService>>>,
}

impl RpcServer {
    /// Creates a server with no services.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a service under a name. Re-registering replaces it.
    pub fn register_service(&self, name: impl Into<String>, service: Arc<dyn RpcService>) {
        self.services.write().insert(name.into(), service);
    }

    fn handle(&self, request: &RpcRequest) -> RpcResult<Value> {
        let service = self
            .services
            .read()
            .get(&request.service)
            .cloned()
            .ok_or_else(|| RpcError::UnknownService(request.service.clone()))?;
        service.call(&request.method, request.args.clone())
    }
}

impl ProtocolHandler for RpcServer {
    // Responses travel back on the asking connection, never broadcast.
    fn bind(&self, _sender: Arc<dyn MessageSender>) {}

    fn on_message(&self, message: Value, ctx: &MessageContext<'_>) {
        let request = match RpcRequest::from_value(&message) {
            Ok(request) => request,
            Err(error) => {
                warn!(%error, "ignoring malformed rpc request");
                return;
            }
        };

        let result = self.handle(&request).map_err(|error| {
            warn!(
                service = %request.service,
                method = %request.method,
                %error,
                "rpc call failed"
            );
            error.to_string()
        });

        ctx.respond(
            RpcResponse {
                id: request.id,
                result,
            }
            .to_value(),
        );
    }
}
