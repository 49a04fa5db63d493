//! The calling side of the RPC protocol.

use crate::error::{RpcError, RpcResult};
use crate::message::{RpcRequest, RpcResponse};
use parking_lot::{Mutex, RwLock};
use statebus_state::Value;
use statebus_transport::{MessageContext, MessageSender, ProtocolHandler};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Default deadline for a call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Issues calls and correlates responses by id.
pub struct RpcClient {
    sender: RwLock<Option<Arc<dyn MessageSender>>>,
    pending: Mutex<HashMap<u64, oneshot::Sender<RpcResult<Value>>>>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl RpcClient {
    /// Creates a client with the default call timeout.
    pub fn new() -> Arc<Self> {
        Self::with_timeout(DEFAULT_CALL_TIMEOUT)
    }

    /// Creates a client with an explicit call timeout.
    pub fn with_timeout(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            sender: RwLock::new(None),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            timeout,
        })
    }

    /// Calls `method` on the remote `service` and awaits the answer.
    ///
    /// A call past its deadline resolves to [`RpcError::Timeout`] and its
    /// pending entry is dropped; a response arriving after that is
    /// discarded.
    pub async fn call(
        &self,
        service: impl Into<String>,
        method: impl Into<String>,
        args: Value,
    ) -> RpcResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let request = RpcRequest {
            id,
            service: service.into(),
            method: method.into(),
            args,
        };

        if let Err(error) = self.send(request.to_value()) {
            self.pending.lock().remove(&id);
            return Err(error);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RpcError::Closed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(RpcError::Timeout)
            }
        }
    }

    /// Number of calls still awaiting a response.
    pub fn pending_calls(&self) -> usize {
        self.pending.lock().len()
    }

    fn send(&self, message: Value) -> RpcResult<()> {
        let sender = self.sender.read().clone();
        let Some(sender) = sender else {
            return Err(RpcError::Closed);
        };
        sender.send(message).map_err(|_| RpcError::Closed)
    }
}

impl ProtocolHandler for RpcClient {
    fn bind(&self, sender: Arc<dyn MessageSender>) {
        *self.sender.write() = Some(sender);
    }

    fn on_message(&self, message: Value, _ctx: &MessageContext<'_>) {
        let response = match RpcResponse::from_value(&message) {
            Ok(response) => response,
            Err(error) => {
                warn!(%error, "ignoring malformed rpc response");
                return;
            }
        };

        let Some(tx) = self.pending.lock().remove(&response.id) else {
            debug!(id = response.id, "dropping late rpc response");
            return;
        };

        let result = response.result.map_err(RpcError::Remote);
        // The caller may have stopped awaiting; that is fine.
        let _ = tx.send(result);
    }
}
