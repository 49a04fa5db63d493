//! The authoritative endpoint: owns the synchronized keys.
//!
//! Version checks are answered with a full snapshot of everything the
//! asker is missing; local state transitions broadcast incremental
//! update batches to every live connection.

use crate::action::{Action, Direction};
use crate::store::SyncStore;
use parking_lot::RwLock;
use statebus_protocol::{collect_new_versions, SyncMessage, UpdateBatch};
use statebus_state::Value;
use statebus_transport::{MessageContext, MessageSender, ProtocolHandler};
use std::sync::Arc;
use tracing::{debug, warn};

/// The authoritative role of the sync protocol.
pub struct ServerEndpoint {
    store: Arc<SyncStore>,
    sender: RwLock<Option<Arc<dyn MessageSender>>>,
}

impl ServerEndpoint {
    /// Creates the endpoint around a store.
    pub fn new(store: Arc<SyncStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            sender: RwLock::new(None),
        })
    }

    /// The wrapped store.
    pub fn store(&self) -> &Arc<SyncStore> {
        &self.store
    }

    /// Dispatches an action according to its direction.
    pub fn dispatch(&self, action: &Action) {
        match action.direction {
            Direction::Local => self.local_dispatch(action),
            Direction::ToPeer => self.forward(action),
            Direction::Both => {
                self.local_dispatch(action);
                self.forward(action);
            }
        }
    }

    fn local_dispatch(&self, action: &Action) {
        let transition = self.store.dispatch(action);
        self.broadcast(transition.batch);
    }

    fn broadcast(&self, batch: UpdateBatch) {
        if batch.is_empty() {
            return;
        }
        self.send(&SyncMessage::UpdateState(batch));
    }

    fn forward(&self, action: &Action) {
        self.send(&SyncMessage::RemoteAction {
            name: action.name.clone(),
            payload: action.payload.clone(),
        });
    }

    fn send(&self, message: &SyncMessage) {
        let sender = self.sender.read().clone();
        let Some(sender) = sender else {
            debug!("endpoint not bound to a transport, dropping send");
            return;
        };
        if let Err(error) = sender.send(message.to_value()) {
            debug!(%error, "broadcast failed");
        }
    }
}

impl ProtocolHandler for ServerEndpoint {
    fn bind(&self, sender: Arc<dyn MessageSender>) {
        *self.sender.write() = Some(sender);
    }

    fn on_message(&self, message: Value, ctx: &MessageContext<'_>) {
        match SyncMessage::from_value(&message) {
            Ok(SyncMessage::CheckVersion { versions }) => {
                let snapshot = collect_new_versions(
                    &self.store.state(),
                    &versions,
                    self.store.config().skip_version(),
                );
                // Nothing missing means nothing to send.
                if let Some(payload) = snapshot {
                    ctx.respond(SyncMessage::InitialState(payload).to_value());
                }
            }
            Ok(SyncMessage::RemoteAction { name, payload }) => {
                self.local_dispatch(&Action::local(name, payload));
            }
            Ok(SyncMessage::InitialState(_)) | Ok(SyncMessage::UpdateState(_)) => {
                debug!("ignoring state push sent to authoritative endpoint");
            }
            Err(error) => {
                warn!(%error, "ignoring malformed sync message");
            }
        }
    }
}
