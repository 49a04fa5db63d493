//! The dependent endpoint: tracks the authoritative peer's state.
//!
//! The first version check waits until the transport is open AND local
//! rehydration is complete, whichever happens later. After that, a
//! check is re-sent on every reconnect and whenever the reconciler
//! detects an out-of-sequence update.

use crate::action::{Action, Direction};
use crate::store::SyncStore;
use parking_lot::RwLock;
use statebus_protocol::SyncMessage;
use statebus_state::Value;
use statebus_transport::{MessageContext, MessageSender, ProtocolHandler};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// The initiating, dependent role of the sync protocol.
pub struct ClientEndpoint {
    store: Arc<SyncStore>,
    sender: RwLock<Option<Arc<dyn MessageSender>>>,
    transport_open: AtomicBool,
    rehydration_complete: AtomicBool,
}

impl ClientEndpoint {
    /// Creates the endpoint around a store.
    ///
    /// Without a configured rehydration action the endpoint counts as
    /// rehydrated from the start.
    pub fn new(store: Arc<SyncStore>) -> Arc<Self> {
        let rehydrated = store.config().wait_for_action().is_none();
        Arc::new(Self {
            store,
            sender: RwLock::new(None),
            transport_open: AtomicBool::new(false),
            rehydration_complete: AtomicBool::new(rehydrated),
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

    /// Sends a version check if both gates are open.
    pub fn maybe_check_version(&self) {
        if !self.transport_open.load(Ordering::SeqCst)
            || !self.rehydration_complete.load(Ordering::SeqCst)
        {
            return;
        }
        self.send(&SyncMessage::CheckVersion {
            versions: self.store.versions(),
        });
    }

    fn local_dispatch(&self, action: &Action) {
        let transition = self.store.dispatch(action);
        if transition.matched_rehydration
            && !self.rehydration_complete.swap(true, Ordering::SeqCst)
        {
            debug!(action = %action.name, "rehydration complete");
            self.maybe_check_version();
        }
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
            debug!(%error, "send failed, relying on reconnect to resync");
        }
    }
}

impl ProtocolHandler for ClientEndpoint {
    fn bind(&self, sender: Arc<dyn MessageSender>) {
        *self.sender.write() = Some(sender);
    }

    fn on_open(&self) {
        self.transport_open.store(true, Ordering::SeqCst);
        self.maybe_check_version();
    }

    fn on_message(&self, message: Value, _ctx: &MessageContext<'_>) {
        match SyncMessage::from_value(&message) {
            Ok(SyncMessage::InitialState(payload)) => {
                // Unconditional merge; never triggers another check, so
                // version mismatches cannot loop.
                self.store.apply_snapshot(&payload);
            }
            Ok(SyncMessage::UpdateState(batch)) => {
                if self.store.apply_batch(&batch) {
                    debug!("out-of-sequence update, requesting resync");
                    self.maybe_check_version();
                }
            }
            Ok(SyncMessage::RemoteAction { name, payload }) => {
                self.local_dispatch(&Action::local(name, payload));
            }
            Ok(SyncMessage::CheckVersion { .. }) => {
                debug!("ignoring version check sent to dependent endpoint");
            }
            Err(error) => {
                warn!(%error, "ignoring malformed sync message");
            }
        }
    }
}
