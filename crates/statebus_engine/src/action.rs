//! Actions dispatched against a synchronized store.

use statebus_state::Value;

/// Where an action takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Apply to the local store only.
    Local,
    /// Forward to the peer without applying locally.
    ToPeer,
    /// Apply locally and forward to the peer.
    Both,
}

/// A named state transition request.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// The action name the reducer matches on.
    pub name: String,
    /// The action payload.
    pub payload: Value,
    /// Where the action takes effect.
    pub direction: Direction,
}

impl Action {
    /// Creates an action that applies locally only.
    pub fn local(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            direction: Direction::Local,
        }
    }

    /// Creates an action forwarded to the peer without local effect.
    pub fn to_peer(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            direction: Direction::ToPeer,
        }
    }

    /// Creates an action that applies locally and is forwarded.
    pub fn both(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            direction: Direction::Both,
        }
    }
}
