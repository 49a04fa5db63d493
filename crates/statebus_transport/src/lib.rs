//! # Statebus Transport
//!
//! Multiplexed duplex connection transport for statebus.
//!
//! A transport carries many named protocols over one connection. Each
//! protocol registers a [`ProtocolHandler`] and receives a
//! [`MessageSender`] at registration; inbound frames are routed to the
//! handler named by their envelope.
//!
//! This crate provides:
//! - The [`Transport`] / [`ProtocolHandler`] / [`MessageSender`] seams
//! - [`Envelope`] framing (4-byte length prefix, CBOR body)
//! - [`LoopbackTransport`] pairs with run-to-completion delivery for tests
//! - A tokio TCP client with reconnect-and-backoff and send buffering
//! - A tokio TCP server with per-connection ids

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod envelope;
mod error;
mod handler;
mod loopback;
mod server;

pub use client::{TcpClientConfig, TcpClientTransport};
pub use envelope::{read_frame, write_frame, Envelope, MAX_FRAME_LEN};
pub use error::{TransportError, TransportResult};
pub use handler::{ConnectionId, MessageContext, MessageSender, ProtocolHandler, Transport};
pub use loopback::LoopbackTransport;
pub use server::TcpServerTransport;
