//! `rftp` — the Reliable File Transfer Protocol: one file, one client, one
//! server, over UDP, made reliable with stop-and-wait ARQ and a one-bit
//! alternating sequence number.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐  INIT / DATA / TERM  ┌──────────┐
//!  │  Client  │─────────────────────▶│  Server  │
//!  └────┬─────┘                      └─────┬────┘
//!       │            echoed ACKs           │
//!       │◀─────────────────────────────────┘
//!       │
//!  ┌────▼──────────────────────┐
//!  │  arq::send_reliable       │  (one message in flight, retransmit on timeout)
//!  └────┬──────────────────────┘
//!       │ Envelope (≤ 1472 bytes)
//!  ┌────▼──────┐
//!  │ Transport │  (tokio UdpSocket, or the fault-injecting Simulator)
//!  └───────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`message`]     — wire format (encode / decode, envelope)
//! - [`arq`]         — stop-and-wait reliable send primitive
//! - [`client`]      — client session: Init → Data loop → Term
//! - [`server`]      — server session: await Init → receive → time-wait
//! - [`state`]       — finite-state-machine types for both roles
//! - [`config`]      — explicit session configuration and defaults
//! - [`timer`]       — retransmit deadline
//! - [`file_store`]  — reading the source file, writing the received file
//! - [`progress`]    — transfer progress reporting
//! - [`simulator`]   — lossy/duplicating transport wrapper for testing
//! - [`socket`]      — datagram transport abstraction
//! - [`error`]       — codec and session error types

pub mod arq;
pub mod client;
pub mod config;
pub mod error;
pub mod file_store;
pub mod message;
pub mod progress;
pub mod server;
pub mod simulator;
pub mod socket;
pub mod state;
pub mod timer;

pub use client::{Client, ClientReport};
pub use config::{ClientConfig, DuplicatePolicy, ServerConfig};
pub use error::{CodecError, SessionError};
pub use message::{ControlKind, ControlMessage, DataMessage, Envelope, Message, MessageKind, Seq};
pub use server::{Server, ServerReport};
pub use socket::{Socket, Transport};
