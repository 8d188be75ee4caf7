//! Wire call shapes for the Garrison master and game servers.
//!
//! The client is not the authority on the wire format — the servers are.
//! This crate captures exactly the call shapes the session layer depends
//! on: request/response envelopes, the [`Call`]/[`Reply`]/[`Fault`] enums,
//! and the domain types that ride inside them.
//!
//! # How it fits in the stack
//!
//! ```text
//! Session Layer (above)  ← builds Calls, interprets Replies and Faults
//!     ↕
//! Protocol Layer (this crate)  ← envelopes, call shapes, codec
//!     ↕
//! Transport Layer (below)  ← moves opaque bytes
//! ```

mod call;
mod codec;
mod error;
mod types;

pub use call::{Call, CallOutcome, Fault, FaultCode, Reply, Request, Response};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use codec::Codec;
pub use error::ProtocolError;
pub use types::{GameMode, ServerInfo, TankAttributes, TankColor};
