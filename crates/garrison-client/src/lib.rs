//! Client-side session management for Garrison servers.
//!
//! This crate is the layer a game UI talks to. It owns the connection
//! to the master server (and, during play, a second one to a game
//! server) and turns raw transport plumbing into a small set of typed
//! operations: log in, manage the tank roster, browse game servers,
//! join one.
//!
//! The entry point is [`MasterClient`]:
//!
//! ```no_run
//! use garrison_client::{MasterClient, SessionConfig};
//!
//! # async fn run() -> Result<(), garrison_client::ClientError> {
//! let client = MasterClient::new(SessionConfig::new("master.example.net", 4063));
//! client.connect().await?;
//! let session = client.login("alice", "hunter2", "R18").await?;
//! let tanks = client.tank_list().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Remote operations come in two shapes. The plain async fns are
//! awaited for their result. The `_async` twins hand the outcome to a
//! [`Callback`] instead, for callers that fire an operation from a
//! render loop and pick the result up later. Both shapes go through the
//! same validation, translation, and failure policy.
//!
//! When a background call discovers the connection is gone, the client
//! tears the whole session down and broadcasts
//! [`SessionEvent::ConnectionLost`]; subscribe with
//! [`MasterClient::subscribe`] to hear about it.

mod config;
mod error;
mod game;
mod heartbeat;
mod latency;
mod master;
mod rpc;
mod session;
mod validate;

pub use config::{
    DEFAULT_KEEP_ALIVE_INTERVAL, MIN_KEEP_ALIVE_INTERVAL, SessionConfig,
};
pub use error::ClientError;
pub use game::GameClient;
pub use master::{Callback, MasterClient, SessionHandle};
pub use session::SessionEvent;
