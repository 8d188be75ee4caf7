//! # Garrison
//!
//! Client-side session and RPC layer for Garrison game servers.
//!
//! Garrison manages the two connections a game client holds: the
//! long-lived session against the master server (accounts, the tank
//! roster, the server browser) and the per-match session against a
//! game server. The frontend gets typed operations, a validated tank
//! editor, automatic keep-alive, and a single error taxonomy; the
//! plumbing (WebSocket transport, JSON protocol, call correlation,
//! latency probing) stays behind this facade.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use garrison::prelude::*;
//!
//! # async fn run() -> Result<(), GarrisonError> {
//! garrison::init_logging("garrison_client=debug,info", LogDestination::Stderr)?;
//!
//! let client = MasterClient::new(SessionConfig::new("master.example.net", 4063));
//! client.connect().await?;
//! client.login("alice", "hunter2", "R18").await?;
//!
//! for server in client.server_list().await? {
//!     println!("{server}");
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod logging;

pub use error::GarrisonError;
pub use logging::{LogDestination, init_logging};

/// Everything a typical frontend needs, in one import.
pub mod prelude {
    pub use garrison_client::{
        Callback, ClientError, GameClient, MasterClient, SessionConfig,
        SessionEvent, SessionHandle,
    };
    pub use garrison_protocol::{
        GameMode, ServerInfo, TankAttributes, TankColor,
    };
    pub use garrison_transport::Target;

    pub use crate::{GarrisonError, LogDestination};
}

pub use garrison_client::{
    Callback, ClientError, GameClient, MasterClient, SessionConfig,
    SessionEvent, SessionHandle,
};
pub use garrison_protocol::{GameMode, ServerInfo, TankAttributes, TankColor};
pub use garrison_transport::{Target, TransportError};
