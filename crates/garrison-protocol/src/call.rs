//! Request/response envelopes and the call shapes of the remote contract.
//!
//! Every message the client sends is a [`Request`]: a correlation id plus
//! one [`Call`]. Every message it receives is a [`Response`]: the same id
//! plus a [`CallOutcome`] — either the [`Reply`] for that call or a
//! [`Fault`] the server raised.
//!
//! The id is what lets many calls share one connection: the RPC layer
//! matches each incoming `Response` to the pending call that issued it.

use serde::{Deserialize, Serialize};

use crate::types::{ServerInfo, TankAttributes};

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

/// Client → server: one remote call with its correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, unique per connection.
    pub id: u64,
    /// The call being made.
    pub call: Call,
}

/// Server → client: the outcome of one call, correlated by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Correlation id echoed from the request.
    pub id: u64,
    /// The result of the call.
    pub outcome: CallOutcome,
}

/// Either the reply for a call or a fault the server raised instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "body")]
pub enum CallOutcome {
    /// The call succeeded; here is its reply.
    Ok(Reply),
    /// The server rejected or failed the call.
    Fault(Fault),
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

/// Every remote operation the client can invoke.
///
/// `Ping` is answered by both the session factory and per-session
/// objects; it carries no payload and exists so the client can fail fast
/// on a dead or protocol-mismatched endpoint. `GatewayOpen`/`GatewayClose`
/// are only understood by hosts running the secure gateway — anything
/// else answers them with [`FaultCode::UnknownCall`], which is how the
/// client detects a host that does not speak the gateway protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Call {
    /// No-op liveness probe.
    Ping,

    /// Opens a routed sub-session through a secure gateway.
    GatewayOpen { username: String, password: String },

    /// Releases a previously opened routed sub-session.
    GatewayClose,

    /// Authenticates against the session factory.
    Login {
        username: String,
        password: String,
        client_version: String,
    },

    /// Asks the master for the newest released client version, so an
    /// outdated client can prompt for an update before logging in.
    CheckClientVersion,

    /// No-op call proving the session is still alive.
    KeepAlive,

    /// Tells the server the client is going away.
    Disconnect,

    /// Creates a new tank owned by the logged-in account.
    CreateTank { tank: TankAttributes },

    /// Replaces the named tank's attributes.
    UpdateTank { name: String, tank: TankAttributes },

    /// Deletes the named tank.
    DeleteTank { name: String },

    /// Fetches the account's tank roster.
    TankList,

    /// Tells the master which of the account's tanks will be fielded.
    SelectTank { name: String },

    /// Fetches the list of registered game servers.
    ServerList,

    /// Asks the master for permission to join a game server.
    /// The reply carries a one-time key the game server will verify.
    RequestJoin { server: ServerInfo },

    /// Presents a join key to a game server.
    JoinGame { key: String },
}

impl Call {
    /// Short operation name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Call::Ping => "Ping",
            Call::GatewayOpen { .. } => "GatewayOpen",
            Call::GatewayClose => "GatewayClose",
            Call::Login { .. } => "Login",
            Call::CheckClientVersion => "CheckClientVersion",
            Call::KeepAlive => "KeepAlive",
            Call::Disconnect => "Disconnect",
            Call::CreateTank { .. } => "CreateTank",
            Call::UpdateTank { .. } => "UpdateTank",
            Call::DeleteTank { .. } => "DeleteTank",
            Call::TankList => "TankList",
            Call::SelectTank { .. } => "SelectTank",
            Call::ServerList => "ServerList",
            Call::RequestJoin { .. } => "RequestJoin",
            Call::JoinGame { .. } => "JoinGame",
        }
    }
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// Successful reply payloads, one per call family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Reply {
    /// Answer to [`Call::Ping`].
    Pong,

    /// The gateway accepted [`Call::GatewayOpen`]; calls are now routed.
    GatewayOpened,

    /// Answer to [`Call::Login`]: the session token to present later.
    LoggedIn { token: String },

    /// Answer to [`Call::CheckClientVersion`]: the newest version string.
    ClientVersion { version: String },

    /// Answer to create/update/delete: whether the server applied it.
    Accepted { ok: bool },

    /// Answer to [`Call::TankList`].
    Tanks { tanks: Vec<TankAttributes> },

    /// Answer to [`Call::ServerList`].
    Servers { servers: Vec<ServerInfo> },

    /// Answer to [`Call::RequestJoin`]: the one-time join key.
    JoinKey { key: String },

    /// Bare acknowledgement (keep-alive, disconnect, join-game).
    Ack,
}

// ---------------------------------------------------------------------------
// Faults
// ---------------------------------------------------------------------------

/// A server-raised failure for one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    /// Machine-readable failure class.
    pub code: FaultCode,
    /// Human-readable reason supplied by the server.
    pub reason: String,
}

/// The failure classes a server distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum FaultCode {
    /// Credentials rejected. The reason string is shown to the user.
    PermissionDenied,
    /// The request referred to something invalid or unknown.
    BadInformation,
    /// The endpoint does not implement the call. Notably raised by
    /// non-gateway hosts answering `GatewayOpen`.
    UnknownCall,
    /// The server failed internally.
    Internal,
}

// =========================================================================
// Tests
// =========================================================================
