//! Unified error type for the Garrison client stack.

use garrison_client::ClientError;
use garrison_protocol::ProtocolError;
use garrison_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `garrison` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GarrisonError {
    /// A transport-level error (dial, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A client-level error (validation, auth, session state).
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Setting up the log destination failed.
    #[error("could not open the log destination: {0}")]
    Logging(#[source] std::io::Error),
}
