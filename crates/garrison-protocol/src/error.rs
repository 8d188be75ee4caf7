//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
///
/// A `ProtocolError` always means the bytes and our types disagree —
/// networking problems are `TransportError`, and server-side rejections
/// travel as [`Fault`](crate::Fault) values, not errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded fine but violates the call contract —
    /// e.g. a reply variant that doesn't answer the call that was made.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
