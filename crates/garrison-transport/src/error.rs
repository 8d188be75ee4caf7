/// Errors that can occur in the transport layer.
///
/// This is the one "transport" failure class the session layer funnels
/// into its connection-lost handling. Everything here means the bytes
/// did not (or can no longer) flow.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Dialing the remote endpoint failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// The operation did not complete within the configured timeout.
    /// Raised for both slow dials and slow calls.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}
