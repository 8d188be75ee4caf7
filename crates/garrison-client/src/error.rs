//! The error taxonomy callers see.
//!
//! Every failure leaving this crate is a [`ClientError`]. Lower-level
//! errors (transport, protocol, server faults) are logged in full at the
//! point of failure and then folded into one of these variants, so UI
//! code can branch on the class without parsing strings.

use garrison_protocol::FaultCode;
use garrison_transport::TransportError;

use crate::rpc::RpcError;

/// A failure of one client operation.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A value was rejected locally before any remote call was made,
    /// or the server rejected it as bad information.
    #[error("{0}")]
    Validation(String),

    /// The server rejected the supplied credentials. The message is the
    /// server's reason and is safe to show to the user.
    #[error("{0}")]
    Authentication(String),

    /// The operation requires state the session is not in, e.g. calling
    /// a remote operation before `connect`, or logging in while another
    /// login is still in flight.
    #[error("{0}")]
    Precondition(String),

    /// The transport failed mid-operation. The session (if any) has been
    /// or is being torn down.
    #[error("{0}")]
    ConnectionLost(String),

    /// The target host answered, but does not speak the gateway
    /// protocol. Raised only when a gateway hop was requested.
    #[error("the host does not support the secure gateway protocol")]
    GatewayUnsupported,

    /// A configuration value was rejected. The previous value is kept.
    #[error("{0}")]
    Config(String),

    /// Something failed in a way the client cannot classify. Details
    /// are in the log, not here.
    #[error("an unknown error occurred; please try again")]
    Unknown,
}

impl ClientError {
    /// Whether a background operation failing with this error should
    /// tear the whole session down.
    ///
    /// Rejections (auth, validation, preconditions) leave the session
    /// standing; losing the transport does not.
    pub(crate) fn is_session_fatal(&self) -> bool {
        matches!(self, ClientError::ConnectionLost(_))
    }
}

/// Folds an RPC failure into the public taxonomy, logging the full
/// details first. `op` is the remote operation name, for the log line.
pub(crate) fn translate(op: &'static str, err: RpcError) -> ClientError {
    match err {
        RpcError::Fault(f) if f.code == FaultCode::PermissionDenied => {
            tracing::warn!(op, reason = %f.reason, "permission denied");
            ClientError::Authentication(f.reason)
        }
        RpcError::Fault(f) if f.code == FaultCode::BadInformation => {
            tracing::warn!(op, reason = %f.reason, "rejected by server");
            ClientError::Validation(f.reason)
        }
        RpcError::Fault(f) => {
            tracing::error!(op, code = ?f.code, reason = %f.reason, "server fault");
            ClientError::Unknown
        }
        RpcError::Transport(e) => {
            tracing::error!(op, error = %e, "transport failure");
            ClientError::ConnectionLost(
                "you have lost connection with the server".into(),
            )
        }
        RpcError::Protocol(e) => {
            tracing::error!(op, error = %e, "protocol failure");
            ClientError::Unknown
        }
    }
}

/// Logs a reply that does not answer the call that was made, and folds
/// it into [`ClientError::Unknown`].
pub(crate) fn unexpected_reply<T>(
    op: &'static str,
    reply: garrison_protocol::Reply,
) -> Result<T, ClientError> {
    tracing::error!(op, ?reply, "unexpected reply variant");
    Err(ClientError::Unknown)
}

/// Folds a dial failure into the taxonomy.
pub(crate) fn translate_connect(
    target: &garrison_transport::Target,
    err: TransportError,
) -> ClientError {
    tracing::error!(%target, error = %err, "connect failed");
    ClientError::ConnectionLost(format!("cannot reach {target}"))
}

#[cfg(test)]
mod tests {
    use garrison_protocol::Fault;

    use super::*;

    #[test]
    fn test_permission_denied_fault_becomes_authentication() {
        let err = translate(
            "Login",
            RpcError::Fault(Fault {
                code: FaultCode::PermissionDenied,
                reason: "bad password".into(),
            }),
        );
        assert!(matches!(err, ClientError::Authentication(r) if r == "bad password"));
    }

    #[test]
    fn test_bad_information_fault_becomes_validation() {
        let err = translate(
            "CreateTank",
            RpcError::Fault(Fault {
                code: FaultCode::BadInformation,
                reason: "name taken".into(),
            }),
        );
        assert!(matches!(err, ClientError::Validation(r) if r == "name taken"));
    }

    #[test]
    fn test_internal_fault_becomes_unknown() {
        let err = translate(
            "TankList",
            RpcError::Fault(Fault {
                code: FaultCode::Internal,
                reason: "oops".into(),
            }),
        );
        assert!(matches!(err, ClientError::Unknown));
    }

    #[test]
    fn test_transport_failure_becomes_connection_lost_and_is_fatal() {
        let err = translate(
            "KeepAlive",
            RpcError::Transport(TransportError::ConnectionClosed("gone".into())),
        );
        assert!(err.is_session_fatal());
        assert!(matches!(err, ClientError::ConnectionLost(_)));
    }

    #[test]
    fn test_rejections_are_not_session_fatal() {
        assert!(!ClientError::Validation("x".into()).is_session_fatal());
        assert!(!ClientError::Authentication("x".into()).is_session_fatal());
        assert!(!ClientError::Precondition("x".into()).is_session_fatal());
        assert!(!ClientError::Unknown.is_session_fatal());
    }
}
