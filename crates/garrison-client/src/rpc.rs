//! Call/response correlation over one connection.
//!
//! An [`RpcChannel`] owns a connection and a reader task. Callers issue
//! typed [`Call`]s; the channel assigns each a correlation id, sends the
//! encoded request, and parks the caller on a oneshot until the reader
//! task routes the matching [`Response`] back. Any number of calls can
//! be in flight at once.
//!
//! When the connection dies, the channel marks itself dead and fails
//! every pending and future call immediately instead of letting them
//! ride out their timeouts.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use garrison_protocol::{
    Call, CallOutcome, Codec, Fault, JsonCodec, ProtocolError, Reply, Request,
    Response,
};
use garrison_transport::{Connection, TransportError};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

/// A failure of one remote call, before translation into the public
/// taxonomy.
#[derive(Debug, thiserror::Error)]
pub(crate) enum RpcError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The server answered the call with a fault instead of a reply.
    #[error("server fault: {}", .0.reason)]
    Fault(Fault),
}

type PendingMap = HashMap<u64, oneshot::Sender<Result<Reply, RpcError>>>;

/// A connection plus the machinery to multiplex calls over it.
pub(crate) struct RpcChannel<C: Connection> {
    conn: Arc<C>,
    codec: JsonCodec,
    timeout: Duration,
    next_id: AtomicU64,
    pending: Arc<Mutex<PendingMap>>,
    dead: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Connection> RpcChannel<C> {
    /// Wraps a freshly dialed connection and starts its reader task.
    /// `timeout` bounds every individual call.
    pub(crate) fn new(conn: C, timeout: Duration) -> Arc<Self> {
        let conn = Arc::new(conn);
        let pending: Arc<Mutex<PendingMap>> = Arc::new(Mutex::new(HashMap::new()));
        let dead = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_loop(
            Arc::clone(&conn),
            Arc::clone(&pending),
            Arc::clone(&dead),
        ));
        Arc::new(Self {
            conn,
            codec: JsonCodec,
            timeout,
            next_id: AtomicU64::new(1),
            pending,
            dead,
            reader: Mutex::new(Some(reader)),
        })
    }

    /// Issues one call and waits for its reply, bounded by the channel
    /// timeout.
    pub(crate) async fn call(&self, call: Call) -> Result<Reply, RpcError> {
        if self.dead.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed(
                "the channel is down".into(),
            )
            .into());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let op = call.name();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let request = Request { id, call };
        let bytes = match self.codec.encode(&request) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.pending.lock().await.remove(&id);
                return Err(e.into());
            }
        };
        if let Err(e) = self.conn.send(&bytes).await {
            self.pending.lock().await.remove(&id);
            return Err(e.into());
        }
        tracing::trace!(id, op, "call sent");

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result,
            // The reader dropped our sender without resolving it.
            Ok(Err(_)) => Err(TransportError::ConnectionClosed(
                "the channel reader stopped".into(),
            )
            .into()),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                tracing::warn!(id, op, timeout = ?self.timeout, "call timed out");
                Err(TransportError::Timeout(self.timeout).into())
            }
        }
    }

    /// Sends a call without waiting for any reply. Used for goodbye
    /// messages where the answer no longer matters; failures are logged
    /// and swallowed.
    pub(crate) async fn notify(&self, call: Call) {
        if self.dead.load(Ordering::SeqCst) {
            return;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let op = call.name();
        let request = Request { id, call };
        let bytes = match self.codec.encode(&request) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(op, error = %e, "dropping notify");
                return;
            }
        };
        if let Err(e) = self.conn.send(&bytes).await {
            tracing::debug!(op, error = %e, "notify send failed");
        }
    }

    /// Stops the reader, closes the connection, and fails anything
    /// still pending. Safe to call more than once.
    pub(crate) async fn shutdown(&self) {
        self.dead.store(true, Ordering::SeqCst);
        if let Some(handle) = self.reader.lock().await.take() {
            handle.abort();
        }
        if let Err(e) = self.conn.close().await {
            tracing::debug!(conn = %self.conn.id(), error = %e, "close failed");
        }
        fail_pending(&self.pending, "the session was disconnected").await;
    }
}

impl<C: Connection> Drop for RpcChannel<C> {
    fn drop(&mut self) {
        // A channel dropped without shutdown() must not leak its reader.
        if let Ok(mut reader) = self.reader.try_lock() {
            if let Some(handle) = reader.take() {
                handle.abort();
            }
        }
    }
}

async fn read_loop<C: Connection>(
    conn: Arc<C>,
    pending: Arc<Mutex<PendingMap>>,
    dead: Arc<AtomicBool>,
) {
    let codec = JsonCodec;
    loop {
        match conn.recv().await {
            Ok(Some(data)) => {
                let response: Response = match codec.decode(&data) {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::debug!(conn = %conn.id(), error = %e, "dropping undecodable frame");
                        continue;
                    }
                };
                let waiter = pending.lock().await.remove(&response.id);
                let Some(tx) = waiter else {
                    // Timed out, or a reply we never asked for.
                    tracing::trace!(id = response.id, "response with no pending call");
                    continue;
                };
                let result = match response.outcome {
                    CallOutcome::Ok(reply) => Ok(reply),
                    CallOutcome::Fault(fault) => Err(RpcError::Fault(fault)),
                };
                let _ = tx.send(result);
            }
            Ok(None) => {
                tracing::debug!(conn = %conn.id(), "connection closed by peer");
                dead.store(true, Ordering::SeqCst);
                fail_pending(&pending, "the connection was closed by the peer").await;
                break;
            }
            Err(e) => {
                tracing::debug!(conn = %conn.id(), error = %e, "receive failed");
                dead.store(true, Ordering::SeqCst);
                fail_pending(&pending, "the connection failed").await;
                break;
            }
        }
    }
}

async fn fail_pending(pending: &Mutex<PendingMap>, reason: &str) {
    for (_, tx) in pending.lock().await.drain() {
        let _ = tx.send(Err(TransportError::ConnectionClosed(reason.into()).into()));
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use garrison_protocol::FaultCode;
    use garrison_transport::memory::memory_pair;

    use super::*;

    /// Answers every decoded request on `server` with `respond(call)`.
    fn script_server<F>(
        server: garrison_transport::MemoryConnection,
        respond: F,
    ) -> JoinHandle<()>
    where
        F: Fn(&Call) -> Option<CallOutcome> + Send + 'static,
    {
        tokio::spawn(async move {
            let codec = JsonCodec;
            while let Ok(Some(data)) = server.recv().await {
                let request: Request = codec.decode(&data).unwrap();
                if let Some(outcome) = respond(&request.call) {
                    let response = Response {
                        id: request.id,
                        outcome,
                    };
                    let bytes = codec.encode(&response).unwrap();
                    let _ = server.send(&bytes).await;
                }
            }
        })
    }

    #[tokio::test]
    async fn test_call_resolves_with_matching_reply() {
        let (client, server) = memory_pair();
        script_server(server, |_| Some(CallOutcome::Ok(Reply::Pong)));
        let channel = RpcChannel::new(client, Duration::from_secs(5));

        let reply = channel.call(Call::Ping).await.unwrap();
        assert_eq!(reply, Reply::Pong);
    }

    #[tokio::test]
    async fn test_call_surfaces_fault() {
        let (client, server) = memory_pair();
        script_server(server, |_| {
            Some(CallOutcome::Fault(Fault {
                code: FaultCode::PermissionDenied,
                reason: "no".into(),
            }))
        });
        let channel = RpcChannel::new(client, Duration::from_secs(5));

        let result = channel.call(Call::KeepAlive).await;
        assert!(
            matches!(result, Err(RpcError::Fault(f)) if f.code == FaultCode::PermissionDenied)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_times_out_when_server_is_silent() {
        let (client, server) = memory_pair();
        script_server(server, |_| None);
        let channel = RpcChannel::new(client, Duration::from_secs(2));

        let result = channel.call(Call::Ping).await;
        assert!(matches!(
            result,
            Err(RpcError::Transport(TransportError::Timeout(_)))
        ));
    }

    #[tokio::test]
    async fn test_pending_call_fails_when_peer_closes() {
        let (client, server) = memory_pair();
        let channel = RpcChannel::new(client, Duration::from_secs(30));

        let call = tokio::spawn({
            let channel = Arc::clone(&channel);
            async move { channel.call(Call::Ping).await }
        });
        // Let the call get onto the wire, then kill the connection.
        server.recv().await.unwrap();
        server.close().await.unwrap();

        let result = call.await.unwrap();
        assert!(matches!(
            result,
            Err(RpcError::Transport(TransportError::ConnectionClosed(_)))
        ));
    }

    #[tokio::test]
    async fn test_call_after_shutdown_fails_fast() {
        let (client, _server) = memory_pair();
        let channel = RpcChannel::new(client, Duration::from_secs(30));

        channel.shutdown().await;
        let result = channel.call(Call::Ping).await;
        assert!(matches!(
            result,
            Err(RpcError::Transport(TransportError::ConnectionClosed(_)))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_calls_resolve_to_their_own_replies() {
        let (client, server) = memory_pair();
        script_server(server, |call| {
            Some(CallOutcome::Ok(match call {
                Call::Ping => Reply::Pong,
                _ => Reply::Ack,
            }))
        });
        let channel = RpcChannel::new(client, Duration::from_secs(5));

        let ping = tokio::spawn({
            let channel = Arc::clone(&channel);
            async move { channel.call(Call::Ping).await }
        });
        let keep_alive = tokio::spawn({
            let channel = Arc::clone(&channel);
            async move { channel.call(Call::KeepAlive).await }
        });

        assert_eq!(ping.await.unwrap().unwrap(), Reply::Pong);
        assert_eq!(keep_alive.await.unwrap().unwrap(), Reply::Ack);
    }
}
