//! In-process memory transport.
//!
//! A pair of coupled connections backed by unbounded channels. The client
//! side dials through a [`MemoryConnector`] seeded with pre-built
//! connections; the other half of each pair acts as the fake server in
//! tests. No sockets, no ports, fully deterministic.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::{Connection, ConnectionId, Connector, Target, TransportError};

static NEXT_MEMORY_ID: AtomicU64 = AtomicU64::new(1);

/// Creates two coupled in-process connections.
///
/// Whatever one side sends, the other receives. Closing either side makes
/// the peer's `recv` return `Ok(None)`.
pub fn memory_pair() -> (MemoryConnection, MemoryConnection) {
    let (a_tx, b_rx) = unbounded_channel();
    let (b_tx, a_rx) = unbounded_channel();
    (
        MemoryConnection::new(a_tx, a_rx),
        MemoryConnection::new(b_tx, b_rx),
    )
}

/// One half of an in-process connection pair.
pub struct MemoryConnection {
    id: ConnectionId,
    tx: Mutex<Option<UnboundedSender<Vec<u8>>>>,
    rx: Mutex<UnboundedReceiver<Vec<u8>>>,
}

impl MemoryConnection {
    fn new(tx: UnboundedSender<Vec<u8>>, rx: UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            id: ConnectionId::new(NEXT_MEMORY_ID.fetch_add(1, Ordering::Relaxed)),
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(rx),
        }
    }
}

impl Connection for MemoryConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let tx = self.tx.lock().await;
        match tx.as_ref() {
            Some(tx) => tx.send(data.to_vec()).map_err(|_| {
                TransportError::ConnectionClosed("peer dropped".into())
            }),
            None => Err(TransportError::ConnectionClosed("locally closed".into())),
        }
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.rx.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Dropping the sender makes the peer's recv return None.
        self.tx.lock().await.take();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// A [`Connector`] that hands out pre-seeded memory connections in FIFO
/// order. Dialing with an empty queue fails like an unreachable host.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    pending: Arc<Mutex<VecDeque<MemoryConnection>>>,
}

impl MemoryConnector {
    /// Creates an empty connector. Every dial fails until seeded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a connection to be returned by the next dial.
    pub async fn seed(&self, conn: MemoryConnection) {
        self.pending.lock().await.push_back(conn);
    }
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(
        &self,
        target: &Target,
    ) -> Result<Self::Connection, TransportError> {
        self.pending.lock().await.pop_front().ok_or_else(|| {
            TransportError::ConnectFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("no memory endpoint for {target}"),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_pair_send_and_receive_both_directions() {
        let (a, b) = memory_pair();

        a.send(b"from a").await.expect("send should succeed");
        assert_eq!(b.recv().await.unwrap(), Some(b"from a".to_vec()));

        b.send(b"from b").await.expect("send should succeed");
        assert_eq!(a.recv().await.unwrap(), Some(b"from b".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_recv_returns_none_after_peer_close() {
        let (a, b) = memory_pair();
        a.close().await.unwrap();
        assert_eq!(b.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_send_after_close_fails() {
        let (a, _b) = memory_pair();
        a.close().await.unwrap();
        assert!(a.send(b"late").await.is_err());
    }

    #[tokio::test]
    async fn test_memory_connector_hands_out_seeded_connections() {
        let connector = MemoryConnector::new();
        let (client_side, _server_side) = memory_pair();
        let client_id = client_side.id();
        connector.seed(client_side).await;

        let conn = connector
            .connect(&Target::new("example.test", 4063))
            .await
            .expect("should hand out the seeded connection");
        assert_eq!(conn.id(), client_id);
    }

    #[tokio::test]
    async fn test_memory_connector_empty_queue_refuses() {
        let connector = MemoryConnector::new();
        let result = connector.connect(&Target::new("dead.test", 1)).await;
        assert!(matches!(result, Err(TransportError::ConnectFailed(_))));
    }
}
