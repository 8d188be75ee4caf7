//! The session state machine shared by master and game clients.
//!
//! A [`Session`] owns at most one live [`RpcChannel`] at a time, plus
//! the background tasks tied to it (keep-alive, latency prober). All
//! mutable state sits behind one async mutex; `connected`/`running` are
//! mirrored into atomics so they can be read without locking.
//!
//! Connect and disconnect are serialized through a gate mutex so two
//! racing connects can never leave two live channels behind.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use garrison_protocol::{Call, FaultCode, Reply};
use garrison_transport::{Connection, Connector};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

use crate::ClientError;
use crate::config::SessionConfig;
use crate::error::{translate, translate_connect, unexpected_reply};
use crate::latency::Pinger;
use crate::rpc::{RpcChannel, RpcError};

/// Username presented when opening a gateway sub-session. The gateway
/// only segregates sessions by name; there is no account behind it.
const GATEWAY_USERNAME: &str = "garrison-client";

/// Things a session announces to subscribers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A background call failed and the session tore itself down.
    /// Everything session-scoped is already gone when this arrives.
    ConnectionLost {
        /// What failed, suitable for display.
        reason: String,
    },
}

/// State only touched under the core lock.
pub(crate) struct SessionCore<C: Connection> {
    pub(crate) config: SessionConfig,
    pub(crate) channel: Option<Arc<RpcChannel<C>>>,
    /// Whether the live channel runs through a gateway sub-session.
    routed: bool,
    pub(crate) token: Option<String>,
    pub(crate) heartbeat: Option<JoinHandle<()>>,
    pub(crate) pinger: Option<Pinger>,
    login_in_flight: bool,
}

pub(crate) struct Session<D: Connector> {
    dialer: D,
    pub(crate) core: Mutex<SessionCore<D::Connection>>,
    gate: Mutex<()>,
    connected: AtomicBool,
    running: AtomicBool,
    events: broadcast::Sender<SessionEvent>,
}

impl<D: Connector> Session<D> {
    pub(crate) fn new(config: SessionConfig, dialer: D) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            dialer,
            core: Mutex::new(SessionCore {
                config,
                channel: None,
                routed: false,
                token: None,
                heartbeat: None,
                pinger: None,
                login_in_flight: false,
            }),
            gate: Mutex::new(()),
            connected: AtomicBool::new(false),
            running: AtomicBool::new(false),
            events,
        }
    }

    pub(crate) fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Establishes the session: dial, optional gateway hop, one probe
    /// round trip. An existing session is torn down first, so a second
    /// connect can never stack a second live channel on the first.
    pub(crate) async fn connect(&self) -> Result<(), ClientError> {
        let _gate = self.gate.lock().await;
        if self.connected() {
            tracing::info!("already connected; severing the current session first");
            self.disconnect_locked().await;
        }

        let config = self.core.lock().await.config.clone();
        let target = config.target();
        tracing::info!(%target, use_gateway = config.use_gateway, "connecting");

        let conn = self
            .dialer
            .connect(&target)
            .await
            .map_err(|e| translate_connect(&target, e))?;
        let channel = RpcChannel::new(conn, config.timeout);

        if config.use_gateway {
            match channel
                .call(Call::GatewayOpen {
                    username: GATEWAY_USERNAME.into(),
                    password: String::new(),
                })
                .await
            {
                Ok(Reply::GatewayOpened) => {
                    tracing::debug!("gateway sub-session opened");
                }
                Ok(other) => {
                    channel.shutdown().await;
                    return unexpected_reply("GatewayOpen", other);
                }
                Err(RpcError::Fault(f)) if f.code == FaultCode::UnknownCall => {
                    // The host answered, but has no gateway to offer.
                    tracing::warn!(%target, "host does not speak the gateway protocol");
                    channel.shutdown().await;
                    return Err(ClientError::GatewayUnsupported);
                }
                Err(e) => {
                    channel.shutdown().await;
                    return Err(translate("GatewayOpen", e));
                }
            }
        }

        // One empty round trip to fail fast on a dead or mismatched
        // endpoint before reporting success.
        match channel.call(Call::Ping).await {
            Ok(Reply::Pong) => {}
            Ok(other) => {
                channel.shutdown().await;
                return unexpected_reply("Ping", other);
            }
            Err(e) => {
                channel.shutdown().await;
                return Err(translate("Ping", e));
            }
        }

        let mut core = self.core.lock().await;
        core.channel = Some(channel);
        core.routed = config.use_gateway;
        self.connected.store(true, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(%target, "connection established");
        Ok(())
    }

    /// Tears the session down: background tasks first, then a
    /// best-effort goodbye, then the channel. Safe to call in any
    /// state; a disconnected session stays disconnected.
    pub(crate) async fn disconnect(&self) {
        let _gate = self.gate.lock().await;
        self.disconnect_locked().await;
    }

    async fn disconnect_locked(&self) {
        let (channel, routed) = {
            let mut core = self.core.lock().await;
            // Stop the clocks before the channel so nothing fires
            // mid-teardown.
            if let Some(heartbeat) = core.heartbeat.take() {
                heartbeat.abort();
            }
            if let Some(pinger) = core.pinger.take() {
                pinger.stop();
            }
            core.token = None;
            core.login_in_flight = false;
            let routed = core.routed;
            core.routed = false;
            self.connected.store(false, Ordering::SeqCst);
            self.running.store(false, Ordering::SeqCst);
            (core.channel.take(), routed)
        };

        if let Some(channel) = channel {
            // Goodbye messages are best-effort; the server also reaps
            // sessions that just vanish.
            channel.notify(Call::Disconnect).await;
            if routed {
                channel.notify(Call::GatewayClose).await;
            }
            channel.shutdown().await;
            tracing::info!("session torn down");
        }
    }

    /// The tear-down policy for background failures: if `channel` is
    /// still the live one, log, disconnect, and announce
    /// [`SessionEvent::ConnectionLost`]. Completions from a channel
    /// that has already been replaced or torn down do nothing, so a
    /// stale callback can never kill a newer session.
    ///
    /// The currency check happens with the gate held, in the same
    /// critical section as the teardown. Checking first and queueing on
    /// the gate afterwards would let a reconnect slip in between and
    /// get torn down by the stale report.
    pub(crate) async fn lost(
        &self,
        channel: &Arc<RpcChannel<D::Connection>>,
        op: &str,
        reason: &str,
    ) {
        let _gate = self.gate.lock().await;
        {
            let core = self.core.lock().await;
            match &core.channel {
                Some(current) if Arc::ptr_eq(current, channel) => {}
                _ => return,
            }
        }
        tracing::error!(op, reason, "lost connection to the server");
        self.disconnect_locked().await;
        let _ = self.events.send(SessionEvent::ConnectionLost {
            reason: reason.to_string(),
        });
    }

    /// The live channel, or a precondition error when there is none.
    pub(crate) async fn channel(
        &self,
    ) -> Result<Arc<RpcChannel<D::Connection>>, ClientError> {
        self.core.lock().await.channel.clone().ok_or_else(|| {
            ClientError::Precondition("not connected to the server".into())
        })
    }

    /// Claims the login slot. At most one login may be in flight per
    /// session.
    pub(crate) async fn begin_login(&self) -> Result<(), ClientError> {
        let mut core = self.core.lock().await;
        if core.login_in_flight {
            return Err(ClientError::Precondition(
                "a login attempt is already in progress".into(),
            ));
        }
        core.login_in_flight = true;
        Ok(())
    }

    pub(crate) async fn end_login(&self) {
        self.core.lock().await.login_in_flight = false;
    }

    pub(crate) async fn keep_alive_config(&self) -> (bool, Duration) {
        let core = self.core.lock().await;
        (core.config.keep_alive, core.config.keep_alive_interval())
    }

    pub(crate) async fn set_keep_alive(&self, enabled: bool) {
        self.core.lock().await.config.keep_alive = enabled;
    }

    pub(crate) async fn set_keep_alive_interval(
        &self,
        interval: Duration,
    ) -> Result<(), ClientError> {
        self.core.lock().await.config.set_keep_alive_interval(interval)
    }

    pub(crate) async fn keep_alive_interval(&self) -> Duration {
        self.core.lock().await.config.keep_alive_interval()
    }

    pub(crate) async fn average_latency(&self) -> Option<Duration> {
        self.core
            .lock()
            .await
            .pinger
            .as_ref()
            .and_then(Pinger::average)
    }
}

impl<D: Connector> Drop for Session<D> {
    fn drop(&mut self) {
        // A session dropped without disconnect() must not leave its
        // timer tasks running.
        if let Ok(mut core) = self.core.try_lock() {
            if let Some(heartbeat) = core.heartbeat.take() {
                heartbeat.abort();
            }
            if let Some(pinger) = core.pinger.take() {
                pinger.stop();
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use garrison_protocol::{CallOutcome, Codec, JsonCodec, Request, Response};
    use garrison_transport::memory::{MemoryConnection, MemoryConnector, memory_pair};
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;

    /// Answers `Ping` on the server half of a memory pair so `connect`
    /// can complete its probe.
    fn answer_pings(server: MemoryConnection) -> JoinHandle<()> {
        tokio::spawn(async move {
            let codec = JsonCodec;
            while let Ok(Some(data)) = server.recv().await {
                let request: Request = codec.decode(&data).unwrap();
                if request.call == Call::Ping {
                    let response = Response {
                        id: request.id,
                        outcome: CallOutcome::Ok(Reply::Pong),
                    };
                    let _ = server.send(&codec.encode(&response).unwrap()).await;
                }
            }
        })
    }

    async fn connected_session() -> (Session<MemoryConnector>, MemoryConnector) {
        let connector = MemoryConnector::new();
        let (client_half, server_half) = memory_pair();
        answer_pings(server_half);
        connector.seed(client_half).await;

        let session = Session::new(
            SessionConfig::new("master.test", 4063),
            connector.clone(),
        );
        session.connect().await.expect("connect should succeed");
        (session, connector)
    }

    #[tokio::test]
    async fn test_lost_from_live_channel_tears_down_and_announces() {
        let (session, _connector) = connected_session().await;
        let mut events = session.subscribe();
        let live = session.channel().await.unwrap();

        session.lost(&live, "KeepAlive", "the connection failed").await;

        assert!(!session.connected());
        let event = events.recv().await.unwrap();
        assert!(matches!(event, SessionEvent::ConnectionLost { .. }));
    }

    #[tokio::test]
    async fn test_lost_from_replaced_channel_is_inert() {
        let (session, connector) = connected_session().await;
        let old = session.channel().await.unwrap();

        // Reconnect onto a second endpoint; `old` is no longer live.
        let (client_half, server_half) = memory_pair();
        answer_pings(server_half);
        connector.seed(client_half).await;
        session.connect().await.expect("reconnect should succeed");
        let mut events = session.subscribe();

        session.lost(&old, "KeepAlive", "stale failure").await;

        assert!(session.connected());
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_lost_racing_a_reconnect_leaves_the_new_session_standing() {
        let (session, connector) = connected_session().await;
        let session = Arc::new(session);
        let old = session.channel().await.unwrap();

        let (client_half, server_half) = memory_pair();
        answer_pings(server_half);
        connector.seed(client_half).await;

        // A loss report for the old channel races a reconnect. In
        // either serialization the session established last survives:
        // the report either fires before the reconnect or finds its
        // channel already replaced.
        let report = tokio::spawn({
            let session = Arc::clone(&session);
            async move {
                session.lost(&old, "KeepAlive", "old channel died").await;
            }
        });
        session.connect().await.expect("reconnect should succeed");
        report.await.unwrap();

        assert!(session.connected());
    }
}
