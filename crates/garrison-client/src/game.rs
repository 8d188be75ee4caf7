//! The game server client.
//!
//! A [`GameClient`] is a second, independent session: same transport,
//! same connect/gateway/probe handshake, its own keep-alive loop and
//! latency prober. It is opened through
//! [`MasterClient::open_game_session`](crate::MasterClient::open_game_session)
//! with a join key the master issued; from then on it neither knows nor
//! cares what happens to the master session.

use std::sync::Arc;
use std::time::Duration;

use garrison_protocol::{Call, Reply};
use garrison_transport::Connector;
use tokio::sync::broadcast;

use crate::ClientError;
use crate::config::SessionConfig;
use crate::error::{translate, unexpected_reply};
use crate::heartbeat;
use crate::latency::{self, Pinger};
use crate::rpc::RpcChannel;
use crate::session::{Session, SessionEvent};

struct GameInner<D: Connector> {
    session: Session<D>,
}

/// A client session against one game server.
///
/// Cloning is cheap and every clone drives the same session.
pub struct GameClient<D: Connector + Clone> {
    inner: Arc<GameInner<D>>,
}

impl<D: Connector + Clone> Clone for GameClient<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Connector + Clone> GameClient<D> {
    pub(crate) fn with_connector(config: SessionConfig, dialer: D) -> Self {
        Self {
            inner: Arc::new(GameInner {
                session: Session::new(config, dialer),
            }),
        }
    }

    /// Dials the game server and presents the join key. On acceptance
    /// the keep-alive loop and latency prober start; on any failure
    /// the half-open session is torn down before the error returns.
    pub(crate) async fn connect_and_join(
        &self,
        key: &str,
    ) -> Result<(), ClientError> {
        self.inner.session.connect().await?;
        let channel = self.inner.session.channel().await?;
        let call = Call::JoinGame {
            key: key.to_owned(),
        };
        match channel.call(call).await {
            Ok(Reply::Ack) => {}
            Ok(other) => {
                self.inner.session.disconnect().await;
                return unexpected_reply("JoinGame", other);
            }
            Err(e) => {
                let err = translate("JoinGame", e);
                self.inner.session.disconnect().await;
                return Err(err);
            }
        }
        tracing::info!("game server accepted the join key");
        self.inner.start_background(channel).await;
        Ok(())
    }

    /// Tears the game session down. The master session, if any, is
    /// unaffected.
    pub async fn disconnect(&self) {
        self.inner.session.disconnect().await;
    }

    /// Whether the game session is currently established.
    pub fn connected(&self) -> bool {
        self.inner.session.connected()
    }

    /// Subscribes to this session's events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.session.subscribe()
    }

    /// The most recent measured round-trip time to the game server.
    pub async fn average_latency(&self) -> Option<Duration> {
        self.inner.session.average_latency().await
    }

    /// The average latency rendered for display, e.g. `"31 ms"`.
    pub async fn formatted_average_latency(&self) -> String {
        latency::format_average(self.average_latency().await)
    }
}

impl<D: Connector> GameInner<D> {
    async fn start_background(
        self: &Arc<Self>,
        channel: Arc<RpcChannel<D::Connection>>,
    ) {
        let (keep_alive, interval) = self.session.keep_alive_config().await;
        let mut core = self.session.core.lock().await;
        if keep_alive && core.heartbeat.is_none() {
            let inner = Arc::clone(self);
            let failed_channel = Arc::clone(&channel);
            core.heartbeat = Some(heartbeat::spawn(
                Arc::clone(&channel),
                interval,
                move |reason| async move {
                    inner
                        .session
                        .lost(&failed_channel, "KeepAlive", &reason)
                        .await;
                },
            ));
        }
        if core.pinger.is_none() {
            core.pinger = Some(Pinger::start(channel));
        }
    }
}
