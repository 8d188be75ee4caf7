//! The master server client.
//!
//! [`MasterClient`] is the account-facing half of the client: it owns
//! the session against the master server, the login flow, the cached
//! tank roster, and the hand-off to game servers. Every remote
//! operation comes in two shapes: a plain async fn the caller awaits,
//! and an `_async` twin that dispatches the call and delivers its
//! outcome to a [`Callback`] on a runtime worker thread.
//!
//! The twins share one failure policy: a completion that lost the
//! transport tears the whole session down and announces
//! [`SessionEvent::ConnectionLost`] before the callback runs. The sync
//! shapes surface the same error classes but leave teardown to the
//! caller, who is holding the result in hand and can decide.

use std::sync::Arc;
use std::time::Duration;

use garrison_protocol::{Call, Reply, ServerInfo, TankAttributes};
use garrison_transport::{Connector, WebSocketConnector};
use tokio::sync::{Mutex, broadcast};

use crate::ClientError;
use crate::config::SessionConfig;
use crate::error::{translate, unexpected_reply};
use crate::game::GameClient;
use crate::heartbeat;
use crate::latency;
use crate::rpc::RpcChannel;
use crate::session::{Session, SessionEvent};
use crate::validate;

/// Completion handler for an `_async` operation. Runs exactly once, on
/// a runtime worker thread, with the operation's outcome.
pub type Callback<T> = Box<dyn FnOnce(Result<T, ClientError>) + Send + 'static>;

/// Proof of a successful login: the token the master issued for this
/// session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle(String);

impl SessionHandle {
    /// The raw session token.
    pub fn token(&self) -> &str {
        &self.0
    }
}

/// The account's tank roster plus a freshness flag. `dirty` starts
/// true and is raised again by every successful mutation, so reads
/// only hit the server when the cache may be stale.
struct TankCache {
    tanks: Vec<TankAttributes>,
    dirty: bool,
}

impl Default for TankCache {
    fn default() -> Self {
        Self {
            tanks: Vec::new(),
            dirty: true,
        }
    }
}

struct MasterInner<D: Connector + Clone> {
    session: Session<D>,
    tanks: Mutex<TankCache>,
    /// Kept so game sessions dial through the same transport.
    dialer: D,
}

/// A client session against the master server.
///
/// Cloning is cheap and every clone drives the same session.
pub struct MasterClient<D: Connector + Clone = WebSocketConnector> {
    inner: Arc<MasterInner<D>>,
}

impl<D: Connector + Clone> Clone for MasterClient<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl MasterClient<WebSocketConnector> {
    /// Creates a client that dials over WebSocket.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_connector(config, WebSocketConnector)
    }
}

impl<D: Connector + Clone> MasterClient<D> {
    /// Creates a client that dials through the given connector.
    pub fn with_connector(config: SessionConfig, dialer: D) -> Self {
        Self {
            inner: Arc::new(MasterInner {
                session: Session::new(config, dialer.clone()),
                tanks: Mutex::new(TankCache::default()),
                dialer,
            }),
        }
    }

    // -- session lifecycle --------------------------------------------------

    /// Connects to the master server. If a session is already up it is
    /// torn down first; on success exactly one live session exists.
    ///
    /// # Errors
    /// `ConnectionLost` if the endpoint cannot be reached,
    /// `GatewayUnsupported` if a gateway hop was configured but the
    /// host has no gateway.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.inner.session.connect().await?;
        self.inner.reset_cache().await;
        Ok(())
    }

    /// Tears the session down. Safe to call in any state.
    pub async fn disconnect(&self) {
        self.inner.session.disconnect().await;
        self.inner.reset_cache().await;
    }

    /// Whether a session is currently established.
    pub fn connected(&self) -> bool {
        self.inner.session.connected()
    }

    /// Whether the client's background machinery is running.
    pub fn running(&self) -> bool {
        self.inner.session.running()
    }

    /// Subscribes to session events. Events announce things that
    /// happen outside any call the subscriber made, like a background
    /// keep-alive discovering the connection is gone.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.session.subscribe()
    }

    // -- keep-alive configuration -------------------------------------------

    /// Enables or disables the keep-alive loop. Takes effect at the
    /// next login.
    pub async fn set_keep_alive(&self, enabled: bool) {
        self.inner.session.set_keep_alive(enabled).await;
    }

    /// Sets the keep-alive interval.
    ///
    /// # Errors
    /// `Config` if the interval is at or below the 5000 ms floor; the
    /// previous interval is kept.
    pub async fn set_keep_alive_interval(
        &self,
        interval: Duration,
    ) -> Result<(), ClientError> {
        self.inner.session.set_keep_alive_interval(interval).await
    }

    /// The current keep-alive interval.
    pub async fn keep_alive_interval(&self) -> Duration {
        self.inner.session.keep_alive_interval().await
    }

    // -- latency ------------------------------------------------------------

    /// The most recent measured round-trip time to the master, if the
    /// prober has produced one.
    pub async fn average_latency(&self) -> Option<Duration> {
        self.inner.session.average_latency().await
    }

    /// The average latency rendered for display, e.g. `"31 ms"`.
    pub async fn formatted_average_latency(&self) -> String {
        latency::format_average(self.average_latency().await)
    }

    // -- login --------------------------------------------------------------

    /// The newest released client version, so an outdated client can
    /// prompt for an update before logging in.
    pub async fn check_client_version(&self) -> Result<String, ClientError> {
        let channel = self.inner.session.channel().await?;
        match channel.call(Call::CheckClientVersion).await {
            Ok(Reply::ClientVersion { version }) => Ok(version),
            Ok(other) => unexpected_reply("CheckClientVersion", other),
            Err(e) => Err(translate("CheckClientVersion", e)),
        }
    }

    /// Authenticates against the master server. On success the session
    /// token is stored, the keep-alive loop starts (if enabled), and
    /// the latency prober starts.
    ///
    /// # Errors
    /// `Precondition` when not connected or a login is already in
    /// flight; `Authentication` with the server's reason when the
    /// credentials are rejected; `ConnectionLost` when the transport
    /// fails mid-call (the session is left standing either way);
    /// `Unknown` otherwise.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        client_version: &str,
    ) -> Result<SessionHandle, ClientError> {
        let channel = self.inner.session.channel().await?;
        self.inner.session.begin_login().await?;
        let result = self
            .inner
            .login_call(
                channel,
                username.to_owned(),
                password.to_owned(),
                client_version.to_owned(),
            )
            .await;
        self.inner.session.end_login().await;
        result
    }

    /// Async twin of [`login`](Self::login). Dispatch errors (not
    /// connected, login already in flight) are returned immediately;
    /// the call outcome goes to `callback`.
    ///
    /// Login failures never tear the session down; the caller may
    /// retry with other credentials on the same connection.
    pub async fn login_async(
        &self,
        username: &str,
        password: &str,
        client_version: &str,
        callback: Callback<SessionHandle>,
    ) -> Result<(), ClientError> {
        let channel = self.inner.session.channel().await?;
        self.inner.session.begin_login().await?;
        let inner = Arc::clone(&self.inner);
        let (username, password, client_version) = (
            username.to_owned(),
            password.to_owned(),
            client_version.to_owned(),
        );
        tokio::spawn(async move {
            let result = inner
                .login_call(channel, username, password, client_version)
                .await;
            inner.session.end_login().await;
            callback(result);
        });
        Ok(())
    }

    // -- tank roster --------------------------------------------------------

    /// The account's tanks. Served from cache while fresh; fetched
    /// from the master when a mutation (or a reconnect) has marked the
    /// cache dirty.
    pub async fn tank_list(&self) -> Result<Vec<TankAttributes>, ClientError> {
        {
            let cache = self.inner.tanks.lock().await;
            if !cache.dirty {
                return Ok(cache.tanks.clone());
            }
        }
        let channel = self.inner.session.channel().await?;
        match channel.call(Call::TankList).await {
            Ok(Reply::Tanks { tanks }) => {
                let mut cache = self.inner.tanks.lock().await;
                cache.tanks = tanks.clone();
                cache.dirty = false;
                Ok(tanks)
            }
            Ok(other) => unexpected_reply("TankList", other),
            Err(e) => Err(translate("TankList", e)),
        }
    }

    /// Async twin of [`tank_list`](Self::tank_list), with a freshness
    /// fast path: when the cache is fresh this returns `Ok(true)`
    /// WITHOUT invoking the callback, and the caller should read
    /// [`tank_list`](Self::tank_list) for the cached value. When the
    /// cache is dirty it returns `Ok(false)` and the refreshed roster
    /// goes to `callback`.
    pub async fn tank_list_async(
        &self,
        callback: Callback<Vec<TankAttributes>>,
    ) -> Result<bool, ClientError> {
        if !self.inner.tanks.lock().await.dirty {
            return Ok(true);
        }
        let channel = self.inner.session.channel().await?;
        let inner = Arc::clone(&self.inner);
        self.inner.spawn_op("TankList", Arc::clone(&channel), callback, async move {
            match channel.call(Call::TankList).await {
                Ok(Reply::Tanks { tanks }) => {
                    let mut cache = inner.tanks.lock().await;
                    cache.tanks = tanks.clone();
                    cache.dirty = false;
                    Ok(tanks)
                }
                Ok(other) => unexpected_reply("TankList", other),
                Err(e) => Err(translate("TankList", e)),
            }
        });
        Ok(false)
    }

    /// Creates a tank. The tank is validated locally first; an invalid
    /// tank produces `Validation` without any remote call. Returns
    /// whether the server applied it; a successful creation marks the
    /// roster cache dirty.
    pub async fn create_tank(
        &self,
        tank: TankAttributes,
    ) -> Result<bool, ClientError> {
        validate::check_tank(&tank)?;
        let channel = self.inner.session.channel().await?;
        let result = match channel.call(Call::CreateTank { tank }).await {
            Ok(Reply::Accepted { ok }) => Ok(ok),
            Ok(other) => unexpected_reply("CreateTank", other),
            Err(e) => Err(translate("CreateTank", e)),
        };
        self.inner.mark_dirty_on_success(&result).await;
        result
    }

    /// Async twin of [`create_tank`](Self::create_tank). Validation
    /// failures are returned immediately and nothing is dispatched.
    /// Once dispatched the cache is marked dirty optimistically; the
    /// next roster read reconciles with the server either way.
    pub async fn create_tank_async(
        &self,
        tank: TankAttributes,
        callback: Callback<bool>,
    ) -> Result<(), ClientError> {
        validate::check_tank(&tank)?;
        let channel = self.inner.session.channel().await?;
        self.inner.mark_dirty().await;
        self.inner.spawn_op("CreateTank", Arc::clone(&channel), callback, async move {
            match channel.call(Call::CreateTank { tank }).await {
                Ok(Reply::Accepted { ok }) => Ok(ok),
                Ok(other) => unexpected_reply("CreateTank", other),
                Err(e) => Err(translate("CreateTank", e)),
            }
        });
        Ok(())
    }

    /// Replaces the named tank's attributes. Validated locally first,
    /// like [`create_tank`](Self::create_tank).
    pub async fn update_tank(
        &self,
        name: &str,
        tank: TankAttributes,
    ) -> Result<bool, ClientError> {
        validate::check_tank(&tank)?;
        let channel = self.inner.session.channel().await?;
        let call = Call::UpdateTank {
            name: name.to_owned(),
            tank,
        };
        let result = match channel.call(call).await {
            Ok(Reply::Accepted { ok }) => Ok(ok),
            Ok(other) => unexpected_reply("UpdateTank", other),
            Err(e) => Err(translate("UpdateTank", e)),
        };
        self.inner.mark_dirty_on_success(&result).await;
        result
    }

    /// Async twin of [`update_tank`](Self::update_tank).
    pub async fn update_tank_async(
        &self,
        name: &str,
        tank: TankAttributes,
        callback: Callback<bool>,
    ) -> Result<(), ClientError> {
        validate::check_tank(&tank)?;
        let channel = self.inner.session.channel().await?;
        self.inner.mark_dirty().await;
        let call = Call::UpdateTank {
            name: name.to_owned(),
            tank,
        };
        self.inner.spawn_op("UpdateTank", Arc::clone(&channel), callback, async move {
            match channel.call(call).await {
                Ok(Reply::Accepted { ok }) => Ok(ok),
                Ok(other) => unexpected_reply("UpdateTank", other),
                Err(e) => Err(translate("UpdateTank", e)),
            }
        });
        Ok(())
    }

    /// Deletes the named tank. The name must belong to a tank on the
    /// current roster; an unknown name produces `Validation` without
    /// any delete call (though checking may itself refresh the
    /// roster).
    pub async fn delete_tank(&self, name: &str) -> Result<bool, ClientError> {
        self.ensure_known_tank(name).await?;
        let channel = self.inner.session.channel().await?;
        let call = Call::DeleteTank {
            name: name.to_owned(),
        };
        let result = match channel.call(call).await {
            Ok(Reply::Accepted { ok }) => Ok(ok),
            Ok(other) => unexpected_reply("DeleteTank", other),
            Err(e) => Err(translate("DeleteTank", e)),
        };
        self.inner.mark_dirty_on_success(&result).await;
        result
    }

    /// Async twin of [`delete_tank`](Self::delete_tank).
    pub async fn delete_tank_async(
        &self,
        name: &str,
        callback: Callback<bool>,
    ) -> Result<(), ClientError> {
        self.ensure_known_tank(name).await?;
        let channel = self.inner.session.channel().await?;
        self.inner.mark_dirty().await;
        let call = Call::DeleteTank {
            name: name.to_owned(),
        };
        self.inner.spawn_op("DeleteTank", Arc::clone(&channel), callback, async move {
            match channel.call(call).await {
                Ok(Reply::Accepted { ok }) => Ok(ok),
                Ok(other) => unexpected_reply("DeleteTank", other),
                Err(e) => Err(translate("DeleteTank", e)),
            }
        });
        Ok(())
    }

    /// Tells the master which tank the account will field in its next
    /// match. The name must belong to a tank on the current roster; an
    /// unknown name produces `Validation` without any remote call.
    pub async fn select_tank(&self, name: &str) -> Result<bool, ClientError> {
        self.ensure_known_tank(name).await?;
        let channel = self.inner.session.channel().await?;
        let call = Call::SelectTank {
            name: name.to_owned(),
        };
        match channel.call(call).await {
            Ok(Reply::Accepted { ok }) => Ok(ok),
            Ok(other) => unexpected_reply("SelectTank", other),
            Err(e) => Err(translate("SelectTank", e)),
        }
    }

    /// Async twin of [`select_tank`](Self::select_tank).
    pub async fn select_tank_async(
        &self,
        name: &str,
        callback: Callback<bool>,
    ) -> Result<(), ClientError> {
        self.ensure_known_tank(name).await?;
        let channel = self.inner.session.channel().await?;
        let call = Call::SelectTank {
            name: name.to_owned(),
        };
        self.inner.spawn_op("SelectTank", Arc::clone(&channel), callback, async move {
            match channel.call(call).await {
                Ok(Reply::Accepted { ok }) => Ok(ok),
                Ok(other) => unexpected_reply("SelectTank", other),
                Err(e) => Err(translate("SelectTank", e)),
            }
        });
        Ok(())
    }

    async fn ensure_known_tank(&self, name: &str) -> Result<(), ClientError> {
        if name.is_empty() {
            return Err(ClientError::Validation(
                "the tank name must not be empty".into(),
            ));
        }
        let tanks = self.tank_list().await?;
        if !tanks.iter().any(|t| t.name == name) {
            return Err(ClientError::Validation(format!(
                "no tank named {name:?} exists"
            )));
        }
        Ok(())
    }

    // -- game servers -------------------------------------------------------

    /// The master's current list of game servers. Never cached; the
    /// player counts on it go stale in seconds anyway.
    pub async fn server_list(&self) -> Result<Vec<ServerInfo>, ClientError> {
        let channel = self.inner.session.channel().await?;
        match channel.call(Call::ServerList).await {
            Ok(Reply::Servers { servers }) => Ok(servers),
            Ok(other) => unexpected_reply("ServerList", other),
            Err(e) => Err(translate("ServerList", e)),
        }
    }

    /// Asks the master for permission to join `server`. Returns the
    /// one-time key to present to that game server.
    pub async fn request_join(
        &self,
        server: &ServerInfo,
    ) -> Result<String, ClientError> {
        let channel = self.inner.session.channel().await?;
        let call = Call::RequestJoin {
            server: server.clone(),
        };
        match channel.call(call).await {
            Ok(Reply::JoinKey { key }) => Ok(key),
            Ok(other) => unexpected_reply("RequestJoin", other),
            Err(e) => Err(translate("RequestJoin", e)),
        }
    }

    /// Opens a session against a game server, presenting a join key
    /// obtained from [`request_join`](Self::request_join). The master
    /// session must be up to open one, but once opened the game
    /// session lives on its own; tearing either side down leaves the
    /// other standing.
    ///
    /// # Errors
    /// `Precondition` when the master session is not connected.
    pub async fn open_game_session(
        &self,
        config: SessionConfig,
        key: &str,
    ) -> Result<GameClient<D>, ClientError> {
        if !self.connected() {
            return Err(ClientError::Precondition(
                "the master session must be connected to open a game session"
                    .into(),
            ));
        }
        let game = GameClient::with_connector(config, self.inner.dialer.clone());
        game.connect_and_join(key).await?;
        Ok(game)
    }

    /// Convenience: requests a join key for `server` and opens the
    /// game session in one step, copying this client's timeout and
    /// keep-alive settings.
    pub async fn join_game_server(
        &self,
        server: &ServerInfo,
    ) -> Result<GameClient<D>, ClientError> {
        let key = self.request_join(server).await?;
        let master_config = self.inner.session.core.lock().await.config.clone();
        let mut config = SessionConfig::new(server.host.clone(), server.port);
        config.use_gateway = server.use_gateway;
        config.secure = master_config.secure;
        config.timeout = master_config.timeout;
        config.keep_alive = master_config.keep_alive;
        config.set_keep_alive_interval(master_config.keep_alive_interval())?;
        self.open_game_session(config, &key).await
    }
}

impl<D: Connector + Clone> MasterInner<D> {
    /// Issues the login call and, on success, stores the token and
    /// starts the session's background tasks. Shared by the sync and
    /// async login paths.
    async fn login_call(
        self: &Arc<Self>,
        channel: Arc<RpcChannel<D::Connection>>,
        username: String,
        password: String,
        client_version: String,
    ) -> Result<SessionHandle, ClientError> {
        tracing::info!(username = %username, "logging in");
        let call = Call::Login {
            username,
            password,
            client_version,
        };
        match channel.call(call).await {
            Ok(Reply::LoggedIn { token }) => {
                self.finish_login(channel, token.clone()).await;
                tracing::info!("login accepted");
                Ok(SessionHandle(token))
            }
            Ok(other) => unexpected_reply("Login", other),
            Err(e) => Err(translate("Login", e)),
        }
    }

    /// Post-login side effects: remember the token, start the
    /// keep-alive loop and the latency prober. A login that resolves
    /// after the session was torn down or replaced does nothing.
    async fn finish_login(
        self: &Arc<Self>,
        channel: Arc<RpcChannel<D::Connection>>,
        token: String,
    ) {
        let (keep_alive, interval) = self.session.keep_alive_config().await;
        let mut core = self.session.core.lock().await;
        match &core.channel {
            Some(current) if Arc::ptr_eq(current, &channel) => {}
            _ => {
                tracing::debug!("login resolved for a dead session; ignoring");
                return;
            }
        }
        core.token = Some(token);
        if keep_alive && core.heartbeat.is_none() {
            let inner = Arc::clone(self);
            let failed_channel = Arc::clone(&channel);
            core.heartbeat = Some(heartbeat::spawn(
                Arc::clone(&channel),
                interval,
                move |reason| async move {
                    inner.session_lost(&failed_channel, "KeepAlive", &reason).await;
                },
            ));
        }
        if core.pinger.is_none() {
            core.pinger = Some(crate::latency::Pinger::start(channel));
        }
    }

    /// Runs one async operation to completion: awaits it, applies the
    /// common failure policy, then hands the outcome to the callback.
    fn spawn_op<T, Fut>(
        self: &Arc<Self>,
        op: &'static str,
        channel: Arc<RpcChannel<D::Connection>>,
        callback: Callback<T>,
        fut: Fut,
    ) where
        T: Send + 'static,
        Fut: std::future::Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let result = inner.intercept(op, &channel, fut.await).await;
            callback(result);
        });
    }

    /// The common failure policy: an operation that lost the transport
    /// takes the session down with it (if `channel` is still the live
    /// one) before its error propagates. Rejections pass through.
    async fn intercept<T>(
        self: &Arc<Self>,
        op: &'static str,
        channel: &Arc<RpcChannel<D::Connection>>,
        result: Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        if let Err(err) = &result {
            if err.is_session_fatal() {
                self.session_lost(channel, op, &err.to_string()).await;
            }
        }
        result
    }

    async fn session_lost(
        &self,
        channel: &Arc<RpcChannel<D::Connection>>,
        op: &str,
        reason: &str,
    ) {
        self.session.lost(channel, op, reason).await;
        self.reset_cache().await;
    }

    async fn reset_cache(&self) {
        let mut cache = self.tanks.lock().await;
        cache.tanks.clear();
        cache.dirty = true;
    }

    async fn mark_dirty(&self) {
        self.tanks.lock().await.dirty = true;
    }

    async fn mark_dirty_on_success(&self, result: &Result<bool, ClientError>) {
        if matches!(result, Ok(true)) {
            self.mark_dirty().await;
        }
    }
}
