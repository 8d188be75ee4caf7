//! Session configuration.

use std::time::Duration;

use garrison_transport::Target;

use crate::ClientError;

/// Keep-alive intervals at or below this value are rejected; polling the
/// server faster than this buys nothing and loads it for no reason.
pub const MIN_KEEP_ALIVE_INTERVAL: Duration = Duration::from_millis(5000);

/// Keep-alive interval used unless the caller picks another.
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_millis(15000);

/// Where and how one session connects.
///
/// The same shape configures both master and game-server sessions. The
/// keep-alive interval is validated through its setter and kept private
/// so an out-of-range value cannot be smuggled in.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Host name or IP of the server.
    pub host: String,
    /// Port of the server.
    pub port: u16,
    /// Whether to route calls through a secure gateway on the host.
    pub use_gateway: bool,
    /// Whether the transport itself is TLS-secured.
    pub secure: bool,
    /// Bound on the dial and on each individual remote call.
    pub timeout: Duration,
    /// Whether to run the keep-alive loop after login.
    pub keep_alive: bool,
    keep_alive_interval: Duration,
}

impl SessionConfig {
    /// Creates a config with the given endpoint and default options:
    /// no gateway, insecure transport, 10-second timeout, keep-alive on
    /// at [`DEFAULT_KEEP_ALIVE_INTERVAL`].
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            use_gateway: false,
            secure: false,
            timeout: Duration::from_secs(10),
            keep_alive: true,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
        }
    }

    /// Routes calls through the secure gateway on the host.
    pub fn with_gateway(mut self) -> Self {
        self.use_gateway = true;
        self
    }

    /// Uses a TLS-secured transport.
    pub fn with_secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Sets the dial/call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The current keep-alive interval.
    pub fn keep_alive_interval(&self) -> Duration {
        self.keep_alive_interval
    }

    /// Sets the keep-alive interval.
    ///
    /// # Errors
    /// Returns `ClientError::Config` if `interval` is at or below
    /// [`MIN_KEEP_ALIVE_INTERVAL`]; the previous value is kept.
    pub fn set_keep_alive_interval(
        &mut self,
        interval: Duration,
    ) -> Result<(), ClientError> {
        if interval <= MIN_KEEP_ALIVE_INTERVAL {
            return Err(ClientError::Config(format!(
                "the keep-alive interval must be greater than {} ms",
                MIN_KEEP_ALIVE_INTERVAL.as_millis()
            )));
        }
        self.keep_alive_interval = interval;
        Ok(())
    }

    /// The dial target this config describes.
    pub(crate) fn target(&self) -> Target {
        Target {
            host: self.host.clone(),
            port: self.port,
            secure: self.secure,
            timeout: self.timeout,
        }
    }
}
