//! Authenticating reverse-proxy gateway
//!
//! One [`Gateway`] protects one local service: it owns a loopback listener,
//! serves a login page until the caller presents a valid session cookie, and
//! then proxies traffic to the service unchanged.

pub mod forward;
pub mod router;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::crypto::SigningKey;
use crate::error::{GateError, Result};
use crate::port;
use crate::token::{DEFAULT_COOKIE_TTL, TokenCodec};

pub use forward::Upstream;
pub use router::{Credentials, Dispatch, GatewayState, build_router, classify, is_websocket};

/// How long [`Gateway::stop`] waits for in-flight requests
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// Immutable settings for one gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Shared username for this route
    pub username: String,

    /// Shared password for this route
    pub password: String,

    /// Port of the protected service on 127.0.0.1
    pub target_port: u16,

    /// Key used to sign and verify session cookies
    pub signing_key: SigningKey,

    /// How long a login stays valid
    pub cookie_ttl: Duration,

    /// First port tried for the gateway listener (defaults to `target_port + 1`)
    pub listen_start: Option<u16>,
}

impl GatewayConfig {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        target_port: u16,
        signing_key: SigningKey,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            target_port,
            signing_key,
            cookie_ttl: DEFAULT_COOKIE_TTL,
            listen_start: None,
        }
    }

    /// Builder pattern: set cookie TTL (zero keeps the 24h default)
    pub fn with_cookie_ttl(mut self, ttl: Duration) -> Self {
        self.cookie_ttl = if ttl.is_zero() { DEFAULT_COOKIE_TTL } else { ttl };
        self
    }

    /// Builder pattern: set the first port probed for the listener
    pub fn with_listen_start(mut self, port: u16) -> Self {
        self.listen_start = Some(port);
        self
    }

    pub fn listen_start(&self) -> u16 {
        self.listen_start
            .unwrap_or_else(|| self.target_port.saturating_add(1))
    }

    /// Reject settings the gateway cannot honour.
    ///
    /// The username ends up verbatim in the cookie value, so it must not
    /// contain `:` or characters a cookie cannot carry.
    pub fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(GateError::InvalidConfig("username is empty".to_string()));
        }
        if let Some(c) = self
            .username
            .chars()
            .find(|c| !c.is_ascii_graphic() || matches!(c, ':' | ';' | ',' | '"' | '\\'))
        {
            return Err(GateError::InvalidConfig(format!(
                "username contains unsupported character {:?}",
                c
            )));
        }
        if self.target_port == 0 {
            return Err(GateError::InvalidConfig("target port is 0".to_string()));
        }
        if self.signing_key.is_empty() {
            return Err(GateError::InvalidSigningKey("key is empty".to_string()));
        }
        Ok(())
    }
}

/// A running (or ready to run) authenticating proxy for one route
pub struct Gateway {
    state: Arc<GatewayState>,
    local_addr: SocketAddr,
    listener: Option<std::net::TcpListener>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<std::io::Result<()>>>,
}

impl Gateway {
    /// Validate `config` and bind a listener.
    ///
    /// The listener is bound here, so the port is reserved (and reported by
    /// [`listen_port`](Self::listen_port)) before [`start`](Self::start).
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config.validate()?;

        let codec = TokenCodec::new(&config.signing_key, config.cookie_ttl)?;
        let listener = port::acquire(config.listen_start())?;
        let local_addr = listener.local_addr()?;

        let state = Arc::new(GatewayState {
            credentials: Credentials {
                username: config.username,
                password: config.password,
            },
            codec,
            upstream: Upstream::new(config.target_port),
        });

        Ok(Self {
            state,
            local_addr,
            listener: Some(listener),
            shutdown_tx: None,
            server: None,
        })
    }

    /// Port the gateway listens on
    pub fn listen_port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `host:port` of the protected service
    pub fn upstream(&self) -> &str {
        self.state.upstream.authority()
    }

    pub fn is_running(&self) -> bool {
        self.server.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start serving in the background and return immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        let listener = self.listener.take().ok_or(GateError::AlreadyStarted)?;
        listener.set_nonblocking(true)?;
        let listener = tokio::net::TcpListener::from_std(listener)?;

        let app = build_router(Arc::clone(&self.state))
            .into_make_service_with_connect_info::<SocketAddr>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let addr = self.local_addr;
        let upstream = self.state.upstream.authority().to_string();

        let server = tokio::spawn(async move {
            // Dropping the sender also triggers shutdown.
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(ref e) = result {
                error!(%addr, error = %e, "Gateway server failed");
            }
            result
        });

        info!(%addr, %upstream, "Gateway listening");
        self.shutdown_tx = Some(shutdown_tx);
        self.server = Some(server);
        Ok(())
    }

    /// Stop accepting connections and wait up to [`SHUTDOWN_TIMEOUT`] for
    /// in-flight requests. Requests still running after that are abandoned.
    pub async fn stop(&mut self) -> Result<()> {
        self.stop_within(SHUTDOWN_TIMEOUT).await
    }

    /// [`stop`](Self::stop) with an explicit drain timeout
    pub async fn stop_within(&mut self, timeout: Duration) -> Result<()> {
        // Never started: just release the socket.
        self.listener = None;

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let Some(mut server) = self.server.take() else {
            return Ok(());
        };

        match tokio::time::timeout(timeout, &mut server).await {
            Ok(Ok(result)) => {
                info!(addr = %self.local_addr, "Gateway stopped");
                result.map_err(GateError::from)
            }
            Ok(Err(join_err)) => Err(GateError::Io(std::io::Error::other(join_err))),
            Err(_) => {
                warn!(addr = %self.local_addr, ?timeout, "Gateway shutdown timed out");
                server.abort();
                Err(GateError::ShutdownTimeout(timeout))
            }
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("local_addr", &self.local_addr)
            .field("upstream", &self.state.upstream.authority())
            .field("running", &self.is_running())
            .finish()
    }
}
