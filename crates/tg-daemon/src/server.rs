//! Gateway Supervisor
//!
//! Starts a gateway for every protected route, answers commands while the
//! tunnel runs, and stops everything on shutdown.

use futures::future::join_all;
use tg_core::{GateError, RouteConfig, TunnelConfig};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::session::RouteSession;

/// Events from the supervisor to the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// A route's gateway is accepting connections
    GatewayStarted {
        route: String,
        hostname: String,
        listen_port: u16,
        target_port: u16,
    },

    /// A route's gateway could not be started; other routes are unaffected
    GatewayFailed { route: String, message: String },

    /// A route's gateway stopped cleanly
    GatewayStopped { route: String },

    /// A gateway did not stop cleanly (drain timeout or server error)
    ShutdownWarning { route: String, message: String },

    /// Every gateway has been stopped
    Shutdown,
}

/// Commands to the supervisor
#[derive(Debug, Clone)]
pub enum SupervisorCommand {
    /// Stop the gateway of one route
    StopRoute { name: String },

    /// Stop everything and return from [`GatewaySupervisor::run`]
    Shutdown,
}

/// Owns one gateway per protected route
pub struct GatewaySupervisor {
    /// Route table as loaded; never rewritten
    config: TunnelConfig,

    /// Running gateways, in route order
    sessions: Vec<RouteSession>,

    /// Event sender
    event_tx: mpsc::Sender<SupervisorEvent>,

    /// Event receiver, until the UI takes it
    event_rx: Option<mpsc::Receiver<SupervisorEvent>>,

    /// Command sender
    command_tx: mpsc::Sender<SupervisorCommand>,

    /// Command receiver
    command_rx: mpsc::Receiver<SupervisorCommand>,

    /// Cancelled to end [`run`](Self::run)
    shutdown: CancellationToken,
}

impl GatewaySupervisor {
    /// Create a supervisor; nothing is bound until [`start`](Self::start)
    pub fn new(config: TunnelConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::channel(64);

        Self {
            config,
            sessions: Vec::new(),
            event_tx,
            event_rx: Some(event_rx),
            command_tx,
            command_rx,
            shutdown: CancellationToken::new(),
        }
    }

    /// Get the command sender
    pub fn command_sender(&self) -> mpsc::Sender<SupervisorCommand> {
        self.command_tx.clone()
    }

    /// Take the event receiver; `None` once it has been taken
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<SupervisorEvent>> {
        self.event_rx.take()
    }

    /// Token that ends [`run`](Self::run) when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn sessions(&self) -> &[RouteSession] {
        &self.sessions
    }

    pub fn session(&self, name: &str) -> Option<&RouteSession> {
        self.sessions.iter().find(|s| s.name() == name)
    }

    /// Start a gateway for every protected route that is not running yet.
    ///
    /// Returns how many gateways were started. A route that fails is
    /// reported as [`SupervisorEvent::GatewayFailed`] and skipped.
    pub async fn start(&mut self) -> usize {
        info!(routes = self.config.routes.len(), "Starting gateways");

        let mut started = 0;
        for route in self.config.protected_routes() {
            if self.sessions.iter().any(|s| s.name() == route.name) {
                continue;
            }

            match RouteSession::start(route) {
                Ok(Some(session)) => {
                    self.emit(SupervisorEvent::GatewayStarted {
                        route: session.name().to_string(),
                        hostname: session.hostname().to_string(),
                        listen_port: session.listen_port(),
                        target_port: session.target_port(),
                    });
                    self.sessions.push(session);
                    started += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    error!(route = %route.name, error = %e, "Failed to start gateway");
                    self.emit(SupervisorEvent::GatewayFailed {
                        route: route.name.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        started
    }

    /// Route table to publish through the tunnel.
    ///
    /// Protected routes point at their gateway instead of the service. A
    /// protected route without a running gateway is left out so its
    /// service is never exposed directly. The stored config is untouched.
    pub fn ingress(&self) -> Vec<RouteConfig> {
        self.config
            .routes
            .iter()
            .filter_map(|route| {
                if !route.is_protected() {
                    return Some(route.clone());
                }
                let session = self.session(&route.name).filter(|s| s.is_running())?;
                let mut route = route.clone();
                route.service = session.ingress_service();
                Some(route)
            })
            .collect()
    }

    /// Serve commands until the shutdown token is cancelled or a
    /// [`SupervisorCommand::Shutdown`] arrives, then stop every gateway.
    pub async fn run(&mut self) {
        let shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }

                Some(command) = self.command_rx.recv() => {
                    match command {
                        SupervisorCommand::StopRoute { name } => self.stop_route(&name).await,
                        SupervisorCommand::Shutdown => {
                            info!("Shutdown command received");
                            break;
                        }
                    }
                }
            }
        }

        self.shutdown().await;
    }

    async fn stop_route(&mut self, name: &str) {
        let Some(idx) = self.sessions.iter().position(|s| s.name() == name) else {
            warn!(route = %name, "No running gateway for route");
            return;
        };

        let mut session = self.sessions.remove(idx);
        let result = session.stop().await;
        self.report_stop(name, result);
    }

    /// Stop every gateway concurrently.
    ///
    /// Best effort: a gateway that misses its drain timeout is reported as
    /// [`SupervisorEvent::ShutdownWarning`] and the others still stop.
    pub async fn shutdown(&mut self) {
        let sessions = std::mem::take(&mut self.sessions);
        if !sessions.is_empty() {
            info!(count = sessions.len(), "Stopping gateways");
        }

        let results = join_all(sessions.into_iter().map(|mut session| async move {
            let result = session.stop().await;
            (session.name().to_string(), result)
        }))
        .await;

        for (name, result) in results {
            self.report_stop(&name, result);
        }

        self.emit(SupervisorEvent::Shutdown);
    }

    fn report_stop(&self, name: &str, result: Result<(), GateError>) {
        let event = match result {
            Ok(()) => SupervisorEvent::GatewayStopped {
                route: name.to_string(),
            },
            Err(e) => {
                warn!(route = %name, error = %e, "Gateway did not stop cleanly");
                SupervisorEvent::ShutdownWarning {
                    route: name.to_string(),
                    message: e.to_string(),
                }
            }
        };
        self.emit(event);
    }

    /// Queue an event for the UI without ever blocking the supervisor
    fn emit(&self, event: SupervisorEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            debug!(error = %e, "Dropped supervisor event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_core::AuthConfig;

    fn config(base: u16) -> TunnelConfig {
        let mut config = TunnelConfig::new();
        config.add_route(RouteConfig::new(
            "web",
            "web.example.com",
            "http://localhost:8080",
        ));
        config.add_route(
            RouteConfig::new("app", "app.example.com", format!("http://localhost:{}", base))
                .with_auth(AuthConfig::new("admin", "secret")),
        );
        config.add_route(
            RouteConfig::new(
                "api",
                "api.example.com",
                format!("http://localhost:{}", base + 200),
            )
            .with_auth(AuthConfig::new("admin", "secret")),
        );
        config
    }

    fn drain(rx: &mut mpsc::Receiver<SupervisorEvent>) -> Vec<SupervisorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_new_binds_nothing() {
        let supervisor = GatewaySupervisor::new(config(52_000));
        assert!(supervisor.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_events_reach_taken_receiver() {
        let mut supervisor = GatewaySupervisor::new(config(53_400));
        let mut events = supervisor.take_event_receiver().unwrap();
        assert!(supervisor.take_event_receiver().is_none());

        supervisor.start().await;
        assert!(matches!(
            events.try_recv(),
            Ok(SupervisorEvent::GatewayStarted { route, .. }) if route == "app"
        ));

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_unread_events_never_block() {
        let mut supervisor = GatewaySupervisor::new(config(53_800));
        // nobody takes the receiver; start and shutdown must still finish
        for _ in 0..300 {
            supervisor.emit(SupervisorEvent::Shutdown);
        }
        assert_eq!(supervisor.start().await, 2);
        supervisor.shutdown().await;
        assert!(supervisor.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_start_and_ingress() {
        let mut supervisor = GatewaySupervisor::new(config(52_000));
        let mut events = supervisor.take_event_receiver().unwrap();

        assert_eq!(supervisor.start().await, 2);
        // second start does not duplicate gateways
        assert_eq!(supervisor.start().await, 0);

        let started = drain(&mut events);
        assert_eq!(started.len(), 2);
        let SupervisorEvent::GatewayStarted {
            route,
            hostname,
            listen_port,
            target_port,
        } = &started[0]
        else {
            panic!("unexpected event {:?}", started[0]);
        };
        assert_eq!(route, "app");
        assert_eq!(hostname, "app.example.com");
        assert_eq!(*target_port, 52_000);
        assert!(*listen_port > 52_000);

        let ingress = supervisor.ingress();
        assert_eq!(ingress.len(), 3);
        assert_eq!(ingress[0].service, "http://localhost:8080");
        assert_eq!(
            ingress[1].service,
            format!("http://localhost:{}", listen_port)
        );
        // stored routes keep the real service
        assert_eq!(supervisor.config.routes[1].service, "http://localhost:52000");

        supervisor.shutdown().await;
        let stopped = drain(&mut events);
        assert_eq!(stopped.len(), 3);
        assert_eq!(stopped.last(), Some(&SupervisorEvent::Shutdown));
        assert!(supervisor.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_failed_route_does_not_block_others() {
        let mut config = config(52_400);
        config.route_mut("api").unwrap().service = "http://localhost".to_string();

        let mut supervisor = GatewaySupervisor::new(config);
        let mut events = supervisor.take_event_receiver().unwrap();
        assert_eq!(supervisor.start().await, 1);

        let events = drain(&mut events);
        assert!(matches!(
            &events[1],
            SupervisorEvent::GatewayFailed { route, .. } if route == "api"
        ));

        // the unprotected service is never published for a failed route
        let ingress = supervisor.ingress();
        assert_eq!(ingress.len(), 2);
        assert!(ingress.iter().all(|r| r.name != "api"));

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_stop_route_command() {
        let mut supervisor = GatewaySupervisor::new(config(52_800));
        let mut events = supervisor.take_event_receiver().unwrap();
        supervisor.start().await;
        drain(&mut events);

        let commands = supervisor.command_sender();
        commands
            .send(SupervisorCommand::StopRoute {
                name: "app".to_string(),
            })
            .await
            .unwrap();
        commands.send(SupervisorCommand::Shutdown).await.unwrap();
        supervisor.run().await;

        let events = drain(&mut events);
        assert_eq!(
            events,
            vec![
                SupervisorEvent::GatewayStopped {
                    route: "app".to_string()
                },
                SupervisorEvent::GatewayStopped {
                    route: "api".to_string()
                },
                SupervisorEvent::Shutdown,
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_token_ends_run() {
        let mut supervisor = GatewaySupervisor::new(config(53_200));
        supervisor.start().await;

        let token = supervisor.shutdown_token();
        token.cancel();
        supervisor.run().await;
        assert!(supervisor.sessions().is_empty());
    }
}
