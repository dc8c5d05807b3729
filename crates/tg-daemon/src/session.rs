//! Per-route gateway sessions

use tg_core::{Gateway, RouteConfig, Result};
use tracing::info;

/// A running gateway together with the route it protects
#[derive(Debug)]
pub struct RouteSession {
    /// Route name from the config
    name: String,

    /// Public hostname of the route
    hostname: String,

    /// Port of the protected local service
    target_port: u16,

    gateway: Gateway,
}

impl RouteSession {
    /// Build and start the gateway for a protected route.
    ///
    /// Returns `Ok(None)` for routes without `auth`.
    pub fn start(route: &RouteConfig) -> Result<Option<Self>> {
        let Some(config) = route.gateway_config()? else {
            return Ok(None);
        };

        let target_port = config.target_port;
        let mut gateway = Gateway::new(config)?;
        gateway.start()?;

        info!(
            route = %route.name,
            port = gateway.listen_port(),
            target = target_port,
            "Route protected"
        );

        Ok(Some(Self {
            name: route.name.clone(),
            hostname: route.hostname.clone(),
            target_port,
            gateway,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn target_port(&self) -> u16 {
        self.target_port
    }

    /// Port the tunnel should send this route's traffic to
    pub fn listen_port(&self) -> u16 {
        self.gateway.listen_port()
    }

    /// Service URL that replaces the route's own while the gateway runs
    pub fn ingress_service(&self) -> String {
        format!("http://localhost:{}", self.listen_port())
    }

    pub fn is_running(&self) -> bool {
        self.gateway.is_running()
    }

    /// Stop the gateway, waiting at most the standard drain timeout
    pub async fn stop(&mut self) -> Result<()> {
        info!(route = %self.name, "Stopping route gateway");
        self.gateway.stop().await
    }
}
