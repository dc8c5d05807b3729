//! Route Command Implementation

use anyhow::{Context, Result};
use std::path::Path;
use tg_core::config::extract_port;
use tg_core::{RouteConfig, TunnelConfig};
use tracing::warn;

/// Add (or replace) a route
pub fn add(config_path: &Path, name: String, hostname: String, service: String) -> Result<()> {
    let mut config = TunnelConfig::load_or_default(config_path)?;

    if extract_port(&service).is_none() {
        warn!(%service, "Service has no port; it cannot be protected with a login");
    }

    // keep the login of a route that is being re-pointed
    let auth = config.route(&name).and_then(|r| r.auth.clone());
    let mut route = RouteConfig::new(name.clone(), hostname, service);
    route.auth = auth;
    config.add_route(route);

    config
        .save(config_path)
        .with_context(|| format!("Failed to save {}", config_path.display()))?;
    println!("Route {} saved", name);
    Ok(())
}

/// Remove a route
pub fn remove(config_path: &Path, name: &str) -> Result<()> {
    let mut config = TunnelConfig::load_or_default(config_path)?;
    config.remove_route(name)?;
    config.save(config_path)?;
    println!("Route {} removed", name);
    Ok(())
}
