//! Auth Command Implementation

use anyhow::{Context, Result};
use std::path::Path;
use tg_core::{AuthConfig, GateError, TunnelConfig};

use super::AuthSetArgs;

/// Protect a route with a login
pub fn set(config_path: &Path, args: AuthSetArgs) -> Result<()> {
    let mut config = TunnelConfig::load_or_default(config_path)?;
    let route = args.route.clone();
    let rotated = apply_auth(&mut config, args)?;

    config
        .save(config_path)
        .with_context(|| format!("Failed to save {}", config_path.display()))?;

    println!("Route {} now requires a login", route);
    if rotated {
        println!("New signing key generated; existing sessions are signed out");
    }
    Ok(())
}

/// Remove the login from a route
pub fn clear(config_path: &Path, route: &str) -> Result<()> {
    let mut config = TunnelConfig::load_or_default(config_path)?;
    let entry = config
        .route_mut(route)
        .ok_or_else(|| GateError::RouteNotFound(route.to_string()))?;

    if entry.auth.take().is_none() {
        println!("Route {} has no login", route);
        return Ok(());
    }

    config.save(config_path)?;
    println!("Login removed from route {}", route);
    Ok(())
}

/// Update `config` in place; returns whether a new signing key was generated.
///
/// An existing key is kept unless `rotate_key` is set, so sessions survive
/// a password change.
fn apply_auth(config: &mut TunnelConfig, args: AuthSetArgs) -> Result<bool> {
    let route = config
        .route_mut(&args.route)
        .ok_or_else(|| GateError::RouteNotFound(args.route.clone()))?;

    let mut auth = match route.auth.take() {
        Some(existing) => AuthConfig {
            username: args.username,
            password: args.password,
            ..existing
        },
        None => AuthConfig::new(args.username, args.password),
    };
    let rotated = args.rotate_key || auth.signing_key().is_err();
    if rotated {
        auth.rotate_key();
    }
    auth.cookie_ttl = args.cookie_ttl.or(auth.cookie_ttl);
    route.auth = Some(auth);

    // fail before saving anything the gateway would refuse
    if let Some(gateway) = route.gateway_config()? {
        gateway.validate()?;
    }
    Ok(rotated)
}
