//! Configuration management for Tunnelgate
//!
//! Handles loading and saving of the route table, including the per-route
//! credentials and signing keys that protected routes need across restarts.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::crypto::SigningKey;
use crate::error::{GateError, Result};
use crate::gateway::GatewayConfig;
use crate::token::DEFAULT_COOKIE_TTL;

/// Main configuration for Tunnelgate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Published routes, in ingress order
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// One hostname published through the tunnel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Short unique name
    pub name: String,

    /// Public hostname
    pub hostname: String,

    /// Local service URL, e.g. `http://localhost:3000`
    pub service: String,

    /// Present when the route sits behind a login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
}

/// Login settings for a protected route
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub username: String,

    pub password: String,

    /// Hex-encoded signing key; keep it stable so sessions survive restarts
    pub signing_key: String,

    /// Session lifetime in seconds (absent or 0 = 24h)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_ttl: Option<u64>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("cookie_ttl", &self.cookie_ttl)
            .finish_non_exhaustive()
    }
}

impl AuthConfig {
    /// New login settings with a freshly generated signing key
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            signing_key: SigningKey::generate().to_hex(),
            cookie_ttl: None,
        }
    }

    /// Configured session lifetime, falling back to 24h
    pub fn cookie_ttl_or_default(&self) -> Duration {
        match self.cookie_ttl {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => DEFAULT_COOKIE_TTL,
        }
    }

    pub fn signing_key(&self) -> Result<SigningKey> {
        SigningKey::from_hex(&self.signing_key)
    }

    /// Replace the signing key, invalidating every outstanding session
    pub fn rotate_key(&mut self) {
        self.signing_key = SigningKey::generate().to_hex();
    }
}

impl RouteConfig {
    pub fn new(
        name: impl Into<String>,
        hostname: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            hostname: hostname.into(),
            service: service.into(),
            auth: None,
        }
    }

    /// Builder pattern: protect this route
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn is_protected(&self) -> bool {
        self.auth.is_some()
    }

    /// Port of the local service
    pub fn target_port(&self) -> Result<u16> {
        extract_port(&self.service).ok_or_else(|| {
            GateError::InvalidConfig(format!(
                "route {}: cannot read a port from service {:?}",
                self.name, self.service
            ))
        })
    }

    /// Gateway settings for this route, or `None` if it is not protected
    pub fn gateway_config(&self) -> Result<Option<GatewayConfig>> {
        let Some(auth) = &self.auth else {
            return Ok(None);
        };

        let signing_key = auth.signing_key().map_err(|e| match e {
            GateError::InvalidSigningKey(reason) => {
                GateError::InvalidSigningKey(format!("route {}: {}", self.name, reason))
            }
            other => other,
        })?;

        let config = GatewayConfig::new(
            auth.username.clone(),
            auth.password.clone(),
            self.target_port()?,
            signing_key,
        )
        .with_cookie_ttl(auth.cookie_ttl_or_default());

        Ok(Some(config))
    }
}

/// Port number after the last `:` of a service URL.
///
/// `http://localhost:3000` gives `3000`; a trailing path is ignored.
pub fn extract_port(service: &str) -> Option<u16> {
    let (_, tail) = service.rsplit_once(':')?;
    let digits = tail.split('/').next()?;
    digits.parse().ok().filter(|port| *port != 0)
}

impl TunnelConfig {
    /// Creates a new configuration with no routes
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Loads configuration, treating a missing file as empty
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Saves configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;

        // Passwords and signing keys live here
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Returns the default configuration directory
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tunnelgate")
    }

    /// Returns the default configuration file path
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    pub fn route(&self, name: &str) -> Option<&RouteConfig> {
        self.routes.iter().find(|r| r.name == name)
    }

    pub fn route_mut(&mut self, name: &str) -> Option<&mut RouteConfig> {
        self.routes.iter_mut().find(|r| r.name == name)
    }

    /// Add a route, replacing any route with the same name
    pub fn add_route(&mut self, route: RouteConfig) {
        match self.route_mut(&route.name) {
            Some(existing) => *existing = route,
            None => self.routes.push(route),
        }
    }

    /// Remove a route by name
    pub fn remove_route(&mut self, name: &str) -> Result<RouteConfig> {
        let idx = self
            .routes
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| GateError::RouteNotFound(name.to_string()))?;
        Ok(self.routes.remove(idx))
    }

    /// Routes that need a gateway
    pub fn protected_routes(&self) -> impl Iterator<Item = &RouteConfig> {
        self.routes.iter().filter(|r| r.is_protected())
    }
}
