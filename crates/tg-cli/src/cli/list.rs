//! List Command Implementation

use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tg_core::{RouteConfig, TunnelConfig};

/// What `list` shows for a route; never includes credentials
#[derive(Debug, Serialize)]
struct RouteSummary<'a> {
    name: &'a str,
    hostname: &'a str,
    service: &'a str,
    protected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cookie_ttl: Option<u64>,
}

impl<'a> From<&'a RouteConfig> for RouteSummary<'a> {
    fn from(route: &'a RouteConfig) -> Self {
        Self {
            name: &route.name,
            hostname: &route.hostname,
            service: &route.service,
            protected: route.is_protected(),
            username: route.auth.as_ref().map(|a| a.username.as_str()),
            cookie_ttl: route
                .auth
                .as_ref()
                .map(|a| a.cookie_ttl_or_default().as_secs()),
        }
    }
}

/// Run the list command
pub fn run(config_path: &Path, json: bool) -> Result<()> {
    let config = TunnelConfig::load_or_default(config_path)?;
    let summaries: Vec<RouteSummary> = config.routes.iter().map(RouteSummary::from).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No routes configured");
        return Ok(());
    }

    println!("{:<16} {:<32} {:<28} AUTH", "NAME", "HOSTNAME", "SERVICE");
    for s in &summaries {
        let auth = match s.username {
            Some(user) => format!("login ({})", user),
            None => "-".to_string(),
        };
        println!("{:<16} {:<32} {:<28} {}", s.name, s.hostname, s.service, auth);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_core::AuthConfig;

    #[test]
    fn test_summary_hides_secrets() {
        let route = RouteConfig::new("app", "app.example.com", "http://localhost:3000")
            .with_auth(AuthConfig::new("admin", "hunter2"));
        let key = route.auth.as_ref().unwrap().signing_key.clone();

        let json = serde_json::to_string(&RouteSummary::from(&route)).unwrap();
        assert!(json.contains("\"protected\":true"));
        assert!(json.contains("\"cookie_ttl\":86400"));
        assert!(!json.contains("hunter2"));
        assert!(!json.contains(&key));
    }

    #[test]
    fn test_unprotected_summary() {
        let route = RouteConfig::new("web", "web.example.com", "http://localhost:8080");
        let json = serde_json::to_string(&RouteSummary::from(&route)).unwrap();
        assert!(json.contains("\"protected\":false"));
        assert!(!json.contains("username"));
    }
}
