//! CLI Command Definitions
//!
//! Defines the command-line interface using clap.

pub mod auth;
pub mod keygen;
pub mod list;
pub mod route;
pub mod serve;
pub mod up;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tg_core::TunnelConfig;
use tg_core::brand::{BIN_NAME, DESCRIPTION};

/// Tunnelgate - login gateway for tunneled local services
///
/// Puts a username/password page in front of local services before they
/// are published through a tunnel.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME)]
#[command(author, version, about = DESCRIPTION, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (defaults to <config dir>/tunnelgate/config.toml)
    #[arg(long, global = true, env = "TUNNELGATE_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(TunnelConfig::default_config_path)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a gateway for every protected route
    ///
    /// Runs until Ctrl-C, then stops every gateway.
    Up,

    /// Run a single gateway in the foreground
    Serve(ServeArgs),

    /// List configured routes
    #[command(visible_alias = "ls")]
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Add or remove routes
    Route {
        #[command(subcommand)]
        action: RouteAction,
    },

    /// Protect routes with a login, or remove protection
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Print a fresh signing key
    Keygen,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port of the local service to protect
    #[arg(long, value_name = "PORT")]
    pub target: u16,

    #[arg(long)]
    pub username: String,

    #[arg(long)]
    pub password: String,

    /// Hex signing key; a random one is used if omitted
    #[arg(long, value_name = "HEX")]
    pub signing_key: Option<String>,

    /// Session lifetime in seconds (default 24h)
    #[arg(long, value_name = "SECS")]
    pub cookie_ttl: Option<u64>,

    /// First port to try for the gateway (default target + 1)
    #[arg(long, value_name = "PORT")]
    pub listen_start: Option<u16>,
}

#[derive(Subcommand, Debug)]
pub enum RouteAction {
    /// Add a route, replacing one with the same name
    Add {
        name: String,
        hostname: String,
        /// Local service URL, e.g. http://localhost:3000
        service: String,
    },

    /// Remove a route
    #[command(visible_alias = "rm")]
    Remove { name: String },
}

#[derive(Subcommand, Debug)]
pub enum AuthAction {
    /// Require a login for a route
    Set(AuthSetArgs),

    /// Remove the login from a route
    Clear { route: String },
}

#[derive(Args, Debug)]
pub struct AuthSetArgs {
    /// Route name
    pub route: String,

    #[arg(long)]
    pub username: String,

    #[arg(long)]
    pub password: String,

    /// Session lifetime in seconds (default 24h)
    #[arg(long, value_name = "SECS")]
    pub cookie_ttl: Option<u64>,

    /// Generate a new signing key, signing out every session
    #[arg(long)]
    pub rotate_key: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from([
            "tunnelgate",
            "serve",
            "--target",
            "3000",
            "--username",
            "admin",
            "--password",
            "secret",
            "--cookie-ttl",
            "60",
        ])
        .unwrap();

        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.target, 3000);
        assert_eq!(args.cookie_ttl, Some(60));
        assert!(args.signing_key.is_none());
    }

    #[test]
    fn test_parse_auth_set() {
        let cli = Cli::try_parse_from([
            "tunnelgate",
            "--config",
            "/tmp/tg.toml",
            "auth",
            "set",
            "app",
            "--username",
            "admin",
            "--password",
            "secret",
            "--rotate-key",
        ])
        .unwrap();

        assert_eq!(cli.config_path(), PathBuf::from("/tmp/tg.toml"));
        let Commands::Auth {
            action: AuthAction::Set(args),
        } = cli.command
        else {
            panic!("expected auth set");
        };
        assert_eq!(args.route, "app");
        assert!(args.rotate_key);
    }

    #[test]
    fn test_serve_requires_credentials() {
        assert!(Cli::try_parse_from(["tunnelgate", "serve", "--target", "3000"]).is_err());
    }
}
