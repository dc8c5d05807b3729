//! Tunnelgate CLI
//!
//! Command-line interface for publishing local services behind a login.

mod cli;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cli::{AuthAction, Cli, Commands, RouteAction};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let config_path = cli.config_path();

    // Execute command
    match cli.command {
        Commands::Up => {
            cli::up::run(&config_path).await?;
        }
        Commands::Serve(args) => {
            cli::serve::run(args).await?;
        }
        Commands::List { json } => {
            cli::list::run(&config_path, json)?;
        }
        Commands::Route { action } => match action {
            RouteAction::Add {
                name,
                hostname,
                service,
            } => cli::route::add(&config_path, name, hostname, service)?,
            RouteAction::Remove { name } => cli::route::remove(&config_path, &name)?,
        },
        Commands::Auth { action } => match action {
            AuthAction::Set(args) => cli::auth::set(&config_path, args)?,
            AuthAction::Clear { route } => cli::auth::clear(&config_path, &route)?,
        },
        Commands::Keygen => {
            cli::keygen::run();
        }
    }

    Ok(())
}
