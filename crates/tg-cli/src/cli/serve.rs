//! Serve Command Implementation

use anyhow::{Context, Result};
use std::time::Duration;
use tg_core::{Gateway, GatewayConfig, SigningKey};
use tracing::{info, warn};

use super::ServeArgs;

/// Run a single gateway until Ctrl-C
pub async fn run(args: ServeArgs) -> Result<()> {
    let signing_key = match &args.signing_key {
        Some(hex) => SigningKey::from_hex(hex).context("Invalid --signing-key")?,
        None => {
            warn!("No signing key given; sessions will not survive a restart");
            SigningKey::generate()
        }
    };

    let mut config = GatewayConfig::new(args.username, args.password, args.target, signing_key);
    if let Some(secs) = args.cookie_ttl {
        config = config.with_cookie_ttl(Duration::from_secs(secs));
    }
    if let Some(port) = args.listen_start {
        config = config.with_listen_start(port);
    }

    let mut gateway = Gateway::new(config)?;
    gateway.start()?;

    println!(
        "Gateway: 127.0.0.1:{} → {}",
        gateway.listen_port(),
        gateway.upstream()
    );
    println!("Press Ctrl-C to stop\n");

    tokio::signal::ctrl_c().await?;
    info!("Stopping gateway");

    if let Err(e) = gateway.stop().await {
        if !e.is_non_fatal() {
            return Err(e.into());
        }
        warn!("{}", e);
    }
    Ok(())
}
