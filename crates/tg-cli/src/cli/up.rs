//! Up Command Implementation

use anyhow::{Context, Result, bail};
use std::path::Path;
use tg_core::TunnelConfig;
use tg_core::brand::PRODUCT_NAME;
use tg_daemon::{GatewaySupervisor, SupervisorEvent};
use tracing::{info, warn};

/// Run the up command
pub async fn run(config_path: &Path) -> Result<()> {
    let config = TunnelConfig::load(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let protected = config.protected_routes().count();
    if protected == 0 {
        println!("No protected routes in {}", config_path.display());
        return Ok(());
    }

    let mut supervisor = GatewaySupervisor::new(config);
    let mut events = supervisor
        .take_event_receiver()
        .context("Supervisor events already taken")?;

    let started = supervisor.start().await;
    while let Ok(event) = events.try_recv() {
        report(&event);
    }
    if started == 0 {
        bail!("No gateway could be started");
    }

    println!("\nIngress:");
    for route in supervisor.ingress() {
        println!("  {} → {}", route.hostname, route.service);
    }
    println!("\n{} is up. Press Ctrl-C to stop\n", PRODUCT_NAME);

    let token = supervisor.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            report(&event);
        }
    });

    supervisor.run().await;
    drop(supervisor);
    let _ = printer.await;

    info!("All gateways stopped");
    Ok(())
}

fn report(event: &SupervisorEvent) {
    match event {
        SupervisorEvent::GatewayStarted {
            hostname,
            listen_port,
            target_port,
            ..
        } => {
            println!(
                "Gateway started: {} → 127.0.0.1:{} → 127.0.0.1:{}",
                hostname, listen_port, target_port
            );
        }
        SupervisorEvent::GatewayFailed { route, message } => {
            eprintln!("Route {} is not published: {}", route, message);
        }
        SupervisorEvent::GatewayStopped { route } => {
            info!(route = %route, "Gateway stopped");
        }
        SupervisorEvent::ShutdownWarning { route, message } => {
            warn!(route = %route, "{}", message);
        }
        SupervisorEvent::Shutdown => {}
    }
}
