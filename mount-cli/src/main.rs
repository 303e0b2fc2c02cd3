//! Mountlink Discovery Console
//!
//! Headless console that runs periodic device discovery and prints mount
//! interfaces as they appear and disappear. Useful for checking cabling and
//! WiFi adapters without starting the full telescope application.
//!
//! Set `RUST_LOG` to raise verbosity, e.g. `RUST_LOG=mount_discover=debug`.

use std::sync::Arc;

use anyhow::Result;
use mount_discover::{
    run_discovery_loop, DiscoveryConfig, DiscoveryEvent, DiscoveryLoopCommand, DiscoveryService,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "mount_cli=info,mount_discover=info,mount_transport=info".into()
        }))
        .init();

    tracing::info!("Starting mountlink discovery console");

    let service = Arc::new(DiscoveryService::new(DiscoveryConfig::default()));
    let mut events = service.subscribe();

    let (command_tx, command_rx) = mpsc::channel(8);
    let loop_task = tokio::spawn(run_discovery_loop(Arc::clone(&service), command_rx));

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(DiscoveryEvent::DevicesDiscovered { devices }) => {
                    for device in devices {
                        println!("found  {device}");
                    }
                }
                Ok(DiscoveryEvent::DevicesRemoved { devices }) => {
                    for device in devices {
                        println!("lost   {device}");
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Event stream lagged, missed {missed} event(s)");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    command_tx.send(DiscoveryLoopCommand::Shutdown).await?;
    loop_task.await?;
    service.dispose();
    Ok(())
}
