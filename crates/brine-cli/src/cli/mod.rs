//! CLI argument parsing and node startup.

pub mod args;

use std::path::Path;

use anyhow::{Context, Result};
use args::Cli;
use brine_core::BrineError;
use brine_node::{
    GossipEvent, GossipNode, InterfaceCatalog, NodeConfig, SystemInterfaces, UdpTransport,
};
use clap::Parser;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Run the node until Ctrl-C.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = effective_config(&cli, &cli.config)?;

    if cli.print_config {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let interfaces = SystemInterfaces;
    let transport = UdpTransport::bind(&config.channels, &interfaces.list_interfaces())
        .map_err(startup_error)?;
    let mut node = GossipNode::new(config, transport, interfaces).map_err(startup_error)?;

    let observer = tokio::spawn(log_events(node.subscribe()));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, stopping");
                on_interrupt.cancel();
            }
            Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
        }
    });

    node.run(cancel).await;

    // Dropping the node closes the event channel and ends the observer.
    drop(node);
    observer.await.context("event observer panicked")?;
    Ok(())
}

/// Load the configuration file, apply command-line overrides, and validate.
fn effective_config(cli: &Cli, path: &Path) -> Result<NodeConfig> {
    let mut config = NodeConfig::load(path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    cli.apply(&mut config);
    config.validate().map_err(startup_error)?;
    Ok(config)
}

/// Attach an operator hint to the errors that stop a node from starting.
fn startup_error(err: BrineError) -> anyhow::Error {
    let hint = match &err {
        BrineError::NoListenPort { .. } => {
            "every configured port is in use; free one or extend channels.ports"
        }
        BrineError::Config(_) => "check the configuration file and command-line overrides",
        _ => return err.into(),
    };
    anyhow::Error::new(err).context(hint)
}

const fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn log_events(mut events: broadcast::Receiver<GossipEvent>) {
    loop {
        match events.recv().await {
            Ok(GossipEvent::PeerValue {
                value,
                from,
                from_local_host,
            }) => debug!(
                %from,
                source_id = value.source_id,
                value = value.value,
                from_local_host,
                "peer value"
            ),
            Ok(GossipEvent::Announced {
                value,
                destinations,
            }) => info!(estimate = value.value, destinations, "announced"),
            Err(RecvError::Lagged(missed)) => warn!(missed, "event observer fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}
