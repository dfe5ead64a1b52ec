//! Appliance node entry point.
//!
//! Loads the TOML configuration, opens every serial link, and then drives
//! the cooperative scheduler from a single Tokio task.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()            -- TOML → NodeConfig (all defaults filled)
//!  └─ assemble()               -- open UARTs, register clients, build node
//!  └─ loop select! {
//!       sleep_until(next_deadline) → node.poll(now)
//!       stdin line                 → parse_command → node.dispatch
//!       state event                → log
//!       Ctrl-C                     → stop
//!     }
//! ```

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use appliance_node::application::entity::StatePublisher;
use appliance_node::infrastructure::assembly::{assemble, SerialPorts};
use appliance_node::infrastructure::console::parse_command;
use appliance_node::infrastructure::storage::{load_config, NodeConfig};

/// How long to sleep when no component is scheduled.
const IDLE_WAIT: Duration = Duration::from_secs(1);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Drives KDK ceiling fans/lights and MEL air conditioners over serial links.
#[derive(Debug, Parser)]
#[command(name = "appliance-node", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(
        long,
        short,
        default_value = "appliance-node.toml",
        env = "APPLIANCE_NODE_CONFIG"
    )]
    config: PathBuf,

    /// Validate the configuration, print a summary and exit without
    /// opening any serial port.
    #[arg(long)]
    check: bool,
}

fn print_summary(config: &NodeConfig) {
    println!(
        "configuration OK: {} KDK connection(s), {} entities",
        config.connections.len(),
        config.entity_count()
    );
    for kdk in &config.connections {
        println!("  kdk     {} on {}", kdk.id, kdk.port);
    }
    for fan in &config.fans {
        println!("  fan     {} via {}", fan.settings.id, fan.connection);
    }
    for light in &config.lights {
        println!(
            "  light   {} ({}) via {}",
            light.settings.id, light.settings.light_type, light.connection
        );
    }
    for climate in &config.climates {
        println!("  climate {} on {}", climate.settings.id, climate.port);
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    if cli.check {
        print_summary(&config);
        return Ok(());
    }

    info!("appliance node starting from {}", cli.config.display());

    let (publisher, mut events) = StatePublisher::channel();
    let mut node =
        assemble(&config, &mut SerialPorts, publisher).context("failed to build the node")?;

    let mismatched = node.start(Instant::now());
    if mismatched > 0 {
        warn!("{mismatched} component(s) have UART settings their device may not accept");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("appliance node ready.  Press Ctrl-C to exit.");

    // ── Main loop ─────────────────────────────────────────────────────────────
    loop {
        let deadline = node
            .next_deadline()
            .unwrap_or_else(|| Instant::now() + IDLE_WAIT);

        tokio::select! {
            _ = tokio::time::sleep_until(deadline.into()) => {
                node.poll(Instant::now());
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => {
                    match parse_command(&line, &node.entities()) {
                        Ok((entity, command)) => {
                            if let Err(e) = node.dispatch(&entity, &command, Instant::now()) {
                                warn!("{entity}: {e}");
                            }
                        }
                        Err(e) => warn!("ignored command: {e}"),
                    }
                }
                Ok(None) => {
                    info!("stdin closed; commands are no longer accepted");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("failed to read stdin: {e}");
                    stdin_open = false;
                }
            },
            Some(event) = events.recv() => {
                info!("{event}");
            }
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("failed to listen for Ctrl-C: {e}");
                }
                info!("shutdown signal received");
                break;
            }
        }
    }

    info!("appliance node stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
