//! # sso-server
//!
//! Hosts the SSO authority: loads configuration, initializes logging and the
//! authentication plugins, builds the sso module and runs the ticket registry
//! cleaner until the process is asked to stop.

mod config;
mod logging;
mod plugins;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use sso::module::SsoModule;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{LogFormat, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "sso-server")]
#[command(about = "Single sign-on authority", long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Emit JSON logs (overrides `logging.format`)
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::load(args.config.as_deref())?;
    if args.json_logs {
        config.logging.format = LogFormat::Json;
    }
    if args.print_config {
        print_config(&config);
        return Ok(());
    }

    logging::init(&config.logging)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "Starting sso-server"
    );

    let handlers = plugins::authentication_handlers(&config.plugins)?;
    let module = SsoModule::builder(config.sso)
        .handlers(handlers)
        .build()
        .context("failed to build sso module")?;

    let cancel = CancellationToken::new();
    let cleaner = module.spawn_cleaner(cancel.clone());
    info!("sso-server ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    cancel.cancel();
    if let Some(handle) = cleaner {
        handle.await.context("registry cleaner task failed")?;
    }

    let stats = module.client().statistics().await?;
    info!(
        sessions = stats.sessions,
        service_tickets = stats.service_tickets,
        "sso-server stopped"
    );
    Ok(())
}

#[allow(clippy::use_debug)] // secrets render redacted through their Debug impls
fn print_config(config: &ServerConfig) {
    println!("{config:#?}");
}
