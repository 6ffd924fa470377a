// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run control plane agent (rp-agent)
//!
//! Registers with a daemon using a pool token and executes the phases it is
//! allocated through a configured program.

use rp_agent::env::AgentEnv;
use rp_agent::{AgentDaemon, CommandExecutor, RemoteClient};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("rp-agent {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("rp-agent {}", env!("CARGO_PKG_VERSION"));
                println!("Executes run phases allocated by the run control plane daemon");
                println!();
                println!("USAGE:");
                println!("    RP_AGENT_TOKEN=... RP_EXECUTOR=/path/to/program rp-agent");
                println!();
                println!("The executor is invoked as `<program> <phase>` in a per-job directory.");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: rp-agent [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    setup_logging();
    let env = AgentEnv::load()?;

    let client = RemoteClient::new(env.address.clone(), env.token.clone(), env.ipc_timeout);
    let executor = CommandExecutor::new(&env.executor, &env.work_dir);
    let cancel = CancellationToken::new();

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
            _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
        }
        on_signal.cancel();
    });

    info!(address = %env.address, name = %env.config.name, max_jobs = env.config.max_jobs, "starting agent");
    let agent_id = AgentDaemon::new(client, executor, env.config).run(cancel).await?;
    info!(agent_id = %agent_id, "agent stopped");
    Ok(())
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
