use std::sync::Arc;

use console_core::config::{ConsoleConfig, load_dotenv};
use console_core::scheduler::PollScheduler;
use console_core::session::SessionTracker;
use console_core::sync::LogSyncEngine;
use console_core::transport::BackendClient;
use tokio::signal;
use tracing::{error, info, warn};

mod printer;

use printer::{StatusLogger, TerminalSink};

#[tokio::main]
async fn main() {
    if let Err(err) = load_dotenv() {
        eprintln!("{err}");
        std::process::exit(1);
    }

    let config = match ConsoleConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load console config: {err}");
            std::process::exit(1);
        }
    };

    init_tracing(config.log_json);

    let client = match BackendClient::from_config(&config.client) {
        Ok(client) => client,
        Err(err) => {
            error!(error = %err, "failed to initialize backend client");
            std::process::exit(1);
        }
    };

    match client.health().await {
        Ok(true) => info!(base_url = %client.base_url(), "backend is reachable"),
        Ok(false) => warn!(base_url = %client.base_url(), "backend health check did not answer OK"),
        Err(err) => warn!(error = %err, "backend unreachable; polling anyway"),
    }

    let session = SessionTracker::new(config.client.initial_context.clone());
    let engine = LogSyncEngine::new(
        client,
        session,
        Arc::new(TerminalSink::default()),
        Arc::new(StatusLogger::default()),
    );
    let mut scheduler = PollScheduler::from_config(&config.poller);

    info!(
        fast_ms = config.poller.fast_interval_ms,
        slow_ms = config.poller.slow_interval_ms,
        burst_budget = config.poller.burst_budget,
        "poller starting"
    );

    let stats = scheduler
        .run(&engine, async {
            if let Err(err) = signal::ctrl_c().await {
                error!(error = %err, "failed to listen for shutdown signal");
            }
        })
        .await;

    info!(
        polls = stats.polls,
        updates = stats.updates,
        failures = stats.failures,
        "shutdown signal received"
    );
}

fn init_tracing(json: bool) {
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "agent_console_poller=info,console_core=info".to_string());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .init();
    } else {
        builder.init();
    }
}
