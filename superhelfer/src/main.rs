#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use std::io::IsTerminal;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use args::{Args, Command, DEFAULT_CONFIG};
use clap::Parser;
use superhelfer_calibration::{CalibrationCycle, CalibrationRunner};
use superhelfer_config::{Config, PolicyKind};
use superhelfer_routing::{QueryAnalyzer, Tier, decide};
use superhelfer_server::{AppState, RouteResponse, Server};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(&args.config)?;

    let _telemetry_guard = superhelfer_telemetry::init(&config.telemetry, &args.log_filter)?;

    match args.command {
        Command::Serve { listen } => serve(config, &args.config, listen).await,
        Command::Route { query } => route(&config, &query),
        Command::Ask { query, tier } => ask(config, &query, tier).await,
        Command::Calibrate { cycles } => calibrate(&config, cycles).await,
    }
}

/// Only the default path may be missing
fn load_config(path: &Path) -> anyhow::Result<Config> {
    if path == Path::new(DEFAULT_CONFIG) {
        Config::load_or_default(path)
    } else {
        Config::load(path)
    }
}

async fn serve(mut config: Config, config_path: &Path, listen: Option<SocketAddr>) -> anyhow::Result<()> {
    if listen.is_some() {
        config.server.listen_address = listen;
    }

    tracing::info!(
        config_path = %config_path.display(),
        backend = %config.backend.base_url,
        "starting superhelfer"
    );

    let server = Server::new(&config).await?;

    // Set up graceful shutdown
    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());

    let mut tasks = vec![
        server.state().lifecycle(&config).spawn(shutdown.clone()),
        Arc::clone(server.state().sessions()).spawn_sweeper(shutdown.clone()),
    ];

    if config.calibration.enabled {
        let runner = CalibrationRunner::new(
            QueryAnalyzer::new(&config.analyzer),
            config.tiers.clone(),
            config.calibration.clone(),
        )?;
        tasks.push(runner.spawn(shutdown.clone()));
    }

    let served = server.serve(shutdown.clone()).await;
    shutdown.cancel();

    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "background task ended abnormally");
        }
    }

    served?;
    tracing::info!("superhelfer stopped");
    Ok(())
}

fn route(config: &Config, query: &str) -> anyhow::Result<()> {
    let analysis = QueryAnalyzer::new(&config.analyzer).analyze(query);
    let decision = decide(&analysis, &config.tiers);

    println!("{}", serde_json::to_string_pretty(&RouteResponse { analysis, decision })?);
    Ok(())
}

async fn ask(mut config: Config, query: &str, tier: Option<Tier>) -> anyhow::Result<()> {
    if std::io::stdin().is_terminal() {
        config.monitor.policy = PolicyKind::Prompt;
    }

    let state = AppState::from_config(&config).await?;
    let router = state.router();

    let cancel = CancellationToken::new();
    cancel_on_signal(cancel.clone());

    let analysis = state.analyzer().analyze(query);
    let decision = match tier {
        Some(tier) => router.route_forced(tier, &analysis, &cancel).await?,
        None => router.route(&analysis, &cancel).await?,
    };

    let response = router.execute(decision, query, &cancel).await?;

    for failure in &response.failures {
        eprintln!("[fallback] {failure}");
    }
    eprintln!("[{} / {}]", response.decision.tier, response.decision.model);
    println!("{}", response.text);

    Ok(())
}

async fn calibrate(config: &Config, cycles: Option<usize>) -> anyhow::Result<()> {
    let mut runner = CalibrationRunner::new(
        QueryAnalyzer::new(&config.analyzer),
        config.tiers.clone(),
        config.calibration.clone(),
    )?;

    if let Some(cycles) = cycles {
        for _ in 0..cycles {
            print_cycle(&runner.run_cycle());
        }
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());
    runner.spawn(shutdown).await?;

    Ok(())
}

fn print_cycle(cycle: &CalibrationCycle) {
    let recall = cycle
        .heavy_recall
        .map_or_else(|| "n/a".to_owned(), |r| format!("{:.1}%", r * 100.0));

    println!(
        "cycle {}: accuracy {:.1}%, cost score {:.1}, heavy recall {recall}, +{} hard negatives ({} total)",
        cycle.cycle_id,
        cycle.accuracy * 100.0,
        cycle.cost_score,
        cycle.new_hard_negatives,
        cycle.hard_negative_total,
    );
}

fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        token.cancel();
    });
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
