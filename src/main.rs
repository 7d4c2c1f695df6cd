use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

use rosterd::api;
use rosterd::config::EngineConfig;
use rosterd::engine::Engine;
use rosterd::notify::LogTransport;
use rosterd::registry::ShiftStore;
use rosterd::seed::SeedData;
use rosterd::shutdown::install_shutdown_handler;
use rosterd::solver::RoundRobinSolver;

#[derive(Parser, Debug)]
#[command(name = "rosterd")]
#[command(version)]
#[command(about = "Shift lifecycle and exchange coordination engine")]
struct Args {
    /// Address to serve the HTTP API on
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// JSON seed file with members and initial shifts
    #[arg(long)]
    seed: PathBuf,

    /// Seconds between solver status polls
    #[arg(long, default_value = "5")]
    solver_poll_secs: u64,

    /// Seconds to wait for a solver job before giving up
    #[arg(long, default_value = "900")]
    solver_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let seed = SeedData::load(&args.seed)?;
    let (directory, shifts) = seed.into_parts();
    tracing::info!(
        members = directory.len(),
        shifts = shifts.len(),
        "Seed data loaded"
    );
    let directory = Arc::new(directory);

    let config = EngineConfig::default()
        .with_poll_interval(Duration::from_secs(args.solver_poll_secs))
        .with_solver_max_duration(Duration::from_secs(args.solver_timeout_secs));

    // The demo solver reads the same shift store the engine coordinates.
    let shift_store = Arc::new(RwLock::new(ShiftStore::new()));
    let solver = Arc::new(RoundRobinSolver::new(
        directory.clone(),
        shift_store.clone(),
    ));

    let engine = Engine::with_shift_store(
        config,
        shift_store,
        directory,
        solver,
        Arc::new(LogTransport),
    );
    engine.seed_shifts(shifts).await;
    engine.start();

    let shutdown = install_shutdown_handler();
    let app = api::router(engine.clone());

    tracing::info!(addr = %args.listen, "Starting rosterd server");
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            let engine = engine.clone();
            async move {
                shutdown.cancelled().await;
                engine.shutdown();
            }
        })
        .await?;

    Ok(())
}
