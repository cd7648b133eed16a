use clap::Parser;
use cronward_core::config::CronwardConfig;
use cronward_core::types::ROOT_USER;
use cronward_sandbox::{identity::current_identity, Sandbox};
use cronward_scheduler::{JobControl, JobStore, SchedulerEngine};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

mod app;
mod auth;
mod http;
mod ws;

/// cronwardd: privileged job scheduler with a WebSocket control endpoint.
#[derive(Parser)]
#[command(name = "cronwardd", version, about)]
struct Cli {
    /// Config file (falls back to CRONWARD_CONFIG, then /etc/cronward/cronward.toml).
    #[arg(long)]
    config: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "cronwardd=debug,cronward_scheduler=debug,cronward_sandbox=debug,tower_http=debug"
    } else {
        "cronwardd=info,cronward_scheduler=info,cronward_sandbox=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    // load config: --config > CRONWARD_CONFIG env > /etc/cronward/cronward.toml
    let config_path = cli
        .config
        .or_else(|| std::env::var("CRONWARD_CONFIG").ok());
    let config = CronwardConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        CronwardConfig::default()
    });

    match current_identity() {
        Ok(me) if me.uid != 0 => {
            warn!(user = %me.user, "not running as root, jobs owned by other users will fail to start")
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "cannot resolve the daemon's own account"),
    }
    if config.daemon.test_mode {
        warn!("test mode enabled, plugins will not be executed");
    }

    // subsystems share one store and one sandbox
    let sandbox = Arc::new(Sandbox::from_config(&config.daemon));
    let store = Arc::new(JobStore::new());
    let control = JobControl::new(
        Arc::clone(&store),
        Arc::clone(&sandbox),
        config.daemon.job_dir.clone(),
    );
    let engine = SchedulerEngine::new(
        store,
        sandbox,
        Duration::from_millis(config.scheduler.tick_ms),
    );

    control.import_jobs();

    if config.scheduler.start_on_boot {
        engine.start(ROOT_USER)?;
    }

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let rpc_path = config.gateway.path.clone();

    let state = Arc::new(app::AppState::new(config, control, engine));
    let router = app::build_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("cronwardd listening on ws://{}{}", addr, rpc_path);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // stop scheduling; runs already dispatched are not waited for
    state.engine.shutdown().await;
    info!("cronwardd stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
