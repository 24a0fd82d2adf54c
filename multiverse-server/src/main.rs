use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use multiverse_orchestrator::{spawn, OrchestratorMetrics};
use multiverse_server::{Api, AppState, ServerConfig, ServerMetrics};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind host (default: WS_HOST env, then 0.0.0.0).
    #[arg(long)]
    host: Option<IpAddr>,

    /// Bind port (default: WS_PORT env, then 8000).
    #[arg(long)]
    port: Option<u16>,

    /// Local tick period in ms (default: TICK_PERIOD_MS env, then 100).
    #[arg(long)]
    tick_period_ms: Option<u64>,

    /// Local ticks per control tick (default: CONTROL_TICK_DIVISOR env, then 10).
    #[arg(long)]
    control_tick_divisor: Option<u64>,

    /// Event log capacity (default: BUFFER_MAX env, then 5000).
    #[arg(long)]
    buffer_max: Option<usize>,

    /// Per-subscriber outbound queue cap (default: PER_SUBSCRIBER_QUEUE_MAX env, then 256).
    #[arg(long)]
    queue_max: Option<usize>,

    /// Inbound frame size cap in bytes (default: MAX_FRAME_BYTES env, then 65536).
    #[arg(long)]
    max_frame_bytes: Option<usize>,

    /// Maximum concurrent connections (default: MAX_CONNECTIONS env, then 10000).
    #[arg(long)]
    max_connections: Option<usize>,

    /// Graceful shutdown budget in ms (default: SHUTDOWN_GRACE_MS env, then 5000).
    #[arg(long)]
    shutdown_grace_ms: Option<u64>,
}

fn build_config(args: &Args) -> Result<ServerConfig, multiverse_server::ConfigError> {
    let mut config = ServerConfig::from_env()?;
    if let Some(host) = args.host {
        config.ws_host = host;
    }
    if let Some(port) = args.port {
        config.ws_port = port;
    }
    if let Some(v) = args.tick_period_ms {
        config.orchestrator.tick_period_ms = v;
    }
    if let Some(v) = args.control_tick_divisor {
        config.orchestrator.control_tick_divisor = v;
    }
    if let Some(v) = args.buffer_max {
        config.orchestrator.buffer_max = v;
    }
    if let Some(v) = args.queue_max {
        config.orchestrator.queue_max = v;
    }
    if let Some(v) = args.max_frame_bytes {
        config.max_frame_bytes = v;
    }
    if let Some(v) = args.max_connections {
        config.max_connections = v;
    }
    if let Some(v) = args.shutdown_grace_ms {
        config.orchestrator.shutdown_grace_ms = v;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(1);
        }
    };

    let orchestrator_metrics = Arc::new(OrchestratorMetrics::default());
    let handle = spawn(config.orchestrator.clone(), orchestrator_metrics.clone());
    let shutdown_grace = config.orchestrator.shutdown_grace();
    let server_metrics = Arc::new(ServerMetrics::default());
    let state = AppState::new(
        handle.clone(),
        server_metrics,
        orchestrator_metrics,
        Arc::new(config.clone()),
    );
    let app = Api::new(state).router();

    let addr = SocketAddr::new(config.ws_host, config.ws_port);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("failed to bind {addr}: {e}");
            return ExitCode::from(2);
        }
    };
    info!("listening on {}", addr);

    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(wait_for_shutdown_signal(handle, shutdown_grace))
    .await;

    match result {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            eprintln!("server error: {e}");
            ExitCode::from(3)
        }
    }
}

/// Waits for Ctrl-C (or, on Unix, SIGTERM) and then asks the tick task to
/// drain in-flight commands, emit a final `universe_state`, and close every
/// connection — §5's shutdown contract. Returning here lets axum stop
/// accepting new connections and wait for the ones the tick task just
/// closed to finish their handshake.
async fn wait_for_shutdown_signal(handle: multiverse_orchestrator::OrchestratorHandle, grace: std::time::Duration) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received, draining orchestrator");
    let _ = handle.shutdown(grace).await;
}
