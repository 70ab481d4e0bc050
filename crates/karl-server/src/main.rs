mod api;
mod middleware;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

/// Thin HTTP gateway in front of `karl-facade`. Deliberately kept minimal
/// per spec.md §1 ("explicitly OUT of scope: the HTTP/FastCGI gateway");
/// it exists only so the façade operations in SPEC_FULL.md §6 are reachable
/// over the network, not to accumulate routing/MIME-negotiation richness.
#[derive(Debug, Parser)]
#[command(name = "karl-server")]
struct Args {
    #[arg(short = 'C', long = "config", default_value = "./config.yaml")]
    config: String,

    #[arg(short = 'n', long = "no-perms")]
    no_perms: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = karl_core::load_app_config(std::path::Path::new(&args.config))?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if args.no_perms {
        tracing::warn!("--no-perms is set: password checking and session validation are DISABLED");
    }

    let pool = karl_db::connect_pool_from_app_config(&config).await?;
    karl_db::run_migrations(&pool).await?;

    let karl = karl_facade::Karl::new(
        pool,
        config.imagecitations_path.clone(),
        karl_facade::SessionPolicy::from_app_config(&config),
        !args.no_perms,
    );

    let bind_addr = config.bind_addr;
    let app = build_app(AppState { karl: Arc::new(karl) });

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(%bind_addr, "karl-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
