//! Payment saga entry point.

use app::{App, AppError, Config};
use tokio::signal;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env()?;
    app::telemetry::init_tracing(&config)?;

    // 2. Serve Prometheus metrics if requested
    if let Some(addr) = config.metrics_addr {
        app::telemetry::init_metrics(addr)?;
    }

    // 3. Start the participants
    let app = App::start(config);

    // 4. Request payments, then idle until asked to stop
    tokio::select! {
        requested = app.run_cadence() => {
            let responses = requested?;
            tracing::info!(requests = responses.len(), "all payments requested, waiting for shutdown signal");
            shutdown_signal().await;
        }
        () = shutdown_signal() => {}
    }

    // 5. Report and stop
    app.dump().await?;
    for (participant, stats) in app.shutdown().await? {
        tracing::info!(
            participant,
            handled = stats.handled,
            failures = stats.failures,
            skipped = stats.skipped,
            "consumer loop finished"
        );
    }

    tracing::info!("payment saga shut down gracefully");
    Ok(())
}
