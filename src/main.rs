use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use quota_gate::catalog::LimitCatalog;
use quota_gate::config::{Args, Configuration};
use quota_gate::dispatch::PriorityDispatcher;
use quota_gate::handlers::router;
use quota_gate::limiter::ReservationEngine;
use quota_gate::state::AppState;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Configuration::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!("error loading configuration: {err}");
            std::process::exit(1);
        }
    };

    let catalog = LimitCatalog::build(&config.rate_limits);
    info!(entries = catalog.len(), "limit catalog built");

    let dispatcher = PriorityDispatcher::new(
        args.dispatch_workers,
        args.background_workers,
        args.dispatch_queue,
    );

    // The engine is constructed here and handed to the transport layer
    // through shared state - no module-level limiter instance
    let engine = ReservationEngine::new(catalog, dispatcher);
    let state = Arc::new(AppState { engine });

    let app = router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

    info!("quota gate listening on http://localhost:{}", args.port);
    axum::serve(listener, app).await.unwrap();
}
