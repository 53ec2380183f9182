use std::sync::Arc;
use std::time::Duration;

use tonic::transport::Server as TonicServer;
use tracing_subscriber::EnvFilter;

use coordinate_dispatch::api;
use coordinate_dispatch::api::grpc::GrpcDispatchService;
use coordinate_dispatch::api::grpc::pb::coordinate_dispatch_server::CoordinateDispatchServer;
use coordinate_dispatch::config::{self, LogFormat};
use coordinate_dispatch::engine::coordinator::{CoordinatorOptions, DispatchCoordinator};
use coordinate_dispatch::engine::notifier::Notifier;
use coordinate_dispatch::engine::transport::HttpTransport;
use coordinate_dispatch::error;
use coordinate_dispatch::geo::geocode::NominatimGeocoder;
use coordinate_dispatch::observability::metrics::Metrics;
use coordinate_dispatch::settings::SettingsStore;
use coordinate_dispatch::state;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Compact => subscriber.compact().init(),
    }

    let settings = SettingsStore::open(&config.settings_path).await;
    if let Some(seed) = config.seed_settings.clone() {
        settings.seed(seed).await;
    }

    let transport = HttpTransport::new(config.dispatch_timeout.min(Duration::from_secs(5)))?;
    let options = CoordinatorOptions {
        timeout: config.dispatch_timeout,
        countdown_seconds: config.countdown_seconds,
        ..CoordinatorOptions::default()
    };
    let coordinator = DispatchCoordinator::new(
        Arc::new(transport),
        Notifier::new(config.event_buffer_size),
        Metrics::new(),
        options,
    );

    let geocoder = NominatimGeocoder::new(config.geocoder_url.clone(), config.geocoder_timeout)
        .map_err(|err| error::AppError::Internal(err.to_string()))?;

    let shared_state = Arc::new(state::AppState::new(
        coordinator,
        settings,
        Arc::new(geocoder),
    ));
    let app = api::rest::router(shared_state.clone(), &config.static_dir);

    let grpc_addr = format!("0.0.0.0:{}", config.grpc_port)
        .parse()
        .map_err(|err| error::AppError::Internal(format!("invalid grpc address: {err}")))?;
    let grpc_service = GrpcDispatchService::new(shared_state.clone());

    tokio::spawn(async move {
        tracing::info!(grpc_port = %grpc_addr, "grpc server started");
        if let Err(err) = TonicServer::builder()
            .add_service(CoordinateDispatchServer::new(grpc_service))
            .serve(grpc_addr)
            .await
        {
            tracing::error!(error = %err, "grpc server failed");
        }
    });

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    shared_state.coordinator.deactivate();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
