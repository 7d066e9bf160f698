use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use delivery_engine::api;
use delivery_engine::config::{Config, LogFormat};
use delivery_engine::engine::queue::run_dispatcher;
use delivery_engine::error::AppError;
use delivery_engine::state::{AppState, StateOptions};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    init_tracing(&config);

    let pricing = config.pricing()?;
    let (app_state, dispatch_rx) = AppState::new(StateOptions::from_config(&config, pricing));
    let shared_state = Arc::new(app_state);

    if let (Some(queue), Some(rx)) = (shared_state.dispatch.clone(), dispatch_rx) {
        tokio::spawn(run_dispatcher(
            shared_state.service.clone(),
            queue,
            rx,
            config.dispatcher_settings(),
        ));
    }

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        auto_dispatch = config.auto_dispatch,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::new(config.log_level.clone());

    match config.log_format {
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
