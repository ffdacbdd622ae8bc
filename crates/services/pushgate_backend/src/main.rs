// File: services/pushgate_backend/src/main.rs
use pushgate_backend::build_app;
use pushgate_common::{config_error, logging, PushgateError};
use pushgate_config::load_config;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

async fn run() -> Result<(), PushgateError> {
    let config = Arc::new(load_config().map_err(|e| config_error(format!("{}", e)))?);
    let app = build_app(config.clone()).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Starting server at http://{}", addr);
    info!("API endpoints available at http://{}/api", addr);

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("pushgate backend failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
