use std::net::SocketAddr;

use messaging_core::{config::Config, error::AppError, logging, routes, state::AppState};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();
    let config = Config::from_env()?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let state = AppState::new(config);
    let app = routes::build_router().with_state(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::StartServer(format!("bind {addr}: {e}")))?;
    tracing::info!(%addr, "messaging-core listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::StartServer(format!("serve: {e}")))?;
    Ok(())
}
