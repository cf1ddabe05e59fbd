use std::time::Duration;

use tracing::info;

use chat_service::config::Config;
use chat_service::error::AppError;
use chat_service::state::AppState;
use chat_service::websocket::typing::spawn_sweeper;
use chat_service::{db, logging, migrations, routes};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();

    let config = Config::from_env()?;
    let pool = db::init_pool(&config.database_url).await?;
    migrations::run_all(&pool).await?;

    let state = AppState::new(pool, config.clone());
    spawn_sweeper(
        state.typing.clone(),
        state.registry.clone(),
        Duration::from_millis(config.typing_sweep_ms),
    );

    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::StartServer(e.to_string()))?;
    info!(%addr, "chat service listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::StartServer(e.to_string()))?;

    Ok(())
}
