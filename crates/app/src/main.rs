mod auth;
mod candidates;
mod problem;
mod router;
mod telemetry;

use std::net::SocketAddr;

use hireboard_storage::Database;
use hireboard_util::{load_env_file, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;
    info!(stage = "storage", "database ready");

    let state = router::AppState::new(metrics, database, &config.session_secret);

    if config.environment.is_development() {
        let expires_at = chrono::Utc::now() + chrono::Duration::hours(24);
        let token = state
            .sessions()
            .issue(&auth::SessionUser::new("dev-user"), expires_at)?;
        info!(stage = "auth", %token, %expires_at, "development session token issued");
    }

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
