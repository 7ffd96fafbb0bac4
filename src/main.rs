use std::sync::Arc;

use orgdesk_api::auth::JwtAuthProvider;
use orgdesk_api::handlers::AppState;
use orgdesk_api::mailer::LogMailer;
use orgdesk_api::session::PgSettingsStore;
use orgdesk_api::store::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = orgdesk_api::config::config();
    tracing::info!("Starting orgdesk-api in {:?} mode", config.environment);

    let store = PgStore::connect().await?;
    let settings = PgSettingsStore::new(store.pool().clone());

    let state = AppState {
        store: Arc::new(store),
        settings: Arc::new(settings),
        auth: Arc::new(JwtAuthProvider),
        mailer: Arc::new(LogMailer),
    };

    let app = orgdesk_api::app(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
