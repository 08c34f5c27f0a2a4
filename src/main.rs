mod app;
mod auth;
mod config;
mod db;
mod error;
mod events;
mod extract;
mod observability;
mod state;
mod users;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "accountd=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    observability::init_metrics()?;

    let app_state = state::AppState::init().await?;
    tracing::info!(
        store = ?app_state.config.store,
        events = ?app_state.config.events.backend,
        topic = %app_state.config.events.topic,
        "account service configured"
    );

    let events = app_state.events.clone();
    let served = app::serve(app::build_app(app_state)).await;

    if let Err(e) = events.shutdown().await {
        tracing::warn!(error = ?e, "event sink did not shut down cleanly");
    }
    served
}
