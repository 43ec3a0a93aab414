use std::{sync::Arc, time::Duration};

mod app;
mod auth;
mod config;
mod db;
#[cfg(test)]
mod memory;
mod state;
mod token;
mod urls;
mod views;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "shortlinks=debug,axum=info,tower_http=info".to_string());
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

    let config = Arc::new(AppConfig::from_env()?);
    let pool = db::connect(&config).await?;
    db::migrate(&pool).await?;

    let state = AppState::from_pool(pool, config.clone());
    tokio::spawn(auth::session::sweep_expired(
        state.sessions.clone(),
        Duration::from_secs(config.session.sweep_secs.max(1)),
    ));

    app::serve(app::build_app(state), &config).await
}
