mod config;
mod db;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use services::checklist::ChecklistTemplate;
use services::weather::{OpenMeteoClient, WeatherLookup};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");
    let port = config.port;

    let pool = db::init_pool(&config.database_url)
        .await
        .expect("database init failed");

    let template =
        ChecklistTemplate::load(config.checklist_template_path.as_deref()).expect("checklist template load failed");

    let weather: Option<Arc<dyn WeatherLookup>> = match &config.weather {
        Some(weather_config) => match OpenMeteoClient::new(weather_config) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "weather client unavailable; lookups disabled");
                None
            }
        },
        None => None,
    };

    tokio::fs::create_dir_all(&config.photo_dir)
        .await
        .expect("failed to create photo directory");

    let state = state::AppState::new(pool, config, template, weather);

    // Spawn background autosave of live home checks.
    let autosave = services::persistence::spawn_autosave_task(state.clone());

    let app = routes::app(state.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "housewatch listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");

    autosave.abort();
    let flushed = services::persistence::flush_dirty_checks(&state).await;
    tracing::info!(flushed, "final home check flush complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
