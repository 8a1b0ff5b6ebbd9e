mod auth;
mod config;
mod middleware;

mod db;
mod error;
mod models;
mod phone;
mod routes;
mod services;
mod store;
mod wablas;

use std::sync::Arc;

use crate::{config::Config, models::AppState, wablas::WablasClient};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::{HeaderName, header};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = db::connect_pg(&cfg.database_url).await?;
    if cfg.run_migrations {
        db::run_migrations(&pool).await?;
    }

    let gateway = WablasClient::new(&cfg.wablas)?;

    let state = AppState {
        db: pool,
        session_ttl_hours: cfg.session_ttl_hours,
        gateway: Arc::new(gateway),
        reminder_utc_offset_hours: cfg.reminder_utc_offset_hours,
        iot_device_key: cfg.iot_device_key.clone(),
    };

    // The React app and the dispensers are served from other origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static(middleware::device_context::DEVICE_KEY_HEADER),
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("SmedBox API listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
