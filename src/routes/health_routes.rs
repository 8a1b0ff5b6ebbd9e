// src/routes/health_routes.rs

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::error::ApiError;
use crate::models::{ApiOk, AppState};

#[derive(Serialize)]
pub struct HealthData {
    pub service: &'static str,
    pub version: &'static str,
    pub database: bool,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

pub async fn health(State(state): State<AppState>) -> Result<Json<ApiOk<HealthData>>, ApiError> {
    let database = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .is_ok();

    if !database {
        tracing::warn!("health check: database unreachable");
    }

    Ok(Json(ApiOk {
        data: HealthData {
            service: "smedbox-server",
            version: env!("CARGO_PKG_VERSION"),
            database,
        },
    }))
}
