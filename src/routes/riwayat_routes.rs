// src/routes/riwayat_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, OkData, Riwayat},
};

const STATUS_VALUES: [&str; 2] = ["diminum", "terlewat"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/history/get-history", get(list_history))
        .route("/history/input-history", post(create_history))
        .route("/history/delete/{id}", delete(delete_history))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub jadwal_id: Option<Uuid>,
}

pub async fn list_history(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<ApiOk<Vec<Riwayat>>>, ApiError> {
    let limit = q.limit.unwrap_or(100).clamp(1, 500);

    let rows: Vec<Riwayat> = sqlx::query_as::<_, Riwayat>(
        r#"
        SELECT id, user_id, jadwal_id, nama_obat, status, source, taken_at
        FROM riwayat
        WHERE user_id = $1
          AND ($2::uuid IS NULL OR jadwal_id = $2)
        ORDER BY taken_at DESC
        LIMIT $3
        "#,
    )
    .bind(auth.user_id)
    .bind(q.jadwal_id)
    .bind(limit)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Deserialize)]
pub struct CreateHistoryRequest {
    pub jadwal_id: Option<Uuid>,
    pub nama_obat: Option<String>,
    pub status: String,
    pub taken_at: Option<DateTime<Utc>>,
}

fn validate_status(status: &str) -> Result<String, ApiError> {
    let s = status.trim().to_ascii_lowercase();
    if STATUS_VALUES.contains(&s.as_str()) {
        Ok(s)
    } else {
        Err(ApiError::validation(
            "Status harus 'diminum' atau 'terlewat'",
        ))
    }
}

pub async fn create_history(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateHistoryRequest>,
) -> Result<Json<ApiOk<Riwayat>>, ApiError> {
    let status = validate_status(&req.status)?;

    // Name comes from the schedule when one is referenced.
    let nama_obat = match req.jadwal_id {
        Some(jadwal_id) => sqlx::query_scalar::<_, String>(
            r#"SELECT nama_obat FROM jadwal_obat WHERE id = $1 AND user_id = $2"#,
        )
        .bind(jadwal_id)
        .bind(auth.user_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::not_found("Jadwal obat"))?,
        None => req
            .nama_obat
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::validation("Nama obat wajib diisi"))?
            .to_string(),
    };

    let row: Riwayat = sqlx::query_as::<_, Riwayat>(
        r#"
        INSERT INTO riwayat (user_id, jadwal_id, nama_obat, status, source, taken_at)
        VALUES ($1, $2, $3, $4, 'web', COALESCE($5, now()))
        RETURNING id, user_id, jadwal_id, nama_obat, status, source, taken_at
        "#,
    )
    .bind(auth.user_id)
    .bind(req.jadwal_id)
    .bind(&nama_obat)
    .bind(&status)
    .bind(req.taken_at)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: row }))
}

pub async fn delete_history(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let res = sqlx::query(r#"DELETE FROM riwayat WHERE id = $1 AND user_id = $2"#)
        .bind(id)
        .bind(auth.user_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Riwayat"));
    }
    Ok(Json(ApiOk::ok()))
}
