// src/routes/catatan_routes.rs

use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, Catatan, OkData},
};

const MAX_JUDUL_LEN: usize = 200;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/note/get-notes", get(list_notes))
        .route("/note/create-note", post(create_note))
        .route("/note/update-note/{id}", put(update_note))
        .route("/note/delete-note/{id}", delete(delete_note))
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub judul: String,
    pub isi: String,
}

fn validate_note(req: &NoteRequest) -> Result<(String, String), ApiError> {
    let judul = req.judul.trim();
    if judul.is_empty() {
        return Err(ApiError::validation("Judul catatan wajib diisi"));
    }
    if judul.chars().count() > MAX_JUDUL_LEN {
        return Err(ApiError::validation("Judul catatan maksimal 200 karakter"));
    }
    let isi = req.isi.trim();
    if isi.is_empty() {
        return Err(ApiError::validation("Isi catatan wajib diisi"));
    }
    Ok((judul.to_string(), isi.to_string()))
}

pub async fn list_notes(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<Catatan>>>, ApiError> {
    let rows: Vec<Catatan> = sqlx::query_as::<_, Catatan>(
        r#"
        SELECT id, user_id, judul, isi, created_at, updated_at
        FROM catatan
        WHERE user_id = $1
        ORDER BY updated_at DESC
        "#,
    )
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn create_note(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<NoteRequest>,
) -> Result<Json<ApiOk<Catatan>>, ApiError> {
    let (judul, isi) = validate_note(&req)?;

    let row: Catatan = sqlx::query_as::<_, Catatan>(
        r#"
        INSERT INTO catatan (user_id, judul, isi)
        VALUES ($1, $2, $3)
        RETURNING id, user_id, judul, isi, created_at, updated_at
        "#,
    )
    .bind(auth.user_id)
    .bind(&judul)
    .bind(&isi)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: row }))
}

pub async fn update_note(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<NoteRequest>,
) -> Result<Json<ApiOk<Catatan>>, ApiError> {
    let (judul, isi) = validate_note(&req)?;

    let row: Catatan = sqlx::query_as::<_, Catatan>(
        r#"
        UPDATE catatan
        SET judul = $3, isi = $4, updated_at = now()
        WHERE id = $1 AND user_id = $2
        RETURNING id, user_id, judul, isi, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(auth.user_id)
    .bind(&judul)
    .bind(&isi)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("Catatan"))?;

    Ok(Json(ApiOk { data: row }))
}

pub async fn delete_note(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let res = sqlx::query(r#"DELETE FROM catatan WHERE id = $1 AND user_id = $2"#)
        .bind(id)
        .bind(auth.user_id)
        .execute(&state.db)
        .await
        .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Catatan"));
    }
    Ok(Json(ApiOk::ok()))
}
