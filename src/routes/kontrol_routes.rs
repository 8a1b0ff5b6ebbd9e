// src/routes/kontrol_routes.rs

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, Kontrol, OkData},
    services::kontrol_service::{
        parse_tanggal, parse_waktu, required_text, KontrolOutcome, KontrolService, KontrolUpdate,
        ReminderRequest,
    },
    store::{KontrolPatch, NewKontrol, PgKontrolStore},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/kontrol/create-kontrol", post(create_kontrol))
        .route("/kontrol/get-kontrol", get(list_kontrol))
        .route("/kontrol/get-kontrol/{id}", get(get_kontrol))
        .route("/kontrol/update-kontrol/{id}", put(update_kontrol))
        .route("/kontrol/done", patch(mark_done))
        .route("/kontrol/delete/{id}", delete(delete_kontrol))
}

fn service(state: &AppState) -> KontrolService {
    KontrolService::new(
        Arc::new(PgKontrolStore::new(state.db.clone())),
        state.gateway.clone(),
        state.reminder_utc_offset_hours,
    )
}

/// Kontrol mutations carry the reminder outcome next to the record.
#[derive(Debug, Serialize)]
pub struct KontrolResponse<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<KontrolOutcome> for KontrolResponse<Kontrol> {
    fn from(o: KontrolOutcome) -> Self {
        KontrolResponse {
            data: o.kontrol,
            warning: o.warning,
        }
    }
}

/* ============================================================
   POST /kontrol/create-kontrol
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateKontrolRequest {
    pub tanggal: String,
    pub waktu: String,
    pub dokter: String,
    pub nama_pasien: String,
    #[serde(default, rename = "enableReminder", alias = "enable_reminder")]
    pub enable_reminder: bool,
    pub no_hp: Option<String>,
}

pub async fn create_kontrol(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateKontrolRequest>,
) -> Result<Json<KontrolResponse<Kontrol>>, ApiError> {
    let new = NewKontrol {
        tanggal: parse_tanggal(&req.tanggal)?,
        waktu: parse_waktu(&req.waktu)?,
        dokter: required_text(&req.dokter, "Nama dokter")?,
        nama_pasien: required_text(&req.nama_pasien, "Nama pasien")?,
    };
    let reminder = ReminderRequest {
        enabled: req.enable_reminder,
        phone: req.no_hp,
    };

    let outcome = service(&state).create(auth.user_id, new, reminder).await?;
    Ok(Json(outcome.into()))
}

/* ============================================================
   GET /kontrol/get-kontrol[/{id}]
   ============================================================ */

pub async fn list_kontrol(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<Kontrol>>>, ApiError> {
    let rows = service(&state).list(auth.user_id).await?;
    Ok(Json(ApiOk { data: rows }))
}

pub async fn get_kontrol(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiOk<Kontrol>>, ApiError> {
    let row = service(&state).get(auth.user_id, id).await?;
    Ok(Json(ApiOk { data: row }))
}

/* ============================================================
   PUT /kontrol/update-kontrol/{id}
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct UpdateKontrolRequest {
    pub tanggal: Option<String>,
    pub waktu: Option<String>,
    pub dokter: Option<String>,
    pub nama_pasien: Option<String>,
    #[serde(rename = "enableReminder", alias = "enable_reminder")]
    pub enable_reminder: Option<bool>,
    pub no_hp: Option<String>,
}

pub async fn update_kontrol(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateKontrolRequest>,
) -> Result<Json<KontrolResponse<Kontrol>>, ApiError> {
    let patch = KontrolPatch {
        tanggal: req.tanggal.as_deref().map(parse_tanggal).transpose()?,
        waktu: req.waktu.as_deref().map(parse_waktu).transpose()?,
        dokter: req
            .dokter
            .as_deref()
            .map(|d| required_text(d, "Nama dokter"))
            .transpose()?,
        nama_pasien: req
            .nama_pasien
            .as_deref()
            .map(|n| required_text(n, "Nama pasien"))
            .transpose()?,
    };

    let outcome = service(&state)
        .update(
            auth.user_id,
            id,
            KontrolUpdate {
                patch,
                enable_reminder: req.enable_reminder,
                phone: req.no_hp,
            },
        )
        .await?;
    Ok(Json(outcome.into()))
}

/* ============================================================
   PATCH /kontrol/done
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct DoneRequest {
    pub id: Uuid,
    #[serde(default = "default_true", rename = "isDone", alias = "is_done")]
    pub is_done: bool,
}

fn default_true() -> bool {
    true
}

pub async fn mark_done(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<DoneRequest>,
) -> Result<Json<KontrolResponse<Kontrol>>, ApiError> {
    let outcome = service(&state).mark_done(auth.user_id, req.id, req.is_done).await?;
    Ok(Json(outcome.into()))
}

/* ============================================================
   DELETE /kontrol/delete/{id}
   ============================================================ */

pub async fn delete_kontrol(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<KontrolResponse<OkData>>, ApiError> {
    let warning = service(&state).delete(auth.user_id, id).await?;
    Ok(Json(KontrolResponse {
        data: OkData { ok: true },
        warning,
    }))
}
