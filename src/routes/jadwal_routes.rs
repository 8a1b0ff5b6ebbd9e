// src/routes/jadwal_routes.rs

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::{auth_context::AuthContext, device_context::DeviceContext},
    models::{ApiOk, AppState, JadwalObat, OkData},
    services::jadwal_service::JadwalService,
    store::{JadwalInput, JadwalStore, PgJadwalStore, StockChange},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jadwal/input", post(create_jadwal))
        .route("/jadwal/get-for-web", get(list_for_web))
        .route("/jadwal/get-for-iot", get(list_for_iot))
        .route("/jadwal/get/{id}", get(get_jadwal))
        .route("/jadwal/update/{id}", put(update_jadwal))
        .route("/jadwal/delete/{id}", delete(delete_jadwal))
        .route("/jadwal/update-stock-obat-web", put(update_stock_web))
        .route("/jadwal/update-stock-obat-iot", put(update_stock_iot))
}

fn service(state: &AppState) -> JadwalService {
    let store: Arc<dyn JadwalStore> = Arc::new(PgJadwalStore::new(state.db.clone()));
    JadwalService::new(store)
}

#[derive(Debug, Deserialize)]
pub struct JadwalRequest {
    pub nama_pasien: String,
    pub nama_obat: String,
    #[serde(default)]
    pub dosis_obat: String,
    pub jumlah_obat: i32,
    #[serde(default)]
    pub jam_awal: Vec<String>,
    #[serde(default)]
    pub jam_berakhir: Vec<String>,
    pub slot_obat: String,
    #[serde(default)]
    pub kategori: String,
    pub catatan: Option<String>,
}

impl From<JadwalRequest> for JadwalInput {
    fn from(r: JadwalRequest) -> Self {
        JadwalInput {
            nama_pasien: r.nama_pasien,
            nama_obat: r.nama_obat,
            dosis_obat: r.dosis_obat,
            jumlah_obat: r.jumlah_obat,
            jam_awal: r.jam_awal,
            jam_berakhir: r.jam_berakhir,
            slot_obat: r.slot_obat,
            kategori: r.kategori,
            catatan: r.catatan.filter(|c| !c.trim().is_empty()),
        }
    }
}

pub async fn create_jadwal(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<JadwalRequest>,
) -> Result<Json<ApiOk<JadwalObat>>, ApiError> {
    let row = service(&state).create(auth.user_id, req.into()).await?;
    Ok(Json(ApiOk { data: row }))
}

pub async fn list_for_web(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<JadwalObat>>>, ApiError> {
    let rows = service(&state).list_for_user(auth.user_id).await?;
    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Deserialize)]
pub struct IotQuery {
    pub user_id: Uuid,
}

pub async fn list_for_iot(
    State(state): State<AppState>,
    _device: DeviceContext,
    Query(q): Query<IotQuery>,
) -> Result<Json<ApiOk<Vec<JadwalObat>>>, ApiError> {
    let rows = service(&state).list_for_user(q.user_id).await?;
    Ok(Json(ApiOk { data: rows }))
}

pub async fn get_jadwal(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiOk<JadwalObat>>, ApiError> {
    let row = service(&state).get(auth.user_id, id).await?;
    Ok(Json(ApiOk { data: row }))
}

pub async fn update_jadwal(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<JadwalRequest>,
) -> Result<Json<ApiOk<JadwalObat>>, ApiError> {
    let row = service(&state).update(auth.user_id, id, req.into()).await?;
    Ok(Json(ApiOk { data: row }))
}

pub async fn delete_jadwal(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    service(&state).delete(auth.user_id, id).await?;
    Ok(Json(ApiOk::ok()))
}

/* ============================================================
   Stock
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct StockWebRequest {
    pub id: Uuid,
    #[serde(rename = "newStock", alias = "jumlah_obat")]
    pub new_stock: i32,
}

pub async fn update_stock_web(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<StockWebRequest>,
) -> Result<Json<ApiOk<JadwalObat>>, ApiError> {
    let row = service(&state)
        .update_stock_web(auth.user_id, req.id, req.new_stock)
        .await?;
    Ok(Json(ApiOk { data: row }))
}

#[derive(Debug, Deserialize)]
pub struct StockIotRequest {
    pub id: Uuid,
}

pub async fn update_stock_iot(
    State(state): State<AppState>,
    _device: DeviceContext,
    Json(req): Json<StockIotRequest>,
) -> Result<Json<ApiOk<StockChange>>, ApiError> {
    let change = service(&state).update_stock_iot(req.id).await?;
    Ok(Json(ApiOk { data: change }))
}
