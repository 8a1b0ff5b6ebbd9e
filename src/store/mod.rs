//! Persistence seams for the services that talk to the messaging gateway or
//! need atomic stock updates. Simple resources (notes, dose logs, auth) query
//! the pool directly from their route handlers.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{JadwalObat, Kontrol};

pub mod jadwal_store;
pub mod kontrol_store;

pub use jadwal_store::PgJadwalStore;
pub use kontrol_store::PgKontrolStore;

#[derive(Debug, Clone)]
pub struct NewKontrol {
    pub tanggal: NaiveDate,
    pub waktu: NaiveTime,
    pub dokter: String,
    pub nama_pasien: String,
}

#[derive(Debug, Clone, Default)]
pub struct KontrolPatch {
    pub tanggal: Option<NaiveDate>,
    pub waktu: Option<NaiveTime>,
    pub dokter: Option<String>,
    pub nama_pasien: Option<String>,
}

#[async_trait]
pub trait KontrolStore: Send + Sync {
    async fn insert(&self, user_id: Uuid, new: &NewKontrol) -> Result<Kontrol, ApiError>;
    async fn list(&self, user_id: Uuid) -> Result<Vec<Kontrol>, ApiError>;
    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<Kontrol>, ApiError>;
    async fn update(&self, user_id: Uuid, id: Uuid, patch: &KontrolPatch) -> Result<Option<Kontrol>, ApiError>;
    async fn set_done(&self, user_id: Uuid, id: Uuid, is_done: bool) -> Result<Option<Kontrol>, ApiError>;
    async fn set_schedule_id(&self, id: Uuid, schedule_id: Option<&str>) -> Result<(), ApiError>;
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, ApiError>;
    /// WhatsApp number saved on the user's profile, as stored.
    async fn user_phone(&self, user_id: Uuid) -> Result<Option<String>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct JadwalInput {
    pub nama_pasien: String,
    pub nama_obat: String,
    pub dosis_obat: String,
    pub jumlah_obat: i32,
    pub jam_awal: Vec<String>,
    pub jam_berakhir: Vec<String>,
    pub slot_obat: String,
    pub kategori: String,
    pub catatan: Option<String>,
}

/// Result of one IoT dispense against a schedule's stock.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StockChange {
    pub id: Uuid,
    pub nama_obat: String,
    pub previous: i32,
    pub jumlah_obat: i32,
}

#[async_trait]
pub trait JadwalStore: Send + Sync {
    async fn insert(&self, user_id: Uuid, input: &JadwalInput) -> Result<JadwalObat, ApiError>;
    async fn list(&self, user_id: Uuid) -> Result<Vec<JadwalObat>, ApiError>;
    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<JadwalObat>, ApiError>;
    async fn replace(&self, user_id: Uuid, id: Uuid, input: &JadwalInput) -> Result<Option<JadwalObat>, ApiError>;
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, ApiError>;
    async fn set_stock(&self, user_id: Uuid, id: Uuid, stock: i32) -> Result<Option<JadwalObat>, ApiError>;
    /// Removes one unit from the schedule's stock (never below zero) and logs
    /// the dose when a unit was actually dispensed.
    async fn dispense_one(&self, id: Uuid) -> Result<Option<StockChange>, ApiError>;
}
