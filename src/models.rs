use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::wablas::ReminderGateway;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub session_ttl_hours: i64,
    pub gateway: Arc<dyn ReminderGateway>,
    pub reminder_utc_offset_hours: i32,
    pub iot_device_key: Option<String>,
}

/* -------------------------
   API envelopes
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

impl ApiOk<OkData> {
    pub fn ok() -> Self {
        ApiOk {
            data: OkData { ok: true },
        }
    }
}

/* -------------------------
   Auth DTOs
--------------------------*/

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub device_name: Option<String>,
    pub remember_me: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub display_name: String,
    pub password: String,
    pub no_hp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    /// `Some(None)` clears the number.
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub no_hp: Option<Option<String>>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponseData {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct MeResponseData {
    pub user: UserProfile,
    pub session: SessionInfo,
}

#[derive(Debug, Serialize, FromRow)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub no_hp: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub no_hp: Option<String>,
    pub password_hash: String,
    pub is_active: bool,
}

#[derive(Debug, sqlx::FromRow)]
pub struct SessionTokenRow {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Doctor-control appointment.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Kontrol {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tanggal: NaiveDate,
    pub waktu: NaiveTime,
    pub dokter: String,
    pub nama_pasien: String,
    #[serde(rename = "isDone")]
    pub is_done: bool,
    pub wablas_schedule_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Medicine dosage schedule, one per dispenser slot.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct JadwalObat {
    pub id: Uuid,
    pub user_id: Uuid,
    pub nama_pasien: String,
    pub nama_obat: String,
    pub dosis_obat: String,
    pub jumlah_obat: i32,
    pub jam_awal: Vec<String>,
    pub jam_berakhir: Vec<String>,
    pub slot_obat: String,
    pub kategori: String,
    pub catatan: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Riwayat {
    pub id: Uuid,
    pub user_id: Uuid,
    pub jadwal_id: Option<Uuid>,
    pub nama_obat: String,
    pub status: String,
    pub source: String,
    pub taken_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Catatan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub judul: String,
    pub isi: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Distinguishes an absent JSON field from an explicit `null`.
pub mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(de).map(Some)
    }
}
