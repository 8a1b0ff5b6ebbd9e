use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::JadwalObat;
use crate::services::jadwal_service::decrement_floored;
use crate::store::{JadwalInput, JadwalStore, StockChange};

const JADWAL_COLUMNS: &str = r#"
    id, user_id, nama_pasien, nama_obat, dosis_obat, jumlah_obat,
    jam_awal, jam_berakhir, slot_obat, kategori, catatan, created_at, updated_at
"#;

#[derive(Clone)]
pub struct PgJadwalStore {
    db: PgPool,
}

impl PgJadwalStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(sqlx::FromRow)]
struct StockRow {
    user_id: Uuid,
    nama_obat: String,
    jumlah_obat: i32,
}

#[async_trait]
impl JadwalStore for PgJadwalStore {
    async fn insert(&self, user_id: Uuid, input: &JadwalInput) -> Result<JadwalObat, ApiError> {
        sqlx::query_as::<_, JadwalObat>(&format!(
            r#"
            INSERT INTO jadwal_obat (
              user_id, nama_pasien, nama_obat, dosis_obat, jumlah_obat,
              jam_awal, jam_berakhir, slot_obat, kategori, catatan
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {JADWAL_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&input.nama_pasien)
        .bind(&input.nama_obat)
        .bind(&input.dosis_obat)
        .bind(input.jumlah_obat)
        .bind(&input.jam_awal)
        .bind(&input.jam_berakhir)
        .bind(&input.slot_obat)
        .bind(&input.kategori)
        .bind(input.catatan.as_deref())
        .fetch_one(&self.db)
        .await
        .map_err(|e| ApiError::BadRequest("JADWAL_CREATE_FAILED", format!("{e}")))
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<JadwalObat>, ApiError> {
        sqlx::query_as::<_, JadwalObat>(&format!(
            r#"
            SELECT {JADWAL_COLUMNS}
            FROM jadwal_obat
            WHERE user_id = $1
            ORDER BY slot_obat ASC, created_at ASC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::db)
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<JadwalObat>, ApiError> {
        sqlx::query_as::<_, JadwalObat>(&format!(
            r#"
            SELECT {JADWAL_COLUMNS}
            FROM jadwal_obat
            WHERE id = $1 AND user_id = $2
            "#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::db)
    }

    async fn replace(&self, user_id: Uuid, id: Uuid, input: &JadwalInput) -> Result<Option<JadwalObat>, ApiError> {
        sqlx::query_as::<_, JadwalObat>(&format!(
            r#"
            UPDATE jadwal_obat
            SET
              nama_pasien  = $3,
              nama_obat    = $4,
              dosis_obat   = $5,
              jumlah_obat  = $6,
              jam_awal     = $7,
              jam_berakhir = $8,
              slot_obat    = $9,
              kategori     = $10,
              catatan      = $11,
              updated_at   = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {JADWAL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(&input.nama_pasien)
        .bind(&input.nama_obat)
        .bind(&input.dosis_obat)
        .bind(input.jumlah_obat)
        .bind(&input.jam_awal)
        .bind(&input.jam_berakhir)
        .bind(&input.slot_obat)
        .bind(&input.kategori)
        .bind(input.catatan.as_deref())
        .fetch_optional(&self.db)
        .await
        .map_err(|e| ApiError::BadRequest("JADWAL_UPDATE_FAILED", format!("{e}")))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, ApiError> {
        let res = sqlx::query(r#"DELETE FROM jadwal_obat WHERE id = $1 AND user_id = $2"#)
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(ApiError::db)?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_stock(&self, user_id: Uuid, id: Uuid, stock: i32) -> Result<Option<JadwalObat>, ApiError> {
        sqlx::query_as::<_, JadwalObat>(&format!(
            r#"
            UPDATE jadwal_obat
            SET jumlah_obat = $3, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {JADWAL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(stock)
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::db)
    }

    async fn dispense_one(&self, id: Uuid) -> Result<Option<StockChange>, ApiError> {
        let mut tx = self.db.begin().await.map_err(ApiError::db)?;

        let row: Option<StockRow> = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT user_id, nama_obat, jumlah_obat
            FROM jadwal_obat
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(ApiError::db)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let next = decrement_floored(row.jumlah_obat);

        sqlx::query(
            r#"
            UPDATE jadwal_obat
            SET jumlah_obat = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(next)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::db)?;

        if next < row.jumlah_obat {
            sqlx::query(
                r#"
                INSERT INTO riwayat (user_id, jadwal_id, nama_obat, status, source)
                VALUES ($1, $2, $3, 'diminum', 'iot')
                "#,
            )
            .bind(row.user_id)
            .bind(id)
            .bind(&row.nama_obat)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::db)?;
        }

        tx.commit().await.map_err(ApiError::db)?;

        Ok(Some(StockChange {
            id,
            nama_obat: row.nama_obat,
            previous: row.jumlah_obat,
            jumlah_obat: next,
        }))
    }
}
