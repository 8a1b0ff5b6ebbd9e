use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::Kontrol;
use crate::store::{KontrolPatch, KontrolStore, NewKontrol};

const KONTROL_COLUMNS: &str = r#"
    id, user_id, tanggal, waktu, dokter, nama_pasien,
    is_done, wablas_schedule_id, created_at, updated_at
"#;

#[derive(Clone)]
pub struct PgKontrolStore {
    db: PgPool,
}

impl PgKontrolStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KontrolStore for PgKontrolStore {
    async fn insert(&self, user_id: Uuid, new: &NewKontrol) -> Result<Kontrol, ApiError> {
        sqlx::query_as::<_, Kontrol>(&format!(
            r#"
            INSERT INTO kontrol (user_id, tanggal, waktu, dokter, nama_pasien)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {KONTROL_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(new.tanggal)
        .bind(new.waktu)
        .bind(&new.dokter)
        .bind(&new.nama_pasien)
        .fetch_one(&self.db)
        .await
        .map_err(|e| ApiError::BadRequest("KONTROL_CREATE_FAILED", format!("{e}")))
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<Kontrol>, ApiError> {
        sqlx::query_as::<_, Kontrol>(&format!(
            r#"
            SELECT {KONTROL_COLUMNS}
            FROM kontrol
            WHERE user_id = $1
            ORDER BY is_done ASC, tanggal ASC, waktu ASC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::db)
    }

    async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<Kontrol>, ApiError> {
        sqlx::query_as::<_, Kontrol>(&format!(
            r#"
            SELECT {KONTROL_COLUMNS}
            FROM kontrol
            WHERE id = $1 AND user_id = $2
            "#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::db)
    }

    async fn update(&self, user_id: Uuid, id: Uuid, patch: &KontrolPatch) -> Result<Option<Kontrol>, ApiError> {
        sqlx::query_as::<_, Kontrol>(&format!(
            r#"
            UPDATE kontrol
            SET
              tanggal     = COALESCE($3, tanggal),
              waktu       = COALESCE($4, waktu),
              dokter      = COALESCE($5, dokter),
              nama_pasien = COALESCE($6, nama_pasien),
              updated_at  = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {KONTROL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(patch.tanggal)
        .bind(patch.waktu)
        .bind(patch.dokter.as_deref())
        .bind(patch.nama_pasien.as_deref())
        .fetch_optional(&self.db)
        .await
        .map_err(|e| ApiError::BadRequest("KONTROL_UPDATE_FAILED", format!("{e}")))
    }

    async fn set_done(&self, user_id: Uuid, id: Uuid, is_done: bool) -> Result<Option<Kontrol>, ApiError> {
        sqlx::query_as::<_, Kontrol>(&format!(
            r#"
            UPDATE kontrol
            SET is_done = $3, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {KONTROL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(is_done)
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::db)
    }

    async fn set_schedule_id(&self, id: Uuid, schedule_id: Option<&str>) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            UPDATE kontrol
            SET wablas_schedule_id = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(schedule_id)
        .execute(&self.db)
        .await
        .map_err(ApiError::db)?;
        Ok(())
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, ApiError> {
        let res = sqlx::query(r#"DELETE FROM kontrol WHERE id = $1 AND user_id = $2"#)
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(ApiError::db)?;
        Ok(res.rows_affected() > 0)
    }

    async fn user_phone(&self, user_id: Uuid) -> Result<Option<String>, ApiError> {
        let phone: Option<Option<String>> =
            sqlx::query_scalar(r#"SELECT no_hp FROM smedbox_user WHERE user_id = $1"#)
                .bind(user_id)
                .fetch_optional(&self.db)
                .await
                .map_err(ApiError::db)?;
        Ok(phone.flatten())
    }
}
