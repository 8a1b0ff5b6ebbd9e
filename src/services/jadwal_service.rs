use std::sync::Arc;

use chrono::NaiveTime;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::JadwalObat;
use crate::store::{JadwalInput, JadwalStore, StockChange};

/// Stock after one IoT dispense. Never below zero.
pub fn decrement_floored(stock: i32) -> i32 {
    stock.saturating_sub(1).max(0)
}

pub struct JadwalService {
    store: Arc<dyn JadwalStore>,
}

impl JadwalService {
    pub fn new(store: Arc<dyn JadwalStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, user_id: Uuid, input: JadwalInput) -> Result<JadwalObat, ApiError> {
        let input = validate_input(input)?;
        let jadwal = self.store.insert(user_id, &input).await?;
        tracing::info!(jadwal_id = %jadwal.id, slot = %jadwal.slot_obat, "jadwal created");
        Ok(jadwal)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<JadwalObat>, ApiError> {
        self.store.list(user_id).await
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<JadwalObat, ApiError> {
        self.store
            .find(user_id, id)
            .await?
            .ok_or_else(|| ApiError::not_found("Jadwal obat"))
    }

    pub async fn update(&self, user_id: Uuid, id: Uuid, input: JadwalInput) -> Result<JadwalObat, ApiError> {
        let input = validate_input(input)?;
        self.store
            .replace(user_id, id, &input)
            .await?
            .ok_or_else(|| ApiError::not_found("Jadwal obat"))
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), ApiError> {
        if self.store.delete(user_id, id).await? {
            Ok(())
        } else {
            Err(ApiError::not_found("Jadwal obat"))
        }
    }

    /// Absolute overwrite from the web app.
    pub async fn update_stock_web(&self, user_id: Uuid, id: Uuid, new_stock: i32) -> Result<JadwalObat, ApiError> {
        if new_stock < 0 {
            return Err(ApiError::validation("Jumlah obat tidak boleh negatif"));
        }
        self.store
            .set_stock(user_id, id, new_stock)
            .await?
            .ok_or_else(|| ApiError::not_found("Jadwal obat"))
    }

    /// One dose dispensed by the device.
    pub async fn update_stock_iot(&self, id: Uuid) -> Result<StockChange, ApiError> {
        let change = self
            .store
            .dispense_one(id)
            .await?
            .ok_or_else(|| ApiError::not_found("Jadwal obat"))?;

        if change.previous == 0 {
            tracing::warn!(jadwal_id = %id, "iot dispense on empty stock");
        } else if change.jumlah_obat == 0 {
            tracing::info!(jadwal_id = %id, obat = %change.nama_obat, "stock ran out");
        }
        Ok(change)
    }
}

fn validate_input(mut input: JadwalInput) -> Result<JadwalInput, ApiError> {
    input.nama_obat = input.nama_obat.trim().to_string();
    input.nama_pasien = input.nama_pasien.trim().to_string();
    input.dosis_obat = input.dosis_obat.trim().to_string();
    input.slot_obat = input.slot_obat.trim().to_string();
    input.kategori = input.kategori.trim().to_string();

    if input.nama_obat.is_empty() {
        return Err(ApiError::validation("Nama obat wajib diisi"));
    }
    if input.nama_pasien.is_empty() {
        return Err(ApiError::validation("Nama pasien wajib diisi"));
    }
    if input.slot_obat.is_empty() {
        return Err(ApiError::validation("Slot obat wajib diisi"));
    }
    if input.jumlah_obat < 0 {
        return Err(ApiError::validation("Jumlah obat tidak boleh negatif"));
    }
    if input.jam_awal.is_empty() {
        return Err(ApiError::validation("Minimal satu jam minum obat wajib diisi"));
    }
    if input.jam_awal.len() != input.jam_berakhir.len() {
        return Err(ApiError::validation(
            "Jumlah jam awal dan jam berakhir harus sama",
        ));
    }

    input.jam_awal = normalize_clock_list(&input.jam_awal)?;
    input.jam_berakhir = normalize_clock_list(&input.jam_berakhir)?;
    Ok(input)
}

fn normalize_clock_list(values: &[String]) -> Result<Vec<String>, ApiError> {
    values
        .iter()
        .map(|v| {
            let v = v.trim();
            NaiveTime::parse_from_str(v, "%H:%M")
                .map(|t| t.format("%H:%M").to_string())
                .map_err(|_| ApiError::validation(format!("Format jam tidak valid: {v} (gunakan HH:MM)")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    #[derive(Default)]
    struct MemJadwal {
        rows: Mutex<HashMap<Uuid, JadwalObat>>,
        doses: Mutex<Vec<Uuid>>,
    }

    #[async_trait]
    impl JadwalStore for MemJadwal {
        async fn insert(&self, user_id: Uuid, input: &JadwalInput) -> Result<JadwalObat, ApiError> {
            let row = JadwalObat {
                id: Uuid::new_v4(),
                user_id,
                nama_pasien: input.nama_pasien.clone(),
                nama_obat: input.nama_obat.clone(),
                dosis_obat: input.dosis_obat.clone(),
                jumlah_obat: input.jumlah_obat,
                jam_awal: input.jam_awal.clone(),
                jam_berakhir: input.jam_berakhir.clone(),
                slot_obat: input.slot_obat.clone(),
                kategori: input.kategori.clone(),
                catatan: input.catatan.clone(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            self.rows.lock().unwrap().insert(row.id, row.clone());
            Ok(row)
        }

        async fn list(&self, user_id: Uuid) -> Result<Vec<JadwalObat>, ApiError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|r| r.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<JadwalObat>, ApiError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .get(&id)
                .filter(|r| r.user_id == user_id)
                .cloned())
        }

        async fn replace(&self, user_id: Uuid, id: Uuid, input: &JadwalInput) -> Result<Option<JadwalObat>, ApiError> {
            let mut rows = self.rows.lock().unwrap();
            let Some(row) = rows.get_mut(&id).filter(|r| r.user_id == user_id) else {
                return Ok(None);
            };
            row.nama_obat = input.nama_obat.clone();
            row.jumlah_obat = input.jumlah_obat;
            row.jam_awal = input.jam_awal.clone();
            row.jam_berakhir = input.jam_berakhir.clone();
            Ok(Some(row.clone()))
        }

        async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, ApiError> {
            let mut rows = self.rows.lock().unwrap();
            match rows.get(&id) {
                Some(r) if r.user_id == user_id => {
                    rows.remove(&id);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn set_stock(&self, user_id: Uuid, id: Uuid, stock: i32) -> Result<Option<JadwalObat>, ApiError> {
            let mut rows = self.rows.lock().unwrap();
            Ok(rows.get_mut(&id).filter(|r| r.user_id == user_id).map(|r| {
                r.jumlah_obat = stock;
                r.clone()
            }))
        }

        async fn dispense_one(&self, id: Uuid) -> Result<Option<StockChange>, ApiError> {
            let mut rows = self.rows.lock().unwrap();
            let Some(row) = rows.get_mut(&id) else {
                return Ok(None);
            };
            let previous = row.jumlah_obat;
            row.jumlah_obat = decrement_floored(previous);
            if row.jumlah_obat < previous {
                self.doses.lock().unwrap().push(id);
            }
            Ok(Some(StockChange {
                id,
                nama_obat: row.nama_obat.clone(),
                previous,
                jumlah_obat: row.jumlah_obat,
            }))
        }
    }

    fn input(stock: i32) -> JadwalInput {
        JadwalInput {
            nama_pasien: " Budi ".into(),
            nama_obat: "Amlodipine".into(),
            dosis_obat: "5 mg".into(),
            jumlah_obat: stock,
            jam_awal: vec!["7:00".into(), "19:00".into()],
            jam_berakhir: vec!["08:00".into(), "20:00".into()],
            slot_obat: "1".into(),
            kategori: "sebelum makan".into(),
            catatan: None,
        }
    }

    fn service() -> (JadwalService, Arc<MemJadwal>) {
        let store = Arc::new(MemJadwal::default());
        (JadwalService::new(store.clone()), store)
    }

    #[test]
    fn floored_decrement() {
        assert_eq!(decrement_floored(3), 2);
        assert_eq!(decrement_floored(1), 0);
        assert_eq!(decrement_floored(0), 0);
        assert_eq!(decrement_floored(i32::MIN), 0);
    }

    #[tokio::test]
    async fn iot_decrement_never_goes_negative() {
        let (svc, store) = service();
        let user = Uuid::new_v4();
        let jadwal = svc.create(user, input(2)).await.unwrap();

        let mut last = None;
        for _ in 0..5 {
            last = Some(svc.update_stock_iot(jadwal.id).await.unwrap());
        }
        let last = last.unwrap();
        assert_eq!(last.previous, 0);
        assert_eq!(last.jumlah_obat, 0);
        assert_eq!(svc.get(user, jadwal.id).await.unwrap().jumlah_obat, 0);
        // only the two real dispenses are logged
        assert_eq!(store.doses.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn web_stock_is_absolute_and_non_negative() {
        let (svc, _) = service();
        let user = Uuid::new_v4();
        let jadwal = svc.create(user, input(1)).await.unwrap();

        let updated = svc.update_stock_web(user, jadwal.id, 30).await.unwrap();
        assert_eq!(updated.jumlah_obat, 30);

        assert!(matches!(
            svc.update_stock_web(user, jadwal.id, -1).await,
            Err(ApiError::BadRequest("VALIDATION_ERROR", _))
        ));
        assert!(matches!(
            svc.update_stock_web(Uuid::new_v4(), jadwal.id, 5).await,
            Err(ApiError::NotFound(..))
        ));
    }

    #[tokio::test]
    async fn create_normalizes_and_validates() {
        let (svc, _) = service();
        let user = Uuid::new_v4();
        let jadwal = svc.create(user, input(10)).await.unwrap();
        assert_eq!(jadwal.nama_pasien, "Budi");
        assert_eq!(jadwal.jam_awal, vec!["07:00", "19:00"]);

        let mut bad = input(10);
        bad.jam_berakhir.pop();
        assert!(svc.create(user, bad).await.is_err());

        let mut bad = input(10);
        bad.jam_awal[0] = "25:00".into();
        assert!(svc.create(user, bad).await.is_err());

        let mut bad = input(10);
        bad.nama_obat = "  ".into();
        assert!(svc.create(user, bad).await.is_err());
    }

    #[tokio::test]
    async fn iot_on_unknown_schedule_is_not_found() {
        let (svc, _) = service();
        assert!(matches!(
            svc.update_stock_iot(Uuid::new_v4()).await,
            Err(ApiError::NotFound(..))
        ));
    }
}
