//! Control-appointment lifecycle and its WhatsApp reminder.
//!
//! Local writes always win: a reminder that cannot be scheduled or cancelled
//! is logged and reported back as a warning, never as a failed request.

use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::Kontrol;
use crate::phone::PhoneNumber;
use crate::store::{KontrolPatch, KontrolStore, NewKontrol};
use crate::wablas::{GatewayError, ReminderGateway};

/// What the caller asked for regarding the WhatsApp reminder.
#[derive(Debug, Clone, Default)]
pub struct ReminderRequest {
    pub enabled: bool,
    /// Overrides the number saved on the user's profile.
    pub phone: Option<String>,
}

#[derive(Debug)]
pub struct KontrolOutcome {
    pub kontrol: Kontrol,
    pub warning: Option<String>,
}

#[derive(Debug, Default)]
pub struct KontrolUpdate {
    pub patch: KontrolPatch,
    /// `Some(true)` turns the reminder on, `Some(false)` cancels it.
    pub enable_reminder: Option<bool>,
    pub phone: Option<String>,
}

enum CancelResult {
    Cleared,
    Kept(String),
}

pub struct KontrolService {
    store: Arc<dyn KontrolStore>,
    gateway: Arc<dyn ReminderGateway>,
    local_offset: FixedOffset,
}

pub fn parse_tanggal(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::validation("Format tanggal tidak valid (gunakan YYYY-MM-DD)"))
}

pub fn parse_waktu(raw: &str) -> Result<NaiveTime, ApiError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| ApiError::validation("Format waktu tidak valid (gunakan HH:MM)"))
}

pub fn required_text(raw: &str, field: &str) -> Result<String, ApiError> {
    let v = raw.trim();
    if v.is_empty() {
        return Err(ApiError::validation(format!("{field} wajib diisi")));
    }
    Ok(v.to_string())
}

fn reminder_message(k: &Kontrol) -> String {
    format!(
        "Halo {}, ini pengingat jadwal kontrol Anda dengan {} pada {} pukul {}. \
         Mohon hadir tepat waktu dan bawa obat yang sedang dikonsumsi. - SmedBox",
        k.nama_pasien,
        k.dokter,
        k.tanggal.format("%d-%m-%Y"),
        k.waktu.format("%H:%M"),
    )
}

impl KontrolService {
    pub fn new(store: Arc<dyn KontrolStore>, gateway: Arc<dyn ReminderGateway>, utc_offset_hours: i32) -> Self {
        let local_offset = FixedOffset::east_opt(utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix());
        Self {
            store,
            gateway,
            local_offset,
        }
    }

    fn now_local(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.local_offset).naive_local()
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Kontrol>, ApiError> {
        self.store.list(user_id).await
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Kontrol, ApiError> {
        self.store
            .find(user_id, id)
            .await?
            .ok_or_else(|| ApiError::not_found("Jadwal kontrol"))
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        new: NewKontrol,
        reminder: ReminderRequest,
    ) -> Result<KontrolOutcome, ApiError> {
        let mut kontrol = self.store.insert(user_id, &new).await?;
        tracing::info!(kontrol_id = %kontrol.id, "kontrol created");

        let warning = if reminder.enabled {
            self.schedule_reminder(&mut kontrol, reminder.phone.as_deref()).await
        } else {
            None
        };

        Ok(KontrolOutcome { kontrol, warning })
    }

    pub async fn update(&self, user_id: Uuid, id: Uuid, update: KontrolUpdate) -> Result<KontrolOutcome, ApiError> {
        let before = self.get(user_id, id).await?;
        let mut kontrol = self
            .store
            .update(user_id, id, &update.patch)
            .await?
            .ok_or_else(|| ApiError::not_found("Jadwal kontrol"))?;

        let moved = kontrol.tanggal != before.tanggal || kontrol.waktu != before.waktu;
        let had_reminder = kontrol.wablas_schedule_id.is_some();
        let wants_reminder = match update.enable_reminder {
            Some(flag) => flag,
            None => had_reminder,
        };

        let mut warnings = Vec::new();

        if had_reminder && (moved || !wants_reminder) {
            if let Some(w) = self.cancel_reminder(&mut kontrol).await {
                // old reminder may still fire; do not stack a second one on top
                warnings.push(w);
                return Ok(KontrolOutcome {
                    kontrol,
                    warning: Some(warnings.join("; ")),
                });
            }
        }

        if wants_reminder && !kontrol.is_done && kontrol.wablas_schedule_id.is_none() {
            if let Some(w) = self.schedule_reminder(&mut kontrol, update.phone.as_deref()).await {
                warnings.push(w);
            }
        }

        Ok(KontrolOutcome {
            kontrol,
            warning: (!warnings.is_empty()).then(|| warnings.join("; ")),
        })
    }

    pub async fn mark_done(&self, user_id: Uuid, id: Uuid, is_done: bool) -> Result<KontrolOutcome, ApiError> {
        let mut kontrol = self
            .store
            .set_done(user_id, id, is_done)
            .await?
            .ok_or_else(|| ApiError::not_found("Jadwal kontrol"))?;

        let warning = if is_done && kontrol.wablas_schedule_id.is_some() {
            self.cancel_reminder(&mut kontrol).await
        } else {
            None
        };

        Ok(KontrolOutcome { kontrol, warning })
    }

    /// Returns a warning when the remote reminder could not be removed.
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<Option<String>, ApiError> {
        let kontrol = self.get(user_id, id).await?;

        let warning = match kontrol.wablas_schedule_id.as_deref() {
            Some(schedule_id) => match self.cancel_remote(kontrol.id, schedule_id).await {
                CancelResult::Cleared => None,
                CancelResult::Kept(w) => Some(w),
            },
            None => None,
        };

        if !self.store.delete(user_id, id).await? {
            return Err(ApiError::not_found("Jadwal kontrol"));
        }
        tracing::info!(kontrol_id = %id, "kontrol deleted");
        Ok(warning)
    }

    async fn resolve_phone(&self, user_id: Uuid, explicit: Option<&str>) -> Result<PhoneNumber, String> {
        let raw = match explicit.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(raw.to_string()),
            None => self.store.user_phone(user_id).await.map_err(|e| {
                tracing::warn!(%user_id, error = ?e, "could not load profile phone");
                "Nomor WhatsApp tidak dapat dibaca, pengingat tidak dijadwalkan".to_string()
            })?,
        };
        match raw {
            None => Err("Nomor WhatsApp belum diatur, pengingat tidak dijadwalkan".to_string()),
            Some(raw) => PhoneNumber::parse(&raw).map_err(|e| format!("{e}, pengingat tidak dijadwalkan")),
        }
    }

    /// Schedules the reminder and stores its id on `kontrol`. Returns a
    /// warning instead of failing; the appointment is already saved.
    async fn schedule_reminder(&self, kontrol: &mut Kontrol, phone: Option<&str>) -> Option<String> {
        let phone = match self.resolve_phone(kontrol.user_id, phone).await {
            Ok(p) => p,
            Err(w) => return Some(w),
        };

        let send_at = NaiveDateTime::new(kontrol.tanggal, kontrol.waktu);
        if send_at <= self.now_local() {
            return Some("Waktu kontrol sudah lewat, pengingat tidak dijadwalkan".to_string());
        }

        let schedule_id = match self
            .gateway
            .schedule_message(&phone, send_at, &reminder_message(kontrol))
            .await
        {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(kontrol_id = %kontrol.id, error = %e, "failed to schedule WA reminder");
                return Some(format!("Pengingat WhatsApp gagal dijadwalkan: {e}"));
            }
        };

        if let Err(e) = self.store.set_schedule_id(kontrol.id, Some(&schedule_id)).await {
            tracing::warn!(kontrol_id = %kontrol.id, error = ?e, "could not persist schedule id, withdrawing reminder");
            return match self.gateway.cancel_message(&schedule_id).await {
                Ok(()) | Err(GatewayError::NotFound) => {
                    Some("Pengingat WhatsApp gagal disimpan".to_string())
                }
                Err(e) => {
                    tracing::warn!(
                        kontrol_id = %kontrol.id,
                        %schedule_id,
                        error = %e,
                        "orphaned WA reminder, withdraw failed"
                    );
                    Some(format!(
                        "Pengingat WhatsApp gagal disimpan dan masih terjadwal di gateway (id {schedule_id})"
                    ))
                }
            };
        }

        tracing::info!(kontrol_id = %kontrol.id, schedule_id = %schedule_id, "WA reminder scheduled");
        kontrol.wablas_schedule_id = Some(schedule_id);
        None
    }

    /// Cancels the pending reminder. The id is cleared only when the gateway
    /// confirms it is gone, so a failed attempt can be retried later.
    async fn cancel_reminder(&self, kontrol: &mut Kontrol) -> Option<String> {
        let schedule_id = kontrol.wablas_schedule_id.clone()?;

        match self.cancel_remote(kontrol.id, &schedule_id).await {
            CancelResult::Cleared => match self.store.set_schedule_id(kontrol.id, None).await {
                Ok(()) => {
                    kontrol.wablas_schedule_id = None;
                    None
                }
                Err(e) => {
                    // remote is gone; a retry sees not-found and clears the id
                    tracing::warn!(kontrol_id = %kontrol.id, %schedule_id, error = ?e, "could not clear schedule id");
                    Some("Pengingat WhatsApp dibatalkan, tetapi status lokal gagal diperbarui".to_string())
                }
            },
            CancelResult::Kept(w) => Some(w),
        }
    }

    async fn cancel_remote(&self, kontrol_id: Uuid, schedule_id: &str) -> CancelResult {
        match self.gateway.cancel_message(schedule_id).await {
            Ok(()) => {
                tracing::info!(%kontrol_id, %schedule_id, "WA reminder cancelled");
                CancelResult::Cleared
            }
            Err(GatewayError::NotFound) => {
                tracing::info!(%kontrol_id, %schedule_id, "WA reminder already gone");
                CancelResult::Cleared
            }
            Err(e) => {
                tracing::warn!(%kontrol_id, %schedule_id, error = %e, "failed to cancel WA reminder");
                CancelResult::Kept(format!("Pengingat WhatsApp gagal dibatalkan: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    #[derive(Default)]
    struct MemKontrol {
        rows: Mutex<HashMap<Uuid, Kontrol>>,
        phones: Mutex<HashMap<Uuid, String>>,
        fail_phone_lookup: Mutex<bool>,
        fail_schedule_write: Mutex<bool>,
    }

    #[async_trait]
    impl KontrolStore for MemKontrol {
        async fn insert(&self, user_id: Uuid, new: &NewKontrol) -> Result<Kontrol, ApiError> {
            let row = Kontrol {
                id: Uuid::new_v4(),
                user_id,
                tanggal: new.tanggal,
                waktu: new.waktu,
                dokter: new.dokter.clone(),
                nama_pasien: new.nama_pasien.clone(),
                is_done: false,
                wablas_schedule_id: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            self.rows.lock().unwrap().insert(row.id, row.clone());
            Ok(row)
        }

        async fn list(&self, user_id: Uuid) -> Result<Vec<Kontrol>, ApiError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|k| k.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn find(&self, user_id: Uuid, id: Uuid) -> Result<Option<Kontrol>, ApiError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .get(&id)
                .filter(|k| k.user_id == user_id)
                .cloned())
        }

        async fn update(&self, user_id: Uuid, id: Uuid, patch: &KontrolPatch) -> Result<Option<Kontrol>, ApiError> {
            let mut rows = self.rows.lock().unwrap();
            Ok(rows.get_mut(&id).filter(|k| k.user_id == user_id).map(|k| {
                if let Some(t) = patch.tanggal {
                    k.tanggal = t;
                }
                if let Some(w) = patch.waktu {
                    k.waktu = w;
                }
                if let Some(d) = &patch.dokter {
                    k.dokter = d.clone();
                }
                if let Some(n) = &patch.nama_pasien {
                    k.nama_pasien = n.clone();
                }
                k.clone()
            }))
        }

        async fn set_done(&self, user_id: Uuid, id: Uuid, is_done: bool) -> Result<Option<Kontrol>, ApiError> {
            let mut rows = self.rows.lock().unwrap();
            Ok(rows.get_mut(&id).filter(|k| k.user_id == user_id).map(|k| {
                k.is_done = is_done;
                k.clone()
            }))
        }

        async fn set_schedule_id(&self, id: Uuid, schedule_id: Option<&str>) -> Result<(), ApiError> {
            if *self.fail_schedule_write.lock().unwrap() {
                return Err(ApiError::Internal("db error: connection reset".into()));
            }
            if let Some(k) = self.rows.lock().unwrap().get_mut(&id) {
                k.wablas_schedule_id = schedule_id.map(str::to_string);
            }
            Ok(())
        }

        async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool, ApiError> {
            let mut rows = self.rows.lock().unwrap();
            match rows.get(&id) {
                Some(k) if k.user_id == user_id => {
                    rows.remove(&id);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn user_phone(&self, user_id: Uuid) -> Result<Option<String>, ApiError> {
            if *self.fail_phone_lookup.lock().unwrap() {
                return Err(ApiError::Internal("db error: connection reset".into()));
            }
            Ok(self.phones.lock().unwrap().get(&user_id).cloned())
        }
    }

    #[derive(Clone, Copy, Default)]
    enum CancelMode {
        #[default]
        Ok,
        NotFound,
        Fail,
    }

    #[derive(Default)]
    struct FakeGateway {
        scheduled: Mutex<Vec<(String, NaiveDateTime)>>,
        cancelled: Mutex<Vec<String>>,
        cancel_mode: Mutex<CancelMode>,
        fail_schedule: bool,
    }

    impl FakeGateway {
        fn calls(&self) -> usize {
            self.scheduled.lock().unwrap().len() + self.cancelled.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ReminderGateway for FakeGateway {
        async fn schedule_message(
            &self,
            phone: &PhoneNumber,
            send_at: NaiveDateTime,
            _message: &str,
        ) -> Result<String, GatewayError> {
            if self.fail_schedule {
                return Err(GatewayError::Rejected {
                    status: 500,
                    body: "down".into(),
                });
            }
            let mut scheduled = self.scheduled.lock().unwrap();
            scheduled.push((phone.to_string(), send_at));
            Ok(format!("sch-{}", scheduled.len()))
        }

        async fn cancel_message(&self, schedule_id: &str) -> Result<(), GatewayError> {
            self.cancelled.lock().unwrap().push(schedule_id.to_string());
            match *self.cancel_mode.lock().unwrap() {
                CancelMode::Ok => Ok(()),
                CancelMode::NotFound => Err(GatewayError::NotFound),
                CancelMode::Fail => Err(GatewayError::Rejected {
                    status: 503,
                    body: "busy".into(),
                }),
            }
        }

        async fn send_message(&self, _phone: &PhoneNumber, _message: &str) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    struct Fixture {
        svc: KontrolService,
        store: Arc<MemKontrol>,
        gateway: Arc<FakeGateway>,
        user: Uuid,
    }

    fn fixture_with(gateway: FakeGateway) -> Fixture {
        let store = Arc::new(MemKontrol::default());
        let gateway = Arc::new(gateway);
        let user = Uuid::new_v4();
        store
            .phones
            .lock()
            .unwrap()
            .insert(user, "0812-3456-7890".into());
        Fixture {
            svc: KontrolService::new(store.clone(), gateway.clone(), 7),
            store,
            gateway,
            user,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(FakeGateway::default())
    }

    fn future_kontrol() -> NewKontrol {
        NewKontrol {
            tanggal: NaiveDate::from_ymd_opt(2099, 3, 14).unwrap(),
            waktu: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            dokter: "dr. Sari".into(),
            nama_pasien: "Budi".into(),
        }
    }

    fn on() -> ReminderRequest {
        ReminderRequest {
            enabled: true,
            phone: None,
        }
    }

    #[tokio::test]
    async fn create_without_reminder_never_calls_gateway() {
        let f = fixture();
        let out = f
            .svc
            .create(f.user, future_kontrol(), ReminderRequest::default())
            .await
            .unwrap();
        assert!(out.warning.is_none());
        assert!(out.kontrol.wablas_schedule_id.is_none());
        assert_eq!(f.gateway.calls(), 0);
    }

    #[tokio::test]
    async fn create_with_reminder_stores_schedule_id() {
        let f = fixture();
        let out = f.svc.create(f.user, future_kontrol(), on()).await.unwrap();

        assert!(out.warning.is_none());
        assert_eq!(out.kontrol.wablas_schedule_id.as_deref(), Some("sch-1"));
        let stored = f.store.find(f.user, out.kontrol.id).await.unwrap().unwrap();
        assert_eq!(stored.wablas_schedule_id.as_deref(), Some("sch-1"));

        let scheduled = f.gateway.scheduled.lock().unwrap();
        assert_eq!(scheduled[0].0, "6281234567890");
        assert_eq!(
            scheduled[0].1,
            NaiveDate::from_ymd_opt(2099, 3, 14)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap()
        );
    }

    #[tokio::test]
    async fn gateway_failure_keeps_the_appointment() {
        let f = fixture_with(FakeGateway {
            fail_schedule: true,
            ..Default::default()
        });
        let out = f.svc.create(f.user, future_kontrol(), on()).await.unwrap();

        assert!(out.warning.is_some());
        assert!(out.kontrol.wablas_schedule_id.is_none());
        assert!(f.store.find(f.user, out.kontrol.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn invalid_or_missing_phone_skips_reminder_with_warning() {
        let f = fixture();
        let out = f
            .svc
            .create(
                f.user,
                future_kontrol(),
                ReminderRequest {
                    enabled: true,
                    phone: Some("021567890123".into()),
                },
            )
            .await
            .unwrap();
        assert!(out.warning.is_some());
        assert_eq!(f.gateway.calls(), 0);

        let stranger = Uuid::new_v4();
        let out = f.svc.create(stranger, future_kontrol(), on()).await.unwrap();
        assert!(out.warning.unwrap().contains("belum diatur"));
        assert_eq!(f.gateway.calls(), 0);
    }

    #[tokio::test]
    async fn past_appointment_is_not_scheduled() {
        let f = fixture();
        let mut past = future_kontrol();
        past.tanggal = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let out = f.svc.create(f.user, past, on()).await.unwrap();
        assert!(out.warning.is_some());
        assert_eq!(f.gateway.calls(), 0);
    }

    #[tokio::test]
    async fn mark_done_without_schedule_makes_no_gateway_call() {
        let f = fixture();
        let created = f
            .svc
            .create(f.user, future_kontrol(), ReminderRequest::default())
            .await
            .unwrap();
        let out = f.svc.mark_done(f.user, created.kontrol.id, true).await.unwrap();
        assert!(out.kontrol.is_done);
        assert!(out.warning.is_none());
        assert_eq!(f.gateway.calls(), 0);
    }

    #[tokio::test]
    async fn mark_done_cancels_and_clears_schedule() {
        let f = fixture();
        let created = f.svc.create(f.user, future_kontrol(), on()).await.unwrap();
        let out = f.svc.mark_done(f.user, created.kontrol.id, true).await.unwrap();

        assert!(out.kontrol.wablas_schedule_id.is_none());
        assert_eq!(*f.gateway.cancelled.lock().unwrap(), vec!["sch-1".to_string()]);
        let stored = f.store.find(f.user, created.kontrol.id).await.unwrap().unwrap();
        assert!(stored.wablas_schedule_id.is_none());
    }

    #[tokio::test]
    async fn cancel_not_found_counts_as_success() {
        let f = fixture();
        let created = f.svc.create(f.user, future_kontrol(), on()).await.unwrap();
        *f.gateway.cancel_mode.lock().unwrap() = CancelMode::NotFound;

        let out = f.svc.mark_done(f.user, created.kontrol.id, true).await.unwrap();
        assert!(out.warning.is_none());
        assert!(out.kontrol.wablas_schedule_id.is_none());
    }

    #[tokio::test]
    async fn failed_cancel_keeps_id_for_retry_but_marks_done() {
        let f = fixture();
        let created = f.svc.create(f.user, future_kontrol(), on()).await.unwrap();
        *f.gateway.cancel_mode.lock().unwrap() = CancelMode::Fail;

        let out = f.svc.mark_done(f.user, created.kontrol.id, true).await.unwrap();
        assert!(out.kontrol.is_done);
        assert!(out.warning.is_some());
        assert_eq!(out.kontrol.wablas_schedule_id.as_deref(), Some("sch-1"));

        *f.gateway.cancel_mode.lock().unwrap() = CancelMode::Ok;
        let out = f.svc.mark_done(f.user, created.kontrol.id, true).await.unwrap();
        assert!(out.warning.is_none());
        assert!(out.kontrol.wablas_schedule_id.is_none());
        assert_eq!(f.gateway.cancelled.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_succeeds_even_when_cancel_fails() {
        let f = fixture();
        let created = f.svc.create(f.user, future_kontrol(), on()).await.unwrap();
        *f.gateway.cancel_mode.lock().unwrap() = CancelMode::Fail;

        let warning = f.svc.delete(f.user, created.kontrol.id).await.unwrap();
        assert!(warning.is_some());
        assert!(f.store.find(f.user, created.kontrol.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_unknown_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.svc.delete(f.user, Uuid::new_v4()).await,
            Err(ApiError::NotFound(..))
        ));
        assert_eq!(f.gateway.calls(), 0);
    }

    #[tokio::test]
    async fn moving_appointment_reschedules_reminder() {
        let f = fixture();
        let created = f.svc.create(f.user, future_kontrol(), on()).await.unwrap();

        let out = f
            .svc
            .update(
                f.user,
                created.kontrol.id,
                KontrolUpdate {
                    patch: KontrolPatch {
                        waktu: Some(NaiveTime::from_hms_opt(13, 30, 0).unwrap()),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(out.warning.is_none());
        assert_eq!(out.kontrol.wablas_schedule_id.as_deref(), Some("sch-2"));
        assert_eq!(*f.gateway.cancelled.lock().unwrap(), vec!["sch-1".to_string()]);
    }

    #[tokio::test]
    async fn renaming_doctor_leaves_reminder_alone() {
        let f = fixture();
        let created = f.svc.create(f.user, future_kontrol(), on()).await.unwrap();

        let out = f
            .svc
            .update(
                f.user,
                created.kontrol.id,
                KontrolUpdate {
                    patch: KontrolPatch {
                        dokter: Some("dr. Andi".into()),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(out.kontrol.dokter, "dr. Andi");
        assert_eq!(out.kontrol.wablas_schedule_id.as_deref(), Some("sch-1"));
        assert_eq!(f.gateway.calls(), 1);
    }

    #[tokio::test]
    async fn disabling_reminder_on_update_cancels_it() {
        let f = fixture();
        let created = f.svc.create(f.user, future_kontrol(), on()).await.unwrap();

        let out = f
            .svc
            .update(
                f.user,
                created.kontrol.id,
                KontrolUpdate {
                    enable_reminder: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(out.kontrol.wablas_schedule_id.is_none());
        assert_eq!(f.gateway.scheduled.lock().unwrap().len(), 1);
        assert_eq!(f.gateway.cancelled.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn profile_lookup_failure_still_saves_appointment() {
        let f = fixture();
        *f.store.fail_phone_lookup.lock().unwrap() = true;

        let out = f.svc.create(f.user, future_kontrol(), on()).await.unwrap();
        assert!(out.warning.is_some());
        assert!(out.kontrol.wablas_schedule_id.is_none());
        assert_eq!(f.store.list(f.user).await.unwrap().len(), 1);
        assert_eq!(f.gateway.calls(), 0);
    }

    #[tokio::test]
    async fn unsaved_schedule_id_withdraws_reminder() {
        let f = fixture();
        *f.store.fail_schedule_write.lock().unwrap() = true;

        let out = f.svc.create(f.user, future_kontrol(), on()).await.unwrap();
        assert!(out.warning.is_some());
        assert!(out.kontrol.wablas_schedule_id.is_none());
        assert_eq!(*f.gateway.cancelled.lock().unwrap(), vec!["sch-1".to_string()]);
    }

    #[tokio::test]
    async fn failed_withdraw_reports_orphaned_reminder() {
        let f = fixture();
        *f.store.fail_schedule_write.lock().unwrap() = true;
        *f.gateway.cancel_mode.lock().unwrap() = CancelMode::Fail;

        let out = f.svc.create(f.user, future_kontrol(), on()).await.unwrap();
        let warning = out.warning.unwrap();
        assert!(warning.contains("masih terjadwal"));
        assert!(warning.contains("sch-1"));
        assert_eq!(f.store.list(f.user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn mark_done_survives_failed_local_clear() {
        let f = fixture();
        let created = f.svc.create(f.user, future_kontrol(), on()).await.unwrap();
        *f.store.fail_schedule_write.lock().unwrap() = true;

        let out = f.svc.mark_done(f.user, created.kontrol.id, true).await.unwrap();
        assert!(out.kontrol.is_done);
        assert!(out.warning.is_some());
        assert_eq!(out.kontrol.wablas_schedule_id.as_deref(), Some("sch-1"));

        // next attempt sees the reminder gone and clears the id
        *f.store.fail_schedule_write.lock().unwrap() = false;
        *f.gateway.cancel_mode.lock().unwrap() = CancelMode::NotFound;
        let out = f.svc.mark_done(f.user, created.kontrol.id, true).await.unwrap();
        assert!(out.warning.is_none());
        assert!(out.kontrol.wablas_schedule_id.is_none());
    }

    #[tokio::test]
    async fn moving_with_failed_cancel_does_not_double_schedule() {
        let f = fixture();
        let created = f.svc.create(f.user, future_kontrol(), on()).await.unwrap();
        *f.gateway.cancel_mode.lock().unwrap() = CancelMode::Fail;

        let out = f
            .svc
            .update(
                f.user,
                created.kontrol.id,
                KontrolUpdate {
                    patch: KontrolPatch {
                        tanggal: Some(NaiveDate::from_ymd_opt(2099, 4, 1).unwrap()),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(out.warning.is_some());
        assert_eq!(out.kontrol.wablas_schedule_id.as_deref(), Some("sch-1"));
        assert_eq!(out.kontrol.tanggal, NaiveDate::from_ymd_opt(2099, 4, 1).unwrap());
        assert_eq!(f.gateway.scheduled.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_treats_gateway_not_found_as_cancelled() {
        let f = fixture();
        let created = f.svc.create(f.user, future_kontrol(), on()).await.unwrap();
        *f.gateway.cancel_mode.lock().unwrap() = CancelMode::NotFound;

        let warning = f.svc.delete(f.user, created.kontrol.id).await.unwrap();
        assert!(warning.is_none());
        assert_eq!(*f.gateway.cancelled.lock().unwrap(), vec!["sch-1".to_string()]);
        assert!(f.store.find(f.user, created.kontrol.id).await.unwrap().is_none());
    }

    #[test]
    fn time_parsing() {
        assert!(parse_waktu("09:30").is_ok());
        assert!(parse_waktu("09:30:15").is_ok());
        assert!(parse_waktu("9.30").is_err());
        assert!(parse_tanggal("2025-02-30").is_err());
        assert_eq!(
            parse_tanggal(" 2025-02-28 ").unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
        );
    }
}
