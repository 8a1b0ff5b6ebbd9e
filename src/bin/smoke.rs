//! End-to-end smoke run against a live SmedBox API.
//!
//! ```text
//! SMOKE_BASE_URL=http://127.0.0.1:8080 SMOKE_USERNAME=smoke SMOKE_PASSWORD=... \
//! SMOKE_DEVICE_KEY=... cargo run --bin smoke
//! ```

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, anyhow, bail};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

const TOKEN_REUSE_WINDOW: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone)]
struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(250),
        }
    }
}

/// `base * 2^attempt`, attempt counted from zero.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
}

#[derive(Debug)]
enum StepError {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StepError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(StepError::Fatal(e)) => return Err(e.context(format!("{label}: failed"))),
            Err(StepError::Retryable(e)) => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(e.context(format!("{label}: gave up after {attempt} attempts")));
                }
                let delay = backoff_delay(policy.base_delay, attempt - 1);
                tracing::warn!("{label}: attempt {attempt} failed ({e:#}), retrying in {delay:?}");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// 5xx and 429 are retried; client errors not listed in `allowed` end the step.
fn check_status(status: StatusCode, allowed: &[StatusCode], body: &Value) -> Result<(), StepError> {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return Err(StepError::Retryable(anyhow!("{status}: {body}")));
    }
    if status.is_client_error() && !allowed.contains(&status) {
        return Err(StepError::Fatal(anyhow!("{status}: {body}")));
    }
    Ok(())
}

/// Bearer token owned by one smoke run.
#[derive(Debug, Clone)]
struct Session {
    token: String,
    obtained_at: Instant,
}

impl Session {
    fn is_fresh(&self) -> bool {
        self.obtained_at.elapsed() < TOKEN_REUSE_WINDOW
    }
}

struct SmokeClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    device_key: Option<String>,
    policy: RetryPolicy,
    session: Option<Session>,
}

impl SmokeClient {
    fn from_env() -> anyhow::Result<Self> {
        let var = |k: &str| std::env::var(k).with_context(|| format!("{k} must be set"));
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(20))
                .build()?,
            base_url: std::env::var("SMOKE_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8080".into())
                .trim_end_matches('/')
                .to_string(),
            username: var("SMOKE_USERNAME")?,
            password: var("SMOKE_PASSWORD")?,
            device_key: std::env::var("SMOKE_DEVICE_KEY").ok(),
            policy: RetryPolicy::default(),
            session: None,
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        bearer: Option<&str>,
        device: bool,
        body: Option<&Value>,
        allowed: &[StatusCode],
    ) -> Result<(StatusCode, Value), StepError> {
        let mut req = self.http.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }
        if device {
            if let Some(key) = &self.device_key {
                req = req.header("x-device-key", key);
            }
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| StepError::Retryable(anyhow!(e)))?;
        let status = resp.status();
        let value = resp.json::<Value>().await.unwrap_or(Value::Null);

        check_status(status, allowed, &value)?;
        Ok((status, value))
    }

    async fn call(
        &self,
        label: &str,
        method: Method,
        path: &str,
        bearer: Option<&str>,
        device: bool,
        body: Option<Value>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        self.call_allowing(label, method, path, bearer, device, body, &[])
            .await
    }

    /// Like [`Self::call`], but `allowed` client errors are returned to the
    /// caller instead of failing the step.
    async fn call_allowing(
        &self,
        label: &str,
        method: Method,
        path: &str,
        bearer: Option<&str>,
        device: bool,
        body: Option<Value>,
        allowed: &[StatusCode],
    ) -> anyhow::Result<(StatusCode, Value)> {
        with_retry(&self.policy, label, || {
            self.send(method.clone(), path, bearer, device, body.as_ref(), allowed)
        })
        .await
    }

    async fn token(&mut self) -> anyhow::Result<String> {
        if let Some(session) = self.session.as_ref().filter(|s| s.is_fresh()) {
            return Ok(session.token.clone());
        }

        let register = json!({
            "username": self.username,
            "display_name": "Smoke Test",
            "password": self.password,
        });
        let (status, _) = self
            .call_allowing(
                "register",
                Method::POST,
                "/v1/api/auth/register",
                None,
                false,
                Some(register),
                &[StatusCode::CONFLICT],
            )
            .await?;
        if !(status.is_success() || status == StatusCode::CONFLICT) {
            bail!("register returned {status}");
        }

        let login = json!({ "username": self.username, "password": self.password });
        let (status, body) = self
            .call("login", Method::POST, "/v1/api/auth/login", None, false, Some(login))
            .await?;
        if !status.is_success() {
            bail!("login returned {status}: {body}");
        }
        let token = body["data"]["access_token"]
            .as_str()
            .ok_or_else(|| anyhow!("login response has no access_token"))?
            .to_string();

        self.session = Some(Session {
            token: token.clone(),
            obtained_at: Instant::now(),
        });
        Ok(token)
    }
}

fn expect_ok(label: &str, status: StatusCode, body: &Value) -> anyhow::Result<()> {
    if status.is_success() {
        tracing::info!("{label}: ok");
        Ok(())
    } else {
        bail!("{label}: {status} {body}")
    }
}

async fn jadwal_flow(client: &mut SmokeClient) -> anyhow::Result<()> {
    let token = client.token().await?;

    let (status, me) = client
        .call("me", Method::GET, "/v1/api/auth/me", Some(&token), false, None)
        .await?;
    expect_ok("me", status, &me)?;
    let user_id = me["data"]["user"]["user_id"].as_str().unwrap_or_default().to_string();

    let (status, created) = client
        .call(
            "jadwal create",
            Method::POST,
            "/v1/api/jadwal/input",
            Some(&token),
            false,
            Some(json!({
                "nama_pasien": "Smoke",
                "nama_obat": "Paracetamol",
                "dosis_obat": "500 mg",
                "jumlah_obat": 2,
                "jam_awal": ["07:00"],
                "jam_berakhir": ["08:00"],
                "slot_obat": "9",
                "kategori": "sesudah makan"
            })),
        )
        .await?;
    expect_ok("jadwal create", status, &created)?;
    let id = created["data"]["id"]
        .as_str()
        .ok_or_else(|| anyhow!("jadwal create returned no id"))?
        .to_string();

    if client.device_key.is_some() {
        let (status, listed) = client
            .call(
                "jadwal iot list",
                Method::GET,
                &format!("/v1/api/jadwal/get-for-iot?user_id={user_id}"),
                None,
                true,
                None,
            )
            .await?;
        expect_ok("jadwal iot list", status, &listed)?;

        let mut last = Value::Null;
        for i in 0..4 {
            let (status, body) = client
                .call(
                    "stock iot",
                    Method::PUT,
                    "/v1/api/jadwal/update-stock-obat-iot",
                    None,
                    true,
                    Some(json!({ "id": id })),
                )
                .await?;
            expect_ok(&format!("stock iot #{i}"), status, &body)?;
            last = body;
        }
        let remaining = last["data"]["jumlah_obat"].as_i64();
        if remaining != Some(0) {
            bail!("stock after over-decrement should be 0, got {remaining:?}");
        }
    } else {
        tracing::warn!("SMOKE_DEVICE_KEY not set, skipping IoT steps");
    }

    let (status, body) = client
        .call(
            "stock web",
            Method::PUT,
            "/v1/api/jadwal/update-stock-obat-web",
            Some(&token),
            false,
            Some(json!({ "id": id, "newStock": 10 })),
        )
        .await?;
    expect_ok("stock web", status, &body)?;
    if body["data"]["jumlah_obat"].as_i64() != Some(10) {
        bail!("web stock update not applied: {body}");
    }

    let (status, body) = client
        .call_allowing(
            "stock web negative",
            Method::PUT,
            "/v1/api/jadwal/update-stock-obat-web",
            Some(&token),
            false,
            Some(json!({ "id": id, "newStock": -1 })),
            &[StatusCode::BAD_REQUEST],
        )
        .await?;
    if status != StatusCode::BAD_REQUEST {
        bail!("negative stock should be rejected, got {status}: {body}");
    }

    let (status, body) = client
        .call(
            "jadwal delete",
            Method::DELETE,
            &format!("/v1/api/jadwal/delete/{id}"),
            Some(&token),
            false,
            None,
        )
        .await?;
    expect_ok("jadwal delete", status, &body)
}

async fn kontrol_flow(client: &mut SmokeClient) -> anyhow::Result<()> {
    let token = client.token().await?;
    let tanggal = (chrono::Utc::now() + chrono::Duration::days(30))
        .format("%Y-%m-%d")
        .to_string();

    let (status, created) = client
        .call(
            "kontrol create",
            Method::POST,
            "/v1/api/kontrol/create-kontrol",
            Some(&token),
            false,
            Some(json!({
                "tanggal": tanggal,
                "waktu": "09:00",
                "dokter": "dr. Smoke",
                "nama_pasien": "Smoke",
                "enableReminder": false
            })),
        )
        .await?;
    expect_ok("kontrol create", status, &created)?;
    if !created["data"]["wablas_schedule_id"].is_null() {
        bail!("reminder scheduled although disabled: {created}");
    }
    let id = created["data"]["id"]
        .as_str()
        .ok_or_else(|| anyhow!("kontrol create returned no id"))?
        .to_string();

    let (status, done) = client
        .call(
            "kontrol done",
            Method::PATCH,
            "/v1/api/kontrol/done",
            Some(&token),
            false,
            Some(json!({ "id": id, "isDone": true })),
        )
        .await?;
    expect_ok("kontrol done", status, &done)?;
    if done["data"]["isDone"] != Value::Bool(true) {
        bail!("kontrol not marked done: {done}");
    }

    let (status, body) = client
        .call(
            "kontrol delete",
            Method::DELETE,
            &format!("/v1/api/kontrol/delete/{id}"),
            Some(&token),
            false,
            None,
        )
        .await?;
    expect_ok("kontrol delete", status, &body)
}

async fn phone_flow(client: &mut SmokeClient) -> anyhow::Result<()> {
    for (raw, valid) in [("081234567890", true), ("021567890123", false)] {
        let (status, body) = client
            .call(
                "phone validate",
                Method::POST,
                "/v1/api/phone/validate",
                None,
                false,
                Some(json!({ "phone": raw })),
            )
            .await?;
        expect_ok("phone validate", status, &body)?;
        if body["data"]["isValid"] != Value::Bool(valid) {
            bail!("phone {raw}: expected isValid={valid}, got {body}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let mut client = SmokeClient::from_env()?;

    let (status, health) = client
        .call("health", Method::GET, "/health", None, false, None)
        .await?;
    expect_ok("health", status, &health)?;

    phone_flow(&mut client).await?;
    jadwal_flow(&mut client).await?;
    kontrol_flow(&mut client).await?;

    tracing::info!("smoke run passed");
    Ok(())
}
