//! WhatsApp reminder gateway backed by the Wablas HTTP API.
//!
//! Wablas wants `token.secret_key` in `Authorization` when creating reminders
//! or sending messages, but only the bare `token` when deleting a reminder.
//! Callers never see that difference; they talk to [`ReminderGateway`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::{StatusCode, header::AUTHORIZATION};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::WablasConfig;
use crate::phone::PhoneNumber;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const REMINDER_TITLE: &str = "SmedBox Reminder";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("WhatsApp gateway is not configured")]
    NotConfigured,
    /// The reminder no longer exists remotely (already sent or deleted).
    #[error("reminder not found on gateway")]
    NotFound,
    #[error("gateway rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("gateway response missing {0}")]
    InvalidResponse(&'static str),
    #[error("gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait ReminderGateway: Send + Sync {
    /// Schedules `message` for delivery at `send_at` (gateway-local time).
    /// Returns the gateway's schedule id.
    async fn schedule_message(
        &self,
        phone: &PhoneNumber,
        send_at: NaiveDateTime,
        message: &str,
    ) -> Result<String, GatewayError>;

    async fn cancel_message(&self, schedule_id: &str) -> Result<(), GatewayError>;

    async fn send_message(&self, phone: &PhoneNumber, message: &str) -> Result<(), GatewayError>;
}

#[derive(Debug, Deserialize)]
struct WablasEnvelope {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Clone)]
pub struct WablasClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    secret_key: Option<String>,
    timezone: String,
}

impl WablasClient {
    pub fn new(cfg: &WablasConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            token: cfg.token.clone(),
            secret_key: cfg.secret_key.clone(),
            timezone: cfg.timezone.clone(),
        })
    }

    fn token(&self) -> Result<&str, GatewayError> {
        self.token.as_deref().ok_or(GatewayError::NotConfigured)
    }

    /// `Authorization` value for reminder creation and message sending.
    fn create_auth(&self) -> Result<String, GatewayError> {
        let token = self.token()?;
        Ok(match self.secret_key.as_deref() {
            Some(secret) => format!("{token}.{secret}"),
            None => token.to_string(),
        })
    }

    /// `Authorization` value for reminder deletion.
    fn delete_auth(&self) -> Result<String, GatewayError> {
        Ok(self.token()?.to_string())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_envelope(resp: reqwest::Response) -> Result<(StatusCode, WablasEnvelope, String), GatewayError> {
        let status = resp.status();
        let body = resp.text().await?;
        let envelope = serde_json::from_str::<WablasEnvelope>(&body).unwrap_or(WablasEnvelope {
            status: false,
            message: None,
            data: None,
        });
        Ok((status, envelope, body))
    }
}

fn schedule_id_from(data: Option<&Value>) -> Option<String> {
    let data = data?;
    // data is either the reminder object or a one-element list of them
    let item = match data {
        Value::Array(items) => items.first()?,
        other => other,
    };
    match item.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn looks_like_not_found(message: Option<&str>) -> bool {
    message
        .map(|m| {
            let m = m.to_ascii_lowercase();
            m.contains("not found") || m.contains("tidak ditemukan")
        })
        .unwrap_or(false)
}

#[async_trait]
impl ReminderGateway for WablasClient {
    async fn schedule_message(
        &self,
        phone: &PhoneNumber,
        send_at: NaiveDateTime,
        message: &str,
    ) -> Result<String, GatewayError> {
        let auth = self.create_auth()?;
        let payload = json!({
            "phone": phone.as_str(),
            "start_date": send_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            "message": message,
            "title": REMINDER_TITLE,
            "timezone": self.timezone,
        });

        let resp = self
            .http
            .post(self.url("/api/reminder"))
            .header(AUTHORIZATION, auth)
            .json(&payload)
            .send()
            .await?;

        let (status, envelope, body) = Self::read_envelope(resp).await?;
        if !status.is_success() || !envelope.status {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        schedule_id_from(envelope.data.as_ref()).ok_or(GatewayError::InvalidResponse("data.id"))
    }

    async fn cancel_message(&self, schedule_id: &str) -> Result<(), GatewayError> {
        let auth = self.delete_auth()?;

        let resp = self
            .http
            .delete(self.url(&format!("/api/reminder/{schedule_id}")))
            .header(AUTHORIZATION, auth)
            .send()
            .await?;

        let (status, envelope, body) = Self::read_envelope(resp).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound);
        }
        if status.is_success() && envelope.status {
            return Ok(());
        }
        if looks_like_not_found(envelope.message.as_deref()) {
            return Err(GatewayError::NotFound);
        }
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    async fn send_message(&self, phone: &PhoneNumber, message: &str) -> Result<(), GatewayError> {
        let auth = self.create_auth()?;

        let resp = self
            .http
            .post(self.url("/api/send-message"))
            .header(AUTHORIZATION, auth)
            .json(&json!({ "phone": phone.as_str(), "message": message }))
            .send()
            .await?;

        let (status, envelope, body) = Self::read_envelope(resp).await?;
        if status.is_success() && envelope.status {
            Ok(())
        } else {
            Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}
