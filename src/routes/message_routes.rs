// src/routes/message_routes.rs

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState},
    phone::{validate_phone, PhoneNumber, PhoneValidation},
    wablas::GatewayError,
};

const DEFAULT_TEST_MESSAGE: &str = "Tes pesan dari SmedBox. Jika pesan ini diterima, pengingat WhatsApp sudah aktif.";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/message/test/send", post(send_test_message))
        .route("/phone/validate", post(validate_phone_number))
}

#[derive(Debug, Deserialize)]
pub struct TestSendRequest {
    pub phone: String,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TestSendData {
    pub sent: bool,
    pub phone: String,
}

/// Unlike reminders, a diagnostic send reports gateway failures to the caller.
pub async fn send_test_message(
    State(state): State<AppState>,
    _auth: AuthContext,
    Json(req): Json<TestSendRequest>,
) -> Result<Json<ApiOk<TestSendData>>, ApiError> {
    let phone = PhoneNumber::parse(&req.phone)
        .map_err(|e| ApiError::BadRequest(e.code(), e.to_string()))?;
    let message = req
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_TEST_MESSAGE);

    state
        .gateway
        .send_message(&phone, message)
        .await
        .map_err(|e| match e {
            GatewayError::NotConfigured => {
                ApiError::Internal("Gateway WhatsApp belum dikonfigurasi".into())
            }
            GatewayError::Rejected { body, .. } => ApiError::Upstream(body),
            other => ApiError::Upstream(other.to_string()),
        })?;

    tracing::info!(phone = %phone, "test message sent");
    Ok(Json(ApiOk {
        data: TestSendData {
            sent: true,
            phone: phone.into_inner(),
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct ValidatePhoneRequest {
    pub phone: String,
}

pub async fn validate_phone_number(
    Json(req): Json<ValidatePhoneRequest>,
) -> Json<ApiOk<PhoneValidation>> {
    Json(ApiOk {
        data: validate_phone(&req.phone),
    })
}
