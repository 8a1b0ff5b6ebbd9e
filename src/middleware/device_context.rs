use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::constant_time_eq;
use crate::error::ApiError;
use crate::models::AppState;

pub const DEVICE_KEY_HEADER: &str = "x-device-key";

/// A SmedBox dispenser, authenticated by the shared device key.
#[derive(Debug, Clone, Copy)]
pub struct DeviceContext;

impl FromRequestParts<AppState> for DeviceContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let presented = parts
            .headers
            .get(DEVICE_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let expected = state.iot_device_key.clone();

        async move {
            let Some(expected) = expected else {
                return Err(ApiError::Forbidden(
                    "DEVICE_ACCESS_DISABLED",
                    "Akses perangkat IoT belum dikonfigurasi".into(),
                ));
            };
            match presented {
                Some(key) if constant_time_eq(&key, &expected) => Ok(DeviceContext),
                _ => Err(ApiError::Unauthorized(
                    "INVALID_DEVICE_KEY",
                    "Kunci perangkat tidak valid".into(),
                )),
            }
        }
    }
}
