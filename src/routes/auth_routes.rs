// src/routes/auth_routes.rs

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post, put},
};
use chrono::{Duration, Utc};

use crate::{
    auth::{generate_access_token, hash_access_token, hash_password, verify_password},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::*,
    phone::PhoneNumber,
};

const REMEMBER_ME_TTL_HOURS: i64 = 24 * 30;
const MIN_PASSWORD_LEN: usize = 8;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
        .route("/profile", put(update_profile))
}

fn validate_username(username: &str) -> Result<String, ApiError> {
    let u = username.trim();
    if u.chars().count() < 3 {
        return Err(ApiError::validation("Username minimal 3 karakter"));
    }
    if !u
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '@'))
    {
        return Err(ApiError::validation(
            "Username hanya boleh berisi huruf, angka, titik, garis bawah, strip, atau @",
        ));
    }
    Ok(u.to_ascii_lowercase())
}

fn validate_password(pw: &str) -> Result<(), ApiError> {
    if pw.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation("Password minimal 8 karakter"));
    }
    Ok(())
}

fn normalize_optional_phone(raw: Option<&str>) -> Result<Option<String>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => PhoneNumber::parse(raw)
            .map(|p| Some(p.into_inner()))
            .map_err(|e| ApiError::BadRequest(e.code(), e.to_string())),
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ApiOk<UserProfile>>, ApiError> {
    let username = validate_username(&req.username)?;
    validate_password(&req.password)?;
    let display_name = req.display_name.trim();
    if display_name.is_empty() {
        return Err(ApiError::validation("Nama wajib diisi"));
    }
    let no_hp = normalize_optional_phone(req.no_hp.as_deref())?;

    let pw_hash = hash_password(&req.password).map_err(ApiError::Internal)?;

    let user: UserProfile = sqlx::query_as::<_, UserProfile>(
        r#"
        INSERT INTO smedbox_user (username, display_name, no_hp, password_hash)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (username) DO NOTHING
        RETURNING user_id, username, display_name, no_hp
        "#,
    )
    .bind(&username)
    .bind(display_name)
    .bind(no_hp.as_deref())
    .bind(&pw_hash)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::Conflict("USERNAME_TAKEN", "Username sudah digunakan".into()))?;

    tracing::info!(user_id = %user.user_id, "user registered");
    Ok(Json(ApiOk { data: user }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiOk<LoginResponseData>>, ApiError> {
    let username = req.username.trim().to_ascii_lowercase();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Username dan password wajib diisi"));
    }

    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT user_id, username, display_name, no_hp, password_hash, is_active
        FROM smedbox_user
        WHERE username = $1
        "#,
    )
    .bind(&username)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::invalid_credentials)?;

    if !user.is_active {
        return Err(ApiError::Forbidden("FORBIDDEN", "Akun dinonaktifkan".into()));
    }

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::invalid_credentials());
    }

    let access_token = generate_access_token();
    let token_hash = hash_access_token(&access_token);

    let ttl_hours = if req.remember_me.unwrap_or(false) {
        REMEMBER_ME_TTL_HOURS
    } else {
        state.session_ttl_hours
    };
    let expires_at = Utc::now() + Duration::hours(ttl_hours);

    let session: SessionTokenRow = sqlx::query_as::<_, SessionTokenRow>(
        r#"
        INSERT INTO session_token
            (user_id, session_token_hash, device_name, expires_at)
        VALUES
            ($1, $2, $3, $4)
        RETURNING session_token_id, expires_at
        "#,
    )
    .bind(user.user_id)
    .bind(&token_hash)
    .bind(req.device_name.as_deref())
    .bind(expires_at)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: LoginResponseData {
            access_token,
            expires_at: session.expires_at,
            user: UserProfile {
                user_id: user.user_id,
                username: user.username,
                display_name: user.display_name,
                no_hp: user.no_hp,
            },
        },
    }))
}

async fn load_profile(state: &AppState, auth: &AuthContext) -> Result<UserProfile, ApiError> {
    sqlx::query_as::<_, UserProfile>(
        r#"
        SELECT user_id, username, display_name, no_hp
        FROM smedbox_user
        WHERE user_id = $1 AND is_active = true
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::session_expired)
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<MeResponseData>>, ApiError> {
    let user = load_profile(&state, &auth).await?;

    let session: SessionTokenRow = sqlx::query_as::<_, SessionTokenRow>(
        r#"
        SELECT session_token_id, expires_at
        FROM session_token
        WHERE session_token_id = $1
          AND user_id = $2
          AND revoked_at IS NULL
          AND expires_at > now()
        "#,
    )
    .bind(auth.session_token_id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::session_expired)?;

    Ok(Json(ApiOk {
        data: MeResponseData {
            user,
            session: SessionInfo {
                session_token_id: session.session_token_id,
                expires_at: session.expires_at,
            },
        },
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let rows = sqlx::query(
        r#"
        UPDATE session_token
        SET revoked_at = now()
        WHERE session_token_id = $1
          AND user_id = $2
          AND revoked_at IS NULL
        "#,
    )
    .bind(auth.session_token_id)
    .bind(auth.user_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if rows.rows_affected() == 0 {
        return Err(ApiError::session_expired());
    }

    Ok(Json(ApiOk::ok()))
}

/// Updates display name and the WhatsApp number used for kontrol reminders.
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ApiOk<UserProfile>>, ApiError> {
    let existing = load_profile(&state, &auth).await?;

    let display_name = match req.display_name.as_deref().map(str::trim) {
        Some("") => return Err(ApiError::validation("Nama wajib diisi")),
        Some(name) => name.to_string(),
        None => existing.display_name,
    };
    let no_hp = match req.no_hp {
        Some(raw) => normalize_optional_phone(raw.as_deref())?,
        None => existing.no_hp,
    };

    let user: UserProfile = sqlx::query_as::<_, UserProfile>(
        r#"
        UPDATE smedbox_user
        SET display_name = $2, no_hp = $3
        WHERE user_id = $1
        RETURNING user_id, username, display_name, no_hp
        "#,
    )
    .bind(auth.user_id)
    .bind(&display_name)
    .bind(no_hp.as_deref())
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: user }))
}
