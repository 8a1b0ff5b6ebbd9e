use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub run_migrations: bool,
    pub wablas: WablasConfig,
    /// Offset of the clinic's local time from UTC, used to decide whether an
    /// appointment is still in the future when scheduling its reminder.
    pub reminder_utc_offset_hours: i32,
    pub iot_device_key: Option<String>,
}

#[derive(Clone, Debug)]
pub struct WablasConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub secret_key: Option<String>,
    pub timezone: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(24);
        let run_migrations = env::var("RUN_MIGRATIONS")
            .map(|s| matches!(s.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let wablas = WablasConfig {
            base_url: env::var("WABLAS_BASE_URL")
                .unwrap_or_else(|_| "https://jogja.wablas.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            token: non_empty_var("WABLAS_TOKEN"),
            secret_key: non_empty_var("WABLAS_SECRET_KEY"),
            timezone: env::var("WABLAS_TIMEZONE").unwrap_or_else(|_| "Asia/Jakarta".to_string()),
        };

        let reminder_utc_offset_hours = env::var("REMINDER_UTC_OFFSET_HOURS")
            .ok()
            .and_then(|s| s.parse::<i32>().ok())
            .filter(|h| (-12..=14).contains(h))
            .unwrap_or(7);

        if wablas.token.is_none() {
            tracing::warn!("WABLAS_TOKEN not set, WhatsApp reminders are disabled");
        }

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            run_migrations,
            wablas,
            reminder_utc_offset_hours,
            iot_device_key: non_empty_var("IOT_DEVICE_KEY"),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
