use std::env;
use std::time::Duration;

use crate::utils::fallback::DEFAULT_ATTEMPT_TIMEOUT_MS;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    pub data_backend: DataBackend,
    pub companion_api_url: Option<String>,
    pub fallback_attempt_timeout_ms: u64,
    pub companion_timeout_ms: u64,
}

/// Where community data is read from and written to.
#[derive(Debug, Clone)]
pub enum DataBackend {
    /// Direct connection to the Postgres instance behind Supabase
    Postgres { database_url: String },
    /// Supabase auto-generated REST interface (PostgREST)
    Supabase { url: String, api_key: String },
    /// In-process store, for local development without credentials
    Memory,
}

impl DataBackend {
    pub fn name(&self) -> &'static str {
        match self {
            DataBackend::Postgres { .. } => "postgres",
            DataBackend::Supabase { .. } => "supabase",
            DataBackend::Memory => "memory",
        }
    }
}

/// Signing secret used when `SUPABASE_JWT_SECRET` is unset. Only safe with the memory backend.
pub const DEV_JWT_SECRET: &str = "dev-secret-change-in-production";

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_key = non_empty_var("SUPABASE_SERVICE_ROLE_KEY")
            .or_else(|| non_empty_var("SUPABASE_ANON_KEY"));

        let data_backend = match (non_empty_var("DATABASE_URL"), non_empty_var("SUPABASE_URL"), supabase_key) {
            (Some(database_url), _, _) => DataBackend::Postgres { database_url },
            (None, Some(url), Some(api_key)) => DataBackend::Supabase { url, api_key },
            _ => DataBackend::Memory,
        };

        Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("PORT")
                .or_else(|_| env::var("SERVER_PORT"))
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000),
            jwt_secret: non_empty_var("SUPABASE_JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string()),
            data_backend,
            companion_api_url: non_empty_var("COMPANION_API_URL"),
            fallback_attempt_timeout_ms: env::var("FALLBACK_ATTEMPT_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_ATTEMPT_TIMEOUT_MS),
            companion_timeout_ms: env::var("COMPANION_API_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_ATTEMPT_TIMEOUT_MS),
        }
    }

    /// True when tokens for a real backend would be verified with the public development secret.
    pub fn uses_dev_jwt_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET && !matches!(self.data_backend, DataBackend::Memory)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn companion_timeout(&self) -> Duration {
        Duration::from_millis(self.companion_timeout_ms)
    }
}
