use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Typing indicator TTL in milliseconds.
    pub typing_ttl_ms: u64,
    /// Sweep interval for expired typing entries, milliseconds.
    pub typing_sweep_ms: u64,
    /// Hard cap for message history page size.
    pub history_max_limit: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| crate::error::AppError::Config("DATABASE_URL missing".into()))?;
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);
        let typing_ttl_ms = env::var("TYPING_TTL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);
        let typing_sweep_ms = env::var("TYPING_SWEEP_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(500);
        let history_max_limit = env::var("HISTORY_MAX_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(200);

        Ok(Self {
            database_url,
            port,
            typing_ttl_ms,
            typing_sweep_ms,
            history_max_limit,
        })
    }

    #[cfg(test)]
    pub fn test_defaults() -> Self {
        Self {
            database_url: "postgres://localhost/chat_test".into(),
            port: 3000,
            typing_ttl_ms: 3000,
            typing_sweep_ms: 500,
            history_max_limit: 200,
        }
    }
}
