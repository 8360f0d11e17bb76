use std::env;
use std::time::Duration;

// Default schedule values (can be overridden by environment variables)
const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;
const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 60;
const DEFAULT_AUTO_REGISTER_GRACE_SECS: u64 = 10;

const DEFAULT_AUTHORITY_BASE_URL: &str = "https://api.sunat.gob.pe/v1";
const DEFAULT_BACKEND_BASE_URL: &str = "http://localhost:8080/api";

/// Tunables for the session engine. Built once at the application root
/// and handed to [`crate::session::LedgerSession`].
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub authority_base_url: String,
    pub backend_base_url: String,
    pub poll_interval: Duration,
    pub poll_max_attempts: u32,
    pub auto_register_grace: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            authority_base_url: DEFAULT_AUTHORITY_BASE_URL.to_string(),
            backend_base_url: DEFAULT_BACKEND_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            poll_max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            auto_register_grace: Duration::from_secs(DEFAULT_AUTO_REGISTER_GRACE_SECS),
        }
    }
}

impl CoreConfig {
    /// Reads overrides from the environment. Loads `.env` first and fails
    /// silently if the file does not exist.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            authority_base_url: env::var("SUNAT_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_AUTHORITY_BASE_URL.to_string()),
            backend_base_url: env::var("BACKEND_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BACKEND_BASE_URL.to_string()),
            poll_interval: Duration::from_secs(env_u64(
                "DETAIL_POLL_INTERVAL_SECONDS",
                DEFAULT_POLL_INTERVAL_SECS,
            )),
            poll_max_attempts: env_u32("DETAIL_POLL_MAX_ATTEMPTS", DEFAULT_POLL_MAX_ATTEMPTS),
            auto_register_grace: Duration::from_secs(env_u64(
                "AUTO_REGISTER_GRACE_SECONDS",
                DEFAULT_AUTO_REGISTER_GRACE_SECS,
            )),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .map(|val| val.parse::<u64>().unwrap_or(default))
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .map(|val| val.parse::<u32>().unwrap_or(default))
        .unwrap_or(default)
}
