use std::{net::SocketAddr, time::Duration};

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use url::Url;

use super::error::InfraError;

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    /// When set, rate limiting is shared across instances through Redis.
    pub redis_url: Option<String>,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max_requests: u64,
    /// Whether to trust X-Forwarded-For headers. Set to true when behind a reverse proxy.
    /// SECURITY: Only enable this when the API is not directly exposed to the internet.
    pub trust_proxy: bool,
    pub cors_origin: HeaderValue,
    pub toyyibpay_webhook_secret: SecretString,
    /// Deprecated GET callbacks. Off unless explicitly enabled, and always signed.
    pub webhook_accept_get: bool,
    pub extend_subscription_url: Url,
    pub service_role_key: SecretString,
    pub toyyibpay_api_url: Url,
    pub toyyibpay_secret_key: SecretString,
    pub toyyibpay_category_code: String,
    pub status_poll_interval: Duration,
    pub status_poll_max_attempts: u32,
    pub notification_ttl: chrono::Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, InfraError> {
        let bind_addr: SocketAddr = get_env_default::<String>("BIND_ADDR", "127.0.0.1:3001".into())
            .parse()
            .map_err(|_| InfraError::ConfigInvalid { var: "BIND_ADDR" })?;
        let database_url: String = get_env("DATABASE_URL");
        let redis_url: Option<String> = std::env::var("REDIS_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let rate_limit_window_secs: u64 = get_env_default("RATE_LIMIT_WINDOW_SECS", 60);
        let rate_limit_max_requests: u64 = get_env_default("RATE_LIMIT_MAX_REQUESTS", 10);
        // Default to false for security - must explicitly enable when behind a trusted proxy
        let trust_proxy: bool = get_env_default("TRUST_PROXY", false);
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .map_err(|_| InfraError::ConfigInvalid { var: "CORS_ORIGIN" })?;

        let toyyibpay_webhook_secret =
            SecretString::new(get_env::<String>("TOYYIBPAY_WEBHOOK_SECRET").into());
        let webhook_accept_get: bool = get_env_default("WEBHOOK_ACCEPT_GET", false);

        let extend_subscription_url: Url = get_env::<String>("EXTEND_SUBSCRIPTION_URL")
            .parse()
            .map_err(|_| InfraError::ConfigInvalid {
                var: "EXTEND_SUBSCRIPTION_URL",
            })?;
        let service_role_key = SecretString::new(get_env::<String>("SERVICE_ROLE_KEY").into());

        let toyyibpay_api_url: Url =
            get_env_default("TOYYIBPAY_API_URL", String::from("https://dev.toyyibpay.com"))
                .parse()
                .map_err(|_| InfraError::ConfigInvalid {
                    var: "TOYYIBPAY_API_URL",
                })?;
        let toyyibpay_secret_key =
            SecretString::new(get_env::<String>("TOYYIBPAY_SECRET_KEY").into());
        let toyyibpay_category_code: String =
            get_env_default("TOYYIBPAY_CATEGORY_CODE", String::new());

        let status_poll_interval_ms: u64 = get_env_default("STATUS_POLL_INTERVAL_MS", 30_000);
        let status_poll_max_attempts: u32 = get_env_default("STATUS_POLL_MAX_ATTEMPTS", 40);
        let notification_ttl_days: i64 = get_env_default("NOTIFICATION_TTL_DAYS", 30);

        if rate_limit_window_secs == 0 {
            return Err(InfraError::ConfigInvalid {
                var: "RATE_LIMIT_WINDOW_SECS",
            });
        }
        if status_poll_interval_ms == 0 {
            return Err(InfraError::ConfigInvalid {
                var: "STATUS_POLL_INTERVAL_MS",
            });
        }

        Ok(Self {
            bind_addr,
            database_url,
            redis_url,
            rate_limit_window_secs,
            rate_limit_max_requests,
            trust_proxy,
            cors_origin,
            toyyibpay_webhook_secret,
            webhook_accept_get,
            extend_subscription_url,
            service_role_key,
            toyyibpay_api_url,
            toyyibpay_secret_key,
            toyyibpay_category_code,
            status_poll_interval: Duration::from_millis(status_poll_interval_ms),
            status_poll_max_attempts,
            notification_ttl: chrono::Duration::days(notification_ttl_days),
        })
    }
}
