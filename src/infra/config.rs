use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum::http::HeaderValue;
use env_helpers::get_env_default;
use secrecy::SecretString;
use strum::{Display, EnumString};

use super::error::InfraError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

pub struct StripeConfig {
    pub secret_key: SecretString,
    pub webhook_secret: SecretString,
    pub api_base: String,
}

pub struct FlutterwaveConfig {
    pub secret_key: SecretString,
    /// Shared secret Flutterwave echoes in the `verif-hash` header
    pub webhook_hash: SecretString,
    pub api_base: String,
}

pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub cors_origin: HeaderValue,
    pub run_migrations: bool,
    pub log_format: LogFormat,
    /// `None` leaves the provider disabled.
    pub stripe: Option<StripeConfig>,
    pub flutterwave: Option<FlutterwaveConfig>,
    /// Local payment simulation. Never enable in production.
    pub dummy_provider_enabled: bool,
    pub provider_timeout: Duration,
    pub provider_max_attempts: u32,
    pub provider_retry_backoff: Duration,
    pub plan_cache_ttl: Duration,
    /// Bearer token for `/api/admin`. Admin routes reject everything when unset.
    pub admin_api_token: Option<SecretString>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, InfraError> {
        let database_url = required("DATABASE_URL")?;

        let bind_addr: SocketAddr = get_env_default(
            "BIND_ADDR",
            SocketAddr::from((Ipv4Addr::LOCALHOST, 3001)),
        );
        let cors_origin_raw: String =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"));
        let cors_origin = HeaderValue::from_str(&cors_origin_raw).map_err(|_| {
            InfraError::ConfigInvalid {
                var: "CORS_ORIGIN",
                reason: "not a valid header value".into(),
            }
        })?;
        let run_migrations: bool = get_env_default("RUN_MIGRATIONS", false);
        let log_format: LogFormat = get_env_default("LOG_FORMAT", LogFormat::Pretty);

        let stripe = match (optional("STRIPE_SECRET_KEY"), optional("STRIPE_WEBHOOK_SECRET")) {
            (Some(secret_key), Some(webhook_secret)) => Some(StripeConfig {
                secret_key: SecretString::new(secret_key.into()),
                webhook_secret: SecretString::new(webhook_secret.into()),
                api_base: get_env_default(
                    "STRIPE_API_BASE",
                    String::from("https://api.stripe.com"),
                ),
            }),
            (None, None) => None,
            _ => {
                return Err(InfraError::ConfigInvalid {
                    var: "STRIPE_WEBHOOK_SECRET",
                    reason: "STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET must be set together"
                        .into(),
                });
            }
        };

        let flutterwave = match (
            optional("FLUTTERWAVE_SECRET_KEY"),
            optional("FLUTTERWAVE_WEBHOOK_HASH"),
        ) {
            (Some(secret_key), Some(webhook_hash)) => Some(FlutterwaveConfig {
                secret_key: SecretString::new(secret_key.into()),
                webhook_hash: SecretString::new(webhook_hash.into()),
                api_base: get_env_default(
                    "FLUTTERWAVE_API_BASE",
                    String::from("https://api.flutterwave.com"),
                ),
            }),
            (None, None) => None,
            _ => {
                return Err(InfraError::ConfigInvalid {
                    var: "FLUTTERWAVE_WEBHOOK_HASH",
                    reason:
                        "FLUTTERWAVE_SECRET_KEY and FLUTTERWAVE_WEBHOOK_HASH must be set together"
                            .into(),
                });
            }
        };

        let dummy_provider_enabled: bool = get_env_default("DUMMY_PROVIDER_ENABLED", false);
        let provider_timeout_secs: u64 = get_env_default("PROVIDER_TIMEOUT_SECS", 10);
        let provider_max_attempts: u32 = get_env_default("PROVIDER_MAX_ATTEMPTS", 3);
        let provider_retry_backoff_ms: u64 = get_env_default("PROVIDER_RETRY_BACKOFF_MS", 250);
        let plan_cache_ttl_secs: u64 = get_env_default("PLAN_CACHE_TTL_SECS", 60);
        let admin_api_token =
            optional("ADMIN_API_TOKEN").map(|token| SecretString::new(token.into()));

        Ok(Self {
            database_url,
            bind_addr,
            cors_origin,
            run_migrations,
            log_format,
            stripe,
            flutterwave,
            dummy_provider_enabled,
            provider_timeout: Duration::from_secs(provider_timeout_secs),
            provider_max_attempts: provider_max_attempts.max(1),
            provider_retry_backoff: Duration::from_millis(provider_retry_backoff_ms),
            plan_cache_ttl: Duration::from_secs(plan_cache_ttl_secs),
            admin_api_token,
        })
    }
}

fn required(var: &'static str) -> Result<String, InfraError> {
    optional(var).ok_or(InfraError::ConfigMissing { var })
}

/// Unset and empty are treated alike.
fn optional(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
