use anyhow::{ensure, Context, Result};
use std::ops::RangeInclusive;
use std::time::Duration;

use crate::platform::Platform;

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,
    /// Public base URL, used to build provider redirect URIs.
    pub base_url: String,
    /// Client app page that receives the post-callback redirect.
    pub return_url: String,

    // ── Database ────────────────────────────────────────────────────────
    pub database_url: String,

    // ── Crypto ──────────────────────────────────────────────────────────
    /// 32-byte base64-encoded master key for AES-256-GCM encryption.
    pub master_key: String,

    // ── Service-to-service auth ─────────────────────────────────────────
    pub auth_service_secret: String,

    // ── Tickets / timeouts ──────────────────────────────────────────────
    pub ticket_ttl: Duration,
    pub ticket_sweep_interval: Duration,
    pub http_timeout: Duration,

    // ── OAuth Provider Credentials ──────────────────────────────────────
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub meta_app_id: Option<String>,
    pub meta_app_secret: Option<String>,
    pub linkedin_client_id: Option<String>,
    pub linkedin_client_secret: Option<String>,
    pub x_client_id: Option<String>,
    pub x_client_secret: Option<String>,
    pub tiktok_client_key: Option<String>,
    pub tiktok_client_secret: Option<String>,

    // ── Publishing aggregator ───────────────────────────────────────────
    pub aggregator_base_url: Option<String>,
    pub aggregator_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8430".into())
                .parse()
                .context("Invalid PORT")?,
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8430".into()),
            return_url: std::env::var("RETURN_URL")
                .unwrap_or_else(|_| "http://localhost:3000/settings/connections".into()),

            database_url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL is required (PostgreSQL connection string)")?,
            master_key: std::env::var("MASTER_KEY")
                .context("MASTER_KEY is required (32 bytes, base64)")?,
            auth_service_secret: std::env::var("AUTH_SERVICE_SECRET")
                .context("AUTH_SERVICE_SECRET is required for service-to-service auth")?,

            ticket_ttl: secs_var("TICKET_TTL_SECS", 600, 1..=u64::MAX)?,
            ticket_sweep_interval: secs_var("TICKET_SWEEP_INTERVAL_SECS", 60, 1..=u64::MAX)?,
            // outbound calls sit on the user's redirect path
            http_timeout: secs_var("HTTP_TIMEOUT_SECS", 8, 1..=9)?,

            google_client_id: std::env::var("GOOGLE_CLIENT_ID").ok(),
            google_client_secret: std::env::var("GOOGLE_CLIENT_SECRET").ok(),
            meta_app_id: std::env::var("META_APP_ID").ok(),
            meta_app_secret: std::env::var("META_APP_SECRET").ok(),
            linkedin_client_id: std::env::var("LINKEDIN_CLIENT_ID").ok(),
            linkedin_client_secret: std::env::var("LINKEDIN_CLIENT_SECRET").ok(),
            x_client_id: std::env::var("X_CLIENT_ID").ok(),
            x_client_secret: std::env::var("X_CLIENT_SECRET").ok(),
            tiktok_client_key: std::env::var("TIKTOK_CLIENT_KEY").ok(),
            tiktok_client_secret: std::env::var("TIKTOK_CLIENT_SECRET").ok(),

            aggregator_base_url: std::env::var("AGGREGATOR_BASE_URL").ok(),
            aggregator_api_key: std::env::var("AGGREGATOR_API_KEY").ok(),
        })
    }

    /// Defaults suitable for tests: no providers, no aggregator, no database.
    pub fn for_tests() -> Self {
        Config {
            host: "127.0.0.1".into(),
            port: 0,
            base_url: "http://localhost:8430".into(),
            return_url: "http://localhost:3000/settings/connections".into(),
            database_url: String::new(),
            master_key: String::new(),
            auth_service_secret: "test-secret".into(),
            ticket_ttl: Duration::from_secs(600),
            ticket_sweep_interval: Duration::from_secs(60),
            http_timeout: Duration::from_secs(2),
            google_client_id: None,
            google_client_secret: None,
            meta_app_id: None,
            meta_app_secret: None,
            linkedin_client_id: None,
            linkedin_client_secret: None,
            x_client_id: None,
            x_client_secret: None,
            tiktok_client_key: None,
            tiktok_client_secret: None,
            aggregator_base_url: None,
            aggregator_api_key: None,
        }
    }

    /// Get the OAuth callback URL for a specific platform.
    pub fn callback_url(&self, platform: Platform) -> String {
        format!("{}/v1/social/callback/{}", self.base_url, platform)
    }
}

fn secs_var(name: &str, default: u64, allowed: RangeInclusive<u64>) -> Result<Duration> {
    parse_secs(name, std::env::var(name).ok().as_deref(), default, allowed)
}

fn parse_secs(
    name: &str,
    raw: Option<&str>,
    default: u64,
    allowed: RangeInclusive<u64>,
) -> Result<Duration> {
    let secs = match raw {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("Invalid {name} (expected seconds)"))?,
        None => default,
    };
    ensure!(
        allowed.contains(&secs),
        "Invalid {name}: {secs} is outside {}..={}",
        allowed.start(),
        allowed.end()
    );
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_url_uses_canonical_tag() {
        let config = Config::for_tests();
        assert_eq!(
            config.callback_url(Platform::X),
            "http://localhost:8430/v1/social/callback/x"
        );
    }

    #[test]
    fn test_secs_default_and_override() {
        assert_eq!(
            parse_secs("TICKET_TTL_SECS", None, 600, 1..=u64::MAX).unwrap(),
            Duration::from_secs(600)
        );
        assert_eq!(
            parse_secs("HTTP_TIMEOUT_SECS", Some("5"), 8, 1..=9).unwrap(),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_zero_sweep_interval_is_rejected() {
        let err = parse_secs("TICKET_SWEEP_INTERVAL_SECS", Some("0"), 60, 1..=u64::MAX).unwrap_err();
        assert!(err.to_string().contains("TICKET_SWEEP_INTERVAL_SECS"));
    }

    #[test]
    fn test_http_timeout_must_be_single_digit() {
        assert!(parse_secs("HTTP_TIMEOUT_SECS", Some("10"), 8, 1..=9).is_err());
        assert!(parse_secs("HTTP_TIMEOUT_SECS", Some("0"), 8, 1..=9).is_err());
        assert!(parse_secs("HTTP_TIMEOUT_SECS", Some("soon"), 8, 1..=9).is_err());
    }
}
