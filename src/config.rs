use std::{str::FromStr, time::Duration};

use anyhow::{anyhow, Context};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub expires_in: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("unknown STORAGE_BACKEND {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let storage = match get("STORAGE_BACKEND") {
            Some(v) => v.parse()?,
            None => StorageBackend::Postgres,
        };
        let database_url = get("DATABASE_URL");
        if storage == StorageBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL is required for the postgres backend");
        }

        let jwt = JwtConfig {
            secret: get("JWT_SECRET").context("JWT_SECRET is required")?,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "fintrack".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "fintrack-users".into()),
            expires_in: parse_duration(get("JWT_EXPIRES_IN").as_deref().unwrap_or("7d"))
                .context("JWT_EXPIRES_IN")?,
        };
        if jwt.expires_in > MAX_TOKEN_TTL {
            anyhow::bail!("JWT_EXPIRES_IN cannot exceed 365 days");
        }

        let rate_limit = RateLimitConfig {
            window: Duration::from_secs(parse_or(&get, "RATE_LIMIT_WINDOW_SECS", 15 * 60)),
            max_requests: parse_or(&get, "RATE_LIMIT_MAX_REQUESTS", 100),
        };

        Ok(Self {
            storage,
            database_url,
            max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10),
            jwt,
            rate_limit,
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "APP_PORT", 8080),
        })
    }
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    get(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Upper bound for `JWT_EXPIRES_IN`.
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// `"7d"`, `"12h"`, `"30m"`, `"45s"` or bare seconds.
pub fn parse_duration(raw: &str) -> anyhow::Result<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((i, _)) => raw.split_at(i),
        None => (raw, "s"),
    };
    let value: u64 = digits
        .parse()
        .with_context(|| format!("invalid duration {raw:?}"))?;
    let scale: u64 = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 60 * 60 * 24,
        other => anyhow::bail!("unknown duration unit {other:?} in {raw:?}"),
    };
    let secs = value
        .checked_mul(scale)
        .with_context(|| format!("duration {raw:?} is too large"))?;
    if secs == 0 {
        anyhow::bail!("duration must be positive");
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parses_durations() {
        assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(604_800));
        assert_eq!(parse_duration("12h").unwrap(), Duration::from_secs(43_200));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1_800));
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert!(parse_duration("7w").is_err());
        assert!(parse_duration("d").is_err());
        assert!(parse_duration("0").is_err());
        assert!(parse_duration(&format!("{}d", u64::MAX)).is_err());
        assert!(parse_duration("99999999999999999999").is_err());
    }

    #[test]
    fn token_ttl_is_capped() {
        let cfg = |ttl: &str| {
            AppConfig::from_lookup(lookup(&[
                ("STORAGE_BACKEND", "memory"),
                ("JWT_SECRET", "s3cret"),
                ("JWT_EXPIRES_IN", ttl),
            ]))
        };
        assert_eq!(cfg("365d").unwrap().jwt.expires_in, MAX_TOKEN_TTL);
        assert!(cfg("366d").is_err());
        assert!(cfg("1000000000000000d").is_err());
    }

    #[test]
    fn defaults_apply() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/fintrack"),
            ("JWT_SECRET", "s3cret"),
        ]))
        .unwrap();
        assert_eq!(cfg.storage, StorageBackend::Postgres);
        assert_eq!(cfg.jwt.expires_in, Duration::from_secs(7 * 24 * 3600));
        assert_eq!(cfg.jwt.issuer, "fintrack");
        assert_eq!(cfg.rate_limit.max_requests, 100);
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn memory_backend_needs_no_database() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("STORAGE_BACKEND", "memory"),
            ("JWT_SECRET", "s3cret"),
            ("JWT_EXPIRES_IN", "1h"),
        ]))
        .unwrap();
        assert_eq!(cfg.storage, StorageBackend::Memory);
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.jwt.expires_in, Duration::from_secs(3600));
    }

    #[test]
    fn missing_required_values_fail() {
        assert!(AppConfig::from_lookup(lookup(&[("JWT_SECRET", "x")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")])).is_err());
    }
}
