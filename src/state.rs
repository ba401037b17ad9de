use std::sync::Arc;

use crate::{
    auth::{jwt::JwtKeys, services::AuthService},
    config::AppConfig,
    rate_limit::FixedWindowLimiter,
    storage::Repositories,
    transactions::services::TransactionService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub transactions: Arc<TransactionService>,
    pub rate_limiter: Arc<FixedWindowLimiter>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let repos = Repositories::connect(&config).await?;
        Ok(Self::from_parts(config, repos))
    }

    pub fn from_parts(config: Arc<AppConfig>, repos: Repositories) -> Self {
        let keys = JwtKeys::from_config(&config.jwt);
        Self {
            auth: Arc::new(AuthService::new(repos.users, keys)),
            transactions: Arc::new(TransactionService::new(repos.transactions)),
            rate_limiter: Arc::new(FixedWindowLimiter::new(&config.rate_limit)),
            config,
        }
    }

    /// Memory-backed state with fixed test secrets.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{JwtConfig, RateLimitConfig, StorageBackend};
        use std::time::Duration;

        let config = Arc::new(AppConfig {
            storage: StorageBackend::Memory,
            database_url: None,
            max_connections: 1,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test".into(),
                audience: "test".into(),
                expires_in: Duration::from_secs(300),
            },
            rate_limit: RateLimitConfig {
                window: Duration::from_secs(60),
                max_requests: 1000,
            },
            host: "127.0.0.1".into(),
            port: 0,
        });
        Self::from_parts(config, Repositories::in_memory())
    }
}
