//! Repository wiring. Services only ever see the traits; which backend sits
//! behind them is decided here from `STORAGE_BACKEND`.

use std::sync::Arc;

use tracing::info;

use crate::auth::repo::{PgUserRepository, UserRepository};
use crate::config::{AppConfig, StorageBackend};
use crate::db;
use crate::transactions::repo::{PgTransactionRepository, TransactionRepository};

pub mod memory;

pub use memory::{MemoryTransactionRepository, MemoryUserRepository};

#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub transactions: Arc<dyn TransactionRepository>,
}

impl Repositories {
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        match config.storage {
            StorageBackend::Postgres => {
                let pool = db::connect(config).await?;
                info!(max_connections = config.max_connections, "using postgres storage");
                Ok(Self {
                    users: Arc::new(PgUserRepository::new(pool.clone())),
                    transactions: Arc::new(PgTransactionRepository::new(pool)),
                })
            }
            StorageBackend::Memory => {
                info!("using in-memory storage; data is lost on restart");
                Ok(Self::in_memory())
            }
        }
    }

    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(MemoryUserRepository::new()),
            transactions: Arc::new(MemoryTransactionRepository::new()),
        }
    }
}
