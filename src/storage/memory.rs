use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::auth::{
    repo::UserRepository,
    repo_types::{NewUser, User, UserPatch},
};
use crate::error::RepoError;
use crate::transactions::{
    repo::TransactionRepository,
    repo_types::{
        NewTransaction, PageRequest, Summary, Transaction, TransactionFilter, TransactionPatch,
        TransactionType,
    },
};

/// Rows keyed by id, plus the next id to hand out.
struct Table<T> {
    rows: BTreeMap<i64, T>,
    next_id: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Process-local user store.
#[derive(Default)]
pub struct MemoryUserRepository {
    table: RwLock<Table<User>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create(&self, new: NewUser) -> Result<User, RepoError> {
        let mut table = self.table.write().await;
        if table
            .rows
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&new.email))
        {
            return Err(RepoError::AlreadyExists("User"));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: table.allocate_id(),
            email: new.email,
            password_hash: new.password_hash,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: i64, patch: UserPatch) -> Result<Option<User>, RepoError> {
        let mut table = self.table.write().await;
        if let Some(email) = &patch.email {
            let taken = table
                .rows
                .values()
                .any(|u| u.id != id && u.email.eq_ignore_ascii_case(email));
            if taken {
                return Err(RepoError::AlreadyExists("User"));
            }
        }
        let Some(user) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(hash) = patch.password_hash {
            user.password_hash = hash;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }
}

/// Process-local transaction store.
#[derive(Default)]
pub struct MemoryTransactionRepository {
    table: RwLock<Table<Transaction>>,
}

impl MemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(a: &Transaction, b: &Transaction) -> std::cmp::Ordering {
    b.date.cmp(&a.date).then(b.id.cmp(&a.id))
}

#[async_trait]
impl TransactionRepository for MemoryTransactionRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Transaction>, RepoError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn find_by_user_id(
        &self,
        user_id: i64,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> Result<Vec<Transaction>, RepoError> {
        let table = self.table.read().await;
        let mut rows: Vec<Transaction> = table
            .rows
            .values()
            .filter(|t| t.user_id == user_id && filter.matches(t))
            .cloned()
            .collect();
        rows.sort_by(newest_first);
        Ok(rows
            .into_iter()
            .skip(page.offset().max(0) as usize)
            .take(page.limit.max(0) as usize)
            .collect())
    }

    async fn count_by_user_id(
        &self,
        user_id: i64,
        filter: &TransactionFilter,
    ) -> Result<i64, RepoError> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|t| t.user_id == user_id && filter.matches(t))
            .count() as i64)
    }

    async fn create(&self, new: NewTransaction) -> Result<Transaction, RepoError> {
        let mut table = self.table.write().await;
        let now = OffsetDateTime::now_utc();
        let tx = Transaction {
            id: table.allocate_id(),
            user_id: new.user_id,
            kind: new.kind,
            amount: new.amount,
            description: new.description,
            date: new.date,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(tx.id, tx.clone());
        Ok(tx)
    }

    async fn update(
        &self,
        id: i64,
        patch: TransactionPatch,
    ) -> Result<Option<Transaction>, RepoError> {
        let mut table = self.table.write().await;
        let Some(tx) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        patch.apply_to(tx);
        tx.updated_at = OffsetDateTime::now_utc();
        Ok(Some(tx.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }

    async fn get_summary(&self, user_id: i64) -> Result<Summary, RepoError> {
        let table = self.table.read().await;
        let (mut income, mut expense, mut count) = (Decimal::ZERO, Decimal::ZERO, 0i64);
        for tx in table.rows.values().filter(|t| t.user_id == user_id) {
            match tx.kind {
                TransactionType::Income => income += tx.amount,
                TransactionType::Expense => expense += tx.amount,
            }
            count += 1;
        }
        Ok(Summary::new(income, expense, count))
    }
}
