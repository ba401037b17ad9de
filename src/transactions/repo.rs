use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::translate;
use crate::error::RepoError;
use crate::transactions::repo_types::{
    NewTransaction, PageRequest, Summary, Transaction, TransactionFilter, TransactionPatch,
    TransactionType,
};

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Transaction>, RepoError>;
    /// One page, newest date first.
    async fn find_by_user_id(
        &self,
        user_id: i64,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> Result<Vec<Transaction>, RepoError>;
    async fn count_by_user_id(
        &self,
        user_id: i64,
        filter: &TransactionFilter,
    ) -> Result<i64, RepoError>;
    async fn create(&self, new: NewTransaction) -> Result<Transaction, RepoError>;
    /// Touches only the fields set in `patch`; `Ok(None)` when no such row.
    async fn update(
        &self,
        id: i64,
        patch: TransactionPatch,
    ) -> Result<Option<Transaction>, RepoError>;
    /// `Ok(false)` when no such row.
    async fn delete(&self, id: i64) -> Result<bool, RepoError>;
    async fn get_summary(&self, user_id: i64) -> Result<Summary, RepoError>;
}

const COLUMNS: &str = "id, user_id, type, amount, description, date, created_at, updated_at";

#[derive(Clone)]
pub struct PgTransactionRepository {
    db: PgPool,
}

impl PgTransactionRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, user_id: i64, filter: &TransactionFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(kind) = filter.kind {
        qb.push(" AND type = ").push_bind(kind);
    }
    if let Some(start) = filter.start_date {
        qb.push(" AND date >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        qb.push(" AND date <= ").push_bind(end);
    }
}

#[async_trait]
impl TransactionRepository for PgTransactionRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Transaction>, RepoError> {
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| translate(e, RepoError::Find("transaction"), "Transaction"))
    }

    async fn find_by_user_id(
        &self,
        user_id: i64,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> Result<Vec<Transaction>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM transactions"));
        push_filter(&mut qb, user_id, filter);
        qb.push(" ORDER BY date DESC, id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());
        qb.build_query_as::<Transaction>()
            .fetch_all(&self.db)
            .await
            .map_err(|e| translate(e, RepoError::Find("transactions"), "Transaction"))
    }

    async fn count_by_user_id(
        &self,
        user_id: i64,
        filter: &TransactionFilter,
    ) -> Result<i64, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM transactions");
        push_filter(&mut qb, user_id, filter);
        qb.build_query_scalar::<i64>()
            .fetch_one(&self.db)
            .await
            .map_err(|e| translate(e, RepoError::Find("transactions"), "Transaction"))
    }

    async fn create(&self, new: NewTransaction) -> Result<Transaction, RepoError> {
        sqlx::query_as::<_, Transaction>(&format!(
            r#"
            INSERT INTO transactions (user_id, type, amount, description, date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.kind)
        .bind(new.amount)
        .bind(new.description)
        .bind(new.date)
        .fetch_one(&self.db)
        .await
        .map_err(|e| translate(e, RepoError::Create("transaction"), "Transaction"))
    }

    async fn update(
        &self,
        id: i64,
        patch: TransactionPatch,
    ) -> Result<Option<Transaction>, RepoError> {
        let (set_description, description) = match patch.description {
            Some(d) => (true, d),
            None => (false, None),
        };
        sqlx::query_as::<_, Transaction>(&format!(
            r#"
            UPDATE transactions
               SET type = COALESCE($2, type),
                   amount = COALESCE($3, amount),
                   date = COALESCE($4, date),
                   description = CASE WHEN $5 THEN $6 ELSE description END,
                   updated_at = NOW()
             WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.kind)
        .bind(patch.amount)
        .bind(patch.date)
        .bind(set_description)
        .bind(description)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| translate(e, RepoError::Update("transaction"), "Transaction"))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| translate(e, RepoError::Delete("transaction"), "Transaction"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Three independent aggregates issued concurrently.
    async fn get_summary(&self, user_id: i64) -> Result<Summary, RepoError> {
        let total_for = |kind: TransactionType| {
            sqlx::query_scalar::<_, Decimal>(
                r#"
                SELECT COALESCE(SUM(amount), 0)
                FROM transactions
                WHERE user_id = $1 AND type = $2
                "#,
            )
            .bind(user_id)
            .bind(kind)
            .fetch_one(&self.db)
        };
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM transactions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.db);

        let (income, expense, count) = tokio::try_join!(
            total_for(TransactionType::Income),
            total_for(TransactionType::Expense),
            count
        )
        .map_err(|e| translate(e, RepoError::Find("transactions summary"), "Transaction"))?;
        Ok(Summary::new(income, expense, count))
    }
}
