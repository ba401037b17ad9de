use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::{internal, invalid, ServiceError};
use crate::transactions::{
    dto::{Pagination, TransactionPage},
    repo::TransactionRepository,
    repo_types::{Summary, Transaction},
};
use crate::validation::{
    sanitize_text, validate_create_transaction, validate_transaction_id,
    validate_transaction_query, validate_update_transaction, validate_user_id,
};

pub const NOT_FOUND: &str = "Transaction not found";
pub const LIST_FAILED: &str = "An error occurred while retrieving transactions";
pub const GET_FAILED: &str = "An error occurred while retrieving the transaction";
pub const CREATE_FAILED: &str = "An error occurred while creating the transaction";
pub const UPDATE_FAILED: &str = "An error occurred while updating the transaction";
pub const DELETE_FAILED: &str = "An error occurred while deleting the transaction";
pub const DELETE_MISSED: &str = "Failed to delete transaction";
pub const SUMMARY_FAILED: &str = "An error occurred while retrieving the summary";

/// Owner-scoped transaction operations.
///
/// Every single-resource operation checks existence first and ownership
/// second, so a missing id always reads "Transaction not found" and never
/// "Access denied". Concurrent writes to the same row are not serialized
/// here; the store's last write wins.
#[derive(Clone)]
pub struct TransactionService {
    repo: Arc<dyn TransactionRepository>,
}

impl TransactionService {
    pub fn new(repo: Arc<dyn TransactionRepository>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self, query))]
    pub async fn get_transactions(
        &self,
        user_id: i64,
        query: &Value,
    ) -> Result<TransactionPage, ServiceError> {
        let user_id = validate_user_id(&Value::from(user_id)).map_err(invalid)?;
        let (filter, page) = validate_transaction_query(query).map_err(invalid)?;

        let (transactions, total) = tokio::try_join!(
            self.repo.find_by_user_id(user_id, &filter, page),
            self.repo.count_by_user_id(user_id, &filter)
        )
        .map_err(|e| internal(e, LIST_FAILED))?;

        Ok(TransactionPage {
            transactions,
            pagination: Pagination::new(page, total),
        })
    }

    #[instrument(skip(self))]
    pub async fn get_transaction(&self, id: i64, user_id: i64) -> Result<Transaction, ServiceError> {
        let (id, user_id) = validate_ids(id, user_id)?;
        self.owned(id, user_id, GET_FAILED).await
    }

    #[instrument(skip(self, input))]
    pub async fn create_transaction(
        &self,
        user_id: i64,
        input: &Value,
    ) -> Result<Transaction, ServiceError> {
        let user_id = validate_user_id(&Value::from(user_id)).map_err(invalid)?;
        let mut draft = validate_create_transaction(input).map_err(invalid)?;
        draft.description = sanitize_text(draft.description.as_deref());

        let tx = self
            .repo
            .create(draft.owned_by(user_id))
            .await
            .map_err(|e| internal(e, CREATE_FAILED))?;
        info!(user_id, transaction_id = tx.id, kind = tx.kind.as_str(), "transaction created");
        Ok(tx)
    }

    #[instrument(skip(self, input))]
    pub async fn update_transaction(
        &self,
        id: i64,
        user_id: i64,
        input: &Value,
    ) -> Result<Transaction, ServiceError> {
        let (id, user_id) = validate_ids(id, user_id)?;
        let mut patch = validate_update_transaction(input).map_err(invalid)?;
        if let Some(description) = patch.description.take() {
            patch.description = Some(sanitize_text(description.as_deref()));
        }

        self.owned(id, user_id, UPDATE_FAILED).await?;
        let tx = self
            .repo
            .update(id, patch)
            .await
            .map_err(|e| internal(e, UPDATE_FAILED))?
            .ok_or_else(|| ServiceError::NotFound(NOT_FOUND.into()))?;
        info!(user_id, transaction_id = id, "transaction updated");
        Ok(tx)
    }

    #[instrument(skip(self))]
    pub async fn delete_transaction(&self, id: i64, user_id: i64) -> Result<(), ServiceError> {
        let (id, user_id) = validate_ids(id, user_id)?;
        self.owned(id, user_id, DELETE_FAILED).await?;

        let deleted = self
            .repo
            .delete(id)
            .await
            .map_err(|e| internal(e, DELETE_FAILED))?;
        if !deleted {
            warn!(user_id, transaction_id = id, "row vanished before delete");
            return Err(ServiceError::Internal(DELETE_MISSED.into()));
        }
        info!(user_id, transaction_id = id, "transaction deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_summary(&self, user_id: i64) -> Result<Summary, ServiceError> {
        let user_id = validate_user_id(&Value::from(user_id)).map_err(invalid)?;
        self.repo
            .get_summary(user_id)
            .await
            .map_err(|e| internal(e, SUMMARY_FAILED))
    }

    /// Fetches `id`, then checks it belongs to `user_id`.
    async fn owned(
        &self,
        id: i64,
        user_id: i64,
        failure: &str,
    ) -> Result<Transaction, ServiceError> {
        let tx = self
            .repo
            .find_by_id(id)
            .await
            .map_err(|e| internal(e, failure))?
            .ok_or_else(|| ServiceError::NotFound(NOT_FOUND.into()))?;
        if tx.user_id != user_id {
            warn!(
                transaction_id = id,
                requesting_user_id = user_id,
                owner_user_id = tx.user_id,
                "access denied"
            );
            return Err(ServiceError::AccessDenied);
        }
        Ok(tx)
    }
}

fn validate_ids(id: i64, user_id: i64) -> Result<(i64, i64), ServiceError> {
    let id = validate_transaction_id(&Value::from(id)).map_err(invalid)?;
    let user_id = validate_user_id(&Value::from(user_id)).map_err(invalid)?;
    Ok((id, user_id))
}
