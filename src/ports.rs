//! Storage interfaces the handlers and use cases depend on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{
    Address, Customer, NewAddress, PaymentNotification, Transaction, TransactionResult,
};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    Conflict(String),

    #[error("stored record is invalid: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row".to_string()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                RepositoryError::Conflict(db.message().to_string())
            }
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Stores a new transaction. Fails with `Conflict` if the id is taken.
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction>;

    async fn get(&self, id: i64) -> RepositoryResult<Transaction>;

    // Each record_* method writes only its own columns.

    /// Writes `start_time`, and `simple_id` when the gateway returned one.
    async fn record_start(
        &self,
        id: i64,
        started_at: DateTime<Utc>,
        simple_id: Option<&str>,
    ) -> RepositoryResult<Transaction>;

    /// Writes `result`.
    async fn record_result(
        &self,
        id: i64,
        result: TransactionResult,
    ) -> RepositoryResult<Transaction>;

    /// Writes `method`, `status`, `finish_time` and `ipn_received`.
    async fn record_notification(
        &self,
        id: i64,
        notification: &PaymentNotification,
    ) -> RepositoryResult<Transaction>;
}

#[async_trait]
pub trait AddressRepository: Send + Sync {
    async fn insert(&self, address: &NewAddress) -> RepositoryResult<Address>;

    async fn get(&self, id: i64) -> RepositoryResult<Address>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn get(&self, id: i64) -> RepositoryResult<Customer>;
}
