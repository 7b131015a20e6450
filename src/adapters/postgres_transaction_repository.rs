//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{PaymentNotification, Transaction, TransactionResult};
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository};

const COLUMNS: &str = "id, total, language, currency, simple_id, start_time, finish_time, \
    ipn_received, result, status, method, merchant, secret_key, \
    billing_address_id, delivery_address_id, user_id";

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let sql = format!(
            r#"
            INSERT INTO simplepay_transaction ({COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(tx.id)
            .bind(tx.total)
            .bind(&tx.language)
            .bind(&tx.currency)
            .bind(&tx.simple_id)
            .bind(tx.start_time)
            .bind(tx.finish_time)
            .bind(tx.ipn_received)
            .bind(tx.result.map(|r| r.as_str()))
            .bind(&tx.status)
            .bind(&tx.method)
            .bind(&tx.merchant)
            .bind(&tx.secret_key)
            .bind(tx.billing_address_id)
            .bind(tx.delivery_address_id)
            .bind(tx.user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.into_domain()
    }

    async fn get(&self, id: i64) -> RepositoryResult<Transaction> {
        let sql = format!("SELECT {COLUMNS} FROM simplepay_transaction WHERE id = $1");
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("transaction {id}")))?
            .into_domain()
    }

    async fn record_start(
        &self,
        id: i64,
        started_at: DateTime<Utc>,
        simple_id: Option<&str>,
    ) -> RepositoryResult<Transaction> {
        let sql = format!(
            r#"
            UPDATE simplepay_transaction
            SET start_time = $2, simple_id = COALESCE($3, simple_id)
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .bind(started_at)
            .bind(simple_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        updated(row, id)
    }

    async fn record_result(
        &self,
        id: i64,
        result: TransactionResult,
    ) -> RepositoryResult<Transaction> {
        let sql = format!(
            "UPDATE simplepay_transaction SET result = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );

        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .bind(result.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        updated(row, id)
    }

    async fn record_notification(
        &self,
        id: i64,
        notification: &PaymentNotification,
    ) -> RepositoryResult<Transaction> {
        let sql = format!(
            r#"
            UPDATE simplepay_transaction
            SET method = $2, status = $3, finish_time = $4, ipn_received = $5
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .bind(&notification.method)
            .bind(&notification.status)
            .bind(notification.finish_time)
            .bind(notification.received_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        updated(row, id)
    }
}

fn updated(row: Option<TransactionRow>, id: i64) -> RepositoryResult<Transaction> {
    row.ok_or_else(|| RepositoryError::NotFound(format!("transaction {id}")))?
        .into_domain()
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    total: f64,
    language: String,
    currency: String,
    simple_id: Option<String>,
    start_time: Option<DateTime<Utc>>,
    finish_time: Option<DateTime<Utc>>,
    ipn_received: Option<DateTime<Utc>>,
    result: Option<String>,
    status: Option<String>,
    method: Option<String>,
    merchant: Option<String>,
    secret_key: Option<String>,
    billing_address_id: Option<i64>,
    delivery_address_id: Option<i64>,
    user_id: Option<i64>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        let result = self
            .result
            .map(|raw| raw.parse::<TransactionResult>())
            .transpose()
            .map_err(|e| RepositoryError::Corrupt(format!("transaction {}: {e}", self.id)))?;

        Ok(Transaction {
            id: self.id,
            total: self.total,
            language: self.language,
            currency: self.currency,
            simple_id: self.simple_id,
            start_time: self.start_time,
            finish_time: self.finish_time,
            ipn_received: self.ipn_received,
            result,
            status: self.status,
            method: self.method,
            merchant: self.merchant,
            secret_key: self.secret_key,
            billing_address_id: self.billing_address_id,
            delivery_address_id: self.delivery_address_id,
            user_id: self.user_id,
        })
    }
}
