//! In-memory repositories.
//!
//! Used by the test suite and for running the service without a database.
//! Nothing survives a restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use crate::domain::{
    Address, Customer, NewAddress, PaymentNotification, Transaction, TransactionResult,
};
use crate::ports::{
    AddressRepository, CustomerRepository, RepositoryError, RepositoryResult,
    TransactionRepository,
};

#[derive(Default)]
pub struct InMemoryTransactionRepository {
    records: RwLock<HashMap<i64, Transaction>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn update(
        &self,
        id: i64,
        apply: impl FnOnce(&mut Transaction) + Send,
    ) -> RepositoryResult<Transaction> {
        let mut records = self.records.write().await;
        let stored = records
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {id}")))?;
        apply(stored);
        Ok(stored.clone())
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut records = self.records.write().await;
        if records.contains_key(&tx.id) {
            return Err(RepositoryError::Conflict(format!("transaction {}", tx.id)));
        }
        records.insert(tx.id, tx.clone());
        Ok(tx.clone())
    }

    async fn get(&self, id: i64) -> RepositoryResult<Transaction> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("transaction {id}")))
    }

    async fn record_start(
        &self,
        id: i64,
        started_at: DateTime<Utc>,
        simple_id: Option<&str>,
    ) -> RepositoryResult<Transaction> {
        let simple_id = simple_id.map(str::to_string);
        self.update(id, |tx| tx.record_start(started_at, simple_id)).await
    }

    async fn record_result(
        &self,
        id: i64,
        result: TransactionResult,
    ) -> RepositoryResult<Transaction> {
        self.update(id, |tx| tx.record_result(result)).await
    }

    async fn record_notification(
        &self,
        id: i64,
        notification: &PaymentNotification,
    ) -> RepositoryResult<Transaction> {
        self.update(id, |tx| tx.record_notification(notification)).await
    }
}

pub struct InMemoryAddressRepository {
    records: RwLock<HashMap<i64, Address>>,
    next_id: AtomicI64,
}

impl Default for InMemoryAddressRepository {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl InMemoryAddressRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AddressRepository for InMemoryAddressRepository {
    async fn insert(&self, address: &NewAddress) -> RepositoryResult<Address> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = address.clone().into_address(id);
        self.records.write().await.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: i64) -> RepositoryResult<Address> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("address {id}")))
    }
}

#[derive(Default)]
pub struct InMemoryCustomerRepository {
    records: RwLock<HashMap<i64, Customer>>,
}

impl InMemoryCustomerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, customer: Customer) {
        self.records.write().await.insert(customer.id, customer);
    }
}

#[async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn get(&self, id: i64) -> RepositoryResult<Customer> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("user {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransactionResult;

    #[tokio::test]
    async fn insert_rejects_duplicate_ids() {
        let repo = InMemoryTransactionRepository::new();
        let tx = Transaction::new(123456789, 1000.0, "HU".into(), "HUF".into());

        repo.insert(&tx).await.expect("first insert");
        let err = repo.insert(&tx).await.expect_err("duplicate");
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn updates_only_touch_their_own_fields() {
        let repo = InMemoryTransactionRepository::new();
        let tx = Transaction::new(123456789, 1000.0, "HU".into(), "HUF".into());
        repo.insert(&tx).await.expect("insert");

        let finished = Utc::now();
        repo.record_notification(
            tx.id,
            &PaymentNotification {
                method: "CARD".into(),
                status: "FINISHED".into(),
                finish_time: finished,
                received_at: finished,
            },
        )
        .await
        .expect("notification");
        repo.record_result(tx.id, TransactionResult::Success)
            .await
            .expect("result");
        let stored = repo
            .record_start(tx.id, finished, Some("99844942"))
            .await
            .expect("start");

        assert_eq!(stored.total, 1000.0);
        assert_eq!(stored.currency, "HUF");
        assert_eq!(stored.result, Some(TransactionResult::Success));
        assert_eq!(stored.status.as_deref(), Some("FINISHED"));
        assert_eq!(stored.method.as_deref(), Some("CARD"));
        assert_eq!(stored.finish_time, Some(finished));
        assert_eq!(stored.simple_id.as_deref(), Some("99844942"));
    }

    #[tokio::test]
    async fn updating_unknown_transaction_is_not_found() {
        let repo = InMemoryTransactionRepository::new();
        assert!(matches!(
            repo.record_result(1, TransactionResult::Cancel).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn addresses_get_sequential_ids() {
        let repo = InMemoryAddressRepository::new();
        let first = repo.insert(&NewAddress::new("A", "HU")).await.expect("insert");
        let second = repo.insert(&NewAddress::new("B", "AT")).await.expect("insert");

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(repo.get(2).await.expect("get").country, "AT");
    }
}
