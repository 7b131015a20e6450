//! Start transaction use case.
//! Creates the transaction record a payment is later started for.

use rand::Rng;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{Address, NewAddress, Transaction};
use crate::ports::{AddressRepository, RepositoryError, TransactionRepository};
use crate::validation::{self, ValidationError};

const MAX_ID_ATTEMPTS: usize = 5;
const MIN_TRANSACTION_ID: i64 = 100_000_000;
const MAX_TRANSACTION_ID: i64 = 999_999_999;

type IdGenerator = Box<dyn Fn() -> i64 + Send + Sync>;

/// Input for the StartTransaction use case.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTransaction {
    pub total: f64,
    pub language: String,
    /// Falls back to the configured default currency.
    pub currency: Option<String>,
    pub billing_address_id: Option<i64>,
    pub delivery_address_id: Option<i64>,
    pub user_id: Option<i64>,
    pub merchant: Option<String>,
    pub secret_key: Option<String>,
}

impl NewTransaction {
    pub fn new(total: f64, language: impl Into<String>) -> Self {
        Self {
            total,
            language: language.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum StartTransactionError {
    #[error("invalid transaction: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("no free transaction id after {0} attempts")]
    IdsExhausted(usize),
}

pub struct StartTransaction {
    transactions: Arc<dyn TransactionRepository>,
    addresses: Arc<dyn AddressRepository>,
    default_currency: String,
    next_id: IdGenerator,
}

impl StartTransaction {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        addresses: Arc<dyn AddressRepository>,
        default_currency: impl Into<String>,
    ) -> Self {
        Self {
            transactions,
            addresses,
            default_currency: default_currency.into(),
            next_id: Box::new(random_transaction_id),
        }
    }

    pub fn with_id_generator(mut self, next_id: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.next_id = Box::new(next_id);
        self
    }

    pub async fn execute(&self, input: NewTransaction) -> Result<Transaction, StartTransactionError> {
        let currency = input
            .currency
            .clone()
            .unwrap_or_else(|| self.default_currency.clone());

        validation::validate_total(input.total)?;
        validation::validate_language(&input.language)?;
        validation::validate_currency(&currency)?;
        validation::validate_credentials(input.merchant.as_deref(), input.secret_key.as_deref())?;

        for address_id in [input.billing_address_id, input.delivery_address_id]
            .into_iter()
            .flatten()
        {
            self.addresses.get(address_id).await?;
        }

        for attempt in 1..=MAX_ID_ATTEMPTS {
            let mut tx = Transaction::new(
                (self.next_id)(),
                input.total,
                input.language.clone(),
                currency.clone(),
            );
            tx.billing_address_id = input.billing_address_id;
            tx.delivery_address_id = input.delivery_address_id;
            tx.user_id = input.user_id;
            tx.merchant = input.merchant.clone();
            tx.secret_key = input.secret_key.clone();

            match self.transactions.insert(&tx).await {
                Ok(inserted) => {
                    tracing::info!(
                        transaction_id = inserted.id,
                        total = inserted.total,
                        currency = %inserted.currency,
                        "transaction created"
                    );
                    return Ok(inserted);
                }
                Err(RepositoryError::Conflict(_)) => {
                    tracing::warn!(transaction_id = tx.id, attempt, "transaction id taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StartTransactionError::IdsExhausted(MAX_ID_ATTEMPTS))
    }

    pub async fn create_address(&self, address: NewAddress) -> Result<Address, StartTransactionError> {
        validation::validate_new_address(&address)?;
        Ok(self.addresses.insert(&address).await?)
    }
}

fn random_transaction_id() -> i64 {
    rand::thread_rng().gen_range(MIN_TRANSACTION_ID..=MAX_TRANSACTION_ID)
}
