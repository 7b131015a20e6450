pub mod start_transaction;

pub use start_transaction::{NewTransaction, StartTransaction, StartTransactionError};
