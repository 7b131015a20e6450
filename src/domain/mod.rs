//! Framework-agnostic records the gateway integration works with.

pub mod address;
pub mod customer;
pub mod transaction;

pub use address::{Address, AddressView, NewAddress};
pub use customer::Customer;
pub use transaction::{PaymentNotification, Transaction, TransactionResult, UnknownResult};
