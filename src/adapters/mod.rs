pub mod in_memory;
pub mod postgres_address_repository;
pub mod postgres_customer_repository;
pub mod postgres_transaction_repository;

pub use in_memory::{
    InMemoryAddressRepository, InMemoryCustomerRepository, InMemoryTransactionRepository,
};
pub use postgres_address_repository::PostgresAddressRepository;
pub use postgres_customer_repository::PostgresCustomerRepository;
pub use postgres_transaction_repository::PostgresTransactionRepository;
