//! Reads shop users from the host application's `users` table.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::Customer;
use crate::ports::{CustomerRepository, RepositoryError, RepositoryResult};

#[derive(Clone)]
pub struct PostgresCustomerRepository {
    pool: PgPool,
}

impl PostgresCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerRepository for PostgresCustomerRepository {
    async fn get(&self, id: i64) -> RepositoryResult<Customer> {
        let row = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, name, email, language FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(|r| Customer {
            id: r.id,
            name: r.name,
            email: r.email,
            language: r.language,
        })
        .ok_or_else(|| RepositoryError::NotFound(format!("user {id}")))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i64,
    name: String,
    email: String,
    language: Option<String>,
}
