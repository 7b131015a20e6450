//! Postgres implementation of AddressRepository.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{Address, NewAddress};
use crate::ports::{AddressRepository, RepositoryError, RepositoryResult};

#[derive(Clone)]
pub struct PostgresAddressRepository {
    pool: PgPool,
}

impl PostgresAddressRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AddressRepository for PostgresAddressRepository {
    async fn insert(&self, address: &NewAddress) -> RepositoryResult<Address> {
        let row = sqlx::query_as::<_, AddressRow>(
            r#"
            INSERT INTO order_address (
                name, company, country, state, city, zip, address, address2, phone
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, name, company, country, state, city, zip, address, address2, phone
            "#,
        )
        .bind(&address.name)
        .bind(&address.company)
        .bind(&address.country)
        .bind(&address.state)
        .bind(&address.city)
        .bind(&address.zip)
        .bind(&address.address)
        .bind(&address.address2)
        .bind(&address.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.into_domain())
    }

    async fn get(&self, id: i64) -> RepositoryResult<Address> {
        let row = sqlx::query_as::<_, AddressRow>(
            r#"
            SELECT id, name, company, country, state, city, zip, address, address2, phone
            FROM order_address WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(|r| r.into_domain())
            .ok_or_else(|| RepositoryError::NotFound(format!("address {id}")))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: i64,
    name: String,
    company: String,
    country: String,
    state: Option<String>,
    city: Option<String>,
    zip: Option<String>,
    address: Option<String>,
    address2: String,
    phone: Option<String>,
}

impl AddressRow {
    fn into_domain(self) -> Address {
        Address {
            id: self.id,
            name: self.name,
            company: self.company,
            country: self.country,
            state: self.state,
            city: self.city,
            zip: self.zip,
            address: self.address,
            address2: self.address2,
            phone: self.phone,
        }
    }
}
