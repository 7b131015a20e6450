//! Postal address attached to a transaction as invoice or delivery address.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub id: i64,
    pub name: String,
    pub company: String,
    /// ISO-3166 alpha-2 country code.
    pub country: String,
    pub state: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub address: Option<String>,
    pub address2: String,
    pub phone: Option<String>,
}

/// An address that has not been stored yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewAddress {
    pub name: String,
    pub company: String,
    pub country: String,
    pub state: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub address: Option<String>,
    pub address2: String,
    pub phone: Option<String>,
}

impl NewAddress {
    pub fn new(name: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            country: country.into(),
            ..Self::default()
        }
    }

    pub fn into_address(self, id: i64) -> Address {
        Address {
            id,
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

/// Read-only view with the keys the gateway expects for `invoice` and `delivery`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddressView<'a> {
    pub name: &'a str,
    pub company: &'a str,
    pub country: &'a str,
    pub state: Option<&'a str>,
    pub city: Option<&'a str>,
    pub zip: Option<&'a str>,
    pub address: Option<&'a str>,
    pub address2: &'a str,
    pub phone: Option<&'a str>,
}

impl Address {
    pub fn as_dict(&self) -> AddressView<'_> {
        AddressView {
            name: &self.name,
            company: &self.company,
            country: &self.country,
            state: self.state.as_deref(),
            city: self.city.as_deref(),
            zip: self.zip.as_deref(),
            address: self.address.as_deref(),
            address2: &self.address2,
            phone: self.phone.as_deref(),
        }
    }
}
