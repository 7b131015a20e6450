//! The shop user who owns a transaction. Owned by the embedding application.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Preferred payment page language, overrides the one sent by the shop.
    pub language: Option<String>,
}
