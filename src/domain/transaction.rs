//! Transaction domain entity.
//! One payment attempt against the SimplePay gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Outcome the gateway reports when it sends the browser back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionResult {
    Success,
    Fail,
    Timeout,
    Cancel,
}

impl TransactionResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionResult::Success => "success",
            TransactionResult::Fail => "fail",
            TransactionResult::Timeout => "timeout",
            TransactionResult::Cancel => "cancel",
        }
    }
}

impl fmt::Display for TransactionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown transaction result: {0}")]
pub struct UnknownResult(pub String);

impl FromStr for TransactionResult {
    type Err = UnknownResult;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(TransactionResult::Success),
            "fail" => Ok(TransactionResult::Fail),
            "timeout" => Ok(TransactionResult::Timeout),
            "cancel" => Ok(TransactionResult::Cancel),
            other => Err(UnknownResult(other.to_string())),
        }
    }
}

/// Domain entity representing a payment transaction.
///
/// `total`, `currency` and `language` are fixed at creation. The remaining
/// gateway fields are filled in by the start, back and IPN handlers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub total: f64,
    pub language: String,
    pub currency: String,
    pub simple_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub ipn_received: Option<DateTime<Utc>>,
    pub result: Option<TransactionResult>,
    pub status: Option<String>,
    pub method: Option<String>,
    pub merchant: Option<String>,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    pub billing_address_id: Option<i64>,
    pub delivery_address_id: Option<i64>,
    pub user_id: Option<i64>,
}

impl Transaction {
    pub fn new(id: i64, total: f64, language: String, currency: String) -> Self {
        Self {
            id,
            total,
            language,
            currency,
            simple_id: None,
            start_time: None,
            finish_time: None,
            ipn_received: None,
            result: None,
            status: None,
            method: None,
            merchant: None,
            secret_key: None,
            billing_address_id: None,
            delivery_address_id: None,
            user_id: None,
        }
    }

    /// The `orderRef` the gateway knows this transaction by.
    pub fn order_ref(&self) -> String {
        self.id.to_string()
    }

    pub fn record_start(&mut self, started_at: DateTime<Utc>, simple_id: Option<String>) {
        self.start_time = Some(started_at);
        if simple_id.is_some() {
            self.simple_id = simple_id;
        }
    }

    pub fn record_result(&mut self, result: TransactionResult) {
        self.result = Some(result);
    }

    pub fn record_notification(&mut self, notification: &PaymentNotification) {
        self.method = Some(notification.method.clone());
        self.status = Some(notification.status.clone());
        self.finish_time = Some(notification.finish_time);
        self.ipn_received = Some(notification.received_at);
    }
}

/// Fields an accepted IPN writes onto its transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentNotification {
    pub method: String,
    pub status: String,
    pub finish_time: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}
