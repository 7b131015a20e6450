use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Local, SecondsFormat, Utc};
use rand::RngCore;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use super::signature::{self, SignatureError};
use crate::config::{Config, ExecutionMode};
use crate::domain::{Address, Customer, Transaction};
use crate::validation;

pub const PRODUCTION_BASE_URL: &str = "https://api.simplepay.hu";
pub const SANDBOX_BASE_URL: &str = "https://sandbox.simplepay.hu";
pub const START_PATH: &str = "/payment/v2/start";

/// Public test merchant every non-production payment is sent as.
pub const SANDBOX_MERCHANT: &str = "PUBLICTESTHUF";
pub const SANDBOX_SECRET_KEY: &str = "FxDa5w314kLlNseq2sKuVwaqZshZT5d6";

pub const SIGNATURE_HEADER: &str = "Signature";

const SALT_BYTES: usize = 32;
const PAYMENT_METHODS: &[&str] = &["CARD"];

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),
    #[error("no {0} configured for production payments")]
    MissingCredentials(&'static str),
    #[error("payment timeout of {0:?} is out of range")]
    InvalidTimeout(Duration),
}

/// Everything the client needs from configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub mode: ExecutionMode,
    pub default_merchant: Option<String>,
    pub default_secret_key: Option<String>,
    pub payment_timeout: Duration,
    pub http_timeout: Duration,
    pub sdk_version: String,
    /// Absolute URL of the `back` endpoint, sent to the gateway as `url`.
    pub back_url: String,
}

impl GatewaySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.execution_mode,
            default_merchant: config.default_merchant.clone(),
            default_secret_key: config.default_secret_key.clone(),
            payment_timeout: Duration::from_secs(config.payment_timeout_secs),
            http_timeout: Duration::from_secs(config.http_timeout_secs),
            sdk_version: config.sdk_version.clone(),
            back_url: format!(
                "{}{}/back",
                config.public_url.trim_end_matches('/'),
                crate::MOUNT_PATH
            ),
        }
    }

    pub fn sandbox(back_url: impl Into<String>) -> Self {
        Self {
            mode: ExecutionMode::Sandbox,
            default_merchant: None,
            default_secret_key: None,
            payment_timeout: Duration::from_secs(300),
            http_timeout: Duration::from_secs(30),
            sdk_version: "v1.0".to_string(),
            back_url: back_url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub merchant: String,
    pub secret_key: String,
}

/// Records linked to the transaction that end up in the payment request.
#[derive(Debug, Default, Clone, Copy)]
pub struct PaymentParties<'a> {
    pub billing: Option<&'a Address>,
    pub delivery: Option<&'a Address>,
    pub customer: Option<&'a Customer>,
}

/// Caller-supplied values for the payment page.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct StartOptions {
    pub name: Option<String>,
    pub email: Option<String>,
    pub language: Option<String>,
}

impl StartOptions {
    /// Fills unset fields from `other`.
    pub fn or(self, other: StartOptions) -> StartOptions {
        StartOptions {
            name: self.name.or(other.name),
            email: self.email.or(other.email),
            language: self.language.or(other.language),
        }
    }

    /// Strips control characters and collapses whitespace. Blank values count as unset.
    pub fn sanitized(self) -> StartOptions {
        let clean = |value: Option<String>| {
            value
                .map(|v| validation::sanitize_string(&v))
                .filter(|v| !v.is_empty())
        };

        StartOptions {
            name: clean(self.name),
            email: clean(self.email),
            language: clean(self.language),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPaymentRequest {
    pub merchant: String,
    pub order_ref: String,
    pub customer: Option<String>,
    pub customer_email: Option<String>,
    pub language: String,
    pub currency: String,
    pub total: f64,
    pub salt: String,
    pub methods: Vec<String>,
    pub invoice: Value,
    pub delivery: Value,
    pub timeout: String,
    pub url: String,
    pub sdk_version: String,
}

/// HTTP client for the SimplePay v2 payment API.
#[derive(Clone)]
pub struct SimplePayClient {
    client: Client,
    base_url: String,
    settings: GatewaySettings,
}

impl SimplePayClient {
    pub fn new(settings: GatewaySettings) -> Self {
        let client = Client::builder()
            .timeout(settings.http_timeout)
            .build()
            .unwrap_or_default();

        let base_url = match settings.mode {
            ExecutionMode::Production => PRODUCTION_BASE_URL,
            ExecutionMode::Sandbox => SANDBOX_BASE_URL,
        }
        .to_string();

        Self {
            client,
            base_url,
            settings,
        }
    }

    /// Points the client at another host, e.g. a mock server.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.settings.mode
    }

    pub fn start_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), START_PATH)
    }

    /// Merchant and key a transaction is processed with.
    ///
    /// Production uses the transaction's own credentials, then the configured
    /// defaults. Any other mode always uses the public sandbox merchant.
    pub fn credentials_for(&self, transaction: &Transaction) -> Result<Credentials, GatewayError> {
        match self.settings.mode {
            ExecutionMode::Sandbox => Ok(Credentials {
                merchant: SANDBOX_MERCHANT.to_string(),
                secret_key: SANDBOX_SECRET_KEY.to_string(),
            }),
            ExecutionMode::Production => {
                let merchant = transaction
                    .merchant
                    .clone()
                    .or_else(|| self.settings.default_merchant.clone())
                    .ok_or(GatewayError::MissingCredentials("merchant"))?;
                let secret_key = transaction
                    .secret_key
                    .clone()
                    .or_else(|| self.settings.default_secret_key.clone())
                    .ok_or(GatewayError::MissingCredentials("secret key"))?;
                Ok(Credentials {
                    merchant,
                    secret_key,
                })
            }
        }
    }

    pub fn sign_for(&self, transaction: &Transaction, payload: &[u8]) -> Result<String, GatewayError> {
        let credentials = self.credentials_for(transaction)?;
        Ok(signature::sign(credentials.secret_key.as_bytes(), payload)?)
    }

    pub fn verify_for(
        &self,
        transaction: &Transaction,
        payload: &[u8],
        signature: &str,
    ) -> Result<(), GatewayError> {
        let credentials = self.credentials_for(transaction)?;
        Ok(signature::verify(
            credentials.secret_key.as_bytes(),
            payload,
            signature,
        )?)
    }

    /// Builds the `start` payload. Every call draws a fresh salt.
    pub fn build_start_request(
        &self,
        transaction: &Transaction,
        credentials: &Credentials,
        parties: PaymentParties<'_>,
        options: &StartOptions,
    ) -> Result<StartPaymentRequest, GatewayError> {
        let language = parties
            .customer
            .and_then(|customer| customer.language.clone())
            .or_else(|| options.language.clone())
            .unwrap_or_else(|| transaction.language.clone());

        let timeout = chrono::Duration::from_std(self.settings.payment_timeout)
            .ok()
            .and_then(|ttl| Local::now().checked_add_signed(ttl))
            .ok_or(GatewayError::InvalidTimeout(self.settings.payment_timeout))?;

        Ok(StartPaymentRequest {
            merchant: credentials.merchant.clone(),
            order_ref: transaction.order_ref(),
            customer: options
                .name
                .clone()
                .or_else(|| parties.customer.map(|c| c.name.clone())),
            customer_email: options
                .email
                .clone()
                .or_else(|| parties.customer.map(|c| c.email.clone())),
            language,
            currency: transaction.currency.clone(),
            total: transaction.total,
            salt: generate_salt(),
            methods: PAYMENT_METHODS.iter().map(|m| m.to_string()).collect(),
            invoice: address_payload(parties.billing)?,
            delivery: address_payload(parties.delivery)?,
            timeout: timeout.to_rfc3339_opts(SecondsFormat::Secs, false),
            url: self.settings.back_url.clone(),
            sdk_version: self.settings.sdk_version.clone(),
        })
    }

    /// Starts a payment and returns the gateway's JSON answer.
    ///
    /// Sets `start_time` on the transaction; persisting it is up to the caller.
    pub async fn start_payment(
        &self,
        transaction: &mut Transaction,
        parties: PaymentParties<'_>,
        options: &StartOptions,
    ) -> Result<Value, GatewayError> {
        let credentials = self.credentials_for(transaction)?;
        transaction.start_time = Some(Utc::now());

        let request = self.build_start_request(transaction, &credentials, parties, options)?;
        let body = serde_json::to_vec(&request)?;
        let signature = signature::sign(credentials.secret_key.as_bytes(), &body)?;

        tracing::info!(
            transaction_id = transaction.id,
            mode = %self.settings.mode,
            total = transaction.total,
            currency = %transaction.currency,
            "starting SimplePay payment"
        );

        let response = self
            .client
            .post(self.start_url())
            .header(SIGNATURE_HEADER, signature)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                transaction_id = transaction.id,
                status = status.as_u16(),
                "SimplePay rejected payment start"
            );
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let response_signature = response
            .headers()
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let bytes = response.bytes().await?;

        if let Some(received) = response_signature {
            if let Err(e) = signature::verify(credentials.secret_key.as_bytes(), &bytes, &received) {
                tracing::warn!(
                    transaction_id = transaction.id,
                    error = %e,
                    "SimplePay response signature did not verify"
                );
            }
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn address_payload(address: Option<&Address>) -> Result<Value, GatewayError> {
    match address {
        Some(address) => Ok(serde_json::to_value(address.as_dict())?),
        None => Ok(Value::Object(serde_json::Map::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewAddress;
    use chrono::DateTime;
    use mockito::Matcher;
    use serde_json::json;

    fn transaction() -> Transaction {
        Transaction::new(123456789, 1000.0, "HU".into(), "HUF".into())
    }

    fn production_client() -> SimplePayClient {
        SimplePayClient::new(GatewaySettings {
            mode: ExecutionMode::Production,
            default_merchant: Some("DEFAULTMERCHANT".into()),
            default_secret_key: Some("default-key".into()),
            ..GatewaySettings::sandbox("https://shop.example/simple_pay/back")
        })
    }

    fn sandbox_client() -> SimplePayClient {
        SimplePayClient::new(GatewaySettings::sandbox(
            "https://shop.example/simple_pay/back",
        ))
    }

    #[test]
    fn base_url_follows_execution_mode() {
        assert_eq!(
            production_client().start_url(),
            "https://api.simplepay.hu/payment/v2/start"
        );
        assert_eq!(
            sandbox_client().start_url(),
            "https://sandbox.simplepay.hu/payment/v2/start"
        );
    }

    #[test]
    fn sandbox_ignores_transaction_credentials() {
        let mut tx = transaction();
        tx.merchant = Some("OWNMERCHANT".into());
        tx.secret_key = Some("own-key".into());

        let credentials = sandbox_client().credentials_for(&tx).expect("credentials");
        assert_eq!(credentials.merchant, SANDBOX_MERCHANT);
        assert_eq!(credentials.secret_key, SANDBOX_SECRET_KEY);
    }

    #[test]
    fn production_prefers_transaction_credentials() {
        let client = production_client();
        let mut tx = transaction();

        let defaults = client.credentials_for(&tx).expect("credentials");
        assert_eq!(defaults.merchant, "DEFAULTMERCHANT");
        assert_eq!(defaults.secret_key, "default-key");

        tx.merchant = Some("OWNMERCHANT".into());
        tx.secret_key = Some("own-key".into());
        let own = client.credentials_for(&tx).expect("credentials");
        assert_eq!(own.merchant, "OWNMERCHANT");
        assert_eq!(own.secret_key, "own-key");
    }

    #[test]
    fn production_without_any_key_fails() {
        let client = SimplePayClient::new(GatewaySettings {
            mode: ExecutionMode::Production,
            default_merchant: Some("M".into()),
            ..GatewaySettings::sandbox("https://shop.example/simple_pay/back")
        });

        assert!(matches!(
            client.credentials_for(&transaction()),
            Err(GatewayError::MissingCredentials("secret key"))
        ));
    }

    #[test]
    fn request_payload_has_gateway_schema() {
        let client = sandbox_client();
        let tx = transaction();
        let billing = NewAddress::new("Teszt Elek", "HU").into_address(1);
        let customer = Customer {
            id: 5,
            name: "Account Name".into(),
            email: "account@example.com".into(),
            language: None,
        };
        let parties = PaymentParties {
            billing: Some(&billing),
            delivery: None,
            customer: Some(&customer),
        };
        let options = StartOptions {
            name: Some("Override Name".into()),
            email: None,
            language: Some("EN".into()),
        };
        let credentials = client.credentials_for(&tx).expect("credentials");

        let request = client
            .build_start_request(&tx, &credentials, parties, &options)
            .expect("request");
        let value = serde_json::to_value(&request).expect("serialize");

        assert_eq!(value["merchant"], SANDBOX_MERCHANT);
        assert_eq!(value["orderRef"], "123456789");
        assert_eq!(value["customer"], "Override Name");
        assert_eq!(value["customerEmail"], "account@example.com");
        assert_eq!(value["language"], "EN");
        assert_eq!(value["currency"], "HUF");
        assert_eq!(value["total"], 1000.0);
        assert_eq!(value["methods"], json!(["CARD"]));
        assert_eq!(value["invoice"]["name"], "Teszt Elek");
        assert_eq!(value["delivery"], json!({}));
        assert_eq!(value["url"], "https://shop.example/simple_pay/back");
        assert_eq!(value["sdkVersion"], "v1.0");
        assert_eq!(value["salt"].as_str().map(str::len), Some(43));
    }

    #[test]
    fn customer_language_overrides_supplied_language() {
        let client = sandbox_client();
        let tx = transaction();
        let customer = Customer {
            id: 5,
            name: "Name".into(),
            email: "mail@example.com".into(),
            language: Some("DE".into()),
        };
        let parties = PaymentParties {
            customer: Some(&customer),
            ..PaymentParties::default()
        };
        let options = StartOptions {
            language: Some("EN".into()),
            ..StartOptions::default()
        };
        let credentials = client.credentials_for(&tx).expect("credentials");

        let request = client
            .build_start_request(&tx, &credentials, parties, &options)
            .expect("request");
        assert_eq!(request.language, "DE");
    }

    #[test]
    fn timeout_is_in_the_future_with_explicit_offset() {
        let client = sandbox_client();
        let tx = transaction();
        let credentials = client.credentials_for(&tx).expect("credentials");

        let request = client
            .build_start_request(&tx, &credentials, PaymentParties::default(), &StartOptions::default())
            .expect("request");

        assert!(!request.timeout.contains('.'), "no fractional seconds");
        assert!(!request.timeout.ends_with('Z'), "numeric offset expected");
        let timeout = DateTime::parse_from_rfc3339(&request.timeout).expect("rfc3339");
        let remaining = timeout.with_timezone(&Utc) - Utc::now();
        assert!(remaining.num_seconds() > 290 && remaining.num_seconds() <= 300);
        assert_eq!(request.language, "HU");
        assert_eq!(request.customer, None);
    }

    #[test]
    fn salt_is_never_reused() {
        let client = sandbox_client();
        let tx = transaction();
        let credentials = client.credentials_for(&tx).expect("credentials");

        let first = client
            .build_start_request(&tx, &credentials, PaymentParties::default(), &StartOptions::default())
            .expect("request");
        let second = client
            .build_start_request(&tx, &credentials, PaymentParties::default(), &StartOptions::default())
            .expect("request");

        assert_ne!(first.salt, second.salt);
    }

    #[test]
    fn start_options_are_sanitized() {
        let options = StartOptions {
            name: Some("  Teszt\tElek\u{0007} ".into()),
            email: Some(" \n ".into()),
            language: Some("EN".into()),
        }
        .sanitized();

        assert_eq!(options.name.as_deref(), Some("Teszt Elek"));
        assert_eq!(options.email, None);
        assert_eq!(options.language.as_deref(), Some("EN"));
    }

    #[test]
    fn oversized_payment_timeout_is_an_error() {
        let client = SimplePayClient::new(GatewaySettings {
            payment_timeout: Duration::from_secs(u64::MAX),
            ..GatewaySettings::sandbox("https://shop.example/simple_pay/back")
        });
        let tx = transaction();
        let credentials = client.credentials_for(&tx).expect("credentials");

        let err = client
            .build_start_request(&tx, &credentials, PaymentParties::default(), &StartOptions::default())
            .expect_err("out of range");
        assert!(matches!(err, GatewayError::InvalidTimeout(_)));
    }

    #[tokio::test]
    async fn start_payment_posts_signed_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", START_PATH)
            .match_header("content-type", "application/json")
            .match_header("signature", Matcher::Regex("^[A-Za-z0-9+/]{64}$".into()))
            .match_body(Matcher::PartialJson(json!({
                "merchant": SANDBOX_MERCHANT,
                "orderRef": "123456789",
                "currency": "HUF",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"transactionId":99844942,"paymentUrl":"https://sandbox.simplepay.hu/pay/abc"}"#)
            .create_async()
            .await;

        let client = sandbox_client().with_base_url(server.url());
        let mut tx = transaction();

        let response = client
            .start_payment(&mut tx, PaymentParties::default(), &StartOptions::default())
            .await
            .expect("response");

        mock.assert_async().await;
        assert_eq!(response["paymentUrl"], "https://sandbox.simplepay.hu/pay/abc");
        assert!(tx.start_time.is_some());
    }

    #[tokio::test]
    async fn non_200_response_is_an_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", START_PATH)
            .with_status(500)
            .with_body("gateway down")
            .create_async()
            .await;

        let client = sandbox_client().with_base_url(server.url());
        let mut tx = transaction();

        let err = client
            .start_payment(&mut tx, PaymentParties::default(), &StartOptions::default())
            .await
            .expect_err("http error");

        match err {
            GatewayError::Http { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "gateway down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
