//! OTP SimplePay v2 integration: request signing and the payment start call.

pub mod client;
pub mod signature;

pub use client::{
    Credentials, GatewayError, GatewaySettings, PaymentParties, SimplePayClient,
    StartOptions, StartPaymentRequest, SIGNATURE_HEADER,
};
pub use signature::{sign, verify, SignatureError};
