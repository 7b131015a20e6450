//! SimplePay endpoints: payment start, browser return and IPN.

use axum::{
    body::Bytes,
    extract::{rejection::PathRejection, Form, Path, Query, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::{Address, Customer, PaymentNotification, TransactionResult};
use crate::error::AppError;
use crate::ports::RepositoryError;
use crate::simplepay::{PaymentParties, StartOptions, SIGNATURE_HEADER};
use crate::AppState;

/// The gateway does not always pad the `r` parameter.
const BACK_PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub async fn start(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    Query(query): Query<StartOptions>,
    form: Option<Form<StartOptions>>,
) -> Result<Response, AppError> {
    // Ids are numeric, so anything else cannot name a transaction.
    let Path(transaction_id) =
        path.map_err(|_| AppError::NotFound("transaction".to_string()))?;
    let options = match form {
        Some(Form(form)) => query.or(form),
        None => query,
    }
    .sanitized();

    let mut transaction = state.transactions.get(transaction_id).await?;
    let billing = load_address(&state, transaction.billing_address_id).await?;
    let delivery = load_address(&state, transaction.delivery_address_id).await?;
    let customer = load_customer(&state, transaction.user_id).await?;

    let parties = PaymentParties {
        billing: billing.as_ref(),
        delivery: delivery.as_ref(),
        customer: customer.as_ref(),
    };
    let response = state
        .gateway
        .start_payment(&mut transaction, parties, &options)
        .await?;

    let simple_id = response.get("transactionId").and_then(scalar_to_string);
    let started_at = transaction.start_time.unwrap_or_else(Utc::now);
    let transaction = state
        .transactions
        .record_start(transaction.id, started_at, simple_id.as_deref())
        .await?;

    match response.get("paymentUrl").and_then(Value::as_str) {
        Some(payment_url) => {
            tracing::info!(
                transaction_id = transaction.id,
                simple_id = ?transaction.simple_id,
                "redirecting to SimplePay payment page"
            );
            Ok((StatusCode::FOUND, [(header::LOCATION, payment_url.to_string())]).into_response())
        }
        None => {
            tracing::warn!(
                transaction_id = transaction.id,
                "SimplePay response has no paymentUrl"
            );
            Ok(Json(response).into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BackParams {
    pub r: Option<String>,
}

/// Decoded `r` parameter of the browser return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackPayload {
    pub order_ref: i64,
    pub event: TransactionResult,
}

/// Browser return from the payment page. The payload is unsigned and only
/// records what the shopper's browser reports.
pub async fn back(
    State(state): State<AppState>,
    Query(params): Query<BackParams>,
) -> Result<Response, AppError> {
    let encoded = params
        .r
        .ok_or_else(|| AppError::BadRequest("missing r parameter".to_string()))?;
    let payload = decode_back_payload(&encoded)?;

    let transaction = state.transactions.get(payload.order_ref).await?;
    if let Some(previous) = transaction.result.filter(|r| *r != payload.event) {
        tracing::warn!(
            transaction_id = transaction.id,
            previous = %previous,
            result = %payload.event,
            "overwriting stored transaction result"
        );
    }
    let saved = state
        .transactions
        .record_result(transaction.id, payload.event)
        .await?;

    tracing::info!(
        transaction_id = saved.id,
        result = %payload.event,
        "browser returned from SimplePay"
    );

    let result = saved.result.map(|r| r.as_str()).unwrap_or_default();
    Ok(result.to_string().into_response())
}

pub fn decode_back_payload(encoded: &str) -> Result<BackPayload, AppError> {
    // Query decoding turns '+' into ' '.
    let normalized = encoded.trim().replace(' ', "+");
    let raw = BACK_PAYLOAD_ENGINE
        .decode(normalized.as_bytes())
        .map_err(|_| AppError::BadRequest("r is not valid base64".to_string()))?;
    let value: Value = serde_json::from_slice(&raw)
        .map_err(|_| AppError::BadRequest("r does not contain JSON".to_string()))?;

    let order_ref = value
        .get("o")
        .and_then(parse_order_ref)
        .ok_or_else(|| AppError::BadRequest("r has no valid order reference".to_string()))?;
    let event = value
        .get("e")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("r has no event".to_string()))?
        .to_lowercase()
        .parse::<TransactionResult>()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    Ok(BackPayload { order_ref, event })
}

/// Instant payment notification. The source address is checked by the
/// route's `IpFilterLayer` before this runs.
pub async fn ipn(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let mut notification: Map<String, Value> = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest("notification body must be a JSON object".to_string()))?;

    let order_ref = notification
        .get("orderRef")
        .and_then(parse_order_ref)
        .ok_or_else(|| AppError::BadRequest("orderRef is missing or invalid".to_string()))?;
    let transaction = state.transactions.get(order_ref).await?;

    if let Some(received) = headers.get(SIGNATURE_HEADER) {
        let received = received
            .to_str()
            .map_err(|_| AppError::Forbidden("malformed Signature header".to_string()))?;
        if let Err(e) = state.gateway.verify_for(&transaction, &body, received) {
            tracing::warn!(
                transaction_id = transaction.id,
                error = %e,
                "rejected IPN with invalid signature"
            );
            return Err(AppError::Forbidden("invalid notification signature".to_string()));
        }
    }

    let method = required_str(&notification, "method")?;
    let status = required_str(&notification, "status")?;
    let finish_date = required_str(&notification, "finishDate")?;
    let finish_time = parse_finish_date(&finish_date)
        .ok_or_else(|| AppError::BadRequest(format!("invalid finishDate: {finish_date}")))?;

    let update = PaymentNotification {
        method,
        status,
        finish_time,
        received_at: Utc::now(),
    };
    let saved = state
        .transactions
        .record_notification(transaction.id, &update)
        .await?;

    tracing::info!(
        transaction_id = saved.id,
        status = ?saved.status,
        method = ?saved.method,
        "IPN processed"
    );

    notification.insert(
        "receiveDate".to_string(),
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)),
    );
    let response_body =
        serde_json::to_vec(&notification).map_err(|e| AppError::Internal(e.to_string()))?;
    let signature = state.gateway.sign_for(&saved, &response_body)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (HeaderName::from_static("signature"), signature),
        ],
        response_body,
    )
        .into_response())
}

/// Parses an ISO-8601 timestamp and normalizes it to UTC. Timestamps
/// without an offset are taken as UTC.
pub fn parse_finish_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|parsed| parsed.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
}

fn parse_order_ref(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required_str(notification: &Map<String, Value>, field: &str) -> Result<String, AppError> {
    notification
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| AppError::BadRequest(format!("{field} is missing")))
}

async fn load_address(state: &AppState, id: Option<i64>) -> Result<Option<Address>, AppError> {
    let Some(id) = id else {
        return Ok(None);
    };
    match state.addresses.get(id).await {
        Ok(address) => Ok(Some(address)),
        Err(RepositoryError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn load_customer(state: &AppState, id: Option<i64>) -> Result<Option<Customer>, AppError> {
    let Some(id) = id else {
        return Ok(None);
    };
    match state.customers.get(id).await {
        Ok(customer) => Ok(Some(customer)),
        Err(RepositoryError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
