use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

const MAX_BODY_LOG_SIZE: usize = 1024; // 1KB limit for body logging
const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogConfig {
    pub log_body: bool,
}

pub async fn request_logger_middleware(
    State(config): State<RequestLogConfig>,
    mut req: Request<Body>,
    next: Next<Body>,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let header_value = HeaderValue::from_str(&request_id).ok();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    if let Some(value) = header_value.clone() {
        req.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let content_length = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    match content_length {
        Some(size) if config.log_body && size <= MAX_BODY_LOG_SIZE => {
            let (parts, body) = req.into_parts();
            let bytes = match hyper::body::to_bytes(body).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(
                        request_id = %request_id,
                        method = %method,
                        uri = %uri,
                        error = %e,
                        "Failed to read request body"
                    );
                    Default::default()
                }
            };

            tracing::info!(
                request_id = %request_id,
                method = %method,
                uri = %uri,
                body_size = bytes.len(),
                body = %describe_body(&bytes),
                "Incoming request"
            );

            req = Request::from_parts(parts, Body::from(bytes));
        }
        Some(size) if config.log_body => {
            tracing::info!(
                request_id = %request_id,
                method = %method,
                uri = %uri,
                body_size = size,
                "Incoming request"
            );
        }
        _ => {
            tracing::info!(
                request_id = %request_id,
                method = %method,
                uri = %uri,
                "Incoming request"
            );
        }
    }

    let response = next.run(req).await;

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %response.status().as_u16(),
        latency_ms = start.elapsed().as_millis(),
        "Outgoing response"
    );

    let (mut parts, body) = response.into_parts();
    if let Some(value) = header_value {
        parts.headers.insert(REQUEST_ID_HEADER, value);
    }

    Response::from_parts(parts, body)
}

/// JSON bodies are logged with sensitive fields masked, anything else only
/// by size.
fn describe_body(bytes: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(json) => {
            let sanitized = crate::utils::sanitize::sanitize_json(&json);
            serde_json::to_string(&sanitized).unwrap_or_else(|_| "[invalid json]".to_string())
        }
        Err(_) => format!("[non-json, {} bytes]", bytes.len()),
    }
}
