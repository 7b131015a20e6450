pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod ports;
pub mod simplepay;
pub mod startup;
pub mod use_cases;
pub mod utils;
pub mod validation;

use std::sync::Arc;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::config::{AllowedIps, Config};
use crate::health::HealthChecker;
use crate::middleware::{request_logger_middleware, IpFilterLayer, RequestLogConfig};
use crate::ports::{AddressRepository, CustomerRepository, TransactionRepository};
use crate::simplepay::SimplePayClient;

/// Path the SimplePay endpoints are mounted under.
pub const MOUNT_PATH: &str = "/simple_pay";

#[derive(Clone)]
pub struct AppState {
    pub transactions: Arc<dyn TransactionRepository>,
    pub addresses: Arc<dyn AddressRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub gateway: SimplePayClient,
    pub health: Arc<HealthChecker>,
}

/// Router level settings taken from [`Config`].
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub ipn_allowed_ips: AllowedIps,
    pub trusted_proxy_depth: usize,
    pub cors_allowed_origins: Option<String>,
    pub log_request_body: bool,
}

impl HttpSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ipn_allowed_ips: config.ipn_allowed_ips.clone(),
            trusted_proxy_depth: config.trusted_proxy_depth,
            cors_allowed_origins: config.cors_allowed_origins.clone(),
            log_request_body: config.log_request_body,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            ipn_allowed_ips: AllowedIps::Any,
            trusted_proxy_depth: 0,
            cors_allowed_origins: None,
            log_request_body: false,
        }
    }
}

pub fn create_app(state: AppState, settings: &HttpSettings) -> Router {
    let ipn_filter = IpFilterLayer::new(
        settings.ipn_allowed_ips.clone(),
        settings.trusted_proxy_depth,
    );

    let simple_pay = Router::new()
        .route("/start/:transaction_id", post(handlers::simplepay::start))
        .route("/back", get(handlers::simplepay::back))
        .route(
            "/ipn",
            post(handlers::simplepay::ipn).route_layer(ipn_filter),
        );

    let app = Router::new()
        .route("/health", get(handlers::health))
        .nest(MOUNT_PATH, simple_pay)
        .with_state(state)
        .layer(axum::middleware::from_fn_with_state(
            RequestLogConfig {
                log_body: settings.log_request_body,
            },
            request_logger_middleware,
        ));

    match settings.cors_allowed_origins.as_deref() {
        Some(origins) => app.layer(cors_layer(origins)),
        None => app,
    }
}

fn cors_layer(origins: &str) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
}
