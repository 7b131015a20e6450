use anyhow::Context;
use dotenvy::dotenv;
use ipnet::IpNet;
use std::env;
use std::fmt;
use std::net::IpAddr;

/// Address SimplePay sends instant payment notifications from.
pub const DEFAULT_IPN_HOST: &str = "94.199.53.96";

/// Selects the gateway host and the credential source for outbound payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Production,
    Sandbox,
}

impl ExecutionMode {
    /// Anything other than `production` runs against the sandbox.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("production") {
            ExecutionMode::Production
        } else {
            ExecutionMode::Sandbox
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Production => "production",
            ExecutionMode::Sandbox => "sandbox",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedIps {
    Any,
    Cidrs(Vec<IpNet>),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub execution_mode: ExecutionMode,
    pub default_currency: String,
    pub sdk_version: String,
    pub payment_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub ipn_allowed_ips: AllowedIps,
    pub trusted_proxy_depth: usize,
    pub default_merchant: Option<String>,
    pub default_secret_key: Option<String>,
    pub public_url: String,
    pub cors_allowed_origins: Option<String>,
    pub log_request_body: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Config {
            server_port: var_or("SERVER_PORT", "3000")
                .parse()
                .context("SERVER_PORT must be a port number")?,
            database_url: lookup("DATABASE_URL").context("DATABASE_URL is required")?,
            execution_mode: ExecutionMode::parse(&var_or("SIMPLEPAY_ENV", "sandbox")),
            default_currency: var_or("SIMPLEPAY_CURRENCY", "HUF"),
            sdk_version: var_or("SIMPLEPAY_SDK", "v1.0"),
            payment_timeout_secs: var_or("SIMPLEPAY_TIMEOUT", "300")
                .parse()
                .context("SIMPLEPAY_TIMEOUT must be a number of seconds")?,
            http_timeout_secs: var_or("SIMPLEPAY_HTTP_TIMEOUT", "30")
                .parse()
                .context("SIMPLEPAY_HTTP_TIMEOUT must be a number of seconds")?,
            ipn_allowed_ips: parse_allowed_ips(&var_or("SIMPLEPAY_HOST", DEFAULT_IPN_HOST))?,
            trusted_proxy_depth: var_or("SIMPLEPAY_TRUSTED_PROXY_DEPTH", "0")
                .parse()
                .context("SIMPLEPAY_TRUSTED_PROXY_DEPTH must be a non-negative integer")?,
            default_merchant: non_empty("SIMPLEPAY_MERCHANT"),
            default_secret_key: non_empty("SIMPLEPAY_KEY"),
            public_url: var_or("SIMPLEPAY_PUBLIC_URL", "http://localhost:3000"),
            cors_allowed_origins: non_empty("CORS_ALLOWED_ORIGINS"),
            log_request_body: var_or("LOG_REQUEST_BODY", "false")
                .parse()
                .unwrap_or(false),
        })
    }
}

/// Parses `*` or a comma-separated list of addresses and CIDR blocks.
pub fn parse_allowed_ips(raw: &str) -> anyhow::Result<AllowedIps> {
    let value = raw.trim();
    if value == "*" {
        return Ok(AllowedIps::Any);
    }

    let cidrs = value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_allowed_entry)
        .collect::<anyhow::Result<Vec<_>>>()?;

    if cidrs.is_empty() {
        anyhow::bail!("SIMPLEPAY_HOST must be '*' or a comma-separated list of addresses or CIDRs");
    }

    Ok(AllowedIps::Cidrs(cidrs))
}

fn parse_allowed_entry(entry: &str) -> anyhow::Result<IpNet> {
    if let Ok(ip) = entry.parse::<IpAddr>() {
        return Ok(IpNet::from(ip));
    }

    entry
        .parse::<IpNet>()
        .with_context(|| format!("invalid address or CIDR in SIMPLEPAY_HOST: {entry}"))
}
