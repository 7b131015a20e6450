use std::fmt;

use crate::domain::NewAddress;

pub const LANGUAGE_LEN: usize = 2;
pub const CURRENCY_LEN: usize = 3;
pub const COUNTRY_LEN: usize = 2;
pub const ADDRESS_NAME_MAX_LEN: usize = 80;
pub const ADDRESS_STATE_MAX_LEN: usize = 40;
pub const ADDRESS_ZIP_MAX_LEN: usize = 12;
pub const ADDRESS_PHONE_MAX_LEN: usize = 16;
pub const MERCHANT_MAX_LEN: usize = 32;
pub const SECRET_KEY_MAX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

fn validate_optional_max_len(
    field: &'static str,
    value: Option<&str>,
    max_len: usize,
) -> ValidationResult {
    value.map_or(Ok(()), |value| validate_max_len(field, value, max_len))
}

fn validate_letter_code(field: &'static str, value: &str, len: usize) -> ValidationResult {
    validate_required(field, value)?;

    if value.len() != len || !value.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return Err(ValidationError::new(
            field,
            format!("must be exactly {} ASCII letters", len),
        ));
    }

    Ok(())
}

pub fn validate_total(total: f64) -> ValidationResult {
    if !total.is_finite() || total <= 0.0 {
        return Err(ValidationError::new("total", "must be greater than zero"));
    }

    Ok(())
}

pub fn validate_language(language: &str) -> ValidationResult {
    validate_letter_code("language", language, LANGUAGE_LEN)
}

pub fn validate_currency(currency: &str) -> ValidationResult {
    validate_letter_code("currency", currency, CURRENCY_LEN)
}

pub fn validate_credentials(merchant: Option<&str>, secret_key: Option<&str>) -> ValidationResult {
    validate_optional_max_len("merchant", merchant, MERCHANT_MAX_LEN)?;
    validate_optional_max_len("secret_key", secret_key, SECRET_KEY_MAX_LEN)
}

pub fn validate_new_address(address: &NewAddress) -> ValidationResult {
    validate_required("name", &address.name)?;
    validate_max_len("name", &address.name, ADDRESS_NAME_MAX_LEN)?;
    validate_max_len("company", &address.company, ADDRESS_NAME_MAX_LEN)?;
    validate_letter_code("country", &address.country, COUNTRY_LEN)?;
    validate_optional_max_len("state", address.state.as_deref(), ADDRESS_STATE_MAX_LEN)?;
    validate_optional_max_len("city", address.city.as_deref(), ADDRESS_NAME_MAX_LEN)?;
    validate_optional_max_len("zip", address.zip.as_deref(), ADDRESS_ZIP_MAX_LEN)?;
    validate_optional_max_len("address", address.address.as_deref(), ADDRESS_NAME_MAX_LEN)?;
    validate_max_len("address2", &address.address2, ADDRESS_NAME_MAX_LEN)?;
    validate_optional_max_len("phone", address.phone.as_deref(), ADDRESS_PHONE_MAX_LEN)?;

    Ok(())
}
