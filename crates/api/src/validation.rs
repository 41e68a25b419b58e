//! Request validation performed before anything reaches the engine.

use std::str::FromStr;

use crate::error::ApiError;

/// Largest quantity accepted in a single order.
pub const MAX_ORDER_QUANTITY: i64 = 49;

/// Shortest cancellation reason accepted, in characters.
pub const MIN_REASON_CHARS: usize = 10;

fn rejected(field: &'static str, message: String) -> ApiError {
    metrics::counter!("api_validation_failures_total", "field" => field).increment(1);
    ApiError::BadRequest(message)
}

pub fn quantity(value: i64) -> Result<u32, ApiError> {
    if !(1..=MAX_ORDER_QUANTITY).contains(&value) {
        return Err(rejected(
            "quantity",
            format!("quantity must be between 1 and {MAX_ORDER_QUANTITY}, got {value}"),
        ));
    }
    u32::try_from(value).map_err(|_| rejected("quantity", format!("quantity {value} out of range")))
}

/// Returns the trimmed reason.
pub fn reason(value: &str) -> Result<&str, ApiError> {
    let trimmed = value.trim();
    if trimmed.chars().count() < MIN_REASON_CHARS {
        return Err(rejected(
            "reason",
            format!("cancellation reason must be at least {MIN_REASON_CHARS} characters"),
        ));
    }
    Ok(trimmed)
}

/// Parses one of the UUID identity types.
pub fn id<T>(field: &'static str, value: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = uuid::Error>,
{
    value
        .parse()
        .map_err(|e| rejected(field, format!("Invalid {field}: {e}")))
}
