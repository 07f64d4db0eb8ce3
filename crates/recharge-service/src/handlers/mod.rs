//! API handlers.

use std::str::FromStr;

use crate::error::ApiError;

pub mod apps;
pub mod codes;
pub mod customers;
pub mod health;
pub mod orders;

/// Parse an id from a path segment, answering 400 when it is malformed.
pub(crate) fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid id '{raw}': {e}")))
}
