//! HTTP handlers for voucher-service.

pub mod health;
pub mod vouchers;

pub use health::{healthz, index, metrics, readiness_check};
pub use vouchers::{get_voucher, issue_voucher, redeem_voucher};

use axum::body::Bytes;
use serde::de::DeserializeOwned;
use service_core::error::AppError;

/// Parse a JSON request body. An empty body is read as `{}`.
pub(crate) fn parse_json_body<T>(body: &Bytes) -> Result<T, AppError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid JSON body: {}", e)))
}
