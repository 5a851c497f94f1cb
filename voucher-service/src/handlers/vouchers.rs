//! Voucher endpoints: issue, fetch, redeem.

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use crate::dtos::{IssueVoucherRequest, RedeemVoucherRequest, VoucherResponse};
use crate::handlers::parse_json_body;
use crate::startup::AppState;

/// `POST /api/voucher`
#[tracing::instrument(skip(state, body))]
pub async fn issue_voucher(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<VoucherResponse>, AppError> {
    let request: IssueVoucherRequest = parse_json_body(&body)?;
    let voucher = state.ledger.issue(request).await?;

    Ok(Json(VoucherResponse::from(voucher)))
}

/// `GET /api/voucher/:id`
#[tracing::instrument(skip(state))]
pub async fn get_voucher(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VoucherResponse>, AppError> {
    let voucher = state.ledger.fetch(&id).await?;

    Ok(Json(VoucherResponse::from(voucher)))
}

/// `POST /api/voucher/:id/redeem`
#[tracing::instrument(skip(state, body))]
pub async fn redeem_voucher(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<VoucherResponse>, AppError> {
    let request: RedeemVoucherRequest = parse_json_body(&body)?;
    let voucher = state.ledger.redeem(&id, request).await?;

    Ok(Json(VoucherResponse::from(voucher)))
}
