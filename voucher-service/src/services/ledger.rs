//! The voucher ledger: issue, fetch and redeem.
//!
//! All lifecycle rules live here. Transport code hands in validated-shape
//! requests and maps [`LedgerError`] onto HTTP statuses; the store only
//! persists what the ledger decides.

use crate::config::IssuanceConfig;
use crate::dtos::{IssueVoucherRequest, RedeemVoucherRequest};
use crate::models::{NewVoucher, Voucher};
use crate::services::id::VoucherIdGenerator;
use crate::services::metrics::{record_error, record_redemption, VOUCHERS_ISSUED_TOTAL};
use crate::services::VoucherStore;
use chrono::{SubsecRound, Utc};
use service_core::error::AppError;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};
use validator::{Validate, ValidationError, ValidationErrors};

/// Issuance retries on an id collision before giving up.
const MAX_ID_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Voucher not found: {0}")]
    NotFound(String),

    #[error("Voucher already redeemed: {0}")]
    AlreadyRedeemed(String),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(errors) => AppError::ValidationError(errors),
            LedgerError::NotFound(id) => {
                AppError::NotFound(anyhow::anyhow!("Voucher not found: {}", id))
            }
            LedgerError::AlreadyRedeemed(id) => {
                AppError::BadRequest(anyhow::anyhow!("Voucher already redeemed: {}", id))
            }
            LedgerError::Store(err) => err,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub id_prefix: String,
    pub currency: String,
    pub default_validity_days: u32,
}

impl From<&IssuanceConfig> for LedgerSettings {
    fn from(config: &IssuanceConfig) -> Self {
        Self {
            id_prefix: config.id_prefix.clone(),
            currency: config.currency.clone(),
            default_validity_days: config.default_validity_days,
        }
    }
}

#[derive(Clone)]
pub struct VoucherLedger {
    store: Arc<dyn VoucherStore>,
    ids: Arc<VoucherIdGenerator>,
    settings: LedgerSettings,
}

impl VoucherLedger {
    pub fn new(store: Arc<dyn VoucherStore>, settings: LedgerSettings) -> Self {
        Self {
            store,
            ids: Arc::new(VoucherIdGenerator::new(settings.id_prefix.clone())),
            settings,
        }
    }

    /// Issue a new voucher in `valid` state.
    #[instrument(skip(self, request))]
    pub async fn issue(&self, request: IssueVoucherRequest) -> Result<Voucher, LedgerError> {
        let request = request.normalized();
        request.validate_all()?;

        let amount = request.amount().ok_or_else(|| missing("amount"))?;
        let validity_days = request
            .validity_days()
            .unwrap_or(self.settings.default_validity_days);
        let beneficiary = request.beneficiary.ok_or_else(|| missing("beneficiary"))?;

        let created_at = Utc::now().trunc_subsecs(3);
        let mut attempt = 1;
        loop {
            let new_voucher = NewVoucher {
                id: self.ids.generate(created_at),
                amount,
                currency: self.settings.currency.clone(),
                beneficiary: beneficiary.clone(),
                category: request.category.clone(),
                invoice_number: request.invoice_number.clone(),
                created_at,
                expires_at: NewVoucher::expiry_for(created_at, validity_days),
            };

            match self.store.insert_voucher(&new_voucher).await {
                Ok(voucher) => {
                    VOUCHERS_ISSUED_TOTAL.inc();
                    info!(
                        voucher_id = %voucher.id,
                        amount = voucher.amount,
                        currency = %voucher.currency,
                        validity_days = validity_days,
                        "Voucher issued"
                    );
                    return Ok(voucher);
                }
                Err(AppError::Conflict(_)) if attempt < MAX_ID_ATTEMPTS => {
                    warn!(voucher_id = %new_voucher.id, attempt, "Voucher id collision, regenerating");
                    attempt += 1;
                }
                Err(e) => {
                    record_error("issue");
                    return Err(e.into());
                }
            }
        }
    }

    /// Look up a voucher by exact id. Never changes stored state.
    #[instrument(skip(self))]
    pub async fn fetch(&self, id: &str) -> Result<Voucher, LedgerError> {
        if id.trim().is_empty() {
            return Err(LedgerError::NotFound(id.to_string()));
        }

        self.store
            .get_voucher(id)
            .await
            .inspect_err(|_| record_error("fetch"))?
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    /// Consume a voucher exactly once.
    #[instrument(skip(self, request))]
    pub async fn redeem(
        &self,
        id: &str,
        request: RedeemVoucherRequest,
    ) -> Result<Voucher, LedgerError> {
        let request = request.normalized();
        request.validate()?;

        let redeemed_at = Utc::now().trunc_subsecs(3);
        let updated = self
            .store
            .redeem_voucher(id, redeemed_at, request.invoice_number.as_deref())
            .await
            .inspect_err(|_| {
                record_redemption("error");
                record_error("redeem");
            })?;

        if let Some(voucher) = updated {
            record_redemption("redeemed");
            info!(
                voucher_id = %voucher.id,
                invoice_number = ?voucher.invoice_number,
                "Voucher redeemed"
            );
            return Ok(voucher);
        }

        // Nothing updated: tell an unknown id apart from a spent voucher.
        let existing = self.store.get_voucher(id).await.inspect_err(|_| {
            record_redemption("error");
            record_error("redeem");
        })?;

        match existing {
            Some(voucher) => {
                record_redemption("already_redeemed");
                warn!(
                    voucher_id = %voucher.id,
                    redeemed_at = ?voucher.redeemed_at,
                    "Rejected redemption of spent voucher"
                );
                Err(LedgerError::AlreadyRedeemed(voucher.id))
            }
            None => {
                record_redemption("not_found");
                Err(LedgerError::NotFound(id.to_string()))
            }
        }
    }

    /// Probe the backing store.
    pub async fn ping(&self) -> Result<(), AppError> {
        self.store.ping().await
    }
}

fn missing(field: &'static str) -> LedgerError {
    let mut errors = ValidationErrors::new();
    errors.add(field, ValidationError::new("required"));
    LedgerError::Validation(errors)
}
