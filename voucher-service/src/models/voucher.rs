//! Voucher model for the redemption ledger.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Voucher lifecycle status.
///
/// `Expired` exists in the stored schema but no operation writes it;
/// expiry is derived at read time from `expires_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VoucherStatus {
    Valid,
    Redeemed,
    Expired,
}

impl VoucherStatus {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Redeemed => "redeemed",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for VoucherStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted voucher record.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Voucher {
    pub id: String,
    pub amount: f64,
    pub currency: String,
    pub beneficiary: String,
    pub category: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub status: VoucherStatus,
    pub created_at: DateTime<Utc>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub invoice_number: Option<String>,
}

impl Voucher {
    /// Whether `now` is past the expiry instant. Does not look at `status`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Input for inserting a new voucher.
#[derive(Debug, Clone)]
pub struct NewVoucher {
    pub id: String,
    pub amount: f64,
    pub currency: String,
    pub beneficiary: String,
    pub category: Option<String>,
    pub invoice_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewVoucher {
    /// Compute the expiry window from the creation instant.
    pub fn expiry_for(created_at: DateTime<Utc>, validity_days: u32) -> DateTime<Utc> {
        created_at + Duration::days(i64::from(validity_days))
    }

    /// The record as it looks right after insertion.
    pub fn into_voucher(self) -> Voucher {
        Voucher {
            id: self.id,
            amount: self.amount,
            currency: self.currency,
            beneficiary: self.beneficiary,
            category: self.category,
            expires_at: self.expires_at,
            status: VoucherStatus::Valid,
            created_at: self.created_at,
            redeemed_at: None,
            invoice_number: self.invoice_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Voucher {
        let created_at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        NewVoucher {
            id: "PGM-1740830400000-AB12".to_string(),
            amount: 50.0,
            currency: "USD".to_string(),
            beneficiary: "Juan".to_string(),
            category: None,
            invoice_number: None,
            created_at,
            expires_at: NewVoucher::expiry_for(created_at, 10),
        }
        .into_voucher()
    }

    #[test]
    fn new_voucher_starts_valid_and_unredeemed() {
        let voucher = sample();
        assert_eq!(voucher.status, VoucherStatus::Valid);
        assert!(voucher.redeemed_at.is_none());
    }

    #[test]
    fn expiry_is_days_after_creation() {
        let voucher = sample();
        assert_eq!(voucher.expires_at - voucher.created_at, Duration::days(10));
    }

    #[test]
    fn expired_only_after_expiry_instant() {
        let voucher = sample();
        assert!(!voucher.is_expired_at(voucher.expires_at));
        assert!(voucher.is_expired_at(voucher.expires_at + Duration::milliseconds(1)));
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(VoucherStatus::Redeemed).unwrap(),
            serde_json::json!("redeemed")
        );
        assert_eq!(VoucherStatus::Expired.to_string(), "expired");
    }
}
