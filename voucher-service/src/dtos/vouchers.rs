use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::{Voucher, VoucherStatus};

/// Longest accepted validity window, in days.
pub const MAX_VALIDITY_DAYS: i64 = 3650;

/// A numeric field as sent by a client.
///
/// JSON numbers and numeric strings (`"50"`) are accepted. Anything else is
/// kept as `Malformed` so validation can report it next to the other fields
/// instead of rejecting the whole body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum NumberInput {
    Number(f64),
    Malformed,
}

impl NumberInput {
    pub fn as_f64(self) -> Option<f64> {
        match self {
            NumberInput::Number(n) => Some(n),
            NumberInput::Malformed => None,
        }
    }
}

impl From<f64> for NumberInput {
    fn from(n: f64) -> Self {
        NumberInput::Number(n)
    }
}

impl<'de> Deserialize<'de> for NumberInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let number = match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        Ok(number
            .filter(|n| n.is_finite())
            .map_or(NumberInput::Malformed, NumberInput::Number))
    }
}

/// Body of `POST /api/voucher`.
///
/// Every field is optional at the serde level so that a missing or
/// mistyped field is reported by validation together with every other
/// violation. Call [`IssueVoucherRequest::validate_all`], not the derived
/// `validate`, which only covers presence and text lengths.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct IssueVoucherRequest {
    #[validate(required(message = "amount is required"))]
    pub amount: Option<NumberInput>,

    #[validate(
        required(message = "beneficiary is required"),
        length(min = 1, max = 200, message = "beneficiary must be between 1 and 200 characters")
    )]
    pub beneficiary: Option<String>,

    #[validate(length(max = 100, message = "category must be at most 100 characters"))]
    pub category: Option<String>,

    pub days: Option<NumberInput>,

    #[validate(length(max = 100, message = "invoice_number must be at most 100 characters"))]
    pub invoice_number: Option<String>,
}

impl IssueVoucherRequest {
    /// Trim text fields; blank strings count as absent.
    pub fn normalized(self) -> Self {
        Self {
            amount: self.amount,
            beneficiary: non_blank(self.beneficiary),
            category: non_blank(self.category),
            days: self.days,
            invoice_number: non_blank(self.invoice_number),
        }
    }

    /// Derived checks plus the numeric rules, collected into one error set.
    pub fn validate_all(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };

        if self.amount.is_some() && self.amount().is_none() {
            errors.add(
                "amount",
                invalid("range", "amount must be a positive number"),
            );
        }

        if self.days.is_some() && self.validity_days().is_none() {
            errors.add(
                "days",
                invalid("range", "days must be a whole number between 1 and 3650"),
            );
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The amount when present and strictly positive.
    pub fn amount(&self) -> Option<f64> {
        self.amount
            .and_then(NumberInput::as_f64)
            .filter(|amount| *amount > 0.0)
    }

    /// The validity window when present and a whole number of days in range.
    pub fn validity_days(&self) -> Option<u32> {
        self.days
            .and_then(NumberInput::as_f64)
            .filter(|days| days.fract() == 0.0 && (1.0..=MAX_VALIDITY_DAYS as f64).contains(days))
            .map(|days| days as u32)
    }
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.into());
    error
}

/// Body of `POST /api/voucher/:id/redeem`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RedeemVoucherRequest {
    #[validate(length(max = 100, message = "invoice_number must be at most 100 characters"))]
    pub invoice_number: Option<String>,
}

impl RedeemVoucherRequest {
    pub fn normalized(self) -> Self {
        Self {
            invoice_number: non_blank(self.invoice_number),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Voucher JSON as returned by every voucher endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoucherResponse {
    pub id: String,
    pub amount: f64,
    pub currency: String,
    pub beneficiary: String,
    pub category: Option<String>,
    pub expires_at: String,
    pub status: VoucherStatus,
    pub created_at: String,
    pub redeemed_at: Option<String>,
    pub invoice_number: Option<String>,
    /// Derived at response time; the stored status is never changed by expiry.
    pub is_expired: bool,
}

impl VoucherResponse {
    pub fn from_voucher(voucher: Voucher, now: DateTime<Utc>) -> Self {
        let is_expired = voucher.is_expired_at(now);
        Self {
            id: voucher.id,
            amount: voucher.amount,
            currency: voucher.currency,
            beneficiary: voucher.beneficiary,
            category: voucher.category,
            expires_at: format_timestamp(voucher.expires_at),
            status: voucher.status,
            created_at: format_timestamp(voucher.created_at),
            redeemed_at: voucher.redeemed_at.map(format_timestamp),
            invoice_number: voucher.invoice_number,
            is_expired,
        }
    }
}

impl From<Voucher> for VoucherResponse {
    fn from(voucher: Voucher) -> Self {
        Self::from_voucher(voucher, Utc::now())
    }
}

/// RFC 3339, millisecond precision, `Z` suffix.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn issue(body: Value) -> IssueVoucherRequest {
        serde_json::from_value::<IssueVoucherRequest>(body)
            .unwrap()
            .normalized()
    }

    #[test]
    fn valid_issue_request_passes() {
        let req = issue(json!({ "amount": 50, "beneficiary": "Juan", "days": 10 }));
        assert!(req.validate_all().is_ok());
        assert_eq!(req.amount(), Some(50.0));
        assert_eq!(req.validity_days(), Some(10));
    }

    #[test]
    fn empty_request_reports_every_missing_field() {
        let req = issue(json!({}));
        let errors = req.validate_all().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("amount"));
        assert!(fields.contains_key("beneficiary"));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn null_amount_is_missing() {
        let req = issue(json!({ "amount": null, "beneficiary": "Ana" }));
        let errors = req.validate_all().unwrap_err();
        assert!(errors.field_errors().contains_key("amount"));
    }

    #[test]
    fn blank_beneficiary_is_missing() {
        let req = issue(json!({ "amount": 10, "beneficiary": "   " }));
        assert!(req.beneficiary.is_none());
        assert!(req.validate_all().unwrap_err().field_errors().contains_key("beneficiary"));
    }

    #[test]
    fn non_positive_amount_and_bad_days_rejected_together() {
        let req = issue(json!({ "amount": 0, "beneficiary": "Ana", "days": 0 }));
        let errors = req.validate_all().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("amount"));
        assert!(fields.contains_key("days"));

        let req = issue(json!({ "amount": -5, "beneficiary": "Ana", "days": 5000 }));
        let fields = req.validate_all().unwrap_err().field_errors().len();
        assert_eq!(fields, 2);
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let req = issue(json!({ "amount": "50", "beneficiary": "Juan", "days": " 7 " }));
        assert!(req.validate_all().is_ok());
        assert_eq!(req.amount(), Some(50.0));
        assert_eq!(req.validity_days(), Some(7));
    }

    #[test]
    fn mistyped_amount_is_listed_with_missing_fields() {
        let req = issue(json!({ "amount": "fifty" }));
        assert_eq!(req.amount, Some(NumberInput::Malformed));

        let errors = req.validate_all().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("amount"));
        assert!(fields.contains_key("beneficiary"));
    }

    #[test]
    fn fractional_or_mistyped_days_rejected() {
        for days in [json!(10.5), json!(true), json!("ten"), json!([10])] {
            let req = issue(json!({ "amount": 5, "beneficiary": "A", "days": days }));
            let errors = req.validate_all().unwrap_err();
            let fields = errors.field_errors();
            assert!(fields.contains_key("days"), "days {days} accepted");
            assert_eq!(fields.len(), 1);
        }
    }

    #[test]
    fn non_finite_amount_string_is_malformed() {
        let req = issue(json!({ "amount": "NaN", "beneficiary": "A" }));
        assert_eq!(req.amount, Some(NumberInput::Malformed));
        assert!(req.validate_all().is_err());
    }

    #[test]
    fn blank_optional_fields_become_none() {
        let req = issue(json!({
            "amount": 10,
            "beneficiary": " Ana ",
            "category": "",
            "invoice_number": "  "
        }));
        assert_eq!(req.beneficiary.as_deref(), Some("Ana"));
        assert!(req.category.is_none());
        assert!(req.invoice_number.is_none());
    }

    #[test]
    fn redeem_request_trims_invoice() {
        let req: RedeemVoucherRequest =
            serde_json::from_value(json!({ "invoice_number": " INV-1 " })).unwrap();
        assert_eq!(req.normalized().invoice_number.as_deref(), Some("INV-1"));
    }

    #[test]
    fn response_formats_millisecond_timestamps_and_expiry() {
        let created_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let voucher = Voucher {
            id: "PGM-1-AAAA".to_string(),
            amount: 50.0,
            currency: "USD".to_string(),
            beneficiary: "Juan".to_string(),
            category: None,
            expires_at: created_at + Duration::days(10),
            status: VoucherStatus::Valid,
            created_at,
            redeemed_at: None,
            invoice_number: None,
        };

        let fresh = VoucherResponse::from_voucher(voucher.clone(), created_at);
        assert_eq!(fresh.created_at, "2025-01-01T00:00:00.000Z");
        assert_eq!(fresh.expires_at, "2025-01-11T00:00:00.000Z");
        assert!(!fresh.is_expired);

        let late = VoucherResponse::from_voucher(voucher, created_at + Duration::days(11));
        assert!(late.is_expired);
        assert_eq!(late.status, VoucherStatus::Valid);
    }
}
