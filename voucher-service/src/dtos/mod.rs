pub mod vouchers;

pub use vouchers::{IssueVoucherRequest, NumberInput, RedeemVoucherRequest, VoucherResponse};
