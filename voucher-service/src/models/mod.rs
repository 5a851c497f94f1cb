//! Domain models for voucher-service.

pub mod voucher;

pub use voucher::{NewVoucher, Voucher, VoucherStatus};
