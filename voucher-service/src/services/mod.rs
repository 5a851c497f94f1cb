//! Services module for voucher-service.

pub mod database;
pub mod id;
pub mod ledger;
pub mod metrics;

pub use database::{Database, VoucherStore};
pub use id::VoucherIdGenerator;
pub use ledger::{LedgerError, LedgerSettings, VoucherLedger};
pub use metrics::{get_metrics, init_metrics};
