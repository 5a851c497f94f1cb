//! Voucher Service - issue, verify and redeem single-use monetary vouchers.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
