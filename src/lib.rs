//! Donation collection backend: WebXPay checkout, callback reconciliation,
//! donor receipts, contact messages and an admin dashboard.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod payments;
pub mod services;
