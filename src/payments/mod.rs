pub mod crypto;
pub mod error;
pub mod provider;
pub mod types;
pub mod utils;
pub mod webxpay;
