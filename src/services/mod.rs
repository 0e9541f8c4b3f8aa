//! Services module for business logic and integrations

pub mod callback_processor;
pub mod contact;
pub mod currency;
pub mod dashboard;
pub mod donation;
pub mod notification;

pub use callback_processor::{CallbackError, CallbackOutcome, CallbackProcessor};
pub use currency::CurrencyConverter;
pub use notification::{LogNotifier, MailApiNotifier, Notifier, Receipt, ReceiptRenderer};
