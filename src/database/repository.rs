//! Storage seams shared by the PostgreSQL repositories and the in-memory store

use crate::database::contact_message_repository::{ContactMessage, NewContactMessage};
use crate::database::error::DatabaseError;
use crate::database::payment_repository::{CategoryTotal, FailedPayment, NewPayment, Payment};
use crate::payments::types::PaymentStatus;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

/// Result of finalizing a payment from a gateway callback
#[derive(Debug, Clone)]
pub enum Finalization {
    /// This call performed the transition
    Applied(Payment),
    /// The stored status does not allow the transition; nothing changed
    AlreadyFinal(Payment),
}

/// Dashboard search criteria. Every field is optional and they combine with AND.
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    /// Case-insensitive substring of first or last name
    pub name: Option<String>,
    /// Case-insensitive substring of country
    pub country: Option<String>,
    /// Exact `donate_to` value
    pub category: Option<String>,
    /// Inclusive calendar-date range on `created_at` (UTC)
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub status: Option<PaymentStatus>,
    pub limit: Option<i64>,
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert a new `Pending` payment
    async fn create(&self, payment: NewPayment) -> Result<Payment, DatabaseError>;

    /// Case-insensitive lookup by transaction id
    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Payment>, DatabaseError>;

    /// Atomically move a payment to `status` when its stored status is one of
    /// `status.finalizable_from()`.
    ///
    /// A transition to `Failed` records a failed-payment snapshot in the same
    /// unit of work. Returns `None` when no payment matches.
    async fn finalize(
        &self,
        transaction_id: &str,
        status: PaymentStatus,
    ) -> Result<Option<Finalization>, DatabaseError>;

    /// Newest first
    async fn search(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, DatabaseError>;

    /// Sum of successful amounts created in `[from, until)`
    async fn successful_total(
        &self,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Decimal, DatabaseError>;

    async fn successful_totals_by_category(&self) -> Result<Vec<CategoryTotal>, DatabaseError>;

    /// Newest first
    async fn list_failed(&self) -> Result<Vec<FailedPayment>, DatabaseError>;

    async fn count_failed(&self) -> Result<i64, DatabaseError>;
}

#[async_trait]
pub trait ContactMessageStore: Send + Sync {
    async fn create(&self, message: NewContactMessage) -> Result<ContactMessage, DatabaseError>;

    /// Newest first
    async fn list(&self) -> Result<Vec<ContactMessage>, DatabaseError>;

    async fn count(&self) -> Result<i64, DatabaseError>;
}
