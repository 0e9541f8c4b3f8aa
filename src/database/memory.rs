use crate::database::contact_message_repository::{ContactMessage, NewContactMessage};
use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::payment_repository::{CategoryTotal, FailedPayment, NewPayment, Payment};
use crate::database::repository::{ContactMessageStore, Finalization, PaymentFilter, PaymentStore};
use crate::payments::types::PaymentStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct PaymentTables {
    payments: Vec<Payment>,
    failed: Vec<FailedPayment>,
    next_payment_id: i64,
    next_failed_id: i64,
}

/// A thread-safe in-memory payment store.
///
/// Both tables sit behind one lock so a failed transition and its snapshot
/// are written together, as the PostgreSQL transaction does.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    tables: Arc<RwLock<PaymentTables>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn filter_matches(filter: &PaymentFilter, payment: &Payment) -> bool {
    if let Some(name) = &filter.name {
        if !contains_ci(&payment.first_name, name) && !contains_ci(&payment.last_name, name) {
            return false;
        }
    }
    if let Some(country) = &filter.country {
        if !contains_ci(&payment.country, country) {
            return false;
        }
    }
    if let Some(category) = &filter.category {
        if &payment.donate_to != category {
            return false;
        }
    }
    if let Some((start, end)) = filter.date_range {
        let day = payment.created_at.date_naive();
        if day < start || day > end {
            return false;
        }
    }
    if let Some(status) = filter.status {
        if payment.status != status {
            return false;
        }
    }
    true
}

fn newest_first(a: &DateTime<Utc>, a_id: i64, b: &DateTime<Utc>, b_id: i64) -> std::cmp::Ordering {
    b.cmp(a).then(b_id.cmp(&a_id))
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn create(&self, payment: NewPayment) -> Result<Payment, DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables
            .payments
            .iter()
            .any(|p| p.transaction_id.eq_ignore_ascii_case(&payment.transaction_id))
        {
            return Err(DatabaseError::new(DatabaseErrorKind::UniqueViolation {
                constraint: Some("payments_transaction_id_key".to_string()),
            }));
        }

        tables.next_payment_id += 1;
        let now = Utc::now();
        let record = Payment {
            id: tables.next_payment_id,
            transaction_id: payment.transaction_id,
            first_name: payment.first_name,
            last_name: payment.last_name,
            email: payment.email,
            phone: payment.phone,
            address_line_one: payment.address_line_one,
            address_line_two: payment.address_line_two,
            city: payment.city,
            state: payment.state,
            postal_code: payment.postal_code,
            country: payment.country,
            donation_option: payment.donation_option,
            donate_to: payment.donate_to,
            message: payment.message,
            amount: payment.amount,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tables.payments.push(record.clone());
        Ok(record)
    }

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Payment>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .iter()
            .find(|p| p.transaction_id.eq_ignore_ascii_case(transaction_id))
            .cloned())
    }

    async fn finalize(
        &self,
        transaction_id: &str,
        status: PaymentStatus,
    ) -> Result<Option<Finalization>, DatabaseError> {
        let mut tables = self.tables.write().await;
        let Some(payment) = tables
            .payments
            .iter_mut()
            .find(|p| p.transaction_id.eq_ignore_ascii_case(transaction_id))
        else {
            return Ok(None);
        };

        if !status.finalizable_from().contains(&payment.status) {
            return Ok(Some(Finalization::AlreadyFinal(payment.clone())));
        }

        payment.status = status;
        payment.updated_at = Utc::now();
        let updated = payment.clone();

        if status == PaymentStatus::Failed {
            tables.next_failed_id += 1;
            let snapshot = FailedPayment {
                id: tables.next_failed_id,
                transaction_id: updated.transaction_id.clone(),
                first_name: updated.first_name.clone(),
                last_name: updated.last_name.clone(),
                email: updated.email.clone(),
                phone: updated.phone.clone(),
                address_line_one: updated.address_line_one.clone(),
                address_line_two: updated.address_line_two.clone(),
                city: updated.city.clone(),
                state: updated.state.clone(),
                postal_code: updated.postal_code.clone(),
                country: updated.country.clone(),
                donation_option: updated.donation_option.clone(),
                donate_to: updated.donate_to.clone(),
                amount: updated.amount,
                created_at: updated.updated_at,
            };
            tables.failed.push(snapshot);
        }

        Ok(Some(Finalization::Applied(updated)))
    }

    async fn search(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut found: Vec<Payment> = tables
            .payments
            .iter()
            .filter(|p| filter_matches(filter, p))
            .cloned()
            .collect();
        found.sort_by(|a, b| newest_first(&a.created_at, a.id, &b.created_at, b.id));
        if let Some(limit) = filter.limit {
            found.truncate(limit.max(0) as usize);
        }
        Ok(found)
    }

    async fn successful_total(
        &self,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Decimal, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Success)
            .filter(|p| from.map_or(true, |from| p.created_at >= from))
            .filter(|p| until.map_or(true, |until| p.created_at < until))
            .map(|p| p.amount)
            .sum())
    }

    async fn successful_totals_by_category(&self) -> Result<Vec<CategoryTotal>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
        for payment in tables
            .payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Success)
        {
            *totals.entry(payment.donate_to.clone()).or_default() += payment.amount;
        }

        let mut totals: Vec<CategoryTotal> = totals
            .into_iter()
            .map(|(donate_to, value)| CategoryTotal { donate_to, value })
            .collect();
        totals.sort_by(|a, b| b.value.cmp(&a.value).then(a.donate_to.cmp(&b.donate_to)));
        Ok(totals)
    }

    async fn list_failed(&self) -> Result<Vec<FailedPayment>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut failed = tables.failed.clone();
        failed.sort_by(|a, b| newest_first(&a.created_at, a.id, &b.created_at, b.id));
        Ok(failed)
    }

    async fn count_failed(&self) -> Result<i64, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.failed.len() as i64)
    }
}

/// A thread-safe in-memory contact message store.
#[derive(Default, Clone)]
pub struct InMemoryContactMessageStore {
    messages: Arc<RwLock<Vec<ContactMessage>>>,
}

impl InMemoryContactMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContactMessageStore for InMemoryContactMessageStore {
    async fn create(&self, message: NewContactMessage) -> Result<ContactMessage, DatabaseError> {
        let mut messages = self.messages.write().await;
        let record = ContactMessage {
            id: messages.len() as i64 + 1,
            name: message.name,
            email: message.email,
            phone: message.phone,
            message: message.message,
            created_at: Utc::now(),
        };
        messages.push(record.clone());
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<ContactMessage>, DatabaseError> {
        let messages = self.messages.read().await;
        let mut all = messages.clone();
        all.sort_by(|a, b| newest_first(&a.created_at, a.id, &b.created_at, b.id));
        Ok(all)
    }

    async fn count(&self) -> Result<i64, DatabaseError> {
        Ok(self.messages.read().await.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    fn new_payment(transaction_id: &str, first_name: &str, donate_to: &str) -> NewPayment {
        NewPayment {
            transaction_id: transaction_id.to_string(),
            first_name: first_name.to_string(),
            last_name: "Perera".to_string(),
            email: "donor@example.com".to_string(),
            phone: "0771234567".to_string(),
            address_line_one: String::new(),
            address_line_two: String::new(),
            city: "Colombo".to_string(),
            state: String::new(),
            postal_code: String::new(),
            country: "Sri Lanka".to_string(),
            donation_option: "one-time".to_string(),
            donate_to: donate_to.to_string(),
            message: String::new(),
            amount: dec!(1000.00),
        }
    }

    #[tokio::test]
    async fn finalize_applies_once() {
        let store = InMemoryPaymentStore::new();
        store
            .create(new_payment("ABC-1", "Amal", "General"))
            .await
            .unwrap();

        let first = store
            .finalize("abc-1", PaymentStatus::Success)
            .await
            .unwrap();
        assert!(matches!(first, Some(Finalization::Applied(ref p)) if p.status == PaymentStatus::Success));

        let second = store
            .finalize("ABC-1", PaymentStatus::Failed)
            .await
            .unwrap();
        assert!(matches!(second, Some(Finalization::AlreadyFinal(ref p)) if p.status == PaymentStatus::Success));
        assert_eq!(store.count_failed().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn success_recovers_failed_payment_once() {
        let store = InMemoryPaymentStore::new();
        store
            .create(new_payment("tx-late", "Rashid", "General"))
            .await
            .unwrap();

        store.finalize("tx-late", PaymentStatus::Failed).await.unwrap();
        let recovered = store
            .finalize("tx-late", PaymentStatus::Success)
            .await
            .unwrap();
        assert!(matches!(recovered, Some(Finalization::Applied(ref p)) if p.status == PaymentStatus::Success));

        let again = store
            .finalize("tx-late", PaymentStatus::Success)
            .await
            .unwrap();
        assert!(matches!(again, Some(Finalization::AlreadyFinal(_))));

        let repeat_failure = store
            .finalize("tx-late", PaymentStatus::Failed)
            .await
            .unwrap();
        assert!(matches!(repeat_failure, Some(Finalization::AlreadyFinal(ref p)) if p.status == PaymentStatus::Success));
        assert_eq!(store.count_failed().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_transition_records_snapshot() {
        let store = InMemoryPaymentStore::new();
        store
            .create(new_payment("tx-2", "Nimali", "Orphans"))
            .await
            .unwrap();
        store.finalize("tx-2", PaymentStatus::Failed).await.unwrap();

        let failed = store.list_failed().await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].transaction_id, "tx-2");
        assert_eq!(failed[0].donate_to, "Orphans");
    }

    #[tokio::test]
    async fn finalize_unknown_transaction_returns_none() {
        let store = InMemoryPaymentStore::new();
        assert!(store
            .finalize("missing", PaymentStatus::Success)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_transaction_id_is_rejected() {
        let store = InMemoryPaymentStore::new();
        store.create(new_payment("dup", "A", "General")).await.unwrap();
        let err = store
            .create(new_payment("DUP", "B", "General"))
            .await
            .unwrap_err();
        assert!(matches!(err.kind, DatabaseErrorKind::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn category_totals_only_count_success() {
        let store = InMemoryPaymentStore::new();
        for (id, category) in [("a", "General"), ("b", "General"), ("c", "Water"), ("d", "Water")] {
            store.create(new_payment(id, "X", category)).await.unwrap();
        }
        store.finalize("a", PaymentStatus::Success).await.unwrap();
        store.finalize("b", PaymentStatus::Success).await.unwrap();
        store.finalize("c", PaymentStatus::Success).await.unwrap();
        store.finalize("d", PaymentStatus::Failed).await.unwrap();

        let totals = store.successful_totals_by_category().await.unwrap();
        assert_eq!(
            totals,
            vec![
                CategoryTotal {
                    donate_to: "General".to_string(),
                    value: dec!(2000.00)
                },
                CategoryTotal {
                    donate_to: "Water".to_string(),
                    value: dec!(1000.00)
                },
            ]
        );
        assert_eq!(
            store.successful_total(None, None).await.unwrap(),
            dec!(3000.00)
        );
    }

    #[test]
    fn filter_combines_criteria() {
        let created_at = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let payment = Payment {
            id: 1,
            transaction_id: "t".to_string(),
            first_name: "Fathima".to_string(),
            last_name: "Rizvi".to_string(),
            email: "f@example.com".to_string(),
            phone: String::new(),
            address_line_one: String::new(),
            address_line_two: String::new(),
            city: String::new(),
            state: String::new(),
            postal_code: String::new(),
            country: "Sri Lanka".to_string(),
            donation_option: String::new(),
            donate_to: "Zakat".to_string(),
            message: String::new(),
            amount: dec!(10.00),
            status: PaymentStatus::Success,
            created_at,
            updated_at: created_at,
        };

        let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
        let mut filter = PaymentFilter {
            name: Some("riz".to_string()),
            country: Some("lanka".to_string()),
            category: Some("Zakat".to_string()),
            date_range: Some((day(15), day(15))),
            ..Default::default()
        };
        assert!(filter_matches(&filter, &payment));

        filter.category = Some("zakat".to_string());
        assert!(!filter_matches(&filter, &payment));

        filter.category = None;
        filter.date_range = Some((day(16), day(20)));
        assert!(!filter_matches(&filter, &payment));
    }

    #[tokio::test]
    async fn contact_messages_list_newest_first() {
        let store = InMemoryContactMessageStore::new();
        for name in ["first", "second"] {
            store
                .create(NewContactMessage {
                    name: name.to_string(),
                    email: "a@example.com".to_string(),
                    phone: String::new(),
                    message: "hello".to_string(),
                })
                .await
                .unwrap();
        }
        let listed = store.list().await.unwrap();
        assert_eq!(listed[0].name, "second");
        assert_eq!(store.count().await.unwrap(), 2);
    }
}
