use crate::database::payment_repository::{CategoryTotal, Payment};
use crate::database::repository::{ContactMessageStore, PaymentFilter, PaymentStore};
use crate::error::{AppError, AppResult, ValidationError};
use crate::payments::types::PaymentStatus;
use crate::payments::utils::format_amount;
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

const RECENT_DONATIONS: i64 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total: Decimal,
    pub month: Decimal,
    pub failed_total: i64,
    pub new_messages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentDonation {
    pub created_at: DateTime<Utc>,
    pub first_name: String,
    pub donate_to: String,
    pub amount: Decimal,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub summary: Summary,
    pub pie_chart: Vec<CategoryTotal>,
    pub recent: Vec<RecentDonation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DonationRow {
    pub transaction_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub amount: Decimal,
    pub country: String,
    pub donate_to: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for DonationRow {
    fn from(p: Payment) -> Self {
        Self {
            transaction_id: p.transaction_id,
            first_name: p.first_name,
            last_name: p.last_name,
            email: p.email,
            phone: p.phone,
            amount: p.amount,
            country: p.country,
            donate_to: p.donate_to,
            status: p.status,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedRow {
    pub transaction_id: String,
    pub first_name: String,
    pub email: String,
    pub amount: Decimal,
    pub donate_to: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageRow {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Query string of the donations table. Blank values are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DonationQuery {
    pub name: Option<String>,
    pub country: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_date(field: &str, value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        AppError::validation(ValidationError::InvalidField {
            field: field.to_string(),
            reason: "expected YYYY-MM-DD".to_string(),
        })
    })
}

impl DonationQuery {
    /// The date range only applies when both bounds are given
    pub fn to_filter(&self) -> AppResult<PaymentFilter> {
        let start = present(&self.start_date)
            .map(|v| parse_date("start_date", &v))
            .transpose()?;
        let end = present(&self.end_date)
            .map(|v| parse_date("end_date", &v))
            .transpose()?;

        Ok(PaymentFilter {
            name: present(&self.name),
            country: present(&self.country),
            category: present(&self.category),
            date_range: start.zip(end),
            status: None,
            limit: None,
        })
    }
}

/// `[first day of month, first day of next month)` in UTC
fn month_bounds(now: DateTime<Utc>) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    let start = now
        .date_naive()
        .with_day(1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
        .ok_or_else(|| AppError::internal("cannot compute start of month"))?;
    let end = start
        .checked_add_months(Months::new(1))
        .ok_or_else(|| AppError::internal("cannot compute end of month"))?;
    Ok((start, end))
}

#[derive(Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Donor Name")]
    donor_name: String,
    #[serde(rename = "Category")]
    category: &'a str,
    #[serde(rename = "Amount")]
    amount: String,
}

/// Read-only views for the admin dashboard
pub struct DashboardService {
    payments: Arc<dyn PaymentStore>,
    messages: Arc<dyn ContactMessageStore>,
}

impl DashboardService {
    pub fn new(payments: Arc<dyn PaymentStore>, messages: Arc<dyn ContactMessageStore>) -> Self {
        Self { payments, messages }
    }

    pub async fn stats(&self, now: DateTime<Utc>) -> AppResult<DashboardStats> {
        let (month_start, month_end) = month_bounds(now)?;

        let total = self.payments.successful_total(None, None).await?;
        let month = self
            .payments
            .successful_total(Some(month_start), Some(month_end))
            .await?;
        let failed_total = self.payments.count_failed().await?;
        let new_messages = self.messages.count().await?;
        let pie_chart = self.payments.successful_totals_by_category().await?;

        let recent = self
            .payments
            .search(&PaymentFilter {
                status: Some(PaymentStatus::Success),
                limit: Some(RECENT_DONATIONS),
                ..Default::default()
            })
            .await?
            .into_iter()
            .map(|p| RecentDonation {
                created_at: p.created_at,
                first_name: p.first_name,
                donate_to: p.donate_to,
                amount: p.amount,
                transaction_id: p.transaction_id,
            })
            .collect();

        Ok(DashboardStats {
            summary: Summary {
                total,
                month,
                failed_total,
                new_messages,
            },
            pie_chart,
            recent,
        })
    }

    pub async fn donations(&self, query: &DonationQuery) -> AppResult<Vec<DonationRow>> {
        let filter = query.to_filter()?;
        debug!(?filter, "Searching donations");
        Ok(self
            .payments
            .search(&filter)
            .await?
            .into_iter()
            .map(DonationRow::from)
            .collect())
    }

    pub async fn failed_payments(&self) -> AppResult<Vec<FailedRow>> {
        Ok(self
            .payments
            .list_failed()
            .await?
            .into_iter()
            .map(|f| FailedRow {
                transaction_id: f.transaction_id,
                first_name: f.first_name,
                email: f.email,
                amount: f.amount,
                donate_to: f.donate_to,
                created_at: f.created_at,
            })
            .collect())
    }

    pub async fn messages(&self) -> AppResult<Vec<MessageRow>> {
        Ok(self
            .messages
            .list()
            .await?
            .into_iter()
            .map(|m| MessageRow {
                name: m.name,
                email: m.email,
                phone: m.phone,
                message: m.message,
                created_at: m.created_at,
            })
            .collect())
    }

    /// CSV report of successful donations, newest first
    pub async fn export_csv(&self) -> AppResult<String> {
        let donations = self
            .payments
            .search(&PaymentFilter {
                status: Some(PaymentStatus::Success),
                ..Default::default()
            })
            .await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        for p in &donations {
            writer
                .serialize(ExportRow {
                    date: p.created_at.format("%Y-%m-%d").to_string(),
                    donor_name: p.full_name(),
                    category: &p.donate_to,
                    amount: format_amount(p.amount),
                })
                .map_err(|e| AppError::internal(format!("csv write failed: {}", e)))?;
        }

        if donations.is_empty() {
            writer
                .write_record(["Date", "Donor Name", "Category", "Amount"])
                .map_err(|e| AppError::internal(format!("csv write failed: {}", e)))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::internal(format!("csv flush failed: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| AppError::internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::contact_message_repository::NewContactMessage;
    use crate::database::memory::{InMemoryContactMessageStore, InMemoryPaymentStore};
    use crate::database::payment_repository::NewPayment;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn new_payment(id: &str, first: &str, donate_to: &str, amount: Decimal) -> NewPayment {
        NewPayment {
            transaction_id: id.to_string(),
            first_name: first.to_string(),
            last_name: "Silva".to_string(),
            email: format!("{}@example.com", first.to_lowercase()),
            phone: String::new(),
            address_line_one: String::new(),
            address_line_two: String::new(),
            city: String::new(),
            state: String::new(),
            postal_code: String::new(),
            country: "Sri Lanka".to_string(),
            donation_option: String::new(),
            donate_to: donate_to.to_string(),
            message: String::new(),
            amount,
        }
    }

    async fn seeded() -> DashboardService {
        let payments = Arc::new(InMemoryPaymentStore::new());
        let messages = Arc::new(InMemoryContactMessageStore::new());

        payments
            .create(new_payment("t1", "Amal", "General", dec!(100.00)))
            .await
            .unwrap();
        payments
            .create(new_payment("t2", "Bushra", "Water", dec!(250.50)))
            .await
            .unwrap();
        payments
            .create(new_payment("t3", "Chamal", "Water", dec!(75.00)))
            .await
            .unwrap();
        payments
            .create(new_payment("t4", "Dilshan", "General", dec!(999.99)))
            .await
            .unwrap();
        payments.finalize("t1", PaymentStatus::Success).await.unwrap();
        payments.finalize("t2", PaymentStatus::Success).await.unwrap();
        payments.finalize("t3", PaymentStatus::Failed).await.unwrap();

        messages
            .create(NewContactMessage {
                name: "Visitor".to_string(),
                email: "v@example.com".to_string(),
                phone: String::new(),
                message: "Hi".to_string(),
            })
            .await
            .unwrap();

        DashboardService::new(payments, messages)
    }

    #[tokio::test]
    async fn stats_aggregate_successful_donations() {
        let stats = seeded().await.stats(Utc::now()).await.unwrap();

        assert_eq!(stats.summary.total, dec!(350.50));
        assert_eq!(stats.summary.month, dec!(350.50));
        assert_eq!(stats.summary.failed_total, 1);
        assert_eq!(stats.summary.new_messages, 1);
        assert_eq!(stats.pie_chart.len(), 2);
        assert_eq!(stats.pie_chart[0].donate_to, "Water");
        assert_eq!(stats.recent.len(), 2);
    }

    #[tokio::test]
    async fn month_excludes_other_months() {
        let next_year = Utc::now() + chrono::Duration::days(400);
        let stats = seeded().await.stats(next_year).await.unwrap();
        assert_eq!(stats.summary.month, Decimal::ZERO);
        assert_eq!(stats.summary.total, dec!(350.50));
    }

    #[test]
    fn month_bounds_cover_calendar_month() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let (start, end) = month_bounds(now).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn donations_filter_by_name_and_category() {
        let service = seeded().await;

        let rows = service
            .donations(&DonationQuery {
                name: Some("bush".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].transaction_id, "t2");

        let rows = service
            .donations(&DonationQuery {
                category: Some("General".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].transaction_id, "t4");
    }

    #[test]
    fn date_range_requires_both_bounds() {
        let query = DonationQuery {
            start_date: Some("2024-01-01".to_string()),
            ..Default::default()
        };
        assert!(query.to_filter().unwrap().date_range.is_none());

        let query = DonationQuery {
            start_date: Some("2024-01-01".to_string()),
            end_date: Some("2024-01-31".to_string()),
            ..Default::default()
        };
        assert!(query.to_filter().unwrap().date_range.is_some());

        let query = DonationQuery {
            start_date: Some("01/02/2024".to_string()),
            end_date: Some("2024-01-31".to_string()),
            ..Default::default()
        };
        assert_eq!(query.to_filter().unwrap_err().status_code(), 400);
    }

    #[tokio::test]
    async fn export_lists_successful_donations() {
        let csv = seeded().await.export_csv().await.unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "Date,Donor Name,Category,Amount");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with("Bushra Silva,Water,250.50"));
        assert!(lines[2].ends_with("Amal Silva,General,100.00"));
    }

    #[tokio::test]
    async fn failed_and_messages_views() {
        let service = seeded().await;
        let failed = service.failed_payments().await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].transaction_id, "t3");

        let messages = service.messages().await.unwrap();
        assert_eq!(messages[0].name, "Visitor");
    }
}
