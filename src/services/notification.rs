use crate::config::NotificationConfig;
use crate::database::payment_repository::Payment;
use crate::logging::mask_email;
use crate::payments::utils::format_amount;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const MAX_SEND_ATTEMPTS: u32 = 3;
const INITIAL_RETRY_DELAY_MS: u64 = 250;
const MAX_RETRY_DELAY_MS: u64 = 2_000;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Mail API request failed: {0}")]
    Transport(String),
    #[error("Mail API rejected receipt: status={status}, body={body}")]
    Rejected { status: u16, body: String },
    #[error("Mail client configuration error: {0}")]
    Configuration(String),
}

impl NotificationError {
    pub fn is_retryable(&self) -> bool {
        match self {
            NotificationError::Transport(_) => true,
            NotificationError::Rejected { status, .. } => *status >= 500 || *status == 429,
            NotificationError::Configuration(_) => false,
        }
    }
}

/// A rendered donation receipt ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub to: String,
    pub subject: String,
    pub reference: String,
    pub html_body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_receipt(&self, receipt: &Receipt) -> Result<(), NotificationError>;
}

/// Used when no mail API is configured; receipts are written to the log only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_receipt(&self, receipt: &Receipt) -> Result<(), NotificationError> {
        info!(
            to = %mask_email(&receipt.to),
            reference = %receipt.reference,
            subject = %receipt.subject,
            "🔔 NOTIFICATION: donation receipt (log transport)"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct MailApiRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Delivers receipts through a JSON mail API with bearer-token auth
pub struct MailApiNotifier {
    client: Client,
    url: String,
    token: Option<String>,
    from_address: String,
}

impl MailApiNotifier {
    pub fn new(
        url: impl Into<String>,
        token: Option<String>,
        from_address: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Donations-Backend/1.0")
            .build()
            .map_err(|e| NotificationError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            token,
            from_address: from_address.into(),
        })
    }

    async fn send_once(&self, receipt: &Receipt) -> Result<(), NotificationError> {
        let body = MailApiRequest {
            from: &self.from_address,
            to: [receipt.to.as_str()],
            subject: &receipt.subject,
            html: &receipt.html_body,
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(NotificationError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    fn retry_delay(attempt: u32) -> Duration {
        let delay = INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt - 1);
        Duration::from_millis(std::cmp::min(delay, MAX_RETRY_DELAY_MS))
    }
}

#[async_trait]
impl Notifier for MailApiNotifier {
    async fn send_receipt(&self, receipt: &Receipt) -> Result<(), NotificationError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send_once(receipt).await {
                Ok(()) => {
                    info!(
                        to = %mask_email(&receipt.to),
                        reference = %receipt.reference,
                        attempt = attempt,
                        "Donation receipt delivered"
                    );
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < MAX_SEND_ATTEMPTS => {
                    let delay = Self::retry_delay(attempt);
                    warn!(
                        attempt = attempt,
                        max_attempts = MAX_SEND_ATTEMPTS,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Receipt delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Pick the transport from configuration
pub fn notifier_from_config(
    config: &NotificationConfig,
) -> Result<std::sync::Arc<dyn Notifier>, NotificationError> {
    match &config.mail_api_url {
        Some(url) => Ok(std::sync::Arc::new(MailApiNotifier::new(
            url.clone(),
            config.mail_api_token.clone(),
            config.from_address.clone(),
            Duration::from_secs(config.timeout_secs),
        )?)),
        None => {
            info!("MAIL_API_URL not set; receipts will only be logged");
            Ok(std::sync::Arc::new(LogNotifier))
        }
    }
}

pub(crate) fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Builds the thank-you receipt sent after a successful donation
#[derive(Debug, Clone)]
pub struct ReceiptRenderer {
    config: NotificationConfig,
    currency: String,
}

impl ReceiptRenderer {
    pub fn new(config: NotificationConfig, currency: impl Into<String>) -> Self {
        Self {
            config,
            currency: currency.into(),
        }
    }

    pub fn reference(&self, payment: &Payment, at: DateTime<Utc>) -> String {
        format!(
            "{}-{}{}-{}",
            self.config.reference_prefix,
            payment.first_name.replace(' ', ""),
            payment.last_name.replace(' ', ""),
            at.format("%Y%m%d%H%M")
        )
    }

    pub fn render(&self, payment: &Payment, at: DateTime<Utc>) -> Receipt {
        let org = &self.config.organization_name;
        let subject = format!(
            "{} | YOUR DONATION | {} | {}",
            org,
            at.format("%d/%m/%Y"),
            at.format("%H:%M")
        );
        let reference = self.reference(payment, at);
        let full_name = escape_html(&payment.full_name());
        let amount = format!("{} {}", self.currency, format_amount(payment.amount));

        let row = |label: &str, value: &str| {
            format!(
                "<tr><td style=\"padding: 8px 0; font-weight: bold; width: 150px;\">{}:</td>\
                 <td style=\"padding: 8px 0;\">{}</td></tr>",
                label, value
            )
        };

        let rows = [
            row("Ref No", &escape_html(&reference)),
            row("Name", &full_name),
            row("Donation Type", &escape_html(&payment.donation_option)),
            row("Appeal", &escape_html(&payment.donate_to)),
            row("Country", &escape_html(&payment.country)),
            row("Date | Time", &at.format("%d/%m/%Y | %H:%M").to_string()),
            row("Amount", &amount),
        ]
        .concat();

        let html_body = format!(
            r#"<html>
  <body style="font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; color: #333; line-height: 1.6;">
    <div style="max-width: 650px; margin: auto; padding: 20px;">
      <h2 style="color: #2c5e77; text-transform: uppercase; border-bottom: 2px solid #92BC13;">{org}</h2>
      <p>Dear Sir/Madam <strong>{full_name}</strong>,</p>
      <p>Thank you for your valuable donation. Your support helps us serve better and reach more people.</p>
      <div style="background: #f9f9f9; padding: 25px; border-left: 5px solid #92BC13; margin: 20px 0;">
        <h3 style="color: #92BC13; margin-top: 0;">YOUR DONATION DETAILS</h3>
        <table style="width: 100%; border-collapse: collapse;">{rows}</table>
      </div>
      <p style="font-style: italic;">May Allah reward you and your family.</p>
      <hr style="border: none; border-top: 1px solid #eee;">
      <div style="font-size: 13px; color: #666;">
        <p><a href="{site}">{site}</a> | <a href="mailto:{email}">{email}</a><br>{phone}</p>
      </div>
    </div>
  </body>
</html>"#,
            org = escape_html(org),
            full_name = full_name,
            rows = rows,
            site = escape_html(&self.config.site_url),
            email = escape_html(&self.config.contact_email),
            phone = escape_html(&self.config.contact_phone),
        );

        Receipt {
            to: payment.email.clone(),
            subject,
            reference,
            html_body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::PaymentStatus;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn payment() -> Payment {
        let now = Utc::now();
        Payment {
            id: 7,
            transaction_id: "7d0f3f4e-0000-4000-8000-000000000001".to_string(),
            first_name: "Mohamed Ali".to_string(),
            last_name: "Fazal".to_string(),
            email: "m.fazal@example.com".to_string(),
            phone: "94771234567".to_string(),
            address_line_one: String::new(),
            address_line_two: String::new(),
            city: String::new(),
            state: String::new(),
            postal_code: String::new(),
            country: "Sri Lanka".to_string(),
            donation_option: "Sadaqah".to_string(),
            donate_to: "Water <Wells>".to_string(),
            message: String::new(),
            amount: dec!(3084.5),
            status: PaymentStatus::Success,
            created_at: now,
            updated_at: now,
        }
    }

    fn renderer() -> ReceiptRenderer {
        ReceiptRenderer::new(NotificationConfig::default(), "LKR")
    }

    #[test]
    fn subject_and_reference_use_receipt_time() {
        let at = Utc.with_ymd_and_hms(2024, 1, 5, 9, 7, 0).unwrap();
        let receipt = renderer().render(&payment(), at);

        assert_eq!(
            receipt.subject,
            "CEYLON BAITHULMAL FUND | YOUR DONATION | 05/01/2024 | 09:07"
        );
        assert_eq!(receipt.reference, "CBF-MohamedAliFazal-202401050907");
        assert_eq!(receipt.to, "m.fazal@example.com");
    }

    #[test]
    fn body_lists_donation_details() {
        let at = Utc.with_ymd_and_hms(2024, 1, 5, 9, 7, 0).unwrap();
        let body = renderer().render(&payment(), at).html_body;

        assert!(body.contains("LKR 3084.50"));
        assert!(body.contains("05/01/2024 | 09:07"));
        assert!(body.contains("Sadaqah"));
        assert!(body.contains("Mohamed Ali Fazal"));
        assert!(body.contains("Water &lt;Wells&gt;"));
        assert!(!body.contains("<Wells>"));
    }

    #[test]
    fn rejected_status_retryability() {
        assert!(NotificationError::Rejected {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!NotificationError::Rejected {
            status: 400,
            body: String::new()
        }
        .is_retryable());
        assert!(NotificationError::Transport("reset".to_string()).is_retryable());
    }

    #[test]
    fn retry_delay_is_capped() {
        assert_eq!(MailApiNotifier::retry_delay(1), Duration::from_millis(250));
        assert_eq!(MailApiNotifier::retry_delay(2), Duration::from_millis(500));
        assert_eq!(MailApiNotifier::retry_delay(10), Duration::from_millis(2_000));
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let receipt = renderer().render(&payment(), Utc::now());
        assert!(LogNotifier.send_receipt(&receipt).await.is_ok());
    }

    #[test]
    fn notifier_defaults_to_log_transport() {
        assert!(notifier_from_config(&NotificationConfig::default()).is_ok());
    }
}
