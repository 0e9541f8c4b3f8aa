use crate::database::payment_repository::NewPayment;
use crate::database::repository::PaymentStore;
use crate::error::{AppError, AppResult, ValidationError};
use crate::logging::mask_email;
use crate::payments::provider::PaymentGateway;
use crate::payments::types::CheckoutRequest;
use crate::services::currency::CurrencyConverter;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Donor form as posted by the donation page
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DonationForm {
    pub currency_preference: Option<String>,
    pub amount: Option<String>,
    pub other_amount: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address_line_one: Option<String>,
    pub address_line_two: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub donation_option: Option<String>,
    pub donate_to: Option<String>,
    pub message: Option<String>,
}

impl DonationForm {
    /// `amount` may be the literal `other`, in which case `other_amount` carries the value
    pub fn effective_amount(&self) -> Option<&str> {
        let amount = self.amount.as_deref().map(str::trim)?;
        if amount.eq_ignore_ascii_case("other") {
            self.other_amount.as_deref().map(str::trim)
        } else {
            Some(amount)
        }
    }
}

fn text_or(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn digits_only(value: &Option<String>) -> String {
    value
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect()
}

/// Records a pending donation and prepares the gateway redirect
pub struct DonationService {
    payments: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    converter: CurrencyConverter,
}

impl DonationService {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        converter: CurrencyConverter,
    ) -> Self {
        Self {
            payments,
            gateway,
            converter,
        }
    }

    pub async fn create_donation(&self, form: DonationForm) -> AppResult<CheckoutRequest> {
        let amount = form
            .effective_amount()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| {
                AppError::validation(ValidationError::MissingField {
                    field: "amount".to_string(),
                })
            })?;

        let settlement_amount = self
            .converter
            .normalize(amount, form.currency_preference.as_deref())
            .map_err(AppError::validation)?;

        let new_payment = NewPayment {
            transaction_id: Uuid::new_v4().to_string(),
            first_name: text_or(&form.first_name, "Donor"),
            last_name: text_or(&form.last_name, "User"),
            email: text_or(&form.email, ""),
            phone: digits_only(&form.phone),
            address_line_one: text_or(&form.address_line_one, ""),
            address_line_two: text_or(&form.address_line_two, ""),
            city: text_or(&form.city, ""),
            state: text_or(&form.state, ""),
            postal_code: text_or(&form.postal_code, ""),
            country: text_or(&form.country, "Sri Lanka"),
            donation_option: text_or(&form.donation_option, ""),
            donate_to: text_or(&form.donate_to, "General"),
            message: text_or(&form.message, ""),
            amount: settlement_amount,
        };

        let payment = self.payments.create(new_payment).await?;

        info!(
            transaction_id = %payment.transaction_id,
            amount = %payment.amount,
            currency = %self.converter.settlement_currency(),
            donate_to = %payment.donate_to,
            email = %mask_email(&payment.email),
            gateway = %self.gateway.name(),
            "Pending donation recorded"
        );

        Ok(self.gateway.build_checkout(&payment)?)
    }
}
