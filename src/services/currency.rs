use crate::config::CurrencyConfig;
use crate::error::ValidationError;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use tracing::debug;

/// Largest value a `NUMERIC(10, 2)` column holds
pub const MAX_SETTLEMENT_AMOUNT: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

/// Converts donor amounts into the settlement currency using a fixed rate table
#[derive(Debug, Clone)]
pub struct CurrencyConverter {
    config: CurrencyConfig,
}

impl CurrencyConverter {
    pub fn new(config: CurrencyConfig) -> Self {
        Self { config }
    }

    pub fn settlement_currency(&self) -> &str {
        &self.config.settlement_currency
    }

    /// Parse `amount` in `currency` and return it in the settlement currency,
    /// rounded half-up to two decimal places.
    pub fn normalize(
        &self,
        amount: &str,
        currency: Option<&str>,
    ) -> Result<Decimal, ValidationError> {
        let currency = currency
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.config.default_currency.clone());

        let raw = amount.trim();
        if raw.is_empty() {
            return Err(ValidationError::MissingField {
                field: "amount".to_string(),
            });
        }

        let parsed = Decimal::from_str(raw).map_err(|_| ValidationError::InvalidAmount {
            amount: raw.to_string(),
            reason: "Amount must be a number".to_string(),
        })?;

        if parsed <= Decimal::ZERO {
            return Err(ValidationError::InvalidAmount {
                amount: raw.to_string(),
                reason: "Amount must be greater than zero".to_string(),
            });
        }

        let rate = if currency == self.config.settlement_currency {
            Decimal::ONE
        } else {
            *self
                .config
                .rates
                .get(&currency)
                .ok_or_else(|| ValidationError::InvalidCurrency {
                    currency: currency.clone(),
                    reason: "No conversion rate configured".to_string(),
                })?
        };

        let mut converted = parsed
            .checked_mul(rate)
            .map(|v| v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
            .ok_or_else(|| ValidationError::InvalidAmount {
                amount: raw.to_string(),
                reason: "Amount is too large".to_string(),
            })?;

        if converted <= Decimal::ZERO {
            return Err(ValidationError::InvalidAmount {
                amount: raw.to_string(),
                reason: "Amount rounds to zero".to_string(),
            });
        }

        if converted > MAX_SETTLEMENT_AMOUNT {
            return Err(ValidationError::InvalidAmount {
                amount: raw.to_string(),
                reason: format!(
                    "Amount exceeds {} {}",
                    MAX_SETTLEMENT_AMOUNT, self.config.settlement_currency
                ),
            });
        }

        converted.rescale(2);

        debug!(
            currency = %currency,
            rate = %rate,
            settlement_amount = %converted,
            "Normalized donation amount"
        );

        Ok(converted)
    }
}
