use crate::config::{CurrencyConfig, GatewayConfig};
use crate::database::payment_repository::Payment;
use crate::payments::crypto::PaymentEncryptor;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{CallbackEvent, CallbackParams, CheckoutRequest, GatewayName};
use crate::payments::utils::format_amount;
use std::collections::BTreeMap;
use tracing::info;

pub const API_VERSION: &str = "5.2";
pub const ENC_METHOD: &str = "JCs3J+6oSz4V0LgE0zi/Bg==";

pub struct WebXPayGateway {
    config: GatewayConfig,
    settlement_currency: String,
    encryptor: PaymentEncryptor,
}

impl WebXPayGateway {
    pub fn new(
        config: GatewayConfig,
        settlement_currency: impl Into<String>,
        encryptor: PaymentEncryptor,
    ) -> Self {
        Self {
            config,
            settlement_currency: settlement_currency.into(),
            encryptor,
        }
    }

    /// Loads the merchant public key from `WEBXPAY_PUBLIC_KEY_PATH`
    pub fn from_config(config: &GatewayConfig, currency: &CurrencyConfig) -> PaymentResult<Self> {
        let encryptor = PaymentEncryptor::from_file(&config.public_key_path)?;
        Ok(Self::new(
            config.clone(),
            currency.settlement_currency.clone(),
            encryptor,
        ))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl PaymentGateway for WebXPayGateway {
    fn name(&self) -> GatewayName {
        GatewayName::WebXPay
    }

    fn build_checkout(&self, payment: &Payment) -> PaymentResult<CheckoutRequest> {
        let amount = format_amount(payment.amount);
        let token = self
            .encryptor
            .encrypt_payment(&payment.transaction_id, &amount)?;

        let mut params = BTreeMap::new();
        let mut put = |key: &str, value: &str| {
            params.insert(key.to_string(), value.to_string());
        };
        put("first_name", &payment.first_name);
        put("last_name", &payment.last_name);
        put("email", &payment.email);
        put("contact_number", &payment.phone);
        put("amount", &amount);
        put("currency", &self.settlement_currency);
        put("process_currency", &self.settlement_currency);
        put("secret_key", &self.config.secret_key);
        put("payment", &token);
        put("return_url", &self.config.return_url);
        put("callback_id", &payment.transaction_id);
        put("version", API_VERSION);
        put("enc_method", ENC_METHOD);
        put("cms", &self.config.cms);

        info!(
            transaction_id = %payment.transaction_id,
            amount = %amount,
            currency = %self.settlement_currency,
            "webxpay checkout prepared"
        );

        Ok(CheckoutRequest {
            payment_url: self.config.checkout_url.clone(),
            params,
        })
    }

    fn parse_callback(&self, params: &CallbackParams) -> PaymentResult<CallbackEvent> {
        let transaction_id = non_empty(&params.order_id)
            .or_else(|| non_empty(&params.callback_id))
            .ok_or(PaymentError::ValidationError {
                message: "order_id or callback_id is required".to_string(),
                field: Some("order_id".to_string()),
            })?;

        Ok(CallbackEvent {
            transaction_id: transaction_id.to_string(),
            status_code: params.status_code.clone(),
        })
    }
}
