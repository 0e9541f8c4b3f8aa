use crate::payments::error::PaymentError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Gateway status code that marks a successful charge
pub const SUCCESS_STATUS_CODE: &str = "00";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Success => "Success",
            PaymentStatus::Failed => "Failed",
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// `"00"` is the only success code; anything else, including a missing code, fails
    pub fn from_gateway_code(code: Option<&str>) -> Self {
        match code {
            Some(SUCCESS_STATUS_CODE) => PaymentStatus::Success,
            _ => PaymentStatus::Failed,
        }
    }

    /// Stored statuses a callback reporting `self` may move a payment out of.
    ///
    /// A late `"00"` still captures a payment an earlier callback failed;
    /// nothing moves a `Success` payment.
    pub fn finalizable_from(&self) -> &'static [PaymentStatus] {
        match self {
            PaymentStatus::Success => &[PaymentStatus::Pending, PaymentStatus::Failed],
            PaymentStatus::Failed => &[PaymentStatus::Pending],
            PaymentStatus::Pending => &[],
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "success" => Ok(PaymentStatus::Success),
            "failed" => Ok(PaymentStatus::Failed),
            _ => Err(PaymentError::ValidationError {
                message: format!("unknown payment status: {}", value),
                field: Some("status".to_string()),
            }),
        }
    }
}

impl TryFrom<String> for PaymentStatus {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GatewayName {
    WebXPay,
}

impl GatewayName {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayName::WebXPay => "webxpay",
        }
    }
}

impl std::fmt::Display for GatewayName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Form the donor's browser posts to the gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub payment_url: String,
    pub params: BTreeMap<String, String>,
}

/// Raw parameters of a gateway callback, from the query string or a form body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub callback_id: Option<String>,
    #[serde(default)]
    pub status_code: Option<String>,
}

impl CallbackParams {
    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() && self.callback_id.is_none() && self.status_code.is_none()
    }

    /// Form fields take precedence; the query string is the fallback
    pub fn or(self, fallback: CallbackParams) -> CallbackParams {
        if self.is_empty() {
            fallback
        } else {
            self
        }
    }
}

/// A callback reduced to what reconciliation needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackEvent {
    pub transaction_id: String,
    pub status_code: Option<String>,
}

impl CallbackEvent {
    pub fn target_status(&self) -> PaymentStatus {
        PaymentStatus::from_gateway_code(self.status_code.as_deref())
    }
}
