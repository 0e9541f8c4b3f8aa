use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Public key error: {message}")]
    KeyError { message: String },

    #[error("Encryption failed: {message}")]
    EncryptionError { message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Gateway error: gateway={gateway}, message={message}")]
    GatewayError {
        gateway: String,
        message: String,
        retryable: bool,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::KeyError { .. } => false,
            PaymentError::EncryptionError { .. } => false,
            PaymentError::NetworkError { .. } => true,
            PaymentError::GatewayError { retryable, .. } => *retryable,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::ValidationError { .. } => 400,
            PaymentError::KeyError { .. } => 500,
            PaymentError::EncryptionError { .. } => 500,
            PaymentError::NetworkError { .. } => 503,
            PaymentError::GatewayError { .. } => 502,
        }
    }
}

impl From<PaymentError> for crate::error::AppError {
    fn from(err: PaymentError) -> Self {
        use crate::error::{
            AppError, AppErrorKind, ExternalError, InfrastructureError, ValidationError,
        };

        let kind = match &err {
            PaymentError::ValidationError { message, field } => {
                AppErrorKind::Validation(ValidationError::InvalidField {
                    field: field.clone().unwrap_or_else(|| "request".to_string()),
                    reason: message.clone(),
                })
            }
            PaymentError::KeyError { message } => {
                AppErrorKind::Infrastructure(InfrastructureError::Configuration {
                    message: message.clone(),
                })
            }
            _ => AppErrorKind::External(ExternalError::PaymentGateway {
                gateway: "webxpay".to_string(),
                message: err.to_string(),
                is_retryable: err.is_retryable(),
            }),
        };
        AppError::new(kind)
    }
}
