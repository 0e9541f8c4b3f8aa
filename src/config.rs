//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub gateway: GatewayConfig,
    pub currency: CurrencyConfig,
    pub notification: NotificationConfig,
    pub admin: AdminConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

/// WebXPay merchant settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub checkout_url: String,
    pub secret_key: String,
    pub return_url: String,
    pub public_key_path: String,
    pub cms: String,
}

/// Settlement currency and the fixed conversion table into it
#[derive(Debug, Clone)]
pub struct CurrencyConfig {
    pub settlement_currency: String,
    pub default_currency: String,
    pub rates: HashMap<String, Decimal>,
}

/// Donor receipt settings
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// When unset, receipts are only logged
    pub mail_api_url: Option<String>,
    pub mail_api_token: Option<String>,
    pub from_address: String,
    pub organization_name: String,
    pub reference_prefix: String,
    pub site_url: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub api_key: String,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            gateway: GatewayConfig::from_env()?,
            currency: CurrencyConfig::from_env()?,
            notification: NotificationConfig::from_env()?,
            admin: AdminConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.logging.validate()?;
        self.gateway.validate()?;
        self.currency.validate()?;
        self.notification.validate()?;
        self.admin.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL").unwrap_or_default(),
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }

    /// The URL is only required when the server actually talks to PostgreSQL.
    pub fn require_url(&self) -> Result<&str, ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingVariable("DATABASE_URL".to_string()));
        }
        Ok(&self.url)
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(GatewayConfig {
            checkout_url: env::var("WEBXPAY_URL")
                .map_err(|_| ConfigError::MissingVariable("WEBXPAY_URL".to_string()))?,
            secret_key: env::var("WEBXPAY_SECRET")
                .map_err(|_| ConfigError::MissingVariable("WEBXPAY_SECRET".to_string()))?,
            return_url: env::var("WEBXPAY_RETURN_URL")
                .map_err(|_| ConfigError::MissingVariable("WEBXPAY_RETURN_URL".to_string()))?,
            public_key_path: env::var("WEBXPAY_PUBLIC_KEY_PATH")
                .unwrap_or_else(|_| "crypto/public_key.pem".to_string()),
            cms: env::var("WEBXPAY_CMS").unwrap_or_else(|_| "Rust".to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, url) in [
            ("WEBXPAY_URL", &self.checkout_url),
            ("WEBXPAY_RETURN_URL", &self.return_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be a valid URL",
                    name
                )));
            }
        }

        if self.secret_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue("WEBXPAY_SECRET".to_string()));
        }

        if self.public_key_path.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "WEBXPAY_PUBLIC_KEY_PATH".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        let mut rates = HashMap::new();
        rates.insert("USD".to_string(), Decimal::new(30845, 2));
        Self {
            settlement_currency: "LKR".to_string(),
            default_currency: "USD".to_string(),
            rates,
        }
    }
}

impl CurrencyConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let rates = match env::var("CURRENCY_RATES") {
            Ok(raw) => parse_rates(&raw)?,
            Err(_) => defaults.rates,
        };

        Ok(CurrencyConfig {
            settlement_currency: env::var("SETTLEMENT_CURRENCY")
                .map(|c| c.trim().to_uppercase())
                .unwrap_or(defaults.settlement_currency),
            default_currency: env::var("DEFAULT_DONOR_CURRENCY")
                .map(|c| c.trim().to_uppercase())
                .unwrap_or(defaults.default_currency),
            rates,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settlement_currency.len() != 3 {
            return Err(ConfigError::InvalidValue("SETTLEMENT_CURRENCY".to_string()));
        }

        if let Some((code, _)) = self.rates.iter().find(|(_, rate)| **rate <= Decimal::ZERO) {
            return Err(ConfigError::ValidationFailed(format!(
                "conversion rate for {} must be positive",
                code
            )));
        }

        if self.default_currency != self.settlement_currency
            && !self.rates.contains_key(&self.default_currency)
        {
            return Err(ConfigError::ValidationFailed(format!(
                "no conversion rate for default currency {}",
                self.default_currency
            )));
        }

        Ok(())
    }
}

/// Parses `USD=308.45,GBP=390.10` into a rate table keyed by upper-cased code.
pub fn parse_rates(raw: &str) -> Result<HashMap<String, Decimal>, ConfigError> {
    let mut rates = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (code, rate) = entry
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidValue(format!("CURRENCY_RATES entry '{}'", entry)))?;
        let rate = Decimal::from_str(rate.trim())
            .map_err(|_| ConfigError::InvalidValue(format!("CURRENCY_RATES rate '{}'", rate)))?;
        rates.insert(code.trim().to_uppercase(), rate);
    }
    Ok(rates)
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            mail_api_url: None,
            mail_api_token: None,
            from_address: "no-reply@baithulmal.lk".to_string(),
            organization_name: "CEYLON BAITHULMAL FUND".to_string(),
            reference_prefix: "CBF".to_string(),
            site_url: "https://baithulmal.lk".to_string(),
            contact_email: "c.baithulmal@gmail.com".to_string(),
            contact_phone: "(+94) 11 25 99 075".to_string(),
            timeout_secs: 15,
        }
    }
}

impl NotificationConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(NotificationConfig {
            mail_api_url: env::var("MAIL_API_URL").ok().filter(|v| !v.trim().is_empty()),
            mail_api_token: env::var("MAIL_API_TOKEN").ok().filter(|v| !v.trim().is_empty()),
            from_address: env::var("MAIL_FROM_ADDRESS").unwrap_or(defaults.from_address),
            organization_name: env::var("ORG_NAME").unwrap_or(defaults.organization_name),
            reference_prefix: env::var("RECEIPT_REFERENCE_PREFIX")
                .unwrap_or(defaults.reference_prefix),
            site_url: env::var("ORG_SITE_URL").unwrap_or(defaults.site_url),
            contact_email: env::var("ORG_CONTACT_EMAIL").unwrap_or(defaults.contact_email),
            contact_phone: env::var("ORG_CONTACT_PHONE").unwrap_or(defaults.contact_phone),
            timeout_secs: env::var("MAIL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("MAIL_TIMEOUT_SECS".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.mail_api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue(
                    "MAIL_API_URL must be a valid URL".to_string(),
                ));
            }
        }

        if !self.from_address.contains('@') {
            return Err(ConfigError::InvalidValue("MAIL_FROM_ADDRESS".to_string()));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("MAIL_TIMEOUT_SECS".to_string()));
        }

        Ok(())
    }
}

impl AdminConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(AdminConfig {
            api_key: env::var("ADMIN_API_KEY")
                .map_err(|_| ConfigError::MissingVariable("ADMIN_API_KEY".to_string()))?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.len() < 16 {
            return Err(ConfigError::ValidationFailed(
                "ADMIN_API_KEY must be at least 16 characters".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl From<std::num::ParseIntError> for ConfigError {
    fn from(_: std::num::ParseIntError) -> Self {
        ConfigError::InvalidValue("Failed to parse integer value".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> GatewayConfig {
        GatewayConfig {
            checkout_url: "https://webxpay.com/index.php?route=checkout/billing".to_string(),
            secret_key: "merchant-secret".to_string(),
            return_url: "https://example.org/payments/callback/".to_string(),
            public_key_path: "crypto/public_key.pem".to_string(),
            cms: "Rust".to_string(),
        }
    }

    #[test]
    fn test_server_config_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
        };

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_port_validation() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_allowed_origins: vec![],
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gateway_urls_must_be_http() {
        assert!(gateway().validate().is_ok());

        let mut config = gateway();
        config.return_url = "example.org/callback".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_rates() {
        let rates = parse_rates("usd=308.45, GBP=390.10,").unwrap();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates["USD"], Decimal::new(30845, 2));
        assert_eq!(rates["GBP"], Decimal::new(39010, 2));

        assert!(parse_rates("USD").is_err());
        assert!(parse_rates("USD=abc").is_err());
    }

    #[test]
    fn test_currency_config_rejects_missing_default_rate() {
        let mut config = CurrencyConfig::default();
        assert!(config.validate().is_ok());

        config.default_currency = "EUR".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_admin_key_length() {
        assert!(AdminConfig {
            api_key: "short".to_string()
        }
        .validate()
        .is_err());
        assert!(AdminConfig {
            api_key: "a-long-enough-admin-key".to_string()
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn test_database_url_required_on_demand() {
        let config = DatabaseConfig {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connection_timeout: 30,
            idle_timeout: None,
        };
        assert!(config.validate().is_ok());
        assert!(matches!(
            config.require_url(),
            Err(ConfigError::MissingVariable(_))
        ));
    }
}
