//! RSA encryption of the `transaction_id|amount` token the gateway expects

use crate::payments::error::{PaymentError, PaymentResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use std::path::Path;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct PaymentEncryptor {
    public_key: RsaPublicKey,
}

impl PaymentEncryptor {
    pub fn new(public_key: RsaPublicKey) -> Self {
        Self { public_key }
    }

    /// Accepts both `BEGIN PUBLIC KEY` (SPKI) and `BEGIN RSA PUBLIC KEY` (PKCS#1) PEM
    pub fn from_pem(pem: &str) -> PaymentResult<Self> {
        let pem = pem.trim();
        let public_key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| PaymentError::KeyError {
                message: format!("invalid RSA public key: {}", e),
            })?;
        Ok(Self { public_key })
    }

    pub fn from_file(path: impl AsRef<Path>) -> PaymentResult<Self> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path).map_err(|e| {
            error!(path = %path.display(), error = %e, "Gateway public key not readable");
            PaymentError::KeyError {
                message: format!("public key not found at {}: {}", path.display(), e),
            }
        })?;
        let encryptor = Self::from_pem(&pem)?;
        info!(path = %path.display(), "Gateway public key loaded");
        Ok(encryptor)
    }

    /// PKCS#1 v1.5 encryption of `"<transaction_id>|<amount>"`, base64 encoded
    pub fn encrypt_payment(&self, transaction_id: &str, amount: &str) -> PaymentResult<String> {
        let plaintext = format!("{}|{}", transaction_id, amount);
        let mut rng = rand::thread_rng();
        let encrypted = self
            .public_key
            .encrypt(&mut rng, Pkcs1v15Encrypt, plaintext.as_bytes())
            .map_err(|e| {
                error!(error = %e, "Payment token encryption failed");
                PaymentError::EncryptionError {
                    message: e.to_string(),
                }
            })?;
        Ok(STANDARD.encode(encrypted))
    }
}
