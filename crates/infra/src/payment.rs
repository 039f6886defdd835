//! Payment signature verification.
//!
//! The gateway signs `"{order_id}|{payment_id}"` with HMAC-SHA256 under the
//! shared secret and sends the digest hex-encoded. Order creation is the
//! gateway's business; this side only checks the signature.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::config::AppConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("invalid payment signature")]
    InvalidSignature,

    #[error("payment key rejected: {0}")]
    Key(String),
}

#[derive(Clone)]
pub struct PaymentVerifier {
    secret: String,
}

impl core::fmt::Debug for PaymentVerifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PaymentVerifier").finish_non_exhaustive()
    }
}

impl PaymentVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Option<Self> {
        config.payment_secret.as_deref().map(Self::new)
    }

    fn mac(&self, order_id: &str, payment_id: &str) -> Result<HmacSha256, PaymentError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| PaymentError::Key(e.to_string()))?;
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        Ok(mac)
    }

    /// Hex signature the gateway would send for this pair.
    pub fn sign(&self, order_id: &str, payment_id: &str) -> Result<String, PaymentError> {
        let mac = self.mac(order_id, payment_id)?;
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Constant-time comparison against the hex signature.
    pub fn verify(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), PaymentError> {
        let expected = hex::decode(signature.trim()).map_err(|_| PaymentError::InvalidSignature)?;
        self.mac(order_id, payment_id)?
            .verify_slice(&expected)
            .map_err(|_| PaymentError::InvalidSignature)
    }
}
