//! Process configuration, read from environment variables.

use serde::{Deserialize, Serialize};

pub const DEFAULT_APP_URL: &str = "http://localhost:3000";
pub const DEFAULT_SEED_ADMIN_EMAIL: &str = "admin@example.org";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base of invitation links (`{app_url}/events/{event_id}`), no trailing slash.
    pub app_url: String,
    /// Shared secret for payment signature verification.
    pub payment_secret: Option<String>,
    /// Sender identity for invitations; `None` disables sending.
    pub mail_from: Option<String>,
    pub seed_admin_email: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_url: DEFAULT_APP_URL.to_string(),
            payment_secret: None,
            mail_from: None,
            seed_admin_email: DEFAULT_SEED_ADMIN_EMAIL.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let app_url = get("APP_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_APP_URL.to_string());

        let payment_secret = get("PAYMENT_KEY_SECRET");
        if payment_secret.is_none() {
            tracing::warn!("PAYMENT_KEY_SECRET not set; payment verification is disabled");
        }

        Self {
            app_url,
            payment_secret,
            mail_from: get("MAIL_FROM"),
            seed_admin_email: get("SEED_ADMIN_EMAIL")
                .unwrap_or_else(|| DEFAULT_SEED_ADMIN_EMAIL.to_string()),
        }
    }

    pub fn event_link(&self, event_id: impl core::fmt::Display) -> String {
        format!("{}/events/{}", self.app_url, event_id)
    }
}
