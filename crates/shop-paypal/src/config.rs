//! # PayPal Configuration
//!
//! Configuration management for the PayPal integration.
//! Credentials are loaded from environment variables.

use shop_core::{CheckoutUrls, ShopError, ShopResult};
use std::env;
use std::fmt;
use std::time::Duration;

pub const SANDBOX_API_BASE_URL: &str = "https://api-m.sandbox.paypal.com";
pub const LIVE_API_BASE_URL: &str = "https://api-m.paypal.com";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which PayPal environment the credentials belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayPalMode {
    #[default]
    Sandbox,
    Live,
}

impl PayPalMode {
    pub fn api_base_url(&self) -> &'static str {
        match self {
            PayPalMode::Sandbox => SANDBOX_API_BASE_URL,
            PayPalMode::Live => LIVE_API_BASE_URL,
        }
    }
}

/// PayPal API configuration
#[derive(Clone)]
pub struct PayPalConfig {
    /// REST app client id
    pub client_id: String,

    /// REST app secret
    pub secret: String,

    pub mode: PayPalMode,

    /// API base URL (overridable for testing/mocking)
    pub api_base_url: String,

    /// ISO currency code sent with every amount
    pub currency: String,

    /// Upper bound on each processor call
    pub timeout: Duration,

    /// Accept TLS versions below 1.2 on outbound calls
    pub legacy_tls: bool,

    /// Return, cancel and product links sent with payments
    pub urls: CheckoutUrls,
}

impl PayPalConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `PAYPAL_CLIENT_ID`
    /// - `PAYPAL_SECRET`
    ///
    /// Optional: `PAYPAL_MODE`, `PAYPAL_API_BASE_URL`, `PAYPAL_CURRENCY`,
    /// `PAYPAL_TIMEOUT_SECS`, `PAYPAL_LEGACY_TLS`.
    pub fn from_env() -> ShopResult<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from a variable lookup
    fn from_lookup<F>(lookup: F) -> ShopResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client_id = lookup("PAYPAL_CLIENT_ID")
            .ok_or_else(|| ShopError::Configuration("PAYPAL_CLIENT_ID not set".to_string()))?;

        let secret = lookup("PAYPAL_SECRET")
            .ok_or_else(|| ShopError::Configuration("PAYPAL_SECRET not set".to_string()))?;

        let mode = match lookup("PAYPAL_MODE") {
            Some(value) => parse_mode(&value)?,
            None => PayPalMode::Sandbox,
        };

        let mut config = Self::new(client_id, secret).with_mode(mode);

        if let Some(url) = lookup("PAYPAL_API_BASE_URL") {
            config = config.with_api_base_url(url);
        }

        if let Some(currency) = lookup("PAYPAL_CURRENCY") {
            let currency = currency.trim().to_ascii_uppercase();
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ShopError::Configuration(format!(
                    "PAYPAL_CURRENCY must be a 3-letter code, got {}",
                    currency
                )));
            }
            config.currency = currency;
        }

        if let Some(secs) = lookup("PAYPAL_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                ShopError::Configuration("PAYPAL_TIMEOUT_SECS must be a number".to_string())
            })?;
            config.timeout = Duration::from_secs(secs.max(1));
        }

        config.legacy_tls = lookup("PAYPAL_LEGACY_TLS")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(config)
    }

    /// Create config with explicit credentials (for testing)
    pub fn new(client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            secret: secret.into(),
            mode: PayPalMode::Sandbox,
            api_base_url: SANDBOX_API_BASE_URL.to_string(),
            currency: "USD".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            legacy_tls: false,
            urls: CheckoutUrls::default(),
        }
    }

    pub fn is_live_mode(&self) -> bool {
        self.mode == PayPalMode::Live
    }

    /// Builder: switch environment (also resets the API base URL)
    pub fn with_mode(mut self, mode: PayPalMode) -> Self {
        self.mode = mode;
        self.api_base_url = mode.api_base_url().to_string();
        self
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Builder: storefront links sent with payments
    pub fn with_urls(mut self, urls: CheckoutUrls) -> Self {
        self.urls = urls;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for PayPalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayPalConfig")
            .field("client_id", &self.client_id)
            .field("secret", &"<redacted>")
            .field("mode", &self.mode)
            .field("api_base_url", &self.api_base_url)
            .field("currency", &self.currency)
            .field("timeout", &self.timeout)
            .field("legacy_tls", &self.legacy_tls)
            .finish()
    }
}

fn parse_mode(value: &str) -> ShopResult<PayPalMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "sandbox" => Ok(PayPalMode::Sandbox),
        "live" => Ok(PayPalMode::Live),
        other => Err(ShopError::Configuration(format!(
            "PAYPAL_MODE must be sandbox or live, got {}",
            other
        ))),
    }
}
