//! # Application State
//!
//! Shared state for the Axum application.
//! Contains the checkout service, configuration, and product catalog.

use anyhow::Context;
use shop_core::{
    BoxedPaymentGateway, CheckoutService, CheckoutSteps, CheckoutUrls, MemoryDatastore,
    OrderStore, ProductCatalog, ShopResult,
};
use shop_paypal::{PayPalClient, PayPalConfig};
use std::net::SocketAddr;
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Base URL for PayPal return/cancel callbacks and product links
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Tax percent captured on new orders
    pub tax_percent: f64,
    /// Comma-separated checkout step names
    pub checkout_steps: String,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let tax_percent = match std::env::var("TAX_PERCENT") {
            Ok(raw) => {
                let value: f64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("TAX_PERCENT is not a number: {}", raw))?;
                if !value.is_finite() || value < 0.0 {
                    anyhow::bail!("TAX_PERCENT must be zero or positive, got {}", value);
                }
                value
            }
            Err(_) => 0.0,
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            tax_percent,
            checkout_steps: std::env::var("CHECKOUT_STEPS")
                .unwrap_or_else(|_| "shipinfo,payinfo".to_string()),
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Order lifecycle and payment orchestration
    pub service: Arc<CheckoutService>,
    /// Product catalog
    pub catalog: Arc<ProductCatalog>,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Create a new AppState backed by PayPal and the in-process datastore
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        // Load product catalog
        let catalog = Arc::new(load_product_catalog()?);

        // Initialize payment gateway
        let paypal_config = PayPalConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize PayPal: {}", e))?
            .with_urls(CheckoutUrls::new(&config.base_url));
        let gateway: BoxedPaymentGateway = Arc::new(
            PayPalClient::new(paypal_config)
                .map_err(|e| anyhow::anyhow!("Failed to initialize PayPal: {}", e))?,
        );

        let store = OrderStore::new(Arc::new(MemoryDatastore::new()));

        Ok(Self::with_parts(config, catalog, gateway, store)?)
    }

    /// Assemble state from explicit collaborators
    pub fn with_parts(
        config: AppConfig,
        catalog: Arc<ProductCatalog>,
        gateway: BoxedPaymentGateway,
        store: OrderStore,
    ) -> ShopResult<Self> {
        let steps = CheckoutSteps::parse(&config.checkout_steps)?;
        let service = CheckoutService::new(store, catalog.clone(), gateway)
            .with_tax_percent(config.tax_percent)
            .with_steps(steps);

        Ok(Self {
            service: Arc::new(service),
            catalog,
            config,
        })
    }
}

/// Load product catalog from config file
fn load_product_catalog() -> anyhow::Result<ProductCatalog> {
    // Try to load from config/products.toml
    let config_paths = [
        "config/products.toml",
        "../config/products.toml",
        "../../config/products.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            let catalog = ProductCatalog::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
            tracing::info!("Loaded {} products from {}", catalog.products.len(), path);
            return Ok(catalog);
        }
    }

    // Return empty catalog if no config found
    tracing::warn!("No product catalog found, using empty catalog");
    Ok(ProductCatalog::new())
}
