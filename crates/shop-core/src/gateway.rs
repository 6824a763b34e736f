//! # Payment Gateway Trait
//!
//! Seam between the checkout orchestrator and a remote payment processor.
//!
//! ```text
//! NO_PAYMENT --create_payment--> PAYMENT_CREATED --(payer approves)--> APPROVED --execute_payment--> EXECUTED
//! ```
//!
//! Gateways never mutate orders; the orchestrator persists the ids they return.

use crate::error::ShopResult;
use crate::order::Order;
use crate::product::Product;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Result of creating a remote payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentCreated {
    /// Processor payment id, stored on the order
    pub payment_id: String,
    /// Where to send the payer for approval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_url: Option<String>,
}

/// Core trait for payment processor clients.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for the order.
    ///
    /// Callers must ensure the order has no payment id yet; every successful
    /// call creates a new processor-side payment.
    async fn create_payment(&self, order: &Order) -> ShopResult<PaymentCreated>;

    /// Execute an approved payment. The order must carry both payment and payer ids.
    async fn execute_payment(&self, order: &Order) -> ShopResult<()>;

    /// Provider name (for logging)
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared payment gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;

/// URLs handed to the processor
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    /// Base URL of the storefront (e.g., "https://shop.example.com")
    pub base_url: String,
    /// Where the processor returns an approving payer
    pub return_path: String,
    /// Where the processor returns a payer who cancelled
    pub cancel_path: String,
    /// Prefix of product pages
    pub product_path: String,
}

impl CheckoutUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            return_path: "/checkout/paypal/return".to_string(),
            cancel_path: "/checkout/paypal/cancel".to_string(),
            product_path: "/products".to_string(),
        }
    }

    pub fn return_url(&self, order_id: i64) -> String {
        format!("{}{}?order_id={}", self.base_url, self.return_path, order_id)
    }

    pub fn cancel_url(&self, order_id: i64) -> String {
        format!("{}{}?order_id={}", self.base_url, self.cancel_path, order_id)
    }

    /// Deep link back to a product page
    pub fn product_url(&self, product: &Product) -> String {
        format!("{}{}/{}", self.base_url, self.product_path, product.slug())
    }
}

impl Default for CheckoutUrls {
    fn default() -> Self {
        Self::new("http://localhost:8080")
    }
}
