//! # shop-paypal
//!
//! PayPal payment gateway for the storefront checkout.
//!
//! `PayPalClient` implements `shop_core::PaymentGateway` over the PayPal REST
//! v1 payments API:
//!
//! 1. **create_payment** - itemized payment intent with redirect URLs
//!    - Returns the payment id and the payer approval link
//! 2. **execute_payment** - executes an approved payment for the stored payer
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shop_paypal::PayPalClient;
//! use shop_core::{CheckoutService, PaymentGateway};
//!
//! // Create gateway from environment
//! let gateway = Arc::new(PayPalClient::from_env()?);
//! let service = CheckoutService::new(store, catalog, gateway);
//!
//! let payment = service.create_payment(order_id).await?;
//! // Redirect the payer to payment.approval_url
//! ```

pub mod client;
pub mod config;
pub mod types;

// Re-exports
pub use client::PayPalClient;
pub use config::{PayPalConfig, PayPalMode, LIVE_API_BASE_URL, SANDBOX_API_BASE_URL};
