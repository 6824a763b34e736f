//! # shop-core
//!
//! Order lifecycle core for the storefront back office.
//!
//! This crate provides:
//! - `Product`, `ProductCatalog` and the `ProductSource` lookup trait
//! - The pricing engine (`compute_amount`, `Amount`) over integer cents
//! - `Order` and its storage in `OrderStore` over a versioned `Datastore`
//! - `PaymentGateway` trait for implementing payment processors
//! - `CheckoutService`, which sequences order creation and the payment handshake
//! - `ShopError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_core::{CheckoutService, MemoryDatastore, NewOrder, OrderStore};
//!
//! let store = OrderStore::new(Arc::new(MemoryDatastore::new()));
//! let service = CheckoutService::new(store, Arc::new(catalog), gateway).with_tax_percent(8.0);
//!
//! let order = service.create_order(request).await?;
//! let payment = service.create_payment(order.require_id()?).await?;
//!
//! // Redirect the buyer to payment.approval_url, then on return:
//! service.complete_payment(order_id, &payment_id, &payer_id).await?;
//! ```

pub mod checkout;
pub mod error;
pub mod gateway;
pub mod order;
pub mod pricing;
pub mod product;
pub mod service;
pub mod store;

// Re-exports for convenience
pub use checkout::{CheckoutStep, CheckoutSteps, CheckoutView};
pub use error::{ShopError, ShopResult};
pub use gateway::{BoxedPaymentGateway, CheckoutUrls, PaymentCreated, PaymentGateway};
pub use order::{
    CustomerInfo, LineItem, Order, OrderStatus, ProductDetails, ShippingAddress,
    DEFAULT_CHECKOUT_STEP,
};
pub use pricing::{compute_amount, format_cents, Amount};
pub use product::{normalize_path, PricingOption, Product, ProductCatalog, ProductSource};
pub use service::{CheckoutService, NewOrder};
pub use store::{Datastore, MemoryDatastore, OrderStore};
