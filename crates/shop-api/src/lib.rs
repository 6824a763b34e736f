//! # shop-api
//!
//! HTTP API layer for the storefront order lifecycle.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - REST endpoints for checkout and admin order management
//! - PayPal return/cancel callbacks
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/api/v1/products` | List products |
//! | POST | `/api/v1/orders` | Create order |
//! | GET | `/api/v1/orders` | List orders (`?status=`) |
//! | GET | `/api/v1/orders/{id}` | Get order |
//! | PUT | `/api/v1/orders/{id}` | Admin override |
//! | GET | `/api/v1/orders/{id}/checkout` | Checkout step view (`?step=`) |
//! | POST | `/api/v1/orders/{id}/checkout/advance` | Advance checkout step |
//! | POST | `/api/v1/orders/{id}/payment` | Create PayPal payment |
//! | GET | `/checkout/paypal/return` | Execute approved payment |
//! | GET | `/checkout/paypal/cancel` | Payer cancelled |

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
