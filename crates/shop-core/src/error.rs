//! # Shop Error Types
//!
//! Typed error handling for the order lifecycle.
//! All store, pricing, gateway and checkout operations return `Result<T, ShopError>`.

use thiserror::Error;

/// Core error type for all order and payment operations
#[derive(Debug, Error)]
pub enum ShopError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Required field missing or malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested entity does not exist in storage
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: i64 },

    /// Underlying read/write failure of the document store
    #[error("Storage error: {0}")]
    Storage(String),

    /// Optimistic transaction kept conflicting until the attempt budget ran out
    #[error("Storage error: too many concurrent transactions (gave up after {attempts} attempts)")]
    TooManyConcurrentTransactions { attempts: u32 },

    /// Non-success HTTP status from the payment processor
    #[error("Payment processor error: HTTP {status}: {body}")]
    Processor { status: u16, body: String },

    /// Credential exchange with the payment processor failed
    #[error("Payment processor authentication failed: HTTP {status}: {body}")]
    Authentication { status: u16, body: String },

    /// Network/HTTP error communicating with the processor
    #[error("Network error: {0}")]
    Network(String),

    /// Encoding/decoding of the denormalized snapshot or a processor payload failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The order already carries a processor payment id
    #[error("Order {order_id} already has payment {payment_id}")]
    PaymentAlreadyCreated { order_id: i64, payment_id: String },

    /// Another request is creating a payment for this order right now
    #[error("Payment creation already in progress for order {order_id}")]
    PaymentInProgress { order_id: i64 },
}

impl ShopError {
    /// Returns true if the same request may succeed when retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ShopError::Network(_)
                | ShopError::Storage(_)
                | ShopError::TooManyConcurrentTransactions { .. }
                | ShopError::Processor { .. }
                | ShopError::PaymentInProgress { .. }
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ShopError::Configuration(_) => 500,
            ShopError::Validation(_) => 400,
            ShopError::NotFound { .. } => 404,
            ShopError::Storage(_) => 503,
            ShopError::TooManyConcurrentTransactions { .. } => 503,
            ShopError::Processor { .. } => 502,
            ShopError::Authentication { .. } => 502,
            ShopError::Network(_) => 503,
            ShopError::Serialization(_) => 500,
            ShopError::PaymentAlreadyCreated { .. } => 409,
            ShopError::PaymentInProgress { .. } => 409,
        }
    }

    /// Message safe to show to the shopper or operator.
    ///
    /// Processor and storage failures are usually transient, so they map to a
    /// retry prompt instead of leaking processor response bodies.
    pub fn user_message(&self) -> String {
        match self {
            ShopError::Processor { .. }
            | ShopError::Authentication { .. }
            | ShopError::Network(_) => {
                "Payment could not be processed, please try again.".to_string()
            }
            ShopError::Storage(_) | ShopError::TooManyConcurrentTransactions { .. } => {
                "Something went wrong saving your order, please try again.".to_string()
            }
            ShopError::Configuration(_) | ShopError::Serialization(_) => {
                "Internal error, please contact support.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for ShopError {
    fn from(err: serde_json::Error) -> Self {
        ShopError::Serialization(err.to_string())
    }
}

/// Result type alias for shop operations
pub type ShopResult<T> = Result<T, ShopError>;
