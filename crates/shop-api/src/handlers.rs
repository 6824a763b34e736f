//! # Request Handlers
//!
//! Axum request handlers for checkout, admin order management and the PayPal
//! return/cancel callbacks.

use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    Json,
};
use serde::{Deserialize, Serialize};
use shop_core::{Amount, CheckoutView, NewOrder, Order, OrderStatus, ShopError};
use tracing::{error, info, instrument, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Order with its computed amount
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub amount: Amount,
    /// Decimal total as reported to the processor
    pub total: String,
}

impl TryFrom<Order> for OrderResponse {
    type Error = ShopError;

    fn try_from(order: Order) -> Result<Self, Self::Error> {
        let amount = order.amount()?;
        Ok(Self {
            total: amount.total(),
            amount,
            order,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutStepQuery {
    #[serde(default)]
    pub step: Option<String>,
}

/// Create payment response
#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    pub order_id: i64,
    pub payment_id: String,
    /// Redirect the payer here to approve
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_url: Option<String>,
}

/// Query string PayPal appends to the return URL
#[derive(Debug, Deserialize)]
pub struct PayPalReturnQuery {
    pub order_id: i64,
    #[serde(rename = "paymentId")]
    pub payment_id: String,
    #[serde(rename = "PayerID")]
    pub payer_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PayPalCancelQuery {
    pub order_id: i64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Render a `ShopError`.
///
/// Client errors carry the full message as details; server-side failures are
/// logged and only the user-facing message is returned.
fn shop_error_to_response(err: ShopError) -> ApiError {
    let code = err.status_code();
    let mut response = ErrorResponse::new(err.user_message(), code);
    if code < 500 {
        response = response.with_details(err.to_string());
    } else {
        error!("Request failed: {}", err);
    }
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "storefront",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Get products list
pub async fn list_products(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "products": state.catalog.products,
        "count": state.catalog.products.len()
    }))
}

/// Create an order from the cart
#[instrument(skip(state, request), fields(items = request.product_ids.len()))]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<NewOrder>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state
        .service
        .create_order(request)
        .await
        .map_err(shop_error_to_response)?;

    let response = OrderResponse::try_from(order).map_err(shop_error_to_response)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// List orders, newest first, optionally by status
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(status) => {
            let status: OrderStatus = status.parse().map_err(shop_error_to_response)?;
            state.service.list_orders_with_status(status).await
        }
        None => state.service.list_orders().await,
    }
    .map_err(shop_error_to_response)?;

    Ok(Json(serde_json::json!({
        "count": orders.len(),
        "orders": orders,
    })))
}

/// Get single order
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .service
        .get_order(order_id)
        .await
        .map_err(shop_error_to_response)?;

    Ok(Json(OrderResponse::try_from(order).map_err(shop_error_to_response)?))
}

/// Admin override of an order's editable fields
#[instrument(skip(state, order))]
pub async fn update_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Json(mut order): Json<Order>,
) -> Result<Json<OrderResponse>, ApiError> {
    order.id = Some(order_id);
    let updated = state
        .service
        .update_order(&order)
        .await
        .map_err(shop_error_to_response)?;

    Ok(Json(OrderResponse::try_from(updated).map_err(shop_error_to_response)?))
}

/// Resolve the checkout step being rendered
pub async fn checkout_view(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
    Query(query): Query<CheckoutStepQuery>,
) -> Result<Json<CheckoutView>, ApiError> {
    let view = state
        .service
        .checkout_view(order_id, query.step.as_deref())
        .await
        .map_err(shop_error_to_response)?;
    Ok(Json(view))
}

/// Move the order to its next checkout step
pub async fn advance_checkout(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> Result<Json<CheckoutView>, ApiError> {
    let view = state
        .service
        .advance_checkout(order_id)
        .await
        .map_err(shop_error_to_response)?;
    Ok(Json(view))
}

/// Create the PayPal payment for an order
#[instrument(skip(state))]
pub async fn create_payment(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> Result<(StatusCode, Json<CreatePaymentResponse>), ApiError> {
    let created = state.service.create_payment(order_id).await.map_err(|e| {
        warn!("Failed to create payment: {}", e);
        shop_error_to_response(e)
    })?;

    info!("Created payment {} for order {}", created.payment_id, order_id);

    Ok((
        StatusCode::CREATED,
        Json(CreatePaymentResponse {
            order_id,
            payment_id: created.payment_id,
            approval_url: created.approval_url,
        }),
    ))
}

/// PayPal return callback: record the payer and execute the payment
#[instrument(skip(state, query), fields(order_id = query.order_id))]
pub async fn paypal_return(
    State(state): State<AppState>,
    Query(query): Query<PayPalReturnQuery>,
) -> Result<Html<String>, ApiError> {
    let order = state
        .service
        .complete_payment(query.order_id, &query.payment_id, &query.payer_id)
        .await
        .map_err(shop_error_to_response)?;

    let total = order
        .amount()
        .map(|a| a.total())
        .map_err(shop_error_to_response)?;

    info!("Payment completed: order={}, status={}", query.order_id, order.status);

    Ok(Html(format!(
        r#"
<!DOCTYPE html>
<html>
<head><title>Payment Received</title></head>
<body style="font-family: system-ui; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background: #f4f1ea;">
    <div style="background: white; padding: 60px; border-radius: 16px; text-align: center;">
        <h1>Thank you!</h1>
        <p>Order <code>{}</code> is confirmed.</p>
        <p style="color: #666;">Total: {} (status: {})</p>
    </div>
</body>
</html>
"#,
        query.order_id,
        total,
        order.status
    )))
}

/// PayPal cancel callback
pub async fn paypal_cancel(Query(query): Query<PayPalCancelQuery>) -> impl IntoResponse {
    info!("Payer cancelled PayPal approval: order={}", query.order_id);
    Html(format!(
        r#"
<!DOCTYPE html>
<html>
<head><title>Payment Cancelled</title></head>
<body style="font-family: system-ui; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background: #f4f1ea;">
    <div style="background: white; padding: 60px; border-radius: 16px; text-align: center;">
        <h1>Payment Cancelled</h1>
        <p>Order <code>{}</code> was not charged.</p>
    </div>
</body>
</html>
"#,
        query.order_id
    ))
}
