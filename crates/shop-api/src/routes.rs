//! # Routes
//!
//! Axum router configuration for the storefront API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - API:
///   - GET  /api/v1/products - List all products
///   - POST /api/v1/orders - Create order from cart
///   - GET  /api/v1/orders[?status=] - List orders, newest first
///   - GET  /api/v1/orders/{id} - Get order
///   - PUT  /api/v1/orders/{id} - Admin override
///   - GET  /api/v1/orders/{id}/checkout[?step=] - Current and next checkout step
///   - POST /api/v1/orders/{id}/checkout/advance - Advance checkout step
///   - POST /api/v1/orders/{id}/payment - Create PayPal payment
///
/// - PayPal redirects:
///   - GET /checkout/paypal/return - Payer approved, execute payment
///   - GET /checkout/paypal/cancel - Payer cancelled
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // PayPal redirect targets
    let checkout_routes = Router::new()
        .route("/paypal/return", get(handlers::paypal_return))
        .route("/paypal/cancel", get(handlers::paypal_cancel));

    let api_routes = Router::new()
        .route("/products", get(handlers::list_products))
        // Orders
        .route(
            "/orders",
            post(handlers::create_order).get(handlers::list_orders),
        )
        .route(
            "/orders/{order_id}",
            get(handlers::get_order).put(handlers::update_order),
        )
        // Checkout
        .route("/orders/{order_id}/checkout", get(handlers::checkout_view))
        .route(
            "/orders/{order_id}/checkout/advance",
            post(handlers::advance_checkout),
        )
        .route("/orders/{order_id}/payment", post(handlers::create_payment));

    Router::new()
        // Health check at root
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/checkout", checkout_routes)
        .nest("/api/v1", api_routes)
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // State
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppConfig;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use shop_core::{
        MemoryDatastore, Order, OrderStore, PaymentCreated, PaymentGateway, Product,
        ProductCatalog, ShopError, ShopResult,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    #[derive(Default)]
    struct StubGateway {
        creates: AtomicU32,
    }

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn create_payment(&self, order: &Order) -> ShopResult<PaymentCreated> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(PaymentCreated {
                payment_id: format!("PAY-{}", order.require_id()?),
                approval_url: Some("https://paypal.test/approve".to_string()),
            })
        }

        async fn execute_payment(&self, order: &Order) -> ShopResult<()> {
            if order.has_payer() {
                Ok(())
            } else {
                Err(ShopError::Validation("no payer".to_string()))
            }
        }

        fn provider_name(&self) -> &'static str {
            "stub"
        }
    }

    fn test_state(gateway: Arc<StubGateway>) -> AppState {
        let config = AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            base_url: "http://localhost:8080".to_string(),
            environment: "test".to_string(),
            tax_percent: 8.0,
            checkout_steps: "shipinfo,payinfo".to_string(),
        };
        let catalog = ProductCatalog::new()
            .with_product(Product::new(1, "Widget", 1000))
            .with_product(Product::new(2, "Gift Card", 5000).without_shipping());

        AppState::with_parts(
            config,
            Arc::new(catalog),
            gateway,
            OrderStore::new(Arc::new(MemoryDatastore::new())),
        )
        .unwrap()
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn widget_cart() -> Value {
        json!({
            "shipping": {"name": "Ada Lovelace", "address1": "12 Analytical Way", "city": "London"},
            "email": "ada@example.com",
            "product_ids": [1],
            "quantities": [2],
            "product_details": [{"product_id": 1}]
        })
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(test_state(Arc::default()));
        let (status, body) = send(&app, "GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_list_products() {
        let app = create_router(test_state(Arc::default()));
        let (status, body) = send(&app, "GET", "/api/v1/products", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
    }

    #[tokio::test]
    async fn test_create_and_get_order() {
        let app = create_router(test_state(Arc::default()));

        let (status, created) = send(&app, "POST", "/api/v1/orders", Some(widget_cart())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["total"], "21.60");
        assert_eq!(created["status"], "started");
        assert_eq!(created["checkout_step"], "shipinfo");

        let id = created["id"].as_i64().unwrap();
        let (status, fetched) = send(&app, "GET", &format!("/api/v1/orders/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["amount"]["total_cents"], 2160);
        assert_eq!(fetched["products"][0]["name"], "Widget");
    }

    #[tokio::test]
    async fn test_invalid_order_is_bad_request() {
        let app = create_router(test_state(Arc::default()));
        let mut cart = widget_cart();
        cart["email"] = json!("");

        let (status, body) = send(&app, "POST", "/api/v1/orders", Some(cart)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
        assert!(body["details"].as_str().unwrap().contains("email"));
    }

    #[tokio::test]
    async fn test_missing_order_is_not_found() {
        let app = create_router(test_state(Arc::default()));
        let (status, body) = send(&app, "GET", "/api/v1/orders/999", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], 404);
    }

    #[tokio::test]
    async fn test_list_orders_filters_by_status() {
        let app = create_router(test_state(Arc::default()));
        send(&app, "POST", "/api/v1/orders", Some(widget_cart())).await;

        let (_, all) = send(&app, "GET", "/api/v1/orders", None).await;
        assert_eq!(all["count"], 1);

        let (_, pending) = send(&app, "GET", "/api/v1/orders?status=pending", None).await;
        assert_eq!(pending["count"], 0);

        let (status, _) = send(&app, "GET", "/api/v1/orders?status=lost", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_override_changes_status_only() {
        let app = create_router(test_state(Arc::default()));
        let (_, mut order) = send(&app, "POST", "/api/v1/orders", Some(widget_cart())).await;
        let id = order["id"].as_i64().unwrap();

        order["status"] = json!("shipped");
        order["tax_percent"] = json!(50.0);
        let (status, updated) =
            send(&app, "PUT", &format!("/api/v1/orders/{}", id), Some(order)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "shipped");
        assert_eq!(updated["tax_percent"], 8.0);
        assert_eq!(updated["total"], "21.60");
    }

    #[tokio::test]
    async fn test_checkout_steps() {
        let app = create_router(test_state(Arc::default()));
        let (_, order) = send(&app, "POST", "/api/v1/orders", Some(widget_cart())).await;
        let id = order["id"].as_i64().unwrap();

        let (status, view) =
            send(&app, "GET", &format!("/api/v1/orders/{}/checkout", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["current"], "shipinfo");
        assert_eq!(view["next"], "payinfo");

        let (_, view) = send(
            &app,
            "POST",
            &format!("/api/v1/orders/{}/checkout/advance", id),
            None,
        )
        .await;
        assert_eq!(view["current"], "payinfo");
        assert_eq!(view["next"], "payinfo");
        assert_eq!(view["steps"][1]["current"], true);
    }

    #[tokio::test]
    async fn test_payment_flow_and_duplicate_rejection() {
        let gateway = Arc::new(StubGateway::default());
        let app = create_router(test_state(gateway.clone()));
        let (_, order) = send(&app, "POST", "/api/v1/orders", Some(widget_cart())).await;
        let id = order["id"].as_i64().unwrap();
        let payment_uri = format!("/api/v1/orders/{}/payment", id);

        let (status, payment) = send(&app, "POST", &payment_uri, None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(payment["payment_id"], format!("PAY-{}", id));
        assert_eq!(payment["approval_url"], "https://paypal.test/approve");

        let (status, body) = send(&app, "POST", &payment_uri, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], 409);
        assert_eq!(gateway.creates.load(Ordering::SeqCst), 1);

        let return_uri = format!(
            "/checkout/paypal/return?order_id={}&paymentId=PAY-{}&PayerID=PAYER-1",
            id, id
        );
        let response = app
            .clone()
            .oneshot(Request::get(return_uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (_, stored) = send(&app, "GET", &format!("/api/v1/orders/{}", id), None).await;
        assert_eq!(stored["status"], "pending");
        assert_eq!(stored["paypal_payer_id"], "PAYER-1");
    }

    #[tokio::test]
    async fn test_cancel_page() {
        let app = create_router(test_state(Arc::default()));
        let response = app
            .oneshot(
                Request::get("/checkout/paypal/cancel?order_id=7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("Payment Cancelled"));
    }
}
