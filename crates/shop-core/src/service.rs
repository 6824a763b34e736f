//! # Checkout Service
//!
//! Drives an order from cart to executed payment: freezes pricing at creation,
//! resolves checkout steps, and sequences the two-phase processor handshake
//! with the order store.

use crate::checkout::{CheckoutSteps, CheckoutView};
use crate::error::{ShopError, ShopResult};
use crate::gateway::{BoxedPaymentGateway, PaymentCreated};
use crate::order::{CustomerInfo, Order, OrderStatus, ProductDetails};
use crate::product::ProductSource;
use crate::store::OrderStore;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};

/// Cart contents and customer details submitted at checkout
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    #[serde(flatten)]
    pub customer: CustomerInfo,
    pub product_ids: Vec<i64>,
    pub quantities: Vec<u32>,
    pub product_details: Vec<ProductDetails>,
}

pub struct CheckoutService {
    store: OrderStore,
    catalog: Arc<dyn ProductSource>,
    gateway: BoxedPaymentGateway,
    steps: CheckoutSteps,
    tax_percent: f64,
    payments_in_flight: Arc<Mutex<HashSet<i64>>>,
}

impl CheckoutService {
    pub fn new(
        store: OrderStore,
        catalog: Arc<dyn ProductSource>,
        gateway: BoxedPaymentGateway,
    ) -> Self {
        Self {
            store,
            catalog,
            gateway,
            steps: CheckoutSteps::default(),
            tax_percent: 0.0,
            payments_in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Builder: tax percent captured on new orders
    pub fn with_tax_percent(mut self, tax_percent: f64) -> Self {
        self.tax_percent = tax_percent;
        self
    }

    /// Builder: checkout step sequence
    pub fn with_steps(mut self, steps: CheckoutSteps) -> Self {
        self.steps = steps;
        self
    }

    pub fn steps(&self) -> &CheckoutSteps {
        &self.steps
    }

    pub fn tax_percent(&self) -> f64 {
        self.tax_percent
    }

    /// Price and persist a new order, snapshotting the products it references
    #[instrument(skip(self, request), fields(items = request.product_ids.len()))]
    pub async fn create_order(&self, request: NewOrder) -> ShopResult<Order> {
        if request.product_ids.len() != request.quantities.len()
            || request.product_ids.len() != request.product_details.len()
        {
            return Err(ShopError::Validation(format!(
                "line item length mismatch: {} products, {} quantities, {} details",
                request.product_ids.len(),
                request.quantities.len(),
                request.product_details.len()
            )));
        }

        let products = self.catalog.get_multi(&request.product_ids).await?;
        let mut order = Order::new(
            request.customer,
            products,
            request.quantities,
            request.product_details,
            self.tax_percent,
        )?;
        order.checkout_step = self.steps.first().to_string();

        let amount = order.amount()?;
        let order = self.store.create(order).await?;
        info!(
            order_id = ?order.id,
            total = %amount.total(),
            no_shipping = order.no_shipping,
            "Order created"
        );
        Ok(order)
    }

    pub async fn get_order(&self, id: i64) -> ShopResult<Order> {
        self.store.get(id).await
    }

    /// Admin override: overwrite the editable fields of a stored order.
    ///
    /// The checkout step must be one of the configured steps.
    #[instrument(skip(self, order), fields(order_id = ?order.id))]
    pub async fn update_order(&self, order: &Order) -> ShopResult<Order> {
        if !self.steps.contains(&order.checkout_step) {
            return Err(ShopError::Validation(format!(
                "unknown checkout step: {}",
                order.checkout_step
            )));
        }
        let updated = self.store.update(order).await?;
        info!(status = %updated.status, "Order updated");
        Ok(updated)
    }

    pub async fn list_orders(&self) -> ShopResult<Vec<Order>> {
        self.store.list().await
    }

    pub async fn list_orders_with_status(&self, status: OrderStatus) -> ShopResult<Vec<Order>> {
        self.store.list_with_status(status).await
    }

    /// Resolve the order and the step being rendered.
    ///
    /// `step` defaults to the order's own checkout step.
    #[instrument(skip(self))]
    pub async fn checkout_view(&self, order_id: i64, step: Option<&str>) -> ShopResult<CheckoutView> {
        let order = self.store.get(order_id).await?;
        let current = match step {
            Some(step) => step.to_string(),
            None => order.checkout_step.clone(),
        };
        self.view(order, current)
    }

    /// Move the order to the step after its current one
    #[instrument(skip(self))]
    pub async fn advance_checkout(&self, order_id: i64) -> ShopResult<CheckoutView> {
        let steps = &self.steps;
        let order = self
            .store
            .update_with(order_id, |order| {
                let next = steps.next_after(&order.checkout_step)?.to_string();
                order.checkout_step = next;
                Ok(())
            })
            .await?;
        let current = order.checkout_step.clone();
        self.view(order, current)
    }

    fn view(&self, order: Order, current: String) -> ShopResult<CheckoutView> {
        let next = self.steps.next_after(&current)?.to_string();
        Ok(CheckoutView {
            amount: order.amount()?,
            steps: self.steps.render(&current),
            order,
            current,
            next,
        })
    }

    /// Create the remote payment for an order and store its id.
    ///
    /// Rejected if the order already carries a payment id, or if another
    /// request is creating one right now. The order is left untouched when the
    /// processor call fails.
    #[instrument(skip(self))]
    pub async fn create_payment(&self, order_id: i64) -> ShopResult<PaymentCreated> {
        let _claim = PaymentClaim::acquire(&self.payments_in_flight, order_id)?;

        let order = self.store.get(order_id).await?;
        if let Some(existing) = order.paypal_payment_id.as_deref().filter(|id| !id.is_empty()) {
            return Err(ShopError::PaymentAlreadyCreated {
                order_id,
                payment_id: existing.to_string(),
            });
        }

        let created = self.gateway.create_payment(&order).await?;
        info!(
            provider = self.gateway.provider_name(),
            payment_id = %created.payment_id,
            "Payment created"
        );

        let payment_id = created.payment_id.clone();
        if let Err(err) = self
            .store
            .update_with(order_id, |order| order.set_payment_id(payment_id.as_str()))
            .await
        {
            warn!(payment_id = %created.payment_id, error = %err, "Created payment could not be recorded");
            return Err(err);
        }

        Ok(created)
    }

    /// Record the payer id returned by the processor after approval
    #[instrument(skip(self))]
    pub async fn record_payer(
        &self,
        order_id: i64,
        payment_id: &str,
        payer_id: &str,
    ) -> ShopResult<Order> {
        self.store
            .update_with(order_id, |order| {
                match order.paypal_payment_id.as_deref() {
                    Some(stored) if stored == payment_id => {}
                    Some(stored) => {
                        return Err(ShopError::Validation(format!(
                            "payment {} does not belong to order {} (expected {})",
                            payment_id, order_id, stored
                        )))
                    }
                    None => {
                        return Err(ShopError::Validation(format!(
                            "order {} has no payment to approve",
                            order_id
                        )))
                    }
                }
                order.set_payer_id(payer_id)
            })
            .await
    }

    /// Execute an approved payment and advance the order to `pending`.
    ///
    /// Orders already past `started` are returned as they are. A concurrent
    /// execution of the same order is rejected with `PaymentInProgress`.
    #[instrument(skip(self))]
    pub async fn execute_payment(&self, order_id: i64) -> ShopResult<Order> {
        let _claim = PaymentClaim::acquire(&self.payments_in_flight, order_id)?;

        let order = self.store.get(order_id).await?;
        if !order.has_payment() {
            return Err(ShopError::Validation(format!(
                "order {} has no payment id",
                order_id
            )));
        }
        if !order.has_payer() {
            return Err(ShopError::Validation(format!(
                "order {} has no payer id",
                order_id
            )));
        }
        if order.status != OrderStatus::Started {
            info!(status = %order.status, "Payment already executed");
            return Ok(order);
        }

        self.gateway.execute_payment(&order).await?;
        info!(provider = self.gateway.provider_name(), "Payment executed");

        self.store
            .update_with(order_id, |order| {
                if order.status == OrderStatus::Started {
                    order.status = OrderStatus::Pending;
                }
                Ok(())
            })
            .await
    }

    /// Processor return callback: record the payer, then execute
    pub async fn complete_payment(
        &self,
        order_id: i64,
        payment_id: &str,
        payer_id: &str,
    ) -> ShopResult<Order> {
        self.record_payer(order_id, payment_id, payer_id).await?;
        self.execute_payment(order_id).await
    }
}

/// In-process claim on an order id while its payment is created or executed
struct PaymentClaim {
    in_flight: Arc<Mutex<HashSet<i64>>>,
    order_id: i64,
}

impl PaymentClaim {
    fn acquire(in_flight: &Arc<Mutex<HashSet<i64>>>, order_id: i64) -> ShopResult<Self> {
        let mut set = in_flight
            .lock()
            .map_err(|_| ShopError::Storage("payment claim lock poisoned".to_string()))?;
        if !set.insert(order_id) {
            return Err(ShopError::PaymentInProgress { order_id });
        }
        Ok(Self {
            in_flight: Arc::clone(in_flight),
            order_id,
        })
    }
}

impl Drop for PaymentClaim {
    fn drop(&mut self) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(&self.order_id);
        }
    }
}
