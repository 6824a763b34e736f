//! # Order Types
//!
//! The order aggregate carried through checkout: shipping info, parallel
//! line-item sequences, a frozen product snapshot and payment correlation.

use crate::error::{ShopError, ShopResult};
use crate::pricing::{self, Amount};
use crate::product::Product;
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// First checkout step of a freshly created order
pub const DEFAULT_CHECKOUT_STEP: &str = "shipinfo";

/// Fulfilment status.
///
/// Declared in advancing order, but admin overrides may set any value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Started,
    Pending,
    Processing,
    Shipped,
    Processed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Started => "started",
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Processed => "processed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "started" => Ok(OrderStatus::Started),
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "processed" => Ok(OrderStatus::Processed),
            other => Err(ShopError::Validation(format!(
                "unknown order status: {}",
                other
            ))),
        }
    }
}

/// Where the order ships
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    #[serde(default)]
    pub address1: String,
    #[serde(default)]
    pub address2: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub country_code: String,
}

/// Per-line choices; which fields matter depends on the product's flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub product_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_slot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_location: Option<String>,
    /// Index into the product's pricing options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_option: Option<usize>,
}

impl ProductDetails {
    pub fn for_product(product_id: i64) -> Self {
        Self {
            product_id,
            ..Self::default()
        }
    }

    /// Check the fields this product's configuration requires
    pub fn validate_for(&self, product: &Product) -> ShopResult<()> {
        if self.product_id != product.id {
            return Err(ShopError::Validation(format!(
                "details reference product {} but line is product {}",
                self.product_id, product.id
            )));
        }
        if product.needs_date && self.date.is_none() {
            return Err(missing(product, "a date"));
        }
        if product.needs_time && is_blank(&self.time_slot) {
            return Err(missing(product, "a time slot"));
        }
        if product.needs_pickup_location && is_blank(&self.pickup_location) {
            return Err(missing(product, "a pickup location"));
        }
        if product.has_pricing_options {
            pricing::unit_price_cents(product, self)?;
        }
        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or("").is_empty()
}

fn missing(product: &Product, what: &str) -> ShopError {
    ShopError::Validation(format!("product {} requires {}", product.id, what))
}

/// Contact and shipping input for a new order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub shipping: ShippingAddress,
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

/// One priced line, borrowed from an order
#[derive(Debug, Clone, Copy)]
pub struct LineItem<'a> {
    pub product: &'a Product,
    pub quantity: u32,
    pub details: &'a ProductDetails,
}

impl LineItem<'_> {
    pub fn unit_price_cents(&self) -> ShopResult<i64> {
        pricing::unit_price_cents(self.product, self.details)
    }
}

/// A customer's order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Assigned by the store on first persistence
    #[serde(default)]
    pub id: Option<i64>,

    pub shipping: ShippingAddress,
    pub email: String,
    #[serde(default)]
    pub phone: String,

    /// Parallel line-item sequences, same length and order
    pub product_ids: Vec<i64>,
    pub quantities: Vec<u32>,
    pub product_details: Vec<ProductDetails>,

    /// Products as they were when the order was created
    pub products: Vec<Product>,

    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default = "default_checkout_step")]
    pub checkout_step: String,

    /// Set once each, never cleared
    #[serde(default)]
    pub paypal_payment_id: Option<String>,
    #[serde(default)]
    pub paypal_payer_id: Option<String>,

    #[serde(default)]
    pub address_verified: bool,

    /// True iff every line's product ships nothing
    pub no_shipping: bool,

    pub tax_percent: f64,
    pub created: DateTime<Utc>,
}

fn default_checkout_step() -> String {
    DEFAULT_CHECKOUT_STEP.to_string()
}

impl Order {
    /// Build a new, unsaved order.
    ///
    /// `products` holds one entry per line (as returned by a bulk lookup of
    /// the line's product ids); distinct products are snapshotted.
    pub fn new(
        customer: CustomerInfo,
        products: Vec<Product>,
        quantities: Vec<u32>,
        product_details: Vec<ProductDetails>,
        tax_percent: f64,
    ) -> ShopResult<Self> {
        validate_contact(&customer.shipping.name, &customer.email)?;

        if products.is_empty() {
            return Err(ShopError::Validation("order has no items".to_string()));
        }
        if products.len() != quantities.len() || products.len() != product_details.len() {
            return Err(ShopError::Validation(format!(
                "line item length mismatch: {} products, {} quantities, {} details",
                products.len(),
                quantities.len(),
                product_details.len()
            )));
        }
        if !tax_percent.is_finite() || tax_percent < 0.0 {
            return Err(ShopError::Validation(format!(
                "invalid tax percent: {}",
                tax_percent
            )));
        }

        for ((product, quantity), details) in products.iter().zip(&quantities).zip(&product_details) {
            if *quantity == 0 {
                return Err(ShopError::Validation(format!(
                    "quantity for product {} must be at least 1",
                    product.id
                )));
            }
            details.validate_for(product)?;
        }

        let product_ids = products.iter().map(|p| p.id).collect();
        let no_shipping = products.iter().all(|p| p.no_shipping);

        let mut snapshot: Vec<Product> = Vec::with_capacity(products.len());
        for product in products {
            if !snapshot.iter().any(|p| p.id == product.id) {
                snapshot.push(product);
            }
        }

        Ok(Self {
            id: None,
            shipping: customer.shipping,
            email: customer.email,
            phone: customer.phone,
            product_ids,
            quantities,
            product_details,
            products: snapshot,
            status: OrderStatus::Started,
            checkout_step: default_checkout_step(),
            paypal_payment_id: None,
            paypal_payer_id: None,
            address_verified: false,
            no_shipping,
            tax_percent,
            created: now_micros(),
        })
    }

    /// Id of a persisted order
    pub fn require_id(&self) -> ShopResult<i64> {
        self.id
            .ok_or_else(|| ShopError::Validation("order has not been saved yet".to_string()))
    }

    /// Snapshot entry for a product id
    pub fn product(&self, product_id: i64) -> Option<&Product> {
        self.products.iter().find(|p| p.id == product_id)
    }

    /// Resolve the parallel sequences into line items against the snapshot
    pub fn line_items(&self) -> ShopResult<Vec<LineItem<'_>>> {
        if self.product_ids.len() != self.quantities.len()
            || self.product_ids.len() != self.product_details.len()
        {
            return Err(ShopError::Serialization(format!(
                "order {:?} has inconsistent line items",
                self.id
            )));
        }

        self.product_ids
            .iter()
            .zip(&self.quantities)
            .zip(&self.product_details)
            .map(|((id, quantity), details)| {
                let product = self.product(*id).ok_or(ShopError::NotFound {
                    kind: "Product",
                    id: *id,
                })?;
                Ok(LineItem {
                    product,
                    quantity: *quantity,
                    details,
                })
            })
            .collect()
    }

    /// Recompute the amount from the stored lines and tax percent
    pub fn amount(&self) -> ShopResult<Amount> {
        let lines = self.line_items()?;
        pricing::compute_amount(
            lines.iter().map(|l| (l.product, l.quantity, l.details)),
            self.tax_percent,
        )
    }

    /// Total number of units ordered
    pub fn item_count(&self) -> u64 {
        self.quantities.iter().map(|&q| u64::from(q)).sum()
    }

    pub fn has_payment(&self) -> bool {
        self.paypal_payment_id
            .as_deref()
            .map(|id| !id.is_empty())
            .unwrap_or(false)
    }

    pub fn has_payer(&self) -> bool {
        self.paypal_payer_id
            .as_deref()
            .map(|id| !id.is_empty())
            .unwrap_or(false)
    }

    /// Store the processor payment id; it can be set only once
    pub fn set_payment_id(&mut self, payment_id: impl Into<String>) -> ShopResult<()> {
        let payment_id = payment_id.into();
        if payment_id.is_empty() {
            return Err(ShopError::Validation("empty payment id".to_string()));
        }
        match &self.paypal_payment_id {
            Some(existing) if !existing.is_empty() => Err(ShopError::PaymentAlreadyCreated {
                order_id: self.id.unwrap_or_default(),
                payment_id: existing.clone(),
            }),
            _ => {
                self.paypal_payment_id = Some(payment_id);
                Ok(())
            }
        }
    }

    /// Store the payer id from the processor redirect; it can be set only once
    pub fn set_payer_id(&mut self, payer_id: impl Into<String>) -> ShopResult<()> {
        let payer_id = payer_id.into();
        if payer_id.is_empty() {
            return Err(ShopError::Validation("empty payer id".to_string()));
        }
        match &self.paypal_payer_id {
            Some(existing) if !existing.is_empty() && *existing != payer_id => {
                Err(ShopError::Validation(format!(
                    "order {:?} already has payer {}",
                    self.id, existing
                )))
            }
            _ => {
                self.paypal_payer_id = Some(payer_id);
                Ok(())
            }
        }
    }

    /// Apply a full-overwrite edit onto this stored order.
    ///
    /// Identity, creation time, tax percent, line items, the product snapshot
    /// and the no-shipping flag stay frozen. Payment correlation ids may be
    /// filled in but never changed or cleared.
    pub fn apply_update(&mut self, incoming: &Order) -> ShopResult<()> {
        validate_contact(&incoming.shipping.name, &incoming.email)?;

        if let Some(payment_id) = incoming.paypal_payment_id.as_deref().filter(|s| !s.is_empty()) {
            if self.paypal_payment_id.as_deref() != Some(payment_id) {
                self.set_payment_id(payment_id)?;
            }
        }
        if let Some(payer_id) = incoming.paypal_payer_id.as_deref().filter(|s| !s.is_empty()) {
            self.set_payer_id(payer_id)?;
        }

        self.shipping = incoming.shipping.clone();
        self.email = incoming.email.clone();
        self.phone = incoming.phone.clone();
        self.status = incoming.status;
        self.checkout_step = incoming.checkout_step.clone();
        self.address_verified = incoming.address_verified;
        Ok(())
    }
}

/// Current time at the precision orders are stored with
fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}

fn validate_contact(name: &str, email: &str) -> ShopResult<()> {
    if name.trim().is_empty() {
        return Err(ShopError::Validation("shipping name is required".to_string()));
    }
    if email.trim().is_empty() {
        return Err(ShopError::Validation("email is required".to_string()));
    }
    Ok(())
}
