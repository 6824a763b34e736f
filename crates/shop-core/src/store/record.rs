//! Storage encoding of orders.
//!
//! Orders are written as flat property bags. Line-item details and the product
//! snapshot travel as opaque JSON blobs next to the regular columns and are
//! decoded explicitly on load.

use crate::error::{ShopError, ShopResult};
use crate::order::{Order, OrderStatus, ProductDetails, ShippingAddress};
use crate::product::Product;
use crate::store::Entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Property name of the creation timestamp (microseconds since epoch)
pub const CREATED: &str = "Created";
/// Property name of the status column
pub const STATUS: &str = "Status";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OrderRecord {
    name: String,
    address1: String,
    address2: String,
    city: String,
    state: String,
    zip: String,
    country_code: String,
    email: String,
    phone: String,
    product_ids: Vec<i64>,
    quantities: Vec<u32>,
    product_details_blob: String,
    products_blob: String,
    status: OrderStatus,
    checkout_step: String,
    paypal_payment_id: String,
    paypal_payer_id: String,
    address_verified: bool,
    no_shipping: bool,
    tax_percent: f64,
    #[serde(with = "chrono::serde::ts_microseconds")]
    created: DateTime<Utc>,
}

/// Encode an order (without its id) into an entity
pub fn encode(order: &Order) -> ShopResult<Entity> {
    let record = OrderRecord {
        name: order.shipping.name.clone(),
        address1: order.shipping.address1.clone(),
        address2: order.shipping.address2.clone(),
        city: order.shipping.city.clone(),
        state: order.shipping.state.clone(),
        zip: order.shipping.zip.clone(),
        country_code: order.shipping.country_code.clone(),
        email: order.email.clone(),
        phone: order.phone.clone(),
        product_ids: order.product_ids.clone(),
        quantities: order.quantities.clone(),
        product_details_blob: serde_json::to_string(&order.product_details)?,
        products_blob: serde_json::to_string(&order.products)?,
        status: order.status,
        checkout_step: order.checkout_step.clone(),
        paypal_payment_id: order.paypal_payment_id.clone().unwrap_or_default(),
        paypal_payer_id: order.paypal_payer_id.clone().unwrap_or_default(),
        address_verified: order.address_verified,
        no_shipping: order.no_shipping,
        tax_percent: order.tax_percent,
        created: order.created,
    };

    match serde_json::to_value(record)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(ShopError::Serialization(format!(
            "order encoded to non-object: {}",
            other
        ))),
    }
}

/// Decode a stored entity into an order with the given id
pub fn decode(id: i64, entity: Entity) -> ShopResult<Order> {
    let record: OrderRecord = serde_json::from_value(serde_json::Value::Object(entity))
        .map_err(|e| ShopError::Serialization(format!("order {}: {}", id, e)))?;

    let product_details: Vec<ProductDetails> = serde_json::from_str(&record.product_details_blob)
        .map_err(|e| ShopError::Serialization(format!("order {} product details: {}", id, e)))?;
    let products: Vec<Product> = serde_json::from_str(&record.products_blob)
        .map_err(|e| ShopError::Serialization(format!("order {} product snapshot: {}", id, e)))?;

    Ok(Order {
        id: Some(id),
        shipping: ShippingAddress {
            name: record.name,
            address1: record.address1,
            address2: record.address2,
            city: record.city,
            state: record.state,
            zip: record.zip,
            country_code: record.country_code,
        },
        email: record.email,
        phone: record.phone,
        product_ids: record.product_ids,
        quantities: record.quantities,
        product_details,
        products,
        status: record.status,
        checkout_step: record.checkout_step,
        paypal_payment_id: non_empty(record.paypal_payment_id),
        paypal_payer_id: non_empty(record.paypal_payer_id),
        address_verified: record.address_verified,
        no_shipping: record.no_shipping,
        tax_percent: record.tax_percent,
        created: record.created,
    })
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
