//! # Product Types
//!
//! Catalog records read by the order lifecycle.
//! Products are loaded from `config/products.toml` and snapshotted into each order.

use crate::error::{ShopError, ShopResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A named price variant of a product (size, tier, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingOption {
    /// Label shown to the shopper
    pub label: String,
    /// Price in cents
    pub price_cents: i64,
}

impl PricingOption {
    pub fn new(label: impl Into<String>, price_cents: i64) -> Self {
        Self {
            label: label.into(),
            price_cents,
        }
    }
}

/// A product in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog id
    pub id: i64,

    /// Display name
    pub name: String,

    /// Short description
    #[serde(default)]
    pub description: String,

    /// Stock keeping unit reported to the payment processor
    #[serde(default)]
    pub sku: String,

    /// URL path slug (normalized on use)
    #[serde(default)]
    pub path: String,

    /// Base price in cents
    pub price_cents: i64,

    /// Price variants, used instead of `price_cents` when `has_pricing_options`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pricing_options: Vec<PricingOption>,

    #[serde(default)]
    pub has_pricing_options: bool,

    #[serde(default)]
    pub needs_date: bool,

    #[serde(default)]
    pub needs_time: bool,

    #[serde(default)]
    pub needs_pickup_location: bool,

    /// Nothing to ship (services, pickups, downloads)
    #[serde(default)]
    pub no_shipping: bool,
}

impl Product {
    /// Create a simple fixed-price product
    pub fn new(id: i64, name: impl Into<String>, price_cents: i64) -> Self {
        let name = name.into();
        Self {
            id,
            path: normalize_path(&name),
            name,
            description: String::new(),
            sku: format!("P{}", id),
            price_cents,
            pricing_options: Vec::new(),
            has_pricing_options: false,
            needs_date: false,
            needs_time: false,
            needs_pickup_location: false,
            no_shipping: false,
        }
    }

    /// Builder: set description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Builder: replace the base price by a list of options
    pub fn with_pricing_options(mut self, options: Vec<PricingOption>) -> Self {
        self.has_pricing_options = true;
        self.pricing_options = options;
        self
    }

    /// Builder: mark as not shippable
    pub fn without_shipping(mut self) -> Self {
        self.no_shipping = true;
        self
    }

    /// Builder: require a date, time slot and pickup location per line
    pub fn with_requirements(mut self, date: bool, time: bool, pickup_location: bool) -> Self {
        self.needs_date = date;
        self.needs_time = time;
        self.needs_pickup_location = pickup_location;
        self
    }

    /// Look up a pricing option by its index
    pub fn pricing_option(&self, index: usize) -> Option<&PricingOption> {
        self.pricing_options.get(index)
    }

    /// Normalized slug used for deep links back to the product page
    pub fn slug(&self) -> String {
        let normalized = normalize_path(&self.path);
        if normalized.is_empty() {
            normalize_path(&self.name)
        } else {
            normalized
        }
    }
}

/// Normalize a user-entered path into a URL slug.
///
/// Lower-cases, maps whitespace and underscores to `-`, drops anything outside
/// `[a-z0-9-/]`, collapses repeated separators and trims leading/trailing `/`.
pub fn normalize_path(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        let ch = ch.to_ascii_lowercase();
        let mapped = match ch {
            'a'..='z' | '0'..='9' | '/' => ch,
            '-' | '_' => '-',
            c if c.is_whitespace() => '-',
            _ => continue,
        };
        if (mapped == '-' || mapped == '/') && out.ends_with(mapped) {
            continue;
        }
        out.push(mapped);
    }
    out.trim_matches('/').to_string()
}

/// Bulk product lookup used when building orders
#[async_trait]
pub trait ProductSource: Send + Sync {
    /// Fetch products by id, preserving the order of `ids`.
    ///
    /// Fails with `NotFound` if any id is unknown.
    async fn get_multi(&self, ids: &[i64]) -> ShopResult<Vec<Product>>;
}

/// Product catalog (loaded from config)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCatalog {
    #[serde(default)]
    pub products: Vec<Product>,
}

impl ProductCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            products: Vec::new(),
        }
    }

    /// Add a product to the catalog
    pub fn add(&mut self, product: Product) {
        self.products.push(product);
    }

    /// Builder: add a product
    pub fn with_product(mut self, product: Product) -> Self {
        self.add(product);
        self
    }

    /// Find a product by ID
    pub fn get(&self, id: i64) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Load catalog from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

#[async_trait]
impl ProductSource for ProductCatalog {
    async fn get_multi(&self, ids: &[i64]) -> ShopResult<Vec<Product>> {
        ids.iter()
            .map(|id| {
                self.get(*id).cloned().ok_or(ShopError::NotFound {
                    kind: "Product",
                    id: *id,
                })
            })
            .collect()
    }
}
