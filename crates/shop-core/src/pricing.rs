//! # Pricing
//!
//! Computes line and order totals from product definitions, pricing option
//! selections and a tax rate. Money is carried as integer cents; only the
//! final figures are rendered as decimal strings for the processor.

use crate::error::{ShopError, ShopResult};
use crate::order::ProductDetails;
use crate::product::Product;
use serde::Serialize;

/// Order amount in cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Amount {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

impl Amount {
    /// Total as a two-decimal currency string (e.g. "21.60")
    pub fn total(&self) -> String {
        format_cents(self.total_cents)
    }

    pub fn subtotal(&self) -> String {
        format_cents(self.subtotal_cents)
    }

    pub fn tax(&self) -> String {
        format_cents(self.tax_cents)
    }
}

/// Unit price of one line.
///
/// Products with pricing options are charged the chosen option's price, never
/// the base price; a missing or out-of-range choice is a validation error.
pub fn unit_price_cents(product: &Product, details: &ProductDetails) -> ShopResult<i64> {
    if !product.has_pricing_options {
        return Ok(product.price_cents);
    }

    let index = details.pricing_option.ok_or_else(|| {
        ShopError::Validation(format!(
            "product {} requires a pricing option",
            product.id
        ))
    })?;

    product
        .pricing_option(index)
        .map(|option| option.price_cents)
        .ok_or_else(|| {
            ShopError::Validation(format!(
                "product {} has no pricing option {}",
                product.id, index
            ))
        })
}

/// Unit price times quantity
pub fn line_total_cents(
    product: &Product,
    quantity: u32,
    details: &ProductDetails,
) -> ShopResult<i64> {
    unit_price_cents(product, details)?
        .checked_mul(i64::from(quantity))
        .ok_or_else(|| overflow(product.id))
}

/// Tax on a subtotal, computed in floating point and truncated to whole cents.
///
/// Fails when the result does not fit in `i64` cents.
pub fn tax_cents(subtotal_cents: i64, tax_percent: f64) -> ShopResult<i64> {
    let tax = subtotal_cents as f64 * tax_percent / 100.0;
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if !tax.is_finite() || tax >= i64::MAX as f64 || tax < i64::MIN as f64 {
        return Err(ShopError::Validation(format!(
            "tax overflow at {}% of {} cents",
            tax_percent, subtotal_cents
        )));
    }
    Ok(tax as i64)
}

/// Compute the amount of an ordered list of `(product, quantity, details)` lines.
///
/// An empty list prices to zero.
pub fn compute_amount<'a, I>(lines: I, tax_percent: f64) -> ShopResult<Amount>
where
    I: IntoIterator<Item = (&'a Product, u32, &'a ProductDetails)>,
{
    let mut subtotal_cents: i64 = 0;
    for (product, quantity, details) in lines {
        let line = line_total_cents(product, quantity, details)?;
        subtotal_cents = subtotal_cents
            .checked_add(line)
            .ok_or_else(|| overflow(product.id))?;
    }

    let tax_cents = tax_cents(subtotal_cents, tax_percent)?;
    let total_cents = subtotal_cents.checked_add(tax_cents).ok_or_else(|| {
        ShopError::Validation(format!(
            "amount overflow adding {} cents tax to {} cents",
            tax_cents, subtotal_cents
        ))
    })?;
    Ok(Amount {
        subtotal_cents,
        tax_cents,
        total_cents,
    })
}

/// Render cents as a decimal string with two places
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

fn overflow(product_id: i64) -> ShopError {
    ShopError::Validation(format!("amount overflow on product {}", product_id))
}
