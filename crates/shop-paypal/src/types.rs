//! PayPal REST v1 payment wire types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRequest {
    pub intent: String,
    pub payer: Payer,
    pub transactions: Vec<Transaction>,
    pub note_to_payer: String,
    pub redirect_urls: RedirectUrls,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payer {
    pub payment_method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub amount: TransactionAmount,
    pub description: String,
    pub invoice_number: String,
    pub item_list: ItemList,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionAmount {
    pub total: String,
    pub currency: String,
    pub details: AmountDetails,
}

/// Breakdown of the total; only subtotal and tax carry values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmountDetails {
    pub subtotal: String,
    pub tax: String,
    pub shipping: String,
    pub handling_fee: String,
    pub shipping_discount: String,
    pub insurance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemList {
    pub items: Vec<Item>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<ShippingAddress>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub name: String,
    pub description: String,
    pub quantity: String,
    pub price: String,
    pub sku: String,
    pub currency: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShippingAddress {
    pub recipient_name: String,
    pub line1: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedirectUrls {
    pub return_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentResponse {
    pub id: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl PaymentResponse {
    /// Where the payer approves the payment
    pub fn approval_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.rel == "approval_url")
            .map(|link| link.href.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
    #[serde(default)]
    pub method: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteRequest<'a> {
    pub payer_id: &'a str,
}
