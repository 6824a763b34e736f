//! # PayPal Payments Client
//!
//! Client for the PayPal REST v1 payments API: client-credentials token
//! exchange, payment creation with an itemized amount, and execution of an
//! approved payment.

use crate::config::PayPalConfig;
use crate::types::{
    AmountDetails, ExecuteRequest, Item, ItemList, Payer, PaymentRequest, PaymentResponse,
    RedirectUrls, ShippingAddress, TokenResponse, Transaction, TransactionAmount,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use shop_core::{format_cents, Order, PaymentCreated, PaymentGateway, ShopError, ShopResult};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

const PROVIDER: &str = "paypal";

/// PayPal rejects longer item names and descriptions
const MAX_TEXT_LEN: usize = 127;

const REQUEST_ID_HEADER: &str = "PayPal-Request-Id";

const NOTE_TO_PAYER: &str = "Contact us for any questions on your order.";

/// PayPal payment gateway
///
/// Fetches a fresh access token for every operation; tokens are never cached
/// or logged.
pub struct PayPalClient {
    config: PayPalConfig,
    client: Client,
}

impl PayPalClient {
    /// Create a new PayPal client
    pub fn new(config: PayPalConfig) -> ShopResult<Self> {
        let mut builder = Client::builder().timeout(config.timeout);
        if config.legacy_tls {
            warn!("PAYPAL_LEGACY_TLS is set, accepting TLS versions below 1.2");
            builder = builder.min_tls_version(reqwest::tls::Version::TLS_1_0);
        }

        let client = builder.build().map_err(|e| {
            ShopError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> ShopResult<Self> {
        Self::new(PayPalConfig::from_env()?)
    }

    pub fn config(&self) -> &PayPalConfig {
        &self.config
    }

    /// Exchange the client credentials for a bearer token
    #[instrument(skip(self))]
    pub async fn get_access_token(&self) -> ShopResult<String> {
        let url = format!("{}/v1/oauth2/token", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.client_id, Some(&self.config.secret))
            .header("Accept", "application/json")
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let body = response.text().await.map_err(network_error)?;

        if status != StatusCode::OK {
            error!("PayPal token request failed: status={}, body={}", status, body);
            return Err(ShopError::Authentication {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            ShopError::Serialization(format!("Failed to parse PayPal token response: {}", e))
        })?;

        debug!(expires_in = ?token.expires_in, "Fetched PayPal access token");
        Ok(token.access_token)
    }

    /// Build the payment-intent body for an order
    pub fn build_payment_request(&self, order: &Order) -> ShopResult<PaymentRequest> {
        let order_id = order.require_id()?;
        let amount = order.amount()?;
        let currency = &self.config.currency;

        let mut items = Vec::new();
        for line in order.line_items()? {
            let mut name = line.product.name.clone();
            if let Some(option) = line
                .details
                .pricing_option
                .and_then(|idx| line.product.pricing_option(idx))
            {
                name = format!("{} ({})", name, option.label);
            }

            items.push(Item {
                name: truncate(&name),
                description: truncate(&line.product.description),
                quantity: line.quantity.to_string(),
                price: format_cents(line.unit_price_cents()?),
                sku: line.product.sku.clone(),
                currency: currency.clone(),
                url: self.config.urls.product_url(line.product),
            });
        }

        let shipping_address = if order.no_shipping {
            None
        } else {
            let shipping = &order.shipping;
            Some(ShippingAddress {
                recipient_name: shipping.name.clone(),
                line1: shipping.address1.clone(),
                line2: shipping.address2.clone(),
                city: shipping.city.clone(),
                state: shipping.state.clone(),
                postal_code: shipping.zip.clone(),
                country_code: shipping.country_code.clone(),
            })
        };

        let zero = format_cents(0);
        Ok(PaymentRequest {
            intent: "sale".to_string(),
            payer: Payer {
                payment_method: "paypal".to_string(),
            },
            transactions: vec![Transaction {
                amount: TransactionAmount {
                    total: amount.total(),
                    currency: currency.clone(),
                    details: AmountDetails {
                        subtotal: amount.subtotal(),
                        tax: amount.tax(),
                        shipping: zero.clone(),
                        handling_fee: zero.clone(),
                        shipping_discount: zero.clone(),
                        insurance: zero,
                    },
                },
                description: truncate(&format!(
                    "Order {} ({} items)",
                    order_id,
                    order.item_count()
                )),
                invoice_number: order_id.to_string(),
                item_list: ItemList {
                    items,
                    shipping_address,
                },
            }],
            note_to_payer: NOTE_TO_PAYER.to_string(),
            redirect_urls: RedirectUrls {
                return_url: self.config.urls.return_url(order_id),
                cancel_url: self.config.urls.cancel_url(order_id),
            },
        })
    }

    /// POST a JSON body with a bearer token.
    ///
    /// A 401 answer fetches a new token and retries once with the same
    /// request id, so the processor can deduplicate the retry.
    async fn post_authorized<B>(
        &self,
        path: &str,
        request_id: &str,
        body: &B,
    ) -> ShopResult<(StatusCode, String)>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = format!("{}{}", self.config.api_base_url, path);

        let token = self.get_access_token().await?;
        let (status, text) = self.send_json(&url, &token, request_id, body).await?;
        if status != StatusCode::UNAUTHORIZED {
            return Ok((status, text));
        }

        warn!(request_id = %request_id, "PayPal rejected access token, retrying once");
        let token = self.get_access_token().await?;
        self.send_json(&url, &token, request_id, body).await
    }

    async fn send_json<B>(
        &self,
        url: &str,
        token: &str,
        request_id: &str,
        body: &B,
    ) -> ShopResult<(StatusCode, String)>
    where
        B: Serialize + Sync + ?Sized,
    {
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .header(REQUEST_ID_HEADER, request_id)
            .json(body)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let text = response.text().await.map_err(network_error)?;
        Ok((status, text))
    }
}

#[async_trait]
impl PaymentGateway for PayPalClient {
    #[instrument(skip(self, order), fields(order_id = ?order.id))]
    async fn create_payment(&self, order: &Order) -> ShopResult<PaymentCreated> {
        let request = self.build_payment_request(order)?;

        debug!(
            "Creating PayPal payment: {} items, total={}",
            order.item_count(),
            order.amount()?.total()
        );

        let request_id = Uuid::new_v4().to_string();
        let (status, body) = self
            .post_authorized("/v1/payments/payment", &request_id, &request)
            .await?;

        if status != StatusCode::CREATED {
            error!("PayPal API error: status={}, body={}", status, body);
            return Err(ShopError::Processor {
                status: status.as_u16(),
                body,
            });
        }

        let payment: PaymentResponse = serde_json::from_str(&body).map_err(|e| {
            ShopError::Serialization(format!("Failed to parse PayPal payment: {}", e))
        })?;

        info!("Created PayPal payment: id={}, state={:?}", payment.id, payment.state);

        let approval_url = payment.approval_url().map(str::to_string);
        Ok(PaymentCreated {
            payment_id: payment.id,
            approval_url,
        })
    }

    #[instrument(skip(self, order), fields(order_id = ?order.id))]
    async fn execute_payment(&self, order: &Order) -> ShopResult<()> {
        let payment_id = order
            .paypal_payment_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ShopError::Validation("order has no PayPal payment id".to_string()))?;
        let payer_id = order
            .paypal_payer_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ShopError::Validation("order has no PayPal payer id".to_string()))?;

        // Stable per payment: a retried execute replays the first answer
        let request_id = format!("execute-{}", payment_id);
        let path = format!("/v1/payments/payment/{}/execute", payment_id);
        let (status, body) = self
            .post_authorized(&path, &request_id, &ExecuteRequest { payer_id })
            .await?;

        if status != StatusCode::OK {
            error!("PayPal execute failed: status={}, body={}", status, body);
            return Err(ShopError::Processor {
                status: status.as_u16(),
                body,
            });
        }

        info!("Executed PayPal payment: id={}", payment_id);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

fn network_error(e: reqwest::Error) -> ShopError {
    if e.is_timeout() {
        ShopError::Network(format!("PayPal request timed out: {}", e))
    } else {
        ShopError::Network(e.to_string())
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_TEXT_LEN).collect()
}
