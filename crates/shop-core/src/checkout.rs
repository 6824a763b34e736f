//! # Checkout Steps
//!
//! Ordered, named stages of the guided purchase flow. The order's
//! `checkout_step` names the current one.

use crate::error::{ShopError, ShopResult};
use crate::order::Order;
use crate::pricing::Amount;
use serde::Serialize;

/// One step as rendered for a given order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutStep {
    pub name: String,
    pub current: bool,
}

/// Configured step sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSteps {
    names: Vec<String>,
}

impl CheckoutSteps {
    pub fn new<I, S>(names: I) -> ShopResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cleaned: Vec<String> = Vec::new();
        for name in names {
            let name = name.into().trim().to_string();
            if name.is_empty() {
                continue;
            }
            if cleaned.contains(&name) {
                return Err(ShopError::Configuration(format!(
                    "duplicate checkout step: {}",
                    name
                )));
            }
            cleaned.push(name);
        }
        if cleaned.is_empty() {
            return Err(ShopError::Configuration(
                "at least one checkout step is required".to_string(),
            ));
        }
        Ok(Self { names: cleaned })
    }

    /// Parse a comma-separated list (e.g. from `CHECKOUT_STEPS`)
    pub fn parse(list: &str) -> ShopResult<Self> {
        Self::new(list.split(','))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn first(&self) -> &str {
        &self.names[0]
    }

    pub fn contains(&self, step: &str) -> bool {
        self.names.iter().any(|n| n == step)
    }

    /// Immediate successor; the last step is its own successor
    pub fn next_after(&self, step: &str) -> ShopResult<&str> {
        let index = self.position(step)?;
        let next = (index + 1).min(self.names.len() - 1);
        Ok(&self.names[next])
    }

    /// All steps, flagging the one matching `current`
    pub fn render(&self, current: &str) -> Vec<CheckoutStep> {
        self.names
            .iter()
            .map(|name| CheckoutStep {
                name: name.clone(),
                current: name == current,
            })
            .collect()
    }

    fn position(&self, step: &str) -> ShopResult<usize> {
        self.names
            .iter()
            .position(|n| n == step)
            .ok_or_else(|| ShopError::Validation(format!("unknown checkout step: {}", step)))
    }
}

impl Default for CheckoutSteps {
    fn default() -> Self {
        Self {
            names: vec!["shipinfo".to_string(), "payinfo".to_string()],
        }
    }
}

/// What a checkout page needs to render one step of an order
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutView {
    pub order: Order,
    pub amount: Amount,
    pub steps: Vec<CheckoutStep>,
    pub current: String,
    pub next: String,
}
