//! The [`Revenue`] builder.
//!
//! Revenue data is wrapped in a `Revenue` value and passed to the agent's
//! `log_revenue`, which converts it into a `revenue_amount` event. Price is
//! required; a revenue record without one is rejected before it ever
//! reaches the queue. Revenue amount is price × quantity, computed
//! server-side from the two properties.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Value};

use crate::constants::{
    REVENUE_PRICE, REVENUE_PRODUCT_ID, REVENUE_QUANTITY, REVENUE_RECEIPT, REVENUE_TYPE,
};

/// A pending revenue record.
///
/// Builder methods take and return `self`; the value is consumed by
/// `log_revenue`, so a sent record cannot be mutated afterwards.
#[derive(Clone, Debug, Default)]
pub struct Revenue {
    price: Option<f64>,
    quantity: Option<i64>,
    product_id: Option<String>,
    revenue_type: Option<String>,
    receipt: Option<Vec<u8>>,
    properties: Map<String, Value>,
}

impl Revenue {
    /// Create an empty revenue record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the unit price. Required.
    #[must_use]
    pub fn price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Set the quantity. Defaults to 1.
    #[must_use]
    pub fn quantity(mut self, quantity: i64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// Set the product identifier. Empty strings are ignored.
    #[must_use]
    pub fn product_id(mut self, product_id: impl Into<String>) -> Self {
        let product_id = product_id.into();
        if !product_id.is_empty() {
            self.product_id = Some(product_id);
        }
        self
    }

    /// Set the revenue type (purchase, refund, ...).
    #[must_use]
    pub fn revenue_type(mut self, revenue_type: impl Into<String>) -> Self {
        self.revenue_type = Some(revenue_type.into());
        self
    }

    /// Attach opaque receipt bytes for server-side verification.
    #[must_use]
    pub fn receipt(mut self, receipt: impl Into<Vec<u8>>) -> Self {
        self.receipt = Some(receipt.into());
        self
    }

    /// Set additional event properties for the revenue event.
    #[must_use]
    pub fn properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    /// Whether all required fields are set. Price of exactly zero counts as
    /// unset — a zero-price record carries no revenue signal.
    pub fn is_valid(&self) -> bool {
        matches!(self.price, Some(p) if p != 0.0)
    }

    /// Convert into the revenue event's property map.
    ///
    /// Returns `None` when the record is invalid. Revenue fields overwrite
    /// same-named keys in the caller-supplied properties.
    pub fn into_event_properties(self) -> Option<Map<String, Value>> {
        if !self.is_valid() {
            return None;
        }
        let mut props = self.properties;
        if let Some(product_id) = self.product_id {
            let _ = props.insert(REVENUE_PRODUCT_ID.into(), Value::String(product_id));
        }
        let _ = props.insert(
            REVENUE_QUANTITY.into(),
            Value::from(self.quantity.unwrap_or(1)),
        );
        let _ = props.insert(REVENUE_PRICE.into(), Value::from(self.price?));
        if let Some(revenue_type) = self.revenue_type {
            let _ = props.insert(REVENUE_TYPE.into(), Value::String(revenue_type));
        }
        if let Some(receipt) = self.receipt {
            let _ = props.insert(
                REVENUE_RECEIPT.into(),
                Value::String(BASE64.encode(receipt)),
            );
        }
        Some(props)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn price_is_required() {
        assert!(!Revenue::new().quantity(3).is_valid());
        assert!(Revenue::new().price(3.99).is_valid());
    }

    #[test]
    fn zero_price_rejected() {
        assert!(!Revenue::new().price(0.0).quantity(1).is_valid());
        assert!(Revenue::new().price(0.0).into_event_properties().is_none());
    }

    #[test]
    fn quantity_defaults_to_one() {
        let props = Revenue::new().price(3.99).into_event_properties().unwrap();
        assert_eq!(props[REVENUE_QUANTITY], json!(1));
    }

    #[test]
    fn full_record_converts() {
        let props = Revenue::new()
            .price(3.99)
            .quantity(2)
            .product_id("sku-1")
            .revenue_type("purchase")
            .receipt(vec![1, 2, 3])
            .into_event_properties()
            .unwrap();

        assert_eq!(props[REVENUE_PRICE], json!(3.99));
        assert_eq!(props[REVENUE_QUANTITY], json!(2));
        assert_eq!(props[REVENUE_PRODUCT_ID], json!("sku-1"));
        assert_eq!(props[REVENUE_TYPE], json!("purchase"));
        assert_eq!(props[REVENUE_RECEIPT], json!(BASE64.encode([1, 2, 3])));
    }

    #[test]
    fn empty_product_id_ignored() {
        let props = Revenue::new()
            .price(1.0)
            .product_id("")
            .into_event_properties()
            .unwrap();
        assert!(props.get(REVENUE_PRODUCT_ID).is_none());
    }

    #[test]
    fn caller_properties_preserved_but_not_overriding() {
        let mut extra = Map::new();
        let _ = extra.insert("campaign".into(), json!("spring"));
        let _ = extra.insert(REVENUE_PRICE.into(), json!(999.0));

        let props = Revenue::new()
            .price(2.5)
            .properties(extra)
            .into_event_properties()
            .unwrap();

        assert_eq!(props["campaign"], json!("spring"));
        // Revenue fields win over same-named caller properties.
        assert_eq!(props[REVENUE_PRICE], json!(2.5));
    }
}
