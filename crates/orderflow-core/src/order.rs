//! Order records and the request shapes that produce them.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::id::generate_id;

/// An accepted order.
///
/// The same `id` identifies the order in the cache, the queue, the primary
/// store and the search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub product_name: String,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Accepts a creation request: assigns a fresh id and the current UTC time.
    ///
    /// The timestamp is truncated to microseconds, the finest precision every
    /// store keeps, so an order reads back equal to what was accepted.
    pub fn accept(new: NewOrder) -> Self {
        Self::with_id(
            generate_id(),
            new.product_name,
            new.amount,
            Utc::now().trunc_subsecs(6),
        )
    }

    pub fn with_id(
        id: Uuid,
        product_name: impl Into<String>,
        amount: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            product_name: product_name.into(),
            amount,
            created_at,
        }
    }

    /// JSON encoding used on the queue and for the search document.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, CoreError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Body of a creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub product_name: String,
    pub amount: f64,
}

impl NewOrder {
    pub fn new(product_name: impl Into<String>, amount: f64) -> Self {
        Self {
            product_name: product_name.into(),
            amount,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.product_name.trim().is_empty() {
            return Err(CoreError::invalid_order("product_name must not be empty"));
        }
        if !self.amount.is_finite() {
            return Err(CoreError::invalid_order("amount must be a finite number"));
        }
        Ok(())
    }
}

/// Two-step bulk write executed inside one store transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOrderRequest {
    pub item_1: String,
    pub item_2: String,
}

impl BulkOrderRequest {
    pub const FIRST_ITEM_AMOUNT: f64 = 100.00;
    pub const SECOND_ITEM_AMOUNT: f64 = 50.00;

    /// Product name that forces the second step to fail.
    pub const FAILURE_SENTINEL: &'static str = "ERROR";

    pub fn new(item_1: impl Into<String>, item_2: impl Into<String>) -> Self {
        Self {
            item_1: item_1.into(),
            item_2: item_2.into(),
        }
    }

    pub fn first_order(&self) -> Order {
        Order::accept(NewOrder::new(&self.item_1, Self::FIRST_ITEM_AMOUNT))
    }

    pub fn second_order(&self) -> Order {
        Order::accept(NewOrder::new(&self.item_2, Self::SECOND_ITEM_AMOUNT))
    }

    pub fn forces_failure(&self) -> bool {
        self.item_2 == Self::FAILURE_SENTINEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accept_assigns_identity_and_utc_timestamp() {
        let before = Utc::now().trunc_subsecs(6);
        let order = Order::accept(NewOrder::new("Laptop", 1299.99));
        let after = Utc::now();

        assert!(!order.id.is_nil());
        assert_eq!(order.product_name, "Laptop");
        assert_eq!(order.amount, 1299.99);
        assert!(order.created_at >= before && order.created_at <= after);

        let other = Order::accept(NewOrder::new("Laptop", 1299.99));
        assert_ne!(order.id, other.id);
    }

    #[test]
    fn json_uses_snake_case_field_names() {
        let order = Order::accept(NewOrder::new("Mouse", 25.0));
        let value = serde_json::to_value(&order).unwrap();

        assert_eq!(value["id"], json!(order.id.to_string()));
        assert_eq!(value["product_name"], json!("Mouse"));
        assert_eq!(value["amount"], json!(25.0));
        assert!(value["created_at"].is_string());
    }

    #[test]
    fn undecodable_payload_is_an_error() {
        assert!(Order::from_json_bytes(b"{\"product_name\": 12}").is_err());
        assert!(Order::from_json_bytes(b"\xff\xfe").is_err());
    }

    #[test]
    fn validation_rejects_blank_names_and_non_finite_amounts() {
        assert!(NewOrder::new("Laptop", 10.0).validate().is_ok());
        assert!(NewOrder::new("   ", 10.0).validate().is_err());
        assert!(NewOrder::new("Laptop", f64::NAN).validate().is_err());
        assert!(NewOrder::new("Laptop", f64::INFINITY).validate().is_err());
    }

    #[test]
    fn bulk_request_steps() {
        let bulk = BulkOrderRequest::new("Laptop", "Mouse");
        let first = bulk.first_order();
        let second = bulk.second_order();

        assert_eq!(first.product_name, "Laptop");
        assert_eq!(first.amount, 100.00);
        assert_eq!(second.product_name, "Mouse");
        assert_eq!(second.amount, 50.00);
        assert_ne!(first.id, second.id);
        assert!(!bulk.forces_failure());
        assert!(BulkOrderRequest::new("Laptop", "ERROR").forces_failure());
    }
}
