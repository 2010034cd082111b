use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Product as seen by the fulfillment core: a priced, stock-counted item.
///
/// Orders snapshot `price` at purchase time; later price changes never
/// affect existing orders. `stock` is only mutated through inventory
/// reservation and release.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub price: Decimal,
    /// On-hand units available for reservation. Never negative.
    pub stock: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn new(name: impl Into<String>, sku: impl Into<String>, price: Decimal, stock: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            sku: sku.into(),
            price,
            stock,
            is_active: true,
            created_at: now,
            updated_at: Some(now),
        }
    }
}
