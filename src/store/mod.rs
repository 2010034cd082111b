//! Abstract persistence seam.
//!
//! The core never talks to a database directly; it requires a [`Store`] that
//! can open a transaction covering the order row and every touched product's
//! stock row. Writes staged in a [`StoreTxn`] become visible to other
//! transactions only on `commit`; dropping an uncommitted transaction
//! discards every staged write, which is what makes multi-product
//! reservations all-or-nothing.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::entities::{Order, Product};

pub mod memory;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint (order id or tracking number) was violated.
    #[error("unique constraint violation: {0}")]
    UniqueViolation(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// One unit of work. Reads observe the transaction's own staged writes.
#[async_trait]
pub trait StoreTxn: Send {
    async fn product_by_id(&mut self, id: Uuid) -> Result<Option<Product>, StoreError>;

    async fn save_product(&mut self, product: Product) -> Result<(), StoreError>;

    async fn order_by_id(&mut self, id: Uuid) -> Result<Option<Order>, StoreError>;

    async fn order_by_tracking_number(
        &mut self,
        tracking_number: &str,
    ) -> Result<Option<Order>, StoreError>;

    /// Inserts a new order, enforcing tracking-number uniqueness.
    async fn insert_order(&mut self, order: Order) -> Result<(), StoreError>;

    async fn save_order(&mut self, order: Order) -> Result<(), StoreError>;

    /// Atomically publishes every staged write.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a transaction. Transactions touching the same rows are
    /// serialized by the backend so stock can never go negative.
    async fn begin(&self) -> Result<Box<dyn StoreTxn>, StoreError>;
}
