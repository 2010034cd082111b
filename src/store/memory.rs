//! In-memory [`Store`] used by tests and local development.
//!
//! A single mutex over the whole state gives the strongest form of the
//! serialization the trait demands: one transaction at a time. Writes are
//! staged in the transaction and applied to the shared state on commit.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::entities::{Order, Product};

use super::{Store, StoreError, StoreTxn};

#[derive(Default)]
struct MemoryState {
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
    tracking_index: HashMap<String, Uuid>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTxn>, StoreError> {
        let state = self.state.clone().lock_owned().await;
        Ok(Box::new(MemoryTxn {
            state,
            staged_products: HashMap::new(),
            staged_orders: HashMap::new(),
        }))
    }
}

struct MemoryTxn {
    state: OwnedMutexGuard<MemoryState>,
    staged_products: HashMap<Uuid, Product>,
    staged_orders: HashMap<Uuid, Order>,
}

#[async_trait]
impl StoreTxn for MemoryTxn {
    async fn product_by_id(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self
            .staged_products
            .get(&id)
            .or_else(|| self.state.products.get(&id))
            .cloned())
    }

    async fn save_product(&mut self, product: Product) -> Result<(), StoreError> {
        self.staged_products.insert(product.id, product);
        Ok(())
    }

    async fn order_by_id(&mut self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self
            .staged_orders
            .get(&id)
            .or_else(|| self.state.orders.get(&id))
            .cloned())
    }

    async fn order_by_tracking_number(
        &mut self,
        tracking_number: &str,
    ) -> Result<Option<Order>, StoreError> {
        if let Some(order) = self
            .staged_orders
            .values()
            .find(|order| order.tracking_number == tracking_number)
        {
            return Ok(Some(order.clone()));
        }
        Ok(self
            .state
            .tracking_index
            .get(tracking_number)
            .and_then(|id| self.state.orders.get(id))
            .cloned())
    }

    async fn insert_order(&mut self, order: Order) -> Result<(), StoreError> {
        if self.staged_orders.contains_key(&order.id) || self.state.orders.contains_key(&order.id)
        {
            return Err(StoreError::UniqueViolation(format!(
                "order id {} already exists",
                order.id
            )));
        }
        let tracking_taken = self.state.tracking_index.contains_key(&order.tracking_number)
            || self
                .staged_orders
                .values()
                .any(|staged| staged.tracking_number == order.tracking_number);
        if tracking_taken {
            return Err(StoreError::UniqueViolation(format!(
                "tracking number {} already exists",
                order.tracking_number
            )));
        }
        self.staged_orders.insert(order.id, order);
        Ok(())
    }

    async fn save_order(&mut self, order: Order) -> Result<(), StoreError> {
        self.staged_orders.insert(order.id, order);
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        let staged_products = mem::take(&mut self.staged_products);
        let staged_orders = mem::take(&mut self.staged_orders);
        for (id, product) in staged_products {
            self.state.products.insert(id, product);
        }
        for (id, order) in staged_orders {
            self.state
                .tracking_index
                .insert(order.tracking_number.clone(), id);
            self.state.orders.insert(id, order);
        }
        Ok(())
    }
}
