//! Shared fixture wiring every service against one in-memory store.

#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use orderflow::config::{GatewaySettings, OrderSettings};
use orderflow::entities::{Order, Product};
use orderflow::services::{OrderService, OrderStatusService, PaymentService};
use orderflow::store::{MemoryStore, Store};

pub struct TestApp {
    pub store: MemoryStore,
    pub orders: OrderService,
    pub status: OrderStatusService,
    pub payments: PaymentService,
    pub gateway: Arc<GatewaySettings>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_order_settings(OrderSettings::default())
    }

    pub fn with_order_settings(order_settings: OrderSettings) -> Self {
        let store = MemoryStore::new();
        let dyn_store: Arc<dyn Store> = Arc::new(store.clone());
        let gateway = Arc::new(GatewaySettings::default());

        let orders = OrderService::new(dyn_store.clone(), order_settings, None);
        let status = OrderStatusService::new(dyn_store.clone(), None);
        let payments = PaymentService::new(dyn_store, gateway.clone(), None);

        Self {
            store,
            orders,
            status,
            payments,
            gateway,
        }
    }

    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> Product {
        let product = Product::new(name, format!("SKU-{}", name.to_uppercase()), price, stock);
        let mut txn = self.store.begin().await.expect("begin");
        txn.save_product(product.clone()).await.expect("save product");
        txn.commit().await.expect("commit");
        product
    }

    pub async fn stock_of(&self, product_id: Uuid) -> i32 {
        let mut txn = self.store.begin().await.expect("begin");
        txn.product_by_id(product_id)
            .await
            .expect("load product")
            .expect("product exists")
            .stock
    }

    /// Raw order lookup bypassing the owner check.
    pub async fn order_by_id(&self, order_id: Uuid) -> Order {
        let mut txn = self.store.begin().await.expect("begin");
        txn.order_by_id(order_id)
            .await
            .expect("load order")
            .expect("order exists")
    }
}
