//! Order creation and user-facing order operations.

use std::sync::Arc;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::OrderSettings;
use crate::entities::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::store::{Store, StoreTxn};

use super::inventory::{reservation_lines, InventoryGuard};
use super::order_status;

/// Request/Response types for the order service
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<CreateOrderItemRequest>,
    #[validate(length(min = 1, max = 255, message = "Shipping address is required"))]
    pub shipping_address: String,
    #[validate(length(min = 6, max = 20, message = "Phone must be between 6 and 20 characters"))]
    pub phone: String,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Orchestrates order creation and the owner-scoped order operations.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    settings: OrderSettings,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn Store>,
        settings: OrderSettings,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            store,
            settings,
            event_sender,
        }
    }

    /// Creates an order: snapshots prices, computes totals from the pricing
    /// policy, reserves inventory, and persists the order with status
    /// `pending` — all in one transaction.
    #[instrument(skip(self, request), fields(customer_id = %customer_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        customer_id: Uuid,
    ) -> Result<Order, ServiceError> {
        request.validate()?;

        let mut txn = self.store.begin().await?;
        let now = Utc::now();

        let mut items = Vec::with_capacity(request.items.len());
        let mut subtotal = Decimal::ZERO;
        for line in &request.items {
            if line.quantity < 1 {
                return Err(ServiceError::ValidationError(format!(
                    "Quantity must be at least 1 for product {}",
                    line.product_id
                )));
            }

            let product = txn.product_by_id(line.product_id).await?.ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", line.product_id))
            })?;
            if !product.is_active {
                return Err(ServiceError::ValidationError(format!(
                    "Product is not available: {}",
                    product.name
                )));
            }

            let line_subtotal = product.price * Decimal::from(line.quantity);
            subtotal += line_subtotal;
            items.push(OrderItem {
                product_id: product.id,
                product_name: product.name,
                quantity: line.quantity,
                unit_price: product.price,
                subtotal: line_subtotal,
            });
        }

        let tax = (subtotal * self.settings.tax_rate)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let total = subtotal + tax + self.settings.shipping_fee;

        InventoryGuard::reserve(txn.as_mut(), &reservation_lines(&items)).await?;

        let order = Order {
            id: Uuid::new_v4(),
            customer_id,
            tracking_number: generate_tracking_number(request.payment_method),
            items,
            shipping_address: request.shipping_address,
            phone: request.phone,
            payment_method: request.payment_method,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            subtotal,
            tax,
            shipping: self.settings.shipping_fee,
            total,
            shipped_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: Some(now),
            version: 1,
        };

        txn.insert_order(order.clone()).await?;
        txn.commit().await?;

        info!(
            order_id = %order.id,
            customer_id = %customer_id,
            tracking_number = %order.tracking_number,
            total = %order.total,
            "order created"
        );

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::OrderCreated(order.id)).await {
                warn!(error = %e, order_id = %order.id, "failed to send order created event");
            }
        }

        Ok(order)
    }

    /// Loads an order, enforcing that `customer_id` owns it.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Order, ServiceError> {
        let mut txn = self.store.begin().await?;
        let order = txn
            .order_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        if order.customer_id != customer_id {
            return Err(ServiceError::Forbidden(
                "You don't have permission to access this order".to_string(),
            ));
        }

        Ok(order)
    }

    /// User-initiated cancellation: only the owner, and only while the order
    /// is still `pending`. The admin status path may additionally cancel
    /// from `processing`.
    #[instrument(skip(self), fields(order_id = %order_id, customer_id = %customer_id))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Order, ServiceError> {
        let mut txn = self.store.begin().await?;
        let mut order = txn
            .order_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        if order.customer_id != customer_id {
            return Err(ServiceError::Forbidden(
                "You don't have permission to cancel this order".to_string(),
            ));
        }
        if order.status != OrderStatus::Pending {
            return Err(ServiceError::ValidationError(format!(
                "Order cannot be cancelled. Current status: {}",
                order.status
            )));
        }

        order_status::transition(txn.as_mut(), &mut order, OrderStatus::Cancelled).await?;
        txn.commit().await?;

        info!(order_id = %order_id, "order cancelled by owner");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::OrderCancelled(order_id)).await {
                warn!(error = %e, order_id = %order_id, "failed to send order cancelled event");
            }
        }

        Ok(order)
    }
}

/// Tracking number: method tag + millisecond timestamp + random suffix.
/// Globally unique in practice; the store's unique constraint is the
/// backstop, and a collision there is treated as fatal.
fn generate_tracking_number(payment_method: PaymentMethod) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_ascii_uppercase();
    format!(
        "TXN_{}_{}_{}",
        payment_method.to_string().to_ascii_uppercase(),
        Utc::now().timestamp_millis(),
        suffix
    )
}
