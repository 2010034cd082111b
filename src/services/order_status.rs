//! Order status lifecycle.
//!
//! Every status change in the system goes through [`transition`], which
//! validates the edge against the fixed state graph and applies the side
//! effects exactly once: entering `cancelled` from a live state releases the
//! order's inventory reservation and cancels the payment; entering `shipped`
//! or `delivered` stamps the corresponding timestamp.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::{Order, OrderStatus, PaymentMethod, PaymentStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::store::{Store, StoreTxn};

use super::inventory::{reservation_lines, InventoryGuard};

/// Validates an edge of the status graph. A transition to the same state is
/// always a permitted no-op.
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    if from == to {
        return true;
    }
    matches!(
        (from, to),
        (Pending, Processing)
            | (Pending, Cancelled)
            | (Processing, Shipped)
            | (Processing, Cancelled)
            | (Shipped, Delivered)
    )
}

/// Applies a validated transition to `order` inside the caller's
/// transaction, staging the updated order row and any stock releases.
///
/// Returns `false` when `to` equals the current status (permitted no-op with
/// no side effects), `true` when the order actually moved. Side effects run
/// before the status flips, so a failed release leaves the transition
/// unapplied in the discarded transaction.
pub(crate) async fn transition(
    txn: &mut dyn StoreTxn,
    order: &mut Order,
    to: OrderStatus,
) -> Result<bool, ServiceError> {
    let from = order.status;
    if !is_valid_transition(from, to) {
        return Err(ServiceError::InvalidTransition { from, to });
    }
    if from == to {
        return Ok(false);
    }

    let now = Utc::now();
    match to {
        OrderStatus::Cancelled => {
            // Genuine live -> cancelled edge: the only place stock comes back.
            InventoryGuard::release(txn, &reservation_lines(&order.items)).await?;
            order.payment_status = PaymentStatus::Cancelled;
        }
        OrderStatus::Processing => {
            // A gateway order only reaches processing once the gateway has
            // confirmed payment.
            if order.payment_method == PaymentMethod::Gateway
                && order.payment_status == PaymentStatus::Pending
            {
                order.payment_status = PaymentStatus::Paid;
            }
        }
        OrderStatus::Shipped => order.shipped_at = Some(now),
        OrderStatus::Delivered => order.delivered_at = Some(now),
        OrderStatus::Pending => {}
    }

    order.status = to;
    order.updated_at = Some(now);
    order.version += 1;
    txn.save_order(order.clone()).await?;
    Ok(true)
}

/// Admin-facing status updates. Unlike user-initiated cancellation, this
/// path may cancel from `processing` as well as `pending` — anything the
/// state graph allows.
#[derive(Clone)]
pub struct OrderStatusService {
    store: Arc<dyn Store>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderStatusService {
    pub fn new(store: Arc<dyn Store>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    /// Moves an order to `new_status`, applying the transition's side
    /// effects in the same transaction as the order row update.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<Order, ServiceError> {
        let mut txn = self.store.begin().await?;
        let mut order = txn
            .order_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status;
        let changed = transition(txn.as_mut(), &mut order, new_status).await?;
        txn.commit().await?;

        if changed {
            info!(
                order_id = %order_id,
                old_status = %old_status,
                new_status = %new_status,
                "order status updated"
            );
            if let Some(event_sender) = &self.event_sender {
                if let Err(e) = event_sender
                    .send(Event::OrderStatusChanged {
                        order_id,
                        old_status,
                        new_status,
                    })
                    .await
                {
                    warn!(error = %e, order_id = %order_id, "failed to send status changed event");
                }
            }
        }

        Ok(order)
    }

    /// Gets the current status of an order.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_status(&self, order_id: Uuid) -> Result<OrderStatus, ServiceError> {
        let mut txn = self.store.begin().await?;
        let order = txn
            .order_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        Ok(order.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    const ALL: [OrderStatus; 5] = [Pending, Processing, Shipped, Delivered, Cancelled];

    #[test]
    fn transition_table_matches_state_graph() {
        let allowed = [
            (Pending, Processing),
            (Pending, Cancelled),
            (Processing, Shipped),
            (Processing, Cancelled),
            (Shipped, Delivered),
        ];

        for from in ALL {
            for to in ALL {
                let expected = from == to || allowed.contains(&(from, to));
                assert_eq!(
                    is_valid_transition(from, to),
                    expected,
                    "({from}, {to})"
                );
            }
        }
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for to in ALL {
            if to != Delivered {
                assert!(!is_valid_transition(Delivered, to));
            }
            if to != Cancelled {
                assert!(!is_valid_transition(Cancelled, to));
            }
        }
    }
}
