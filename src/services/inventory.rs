//! Atomic reservation and release of product stock.

use tracing::{instrument, warn};
use uuid::Uuid;

use crate::entities::OrderItem;
use crate::errors::ServiceError;
use crate::store::StoreTxn;

/// One line of a reservation: how many units of which product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

impl From<&OrderItem> for ReservationLine {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
        }
    }
}

/// Reservation lines for every item of an order.
pub fn reservation_lines(items: &[OrderItem]) -> Vec<ReservationLine> {
    items.iter().map(ReservationLine::from).collect()
}

/// Stock mutations staged inside the caller's transaction.
///
/// All-or-nothing: callers must discard the transaction (drop without
/// commit) whenever `reserve` fails, which throws away any decrement staged
/// before the failing line.
pub struct InventoryGuard;

impl InventoryGuard {
    /// Decrements stock for every line, failing with
    /// [`ServiceError::InsufficientStock`] on the first line whose product
    /// cannot cover the requested quantity.
    ///
    /// Repeated product ids within `lines` are handled correctly because the
    /// transaction's reads observe its own staged writes.
    #[instrument(skip(txn, lines), fields(line_count = lines.len()))]
    pub async fn reserve(
        txn: &mut dyn StoreTxn,
        lines: &[ReservationLine],
    ) -> Result<(), ServiceError> {
        for line in lines {
            let mut product = txn.product_by_id(line.product_id).await?.ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", line.product_id))
            })?;

            if product.stock < line.quantity {
                return Err(ServiceError::InsufficientStock(line.product_id));
            }

            product.stock -= line.quantity;
            txn.save_product(product).await?;
        }
        Ok(())
    }

    /// Increments stock back for every line. Only the state machine's
    /// genuine non-cancelled to cancelled edge calls this, which is what
    /// keeps release from ever firing twice for one order.
    #[instrument(skip(txn, lines), fields(line_count = lines.len()))]
    pub async fn release(
        txn: &mut dyn StoreTxn,
        lines: &[ReservationLine],
    ) -> Result<(), ServiceError> {
        for line in lines {
            match txn.product_by_id(line.product_id).await? {
                Some(mut product) => {
                    product.stock += line.quantity;
                    txn.save_product(product).await?;
                }
                None => {
                    warn!(product_id = %line.product_id, "product missing during stock release");
                }
            }
        }
        Ok(())
    }
}
