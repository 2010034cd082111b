// Core services
pub mod inventory;
pub mod order_status;
pub mod orders;
pub mod payments;

pub use inventory::{InventoryGuard, ReservationLine};
pub use order_status::OrderStatusService;
pub use orders::OrderService;
pub use payments::PaymentService;
