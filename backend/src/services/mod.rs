pub mod coupon_service;
pub mod inventory_service;
pub mod order_service;

pub use coupon_service::{CouponRejection, CouponService, CouponValidation};
pub use inventory_service::{InventoryService, MovementCommand, StockHistory};
pub use order_service::{OrderService, OrderTotals};
