use rust_decimal::Decimal;

// Pricing policy defaults
pub const DEFAULT_TAX_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 2); // 0.08
pub const DEFAULT_SHIPPING_FEE: Decimal = Decimal::from_parts(999, 0, 0, false, 2); // 9.99
pub const DEFAULT_FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(100, 0, 0, false, 0); // 100

// Monetary amounts are stored with cent precision
pub const MONEY_SCALE: u32 = 2;
// Largest amount a NUMERIC(12, 2) column holds
pub const MAX_MONEY_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2); // 9999999999.99

// Pagination defaults
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

// Order constraints
pub const ORDER_NUMBER_PREFIX: &str = "ORD";
pub const ORDER_NUMBER_SUFFIX_LENGTH: usize = 6;
pub const ORDER_NUMBER_MAX_ATTEMPTS: usize = 5;

// Inventory
pub const DEFAULT_STOCK_HISTORY_DAYS: i64 = 30;
pub const MAX_STOCK_HISTORY_DAYS: i64 = 365;
pub const DEFAULT_MOVEMENT_PAGE_SIZE: i64 = 50;

// Success messages
pub const SUCCESS_ORDER_PLACED: &str = "Order placed successfully";
pub const SUCCESS_ORDER_FOUND: &str = "Order retrieved successfully";
pub const SUCCESS_ORDERS_LISTED: &str = "Orders retrieved successfully";
pub const SUCCESS_ORDER_UPDATED: &str = "Order updated successfully";
pub const SUCCESS_ORDER_CANCELLED: &str = "Order cancelled successfully";
pub const SUCCESS_ORDER_STATS: &str = "Order statistics retrieved successfully";
pub const SUCCESS_MOVEMENT_RECORDED: &str = "Inventory movement recorded successfully";
pub const SUCCESS_INVENTORY_ADJUSTED: &str = "Inventory adjusted successfully";
pub const SUCCESS_STOCK_HISTORY: &str = "Stock history retrieved successfully";
pub const SUCCESS_MOVEMENTS_LISTED: &str = "Inventory movements retrieved successfully";
pub const SUCCESS_INVENTORY_VALUE: &str = "Inventory value calculated successfully";
pub const SUCCESS_ALERT_SAVED: &str = "Stock alert saved successfully";
pub const SUCCESS_ALERT_DISMISSED: &str = "Stock alert dismissed successfully";
pub const SUCCESS_ALERTS_LISTED: &str = "Stock alerts retrieved successfully";
pub const SUCCESS_COUPON_VALID: &str = "Coupon validated";
pub const SUCCESS_COUPON_CREATED: &str = "Coupon created successfully";
pub const SUCCESS_COUPON_FOUND: &str = "Coupon retrieved successfully";
