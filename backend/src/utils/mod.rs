pub mod money;
pub mod order_number;
pub mod validation;

pub use money::*;
pub use order_number::generate_order_number;
pub use validation::*;
