//! Types shared between the storefront backend and its API clients.

pub mod constants;
pub mod dto;
pub mod types;

pub use constants::*;
pub use dto::*;
pub use types::*;
