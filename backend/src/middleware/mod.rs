pub mod identity;
pub mod request_timing;

pub use identity::AuthenticatedUser;
pub use request_timing::RequestTiming;
