use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use storefront_shared::{ORDER_NUMBER_PREFIX, ORDER_NUMBER_SUFFIX_LENGTH};

/// Human-readable order number: prefix, creation timestamp in milliseconds
/// and a random upper-case suffix, e.g. `ORD-1767225600000-K3Q9ZP`.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ORDER_NUMBER_SUFFIX_LENGTH)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();

    format!("{}-{}-{}", ORDER_NUMBER_PREFIX, now.timestamp_millis(), suffix)
}
