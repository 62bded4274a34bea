use rust_decimal::Decimal;
use serde::Deserialize;
use storefront_shared::{DEFAULT_FREE_SHIPPING_THRESHOLD, DEFAULT_SHIPPING_FEE, DEFAULT_TAX_RATE};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub tax_rate: String,
    pub shipping_fee: String,
    pub free_shipping_threshold: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", 8080)?
            .set_default("storage", "postgres")?
            .set_default("max_connections", 20)?
            .set_default("tax_rate", DEFAULT_TAX_RATE.to_string())?
            .set_default("shipping_fee", DEFAULT_SHIPPING_FEE.to_string())?
            .set_default("free_shipping_threshold", DEFAULT_FREE_SHIPPING_THRESHOLD.to_string())?
            .add_source(config::Environment::default())
            .build()?;

        config.try_deserialize()
    }

    pub fn pricing_policy(&self) -> Result<PricingPolicy, AppError> {
        PricingPolicy::parse(&self.tax_rate, &self.shipping_fee, &self.free_shipping_threshold)
    }
}

/// Tax and shipping rules applied to every order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    pub tax_rate: Decimal,
    pub shipping_fee: Decimal,
    /// Subtotals strictly above this ship for free.
    pub free_shipping_threshold: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: DEFAULT_TAX_RATE,
            shipping_fee: DEFAULT_SHIPPING_FEE,
            free_shipping_threshold: DEFAULT_FREE_SHIPPING_THRESHOLD,
        }
    }
}

impl PricingPolicy {
    pub fn parse(
        tax_rate: &str,
        shipping_fee: &str,
        free_shipping_threshold: &str,
    ) -> Result<Self, AppError> {
        let policy = Self {
            tax_rate: parse_decimal("tax_rate", tax_rate)?,
            shipping_fee: parse_decimal("shipping_fee", shipping_fee)?,
            free_shipping_threshold: parse_decimal("free_shipping_threshold", free_shipping_threshold)?,
        };

        if policy.tax_rate < Decimal::ZERO || policy.tax_rate > Decimal::ONE {
            return Err(AppError::Validation("tax_rate must be between 0 and 1".to_string()));
        }
        if policy.shipping_fee < Decimal::ZERO || policy.free_shipping_threshold < Decimal::ZERO {
            return Err(AppError::Validation(
                "shipping amounts must not be negative".to_string(),
            ));
        }

        Ok(policy)
    }
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, AppError> {
    Decimal::from_str_exact(value.trim())
        .map_err(|e| AppError::Validation(format!("Invalid decimal for {}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_policy_overrides() {
        let policy = PricingPolicy::parse("0.10", "5.00", "50").unwrap();
        assert_eq!(policy.tax_rate, Decimal::from_str("0.10").unwrap());
        assert_eq!(policy.shipping_fee, Decimal::from(5));
        assert_eq!(policy.free_shipping_threshold, Decimal::from(50));
    }

    #[test]
    fn rejects_out_of_range_tax_rate() {
        assert!(matches!(
            PricingPolicy::parse("1.5", "9.99", "100"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            PricingPolicy::parse("abc", "9.99", "100"),
            Err(AppError::Validation(_))
        ));
    }
}
