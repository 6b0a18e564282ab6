use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

/// Tunables with money attached. Kept as strings in the config files so they
/// deserialize through `Decimal` without passing through a float.
#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Platform cut of every settled order, e.g. "0.08".
    pub marketplace_fee_rate: Decimal,
    /// Per-store shipping charged when a store has no row for the buyer's city.
    pub default_shipping_fee: Decimal,
    /// How many times checkout regenerates confirmation codes on collision.
    #[serde(default = "default_code_retries")]
    pub code_retry_attempts: u32,
}

fn default_code_retries() -> u32 {
    3
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of FEIRA)
            // Eg.. `FEIRA_SERVER__PORT=8080` would set `server.port`
            .add_source(config::Environment::with_prefix("FEIRA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rules_deserialize_from_strings() {
        let rules: BusinessRules = serde_json::from_value(serde_json::json!({
            "marketplace_fee_rate": "0.08",
            "default_shipping_fee": "5.00",
        }))
        .unwrap();
        assert_eq!(rules.marketplace_fee_rate, dec!(0.08));
        assert_eq!(rules.default_shipping_fee, dec!(5.00));
        assert_eq!(rules.code_retry_attempts, 3);
    }
}
