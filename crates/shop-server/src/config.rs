//! Server Configuration
//!
//! Read from the environment (after `.env` is loaded by `main`).

use std::str::FromStr;
use std::time::Duration;

use shop_payments::{signature::DEFAULT_TOLERANCE_SECS, CheckoutSettings};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Everything the server needs at startup
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    /// `None` disables checkout (503)
    pub stripe_secret_key: Option<String>,
    /// `None` rejects every webhook delivery
    pub webhook_secret: Option<String>,
    pub webhook_tolerance_secs: i64,
    pub checkout: CheckoutSettings,
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |keys: &[&str]| {
            keys.iter()
                .find_map(|&key| lookup(key).filter(|value| !value.trim().is_empty()))
        };

        let defaults = CheckoutSettings::default();
        let gateway_timeout_secs = parse(&get, "GATEWAY_TIMEOUT_SECS", 10_u64)?;

        Ok(Self {
            bind_addr: get(&["BIND_ADDR"]).unwrap_or_else(|| "0.0.0.0:3000".into()),
            stripe_secret_key: get(&["STRIPE_SECRET_KEY", "STRIPE_KEY"]),
            webhook_secret: get(&["STRIPE_WEBHOOK_SECRET", "STRIPE_WH_SIGNING_SECRET"]),
            webhook_tolerance_secs: parse(&get, "WEBHOOK_TOLERANCE_SECS", DEFAULT_TOLERANCE_SECS)?,
            checkout: CheckoutSettings {
                success_url: get(&["SUCCESS_BASE_URL"]).unwrap_or(defaults.success_url),
                cancel_url: get(&["CANCEL_BASE_URL"]).unwrap_or(defaults.cancel_url),
                currency: get(&["CHECKOUT_CURRENCY"])
                    .map_or(defaults.currency, |c| c.to_ascii_lowercase()),
                gateway_timeout: Duration::from_secs(gateway_timeout_secs),
            },
            jwt_secret: get(&["JWT_SECRET", "SECRET"]).ok_or(ConfigError::Missing("JWT_SECRET"))?,
            token_ttl_secs: parse(&get, "TOKEN_TTL_SECS", 3600_i64)?,
        })
    }

    pub fn payments_configured(&self) -> bool {
        self.stripe_secret_key.is_some()
    }
}

fn parse<T: FromStr>(
    get: &impl Fn(&[&str]) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(&[key]) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert!(!config.payments_configured());
        assert_eq!(config.webhook_secret, None);
        assert_eq!(config.webhook_tolerance_secs, 300);
        assert_eq!(config.checkout.success_url, "http://localhost:5173/success");
        assert_eq!(config.checkout.cancel_url, "http://localhost:5173/carrito");
        assert_eq!(config.checkout.currency, "usd");
        assert_eq!(config.checkout.gateway_timeout, Duration::from_secs(10));
        assert_eq!(config.token_ttl_secs, 3600);
    }

    #[test]
    fn test_legacy_aliases() {
        let config = config(&[
            ("SECRET", "legacy"),
            ("STRIPE_KEY", "sk_test_1"),
            ("STRIPE_WH_SIGNING_SECRET", "whsec_1"),
        ])
        .unwrap();
        assert_eq!(config.jwt_secret, "legacy");
        assert_eq!(config.stripe_secret_key.as_deref(), Some("sk_test_1"));
        assert_eq!(config.webhook_secret.as_deref(), Some("whsec_1"));
    }

    #[test]
    fn test_primary_name_wins_over_alias() {
        let config = config(&[
            ("JWT_SECRET", "primary"),
            ("SECRET", "legacy"),
            ("STRIPE_SECRET_KEY", "sk_primary"),
            ("STRIPE_KEY", "sk_legacy"),
        ])
        .unwrap();
        assert_eq!(config.jwt_secret, "primary");
        assert_eq!(config.stripe_secret_key.as_deref(), Some("sk_primary"));
    }

    #[test]
    fn test_missing_jwt_secret() {
        assert_eq!(config(&[]).unwrap_err(), ConfigError::Missing("JWT_SECRET"));
        assert_eq!(
            config(&[("JWT_SECRET", "  ")]).unwrap_err(),
            ConfigError::Missing("JWT_SECRET")
        );
    }

    #[test]
    fn test_invalid_number() {
        let err = config(&[("JWT_SECRET", "s"), ("GATEWAY_TIMEOUT_SECS", "ten")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "GATEWAY_TIMEOUT_SECS",
                value: "ten".into()
            }
        );
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("JWT_SECRET", "s"),
            ("GATEWAY_TIMEOUT_SECS", "3"),
            ("CHECKOUT_CURRENCY", "EUR"),
            ("SUCCESS_BASE_URL", "https://shop.test/ok"),
        ])
        .unwrap();
        assert_eq!(config.checkout.gateway_timeout, Duration::from_secs(3));
        assert_eq!(config.checkout.currency, "eur");
        assert_eq!(config.checkout.success_url, "https://shop.test/ok");
    }
}
