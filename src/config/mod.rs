//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `ENTITLEMENT_ENGINE` prefix and nested values use double underscores as separators.
//! List values (product identifiers) are comma-separated.
//!
//! # Example
//!
//! ```no_run
//! use entitlement_engine::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Selling {} products", config.store.product_ids.len());
//! ```

mod error;
mod sandbox;
mod store;
mod telemetry;

pub use error::{ConfigError, ValidationError};
pub use sandbox::{SandboxConfig, SandboxProductConfig};
pub use store::StoreConfig;
pub use telemetry::TelemetryConfig;

use std::path::Path;

use serde::Deserialize;

const ENV_PREFIX: &str = "ENTITLEMENT_ENGINE";
const LIST_KEYS: [&str; 2] = ["store.product_ids", "store.offer_required_products"];

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables,
/// or [`AppConfig::load_from_file()`] to layer the environment over a file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Store configuration (product identifiers)
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Sandbox purchase provider (development and tests)
    #[serde(default)]
    pub sandbox: Option<SandboxConfig>,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `ENTITLEMENT_ENGINE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `ENTITLEMENT_ENGINE__STORE__PRODUCT_IDS=sub.monthly,sub.yearly`
    /// - `ENTITLEMENT_ENGINE__TELEMETRY__JSON=true`
    /// - `ENTITLEMENT_ENGINE__SANDBOX__SIGNING_SECRET=...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required environment variables are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(environment())
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load configuration from a file, with environment variables taking precedence.
    ///
    /// The format is inferred from the file extension (`.toml`, `.json`, `.yaml`).
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(true))
            .add_source(environment())
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.store.validate()?;
        self.telemetry.validate()?;
        if let Some(sandbox) = &self.sandbox {
            sandbox.validate()?;
        }
        Ok(())
    }
}

fn environment() -> config::Environment {
    LIST_KEYS.iter().fold(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(","),
        |env, key| env.with_list_parse_key(key),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::io::Write;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var(
            "ENTITLEMENT_ENGINE__STORE__PRODUCT_IDS",
            "sub.monthly,sub.yearly,nonconsumable.unlock",
        );
    }

    fn clear_env() {
        env::remove_var("ENTITLEMENT_ENGINE__STORE__PRODUCT_IDS");
        env::remove_var("ENTITLEMENT_ENGINE__STORE__OFFER_REQUIRED_PRODUCTS");
        env::remove_var("ENTITLEMENT_ENGINE__TELEMETRY__JSON");
        env::remove_var("ENTITLEMENT_ENGINE__TELEMETRY__LOG_LEVEL");
        env::remove_var("ENTITLEMENT_ENGINE__SANDBOX__SIGNING_SECRET");
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(
            config.store.product_ids,
            vec!["sub.monthly", "sub.yearly", "nonconsumable.unlock"]
        );
        assert!(config.store.offer_required_products.is_empty());
        assert!(config.sandbox.is_none());
    }

    #[test]
    fn test_validate_full_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var(
            "ENTITLEMENT_ENGINE__STORE__OFFER_REQUIRED_PRODUCTS",
            "sub.monthly,sub.yearly",
        );
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.store.offer_required_products.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_telemetry_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("ENTITLEMENT_ENGINE__TELEMETRY__JSON", "true");
        env::set_var("ENTITLEMENT_ENGINE__TELEMETRY__LOG_LEVEL", "warn");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.telemetry.json);
        assert_eq!(config.telemetry.log_level, "warn");
    }

    #[test]
    fn test_missing_store_section_fails() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = AppConfig::load();

        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }

    #[test]
    fn test_load_from_file_with_sandbox_products() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[store]
product_ids = ["sub.monthly", "nonconsumable.unlock"]
offer_required_products = ["sub.monthly"]

[sandbox]
signing_secret = "sandbox-secret"

[[sandbox.products]]
id = "sub.monthly"
kind = "auto_renewable"
display_name = "Monthly"
price_minor = 499

[[sandbox.products]]
id = "nonconsumable.unlock"
kind = "non_consumable"
price_minor = 1999
currency = "EUR"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert!(config.validate().is_ok());

        let sandbox = config.sandbox.unwrap();
        assert_eq!(sandbox.signing_secret.expose_secret(), "sandbox-secret");
        assert_eq!(sandbox.products.len(), 2);
        assert_eq!(sandbox.products[1].currency, "EUR");
        assert_eq!(sandbox.products[0].display_name.as_deref(), Some("Monthly"));
    }

    #[test]
    fn test_environment_overrides_file() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[store]\nproduct_ids = [\"sub.monthly\"]").unwrap();

        env::set_var("ENTITLEMENT_ENGINE__STORE__PRODUCT_IDS", "sub.yearly");
        let result = AppConfig::load_from_file(file.path());
        clear_env();

        assert_eq!(result.unwrap().store.product_ids, vec!["sub.yearly"]);
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let result = AppConfig::load_from_file("/nonexistent/entitlement-engine.toml");
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
