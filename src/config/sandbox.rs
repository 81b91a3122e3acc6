//! Sandbox provider configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::entitlement::{Price, ProductDescriptor, ProductKind};
use crate::domain::foundation::{self, ProductId};

/// Sandbox provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxConfig {
    /// Secret used to sign sandbox transactions
    pub signing_secret: SecretString,

    /// Products the sandbox store sells
    #[serde(default)]
    pub products: Vec<SandboxProductConfig>,
}

/// One product sold by the sandbox store
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxProductConfig {
    pub id: String,

    /// Provider kind name (`non_consumable`, `auto_renewable`, ...)
    pub kind: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub price_minor: i64,

    #[serde(default = "default_currency")]
    pub currency: String,
}

impl SandboxConfig {
    /// Validate sandbox configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.signing_secret.expose_secret().is_empty() {
            return Err(ValidationError::EmptySigningSecret);
        }
        for product in &self.products {
            product
                .to_descriptor()
                .map_err(|e| ValidationError::InvalidSandboxProduct {
                    id: product.id.clone(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}

impl SandboxProductConfig {
    /// Builds the product descriptor this entry describes.
    pub fn to_descriptor(&self) -> Result<ProductDescriptor, foundation::ValidationError> {
        let id = ProductId::new(self.id.as_str())?;
        let kind = ProductKind::from_provider(&self.kind);
        if kind == ProductKind::Unknown {
            return Err(foundation::ValidationError::invalid_format(
                "kind",
                format!("unrecognised product kind '{}'", self.kind),
            ));
        }
        if self.price_minor < 0 {
            return Err(foundation::ValidationError::invalid_format(
                "price_minor",
                "price must not be negative",
            ));
        }
        let display_name = self.display_name.clone().unwrap_or_else(|| self.id.clone());
        Ok(ProductDescriptor::new(
            id,
            kind,
            display_name,
            Price::new(self.price_minor, self.currency.clone()),
        ))
    }
}

fn default_currency() -> String {
    "USD".to_string()
}
