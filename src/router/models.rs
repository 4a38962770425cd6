//! Model Catalog
//!
//! The advertised model identifiers. Identifiers are opaque: anything the
//! caller names is forwarded upstream unchanged.

use crate::error::{RelayError, Result};

/// Models advertised when the configuration does not list any
pub const DEFAULT_MODELS: &[&str] = &[
    "sonar(clinesp)",
    "groq/moonshotai/kimi-k2-instruct",
    "sonar-reasoning-pro(clinesp)",
    "sonar-reasoning(clinesp)",
];

/// Ordered list of model identifiers; the first is the default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    models: Vec<String>,
}

impl ModelCatalog {
    /// Create a catalog. Fails if `models` is empty.
    pub fn new(models: Vec<String>) -> Result<Self> {
        if models.is_empty() {
            return Err(RelayError::Config(
                "model list must contain at least one model".to_string(),
            ));
        }
        Ok(Self { models })
    }

    /// The model used when the caller does not pick one
    pub fn default_model(&self) -> &str {
        &self.models[0]
    }

    /// The caller's model verbatim, or the default
    pub fn resolve<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(model) if !model.is_empty() => model,
            _ => self.default_model(),
        }
    }

    /// Whether the model is one of the advertised identifiers
    pub fn contains(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    /// All advertised models, in order
    pub fn models(&self) -> &[String] {
        &self.models
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
        }
    }
}
