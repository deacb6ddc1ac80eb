//! Scoped secret acquisition and output redaction

pub mod redact;

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub use redact::{Redactor, REDACTED};

/// Error types for secret acquisition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretError {
    #[error("secret '{name}' is not set (expected in ${source_var})")]
    Missing { name: String, source_var: String },

    #[error("secret '{0}' is empty")]
    Empty(String),
}

/// A secret value; never printed by `Debug`
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for injection into a child process only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

/// Source of secret values, queried once per step that declares them
pub trait SecretProvider: Send + Sync {
    /// Acquire the named secret
    fn acquire(&self, name: &str) -> Result<SecretValue, SecretError>;

    /// Runner environment variable the secret is read from, if any.
    ///
    /// These variables are stripped from every child process.
    fn source_variable(&self, name: &str) -> Option<String>;
}

/// Reads secrets from the runner's own environment
#[derive(Debug, Clone, Default)]
pub struct EnvSecretProvider {
    prefix: String,
}

impl EnvSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look secrets up as `<prefix><NAME>`
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn variable_for(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

impl SecretProvider for EnvSecretProvider {
    fn acquire(&self, name: &str) -> Result<SecretValue, SecretError> {
        let var = self.variable_for(name);
        match std::env::var(&var) {
            Ok(value) if value.is_empty() => Err(SecretError::Empty(name.to_string())),
            Ok(value) => Ok(SecretValue::new(value)),
            Err(_) => Err(SecretError::Missing {
                name: name.to_string(),
                source_var: var,
            }),
        }
    }

    fn source_variable(&self, name: &str) -> Option<String> {
        Some(self.variable_for(name))
    }
}

/// Fixed in-memory secrets, mainly for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct StaticSecretProvider {
    secrets: HashMap<String, SecretValue>,
}

impl StaticSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), SecretValue::new(value));
        self
    }
}

impl SecretProvider for StaticSecretProvider {
    fn acquire(&self, name: &str) -> Result<SecretValue, SecretError> {
        match self.secrets.get(name) {
            Some(value) if value.expose().is_empty() => Err(SecretError::Empty(name.to_string())),
            Some(value) => Ok(value.clone()),
            None => Err(SecretError::Missing {
                name: name.to_string(),
                source_var: name.to_string(),
            }),
        }
    }

    fn source_variable(&self, _name: &str) -> Option<String> {
        None
    }
}
