//! Masking of secret values in captured and streamed output

use std::sync::{Arc, RwLock};

/// Replacement text for a redacted value
pub const REDACTED: &str = "***";

/// The set of secret values seen during one run.
///
/// Cloning shares the set, so every clone redacts values registered by any other.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    values: Arc<RwLock<Vec<String>>>,
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a value to mask from now on
    pub fn register(&self, value: &str) {
        if value.is_empty() {
            return;
        }
        let Ok(mut values) = self.values.write() else {
            return;
        };
        if values.iter().any(|v| v == value) {
            return;
        }
        values.push(value.to_string());
        // Longest first, so a secret containing another is masked whole
        values.sort_by(|a, b| b.len().cmp(&a.len()));
    }

    /// Number of registered values
    pub fn len(&self) -> usize {
        self.values.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace every registered value in `text` with `***`
    pub fn redact(&self, text: &str) -> String {
        let Ok(values) = self.values.read() else {
            return text.to_string();
        };
        values
            .iter()
            .fold(text.to_string(), |acc, value| acc.replace(value.as_str(), REDACTED))
    }
}
