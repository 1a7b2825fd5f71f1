use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LabelResolutionError {
    #[error("Label '{0}' is already defined. Duplicate label detected.")]
    Duplicate(String),
    #[error("Undefined labels referenced: {0}")]
    Undefined(String),
}

/// Tracks label definitions and references during MIPS emission so the
/// final program can be validated: every branch target defined exactly
/// once, no dangling references.
#[derive(Debug, Default)]
pub struct LabelManager {
    defined: IndexSet<String>,
    referenced: IndexSet<String>,
    counters: IndexMap<String, u32>,
}

impl LabelManager {
    pub fn new() -> Self {
        LabelManager::default()
    }

    pub fn define_label(&mut self, label: &str) -> Result<(), LabelResolutionError> {
        if !self.defined.insert(label.to_string()) {
            return Err(LabelResolutionError::Duplicate(label.to_string()));
        }
        Ok(())
    }

    pub fn reference_label(&mut self, label: &str) {
        self.referenced.insert(label.to_string());
    }

    pub fn is_defined(&self, label: &str) -> bool {
        self.defined.contains(label)
    }

    pub fn undefined_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .referenced
            .difference(&self.defined)
            .cloned()
            .collect();
        labels.sort();
        labels
    }

    pub fn unreferenced_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .defined
            .difference(&self.referenced)
            .cloned()
            .collect();
        labels.sort();
        labels
    }

    pub fn validate(&self) -> Result<(), LabelResolutionError> {
        let undefined = self.undefined_labels();
        if undefined.is_empty() {
            Ok(())
        } else {
            Err(LabelResolutionError::Undefined(undefined.join(", ")))
        }
    }

    pub fn unique_label(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        *counter += 1;
        format!("{prefix}{counter}")
    }

    pub fn reset(&mut self) {
        self.defined.clear();
        self.referenced.clear();
        self.counters.clear();
    }
}
