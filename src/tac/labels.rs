use crate::tac::address::AddressManager;
use crate::tac::TacError;
use indexmap::IndexMap;
use serde::Serialize;

/// A loop or switch frame on the context stack. Loops carry both a break
/// and a continue target; switches only break.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ContextFrame {
    Loop {
        break_label: String,
        continue_label: String,
    },
    Switch {
        break_label: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelStatistics {
    pub contexts: usize,
    pub labels_tracked: usize,
    pub labels_referenced: usize,
    pub unresolved_labels: usize,
}

/// Tracks label definitions and references during TAC generation and owns
/// the break/continue context stack. Unique names come from the address
/// manager's shared counter so labels never collide across prefixes.
#[derive(Debug, Default)]
pub struct LabelManager {
    definitions: IndexMap<String, bool>,
    references: IndexMap<String, u32>,
    context_stack: Vec<ContextFrame>,
}

impl LabelManager {
    pub fn new() -> Self {
        LabelManager::default()
    }

    /// Produce a unique label with an optional semantic hint appended to the
    /// prefix (non-alphanumeric characters in the hint are collapsed).
    pub fn new_label(
        &mut self,
        addresses: &mut AddressManager,
        prefix: &str,
        hint: Option<&str>,
    ) -> String {
        let base = match hint {
            Some(hint) => {
                let sanitized: String = hint
                    .chars()
                    .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
                    .collect();
                let sanitized = sanitized.trim_matches('_');
                if sanitized.is_empty() {
                    prefix.to_string()
                } else {
                    format!("{prefix}_{sanitized}")
                }
            }
            None => prefix.to_string(),
        };
        let label = addresses.generate_label(&base);
        self.definitions.entry(label.clone()).or_insert(false);
        label
    }

    pub fn define_label(&mut self, label: &str) {
        self.definitions.insert(label.to_string(), true);
    }

    pub fn reference_label(&mut self, label: &str) {
        *self.references.entry(label.to_string()).or_insert(0) += 1;
        self.definitions.entry(label.to_string()).or_insert(false);
    }

    /// Labels that are jump targets but were never defined.
    pub fn unresolved_labels(&self) -> Vec<String> {
        self.definitions
            .iter()
            .filter(|(label, defined)| {
                !**defined && self.references.get(*label).copied().unwrap_or(0) > 0
            })
            .map(|(label, _)| label.clone())
            .collect()
    }

    pub fn push_loop(&mut self, break_label: &str, continue_label: &str) {
        self.context_stack.push(ContextFrame::Loop {
            break_label: break_label.to_string(),
            continue_label: continue_label.to_string(),
        });
        self.reference_label(break_label);
        self.reference_label(continue_label);
    }

    pub fn pop_loop(&mut self) -> Result<(), TacError> {
        match self.context_stack.last() {
            Some(ContextFrame::Loop { .. }) => {
                self.context_stack.pop();
                Ok(())
            }
            _ => Err(TacError::ContextStackMismatch { expected: "loop" }),
        }
    }

    pub fn push_switch(&mut self, break_label: &str) {
        self.context_stack.push(ContextFrame::Switch {
            break_label: break_label.to_string(),
        });
        self.reference_label(break_label);
    }

    pub fn pop_switch(&mut self) -> Result<(), TacError> {
        match self.context_stack.last() {
            Some(ContextFrame::Switch { .. }) => {
                self.context_stack.pop();
                Ok(())
            }
            _ => Err(TacError::ContextStackMismatch { expected: "switch" }),
        }
    }

    /// The nearest break target: loops and switches both provide one.
    pub fn current_break_label(&self) -> Option<&str> {
        self.context_stack.iter().rev().map(|frame| match frame {
            ContextFrame::Loop { break_label, .. } => break_label.as_str(),
            ContextFrame::Switch { break_label } => break_label.as_str(),
        }).next()
    }

    /// The nearest continue target, skipping switch frames.
    pub fn current_continue_label(&self) -> Option<&str> {
        self.context_stack.iter().rev().find_map(|frame| match frame {
            ContextFrame::Loop { continue_label, .. } => Some(continue_label.as_str()),
            ContextFrame::Switch { .. } => None,
        })
    }

    pub fn has_loop_context(&self) -> bool {
        self.context_stack
            .iter()
            .any(|frame| matches!(frame, ContextFrame::Loop { .. }))
    }

    pub fn context_depth(&self) -> usize {
        self.context_stack.len()
    }

    pub fn reset(&mut self) {
        self.definitions.clear();
        self.references.clear();
        self.context_stack.clear();
    }

    pub fn statistics(&self) -> LabelStatistics {
        LabelStatistics {
            contexts: self.context_stack.len(),
            labels_tracked: self.definitions.len(),
            labels_referenced: self.references.values().filter(|c| **c > 0).count(),
            unresolved_labels: self.unresolved_labels().len(),
        }
    }
}
