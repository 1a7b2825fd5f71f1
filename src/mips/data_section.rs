//! The `.data` segment: interned string literals, array reservations and
//! the fixed runtime buffers. `_data_segment_start` anchors the segment so
//! the print helper can tell string addresses from small integers.

use crate::mips::instruction::MipsNode;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayDeclaration {
    pub label: String,
    pub size: u32,
    pub element_size: u32,
}

#[derive(Debug, Default)]
pub struct DataSectionManager {
    strings: IndexMap<String, StringLiteral>,
    arrays: IndexMap<String, ArrayDeclaration>,
    string_counter: u32,
    array_counter: u32,
}

fn escape_string(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
        .replace('\r', "\\r")
}

impl DataSectionManager {
    pub fn new() -> Self {
        DataSectionManager::default()
    }

    /// Intern a string literal by value; the same value always yields the
    /// same `_strN` label. Surrounding quotes from TAC operands are
    /// stripped first.
    pub fn add_string_literal(&mut self, value: &str) -> String {
        let clean = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);

        if let Some(existing) = self.strings.get(clean) {
            return existing.label.clone();
        }

        let label = format!("_str{}", self.string_counter);
        self.string_counter += 1;
        self.strings.insert(
            clean.to_string(),
            StringLiteral {
                label: label.clone(),
                value: clean.to_string(),
            },
        );
        label
    }

    pub fn add_array(&mut self, size: u32, element_size: u32) -> String {
        let label = format!("_array{}", self.array_counter);
        self.array_counter += 1;
        self.arrays.insert(
            label.clone(),
            ArrayDeclaration {
                label: label.clone(),
                size,
                element_size,
            },
        );
        label
    }

    pub fn string_label(&self, value: &str) -> Option<&str> {
        self.strings.get(value).map(|s| s.label.as_str())
    }

    pub fn generate_data_section(&self) -> Vec<MipsNode> {
        let mut nodes = vec![
            MipsNode::directive(".data", &[]),
            MipsNode::label("_data_segment_start"),
            MipsNode::comment("String literals"),
        ];

        for literal in self.strings.values() {
            nodes.push(MipsNode::label(&literal.label));
            nodes.push(MipsNode::directive(
                ".asciiz",
                &[&format!("\"{}\"", escape_string(&literal.value))],
            ));
        }

        if !self.arrays.is_empty() {
            nodes.push(MipsNode::comment("Array declarations"));
            for array in self.arrays.values() {
                nodes.push(MipsNode::label(&array.label));
                nodes.push(MipsNode::directive(
                    ".space",
                    &[&(array.size * array.element_size).to_string()],
                ));
            }
        }

        nodes.push(MipsNode::comment("Newline for output"));
        nodes.push(MipsNode::label("_newline"));
        nodes.push(MipsNode::directive(".asciiz", &["\"\\n\""]));

        nodes.push(MipsNode::comment("Buffer for string concatenation"));
        nodes.push(MipsNode::label("_str_buffer"));
        nodes.push(MipsNode::directive(".space", &["1024"]));

        nodes.push(MipsNode::comment("Buffer for int to string conversion"));
        nodes.push(MipsNode::label("_int_buffer"));
        nodes.push(MipsNode::directive(".space", &["256"]));

        nodes
    }
}
