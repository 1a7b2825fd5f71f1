use itertools::Itertools;
use std::fmt::{self, Display};

/// Column where trailing comments start.
const COMMENT_COLUMN: usize = 24;

/// One node of the emitted assembly stream. Instructions keep opcode and
/// operands in textual form so translators stay agnostic of R/I/J formats
/// while the peephole optimizer can still match on structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MipsNode {
    Instruction {
        opcode: String,
        operands: Vec<String>,
        comment: Option<String>,
    },
    Label {
        name: String,
    },
    Directive {
        directive: String,
        operands: Vec<String>,
        comment: Option<String>,
    },
    Comment {
        text: String,
    },
}

impl MipsNode {
    pub fn ins(opcode: impl Into<String>, operands: &[&str]) -> Self {
        MipsNode::Instruction {
            opcode: opcode.into(),
            operands: operands.iter().map(|o| o.to_string()).collect(),
            comment: None,
        }
    }

    pub fn label(name: impl Into<String>) -> Self {
        MipsNode::Label { name: name.into() }
    }

    pub fn directive(directive: impl Into<String>, operands: &[&str]) -> Self {
        MipsNode::Directive {
            directive: directive.into(),
            operands: operands.iter().map(|o| o.to_string()).collect(),
            comment: None,
        }
    }

    pub fn comment(text: impl Into<String>) -> Self {
        MipsNode::Comment { text: text.into() }
    }

    pub fn with_comment(mut self, text: impl Into<String>) -> Self {
        match &mut self {
            MipsNode::Instruction { comment, .. } | MipsNode::Directive { comment, .. } => {
                *comment = Some(text.into());
            }
            _ => {}
        }
        self
    }

    pub fn is_instruction(&self) -> bool {
        matches!(self, MipsNode::Instruction { .. })
    }

    pub fn opcode(&self) -> Option<&str> {
        match self {
            MipsNode::Instruction { opcode, .. } => Some(opcode),
            _ => None,
        }
    }

    pub fn operands(&self) -> &[String] {
        match self {
            MipsNode::Instruction { operands, .. } | MipsNode::Directive { operands, .. } => {
                operands
            }
            _ => &[],
        }
    }
}

fn render_with_comment(
    f: &mut fmt::Formatter<'_>,
    head: &str,
    operands: &[String],
    comment: &Option<String>,
) -> fmt::Result {
    let mut base = format!("\t{head}");
    if !operands.is_empty() {
        base = format!("{base} {}", operands.iter().join(", "));
    }
    match comment {
        Some(comment) => {
            let padding = " ".repeat(COMMENT_COLUMN.saturating_sub(base.len()).max(1));
            write!(f, "{base}{padding}# {comment}")
        }
        None => write!(f, "{base}"),
    }
}

impl Display for MipsNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MipsNode::Instruction {
                opcode,
                operands,
                comment,
            } => render_with_comment(f, opcode, operands, comment),
            MipsNode::Label { name } => write!(f, "{name}:"),
            MipsNode::Directive {
                directive,
                operands,
                comment,
            } => render_with_comment(f, directive, operands, comment),
            MipsNode::Comment { text } => write!(f, "# {text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_are_tab_indented() {
        let node = MipsNode::ins("add", &["$t0", "$t1", "$t2"]);
        assert_eq!(node.to_string(), "\tadd $t0, $t1, $t2");
    }

    #[test]
    fn comments_are_column_aligned() {
        let node = MipsNode::ins("li", &["$v0", "10"]).with_comment("exit");
        let text = node.to_string();
        let hash = text.find('#').unwrap();
        assert_eq!(hash, COMMENT_COLUMN);
        assert!(text.ends_with("# exit"));
    }

    #[test]
    fn labels_and_directives_render() {
        assert_eq!(MipsNode::label("main").to_string(), "main:");
        assert_eq!(
            MipsNode::directive(".asciiz", &["\"hi\""]).to_string(),
            "\t.asciiz \"hi\""
        );
        assert_eq!(MipsNode::comment("note").to_string(), "# note");
    }
}
