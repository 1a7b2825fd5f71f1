use crate::ast::tree::{BinaryOperator, SourceLoc};
use std::fmt::{self, Display};

pub mod address;
pub mod annotator;
pub mod builtins;
pub mod control_flow;
pub mod expr;
pub mod functions;
pub mod generator;
pub mod instruction;
pub mod labels;
pub mod parse;
pub mod temp;

pub use address::{ActivationFrame, AddressManager, MemoryLocation};
pub use annotator::SymbolAnnotator;
pub use generator::{ProgramTacGenerator, TacStatistics};
pub use instruction::{Operator, TacInstruction};
pub use labels::LabelManager;
pub use parse::{parse_tac_text, TacParseError};
pub use temp::TemporaryManager;

/// Errors raised while lowering the typed AST into TAC. The semantic
/// analyzer should have rejected most of these upstream; they still abort
/// compilation when they slip through.
#[derive(Debug, Clone, PartialEq)]
pub enum TacError {
    UndeclaredFunction {
        name: String,
        loc: Option<SourceLoc>,
    },
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
        loc: Option<SourceLoc>,
    },
    StringOperand {
        operator: BinaryOperator,
        loc: Option<SourceLoc>,
    },
    BooleanOperand {
        operator: BinaryOperator,
        loc: Option<SourceLoc>,
    },
    NonNumericOperand {
        operator: BinaryOperator,
        loc: Option<SourceLoc>,
    },
    InvalidAssignmentTarget {
        loc: Option<SourceLoc>,
    },
    VoidValueUsed {
        name: String,
        loc: Option<SourceLoc>,
    },
    BreakOutsideLoop {
        loc: Option<SourceLoc>,
    },
    ContinueOutsideLoop {
        loc: Option<SourceLoc>,
    },
    UnknownClass {
        name: String,
        loc: Option<SourceLoc>,
    },
    MethodOnUntypedObject {
        property: String,
        loc: Option<SourceLoc>,
    },
    ContextStackMismatch {
        expected: &'static str,
    },
}

impl TacError {
    pub fn loc(&self) -> Option<SourceLoc> {
        match self {
            TacError::UndeclaredFunction { loc, .. }
            | TacError::ArityMismatch { loc, .. }
            | TacError::StringOperand { loc, .. }
            | TacError::BooleanOperand { loc, .. }
            | TacError::NonNumericOperand { loc, .. }
            | TacError::InvalidAssignmentTarget { loc }
            | TacError::VoidValueUsed { loc, .. }
            | TacError::BreakOutsideLoop { loc }
            | TacError::ContinueOutsideLoop { loc }
            | TacError::UnknownClass { loc, .. }
            | TacError::MethodOnUntypedObject { loc, .. } => *loc,
            TacError::ContextStackMismatch { .. } => None,
        }
    }
}

impl Display for TacError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(loc) = self.loc() {
            write!(f, "Line {}:{}: ", loc.line, loc.column)?;
        }
        match self {
            TacError::UndeclaredFunction { name, .. } => {
                write!(f, "Function '{name}' is not declared")
            }
            TacError::ArityMismatch {
                name,
                expected,
                got,
                ..
            } => write!(
                f,
                "Function {name} expects {expected} arguments, got {got}"
            ),
            TacError::StringOperand { operator, .. } => write!(
                f,
                "String operands only support concatenation (+), not '{}'",
                operator.symbol()
            ),
            TacError::BooleanOperand { operator, .. } => write!(
                f,
                "Boolean operands don't support operator '{}'",
                operator.symbol()
            ),
            TacError::NonNumericOperand { operator, .. } => write!(
                f,
                "Operator '{}' requires numeric operands",
                operator.symbol()
            ),
            TacError::InvalidAssignmentTarget { .. } => {
                write!(f, "Assignment target is not assignable")
            }
            TacError::VoidValueUsed { name, .. } => {
                write!(f, "Void function '{name}' used as a value")
            }
            TacError::BreakOutsideLoop { .. } => {
                write!(f, "Break statement outside of loop/switch context")
            }
            TacError::ContinueOutsideLoop { .. } => {
                write!(f, "Continue statement outside of loop context")
            }
            TacError::UnknownClass { name, .. } => {
                write!(f, "Class '{name}' is not declared")
            }
            TacError::MethodOnUntypedObject { property, .. } => {
                write!(f, "Cannot resolve method '{property}' without object type")
            }
            TacError::ContextStackMismatch { expected } => {
                write!(f, "Attempted to pop {expected} context when none active")
            }
        }
    }
}

impl std::error::Error for TacError {}
