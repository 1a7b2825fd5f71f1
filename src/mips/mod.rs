pub mod allocator;
pub mod calling_convention;
pub mod data_section;
pub mod frame;
pub mod generator;
pub mod instruction;
pub mod labels;
pub mod liveness;
pub mod peephole;
pub mod registers;
pub mod runtime;
pub mod translate;

pub use allocator::{LoadAction, RegisterAllocationError, RegisterAllocator, SpillAction};
pub use data_section::DataSectionManager;
pub use frame::{ActivationRecord, ActivationRecordBuilder, ActivationRecordManager};
pub use generator::MipsGenerator;
pub use instruction::MipsNode;
pub use labels::{LabelManager, LabelResolutionError};
pub use peephole::{OptimizationStats, PeepholeOptimizer};
pub use translate::class::ClassLayout;

use crate::tac::TacParseError;
use thiserror::Error;

/// Fatal backend failures. Allocation and label errors indicate compiler
/// bugs given well-formed TAC; parse errors come from malformed `.tac`
/// input.
#[derive(Debug, Error)]
pub enum MipsError {
    #[error(transparent)]
    Allocation(#[from] RegisterAllocationError),
    #[error(transparent)]
    Labels(#[from] LabelResolutionError),
    #[error(transparent)]
    Parse(#[from] TacParseError),
    #[error("parameter queue mismatch for call to {function}: expected {expected}, got {got}")]
    ParameterMismatch {
        function: String,
        expected: usize,
        got: usize,
    },
    #[error("EndFunc without matching BeginFunc: {0}")]
    UnmatchedEndFunc(String),
    #[error("return outside of a function")]
    ReturnOutsideFunction,
}
