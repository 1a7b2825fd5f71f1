use crate::ast::tree::{Program, StmtData};
use crate::ast::types::TypeRef;
use crate::tac::address::{AddressManager, AddressStatistics};
use crate::tac::builtins;
use crate::tac::instruction::TacInstruction;
use crate::tac::labels::{LabelManager, LabelStatistics};
use crate::tac::temp::{TemporaryManager, TemporaryStatistics};
use crate::tac::TacError;
use indexmap::IndexMap;
use log::debug;
use serde::Serialize;

/// What a registered function looks like to call sites. Methods and
/// constructors carry the implicit `this` in `parameters`.
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub name: String,
    pub parameters: Vec<String>,
    pub return_type: Option<TypeRef>,
    pub is_method: bool,
}

impl FunctionInfo {
    pub fn returns_value(&self) -> bool {
        self.return_type.as_ref().is_some_and(|t| !t.is_void())
    }

    /// Number of arguments a call site supplies (excluding injected `this`).
    pub fn declared_arity(&self) -> usize {
        self.parameters.len() - usize::from(self.is_method)
    }
}

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub name: String,
    pub superclass: Option<String>,
    pub fields: Vec<String>,
    pub has_explicit_constructor: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TacStatistics {
    pub instructions_generated: usize,
    pub functions_registered: usize,
    pub temporaries: TemporaryStatistics,
    pub addresses: AddressStatistics,
    pub labels: LabelStatistics,
}

/// Names the MIPS backend links in; calls to these are valid without a TAC
/// definition.
const RUNTIME_FUNCTIONS: &[&str] = &[
    "print",
    "println",
    "print_int",
    "print_newline",
    "input",
    "allocate_array",
    "string_concat",
    "int_to_string",
];

/// Lowers a typed AST into a linear TAC instruction stream. Expression,
/// control-flow and function/class lowering live in their own modules; this
/// type owns the shared state and the two-pass driver.
pub struct ProgramTacGenerator {
    pub(crate) instructions: Vec<TacInstruction>,
    pub temps: TemporaryManager,
    pub addresses: AddressManager,
    pub labels: LabelManager,
    pub(crate) functions: IndexMap<String, FunctionInfo>,
    pub(crate) classes: IndexMap<String, ClassInfo>,
    pub(crate) current_function: Option<String>,
    pub(crate) current_class: Option<String>,
}

impl Default for ProgramTacGenerator {
    fn default() -> Self {
        ProgramTacGenerator::new()
    }
}

impl ProgramTacGenerator {
    pub fn new() -> Self {
        ProgramTacGenerator {
            instructions: Vec::new(),
            temps: TemporaryManager::new(),
            addresses: AddressManager::new(),
            labels: LabelManager::new(),
            functions: IndexMap::new(),
            classes: IndexMap::new(),
            current_function: None,
            current_class: None,
        }
    }

    /// Lower a whole program. A registration pre-pass over top-level
    /// functions and class members runs first so forward references and
    /// recursion resolve.
    pub fn generate_program(&mut self, program: &Program) -> Result<Vec<String>, TacError> {
        self.reset();
        self.register_program(program);
        debug!(
            "registered {} functions, {} classes",
            self.functions.len(),
            self.classes.len()
        );

        for stmt in &program.statements {
            self.lower_stmt(stmt)?;
        }

        Ok(self.instructions.iter().map(|i| i.to_string()).collect())
    }

    pub(crate) fn emit(&mut self, instruction: TacInstruction) {
        if let Some(label) = instruction.defined_label() {
            self.labels.define_label(label);
        } else if let Some(label) = instruction.referenced_label() {
            self.labels.reference_label(label);
        }
        self.instructions.push(instruction);
    }

    pub(crate) fn new_temp(&mut self) -> String {
        self.temps.new_temp()
    }

    pub(crate) fn release_if_temp(&mut self, operand: &str) {
        if TemporaryManager::is_temporary(operand) {
            self.temps.release(operand);
        }
    }

    pub(crate) fn new_label(&mut self, prefix: &str) -> String {
        self.labels.new_label(&mut self.addresses, prefix, None)
    }

    pub fn instructions(&self) -> &[TacInstruction] {
        &self.instructions
    }

    pub fn tac_text(&self) -> String {
        self.instructions
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn function_info(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.get(name)
    }

    pub fn class_info(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    /// Class field layouts, in declaration order, for the MIPS backend.
    pub fn class_layouts(&self) -> Vec<(String, Vec<String>)> {
        self.classes
            .values()
            .map(|c| (c.name.clone(), c.fields.clone()))
            .collect()
    }

    /// Non-fatal consistency checks over the generated stream: unresolved
    /// labels, unmatched BeginFunc/EndFunc pairs, calls to unknown targets.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for label in self.labels.unresolved_labels() {
            warnings.push(format!("label '{label}' is referenced but never defined"));
        }

        let mut open_functions: Vec<&str> = Vec::new();
        for instruction in &self.instructions {
            match instruction {
                TacInstruction::BeginFunc { name, .. } => open_functions.push(name),
                TacInstruction::EndFunc { name } => match open_functions.pop() {
                    Some(open) if open == name => {}
                    Some(open) => warnings.push(format!(
                        "EndFunc {name} does not match innermost BeginFunc {open}"
                    )),
                    None => warnings.push(format!("EndFunc {name} without BeginFunc")),
                },
                TacInstruction::Call { function, .. } => {
                    let known = self.functions.contains_key(function)
                        || builtins::is_builtin(function)
                        || RUNTIME_FUNCTIONS.contains(&function.as_str());
                    if !known {
                        warnings.push(format!("call to unregistered function '{function}'"));
                    }
                }
                _ => {}
            }
        }
        for open in open_functions {
            warnings.push(format!("BeginFunc {open} without EndFunc"));
        }

        warnings
    }

    pub fn statistics(&self) -> TacStatistics {
        TacStatistics {
            instructions_generated: self.instructions.len(),
            functions_registered: self.functions.len(),
            temporaries: self.temps.statistics(),
            addresses: self.addresses.statistics(),
            labels: self.labels.statistics(),
        }
    }

    /// The only TAC-level cleanup: drop adjacent identical comments.
    /// Returns the number of removed instructions.
    pub fn optimize(&mut self) -> usize {
        let before = self.instructions.len();
        self.instructions.dedup_by(|a, b| match (&*a, &*b) {
            (
                TacInstruction::Comment { text: first },
                TacInstruction::Comment { text: second },
            ) => first == second,
            _ => false,
        });
        before - self.instructions.len()
    }

    pub fn reset(&mut self) {
        self.instructions.clear();
        self.temps.reset();
        self.addresses.reset();
        self.labels.reset();
        self.functions.clear();
        self.classes.clear();
        self.current_function = None;
        self.current_class = None;
    }

    fn register_program(&mut self, program: &Program) {
        for stmt in &program.statements {
            match &stmt.data {
                StmtData::Function(decl) => self.register_function(decl, None),
                StmtData::Class(decl) => self.register_class_decl(decl),
                _ => {}
            }
        }
    }
}
