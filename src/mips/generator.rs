//! End-to-end TAC→MIPS driver: accepts in-memory TAC or the textual form,
//! dispatches each instruction to its translator family, appends the
//! runtime library and program exit, runs the peephole optimizer and
//! renders the final listing split into `.data` and `.text`.

use crate::mips::allocator::RegisterAllocator;
use crate::mips::data_section::DataSectionManager;
use crate::mips::frame::ActivationRecordManager;
use crate::mips::instruction::MipsNode;
use crate::mips::labels::LabelManager;
use crate::mips::liveness;
use crate::mips::peephole::{OptimizationStats, PeepholeOptimizer};
use crate::mips::runtime;
use crate::mips::translate::class::ClassLayout;
use crate::mips::translate::is_constant;
use crate::mips::MipsError;
use crate::tac::instruction::TacInstruction;
use crate::tac::parse::parse_tac_text;
use indexmap::IndexMap;
use log::{debug, info};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize)]
pub struct MipsStatistics {
    pub optimization_enabled: bool,
    pub optimizations: Option<OptimizationStats>,
}

const BRANCH_OPCODES: &[&str] = &[
    "j", "jal", "beq", "bne", "blt", "ble", "bgt", "bge", "beqz", "bnez", "bgez", "bltz",
];

pub struct MipsGenerator {
    pub(crate) allocator: RegisterAllocator,
    pub(crate) text: Vec<MipsNode>,
    pub(crate) data: DataSectionManager,
    pub(crate) labels: LabelManager,
    pub(crate) frames: ActivationRecordManager,
    pub(crate) current_function: Option<String>,
    pub(crate) entry_label: Option<String>,
    pub(crate) pending_params: Vec<String>,
    pub(crate) class_layouts: IndexMap<String, ClassLayout>,
    pub(crate) string_vars: HashSet<String>,
    pub(crate) scratch_counter: u32,
    enable_optimization: bool,
    optimization_stats: Option<OptimizationStats>,
}

impl Default for MipsGenerator {
    fn default() -> Self {
        MipsGenerator::new()
    }
}

impl MipsGenerator {
    pub fn new() -> Self {
        MipsGenerator::with_optimization(true)
    }

    pub fn with_optimization(enable_optimization: bool) -> Self {
        MipsGenerator {
            allocator: RegisterAllocator::new(None),
            text: Vec::new(),
            data: DataSectionManager::new(),
            labels: LabelManager::new(),
            frames: ActivationRecordManager::new(),
            current_function: None,
            entry_label: None,
            pending_params: Vec::new(),
            class_layouts: IndexMap::new(),
            string_vars: HashSet::new(),
            scratch_counter: 0,
            enable_optimization,
            optimization_stats: None,
        }
    }

    pub fn generate_from_tac_text(&mut self, text: &str) -> Result<String, MipsError> {
        let instructions = parse_tac_text(text)?;
        self.generate_from_tac(&instructions)
    }

    /// Translate a whole TAC program. Function regions are emitted first;
    /// instructions outside any function form the body of `main` (unless
    /// the stream defines its own `main`).
    pub fn generate_from_tac(
        &mut self,
        instructions: &[TacInstruction],
    ) -> Result<String, MipsError> {
        self.reset_emission_state();

        self.emit_text(MipsNode::directive(".text", &[]));
        self.emit_text(MipsNode::directive(".globl", &["main"]));
        self.labels.reference_label("main");

        let liveness = liveness::analyze(instructions);
        let (function_indices, toplevel_indices) = partition(instructions);
        let has_main = instructions.iter().any(
            |i| matches!(i, TacInstruction::BeginFunc { name, .. } if name == "main"),
        );

        for index in function_indices {
            self.dispatch(instructions, index, &liveness)?;
        }

        if has_main {
            self.emit_label("_program_exit")?;
        } else {
            self.emit_label("main")?;
        }
        for index in toplevel_indices {
            self.dispatch(instructions, index, &liveness)?;
        }

        self.emit_comment("Program exit");
        self.emit_text(MipsNode::ins("li", &["$v0", "10"]).with_comment("exit"));
        self.emit_text(MipsNode::ins("syscall", &[]));

        self.absorb_runtime()?;
        self.labels.validate()?;

        let mut nodes = vec![MipsNode::comment(
            "MIPS assembly generated by the CompilScript backend",
        )];
        nodes.extend(self.data.generate_data_section());
        nodes.append(&mut self.text);

        if self.enable_optimization {
            let mut optimizer = PeepholeOptimizer::default();
            nodes = optimizer.optimize(nodes);
            self.optimization_stats = Some(optimizer.stats().clone());
        }

        info!(
            "generated {} MIPS nodes from {} TAC instructions",
            nodes.len(),
            instructions.len()
        );
        Ok(render_sections(&nodes))
    }

    pub fn optimization_stats(&self) -> Option<&OptimizationStats> {
        self.optimization_stats.as_ref()
    }

    pub fn statistics(&self) -> MipsStatistics {
        MipsStatistics {
            optimization_enabled: self.enable_optimization,
            optimizations: self.optimization_stats.clone(),
        }
    }

    fn reset_emission_state(&mut self) {
        self.allocator.reset();
        self.text.clear();
        self.data = DataSectionManager::new();
        self.labels.reset();
        self.frames.reset();
        self.current_function = None;
        self.entry_label = None;
        self.pending_params.clear();
        self.string_vars.clear();
        self.scratch_counter = 0;
        self.optimization_stats = None;
    }

    fn dispatch(
        &mut self,
        instructions: &[TacInstruction],
        index: usize,
        liveness: &[liveness::LivenessEntry],
    ) -> Result<(), MipsError> {
        let entry = &liveness[index];
        self.allocator
            .set_liveness_context(entry.live_after.clone(), entry.next_use.clone());

        match &instructions[index] {
            TacInstruction::Assign {
                target,
                operand1,
                operator,
                operand2,
            } => self.translate_assignment(target, operand1, *operator, operand2.as_deref()),
            TacInstruction::Goto { label } => self.translate_goto(label),
            TacInstruction::IfGoto {
                condition,
                operator,
                operand2,
                label,
            } => self.translate_if_goto(condition, *operator, operand2.as_deref(), label),
            TacInstruction::Label { name } => self.translate_label(name),
            TacInstruction::BeginFunc {
                name,
                param_count,
                frame_size,
                param_names,
            } => {
                let region = function_region(instructions, index, name);
                let estimate = spill_estimate(region);
                debug!("function {name}: spill estimate {estimate} bytes");
                self.translate_begin_func(name, *param_count, *frame_size, param_names, estimate)
            }
            TacInstruction::EndFunc { name } => self.translate_end_func(name),
            TacInstruction::PushParam { value } => {
                self.translate_push_param(value);
                Ok(())
            }
            TacInstruction::Call {
                function,
                param_count,
                target,
            } => self.translate_call(function, *param_count, target.as_deref()),
            TacInstruction::PopParams { count } => {
                self.translate_pop_params(*count);
                Ok(())
            }
            TacInstruction::Return { value } => self.translate_return(value.as_deref()),
            TacInstruction::ArrayAccess {
                target,
                array,
                index,
                is_assignment,
            } => self.translate_array_access(target, array, index, *is_assignment),
            TacInstruction::PropertyAccess {
                target,
                object,
                property,
                is_assignment,
            } => self.translate_property_access(target, object, property, *is_assignment),
            TacInstruction::New { target, class_name } => self.translate_new(target, class_name),
            TacInstruction::AllocateArray {
                target,
                size,
                elem_size,
            } => self.translate_allocate_array(target, size, *elem_size),
            TacInstruction::Comment { text } => {
                self.emit_comment(text.clone());
                Ok(())
            }
        }
    }

    /// Append the runtime library, registering its labels and branch
    /// targets with the label manager.
    fn absorb_runtime(&mut self) -> Result<(), MipsError> {
        for node in runtime::all_runtime_functions() {
            match &node {
                MipsNode::Label { name } => self.labels.define_label(name)?,
                MipsNode::Instruction {
                    opcode, operands, ..
                } => {
                    if BRANCH_OPCODES.contains(&opcode.as_str()) {
                        if let Some(target) = operands.last() {
                            self.labels.reference_label(target);
                        }
                    }
                }
                _ => {}
            }
            self.text.push(node);
        }
        Ok(())
    }
}

/// Indices of instructions inside function regions, and the rest.
fn partition(instructions: &[TacInstruction]) -> (Vec<usize>, Vec<usize>) {
    let mut functions = Vec::new();
    let mut toplevel = Vec::new();
    let mut depth = 0usize;
    for (index, instruction) in instructions.iter().enumerate() {
        match instruction {
            TacInstruction::BeginFunc { .. } => {
                depth += 1;
                functions.push(index);
            }
            TacInstruction::EndFunc { .. } => {
                depth = depth.saturating_sub(1);
                functions.push(index);
            }
            _ => {
                if depth > 0 {
                    functions.push(index);
                } else {
                    toplevel.push(index);
                }
            }
        }
    }
    (functions, toplevel)
}

fn function_region<'a>(
    instructions: &'a [TacInstruction],
    begin_index: usize,
    name: &str,
) -> &'a [TacInstruction] {
    let end = instructions[begin_index..]
        .iter()
        .position(|i| matches!(i, TacInstruction::EndFunc { name: n } if n == name))
        .map(|offset| begin_index + offset)
        .unwrap_or(instructions.len() - 1);
    &instructions[begin_index..=end]
}

/// Size the spill area from the distinct operands a function touches;
/// every variable and constant can end up in its own slot, plus a cushion
/// for translator scratch values.
fn spill_estimate(region: &[TacInstruction]) -> u32 {
    let mut operands: HashSet<&str> = HashSet::new();
    for instruction in region {
        for operand in instruction_operands(instruction) {
            if liveness::is_variable(operand) || is_constant(operand) {
                operands.insert(operand);
            }
        }
    }
    (operands.len() as u32 + 8) * 4
}

fn instruction_operands(instruction: &TacInstruction) -> Vec<&str> {
    match instruction {
        TacInstruction::Assign {
            target,
            operand1,
            operand2,
            ..
        } => {
            let mut operands = vec![target.as_str(), operand1.as_str()];
            if let Some(operand2) = operand2 {
                operands.push(operand2);
            }
            operands
        }
        TacInstruction::IfGoto {
            condition,
            operand2,
            ..
        } => {
            let mut operands = vec![condition.as_str()];
            if let Some(operand2) = operand2 {
                operands.push(operand2);
            }
            operands
        }
        TacInstruction::PushParam { value } => vec![value.as_str()],
        TacInstruction::Call { target, .. } => {
            target.as_deref().map(|t| vec![t]).unwrap_or_default()
        }
        TacInstruction::Return { value } => {
            value.as_deref().map(|v| vec![v]).unwrap_or_default()
        }
        TacInstruction::ArrayAccess {
            target,
            array,
            index,
            ..
        } => vec![target.as_str(), array.as_str(), index.as_str()],
        TacInstruction::PropertyAccess { target, object, .. } => {
            vec![target.as_str(), object.as_str()]
        }
        TacInstruction::New { target, .. } => vec![target.as_str()],
        TacInstruction::AllocateArray { target, size, .. } => {
            vec![target.as_str(), size.as_str()]
        }
        _ => Vec::new(),
    }
}

/// Split the node stream into `.data` and `.text` by tracking the most
/// recent section directive; nodes before any directive default to text.
fn render_sections(nodes: &[MipsNode]) -> String {
    let mut data_lines = Vec::new();
    let mut text_lines = Vec::new();
    let mut in_data = false;

    for node in nodes {
        if let MipsNode::Directive { directive, .. } = node {
            if directive == ".data" {
                in_data = true;
                continue;
            }
            if directive == ".text" {
                in_data = false;
                continue;
            }
        }
        if in_data {
            data_lines.push(node.to_string());
        } else {
            text_lines.push(node.to_string());
        }
    }

    let mut output = String::new();
    if !data_lines.is_empty() {
        output.push_str(".data\n");
        output.push_str(&data_lines.join("\n"));
        output.push_str("\n\n");
    }
    output.push_str(".text\n");
    output.push_str(&text_lines.join("\n"));
    output.push('\n');
    output
}
