//! TAC→MIPS translators, one module per instruction family, all running
//! against the shared emitter/allocator core in [`MipsGenerator`]. Spill
//! and load actions returned by the allocator are materialized in order
//! before the client instruction is emitted.

pub mod arithmetic;
pub mod class;
pub mod comparison;
pub mod control_flow;
pub mod expression;
pub mod function;

use crate::mips::allocator::{LoadAction, SpillAction};
use crate::mips::generator::MipsGenerator;
use crate::mips::instruction::MipsNode;
use crate::mips::labels::LabelResolutionError;
use crate::mips::MipsError;

pub(crate) fn is_constant(operand: &str) -> bool {
    operand.parse::<i64>().is_ok() || operand.parse::<f64>().is_ok()
}

pub(crate) fn is_data_label(operand: &str) -> bool {
    operand.starts_with("_str") || operand.starts_with("_array")
}

fn global_address_parts(address: &str) -> Option<(u32, u32)> {
    let value = u32::from_str_radix(address.trim_start_matches("0x"), 16).ok()?;
    Some(((value >> 16) & 0xFFFF, value & 0xFFFF))
}

impl MipsGenerator {
    pub(crate) fn emit_text(&mut self, node: MipsNode) {
        self.text.push(node);
    }

    pub(crate) fn emit_text_many(&mut self, nodes: Vec<MipsNode>) {
        self.text.extend(nodes);
    }

    pub(crate) fn emit_comment(&mut self, text: impl Into<String>) {
        self.text.push(MipsNode::comment(text));
    }

    pub(crate) fn emit_label(&mut self, name: &str) -> Result<(), LabelResolutionError> {
        self.labels.define_label(name)?;
        self.text.push(MipsNode::label(name));
        Ok(())
    }

    pub(crate) fn materialise_spills(&mut self, actions: &[SpillAction]) {
        for action in actions {
            self.materialise_spill(action);
        }
    }

    fn materialise_spill(&mut self, action: &SpillAction) {
        if let Some(address) = &action.global_address {
            let Some((upper, lower)) = global_address_parts(address) else {
                return;
            };
            self.emit_text_many(vec![
                MipsNode::ins("lui", &["$at", &upper.to_string()]).with_comment("spill global addr"),
                MipsNode::ins("ori", &["$at", "$at", &lower.to_string()]),
                MipsNode::ins("sw", &[&action.register, "0($at)"])
                    .with_comment(format!("spill {}", action.variable)),
            ]);
            return;
        }
        let node = if let Some(offset) = action.memory_offset {
            MipsNode::ins("sw", &[&action.register, &format!("{offset}($fp)")])
                .with_comment(format!("spill {}", action.variable))
        } else if let Some(offset) = action.spill_offset {
            MipsNode::ins("sw", &[&action.register, &format!("{offset}($sp)")])
                .with_comment(format!("spill {}", action.variable))
        } else {
            return;
        };
        self.emit_text(node);
    }

    pub(crate) fn materialise_loads(&mut self, actions: &[LoadAction]) {
        for action in actions {
            self.materialise_load(action);
        }
    }

    fn materialise_load(&mut self, action: &LoadAction) {
        if let Some(address) = &action.global_address {
            let Some((upper, lower)) = global_address_parts(address) else {
                return;
            };
            self.emit_text_many(vec![
                MipsNode::ins("lui", &["$at", &upper.to_string()]).with_comment("load global addr"),
                MipsNode::ins("ori", &["$at", "$at", &lower.to_string()]),
                MipsNode::ins("lw", &[&action.register, "0($at)"])
                    .with_comment(format!("load {}", action.variable)),
            ]);
            return;
        }
        let node = if let Some(offset) = action.memory_offset {
            MipsNode::ins("lw", &[&action.register, &format!("{offset}($fp)")])
                .with_comment(format!("load {}", action.variable))
        } else if let Some(offset) = action.spill_offset {
            MipsNode::ins("lw", &[&action.register, &format!("{offset}($sp)")])
                .with_comment(format!("reload {}", action.variable))
        } else {
            return;
        };
        self.emit_text(node);
    }

    /// Acquire a register for a variable, materializing whatever the
    /// allocator demands first.
    pub(crate) fn acquire(
        &mut self,
        variable: &str,
        is_write: bool,
        forbidden: &[String],
    ) -> Result<String, MipsError> {
        let (register, spills, loads) =
            self.allocator
                .get_register(variable, is_write, None, forbidden)?;
        self.materialise_spills(&spills);
        self.materialise_loads(&loads);
        Ok(register)
    }

    /// Bring an operand into a register: constants through `li`, data
    /// labels and string literals through `la`, variables through the
    /// allocator.
    pub(crate) fn load_operand(
        &mut self,
        operand: &str,
        forbidden: &[String],
    ) -> Result<String, MipsError> {
        if is_constant(operand) {
            let register = self.acquire(&format!("_const_{operand}"), true, forbidden)?;
            self.emit_text(
                MipsNode::ins("li", &[&register, operand])
                    .with_comment(format!("load constant {operand}")),
            );
            return Ok(register);
        }
        if operand.starts_with('"') {
            let label = self.data.add_string_literal(operand);
            let register = self.acquire(&format!("_label_{label}"), true, forbidden)?;
            self.emit_text(
                MipsNode::ins("la", &[&register, &label])
                    .with_comment(format!("load address {label}")),
            );
            return Ok(register);
        }
        if is_data_label(operand) {
            let register = self.acquire(&format!("_label_{operand}"), true, forbidden)?;
            self.emit_text(
                MipsNode::ins("la", &[&register, operand])
                    .with_comment(format!("load address {operand}")),
            );
            return Ok(register);
        }
        self.acquire(operand, false, forbidden)
    }

    /// A scratch register for intermediate results; backed by a synthetic
    /// variable so it routes through the allocator.
    pub(crate) fn scratch_register(&mut self, forbidden: &[String]) -> Result<String, MipsError> {
        self.scratch_counter += 1;
        let name = format!("_scratch_{}", self.scratch_counter);
        self.acquire(&name, true, forbidden)
    }

    /// Flush and forget all register state at a basic-block boundary.
    pub(crate) fn spill_at_boundary(&mut self) {
        let actions = self.allocator.spill_all();
        self.materialise_spills(&actions);
    }

    pub(crate) fn mark_string(&mut self, variable: &str) {
        self.string_vars.insert(variable.to_string());
    }

    /// Whether an operand already holds a string address: literals, `_str`
    /// labels and variables the generator has seen strings flow into.
    pub(crate) fn is_string_operand(&self, operand: &str) -> bool {
        operand.starts_with('"')
            || operand.starts_with("_str")
            || self.string_vars.contains(operand)
    }
}
