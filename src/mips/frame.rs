//! Activation-record layout. Addresses grow downward from `$fp`: the
//! return address sits at `frame_size-4($sp)`, the saved frame pointer at
//! `frame_size-8($sp)`, then saved `$s` registers, locals, the spill area
//! and outgoing-parameter slots. Frames are 8-byte aligned.

use crate::mips::registers::SAVED_REGISTERS;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    pub name: String,
    pub size_bytes: u32,
    pub offset: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRecord {
    pub function_name: String,
    pub param_count: usize,
    pub local_vars: Vec<LocalVariable>,
    pub saved_registers: Vec<String>,
    pub frame_size: u32,
    pub return_address_offset: i32,
    pub old_fp_offset: i32,
    pub locals_start_offset: i32,
    pub spill_area_size: u32,
    pub max_outgoing_params: usize,
}

impl ActivationRecord {
    pub fn local_offset(&self, name: &str) -> Option<i32> {
        self.local_vars
            .iter()
            .find(|var| var.name == name)
            .map(|var| var.offset)
    }

    pub fn saved_register_offset(&self, register: &str) -> Option<i32> {
        if register == "$ra" {
            return Some(self.return_address_offset);
        }
        if register == "$fp" {
            return Some(self.old_fp_offset);
        }
        self.saved_registers
            .iter()
            .position(|r| r == register)
            .map(|index| self.old_fp_offset - 4 * (index as i32 + 1))
    }
}

/// Builder computing offsets and the aligned total size.
pub struct ActivationRecordBuilder {
    function_name: String,
    param_count: usize,
    local_vars: Vec<LocalVariable>,
    saved_registers: Vec<String>,
    spill_area_size: u32,
    max_outgoing_params: usize,
}

impl ActivationRecordBuilder {
    pub fn new(function_name: impl Into<String>, param_count: usize) -> Self {
        ActivationRecordBuilder {
            function_name: function_name.into(),
            param_count,
            local_vars: Vec::new(),
            saved_registers: Vec::new(),
            spill_area_size: 0,
            max_outgoing_params: 0,
        }
    }

    pub fn add_local_var(mut self, name: impl Into<String>, size_bytes: u32) -> Self {
        self.local_vars.push(LocalVariable {
            name: name.into(),
            size_bytes,
            offset: 0,
        });
        self
    }

    /// Only `$s0..$s7` are accepted; anything else is dropped.
    pub fn saved_registers(mut self, registers: &[&str]) -> Self {
        self.saved_registers = registers
            .iter()
            .filter(|r| SAVED_REGISTERS.contains(r))
            .map(|r| r.to_string())
            .collect();
        self
    }

    pub fn spill_area_size(mut self, size_bytes: u32) -> Self {
        // 4-byte aligned.
        self.spill_area_size = (size_bytes + 3) & !3;
        self
    }

    pub fn max_outgoing_params(mut self, count: usize) -> Self {
        self.max_outgoing_params = count;
        self
    }

    pub fn build(self) -> ActivationRecord {
        let return_address_offset = -4;
        let old_fp_offset = -8;
        let saved_regs_size = self.saved_registers.len() as u32 * 4;
        let locals_start_offset = old_fp_offset - saved_regs_size as i32;

        let mut local_vars = self.local_vars;
        let mut current_offset = locals_start_offset;
        for var in &mut local_vars {
            current_offset -= var.size_bytes as i32;
            var.offset = current_offset;
        }

        let outgoing_param_space = self.max_outgoing_params.saturating_sub(4) as u32 * 4;
        let locals_size: u32 = local_vars.iter().map(|v| v.size_bytes).sum();
        let total = 4 // $ra
            + 4 // old $fp
            + saved_regs_size
            + locals_size
            + self.spill_area_size
            + outgoing_param_space;
        let frame_size = (total + 7) & !7;

        ActivationRecord {
            function_name: self.function_name,
            param_count: self.param_count,
            local_vars,
            saved_registers: self.saved_registers,
            frame_size,
            return_address_offset,
            old_fp_offset,
            locals_start_offset,
            spill_area_size: self.spill_area_size,
            max_outgoing_params: self.max_outgoing_params,
        }
    }
}

/// Registry of built records plus the LIFO call stack of the translator.
#[derive(Debug, Default)]
pub struct ActivationRecordManager {
    records: IndexMap<String, ActivationRecord>,
    call_stack: Vec<String>,
}

impl ActivationRecordManager {
    pub fn new() -> Self {
        ActivationRecordManager::default()
    }

    pub fn register_function(&mut self, record: ActivationRecord) {
        self.records.insert(record.function_name.clone(), record);
    }

    pub fn enter_function(&mut self, function_name: &str) -> Option<&ActivationRecord> {
        if !self.records.contains_key(function_name) {
            return None;
        }
        self.call_stack.push(function_name.to_string());
        self.records.get(function_name)
    }

    pub fn exit_function(&mut self) {
        self.call_stack.pop();
    }

    pub fn current_record(&self) -> Option<&ActivationRecord> {
        self.call_stack
            .last()
            .and_then(|name| self.records.get(name))
    }

    pub fn record(&self, function_name: &str) -> Option<&ActivationRecord> {
        self.records.get(function_name)
    }

    pub fn reset(&mut self) {
        self.records.clear();
        self.call_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_size_is_eight_byte_aligned() {
        let record = ActivationRecordBuilder::new("f", 1)
            .add_local_var("x", 4)
            .spill_area_size(12)
            .build();
        assert_eq!(record.frame_size % 8, 0);
        assert_eq!(record.return_address_offset, -4);
        assert_eq!(record.old_fp_offset, -8);
    }

    #[test]
    fn saved_registers_sit_below_the_old_frame_pointer() {
        let record = ActivationRecordBuilder::new("f", 0)
            .saved_registers(&["$s0", "$s1", "$t0"])
            .build();
        assert_eq!(record.saved_registers, vec!["$s0", "$s1"]);
        assert_eq!(record.saved_register_offset("$s0"), Some(-12));
        assert_eq!(record.saved_register_offset("$s1"), Some(-16));
        assert_eq!(record.saved_register_offset("$ra"), Some(-4));
    }

    #[test]
    fn outgoing_params_beyond_four_reserve_stack_space() {
        let small = ActivationRecordBuilder::new("f", 0).max_outgoing_params(3).build();
        let large = ActivationRecordBuilder::new("g", 0).max_outgoing_params(6).build();
        assert_eq!(large.frame_size - small.frame_size, 8);
    }

    #[test]
    fn manager_tracks_the_call_stack() {
        let mut manager = ActivationRecordManager::new();
        manager.register_function(ActivationRecordBuilder::new("f", 0).build());
        assert!(manager.enter_function("f").is_some());
        assert_eq!(manager.current_record().unwrap().function_name, "f");
        manager.exit_function();
        assert!(manager.current_record().is_none());
        assert!(manager.enter_function("missing").is_none());
    }
}
