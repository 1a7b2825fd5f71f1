//! The getReg register allocator. Both descriptor views are owned here so
//! every mutation updates them in one step; callers only see registers and
//! the spill/load actions they must materialize, in order, before their own
//! instruction.

use crate::mips::registers::{
    default_allocatable, AddressDescriptor, RegisterDescriptor, TEMP_REGISTERS,
};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegisterAllocationError {
    #[error("Cannot allocate a register for an empty variable name")]
    EmptyVariable,
    #[error("No candidate registers available")]
    NoCandidates,
    #[error("No spillable registers available")]
    NoSpillableRegisters,
    #[error("Unsupported spill action for variable {0}")]
    UnsupportedSpill(String),
    #[error("Missing global address for variable {0}")]
    MissingGlobalAddress(String),
}

/// A dirty value that must be written back before its register is
/// repurposed. Exactly one of the location fields applies: a frame offset
/// (`offset($fp)`), a spill slot (`offset($sp)`), or a global hex address
/// materialized through `$at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpillAction {
    pub variable: String,
    pub register: String,
    pub memory_offset: Option<i32>,
    pub spill_offset: Option<i32>,
    pub global_address: Option<String>,
}

/// Mirror of [`SpillAction`] for loads the translator must emit before
/// reading a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadAction {
    pub variable: String,
    pub register: String,
    pub memory_offset: Option<i32>,
    pub spill_offset: Option<i32>,
    pub global_address: Option<String>,
}

pub struct RegisterAllocator {
    address: AddressDescriptor,
    registers: RegisterDescriptor,
    allocatable: Vec<String>,
    live: HashSet<String>,
    next_use: HashMap<String, usize>,
}

impl Default for RegisterAllocator {
    fn default() -> Self {
        RegisterAllocator::new(None)
    }
}

impl RegisterAllocator {
    pub fn new(allocatable: Option<Vec<String>>) -> Self {
        let allocatable = allocatable.unwrap_or_else(default_allocatable);
        RegisterAllocator {
            address: AddressDescriptor::new(),
            registers: RegisterDescriptor::new(&allocatable),
            allocatable,
            live: HashSet::new(),
            next_use: HashMap::new(),
        }
    }

    pub fn reset(&mut self) {
        self.address.reset();
        self.registers = RegisterDescriptor::new(&self.allocatable);
        self.live.clear();
        self.next_use.clear();
    }

    /// Liveness for the upcoming instruction: which variables remain live
    /// after it, and where their next use is. Missing entries are assumed
    /// live with next use now.
    pub fn set_liveness_context(
        &mut self,
        live: HashSet<String>,
        next_use: HashMap<String, usize>,
    ) {
        self.live = live;
        self.next_use = next_use;
    }

    pub fn register_descriptor(&self) -> &RegisterDescriptor {
        &self.registers
    }

    pub fn address_descriptor(&self) -> &AddressDescriptor {
        &self.address
    }

    pub fn bind_memory(&mut self, name: &str, location: crate::tac::address::MemoryLocation) {
        self.address.bind_memory(name, location);
    }

    pub fn reserve_spill_region(&mut self, bytes: i32) {
        self.address.reserve_spill_region(bytes);
    }

    pub fn spill_area_size(&self) -> i32 {
        self.address.spill_area_size()
    }

    pub fn find_register_with(&self, variable: &str) -> Option<&str> {
        self.registers.find_register_with(variable)
    }

    /// Obtain a register for `variable`, spilling as required. Returned
    /// spill actions must be materialized before the load actions, and both
    /// before the client's own instruction.
    pub fn get_register(
        &mut self,
        variable: &str,
        is_write: bool,
        preferred: Option<&[String]>,
        forbidden: &[String],
    ) -> Result<(String, Vec<SpillAction>, Vec<LoadAction>), RegisterAllocationError> {
        if variable.is_empty() {
            return Err(RegisterAllocationError::EmptyVariable);
        }

        if let Some(existing) = self.registers.find_register_with(variable) {
            if !forbidden.contains(&existing.to_string()) {
                let existing = existing.to_string();
                self.registers.mark_used(&existing);
                if is_write {
                    self.registers.mark_dirty(&existing, variable);
                    self.address.mark_dirty(variable);
                }
                return Ok((existing, Vec::new(), Vec::new()));
            }
        }

        let candidates = self.candidate_registers(preferred, forbidden);
        if candidates.is_empty() {
            return Err(RegisterAllocationError::NoCandidates);
        }
        let (register, spills) = self.acquire_register(&candidates)?;

        for spill in &spills {
            self.address.unbind_register(&spill.variable, &spill.register);
            self.address.mark_clean(&spill.variable);
        }

        self.registers.dissociate(&register, None);
        self.registers.associate(&register, variable, is_write);
        self.address.bind_register(variable, &register);
        if is_write {
            self.address.mark_dirty(variable);
        }

        let mut loads = Vec::new();
        if is_write {
            // Pure writes need no load but must own a slot for later spills.
            let entry = self.address.get(variable);
            if entry.memory.is_none() && entry.spill_slot.is_none() {
                self.address.ensure_spill_slot(variable);
            }
        } else if let Some(load) = self.build_load_action(variable, &register) {
            loads.push(load);
        }

        Ok((register, spills, loads))
    }

    /// Unbind a register without spilling; clean or not, its contents are
    /// forgotten.
    pub fn release_register(&mut self, register: &str) {
        if !self.registers.is_allocatable(register) {
            return;
        }
        for variable in self.registers.variables_in(register) {
            self.address.unbind_register(&variable, register);
            self.address.mark_clean(&variable);
        }
        self.registers.dissociate(register, None);
    }

    /// Flush every dirty register. Used at block boundaries and before
    /// calls; all associations are dropped so the next block starts clean.
    pub fn spill_all(&mut self) -> Vec<SpillAction> {
        let mut actions = Vec::new();
        for register in self.allocatable.clone() {
            if self.registers.is_free(&register) {
                continue;
            }
            for variable in self.registers.variables_in(&register) {
                if let Some(action) = self.build_spill_action(&variable, &register) {
                    actions.push(action);
                }
                self.address.unbind_register(&variable, &register);
                self.address.mark_clean(&variable);
            }
            self.registers.dissociate(&register, None);
        }
        actions
    }

    /// Spill dirty values out of caller-saved registers ahead of a call.
    /// Associations survive; `invalidate_caller_saved` clears them after
    /// the callee may have clobbered the registers.
    pub fn spill_caller_saved(&mut self) -> Vec<SpillAction> {
        let mut actions = Vec::new();
        for register in TEMP_REGISTERS {
            if !self.registers.is_allocatable(register) || self.registers.is_free(register) {
                continue;
            }
            for variable in self.registers.variables_in(register) {
                if let Some(action) = self.build_spill_action(&variable, register) {
                    actions.push(action);
                    self.registers.mark_clean(register, &variable);
                    self.address.mark_clean(&variable);
                }
            }
        }
        actions
    }

    pub fn invalidate_caller_saved(&mut self) {
        for register in TEMP_REGISTERS {
            if !self.registers.is_allocatable(register) {
                continue;
            }
            for variable in self.registers.variables_in(register) {
                self.address.unbind_register(&variable, register);
            }
            self.registers.dissociate(register, None);
        }
    }

    fn candidate_registers(
        &self,
        preferred: Option<&[String]>,
        forbidden: &[String],
    ) -> Vec<String> {
        if let Some(preferred) = preferred {
            let filtered: Vec<String> = preferred
                .iter()
                .filter(|r| !forbidden.contains(r))
                .cloned()
                .collect();
            if !filtered.is_empty() {
                return filtered;
            }
        }
        self.allocatable
            .iter()
            .filter(|r| !forbidden.contains(r))
            .cloned()
            .collect()
    }

    fn acquire_register(
        &mut self,
        candidates: &[String],
    ) -> Result<(String, Vec<SpillAction>), RegisterAllocationError> {
        // First empty candidate wins.
        for register in candidates {
            if self.registers.is_free(register) {
                return Ok((register.clone(), Vec::new()));
            }
        }

        // Next, a register whose occupants are all dead.
        if let Some(register) = self.find_dead_register(candidates) {
            let spills = self.build_spill_actions_for(&register);
            return Ok((register, spills));
        }

        // Fall back to the farthest next use; ties go to the least
        // recently used candidate.
        let victim = self
            .select_spill_victim(candidates)
            .ok_or(RegisterAllocationError::NoSpillableRegisters)?;
        let spills = self.build_spill_actions_for(&victim);
        Ok((victim, spills))
    }

    fn find_dead_register(&self, candidates: &[String]) -> Option<String> {
        candidates
            .iter()
            .find(|register| {
                let state = self.registers.state(register);
                !state.pinned && !state.variables.iter().any(|v| self.live.contains(v))
            })
            .cloned()
    }

    fn select_spill_victim(&self, candidates: &[String]) -> Option<String> {
        let mut best: Option<(&String, usize, u64)> = None;
        for register in candidates {
            let state = self.registers.state(register);
            if state.pinned {
                continue;
            }
            // A variable with no recorded next use is assumed needed now.
            let next_use = state
                .variables
                .iter()
                .map(|v| self.next_use.get(v).copied().unwrap_or(0))
                .max()
                .unwrap_or(0);
            let replace = match best {
                None => true,
                Some((_, best_next, best_used)) => {
                    next_use > best_next || (next_use == best_next && state.last_used < best_used)
                }
            };
            if replace {
                best = Some((register, next_use, state.last_used));
            }
        }
        best.map(|(register, _, _)| register.clone())
    }

    fn build_spill_actions_for(&mut self, register: &str) -> Vec<SpillAction> {
        self.registers
            .variables_in(register)
            .into_iter()
            .filter_map(|variable| self.build_spill_action(&variable, register))
            .collect()
    }

    fn build_spill_action(&mut self, variable: &str, register: &str) -> Option<SpillAction> {
        if !self.registers.state(register).dirty.contains(variable) {
            return None;
        }
        let memory = self.address.get(variable).memory.clone();
        if let Some(memory) = memory {
            if memory.address.starts_with("0x") {
                return Some(SpillAction {
                    variable: variable.to_string(),
                    register: register.to_string(),
                    memory_offset: None,
                    spill_offset: None,
                    global_address: Some(memory.address),
                });
            }
            return Some(SpillAction {
                variable: variable.to_string(),
                register: register.to_string(),
                memory_offset: Some(memory.offset),
                spill_offset: None,
                global_address: None,
            });
        }
        let offset = self.address.ensure_spill_slot(variable);
        Some(SpillAction {
            variable: variable.to_string(),
            register: register.to_string(),
            memory_offset: None,
            spill_offset: Some(offset),
            global_address: None,
        })
    }

    fn build_load_action(&mut self, variable: &str, register: &str) -> Option<LoadAction> {
        let entry = self.address.get(variable);
        if let Some(memory) = entry.memory.clone() {
            if memory.address.starts_with("0x") {
                return Some(LoadAction {
                    variable: variable.to_string(),
                    register: register.to_string(),
                    memory_offset: None,
                    spill_offset: None,
                    global_address: Some(memory.address),
                });
            }
            return Some(LoadAction {
                variable: variable.to_string(),
                register: register.to_string(),
                memory_offset: Some(memory.offset),
                spill_offset: None,
                global_address: None,
            });
        }
        entry.spill_slot.map(|offset| LoadAction {
            variable: variable.to_string(),
            register: register.to_string(),
            memory_offset: None,
            spill_offset: Some(offset),
            global_address: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_allocator() -> RegisterAllocator {
        RegisterAllocator::new(Some(vec!["$t0".to_string(), "$t1".to_string()]))
    }

    #[test]
    fn existing_register_is_reused() {
        let mut allocator = small_allocator();
        let (first, _, _) = allocator.get_register("x", true, None, &[]).unwrap();
        let (second, spills, loads) = allocator.get_register("x", false, None, &[]).unwrap();
        assert_eq!(first, second);
        assert!(spills.is_empty());
        assert!(loads.is_empty());
    }

    #[test]
    fn descriptors_stay_mirrored() {
        let mut allocator = small_allocator();
        let (register, _, _) = allocator.get_register("x", true, None, &[]).unwrap();
        assert!(allocator.register_descriptor().contains(&register, "x"));
        assert!(allocator
            .address_descriptor()
            .peek("x")
            .unwrap()
            .registers
            .contains(&register));
    }

    #[test]
    fn dirty_occupants_are_spilled_before_reuse() {
        let mut allocator = small_allocator();
        allocator.get_register("a", true, None, &[]).unwrap();
        allocator.get_register("b", true, None, &[]).unwrap();
        // Both registers taken and dirty; a third variable forces a spill.
        let (_, spills, _) = allocator.get_register("c", true, None, &[]).unwrap();
        assert_eq!(spills.len(), 1);
        assert!(spills[0].spill_offset.is_some());
    }

    #[test]
    fn dead_occupants_are_recycled_without_spilling_clean_values() {
        let mut allocator = small_allocator();
        allocator.get_register("a", false, None, &[]).unwrap();
        allocator.get_register("b", false, None, &[]).unwrap();
        allocator.set_liveness_context(
            HashSet::from(["b".to_string()]),
            HashMap::from([("b".to_string(), 7)]),
        );
        let (register, spills, _) = allocator.get_register("c", true, None, &[]).unwrap();
        // `a` is dead and clean, so its register is reused silently.
        assert_eq!(register, "$t0");
        assert!(spills.is_empty());
    }

    #[test]
    fn forbidden_registers_are_never_returned() {
        let mut allocator = small_allocator();
        let forbidden = vec!["$t0".to_string()];
        let (register, _, _) = allocator.get_register("x", true, None, &forbidden).unwrap();
        assert_eq!(register, "$t1");
    }

    #[test]
    fn global_homes_spill_through_hex_addresses() {
        let mut allocator = RegisterAllocator::new(Some(vec!["$t0".to_string()]));
        allocator.bind_memory(
            "g",
            crate::tac::address::MemoryLocation {
                address: "0x10010000".to_string(),
                offset: 0,
                size: 4,
                is_temporary: false,
            },
        );
        allocator.get_register("g", true, None, &[]).unwrap();
        let (_, spills, _) = allocator.get_register("h", true, None, &[]).unwrap();
        assert_eq!(spills.len(), 1);
        assert_eq!(spills[0].global_address.as_deref(), Some("0x10010000"));
    }

    #[test]
    fn spill_all_flushes_only_dirty_values() {
        let mut allocator = small_allocator();
        allocator.get_register("clean", false, None, &[]).unwrap();
        allocator.get_register("dirty", true, None, &[]).unwrap();
        let actions = allocator.spill_all();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].variable, "dirty");
        assert!(allocator.find_register_with("clean").is_none());
    }
}
