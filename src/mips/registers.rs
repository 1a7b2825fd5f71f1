//! Register sets of the MIPS calling convention and the register/address
//! descriptor pair consulted by the allocator. All coupled mutation of the
//! two descriptors goes through [`crate::mips::allocator::RegisterAllocator`].

use crate::tac::address::MemoryLocation;
use indexmap::{IndexMap, IndexSet};

pub const TEMP_REGISTERS: [&str; 10] = [
    "$t0", "$t1", "$t2", "$t3", "$t4", "$t5", "$t6", "$t7", "$t8", "$t9",
];
pub const SAVED_REGISTERS: [&str; 8] = [
    "$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7",
];
pub const ARGUMENT_REGISTERS: [&str; 4] = ["$a0", "$a1", "$a2", "$a3"];
pub const RETURN_REGISTERS: [&str; 2] = ["$v0", "$v1"];

pub const WORD_SIZE: i32 = 4;

/// The default allocatable set: `$t0..$t9` then `$s0..$s7`.
pub fn default_allocatable() -> Vec<String> {
    TEMP_REGISTERS
        .iter()
        .chain(SAVED_REGISTERS.iter())
        .map(|r| r.to_string())
        .collect()
}

pub fn caller_saved() -> Vec<&'static str> {
    TEMP_REGISTERS
        .iter()
        .chain(ARGUMENT_REGISTERS.iter())
        .chain(RETURN_REGISTERS.iter())
        .copied()
        .collect()
}

pub fn callee_saved() -> Vec<&'static str> {
    SAVED_REGISTERS.iter().copied().chain(["$fp", "$ra"]).collect()
}

/// Per-register state: occupying variables, which of them are dirty, a pin
/// flag and a logical LRU timestamp.
#[derive(Debug, Clone, Default)]
pub struct RegisterState {
    pub variables: IndexSet<String>,
    pub dirty: IndexSet<String>,
    pub pinned: bool,
    pub last_used: u64,
}

impl RegisterState {
    pub fn is_free(&self) -> bool {
        self.variables.is_empty()
    }
}

/// register → variables view.
#[derive(Debug, Clone)]
pub struct RegisterDescriptor {
    states: IndexMap<String, RegisterState>,
    tick: u64,
}

impl RegisterDescriptor {
    pub fn new(allocatable: &[String]) -> Self {
        RegisterDescriptor {
            states: allocatable
                .iter()
                .map(|name| (name.clone(), RegisterState::default()))
                .collect(),
            tick: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    pub fn is_allocatable(&self, register: &str) -> bool {
        self.states.contains_key(register)
    }

    pub fn is_free(&self, register: &str) -> bool {
        self.states[register].is_free()
    }

    pub fn state(&self, register: &str) -> &RegisterState {
        &self.states[register]
    }

    pub fn mark_used(&mut self, register: &str) {
        let tick = self.tick();
        self.states[register].last_used = tick;
    }

    pub fn pin(&mut self, register: &str) {
        self.states[register].pinned = true;
    }

    pub fn associate(&mut self, register: &str, variable: &str, dirty: bool) {
        let state = &mut self.states[register];
        state.variables.insert(variable.to_string());
        if dirty {
            state.dirty.insert(variable.to_string());
        }
        self.mark_used(register);
    }

    /// Drop one variable from a register, or all of them.
    pub fn dissociate(&mut self, register: &str, variable: Option<&str>) {
        let state = &mut self.states[register];
        match variable {
            Some(variable) => {
                state.variables.shift_remove(variable);
                state.dirty.shift_remove(variable);
            }
            None => {
                state.variables.clear();
                state.dirty.clear();
            }
        }
        self.mark_used(register);
    }

    pub fn mark_dirty(&mut self, register: &str, variable: &str) {
        self.states[register].dirty.insert(variable.to_string());
    }

    pub fn mark_clean(&mut self, register: &str, variable: &str) {
        self.states[register].dirty.shift_remove(variable);
    }

    pub fn variables_in(&self, register: &str) -> Vec<String> {
        self.states[register].variables.iter().cloned().collect()
    }

    pub fn contains(&self, register: &str, variable: &str) -> bool {
        self.states[register].variables.contains(variable)
    }

    pub fn find_register_with(&self, variable: &str) -> Option<&str> {
        self.states
            .iter()
            .find(|(_, state)| state.variables.contains(variable))
            .map(|(name, _)| name.as_str())
    }

    pub fn registers(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(|k| k.as_str())
    }
}

/// variable → locations view: registers holding the value, the canonical
/// memory home, a lazily reserved spill slot and the dirty flag.
#[derive(Debug, Clone, Default)]
pub struct VariableLocation {
    pub registers: IndexSet<String>,
    pub memory: Option<MemoryLocation>,
    pub spill_slot: Option<i32>,
    pub dirty: bool,
}

impl VariableLocation {
    pub fn in_register(&self) -> bool {
        !self.registers.is_empty()
    }

    pub fn is_in_memory(&self) -> bool {
        self.memory.is_some() || self.spill_slot.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AddressDescriptor {
    locations: IndexMap<String, VariableLocation>,
    spill_offsets: IndexMap<String, i32>,
    next_spill_offset: i32,
    max_spill_offset: i32,
}

impl AddressDescriptor {
    pub fn new() -> Self {
        AddressDescriptor::default()
    }

    pub fn reset(&mut self) {
        self.locations.clear();
        self.spill_offsets.clear();
        self.next_spill_offset = 0;
        self.max_spill_offset = 0;
    }

    pub fn get(&mut self, name: &str) -> &mut VariableLocation {
        self.locations.entry(name.to_string()).or_default()
    }

    pub fn peek(&self, name: &str) -> Option<&VariableLocation> {
        self.locations.get(name)
    }

    pub fn bind_memory(&mut self, name: &str, location: MemoryLocation) {
        self.get(name).memory = Some(location);
    }

    pub fn bind_register(&mut self, name: &str, register: &str) {
        self.get(name).registers.insert(register.to_string());
    }

    pub fn unbind_register(&mut self, name: &str, register: &str) {
        if let Some(entry) = self.locations.get_mut(name) {
            entry.registers.shift_remove(register);
        }
    }

    pub fn mark_dirty(&mut self, name: &str) {
        self.get(name).dirty = true;
    }

    pub fn mark_clean(&mut self, name: &str) {
        if let Some(entry) = self.locations.get_mut(name) {
            entry.dirty = false;
        }
    }

    /// Keep spill slots clear of a region already claimed at the bottom of
    /// the frame (the stored argument registers).
    pub fn reserve_spill_region(&mut self, bytes: i32) {
        self.next_spill_offset = self.next_spill_offset.max(bytes);
        self.max_spill_offset = self.max_spill_offset.max(self.next_spill_offset);
    }

    /// Reserve (or return the existing) spill slot for a variable; offsets
    /// are relative to `$sp` after frame allocation.
    pub fn ensure_spill_slot(&mut self, name: &str) -> i32 {
        if let Some(offset) = self.spill_offsets.get(name) {
            return *offset;
        }
        let offset = self.next_spill_offset;
        self.next_spill_offset += WORD_SIZE;
        self.max_spill_offset = self.max_spill_offset.max(offset + WORD_SIZE);
        self.spill_offsets.insert(name.to_string(), offset);
        self.get(name).spill_slot = Some(offset);
        offset
    }

    pub fn variables(&self) -> &IndexMap<String, VariableLocation> {
        &self.locations
    }

    pub fn spill_area_size(&self) -> i32 {
        self.max_spill_offset
    }
}
