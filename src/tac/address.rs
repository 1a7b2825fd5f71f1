use indexmap::IndexMap;
use serde::Serialize;

pub const WORD_SIZE: u32 = 4;

/// Where a variable lives in memory: an absolute label for globals, or an
/// `$fp`-relative offset inside an activation frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryLocation {
    pub address: String,
    pub offset: i32,
    pub size: u32,
    pub is_temporary: bool,
}

impl MemoryLocation {
    pub fn global(name: &str, size: u32) -> Self {
        MemoryLocation {
            address: format!("global_{name}"),
            offset: 0,
            size,
            is_temporary: false,
        }
    }

    pub fn frame(offset: i32, size: u32, is_temporary: bool) -> Self {
        MemoryLocation {
            address: if offset < 0 {
                format!("fp{offset}")
            } else {
                format!("fp+{offset}")
            },
            offset,
            size,
            is_temporary,
        }
    }

    pub fn is_global(&self) -> bool {
        self.address.starts_with("global_")
    }
}

/// Offsets for one function's parameters, locals and temporaries, built up
/// while the function body is lowered. Parameters sit at positive offsets
/// (+8, +12, ...), locals and temporaries at negative ones.
#[derive(Debug, Clone)]
pub struct ActivationFrame {
    pub function_name: String,
    pub parameters: Vec<String>,
    pub local_vars: IndexMap<String, i32>,
    pub temp_vars: IndexMap<String, i32>,
    pub total_size: u32,
}

impl ActivationFrame {
    fn new(function_name: &str, parameters: Vec<String>) -> Self {
        let mut local_vars = IndexMap::new();
        let mut offset = 8;
        for param in &parameters {
            local_vars.insert(param.clone(), offset);
            offset += WORD_SIZE as i32;
        }
        ActivationFrame {
            function_name: function_name.to_string(),
            parameters,
            local_vars,
            temp_vars: IndexMap::new(),
            total_size: offset as u32,
        }
    }

    pub fn offset_of(&self, name: &str) -> Option<i32> {
        self.local_vars
            .get(name)
            .or_else(|| self.temp_vars.get(name))
            .copied()
    }

    fn locals_after_params(&self) -> usize {
        self.local_vars.len() - self.parameters.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressStatistics {
    pub global_vars_count: usize,
    pub global_memory_size: u32,
    pub active_functions: usize,
    pub current_stack_size: u32,
    pub labels_generated: u32,
}

/// Assigns memory locations to globals and activation-frame slots, and
/// hands out unique labels. Completed frames are kept around so the MIPS
/// backend can still query frame sizes after lowering.
#[derive(Debug, Default)]
pub struct AddressManager {
    globals: IndexMap<String, MemoryLocation>,
    active_frames: Vec<ActivationFrame>,
    completed_frames: IndexMap<String, ActivationFrame>,
    label_counter: u32,
}

impl AddressManager {
    pub fn new() -> Self {
        AddressManager::default()
    }

    pub fn allocate_global(&mut self, name: &str, size: u32) -> MemoryLocation {
        if let Some(existing) = self.globals.get(name) {
            return existing.clone();
        }
        let location = MemoryLocation::global(name, size);
        self.globals.insert(name.to_string(), location.clone());
        location
    }

    pub fn enter_function(&mut self, name: &str, parameters: Vec<String>) {
        self.active_frames.push(ActivationFrame::new(name, parameters));
    }

    /// Pop the current frame and move it into the completed map so later
    /// queries (MIPS codegen, the symbol annotator) still find it.
    pub fn exit_function(&mut self) -> Option<&ActivationFrame> {
        let frame = self.active_frames.pop()?;
        let name = frame.function_name.clone();
        self.completed_frames.insert(name.clone(), frame);
        self.completed_frames.get(&name)
    }

    pub fn allocate_local(&mut self, name: &str, size: u32) -> MemoryLocation {
        let Some(frame) = self.active_frames.last_mut() else {
            return self.allocate_global(name, size);
        };
        let offset = match frame.local_vars.get(name) {
            Some(offset) => *offset,
            None => {
                let offset = -((frame.locals_after_params() as i32 + 1) * WORD_SIZE as i32);
                frame.local_vars.insert(name.to_string(), offset);
                frame.total_size = frame.total_size.max(offset.unsigned_abs() + size);
                offset
            }
        };
        MemoryLocation::frame(offset, size, false)
    }

    /// Temporaries continue the local numbering past the explicit locals.
    pub fn allocate_temp(&mut self, name: &str, size: u32) -> MemoryLocation {
        let Some(frame) = self.active_frames.last_mut() else {
            let location = MemoryLocation {
                is_temporary: true,
                ..MemoryLocation::global(name, size)
            };
            self.globals.insert(name.to_string(), location.clone());
            return location;
        };
        let offset = match frame.temp_vars.get(name) {
            Some(offset) => *offset,
            None => {
                let slot = frame.locals_after_params() + frame.temp_vars.len() + 1;
                let offset = -(slot as i32 * WORD_SIZE as i32);
                frame.temp_vars.insert(name.to_string(), offset);
                frame.total_size = frame.total_size.max(offset.unsigned_abs() + size);
                offset
            }
        };
        MemoryLocation::frame(offset, size, true)
    }

    /// Search the current frame first, then the globals.
    pub fn variable_location(&self, name: &str) -> Option<MemoryLocation> {
        if let Some(frame) = self.active_frames.last() {
            if let Some(offset) = frame.local_vars.get(name) {
                return Some(MemoryLocation::frame(*offset, WORD_SIZE, false));
            }
            if let Some(offset) = frame.temp_vars.get(name) {
                return Some(MemoryLocation::frame(*offset, WORD_SIZE, true));
            }
        }
        self.globals.get(name).cloned()
    }

    pub fn generate_label(&mut self, prefix: &str) -> String {
        self.label_counter += 1;
        format!("{prefix}{}", self.label_counter)
    }

    pub fn current_function(&self) -> Option<&str> {
        self.active_frames
            .last()
            .map(|frame| frame.function_name.as_str())
    }

    /// Frame size of the named function (or the current one), searching
    /// active frames first and completed ones second.
    pub fn frame_size(&self, function_name: Option<&str>) -> u32 {
        match function_name {
            Some(name) => self
                .active_frames
                .iter()
                .find(|f| f.function_name == name)
                .or_else(|| self.completed_frames.get(name))
                .map(|f| f.total_size)
                .unwrap_or(0),
            None => self
                .active_frames
                .last()
                .map(|f| f.total_size)
                .unwrap_or(0),
        }
    }

    pub fn completed_frame(&self, function_name: &str) -> Option<&ActivationFrame> {
        self.completed_frames.get(function_name)
    }

    pub fn globals(&self) -> &IndexMap<String, MemoryLocation> {
        &self.globals
    }

    pub fn labels_generated(&self) -> u32 {
        self.label_counter
    }

    pub fn reset(&mut self) {
        self.globals.clear();
        self.active_frames.clear();
        self.completed_frames.clear();
        self.label_counter = 0;
    }

    pub fn statistics(&self) -> AddressStatistics {
        AddressStatistics {
            global_vars_count: self.globals.len(),
            global_memory_size: self.globals.values().map(|l| l.size).sum(),
            active_functions: self.active_frames.len(),
            current_stack_size: self.frame_size(None),
            labels_generated: self.label_counter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_get_positive_offsets_from_eight() {
        let mut addresses = AddressManager::new();
        addresses.enter_function("f", vec!["a".into(), "b".into()]);
        let frame = addresses.exit_function().unwrap();
        assert_eq!(frame.local_vars["a"], 8);
        assert_eq!(frame.local_vars["b"], 12);
    }

    #[test]
    fn locals_and_temps_share_the_negative_numbering() {
        let mut addresses = AddressManager::new();
        addresses.enter_function("f", vec!["a".into()]);
        let x = addresses.allocate_local("x", 4);
        let y = addresses.allocate_local("y", 4);
        let t1 = addresses.allocate_temp("t1", 4);
        assert_eq!(x.offset, -4);
        assert_eq!(y.offset, -8);
        assert_eq!(t1.offset, -12);
    }

    #[test]
    fn completed_frames_remain_queryable() {
        let mut addresses = AddressManager::new();
        addresses.enter_function("f", vec![]);
        addresses.allocate_local("x", 4);
        addresses.exit_function();
        assert!(addresses.frame_size(Some("f")) >= 4);
        assert!(addresses.completed_frame("f").is_some());
    }

    #[test]
    fn global_allocation_is_idempotent() {
        let mut addresses = AddressManager::new();
        let first = addresses.allocate_global("g", 4);
        let second = addresses.allocate_global("g", 4);
        assert_eq!(first, second);
        assert_eq!(first.address, "global_g");
    }

    #[test]
    fn labels_are_unique_across_prefixes() {
        let mut addresses = AddressManager::new();
        assert_eq!(addresses.generate_label("L"), "L1");
        assert_eq!(addresses.generate_label("if_false"), "if_false2");
        assert_eq!(addresses.generate_label("L"), "L3");
    }

    #[test]
    fn lookup_prefers_the_current_frame_over_globals() {
        let mut addresses = AddressManager::new();
        addresses.allocate_global("x", 4);
        addresses.enter_function("f", vec![]);
        addresses.allocate_local("x", 4);
        let location = addresses.variable_location("x").unwrap();
        assert!(!location.is_global());
    }
}
