use serde::Serialize;
use std::collections::HashSet;

/// Allocates and recycles temporary names (`t1`, `t2`, ...) for TAC
/// generation. Released temporaries go onto a free list and are handed out
/// again before the counter grows. A scope stack lets whole expression or
/// block scopes release everything they acquired on exit.
#[derive(Debug, Default)]
pub struct TemporaryManager {
    counter: u32,
    available: Vec<String>,
    active: HashSet<String>,
    scopes: Vec<HashSet<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemporaryStatistics {
    pub total_created: u32,
    pub active_count: usize,
    pub available_count: usize,
    pub scope_depth: usize,
}

impl TemporaryManager {
    pub fn new() -> Self {
        TemporaryManager::default()
    }

    pub fn new_temp(&mut self) -> String {
        if let Some(temp) = self.available.pop() {
            self.active.insert(temp.clone());
            return temp;
        }
        self.counter += 1;
        let temp = format!("t{}", self.counter);
        self.active.insert(temp.clone());
        temp
    }

    pub fn release(&mut self, temp: &str) {
        if self.active.remove(temp) {
            self.available.push(temp.to_string());
        }
    }

    /// Remember the set of temporaries alive right now; `exit_scope`
    /// releases everything acquired after this point.
    pub fn enter_scope(&mut self) {
        self.scopes.push(self.active.clone());
    }

    pub fn exit_scope(&mut self) {
        let Some(previous) = self.scopes.pop() else {
            return;
        };
        let acquired: Vec<String> = self
            .active
            .iter()
            .filter(|t| !previous.contains(*t))
            .cloned()
            .collect();
        for temp in acquired {
            self.release(&temp);
        }
    }

    /// A temporary is any name of the form `t<digits>`.
    pub fn is_temporary(name: &str) -> bool {
        let Some(rest) = name.strip_prefix('t') else {
            return false;
        };
        !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit())
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn total_created(&self) -> u32 {
        self.counter
    }

    pub fn reset(&mut self) {
        self.counter = 0;
        self.available.clear();
        self.active.clear();
        self.scopes.clear();
    }

    pub fn statistics(&self) -> TemporaryStatistics {
        TemporaryStatistics {
            total_created: self.counter,
            active_count: self.active.len(),
            available_count: self.available.len(),
            scope_depth: self.scopes.len(),
        }
    }
}
