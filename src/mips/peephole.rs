//! Peephole optimization: local pattern rewriting over the emitted node
//! stream, iterated until nothing changes or the pass limit is reached.

use crate::mips::instruction::MipsNode;
use indexmap::IndexMap;
use log::debug;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize)]
pub struct OptimizationStats {
    pub redundant_loads_removed: u32,
    pub dead_stores_removed: u32,
    pub algebraic_simplifications: u32,
    pub strength_reductions: u32,
    pub constants_folded: u32,
    pub jumps_optimized: u32,
    pub unreachable_removed: u32,
    pub redundant_moves_removed: u32,
    pub nops_removed: u32,
    pub passes_executed: u32,
}

impl OptimizationStats {
    pub fn total_optimizations(&self) -> u32 {
        self.redundant_loads_removed
            + self.dead_stores_removed
            + self.algebraic_simplifications
            + self.strength_reductions
            + self.constants_folded
            + self.jumps_optimized
            + self.unreachable_removed
            + self.redundant_moves_removed
            + self.nops_removed
    }
}

pub struct PeepholeOptimizer {
    max_iterations: u32,
    stats: OptimizationStats,
}

impl Default for PeepholeOptimizer {
    fn default() -> Self {
        PeepholeOptimizer::new(10)
    }
}

fn is_power_of_two(value: u32) -> bool {
    value > 0 && value & (value - 1) == 0
}

fn instruction_count(nodes: &[MipsNode]) -> usize {
    nodes.iter().filter(|n| n.is_instruction()).count()
}

impl PeepholeOptimizer {
    pub fn new(max_iterations: u32) -> Self {
        PeepholeOptimizer {
            max_iterations,
            stats: OptimizationStats::default(),
        }
    }

    pub fn stats(&self) -> &OptimizationStats {
        &self.stats
    }

    /// Run every pattern repeatedly until a fixpoint (measured over the
    /// rendered stream, so operand rewrites count as changes too).
    pub fn optimize(&mut self, mut nodes: Vec<MipsNode>) -> Vec<MipsNode> {
        let mut iterations = 0;
        while iterations < self.max_iterations {
            let before = nodes.clone();

            nodes = self.eliminate_redundant_loads(nodes);
            nodes = self.eliminate_dead_stores(nodes);
            nodes = self.algebraic_simplify(nodes);
            nodes = self.strength_reduction(nodes);
            nodes = self.constant_folding(nodes);
            nodes = self.eliminate_jump_to_jump(nodes);
            nodes = self.eliminate_unreachable_code(nodes);
            nodes = self.eliminate_redundant_moves(nodes);
            nodes = self.eliminate_nops(nodes);

            iterations += 1;
            if nodes == before {
                break;
            }
        }
        self.stats.passes_executed += iterations;
        debug!(
            "peephole: {} rewrites over {} passes, {} instructions remain",
            self.stats.total_optimizations(),
            iterations,
            instruction_count(&nodes)
        );
        nodes
    }

    /// `lw $r, M ; sw $r, M`: the store writes back what was just read.
    fn eliminate_redundant_loads(&mut self, nodes: Vec<MipsNode>) -> Vec<MipsNode> {
        let mut result: Vec<MipsNode> = Vec::with_capacity(nodes.len());
        let mut iter = nodes.into_iter().peekable();
        while let Some(node) = iter.next() {
            if node.opcode() == Some("lw") {
                if let Some(next) = iter.peek() {
                    if next.opcode() == Some("sw") && next.operands() == node.operands() {
                        iter.next();
                        self.stats.redundant_loads_removed += 1;
                        result.push(node);
                        continue;
                    }
                }
            }
            result.push(node);
        }
        result
    }

    /// `sw $r, M ; lw $r, M`: the value is still in the register.
    fn eliminate_dead_stores(&mut self, nodes: Vec<MipsNode>) -> Vec<MipsNode> {
        let mut result: Vec<MipsNode> = Vec::with_capacity(nodes.len());
        let mut iter = nodes.into_iter().peekable();
        while let Some(node) = iter.next() {
            if node.opcode() == Some("sw") {
                if let Some(next) = iter.peek() {
                    if next.opcode() == Some("lw") && next.operands() == node.operands() {
                        iter.next();
                        self.stats.dead_stores_removed += 1;
                        continue;
                    }
                }
            }
            result.push(node);
        }
        result
    }

    fn algebraic_simplify(&mut self, nodes: Vec<MipsNode>) -> Vec<MipsNode> {
        nodes
            .into_iter()
            .map(|node| {
                let Some(opcode) = node.opcode() else {
                    return node;
                };
                let operands = node.operands();
                if operands.len() != 3 {
                    return node;
                }
                let (dest, src1, src2) = (&operands[0], &operands[1], &operands[2]);
                let replacement = match opcode {
                    "add" | "addi" if src2 == "$zero" || src2 == "0" => {
                        Some(MipsNode::ins("move", &[dest, src1]))
                    }
                    "add" if src1 == "$zero" => Some(MipsNode::ins("move", &[dest, src2])),
                    "sub" if src2 == "$zero" => Some(MipsNode::ins("move", &[dest, src1])),
                    "or" if src2 == "$zero" => Some(MipsNode::ins("move", &[dest, src1])),
                    "mul" if src2 == "0" || src2 == "$zero" => {
                        Some(MipsNode::ins("li", &[dest, "0"]))
                    }
                    "mul" if src2 == "1" => Some(MipsNode::ins("move", &[dest, src1])),
                    "mul" if src1 == "1" => Some(MipsNode::ins("move", &[dest, src2])),
                    _ => None,
                };
                match replacement {
                    Some(replacement) => {
                        self.stats.algebraic_simplifications += 1;
                        replacement
                    }
                    None => node,
                }
            })
            .collect()
    }

    /// Multiplications and divisions by powers of two become shifts. The
    /// 0 and 1 multipliers belong to the algebraic rules.
    fn strength_reduction(&mut self, nodes: Vec<MipsNode>) -> Vec<MipsNode> {
        nodes
            .into_iter()
            .map(|node| {
                let Some(opcode) = node.opcode() else {
                    return node;
                };
                let operands = node.operands();
                if operands.len() != 3 {
                    return node;
                }
                let Ok(value) = operands[2].parse::<u32>() else {
                    return node;
                };
                if !is_power_of_two(value) || value == 1 {
                    return node;
                }
                let shift = value.trailing_zeros().to_string();
                let (dest, src) = (&operands[0], &operands[1]);
                let replacement = match opcode {
                    "mul" => Some(
                        MipsNode::ins("sll", &[dest, src, &shift])
                            .with_comment(format!("mul by {value}")),
                    ),
                    "div" => Some(
                        MipsNode::ins("sra", &[dest, src, &shift])
                            .with_comment(format!("div by {value}")),
                    ),
                    _ => None,
                };
                match replacement {
                    Some(replacement) => {
                        self.stats.strength_reductions += 1;
                        replacement
                    }
                    None => node,
                }
            })
            .collect()
    }

    /// Track `li` constants and fold add/addi/sub/mul over known values.
    /// Tracking resets at labels and is invalidated by stores, calls and
    /// jumps.
    fn constant_folding(&mut self, nodes: Vec<MipsNode>) -> Vec<MipsNode> {
        let mut result = Vec::with_capacity(nodes.len());
        let mut constants: HashMap<String, i64> = HashMap::new();

        for node in nodes {
            if matches!(node, MipsNode::Label { .. }) {
                constants.clear();
                result.push(node);
                continue;
            }
            let Some(opcode) = node.opcode().map(str::to_string) else {
                result.push(node);
                continue;
            };

            if opcode == "li" && node.operands().len() == 2 {
                if let Ok(value) = node.operands()[1].parse::<i64>() {
                    constants.insert(node.operands()[0].clone(), value);
                }
                result.push(node);
                continue;
            }

            let mut folded = false;
            if matches!(opcode.as_str(), "add" | "addi" | "sub" | "mul")
                && node.operands().len() == 3
            {
                let dest = node.operands()[0].clone();
                let lhs = constants.get(&node.operands()[1]).copied();
                let rhs = constants
                    .get(&node.operands()[2])
                    .copied()
                    .or_else(|| node.operands()[2].parse::<i64>().ok());
                if let (Some(lhs), Some(rhs)) = (lhs, rhs) {
                    let value = match opcode.as_str() {
                        "add" | "addi" => lhs + rhs,
                        "sub" => lhs - rhs,
                        _ => lhs * rhs,
                    };
                    result.push(
                        MipsNode::ins("li", &[&dest, &value.to_string()])
                            .with_comment(format!("folded: {lhs} {opcode} {rhs}")),
                    );
                    constants.insert(dest, value);
                    self.stats.constants_folded += 1;
                    folded = true;
                }
            }

            if !folded {
                match opcode.as_str() {
                    "sw" | "jal" | "j" | "jr" | "syscall" => constants.clear(),
                    _ => {
                        if let Some(dest) = node.operands().first() {
                            constants.remove(dest);
                        }
                    }
                }
                result.push(node);
            }
        }
        result
    }

    /// `j L1 ; ... L1: j L2`: retarget the first jump at L2, following
    /// chains but stopping on cycles.
    fn eliminate_jump_to_jump(&mut self, nodes: Vec<MipsNode>) -> Vec<MipsNode> {
        let mut forward: IndexMap<String, String> = IndexMap::new();
        for (index, node) in nodes.iter().enumerate() {
            let MipsNode::Label { name } = node else {
                continue;
            };
            for next in nodes[index + 1..].iter() {
                match next {
                    MipsNode::Instruction {
                        opcode, operands, ..
                    } => {
                        if opcode == "j" && !operands.is_empty() {
                            forward.insert(name.clone(), operands[0].clone());
                        }
                        break;
                    }
                    MipsNode::Label { .. } => break,
                    _ => continue,
                }
            }
        }

        nodes
            .into_iter()
            .map(|node| {
                let Some(opcode) = node.opcode().map(str::to_string) else {
                    return node;
                };
                if !matches!(
                    opcode.as_str(),
                    "j" | "beq" | "bne" | "blt" | "ble" | "bgt" | "bge" | "beqz" | "bnez"
                ) {
                    return node;
                }
                let operands = node.operands().to_vec();
                let Some(original) = operands.last().cloned() else {
                    return node;
                };
                let mut target = original.clone();
                let mut visited = std::collections::HashSet::new();
                while let Some(next) = forward.get(&target) {
                    if !visited.insert(target.clone()) {
                        break;
                    }
                    target = next.clone();
                }
                if target == original {
                    return node;
                }
                self.stats.jumps_optimized += 1;
                let mut new_operands: Vec<&str> =
                    operands[..operands.len() - 1].iter().map(|s| s.as_str()).collect();
                new_operands.push(&target);
                MipsNode::ins(&opcode, &new_operands).with_comment(format!("was {original}"))
            })
            .collect()
    }

    /// Instructions between an unconditional jump and the next label can
    /// never execute.
    fn eliminate_unreachable_code(&mut self, nodes: Vec<MipsNode>) -> Vec<MipsNode> {
        let mut result = Vec::with_capacity(nodes.len());
        let mut skipping = false;
        for node in nodes {
            if skipping {
                match &node {
                    MipsNode::Label { .. } => {
                        skipping = false;
                        result.push(node);
                    }
                    MipsNode::Instruction { .. } => {
                        self.stats.unreachable_removed += 1;
                    }
                    _ => result.push(node),
                }
                continue;
            }
            let is_unconditional_jump = matches!(node.opcode(), Some("j") | Some("jr"));
            result.push(node);
            if is_unconditional_jump {
                skipping = true;
            }
        }
        result
    }

    fn eliminate_redundant_moves(&mut self, nodes: Vec<MipsNode>) -> Vec<MipsNode> {
        nodes
            .into_iter()
            .filter(|node| {
                let redundant = node.opcode() == Some("move")
                    && node.operands().len() == 2
                    && node.operands()[0] == node.operands()[1];
                if redundant {
                    self.stats.redundant_moves_removed += 1;
                }
                !redundant
            })
            .collect()
    }

    fn eliminate_nops(&mut self, nodes: Vec<MipsNode>) -> Vec<MipsNode> {
        nodes
            .into_iter()
            .filter(|node| {
                let is_nop = node.opcode() == Some("nop");
                if is_nop {
                    self.stats.nops_removed += 1;
                }
                !is_nop
            })
            .collect()
    }
}
