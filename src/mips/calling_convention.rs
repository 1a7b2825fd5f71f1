//! MIPS O32-style calling convention: the first four parameters travel in
//! `$a0..$a3`, the rest in stack slots at the top of the caller's outgoing
//! area in argument order. Return values come back in `$v0`.

use crate::mips::instruction::MipsNode;
use crate::mips::registers::{caller_saved, callee_saved, ARGUMENT_REGISTERS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterLocation {
    pub index: usize,
    pub register: Option<&'static str>,
    pub stack_offset: Option<i32>,
}

impl ParameterLocation {
    pub fn in_register(&self) -> bool {
        self.register.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct CallingContext {
    pub function_name: String,
    pub param_count: usize,
    pub has_return_value: bool,
    pub param_locations: Vec<ParameterLocation>,
    pub stack_space_needed: i32,
}

/// Parameter `i` goes to `$a<i>` for `i < 4`, else to `(i-4)*4($sp)`.
pub fn param_location(index: usize) -> ParameterLocation {
    if index < 4 {
        ParameterLocation {
            index,
            register: Some(ARGUMENT_REGISTERS[index]),
            stack_offset: None,
        }
    } else {
        ParameterLocation {
            index,
            register: None,
            stack_offset: Some((index as i32 - 4) * 4),
        }
    }
}

pub fn create_calling_context(
    function_name: &str,
    param_count: usize,
    has_return_value: bool,
) -> CallingContext {
    CallingContext {
        function_name: function_name.to_string(),
        param_count,
        has_return_value,
        param_locations: (0..param_count).map(param_location).collect(),
        stack_space_needed: param_count.saturating_sub(4) as i32 * 4,
    }
}

/// Stack cleanup after a call; only parameters beyond the first four
/// occupy stack space.
pub fn pop_params(param_count: usize) -> Option<MipsNode> {
    let stack_params = param_count.saturating_sub(4);
    if stack_params == 0 {
        return None;
    }
    let bytes = stack_params * 4;
    Some(
        MipsNode::ins("addi", &["$sp", "$sp", &bytes.to_string()])
            .with_comment(format!("pop {stack_params} params")),
    )
}

pub fn is_caller_saved(register: &str) -> bool {
    caller_saved().contains(&register)
}

pub fn is_callee_saved(register: &str) -> bool {
    callee_saved().contains(&register)
}

/// MIPS mnemonics a user function must not shadow.
const RESERVED_INSTRUCTIONS: &[&str] = &[
    "add", "sub", "mul", "div", "mod", "and", "or", "xor", "nor", "not", "sll", "srl", "sra",
    "lb", "lh", "lw", "sb", "sh", "sw", "la", "li", "lui", "ori", "move", "mfhi", "mflo", "beq",
    "bne", "blt", "ble", "bgt", "bge", "bltz", "bgez", "beqz", "bnez", "j", "jal", "jr", "jalr",
    "syscall", "break", "nop",
];

/// Runtime entry points and `main` keep their names.
const RUNTIME_FUNCTIONS: &[&str] = &[
    "print",
    "println",
    "print_int",
    "print_newline",
    "input",
    "allocate_array",
    "string_concat",
    "int_to_string",
    "main",
];

/// Prefix colliding names with `user_`. Methods and constructors carry a
/// `Class_` qualifier and can never collide with a bare mnemonic.
pub fn sanitize_function_name(name: &str) -> String {
    if RUNTIME_FUNCTIONS.contains(&name) || name.contains('_') {
        return name.to_string();
    }
    if RESERVED_INSTRUCTIONS.contains(&name.to_lowercase().as_str()) {
        return format!("user_{name}");
    }
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_four_params_ride_in_argument_registers() {
        for (index, register) in ARGUMENT_REGISTERS.iter().enumerate() {
            let location = param_location(index);
            assert_eq!(location.register, Some(*register));
            assert_eq!(location.stack_offset, None);
        }
    }

    #[test]
    fn later_params_get_stack_slots_in_argument_order() {
        assert_eq!(param_location(4).stack_offset, Some(0));
        assert_eq!(param_location(5).stack_offset, Some(4));
        assert_eq!(param_location(6).stack_offset, Some(8));
    }

    #[test]
    fn pop_params_only_cleans_stack_parameters() {
        assert!(pop_params(4).is_none());
        let node = pop_params(6).unwrap();
        assert_eq!(node.operands(), ["$sp", "$sp", "8"]);
    }

    #[test]
    fn reserved_names_get_prefixed() {
        assert_eq!(sanitize_function_name("add"), "user_add");
        assert_eq!(sanitize_function_name("Div"), "user_Div");
        assert_eq!(sanitize_function_name("factorial"), "factorial");
        assert_eq!(sanitize_function_name("print"), "print");
        assert_eq!(sanitize_function_name("Point_sum"), "Point_sum");
    }

    #[test]
    fn register_preservation_roles() {
        assert!(is_caller_saved("$t3"));
        assert!(is_caller_saved("$a0"));
        assert!(is_callee_saved("$s2"));
        assert!(is_callee_saved("$ra"));
        assert!(!is_callee_saved("$t0"));
    }
}
