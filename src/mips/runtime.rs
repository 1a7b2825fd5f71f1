//! Hand-written runtime routines linked into every program. Each follows
//! the calling convention: used `$s` registers and `$ra` are saved and
//! restored, results come back in `$v0`.

use crate::mips::instruction::MipsNode;

fn ins(opcode: &str, operands: &[&str]) -> MipsNode {
    MipsNode::ins(opcode, operands)
}

fn ins_c(opcode: &str, operands: &[&str], comment: &str) -> MipsNode {
    MipsNode::ins(opcode, operands).with_comment(comment)
}

/// `print`: strings and integers share one entry point. Addresses at or
/// past `_data_segment_start` are strings; smaller values are integers.
pub fn print_function() -> Vec<MipsNode> {
    vec![
        MipsNode::comment("Runtime function: print"),
        MipsNode::comment("Prints strings or integers passed in $a0"),
        MipsNode::label("print"),
        ins_c("la", &["$t0", "_data_segment_start"], "data segment base"),
        ins_c(
            "blt",
            &["$a0", "$t0", "_print_int_fallback"],
            "if value < base -> int",
        ),
        ins_c("li", &["$v0", "4"], "syscall: print_string"),
        ins("syscall", &[]),
        ins_c("jr", &["$ra"], "return"),
        MipsNode::label("_print_int_fallback"),
        ins_c("li", &["$v0", "1"], "syscall: print_int"),
        ins("syscall", &[]),
        ins_c("jr", &["$ra"], "return"),
    ]
}

/// `println`: print the value, then a newline.
pub fn println_function() -> Vec<MipsNode> {
    vec![
        MipsNode::comment("Runtime function: println"),
        MipsNode::label("println"),
        ins_c("addi", &["$sp", "$sp", "-4"], "allocate stack"),
        ins_c("sw", &["$ra", "0($sp)"], "save $ra"),
        ins_c("jal", &["print"], "print the value"),
        ins_c("jal", &["print_newline"], "trailing newline"),
        ins_c("lw", &["$ra", "0($sp)"], "restore $ra"),
        ins_c("addi", &["$sp", "$sp", "4"], "deallocate stack"),
        ins_c("jr", &["$ra"], "return"),
    ]
}

/// `input`: read an integer from stdin into `$v0`.
pub fn input_function() -> Vec<MipsNode> {
    vec![
        MipsNode::comment("Runtime function: input"),
        MipsNode::label("input"),
        ins_c("li", &["$v0", "5"], "syscall: read_int"),
        ins("syscall", &[]),
        ins_c("jr", &["$ra"], "return"),
    ]
}

pub fn print_int_function() -> Vec<MipsNode> {
    vec![
        MipsNode::comment("Runtime function: print_int"),
        MipsNode::label("print_int"),
        ins_c("li", &["$v0", "1"], "syscall: print_int"),
        ins("syscall", &[]),
        ins_c("jr", &["$ra"], "return"),
    ]
}

pub fn print_newline_function() -> Vec<MipsNode> {
    vec![
        MipsNode::comment("Runtime function: print_newline"),
        MipsNode::label("print_newline"),
        ins_c("la", &["$a0", "_newline"], "load newline address"),
        ins_c("li", &["$v0", "4"], "syscall: print_string"),
        ins("syscall", &[]),
        ins_c("jr", &["$ra"], "return"),
    ]
}

/// `allocate_array`: `$a0` elements of `$a1` bytes each, address in `$v0`.
pub fn allocate_array_function() -> Vec<MipsNode> {
    vec![
        MipsNode::comment("Runtime function: allocate_array"),
        MipsNode::comment("Input: $a0 = num elements, $a1 = element size"),
        MipsNode::label("allocate_array"),
        ins_c("mult", &["$a0", "$a1"], "product in LO"),
        ins_c("mflo", &["$a0"], "total bytes -> $a0"),
        ins_c("li", &["$v0", "9"], "syscall: sbrk"),
        ins("syscall", &[]),
        ins_c("jr", &["$ra"], "return"),
    ]
}

/// `string_concat`: byte-wise copy of two null-terminated strings into
/// `_str_buffer`; result address in `$v0`.
pub fn string_concat_function() -> Vec<MipsNode> {
    vec![
        MipsNode::comment("Runtime function: string_concat"),
        MipsNode::comment("Input: $a0 = str1, $a1 = str2"),
        MipsNode::label("string_concat"),
        ins_c("addi", &["$sp", "$sp", "-16"], "allocate stack"),
        ins_c("sw", &["$ra", "12($sp)"], "save $ra"),
        ins_c("sw", &["$s0", "8($sp)"], "save $s0"),
        ins_c("sw", &["$s1", "4($sp)"], "save $s1"),
        ins_c("sw", &["$s2", "0($sp)"], "save $s2"),
        ins_c("la", &["$s0", "_str_buffer"], "load buffer address"),
        ins_c("move", &["$s1", "$a0"], "save str1"),
        ins_c("move", &["$s2", "$a1"], "save str2"),
        ins_c("move", &["$t0", "$s0"], "current position in buffer"),
        MipsNode::label("_concat_loop1"),
        ins_c("lb", &["$t1", "0($s1)"], "load byte from str1"),
        ins_c("beq", &["$t1", "$zero", "_concat_done1"], "if null, done"),
        ins_c("sb", &["$t1", "0($t0)"], "store to buffer"),
        ins_c("addi", &["$s1", "$s1", "1"], "next byte in str1"),
        ins_c("addi", &["$t0", "$t0", "1"], "next position in buffer"),
        ins("j", &["_concat_loop1"]),
        MipsNode::label("_concat_done1"),
        MipsNode::label("_concat_loop2"),
        ins_c("lb", &["$t1", "0($s2)"], "load byte from str2"),
        ins_c("beq", &["$t1", "$zero", "_concat_done2"], "if null, done"),
        ins_c("sb", &["$t1", "0($t0)"], "store to buffer"),
        ins_c("addi", &["$s2", "$s2", "1"], "next byte in str2"),
        ins_c("addi", &["$t0", "$t0", "1"], "next position in buffer"),
        ins("j", &["_concat_loop2"]),
        MipsNode::label("_concat_done2"),
        ins_c("sb", &["$zero", "0($t0)"], "null terminator"),
        ins_c("move", &["$v0", "$s0"], "return buffer address"),
        ins_c("lw", &["$s2", "0($sp)"], "restore $s2"),
        ins_c("lw", &["$s1", "4($sp)"], "restore $s1"),
        ins_c("lw", &["$s0", "8($sp)"], "restore $s0"),
        ins_c("lw", &["$ra", "12($sp)"], "restore $ra"),
        ins_c("addi", &["$sp", "$sp", "16"], "deallocate stack"),
        ins_c("jr", &["$ra"], "return"),
    ]
}

/// `int_to_string`: digit extraction into `_int_buffer` with sign handling
/// and an in-place reverse; string address in `$v0`.
pub fn int_to_string_function() -> Vec<MipsNode> {
    vec![
        MipsNode::comment("Runtime function: int_to_string"),
        MipsNode::comment("Input: $a0 = integer"),
        MipsNode::label("int_to_string"),
        ins_c("addi", &["$sp", "$sp", "-20"], "allocate stack"),
        ins_c("sw", &["$ra", "16($sp)"], "save $ra"),
        ins_c("sw", &["$s0", "12($sp)"], "save $s0"),
        ins_c("sw", &["$s1", "8($sp)"], "save $s1"),
        ins_c("sw", &["$s2", "4($sp)"], "save $s2"),
        ins_c("sw", &["$s3", "0($sp)"], "save $s3"),
        ins_c("la", &["$s0", "_int_buffer"], "buffer address"),
        ins_c("move", &["$s1", "$a0"], "save number"),
        ins_c("move", &["$s2", "$s0"], "current position"),
        ins_c("li", &["$s3", "0"], "is_negative flag"),
        ins_c("bnez", &["$s1", "_i2s_not_zero"], "if n != 0"),
        ins_c("li", &["$t0", "48"], "ASCII '0'"),
        ins_c("sb", &["$t0", "0($s2)"], "store '0'"),
        ins_c("addi", &["$s2", "$s2", "1"], "advance"),
        ins("j", &["_i2s_done"]),
        MipsNode::label("_i2s_not_zero"),
        ins_c("bgez", &["$s1", "_i2s_positive"], "if n >= 0"),
        ins_c("li", &["$s3", "1"], "set negative flag"),
        ins_c("sub", &["$s1", "$zero", "$s1"], "n = -n"),
        MipsNode::label("_i2s_positive"),
        MipsNode::label("_i2s_loop"),
        ins_c("beqz", &["$s1", "_i2s_sign"], "if n == 0, done"),
        ins_c("li", &["$t1", "10"], "divisor = 10"),
        ins_c("div", &["$s1", "$t1"], "n / 10"),
        ins_c("mfhi", &["$t0"], "remainder (digit)"),
        ins_c("addi", &["$t0", "$t0", "48"], "to ASCII"),
        ins_c("sb", &["$t0", "0($s2)"], "store digit"),
        ins_c("addi", &["$s2", "$s2", "1"], "advance"),
        ins_c("mflo", &["$s1"], "n = quotient"),
        ins("j", &["_i2s_loop"]),
        MipsNode::label("_i2s_sign"),
        ins_c("beqz", &["$s3", "_i2s_reverse"], "if not negative"),
        ins_c("li", &["$t0", "45"], "ASCII '-'"),
        ins_c("sb", &["$t0", "0($s2)"], "store '-'"),
        ins_c("addi", &["$s2", "$s2", "1"], "advance"),
        MipsNode::label("_i2s_reverse"),
        ins_c("move", &["$t0", "$s0"], "left = start"),
        ins_c("addi", &["$t1", "$s2", "-1"], "right = end - 1"),
        MipsNode::label("_i2s_rev_loop"),
        ins_c("slt", &["$t2", "$t0", "$t1"], "left < right?"),
        ins_c("beqz", &["$t2", "_i2s_done"], "if not, done"),
        ins_c("lb", &["$t3", "0($t0)"], "load left"),
        ins_c("lb", &["$t4", "0($t1)"], "load right"),
        ins_c("sb", &["$t4", "0($t0)"], "store right to left"),
        ins_c("sb", &["$t3", "0($t1)"], "store left to right"),
        ins_c("addi", &["$t0", "$t0", "1"], "left++"),
        ins_c("addi", &["$t1", "$t1", "-1"], "right--"),
        ins("j", &["_i2s_rev_loop"]),
        MipsNode::label("_i2s_done"),
        ins_c("sb", &["$zero", "0($s2)"], "null terminator"),
        ins_c("move", &["$v0", "$s0"], "return buffer address"),
        ins_c("lw", &["$s3", "0($sp)"], "restore $s3"),
        ins_c("lw", &["$s2", "4($sp)"], "restore $s2"),
        ins_c("lw", &["$s1", "8($sp)"], "restore $s1"),
        ins_c("lw", &["$s0", "12($sp)"], "restore $s0"),
        ins_c("lw", &["$ra", "16($sp)"], "restore $ra"),
        ins_c("addi", &["$sp", "$sp", "20"], "deallocate stack"),
        ins_c("jr", &["$ra"], "return"),
    ]
}

pub fn all_runtime_functions() -> Vec<MipsNode> {
    let mut nodes = Vec::new();
    nodes.extend(print_function());
    nodes.extend(println_function());
    nodes.extend(print_int_function());
    nodes.extend(print_newline_function());
    nodes.extend(input_function());
    nodes.extend(allocate_array_function());
    nodes.extend(string_concat_function());
    nodes.extend(int_to_string_function());
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_helper_is_emitted_once() {
        let rendered: Vec<String> = all_runtime_functions()
            .iter()
            .map(|n| n.to_string())
            .collect();
        for label in [
            "print:",
            "println:",
            "input:",
            "print_int:",
            "print_newline:",
            "allocate_array:",
            "string_concat:",
            "int_to_string:",
        ] {
            assert_eq!(
                rendered.iter().filter(|l| *l == label).count(),
                1,
                "{label} must appear exactly once"
            );
        }
    }

    #[test]
    fn helpers_balance_their_stack_frames() {
        for function in [string_concat_function(), int_to_string_function()] {
            let mut delta = 0i32;
            for node in &function {
                if node.opcode() == Some("addi") && node.operands()[0] == "$sp" {
                    delta += node.operands()[2].parse::<i32>().unwrap();
                }
            }
            assert_eq!(delta, 0, "stack pointer adjustments must balance");
        }
    }
}
