//! Instruction builders for arithmetic and bitwise TAC operators.

use crate::mips::instruction::MipsNode;

/// `dest = src1 + src2`; immediates use `addi`.
pub fn add(dest: &str, src1: &str, src2: &str, is_immediate: bool) -> Vec<MipsNode> {
    let opcode = if is_immediate { "addi" } else { "add" };
    vec![
        MipsNode::ins(opcode, &[dest, src1, src2])
            .with_comment(format!("{dest} = {src1} + {src2}")),
    ]
}

/// `dest = src1 - src2`. There is no `subi`; immediate subtraction goes
/// through `addi` with a negated constant at the call site.
pub fn sub(dest: &str, src1: &str, src2: &str) -> Vec<MipsNode> {
    vec![
        MipsNode::ins("sub", &[dest, src1, src2])
            .with_comment(format!("{dest} = {src1} - {src2}")),
    ]
}

pub fn mul(dest: &str, src1: &str, src2: &str) -> Vec<MipsNode> {
    vec![
        MipsNode::ins("mul", &[dest, src1, src2])
            .with_comment(format!("{dest} = {src1} * {src2}")),
    ]
}

/// Quotient from LO.
pub fn div(dest: &str, src1: &str, src2: &str) -> Vec<MipsNode> {
    vec![
        MipsNode::ins("div", &[src1, src2]).with_comment(format!("divide {src1} / {src2}")),
        MipsNode::ins("mflo", &[dest]).with_comment(format!("{dest} = quotient")),
    ]
}

/// Remainder from HI.
pub fn modulo(dest: &str, src1: &str, src2: &str) -> Vec<MipsNode> {
    vec![
        MipsNode::ins("div", &[src1, src2]).with_comment(format!("divide {src1} / {src2}")),
        MipsNode::ins("mfhi", &[dest]).with_comment(format!("{dest} = remainder")),
    ]
}

/// `dest = -src` via subtraction from `$zero`.
pub fn negate(dest: &str, src: &str) -> Vec<MipsNode> {
    vec![MipsNode::ins("sub", &[dest, "$zero", src]).with_comment(format!("{dest} = -{src}"))]
}

pub fn bit_and(dest: &str, src1: &str, src2: &str) -> Vec<MipsNode> {
    vec![
        MipsNode::ins("and", &[dest, src1, src2])
            .with_comment(format!("{dest} = {src1} & {src2}")),
    ]
}

pub fn bit_or(dest: &str, src1: &str, src2: &str) -> Vec<MipsNode> {
    vec![
        MipsNode::ins("or", &[dest, src1, src2]).with_comment(format!("{dest} = {src1} | {src2}")),
    ]
}

pub fn bit_xor(dest: &str, src1: &str, src2: &str) -> Vec<MipsNode> {
    vec![
        MipsNode::ins("xor", &[dest, src1, src2])
            .with_comment(format!("{dest} = {src1} ^ {src2}")),
    ]
}
