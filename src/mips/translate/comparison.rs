//! Instruction builders for comparison and boolean TAC operators. The base
//! ISA only has `slt`/`slti`/`sltu`, so the other relations are derived by
//! swapping operands or inverting with `xori`.

use crate::mips::instruction::MipsNode;

pub fn less_than(dest: &str, src1: &str, src2: &str, is_immediate: bool) -> Vec<MipsNode> {
    let opcode = if is_immediate { "slti" } else { "slt" };
    vec![
        MipsNode::ins(opcode, &[dest, src1, src2])
            .with_comment(format!("{dest} = ({src1} < {src2})")),
    ]
}

/// `src1 <= src2` is `!(src2 < src1)`.
pub fn less_equal(dest: &str, src1: &str, src2: &str) -> Vec<MipsNode> {
    vec![
        MipsNode::ins("slt", &[dest, src2, src1])
            .with_comment(format!("{dest} = ({src2} < {src1})")),
        MipsNode::ins("xori", &[dest, dest, "1"])
            .with_comment(format!("{dest} = ({src1} <= {src2})")),
    ]
}

/// `src1 > src2` is `src2 < src1`.
pub fn greater_than(dest: &str, src1: &str, src2: &str) -> Vec<MipsNode> {
    vec![
        MipsNode::ins("slt", &[dest, src2, src1])
            .with_comment(format!("{dest} = ({src1} > {src2})")),
    ]
}

/// `src1 >= src2` is `!(src1 < src2)`.
pub fn greater_equal(dest: &str, src1: &str, src2: &str) -> Vec<MipsNode> {
    vec![
        MipsNode::ins("slt", &[dest, src1, src2])
            .with_comment(format!("{dest} = ({src1} < {src2})")),
        MipsNode::ins("xori", &[dest, dest, "1"])
            .with_comment(format!("{dest} = ({src1} >= {src2})")),
    ]
}

/// Equality through subtraction: the difference is zero iff equal.
pub fn equal(dest: &str, src1: &str, src2: &str) -> Vec<MipsNode> {
    vec![
        MipsNode::ins("sub", &[dest, src1, src2])
            .with_comment(format!("{dest} = {src1} - {src2}")),
        MipsNode::ins("sltiu", &[dest, dest, "1"]).with_comment(format!("{dest} = ({dest} == 0)")),
    ]
}

pub fn not_equal(dest: &str, src1: &str, src2: &str) -> Vec<MipsNode> {
    vec![
        MipsNode::ins("sub", &[dest, src1, src2])
            .with_comment(format!("{dest} = {src1} - {src2}")),
        MipsNode::ins("sltu", &[dest, "$zero", dest])
            .with_comment(format!("{dest} = ({dest} != 0)")),
    ]
}

/// `!src`: 1 exactly when src is zero.
pub fn logical_not(dest: &str, src: &str) -> Vec<MipsNode> {
    vec![MipsNode::ins("sltiu", &[dest, src, "1"]).with_comment(format!("{dest} = !{src}"))]
}

/// Normalizing `&&` over already-evaluated operands: both sides are
/// converted to 0/1 and ANDed. Needs a scratch register.
pub fn boolean_and(dest: &str, src1: &str, src2: &str, temp: &str) -> Vec<MipsNode> {
    vec![
        MipsNode::ins("sltu", &[temp, "$zero", src1])
            .with_comment(format!("{temp} = ({src1} != 0)")),
        MipsNode::ins("sltu", &[dest, "$zero", src2])
            .with_comment(format!("{dest} = ({src2} != 0)")),
        MipsNode::ins("and", &[dest, temp, dest])
            .with_comment(format!("{dest} = {src1} && {src2}")),
    ]
}

/// Normalizing `||`: OR then convert to 0/1.
pub fn boolean_or(dest: &str, src1: &str, src2: &str) -> Vec<MipsNode> {
    vec![
        MipsNode::ins("or", &[dest, src1, src2]).with_comment(format!("{dest} = {src1} | {src2}")),
        MipsNode::ins("sltu", &[dest, "$zero", dest])
            .with_comment(format!("{dest} = ({dest} != 0)")),
    ]
}
