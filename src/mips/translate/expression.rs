//! Assignment-family translation: binary and unary operators, simple
//! copies, array allocation and element access.

use crate::mips::generator::MipsGenerator;
use crate::mips::instruction::MipsNode;
use crate::mips::translate::{arithmetic, comparison, is_constant, is_data_label};
use crate::mips::MipsError;
use crate::tac::instruction::Operator;

impl MipsGenerator {
    pub(crate) fn translate_assignment(
        &mut self,
        target: &str,
        operand1: &str,
        operator: Option<Operator>,
        operand2: Option<&str>,
    ) -> Result<(), MipsError> {
        match (operator, operand2) {
            (Some(operator), Some(operand2)) => {
                self.translate_binary(target, operand1, operator, operand2)
            }
            (Some(operator), None) => self.translate_unary(target, operator, operand1),
            _ => self.translate_simple_assignment(target, operand1),
        }
    }

    fn translate_binary(
        &mut self,
        target: &str,
        operand1: &str,
        operator: Operator,
        operand2: &str,
    ) -> Result<(), MipsError> {
        if operator == Operator::StrConcat {
            return self.translate_str_concat(target, operand1, operand2);
        }

        let dest = self.acquire(target, true, &[])?;
        let src1 = self.load_operand(operand1, &[dest.clone()])?;

        // Comparisons always run register-register; slt has no register
        // immediate form. Arithmetic keeps immediates inline so the
        // peephole strength reduction sees them.
        let use_immediate = is_constant(operand2) && !operator.is_relational();
        let nodes = if use_immediate {
            self.binary_nodes(operator, &dest, &src1, operand2, true)?
        } else {
            let src2 = self.load_operand(operand2, &[dest.clone(), src1.clone()])?;
            self.binary_nodes(operator, &dest, &src1, &src2, false)?
        };
        self.emit_text_many(nodes);
        Ok(())
    }

    fn binary_nodes(
        &mut self,
        operator: Operator,
        dest: &str,
        src1: &str,
        src2: &str,
        is_immediate: bool,
    ) -> Result<Vec<MipsNode>, MipsError> {
        let nodes = match operator {
            Operator::Add => arithmetic::add(dest, src1, src2, is_immediate),
            Operator::Sub => match (is_immediate, src2.parse::<i64>()) {
                // No subi: immediate subtraction is addi with the negated
                // constant.
                (true, Ok(value)) => arithmetic::add(dest, src1, &(-value).to_string(), true),
                _ => arithmetic::sub(dest, src1, src2),
            },
            Operator::Mul => arithmetic::mul(dest, src1, src2),
            Operator::Div => arithmetic::div(dest, src1, src2),
            Operator::Mod => arithmetic::modulo(dest, src1, src2),
            Operator::Lt => comparison::less_than(dest, src1, src2, is_immediate),
            Operator::Le => comparison::less_equal(dest, src1, src2),
            Operator::Gt => comparison::greater_than(dest, src1, src2),
            Operator::Ge => comparison::greater_equal(dest, src1, src2),
            Operator::Eq => comparison::equal(dest, src1, src2),
            Operator::Ne => comparison::not_equal(dest, src1, src2),
            Operator::And => {
                let forbidden = vec![dest.to_string(), src1.to_string(), src2.to_string()];
                let temp = self.scratch_register(&forbidden)?;
                let nodes = comparison::boolean_and(dest, src1, src2, &temp);
                self.allocator.release_register(&temp);
                nodes
            }
            Operator::Or => comparison::boolean_or(dest, src1, src2),
            Operator::BitAnd => arithmetic::bit_and(dest, src1, src2),
            Operator::BitOr => arithmetic::bit_or(dest, src1, src2),
            Operator::BitXor => arithmetic::bit_xor(dest, src1, src2),
            Operator::IntToFloat => int_to_float_nodes(dest, src1),
            Operator::FloatToInt => float_to_int_nodes(dest, src1),
            Operator::Not | Operator::Len | Operator::ToString | Operator::StrConcat => {
                // Unary and concat forms never reach the binary path.
                Vec::new()
            }
        };
        Ok(nodes)
    }

    fn translate_unary(
        &mut self,
        target: &str,
        operator: Operator,
        operand: &str,
    ) -> Result<(), MipsError> {
        if operator == Operator::ToString {
            return self.translate_to_string(target, operand);
        }

        let dest = self.acquire(target, true, &[])?;
        let src = self.load_operand(operand, &[dest.clone()])?;
        let nodes = match operator {
            Operator::Sub => arithmetic::negate(&dest, &src),
            Operator::Not => comparison::logical_not(&dest, &src),
            Operator::IntToFloat => int_to_float_nodes(&dest, &src),
            Operator::FloatToInt => float_to_int_nodes(&dest, &src),
            // Arrays carry no length header in the flat memory model.
            Operator::Len => vec![
                MipsNode::ins("li", &[&dest, "5"])
                    .with_comment(format!("len {operand} (placeholder)")),
            ],
            _ => Vec::new(),
        };
        self.emit_text_many(nodes);
        Ok(())
    }

    fn translate_simple_assignment(&mut self, target: &str, source: &str) -> Result<(), MipsError> {
        let dest = self.acquire(target, true, &[])?;
        if is_constant(source) {
            self.emit_text(
                MipsNode::ins("li", &[&dest, source]).with_comment(format!("{target} = {source}")),
            );
            return Ok(());
        }
        if source.starts_with('"') {
            let label = self.data.add_string_literal(source);
            self.emit_text(
                MipsNode::ins("la", &[&dest, &label]).with_comment(format!("{target} = {label}")),
            );
            self.mark_string(target);
            return Ok(());
        }
        if is_data_label(source) {
            self.emit_text(
                MipsNode::ins("la", &[&dest, source]).with_comment(format!("{target} = {source}")),
            );
            if source.starts_with("_str") {
                self.mark_string(target);
            }
            return Ok(());
        }

        let src = self.load_operand(source, &[dest.clone()])?;
        self.emit_text(
            MipsNode::ins("move", &[&dest, &src]).with_comment(format!("{target} = {source}")),
        );
        if self.is_string_operand(source) {
            self.mark_string(target);
        }
        Ok(())
    }

    /// `target = a str_concat b`: both operands are parked in callee-saved
    /// registers, non-strings run through `int_to_string`, then
    /// `string_concat` produces the buffer address.
    fn translate_str_concat(
        &mut self,
        target: &str,
        operand1: &str,
        operand2: &str,
    ) -> Result<(), MipsError> {
        let string1 = self.is_string_operand(operand1);
        let string2 = self.is_string_operand(operand2);

        // Resolve operand registers before touching $sp or the call
        // sequence; literal operands go straight to la below. $s0..$s2 are
        // the parking registers and must not hold the sources.
        let mut forbidden = vec!["$s0".to_string(), "$s1".to_string(), "$s2".to_string()];
        let src1 = if operand1.starts_with('"') || is_data_label(operand1) {
            None
        } else {
            let register = self.load_operand(operand1, &forbidden)?;
            forbidden.push(register.clone());
            Some(register)
        };
        let src2 = if operand2.starts_with('"') || is_data_label(operand2) {
            None
        } else {
            Some(self.load_operand(operand2, &forbidden)?)
        };

        let spills = self.allocator.spill_caller_saved();
        self.materialise_spills(&spills);

        self.emit_text_many(vec![
            MipsNode::ins("addi", &["$sp", "$sp", "-16"]).with_comment("save space for $ra and $s regs"),
            MipsNode::ins("sw", &["$ra", "12($sp)"]).with_comment("save $ra"),
            MipsNode::ins("sw", &["$s0", "8($sp)"]).with_comment("save $s0"),
            MipsNode::ins("sw", &["$s1", "4($sp)"]).with_comment("save $s1"),
            MipsNode::ins("sw", &["$s2", "0($sp)"]).with_comment("save $s2"),
        ]);

        // Park both values in $s0/$s1 first; the conversion calls below
        // clobber the caller-saved sources.
        self.park_concat_operand(operand1, src1.as_deref(), "$s0")?;
        self.park_concat_operand(operand2, src2.as_deref(), "$s1")?;
        if !string1 {
            self.emit_text_many(vec![
                MipsNode::ins("move", &["$a0", "$s0"]).with_comment("load value to convert"),
                MipsNode::ins("jal", &["int_to_string"]).with_comment("convert to string"),
                MipsNode::ins("move", &["$s0", "$v0"]).with_comment("save str1"),
            ]);
            self.labels.reference_label("int_to_string");
        }
        if !string2 {
            self.emit_text_many(vec![
                MipsNode::ins("move", &["$a0", "$s1"]).with_comment("load value to convert"),
                MipsNode::ins("jal", &["int_to_string"]).with_comment("convert to string"),
                MipsNode::ins("move", &["$s1", "$v0"]).with_comment("save str2"),
            ]);
            self.labels.reference_label("int_to_string");
        }

        self.emit_text_many(vec![
            MipsNode::ins("move", &["$a0", "$s0"]).with_comment("str1 to $a0"),
            MipsNode::ins("move", &["$a1", "$s1"]).with_comment("str2 to $a1"),
            MipsNode::ins("jal", &["string_concat"]).with_comment("call string concat"),
            MipsNode::ins("move", &["$v1", "$v0"]).with_comment("save result in $v1"),
            MipsNode::ins("lw", &["$s2", "0($sp)"]).with_comment("restore $s2"),
            MipsNode::ins("lw", &["$s1", "4($sp)"]).with_comment("restore $s1"),
            MipsNode::ins("lw", &["$s0", "8($sp)"]).with_comment("restore $s0"),
            MipsNode::ins("lw", &["$ra", "12($sp)"]).with_comment("restore $ra"),
            MipsNode::ins("addi", &["$sp", "$sp", "16"]).with_comment("deallocate space"),
        ]);
        self.labels.reference_label("string_concat");

        self.allocator.invalidate_caller_saved();
        let dest = self.acquire(target, true, &[])?;
        self.emit_text(MipsNode::ins("move", &[&dest, "$v1"]).with_comment("get result"));
        self.mark_string(target);
        Ok(())
    }

    fn park_concat_operand(
        &mut self,
        operand: &str,
        source_register: Option<&str>,
        parking: &str,
    ) -> Result<(), MipsError> {
        if operand.starts_with('"') {
            let label = self.data.add_string_literal(operand);
            self.emit_text(
                MipsNode::ins("la", &[parking, &label]).with_comment("load string label"),
            );
            return Ok(());
        }
        if is_data_label(operand) {
            self.emit_text(
                MipsNode::ins("la", &[parking, operand]).with_comment("load string label"),
            );
            return Ok(());
        }
        if let Some(source) = source_register {
            self.emit_text(MipsNode::ins("move", &[parking, source]));
        }
        Ok(())
    }

    /// `target = to_string x` through the int_to_string runtime helper.
    fn translate_to_string(&mut self, target: &str, operand: &str) -> Result<(), MipsError> {
        if self.is_string_operand(operand) {
            return self.translate_simple_assignment(target, operand);
        }
        let src = self.load_operand(operand, &[])?;
        let spills = self.allocator.spill_caller_saved();
        self.materialise_spills(&spills);
        self.emit_text_many(vec![
            MipsNode::ins("move", &["$a0", &src]).with_comment("value to convert"),
            MipsNode::ins("jal", &["int_to_string"]).with_comment("convert to string"),
        ]);
        self.labels.reference_label("int_to_string");
        self.allocator.invalidate_caller_saved();
        let dest = self.acquire(target, true, &[])?;
        self.emit_text(MipsNode::ins("move", &[&dest, "$v0"]).with_comment("string address"));
        self.mark_string(target);
        Ok(())
    }

    /// `target = allocate_array size, elem_size` via the sbrk-backed
    /// runtime helper.
    pub(crate) fn translate_allocate_array(
        &mut self,
        target: &str,
        size: &str,
        elem_size: u32,
    ) -> Result<(), MipsError> {
        let size_register = if is_constant(size) {
            None
        } else {
            Some(self.load_operand(size, &[])?)
        };

        let spills = self.allocator.spill_caller_saved();
        self.materialise_spills(&spills);

        match size_register {
            Some(register) => self.emit_text(
                MipsNode::ins("move", &["$a0", &register]).with_comment("array size"),
            ),
            None => {
                self.emit_text(MipsNode::ins("li", &["$a0", size]).with_comment("array size"))
            }
        }
        self.emit_text(
            MipsNode::ins("li", &["$a1", &elem_size.to_string()]).with_comment("element size"),
        );
        self.emit_text(MipsNode::ins("jal", &["allocate_array"]).with_comment("allocate array"));
        self.labels.reference_label("allocate_array");

        self.allocator.invalidate_caller_saved();
        let dest = self.acquire(target, true, &[])?;
        self.emit_text(MipsNode::ins("move", &[&dest, "$v0"]).with_comment("save array address"));
        Ok(())
    }

    /// Array reads and writes. Constant indices fold into the load/store
    /// offset; variable indices compute `base + index*4`.
    pub(crate) fn translate_array_access(
        &mut self,
        target: &str,
        array: &str,
        index: &str,
        is_assignment: bool,
    ) -> Result<(), MipsError> {
        let array_register = self.load_operand(array, &[])?;

        if let Ok(constant_index) = index.parse::<i32>() {
            let offset = constant_index * 4;
            if is_assignment {
                let value = self.load_operand(target, &[array_register.clone()])?;
                self.emit_text(
                    MipsNode::ins("sw", &[&value, &format!("{offset}({array_register})")])
                        .with_comment(format!("store to {array}[{index}]")),
                );
            } else {
                let dest = self.acquire(target, true, &[array_register.clone()])?;
                self.emit_text(
                    MipsNode::ins("lw", &[&dest, &format!("{offset}({array_register})")])
                        .with_comment(format!("load from {array}[{index}]")),
                );
            }
            return Ok(());
        }

        let index_register = self.load_operand(index, &[array_register.clone()])?;
        let forbidden = vec![array_register.clone(), index_register.clone()];
        let offset_register = self.scratch_register(&forbidden)?;
        self.emit_text(
            MipsNode::ins("sll", &[&offset_register, &index_register, "2"])
                .with_comment("offset = index * 4"),
        );
        let address_register = self.scratch_register(&forbidden)?;
        self.emit_text(
            MipsNode::ins("add", &[&address_register, &array_register, &offset_register])
                .with_comment("address = base + offset"),
        );
        self.allocator.release_register(&offset_register);

        if is_assignment {
            let value = self.load_operand(target, &[address_register.clone()])?;
            self.emit_text(
                MipsNode::ins("sw", &[&value, &format!("0({address_register})")])
                    .with_comment(format!("store to {array}[{index}]")),
            );
        } else {
            let dest = self.acquire(target, true, &[address_register.clone()])?;
            self.emit_text(
                MipsNode::ins("lw", &[&dest, &format!("0({address_register})")])
                    .with_comment(format!("load from {array}[{index}]")),
            );
        }
        self.allocator.release_register(&address_register);
        Ok(())
    }
}

/// Conversion stubs through the FPU; values stay in integer registers.
fn int_to_float_nodes(dest: &str, src: &str) -> Vec<MipsNode> {
    vec![
        MipsNode::ins("mtc1", &[src, "$f0"]).with_comment("move int to FPU"),
        MipsNode::ins("cvt.s.w", &["$f0", "$f0"]).with_comment("convert to float"),
        MipsNode::ins("mfc1", &[dest, "$f0"]).with_comment("move back to int reg"),
    ]
}

fn float_to_int_nodes(dest: &str, src: &str) -> Vec<MipsNode> {
    vec![
        MipsNode::ins("mtc1", &[src, "$f0"]).with_comment("move to FPU"),
        MipsNode::ins("cvt.w.s", &["$f0", "$f0"]).with_comment("convert to int"),
        MipsNode::ins("mfc1", &[dest, "$f0"]).with_comment("move back to int reg"),
    ]
}
