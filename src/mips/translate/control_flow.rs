//! Goto, conditional branch and label translation. Every transfer of
//! control is a basic-block boundary: dirty registers are flushed first so
//! all paths agree on memory state.

use crate::mips::generator::MipsGenerator;
use crate::mips::instruction::MipsNode;
use crate::mips::MipsError;
use crate::tac::instruction::Operator;

impl MipsGenerator {
    pub(crate) fn translate_goto(&mut self, label: &str) -> Result<(), MipsError> {
        self.spill_at_boundary();
        self.labels.reference_label(label);
        self.emit_text(MipsNode::ins("j", &[label]).with_comment(format!("goto {label}")));
        Ok(())
    }

    pub(crate) fn translate_if_goto(
        &mut self,
        condition: &str,
        operator: Option<Operator>,
        operand2: Option<&str>,
        label: &str,
    ) -> Result<(), MipsError> {
        match (operator, operand2) {
            (Some(operator), Some(operand2)) => {
                self.translate_relational_branch(condition, operator, operand2, label)
            }
            _ => self.translate_simple_branch(condition, label),
        }
    }

    /// A label starts a new block: flush the fall-through state before
    /// defining it. The function entry label was already defined by
    /// `BeginFunc` and is skipped; names are sanitized the same way
    /// function names are so the two always agree.
    pub(crate) fn translate_label(&mut self, name: &str) -> Result<(), MipsError> {
        let sanitized = crate::mips::calling_convention::sanitize_function_name(name);
        if self.entry_label.as_deref() == Some(&sanitized) && self.labels.is_defined(&sanitized) {
            return Ok(());
        }
        self.spill_at_boundary();
        self.emit_label(&sanitized)?;
        Ok(())
    }

    /// `if x goto L`: branch on non-zero.
    fn translate_simple_branch(&mut self, condition: &str, label: &str) -> Result<(), MipsError> {
        let register = self.load_operand(condition, &[])?;
        self.spill_at_boundary();
        self.labels.reference_label(label);
        self.emit_text(
            MipsNode::ins("bnez", &[&register, label])
                .with_comment(format!("if {condition} goto {label}")),
        );
        Ok(())
    }

    /// `if x relop y goto L`. Equality maps onto beq/bne; the orderings go
    /// through slt with a scratch register.
    fn translate_relational_branch(
        &mut self,
        left: &str,
        operator: Operator,
        right: &str,
        label: &str,
    ) -> Result<(), MipsError> {
        let left_register = self.load_operand(left, &[])?;
        let right_register = self.load_operand(right, &[left_register.clone()])?;
        let comment = format!("if {left} {operator} {right} goto {label}");

        match operator {
            Operator::Eq | Operator::Ne => {
                self.spill_at_boundary();
                self.labels.reference_label(label);
                let opcode = if operator == Operator::Eq { "beq" } else { "bne" };
                self.emit_text(
                    MipsNode::ins(opcode, &[&left_register, &right_register, label])
                        .with_comment(comment),
                );
                Ok(())
            }
            Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => {
                // slt operand order and branch sense per relation:
                //   <  : slt l, r  bnez      >= : slt l, r  beqz
                //   >  : slt r, l  bnez      <= : slt r, l  beqz
                let (first, second, branch) = match operator {
                    Operator::Lt => (&left_register, &right_register, "bnez"),
                    Operator::Ge => (&left_register, &right_register, "beqz"),
                    Operator::Gt => (&right_register, &left_register, "bnez"),
                    _ => (&right_register, &left_register, "beqz"),
                };
                let forbidden = vec![left_register.clone(), right_register.clone()];
                self.spill_at_boundary();
                let temp = self.scratch_register(&forbidden)?;
                self.labels.reference_label(label);
                self.emit_text(
                    MipsNode::ins("slt", &[&temp, first, second])
                        .with_comment(format!("{first} < {second}")),
                );
                self.emit_text(MipsNode::ins(branch, &[&temp, label]).with_comment(comment));
                self.allocator.release_register(&temp);
                Ok(())
            }
            _ => {
                // Non-relational operators never appear in IfGoto; fall
                // back to a plain non-zero test on the condition.
                self.translate_simple_branch(left, label)
            }
        }
    }
}
