//! Expression lowering: each function returns the operand name holding the
//! value (a variable, a literal in textual form, or a fresh temporary).

use crate::ast::tree::{BinaryOperator, Expr, ExprData, UnaryOperator};
use crate::ast::types::TypeRef;
use crate::tac::generator::ProgramTacGenerator;
use crate::tac::instruction::{Operator, TacInstruction};
use crate::tac::TacError;

fn binary_operator(op: BinaryOperator) -> Operator {
    match op {
        BinaryOperator::Add => Operator::Add,
        BinaryOperator::Sub => Operator::Sub,
        BinaryOperator::Mul => Operator::Mul,
        BinaryOperator::Div => Operator::Div,
        BinaryOperator::Mod => Operator::Mod,
        BinaryOperator::Eq => Operator::Eq,
        BinaryOperator::Ne => Operator::Ne,
        BinaryOperator::Lt => Operator::Lt,
        BinaryOperator::Gt => Operator::Gt,
        BinaryOperator::Le => Operator::Le,
        BinaryOperator::Ge => Operator::Ge,
        BinaryOperator::And => Operator::And,
        BinaryOperator::Or => Operator::Or,
        BinaryOperator::BitAnd => Operator::BitAnd,
        BinaryOperator::BitOr => Operator::BitOr,
        BinaryOperator::BitXor => Operator::BitXor,
    }
}

/// Render a float literal so it stays recognizable as a float in TAC.
fn format_float(value: f64) -> String {
    let text = format!("{value}");
    if text.contains('.') || text.contains('e') || text.contains("inf") || text.contains("NaN") {
        text
    } else {
        format!("{text}.0")
    }
}

impl ProgramTacGenerator {
    pub fn lower_expr(&mut self, expr: &Expr) -> Result<String, TacError> {
        match &expr.data {
            ExprData::IntLiteral(value) => Ok(value.to_string()),
            ExprData::FloatLiteral(value) => Ok(format_float(*value)),
            ExprData::StringLiteral(value) => Ok(format!("\"{value}\"")),
            ExprData::BoolLiteral(value) => Ok(if *value { "true" } else { "false" }.to_string()),
            ExprData::NullLiteral => Ok("null".to_string()),
            ExprData::Variable(name) => Ok(name.clone()),
            ExprData::This => Ok("this".to_string()),
            ExprData::Binary {
                left,
                operator,
                right,
            } => {
                self.validate_binary_types(left, *operator, right, expr)?;
                match operator {
                    BinaryOperator::And | BinaryOperator::Or => {
                        self.lower_short_circuit(left, *operator, right)
                    }
                    _ => self.lower_simple_binary(left, *operator, right),
                }
            }
            ExprData::Unary { operator, operand } => {
                let operand_result = self.lower_expr(operand)?;
                let result = self.new_temp();
                let op = match operator {
                    UnaryOperator::Neg => Operator::Sub,
                    UnaryOperator::Not => Operator::Not,
                };
                self.emit(TacInstruction::unary_assign(&result, op, operand_result));
                Ok(result)
            }
            ExprData::Ternary {
                condition,
                if_true,
                if_false,
            } => self.lower_ternary(condition, if_true, if_false),
            ExprData::Call { .. } => {
                let name = call_display_name(expr);
                self.lower_call(expr)?
                    .ok_or(TacError::VoidValueUsed {
                        name,
                        loc: expr.loc,
                    })
            }
            ExprData::Index { array, index } => {
                let array_result = self.lower_expr(array)?;
                let index_result = self.lower_expr(index)?;
                let result = self.new_temp();
                self.emit(TacInstruction::ArrayAccess {
                    target: result.clone(),
                    array: array_result,
                    index: index_result,
                    is_assignment: false,
                });
                Ok(result)
            }
            ExprData::Property { object, property } => {
                let object_result = self.lower_expr(object)?;
                let result = self.new_temp();
                self.emit(TacInstruction::PropertyAccess {
                    target: result.clone(),
                    object: object_result,
                    property: property.clone(),
                    is_assignment: false,
                });
                Ok(result)
            }
            ExprData::ArrayLiteral(elements) => self.lower_array_literal(elements),
            ExprData::New {
                class_name,
                arguments,
            } => self.lower_new(class_name, arguments, expr),
        }
    }

    /// `target = value` for variables, indexed slots and properties.
    pub fn lower_assignment(&mut self, target: &Expr, value: &Expr) -> Result<String, TacError> {
        let value_result = self.lower_expr(value)?;
        match &target.data {
            ExprData::Variable(name) => {
                self.emit(TacInstruction::simple_assign(name, &value_result));
                Ok(name.clone())
            }
            ExprData::Index { array, index } => {
                let array_result = self.lower_expr(array)?;
                let index_result = self.lower_expr(index)?;
                self.emit(TacInstruction::ArrayAccess {
                    target: value_result.clone(),
                    array: array_result,
                    index: index_result,
                    is_assignment: true,
                });
                Ok(value_result)
            }
            ExprData::Property { object, property } => {
                let object_result = self.lower_expr(object)?;
                self.emit(TacInstruction::PropertyAccess {
                    target: value_result.clone(),
                    object: object_result,
                    property: property.clone(),
                    is_assignment: true,
                });
                Ok(value_result)
            }
            _ => Err(TacError::InvalidAssignmentTarget { loc: target.loc }),
        }
    }

    fn lower_simple_binary(
        &mut self,
        left: &Expr,
        operator: BinaryOperator,
        right: &Expr,
    ) -> Result<String, TacError> {
        let mut left_result = self.lower_expr(left)?;
        let mut right_result = self.lower_expr(right)?;

        if operator == BinaryOperator::Add && is_string_operation(left, right) {
            let result = self.new_temp();
            self.emit(TacInstruction::comment("String concatenation"));
            self.emit(TacInstruction::binary_assign(
                &result,
                left_result,
                Operator::StrConcat,
                right_result,
            ));
            return Ok(result);
        }

        if operator.is_arithmetic() {
            (left_result, right_result) =
                self.promote_numeric_operands(left, right, left_result, right_result);
        }

        let result = self.new_temp();
        self.emit(TacInstruction::binary_assign(
            &result,
            left_result,
            binary_operator(operator),
            right_result,
        ));
        Ok(result)
    }

    /// `&&` and `||` expand into conditional jumps so the right operand is
    /// only evaluated when the left one does not decide the result.
    fn lower_short_circuit(
        &mut self,
        left: &Expr,
        operator: BinaryOperator,
        right: &Expr,
    ) -> Result<String, TacError> {
        let result = self.new_temp();
        let end_label = self.new_label("bool_end");

        match operator {
            BinaryOperator::And => {
                let left_result = self.lower_expr(left)?;
                let false_label = self.new_label("and_false");
                self.emit(TacInstruction::IfGoto {
                    condition: left_result,
                    operator: Some(Operator::Eq),
                    operand2: Some("0".to_string()),
                    label: false_label.clone(),
                });
                let right_result = self.lower_expr(right)?;
                self.emit(TacInstruction::simple_assign(&result, right_result));
                self.emit(TacInstruction::Goto {
                    label: end_label.clone(),
                });
                self.emit(TacInstruction::Label { name: false_label });
                self.emit(TacInstruction::simple_assign(&result, "0"));
            }
            BinaryOperator::Or => {
                let left_result = self.lower_expr(left)?;
                let true_label = self.new_label("or_true");
                self.emit(TacInstruction::IfGoto {
                    condition: left_result,
                    operator: Some(Operator::Ne),
                    operand2: Some("0".to_string()),
                    label: true_label.clone(),
                });
                let right_result = self.lower_expr(right)?;
                self.emit(TacInstruction::simple_assign(&result, right_result));
                self.emit(TacInstruction::Goto {
                    label: end_label.clone(),
                });
                self.emit(TacInstruction::Label { name: true_label });
                self.emit(TacInstruction::simple_assign(&result, "1"));
            }
            _ => unreachable!("short-circuit lowering only handles && and ||"),
        }

        self.emit(TacInstruction::Label { name: end_label });
        Ok(result)
    }

    fn lower_ternary(
        &mut self,
        condition: &Expr,
        if_true: &Expr,
        if_false: &Expr,
    ) -> Result<String, TacError> {
        let condition_result = self.lower_expr(condition)?;
        let result = self.new_temp();
        let false_label = self.new_label("ternary_false");
        let end_label = self.new_label("ternary_end");

        self.emit(TacInstruction::IfGoto {
            condition: condition_result,
            operator: Some(Operator::Eq),
            operand2: Some("0".to_string()),
            label: false_label.clone(),
        });
        let true_result = self.lower_expr(if_true)?;
        self.emit(TacInstruction::simple_assign(&result, true_result));
        self.emit(TacInstruction::Goto {
            label: end_label.clone(),
        });
        self.emit(TacInstruction::Label { name: false_label });
        let false_result = self.lower_expr(if_false)?;
        self.emit(TacInstruction::simple_assign(&result, false_result));
        self.emit(TacInstruction::Label { name: end_label });
        Ok(result)
    }

    fn lower_array_literal(&mut self, elements: &[Expr]) -> Result<String, TacError> {
        let result = self.new_temp();
        self.emit(TacInstruction::comment(format!(
            "Array literal with {} elements",
            elements.len()
        )));
        self.emit(TacInstruction::AllocateArray {
            target: result.clone(),
            size: elements.len().to_string(),
            elem_size: 4,
        });
        for (index, element) in elements.iter().enumerate() {
            let element_result = self.lower_expr(element)?;
            self.emit(TacInstruction::ArrayAccess {
                target: element_result,
                array: result.clone(),
                index: index.to_string(),
                is_assignment: true,
            });
        }
        Ok(result)
    }

    /// `new C(args)`: allocate, then call the nearest constructor with the
    /// instance as the leading parameter.
    fn lower_new(
        &mut self,
        class_name: &str,
        arguments: &[Expr],
        expr: &Expr,
    ) -> Result<String, TacError> {
        let class = self
            .classes
            .get(class_name)
            .cloned()
            .ok_or_else(|| TacError::UnknownClass {
                name: class_name.to_string(),
                loc: expr.loc,
            })?;

        let instance = self.new_temp();
        self.emit(TacInstruction::comment(format!(
            "Create new instance of {class_name}"
        )));
        self.emit(TacInstruction::New {
            target: instance.clone(),
            class_name: class_name.to_string(),
        });

        // Without an explicit constructor but with arguments, the nearest
        // defining superclass takes the call.
        let mut constructor = format!("{class_name}_constructor");
        if !class.has_explicit_constructor && !arguments.is_empty() {
            let mut ancestor = class.superclass.clone();
            while let Some(parent) = ancestor {
                let candidate = self.classes.get(&parent).cloned();
                match candidate {
                    Some(info) if info.has_explicit_constructor => {
                        constructor = format!("{parent}_constructor");
                        break;
                    }
                    Some(info) => ancestor = info.superclass,
                    None => break,
                }
            }
        }

        // Arguments are fully evaluated before any PushParam so nested
        // calls cannot interleave their parameter queues with this one.
        let mut argument_results = Vec::new();
        for argument in arguments {
            argument_results.push(self.lower_expr(argument)?);
        }
        self.emit(TacInstruction::PushParam {
            value: instance.clone(),
        });
        for value in argument_results.clone() {
            self.emit(TacInstruction::PushParam { value });
        }

        let result = self.new_temp();
        let total_params = arguments.len() + 1;
        self.emit(TacInstruction::Call {
            function: constructor,
            param_count: total_params,
            target: Some(result.clone()),
        });
        self.emit(TacInstruction::PopParams {
            count: total_params,
        });

        for value in argument_results {
            self.release_if_temp(&value);
        }
        self.release_if_temp(&instance);
        Ok(result)
    }

    fn promote_numeric_operands(
        &mut self,
        left: &Expr,
        right: &Expr,
        left_result: String,
        right_result: String,
    ) -> (String, String) {
        let (Some(left_type), Some(right_type)) = (&left.resolved_type, &right.resolved_type)
        else {
            return (left_result, right_result);
        };
        if left_type == right_type {
            return (left_result, right_result);
        }
        if is_integer(left_type) && is_float(right_type) {
            let converted = self.convert(left_result, Operator::IntToFloat);
            (converted, right_result)
        } else if is_float(left_type) && is_integer(right_type) {
            let converted = self.convert(right_result, Operator::IntToFloat);
            (left_result, converted)
        } else {
            (left_result, right_result)
        }
    }

    fn convert(&mut self, value: String, operator: Operator) -> String {
        let result = self.new_temp();
        self.emit(TacInstruction::unary_assign(&result, operator, value));
        result
    }

    /// Operand-type validation. Skipped when the analyzer supplied no types.
    fn validate_binary_types(
        &self,
        left: &Expr,
        operator: BinaryOperator,
        right: &Expr,
        expr: &Expr,
    ) -> Result<(), TacError> {
        let (Some(left_type), Some(right_type)) = (&left.resolved_type, &right.resolved_type)
        else {
            return Ok(());
        };

        if left_type.is_string() || right_type.is_string() {
            if operator != BinaryOperator::Add {
                return Err(TacError::StringOperand {
                    operator,
                    loc: expr.loc,
                });
            }
            return Ok(());
        }

        if left_type.is_boolean() || right_type.is_boolean() {
            if !(operator.is_logical() || operator.is_equality()) {
                return Err(TacError::BooleanOperand {
                    operator,
                    loc: expr.loc,
                });
            }
            return Ok(());
        }

        if operator.is_arithmetic() && !(left_type.is_numeric() && right_type.is_numeric()) {
            return Err(TacError::NonNumericOperand {
                operator,
                loc: expr.loc,
            });
        }

        if operator.is_relational() && !(left_type.is_numeric() && right_type.is_numeric()) {
            return Err(TacError::NonNumericOperand {
                operator,
                loc: expr.loc,
            });
        }

        Ok(())
    }
}

fn is_integer(type_ref: &TypeRef) -> bool {
    !type_ref.is_array() && type_ref.base == "integer"
}

fn is_float(type_ref: &TypeRef) -> bool {
    !type_ref.is_array() && type_ref.base == "float"
}

fn is_string_operation(left: &Expr, right: &Expr) -> bool {
    let typed_string = |e: &Expr| e.resolved_type.as_ref().is_some_and(|t| t.is_string());
    let literal_string = |e: &Expr| matches!(e.data, ExprData::StringLiteral(_));
    typed_string(left) || typed_string(right) || literal_string(left) || literal_string(right)
}

fn call_display_name(expr: &Expr) -> String {
    match &expr.data {
        ExprData::Call { callee, .. } => match &callee.data {
            ExprData::Variable(name) => name.clone(),
            ExprData::Property { property, .. } => property.clone(),
            _ => "<expression>".to_string(),
        },
        _ => "<expression>".to_string(),
    }
}
