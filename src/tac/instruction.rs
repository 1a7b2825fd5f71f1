use std::fmt::{self, Display};
use strum_macros::{Display as StrumDisplay, EnumString};

/// Every operator that can appear in a TAC `Assign` or `IfGoto`, including
/// the pseudo-ops lowered to runtime calls or conversion stubs by the MIPS
/// backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString)]
pub enum Operator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "&")]
    BitAnd,
    #[strum(serialize = "|")]
    BitOr,
    #[strum(serialize = "^")]
    BitXor,
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "str_concat")]
    StrConcat,
    #[strum(serialize = "int_to_float")]
    IntToFloat,
    #[strum(serialize = "float_to_int")]
    FloatToInt,
    #[strum(serialize = "to_string")]
    ToString,
    #[strum(serialize = "len")]
    Len,
}

impl Operator {
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            Operator::Eq | Operator::Ne | Operator::Lt | Operator::Gt | Operator::Le | Operator::Ge
        )
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Operator::Add | Operator::Sub | Operator::Mul | Operator::Div | Operator::Mod
        )
    }
}

/// One three-address-code instruction. The `Display` impl renders the
/// canonical textual form, one instruction per line.
#[derive(Debug, Clone, PartialEq)]
pub enum TacInstruction {
    /// `x = y`, `x = op y`, or `x = y op z`.
    Assign {
        target: String,
        operand1: String,
        operator: Option<Operator>,
        operand2: Option<String>,
    },
    Goto {
        label: String,
    },
    /// `if x goto L` or `if x relop y goto L`.
    IfGoto {
        condition: String,
        operator: Option<Operator>,
        operand2: Option<String>,
        label: String,
    },
    Label {
        name: String,
    },
    BeginFunc {
        name: String,
        param_count: usize,
        frame_size: u32,
        param_names: Vec<String>,
    },
    EndFunc {
        name: String,
    },
    PushParam {
        value: String,
    },
    Call {
        function: String,
        param_count: usize,
        target: Option<String>,
    },
    PopParams {
        count: usize,
    },
    Return {
        value: Option<String>,
    },
    /// `target = array[index]` (read) or `array[index] = target` (write).
    ArrayAccess {
        target: String,
        array: String,
        index: String,
        is_assignment: bool,
    },
    /// `target = object.property` (read) or `object.property = target` (write).
    PropertyAccess {
        target: String,
        object: String,
        property: String,
        is_assignment: bool,
    },
    New {
        target: String,
        class_name: String,
    },
    AllocateArray {
        target: String,
        size: String,
        elem_size: u32,
    },
    Comment {
        text: String,
    },
}

impl TacInstruction {
    pub fn simple_assign(target: impl Into<String>, operand: impl Into<String>) -> Self {
        TacInstruction::Assign {
            target: target.into(),
            operand1: operand.into(),
            operator: None,
            operand2: None,
        }
    }

    pub fn unary_assign(
        target: impl Into<String>,
        operator: Operator,
        operand: impl Into<String>,
    ) -> Self {
        TacInstruction::Assign {
            target: target.into(),
            operand1: operand.into(),
            operator: Some(operator),
            operand2: None,
        }
    }

    pub fn binary_assign(
        target: impl Into<String>,
        operand1: impl Into<String>,
        operator: Operator,
        operand2: impl Into<String>,
    ) -> Self {
        TacInstruction::Assign {
            target: target.into(),
            operand1: operand1.into(),
            operator: Some(operator),
            operand2: Some(operand2.into()),
        }
    }

    pub fn comment(text: impl Into<String>) -> Self {
        TacInstruction::Comment { text: text.into() }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, TacInstruction::Comment { .. })
    }

    /// Label defined by this instruction, if any.
    pub fn defined_label(&self) -> Option<&str> {
        match self {
            TacInstruction::Label { name } => Some(name),
            _ => None,
        }
    }

    /// Label referenced (jumped to) by this instruction, if any.
    pub fn referenced_label(&self) -> Option<&str> {
        match self {
            TacInstruction::Goto { label } => Some(label),
            TacInstruction::IfGoto { label, .. } => Some(label),
            _ => None,
        }
    }
}

impl Display for TacInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TacInstruction::Assign {
                target,
                operand1,
                operator,
                operand2,
            } => match (operator, operand2) {
                (Some(op), Some(rhs)) => write!(f, "{target} = {operand1} {op} {rhs}"),
                (Some(op), None) => write!(f, "{target} = {op} {operand1}"),
                _ => write!(f, "{target} = {operand1}"),
            },
            TacInstruction::Goto { label } => write!(f, "goto {label}"),
            TacInstruction::IfGoto {
                condition,
                operator,
                operand2,
                label,
            } => match (operator, operand2) {
                (Some(op), Some(rhs)) => {
                    write!(f, "if {condition} {op} {rhs} goto {label}")
                }
                _ => write!(f, "if {condition} goto {label}"),
            },
            TacInstruction::Label { name } => write!(f, "{name}:"),
            TacInstruction::BeginFunc {
                name,
                param_count,
                frame_size,
                param_names,
            } => {
                write!(f, "BeginFunc {name}, {param_count}")?;
                if *frame_size > 0 {
                    write!(f, ", frame_size={frame_size}")?;
                }
                if !param_names.is_empty() {
                    write!(f, ", params=[{}]", param_names.join(","))?;
                }
                Ok(())
            }
            TacInstruction::EndFunc { name } => write!(f, "EndFunc {name}"),
            TacInstruction::PushParam { value } => write!(f, "PushParam {value}"),
            TacInstruction::Call {
                function,
                param_count,
                target,
            } => match target {
                Some(target) => write!(f, "{target} = call {function}, {param_count}"),
                None => write!(f, "call {function}, {param_count}"),
            },
            TacInstruction::PopParams { count } => write!(f, "PopParams {count}"),
            TacInstruction::Return { value } => match value {
                Some(value) => write!(f, "return {value}"),
                None => write!(f, "return"),
            },
            TacInstruction::ArrayAccess {
                target,
                array,
                index,
                is_assignment,
            } => {
                if *is_assignment {
                    write!(f, "{array}[{index}] = {target}")
                } else {
                    write!(f, "{target} = {array}[{index}]")
                }
            }
            TacInstruction::PropertyAccess {
                target,
                object,
                property,
                is_assignment,
            } => {
                if *is_assignment {
                    write!(f, "{object}.{property} = {target}")
                } else {
                    write!(f, "{target} = {object}.{property}")
                }
            }
            TacInstruction::New { target, class_name } => {
                write!(f, "{target} = new {class_name}")
            }
            TacInstruction::AllocateArray {
                target,
                size,
                elem_size,
            } => write!(f, "{target} = allocate_array {size}, {elem_size}"),
            TacInstruction::Comment { text } => write!(f, "# {text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_forms_render() {
        assert_eq!(TacInstruction::simple_assign("x", "y").to_string(), "x = y");
        assert_eq!(
            TacInstruction::unary_assign("x", Operator::Sub, "y").to_string(),
            "x = - y"
        );
        assert_eq!(
            TacInstruction::binary_assign("x", "y", Operator::Add, "z").to_string(),
            "x = y + z"
        );
        assert_eq!(
            TacInstruction::binary_assign("t1", "a", Operator::StrConcat, "b").to_string(),
            "t1 = a str_concat b"
        );
    }

    #[test]
    fn control_flow_forms_render() {
        assert_eq!(
            TacInstruction::Goto {
                label: "L1".into()
            }
            .to_string(),
            "goto L1"
        );
        assert_eq!(
            TacInstruction::IfGoto {
                condition: "t1".into(),
                operator: Some(Operator::Eq),
                operand2: Some("0".into()),
                label: "L2".into(),
            }
            .to_string(),
            "if t1 == 0 goto L2"
        );
        assert_eq!(
            TacInstruction::Label { name: "L2".into() }.to_string(),
            "L2:"
        );
    }

    #[test]
    fn function_forms_render() {
        assert_eq!(
            TacInstruction::BeginFunc {
                name: "factorial".into(),
                param_count: 1,
                frame_size: 0,
                param_names: vec!["n".into()],
            }
            .to_string(),
            "BeginFunc factorial, 1, params=[n]"
        );
        assert_eq!(
            TacInstruction::BeginFunc {
                name: "main".into(),
                param_count: 0,
                frame_size: 24,
                param_names: vec![],
            }
            .to_string(),
            "BeginFunc main, 0, frame_size=24"
        );
        assert_eq!(
            TacInstruction::Call {
                function: "factorial".into(),
                param_count: 1,
                target: Some("t3".into()),
            }
            .to_string(),
            "t3 = call factorial, 1"
        );
    }

    #[test]
    fn memory_forms_render() {
        assert_eq!(
            TacInstruction::ArrayAccess {
                target: "t1".into(),
                array: "arr".into(),
                index: "i".into(),
                is_assignment: false,
            }
            .to_string(),
            "t1 = arr[i]"
        );
        assert_eq!(
            TacInstruction::ArrayAccess {
                target: "t1".into(),
                array: "arr".into(),
                index: "0".into(),
                is_assignment: true,
            }
            .to_string(),
            "arr[0] = t1"
        );
        assert_eq!(
            TacInstruction::PropertyAccess {
                target: "t2".into(),
                object: "this".into(),
                property: "x".into(),
                is_assignment: false,
            }
            .to_string(),
            "t2 = this.x"
        );
        assert_eq!(
            TacInstruction::New {
                target: "t1".into(),
                class_name: "Point".into(),
            }
            .to_string(),
            "t1 = new Point"
        );
        assert_eq!(
            TacInstruction::AllocateArray {
                target: "t1".into(),
                size: "5".into(),
                elem_size: 4,
            }
            .to_string(),
            "t1 = allocate_array 5, 4"
        );
    }
}
