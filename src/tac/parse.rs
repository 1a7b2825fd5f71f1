//! Parser for the canonical textual TAC form, one instruction per line.
//! Lines are tokenized with logos and matched against the instruction
//! shapes; rendering an instruction and re-parsing it yields an equal
//! instruction.

use crate::tac::instruction::{Operator, TacInstruction};
use logos::Logos;
use std::fmt::{self, Display};
use std::str::FromStr;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
enum Token {
    #[token("BeginFunc")]
    BeginFunc,
    #[token("EndFunc")]
    EndFunc,
    #[token("PushParam")]
    PushParam,
    #[token("PopParams")]
    PopParams,
    #[token("call")]
    Call,
    #[token("return")]
    Return,
    #[token("goto")]
    Goto,
    #[token("if")]
    If,
    #[token("new")]
    New,
    #[token("allocate_array")]
    AllocateArray,
    #[token("frame_size")]
    FrameSize,
    #[token("params")]
    Params,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(".")]
    Dot,
    #[regex(r"-?[0-9]+(\.[0-9]+)?", |lex| lex.slice().to_owned())]
    Number(String),
    #[regex(r#""([^"\\]|\\.)*""#, |lex| lex.slice().to_owned())]
    Str(String),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned())]
    Ident(String),
    #[regex(r"==|!=|<=|>=|<|>|&&|\|\||\+|-|\*|/|%|&|\||\^|!|=", |lex| lex.slice().to_owned())]
    Op(String),
}

impl Token {
    /// Anything usable as an operand: identifier, number or string literal.
    fn operand(&self) -> Option<String> {
        match self {
            Token::Ident(text) | Token::Number(text) | Token::Str(text) => Some(text.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TacParseError {
    InvalidToken { line: usize },
    UnrecognizedLine { line: usize, text: String },
}

impl Display for TacParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TacParseError::InvalidToken { line } => {
                write!(f, "line {line}: invalid token")
            }
            TacParseError::UnrecognizedLine { line, text } => {
                write!(f, "line {line}: unrecognized TAC instruction: {text}")
            }
        }
    }
}

impl std::error::Error for TacParseError {}

/// Parse a whole TAC listing. `#`-prefixed lines become comments, blank
/// lines are skipped.
pub fn parse_tac_text(text: &str) -> Result<Vec<TacInstruction>, TacParseError> {
    let mut instructions = Vec::new();
    for (index, raw_line) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            instructions.push(TacInstruction::comment(comment.trim()));
            continue;
        }
        instructions.push(parse_line(line, line_number)?);
    }
    Ok(instructions)
}

fn parse_line(line: &str, line_number: usize) -> Result<TacInstruction, TacParseError> {
    let tokens: Vec<Token> = Token::lexer(line)
        .collect::<Result<_, _>>()
        .map_err(|_| TacParseError::InvalidToken { line: line_number })?;

    parse_tokens(&tokens).ok_or_else(|| TacParseError::UnrecognizedLine {
        line: line_number,
        text: line.to_string(),
    })
}

fn parse_tokens(tokens: &[Token]) -> Option<TacInstruction> {
    use Token::*;

    match tokens {
        [Ident(name), Colon] => Some(TacInstruction::Label { name: name.clone() }),
        [Goto, Ident(label)] => Some(TacInstruction::Goto {
            label: label.clone(),
        }),
        [EndFunc, Ident(name)] => Some(TacInstruction::EndFunc { name: name.clone() }),
        [BeginFunc, Ident(name), Comma, Number(count), rest @ ..] => {
            parse_begin_func(name, count, rest)
        }
        [PushParam, value] => Some(TacInstruction::PushParam {
            value: value.operand()?,
        }),
        [PopParams, Number(count)] => Some(TacInstruction::PopParams {
            count: count.parse().ok()?,
        }),
        [Ident(target), Op(eq), Call, Ident(function), Comma, Number(count)] if eq == "=" => {
            Some(TacInstruction::Call {
                function: function.clone(),
                param_count: count.parse().ok()?,
                target: Some(target.clone()),
            })
        }
        [Call, Ident(function), Comma, Number(count)] => Some(TacInstruction::Call {
            function: function.clone(),
            param_count: count.parse().ok()?,
            target: None,
        }),
        [Return] => Some(TacInstruction::Return { value: None }),
        [Return, value] => Some(TacInstruction::Return {
            value: Some(value.operand()?),
        }),
        [If, condition, Op(relop), operand2, Goto, Ident(label)] => {
            let operator = Operator::from_str(relop).ok()?;
            operator.is_relational().then(|| TacInstruction::IfGoto {
                condition: condition.operand().unwrap_or_default(),
                operator: Some(operator),
                operand2: operand2.operand(),
                label: label.clone(),
            })
        }
        [If, condition, Goto, Ident(label)] => Some(TacInstruction::IfGoto {
            condition: condition.operand()?,
            operator: None,
            operand2: None,
            label: label.clone(),
        }),
        [Ident(target), Op(eq), Ident(array), LBracket, index, RBracket] if eq == "=" => {
            Some(TacInstruction::ArrayAccess {
                target: target.clone(),
                array: array.clone(),
                index: index.operand()?,
                is_assignment: false,
            })
        }
        [Ident(array), LBracket, index, RBracket, Op(eq), value] if eq == "=" => {
            Some(TacInstruction::ArrayAccess {
                target: value.operand()?,
                array: array.clone(),
                index: index.operand()?,
                is_assignment: true,
            })
        }
        [Ident(target), Op(eq), Ident(object), Dot, Ident(property)] if eq == "=" => {
            Some(TacInstruction::PropertyAccess {
                target: target.clone(),
                object: object.clone(),
                property: property.clone(),
                is_assignment: false,
            })
        }
        [Ident(object), Dot, Ident(property), Op(eq), value] if eq == "=" => {
            Some(TacInstruction::PropertyAccess {
                target: value.operand()?,
                object: object.clone(),
                property: property.clone(),
                is_assignment: true,
            })
        }
        [Ident(target), Op(eq), New, Ident(class_name)] if eq == "=" => {
            Some(TacInstruction::New {
                target: target.clone(),
                class_name: class_name.clone(),
            })
        }
        [Ident(target), Op(eq), AllocateArray, size, Comma, Number(elem_size)] if eq == "=" => {
            Some(TacInstruction::AllocateArray {
                target: target.clone(),
                size: size.operand()?,
                elem_size: elem_size.parse().ok()?,
            })
        }
        [Ident(target), Op(eq), operand1, Op(op), operand2] if eq == "=" => {
            let operator = Operator::from_str(op).ok()?;
            Some(TacInstruction::Assign {
                target: target.clone(),
                operand1: operand1.operand()?,
                operator: Some(operator),
                operand2: operand2.operand(),
            })
        }
        // Pseudo-operators (str_concat, int_to_float, ...) lex as idents.
        [Ident(target), Op(eq), operand1, Ident(op), operand2] if eq == "=" => {
            let operator = Operator::from_str(op).ok()?;
            Some(TacInstruction::Assign {
                target: target.clone(),
                operand1: operand1.operand()?,
                operator: Some(operator),
                operand2: operand2.operand(),
            })
        }
        [Ident(target), Op(eq), Op(op), operand] if eq == "=" => {
            let operator = Operator::from_str(op).ok()?;
            Some(TacInstruction::Assign {
                target: target.clone(),
                operand1: operand.operand()?,
                operator: Some(operator),
                operand2: None,
            })
        }
        [Ident(target), Op(eq), Ident(op), operand]
            if eq == "=" && Operator::from_str(op).is_ok() =>
        {
            Some(TacInstruction::Assign {
                target: target.clone(),
                operand1: operand.operand()?,
                operator: Operator::from_str(op).ok(),
                operand2: None,
            })
        }
        [Ident(target), Op(eq), value] if eq == "=" => Some(TacInstruction::Assign {
            target: target.clone(),
            operand1: value.operand()?,
            operator: None,
            operand2: None,
        }),
        _ => None,
    }
}

fn parse_begin_func(name: &str, count: &str, rest: &[Token]) -> Option<TacInstruction> {
    use Token::*;

    let mut frame_size = 0;
    let mut param_names = Vec::new();
    let mut remaining = rest;
    loop {
        match remaining {
            [] => break,
            [Comma, FrameSize, Op(eq), Number(size), tail @ ..] if eq == "=" => {
                frame_size = size.parse().ok()?;
                remaining = tail;
            }
            [Comma, Params, Op(eq), LBracket, tail @ ..] if eq == "=" => {
                let mut tail = tail;
                loop {
                    match tail {
                        [RBracket, after @ ..] => {
                            remaining = after;
                            break;
                        }
                        [Ident(param), Comma, after @ ..] | [Ident(param), after @ ..] => {
                            param_names.push(param.clone());
                            tail = after;
                        }
                        _ => return None,
                    }
                }
            }
            _ => return None,
        }
    }

    Some(TacInstruction::BeginFunc {
        name: name.to_string(),
        param_count: count.parse().ok()?,
        frame_size,
        param_names,
    })
}
