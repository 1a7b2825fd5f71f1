use crate::ast::types::TypeRef;
use serde::{Deserialize, Serialize};

/// Source position attached to AST nodes by the front end (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLoc {
    pub line: u32,
    pub column: u32,
}

impl SourceLoc {
    pub fn new(line: u32, column: u32) -> Self {
        SourceLoc { line, column }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
}

impl BinaryOperator {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Sub
                | BinaryOperator::Mul
                | BinaryOperator::Div
                | BinaryOperator::Mod
        )
    }

    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Lt | BinaryOperator::Gt | BinaryOperator::Le | BinaryOperator::Ge
        )
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, BinaryOperator::Eq | BinaryOperator::Ne)
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::Le => "<=",
            BinaryOperator::Ge => ">=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Neg,
    Not,
}

/// An expression node. The semantic analyzer guarantees that every
/// expression relevant to lowering carries a resolved type.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub data: ExprData,
    pub resolved_type: Option<TypeRef>,
    pub loc: Option<SourceLoc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprData {
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    BoolLiteral(bool),
    NullLiteral,
    Variable(String),
    This,
    Binary {
        left: Box<Expr>,
        operator: BinaryOperator,
        right: Box<Expr>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
    Index {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    Property {
        object: Box<Expr>,
        property: String,
    },
    ArrayLiteral(Vec<Expr>),
    New {
        class_name: String,
        arguments: Vec<Expr>,
    },
}

impl ExprData {
    pub fn untyped(self) -> Expr {
        Expr {
            data: self,
            resolved_type: None,
            loc: None,
        }
    }

    pub fn typed(self, resolved_type: TypeRef) -> Expr {
        Expr {
            data: self,
            resolved_type: Some(resolved_type),
            loc: None,
        }
    }
}

impl Expr {
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.loc = Some(SourceLoc::new(line, column));
        self
    }

    pub fn int(value: i64) -> Expr {
        ExprData::IntLiteral(value).typed(TypeRef::integer())
    }

    pub fn float(value: f64) -> Expr {
        ExprData::FloatLiteral(value).typed(TypeRef::float())
    }

    pub fn string(value: impl Into<String>) -> Expr {
        ExprData::StringLiteral(value.into()).typed(TypeRef::string())
    }

    pub fn boolean(value: bool) -> Expr {
        ExprData::BoolLiteral(value).typed(TypeRef::boolean())
    }

    pub fn var(name: impl Into<String>) -> Expr {
        ExprData::Variable(name.into()).untyped()
    }

    pub fn typed_var(name: impl Into<String>, resolved_type: TypeRef) -> Expr {
        ExprData::Variable(name.into()).typed(resolved_type)
    }

    pub fn binary(left: Expr, operator: BinaryOperator, right: Expr) -> Expr {
        ExprData::Binary {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
        .untyped()
    }

    pub fn call(name: impl Into<String>, arguments: Vec<Expr>) -> Expr {
        ExprData::Call {
            callee: Box::new(Expr::var(name)),
            arguments,
        }
        .untyped()
    }
}

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub data: StmtData,
    pub loc: Option<SourceLoc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtData {
    Expression(Expr),
    VarDecl {
        name: String,
        declared_type: Option<TypeRef>,
        initializer: Option<Expr>,
        is_const: bool,
    },
    Assignment {
        target: Expr,
        value: Expr,
    },
    Block(Block),
    If {
        condition: Expr,
        then_branch: Block,
        else_branch: Option<Block>,
    },
    While {
        condition: Expr,
        body: Block,
    },
    DoWhile {
        body: Block,
        condition: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        update: Option<Box<Stmt>>,
        body: Block,
    },
    Foreach {
        var_name: String,
        iterable: Expr,
        body: Block,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    TryCatch {
        try_block: Block,
        exc_name: String,
        catch_block: Block,
    },
    Switch {
        expression: Expr,
        cases: Vec<SwitchCase>,
        default: Option<Vec<Stmt>>,
    },
    Function(FunctionDecl),
    Class(ClassDecl),
}

impl StmtData {
    pub fn stmt(self) -> Stmt {
        Stmt {
            data: self,
            loc: None,
        }
    }
}

impl Stmt {
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.loc = Some(SourceLoc::new(line, column));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

impl Block {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Block { statements }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub expression: Expr,
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub type_ref: TypeRef,
}

impl Parameter {
    pub fn new(name: impl Into<String>, type_ref: TypeRef) -> Self {
        Parameter {
            name: name.into(),
            type_ref,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<TypeRef>,
    pub body: Block,
}

impl FunctionDecl {
    pub fn returns_value(&self) -> bool {
        self.return_type.as_ref().is_some_and(|t| !t.is_void())
    }
}

/// The constructor of a class is the member function named `constructor`.
pub const CONSTRUCTOR_NAME: &str = "constructor";

#[derive(Debug, Clone, PartialEq)]
pub enum ClassMember {
    Field {
        name: String,
        type_ref: Option<TypeRef>,
    },
    Method(FunctionDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub superclass: Option<String>,
    pub members: Vec<ClassMember>,
}

impl ClassDecl {
    pub fn explicit_constructor(&self) -> Option<&FunctionDecl> {
        self.members.iter().find_map(|m| match m {
            ClassMember::Method(f) if f.name == CONSTRUCTOR_NAME => Some(f),
            _ => None,
        })
    }

    pub fn field_names(&self) -> Vec<String> {
        self.members
            .iter()
            .filter_map(|m| match m {
                ClassMember::Field { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

/// A whole compilation unit as delivered by the semantic analyzer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Program { statements }
    }
}
