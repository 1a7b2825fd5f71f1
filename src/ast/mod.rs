pub mod tree;
pub mod types;

pub use tree::{
    BinaryOperator, Block, ClassDecl, ClassMember, Expr, ExprData, FunctionDecl, Parameter,
    Program, SourceLoc, Stmt, StmtData, SwitchCase, UnaryOperator, CONSTRUCTOR_NAME,
};
pub use types::{PrimitiveType, TypeRef};
